use crate::session::Page;

/// Type-ahead entries: a label the user types against and the page it opens.
pub const INDEX: &[(&str, Page)] = &[
    ("Bank Performance", Page::BankPerformance),
    ("Customer Satisfaction", Page::BankPerformance),
    ("Fraud Rate", Page::BankPerformance),
    ("Churn Rate", Page::BankPerformance),
    ("Branch Performance", Page::BranchPerformance),
    ("Footfall", Page::BranchPerformance),
    ("Average Queue Time", Page::BranchPerformance),
    ("Service Deviation", Page::BranchPerformance),
    ("Employee Performance", Page::EmployeePerformance),
    ("Employee Efficiency", Page::EmployeePerformance),
    ("Employee Details", Page::EmployeeDetail),
    ("Give Access", Page::GiveAccess),
    ("Privilege Escalation", Page::GiveAccess),
    ("Temporary Access", Page::TemporaryAccess),
    ("Settings", Page::Settings),
    ("Change Password", Page::Settings),
    ("User Info", Page::UserInfo),
    ("Welcome", Page::Welcome),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub label: &'static str,
    pub route: &'static str,
}

/// Case-insensitive match; prefix hits come before substring hits, index order otherwise.
pub fn search(query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut prefix = Vec::new();
    let mut contains = Vec::new();
    for &(label, page) in INDEX {
        let haystack = label.to_lowercase();
        let hit = SearchHit {
            label,
            route: page.route(),
        };
        if haystack.starts_with(&needle) {
            prefix.push(hit);
        } else if haystack.contains(&needle) {
            contains.push(hit);
        }
    }

    prefix.extend(contains);
    prefix
}
