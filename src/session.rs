use std::fmt;

use clap::ValueEnum;
use thiserror::Error;
use tracing::info;

use crate::api::ApiClient;
use crate::error::ApiResult;
use crate::models::Profile;

/// Staff roles, lowest privilege first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Role {
    Employee,
    BranchManager,
    BankManager,
    Admin,
}

impl Role {
    /// Lenient parse of the backend's role strings; anything unrecognised is a plain employee.
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "admin" | "administrator" | "superadmin" => Role::Admin,
            "bankmanager" | "bankadmin" => Role::BankManager,
            "branchmanager" | "manager" => Role::BranchManager,
            _ => Role::Employee,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Employee => "Employee",
            Role::BranchManager => "Branch Manager",
            Role::BankManager => "Bank Manager",
            Role::Admin => "Admin",
        }
    }

    /// Used in generated mailbox names.
    pub fn slug(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::BranchManager => "branchmanager",
            Role::BankManager => "bankmanager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Welcome,
    UserInfo,
    BankPerformance,
    BranchPerformance,
    EmployeePerformance,
    EmployeeDetail,
    GiveAccess,
    TemporaryAccess,
    Settings,
    Login,
}

impl Page {
    pub const ALL: [Page; 10] = [
        Page::Welcome,
        Page::UserInfo,
        Page::BankPerformance,
        Page::BranchPerformance,
        Page::EmployeePerformance,
        Page::EmployeeDetail,
        Page::GiveAccess,
        Page::TemporaryAccess,
        Page::Settings,
        Page::Login,
    ];

    pub fn route(self) -> &'static str {
        match self {
            Page::Welcome => "/Welcome",
            Page::UserInfo => "/UserInfo",
            Page::BankPerformance => "/BankPerformance",
            Page::BranchPerformance => "/BranchPerformance",
            Page::EmployeePerformance => "/EmployeePerformance",
            Page::EmployeeDetail => "/SpecEmp",
            Page::GiveAccess => "/GiveAccess",
            Page::TemporaryAccess => "/TempAcess",
            Page::Settings => "/settings",
            Page::Login => "/Login",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Page::Welcome => "Welcome",
            Page::UserInfo => "User Info",
            Page::BankPerformance => "Bank Performance",
            Page::BranchPerformance => "Branch Performance",
            Page::EmployeePerformance => "Employee Performance",
            Page::EmployeeDetail => "Employee Details",
            Page::GiveAccess => "Give Access",
            Page::TemporaryAccess => "Temporary Access",
            Page::Settings => "Settings",
            Page::Login => "Login",
        }
    }

    pub fn minimum_role(self) -> Role {
        match self {
            Page::Welcome | Page::UserInfo | Page::Settings | Page::Login => Role::Employee,
            Page::BranchPerformance | Page::EmployeePerformance | Page::EmployeeDetail => {
                Role::BranchManager
            }
            Page::BankPerformance => Role::BankManager,
            Page::GiveAccess | Page::TemporaryAccess => Role::Admin,
        }
    }

    pub fn visible_to(self, role: Role) -> bool {
        role >= self.minimum_role()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{page} requires the {required} role or higher (signed in as {actual})")]
pub struct PageDenied {
    pub page: &'static str,
    pub required: Role,
    pub actual: Role,
}

/// Navigation entries for the signed-in role, in menu order; Login is never listed.
pub fn navigation(role: Role) -> Vec<Page> {
    Page::ALL
        .into_iter()
        .filter(|page| *page != Page::Login && page.visible_to(role))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Session {
    pub profile: Profile,
    pub role: Role,
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        let role = Role::parse(&profile.role);
        Self { profile, role }
    }

    pub fn require(&self, page: Page) -> Result<(), PageDenied> {
        if page.visible_to(self.role) {
            Ok(())
        } else {
            Err(PageDenied {
                page: page.label(),
                required: page.minimum_role(),
                actual: self.role,
            })
        }
    }
}

pub async fn load_session(client: &ApiClient) -> ApiResult<Session> {
    let profile = client.current_user().await?;
    let session = Session::new(profile);
    info!(user = %session.profile.email, role = %session.role, "profile loaded");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: &str) -> Session {
        Session::new(Profile {
            id: "u-1".into(),
            full_name: "Ria Sen".into(),
            email: "ria@bank.com".into(),
            role: role.into(),
            ..Default::default()
        })
    }

    #[test]
    fn parses_backend_role_spellings() {
        assert_eq!(Role::parse("Admin"), Role::Admin);
        assert_eq!(Role::parse("bank_manager"), Role::BankManager);
        assert_eq!(Role::parse("Branch Manager"), Role::BranchManager);
        assert_eq!(Role::parse("teller"), Role::Employee);
        assert_eq!(Role::parse(""), Role::Employee);
    }

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Admin > Role::BankManager);
        assert!(Role::BankManager > Role::BranchManager);
        assert!(Role::BranchManager > Role::Employee);
    }

    #[test]
    fn employees_only_see_personal_pages() {
        let pages = navigation(Role::Employee);
        assert_eq!(pages, vec![Page::Welcome, Page::UserInfo, Page::Settings]);
    }

    #[test]
    fn admins_see_every_page_but_login() {
        let pages = navigation(Role::Admin);
        assert_eq!(pages.len(), Page::ALL.len() - 1);
        assert!(!pages.contains(&Page::Login));
    }

    #[test]
    fn require_reports_missing_privilege() {
        let manager = session("branch manager");
        assert!(manager.require(Page::BranchPerformance).is_ok());

        let denied = manager.require(Page::GiveAccess).unwrap_err();
        assert_eq!(denied.required, Role::Admin);
        assert_eq!(denied.actual, Role::BranchManager);
        assert!(denied.to_string().contains("Give Access"));
    }

    #[test]
    fn routes_match_the_console_urls() {
        assert_eq!(Page::TemporaryAccess.route(), "/TempAcess");
        assert_eq!(Page::EmployeeDetail.route(), "/SpecEmp");
        assert_eq!(Page::Settings.route(), "/settings");
    }
}
