use std::fmt::Write;
use std::path::Path;

use serde::Serialize;

use crate::buckets::BucketKey;
use crate::dashboard::{BankPerformance, BranchPerformance, EmployeeDetail, EmployeePerformance};
use crate::models::EmployeeScore;
use crate::session::{navigation, Session};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

fn write_scores(output: &mut String, scores: &[EmployeeScore], empty: &str) {
    if scores.is_empty() {
        let _ = writeln!(output, "{empty}");
        return;
    }
    for score in scores {
        let _ = writeln!(
            output,
            "- {} ({}) efficiency {} across {} rated appointments",
            score.full_name,
            score.employee_id,
            percent(score.score),
            score.appointment_count
        );
    }
}

fn write_series(output: &mut String, series: &[(BucketKey, usize)]) {
    if series.is_empty() {
        let _ = writeln!(output, "No completed appointments in this window.");
        return;
    }
    for (key, count) in series {
        let _ = writeln!(output, "  {:<12} {count}", key.to_string());
    }
}

fn write_months(output: &mut String, months: &[usize; 12]) {
    for (label, count) in MONTHS.iter().zip(months.iter()) {
        let _ = writeln!(output, "  {label} {count}");
    }
}

pub fn render_welcome(session: &Session) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Welcome, {} ({})", session.profile.full_name, session.role);
    let _ = writeln!(output);
    let _ = writeln!(output, "Available pages:");
    for page in navigation(session.role) {
        let _ = writeln!(output, "  {:<22} {}", page.label(), page.route());
    }
    output
}

pub fn render_profile(session: &Session) -> String {
    let profile = &session.profile;
    let mut output = String::new();
    let _ = writeln!(output, "Name:   {}", profile.full_name);
    let _ = writeln!(output, "Email:  {}", profile.email);
    let _ = writeln!(output, "Role:   {}", session.role);
    let _ = writeln!(output, "Bank:   {}", profile.bank_id.as_deref().unwrap_or("-"));
    let _ = writeln!(output, "Branch: {}", profile.branch_id.as_deref().unwrap_or("-"));
    output
}

pub fn render_bank(view: &BankPerformance) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Bank performance: {} ({})", view.bank_name, view.year);
    let _ = writeln!(output, "  Completed tasks        {}", view.task_count);
    let _ = writeln!(output, "  Employees              {}", view.employee_count);
    let _ = writeln!(output, "  Customer satisfaction  {}%", view.satisfaction);
    let _ = writeln!(output, "  Fraud rate             {}%", view.fraud_rate);
    let _ = writeln!(output, "  Churn rate             {}%", view.churn_rate);
    let _ = writeln!(output, "  Employee efficiency    {}", percent(view.efficiency));
    let _ = writeln!(output, "  Average queue time     {}", view.avg_queue_time);
    let _ = writeln!(output);
    let _ = writeln!(output, "Branches:");
    if view.branches.is_empty() {
        let _ = writeln!(output, "  No branches recorded for this bank.");
    }
    for row in &view.branches {
        let _ = writeln!(
            output,
            "  {:<24} tasks {:>5}  efficiency {:>4}  satisfaction {:>3}%",
            row.name,
            row.task_count,
            percent(row.efficiency),
            row.satisfaction
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Monthly activity:");
    write_months(&mut output, &view.monthly_activity);
    output
}

pub fn render_branch(view: &BranchPerformance) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Branch performance: {} ({})", view.branch_name, view.year);
    let _ = writeln!(output, "  Completed tasks        {}", view.task_count);
    let _ = writeln!(output, "  Daily footfall         {}", view.footfall);
    let _ = writeln!(output, "  Average queue time     {}", view.avg_queue_time);
    let _ = writeln!(output, "  Service deviation      {:.1}%", view.service_deviation);
    let _ = writeln!(output, "  Employee efficiency    {}", percent(view.efficiency));
    let _ = writeln!(output, "  Customer satisfaction  {}%", view.satisfaction);
    let _ = writeln!(output);
    let _ = writeln!(output, "Strongest employees:");
    write_scores(&mut output, &view.ranking.strongest, "  No rated employees yet.");
    let _ = writeln!(output, "Weakest employees:");
    write_scores(&mut output, &view.ranking.weakest, "  No rated employees yet.");
    let _ = writeln!(output);
    let _ = writeln!(output, "Monthly activity:");
    write_months(&mut output, &view.monthly_activity);
    output
}

pub fn render_employees(view: &EmployeePerformance) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Employee performance: {}", view.branch_name);
    if let Some((from, to)) = view.window {
        let _ = writeln!(output, "Window: {from} to {to}");
    }
    let _ = writeln!(output);
    if view.scores.is_empty() {
        let _ = writeln!(output, "No employees assigned to this branch.");
    }
    for score in &view.scores {
        let _ = writeln!(
            output,
            "  {:<10} {:<28} {:>5}  ({} rated)",
            score.employee_id,
            score.full_name,
            percent(score.score),
            score.appointment_count
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Completed appointments:");
    write_series(&mut output, &view.series);
    output
}

pub fn render_employee(view: &EmployeeDetail) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{} ({})", view.employee.full_name, view.employee.id);
    if let Some((from, to)) = view.window {
        let _ = writeln!(output, "Window: {from} to {to}");
    }
    let _ = writeln!(output, "  Completed tasks        {}", view.task_count);
    let _ = writeln!(output, "  Average handling time  {}", view.avg_queue_time);
    let _ = writeln!(output, "  Service deviation      {:.1}%", view.service_deviation);
    let _ = writeln!(output, "  Efficiency             {}", percent(view.efficiency));
    let _ = writeln!(output, "  Customer satisfaction  {}%", view.satisfaction);
    let _ = writeln!(output);
    let _ = writeln!(output, "Completed appointments:");
    write_series(&mut output, &view.series);
    output
}

/// Markdown branch report for sharing outside the console.
pub fn build_report(view: &BranchPerformance) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Branch Performance Report");
    let _ = writeln!(output, "Generated for {} ({})", view.branch_name, view.year);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Headline");
    let _ = writeln!(output, "| Metric | Value |");
    let _ = writeln!(output, "| --- | --- |");
    let _ = writeln!(output, "| Completed tasks | {} |", view.task_count);
    let _ = writeln!(output, "| Daily footfall | {} |", view.footfall);
    let _ = writeln!(output, "| Average queue time | {} |", view.avg_queue_time);
    let _ = writeln!(output, "| Service deviation | {:.1}% |", view.service_deviation);
    let _ = writeln!(output, "| Employee efficiency | {} |", percent(view.efficiency));
    let _ = writeln!(output, "| Customer satisfaction | {}% |", view.satisfaction);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Activity");
    if view.monthly_activity.iter().all(|count| *count == 0) {
        let _ = writeln!(output, "No completed appointments this year.");
    } else {
        for (label, count) in MONTHS.iter().zip(view.monthly_activity.iter()) {
            let _ = writeln!(output, "- {label}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strongest Employees");
    write_scores(&mut output, &view.ranking.strongest, "No rated employees this year.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weakest Employees");
    write_scores(&mut output, &view.ranking.weakest, "No rated employees this year.");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Service Mix");
    if view.service_mix.is_empty() {
        let _ = writeln!(output, "No services delivered this year.");
    } else {
        for summary in view.service_mix.iter() {
            let _ = writeln!(
                output,
                "- {}: {} appointments (avg {:.1} min)",
                summary.service_id, summary.count, summary.avg_minutes
            );
        }
    }

    output
}

#[derive(Serialize)]
struct RankingRow<'a> {
    rank: usize,
    employee_id: &'a str,
    full_name: &'a str,
    efficiency_pct: String,
    rated_appointments: usize,
}

pub fn ranking_csv<W: std::io::Write>(writer: W, scores: &[EmployeeScore]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for (position, score) in scores.iter().enumerate() {
        writer.serialize(RankingRow {
            rank: position + 1,
            employee_id: &score.employee_id,
            full_name: &score.full_name,
            efficiency_pct: format!("{:.1}", score.score * 100.0),
            rated_appointments: score.appointment_count,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_ranking_csv(path: &Path, scores: &[EmployeeScore]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    ranking_csv(file, scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{QueueTime, Ranking};
    use crate::models::{Profile, ServiceSummary};

    fn score(id: &str, name: &str, value: f64) -> EmployeeScore {
        EmployeeScore {
            employee_id: id.into(),
            full_name: name.into(),
            score: value,
            appointment_count: 4,
        }
    }

    #[test]
    fn empty_branch_report_has_placeholders() {
        let report = build_report(&BranchPerformance {
            branch_name: "Downtown".into(),
            year: 2024,
            ..Default::default()
        });
        assert!(report.contains("Generated for Downtown (2024)"));
        assert!(report.contains("| Average queue time | 0m 0s |"));
        assert!(report.contains("No completed appointments this year."));
        assert!(report.contains("No services delivered this year."));
    }

    #[test]
    fn populated_report_lists_ranking_and_services() {
        let strong = score("e-1", "Dana Cho", 0.92);
        let weak = score("e-2", "Luis Ortega", 0.41);
        let mut monthly_activity = [0; 12];
        monthly_activity[2] = 10;
        let report = build_report(&BranchPerformance {
            branch_name: "Downtown".into(),
            year: 2024,
            task_count: 10,
            avg_queue_time: QueueTime { seconds: 1830 },
            monthly_activity,
            ranking: Ranking {
                strongest: vec![strong.clone(), weak.clone()],
                weakest: vec![weak, strong],
            },
            service_mix: vec![ServiceSummary {
                service_id: "loans".into(),
                count: 10,
                avg_minutes: 30.5,
            }],
            ..Default::default()
        });

        assert!(report.contains("| Average queue time | 30m 30s |"));
        assert!(report.contains("- Mar: 10"));
        assert!(report.contains("- Dana Cho (e-1) efficiency 92% across 4 rated appointments"));
        assert!(report.contains("- loans: 10 appointments (avg 30.5 min)"));
    }

    #[test]
    fn ranking_csv_has_header_and_rows() {
        let mut buffer = Vec::new();
        ranking_csv(&mut buffer, &[score("e-1", "Dana Cho", 0.875)]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("rank,employee_id,full_name,efficiency_pct,rated_appointments")
        );
        assert_eq!(lines.next(), Some("1,e-1,Dana Cho,87.5,4"));
    }

    #[test]
    fn welcome_lists_gated_navigation() {
        let session = Session::new(Profile {
            full_name: "Ria Sen".into(),
            role: "Branch Manager".into(),
            ..Default::default()
        });
        let text = render_welcome(&session);
        assert!(text.contains("Welcome, Ria Sen (Branch Manager)"));
        assert!(text.contains("/BranchPerformance"));
        assert!(!text.contains("/GiveAccess"));
    }
}
