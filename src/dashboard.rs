use std::collections::HashSet;
use std::future::Future;

use chrono::NaiveDate;
use tracing::{error, info};

use crate::api::ApiClient;
use crate::buckets::{bucket_series, BucketKey, Granularity};
use crate::error::{ApiError, ApiResult};
use crate::metrics::{self, FeedbackIndex, QueueTime, Ranking};
use crate::models::{
    Appointment, Bank, Branch, Employee, EmployeeScore, Feedback, Prediction, ServiceSummary,
};

#[derive(Debug, Clone, Default)]
pub struct BranchRow {
    pub branch_id: String,
    pub name: String,
    pub task_count: usize,
    pub efficiency: f64,
    pub satisfaction: u32,
}

#[derive(Debug, Clone, Default)]
pub struct BankPerformance {
    pub bank_id: String,
    pub bank_name: String,
    pub year: i32,
    pub task_count: usize,
    pub employee_count: usize,
    pub satisfaction: u32,
    pub fraud_rate: u32,
    pub churn_rate: u32,
    pub efficiency: f64,
    pub avg_queue_time: QueueTime,
    pub monthly_activity: [usize; 12],
    pub branches: Vec<BranchRow>,
}

#[derive(Debug, Clone, Default)]
pub struct BranchPerformance {
    pub branch_id: String,
    pub branch_name: String,
    pub year: i32,
    pub task_count: usize,
    pub footfall: u64,
    pub avg_queue_time: QueueTime,
    pub service_deviation: f64,
    pub efficiency: f64,
    pub satisfaction: u32,
    pub monthly_activity: [usize; 12],
    pub scores: Vec<EmployeeScore>,
    pub ranking: Ranking,
    pub service_mix: Vec<ServiceSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeePerformance {
    pub branch_id: String,
    pub branch_name: String,
    pub window: Option<(NaiveDate, NaiveDate)>,
    pub scores: Vec<EmployeeScore>,
    pub ranking: Ranking,
    pub series: Vec<(BucketKey, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeDetail {
    pub employee: Employee,
    pub window: Option<(NaiveDate, NaiveDate)>,
    pub task_count: usize,
    pub avg_queue_time: QueueTime,
    pub service_deviation: f64,
    pub efficiency: f64,
    pub satisfaction: u32,
    pub series: Vec<(BucketKey, usize)>,
}

/// Runs a page loader; on failure the error is logged once and the zero-valued page is kept.
pub async fn load_or_default<T, F>(page: &str, loader: F) -> (T, Option<ApiError>)
where
    T: Default,
    F: Future<Output = ApiResult<T>>,
{
    match loader.await {
        Ok(view) => (view, None),
        Err(err) => {
            error!(page, error = %err, "page data failed to load; showing empty view");
            (T::default(), Some(err))
        }
    }
}

pub async fn bank_performance(
    client: &ApiClient,
    bank_id: &str,
    year: i32,
) -> ApiResult<BankPerformance> {
    let (banks, branches, employees, appointments, feedback, fraud, churn) = tokio::try_join!(
        client.banks(),
        client.branches(),
        client.employees(),
        client.appointments(),
        client.feedback(),
        client.fraud_predictions(),
        client.churn_predictions(),
    )?;

    let bank = banks
        .iter()
        .find(|b| b.id == bank_id)
        .ok_or_else(|| ApiError::NotFound(format!("Bank {bank_id}")))?;

    info!(bank = %bank.name, year, "building bank performance");
    Ok(build_bank_performance(
        bank,
        year,
        &branches,
        &employees,
        &appointments,
        &feedback,
        &fraud,
        &churn,
    ))
}

#[allow(clippy::too_many_arguments)]
pub fn build_bank_performance(
    bank: &Bank,
    year: i32,
    branches: &[Branch],
    employees: &[Employee],
    appointments: &[Appointment],
    feedback: &[Feedback],
    fraud: &[Prediction],
    churn: &[Prediction],
) -> BankPerformance {
    let bank_branches: Vec<&Branch> = branches
        .iter()
        .filter(|b| b.bank_id.as_deref() == Some(bank.id.as_str()))
        .collect();
    let branch_ids: HashSet<&str> = bank_branches.iter().map(|b| b.id.as_str()).collect();

    let in_scope: Vec<&Appointment> = metrics::completed_in_year(appointments, None, year)
        .into_iter()
        .filter(|a| a.branch_id.as_deref().map_or(false, |id| branch_ids.contains(id)))
        .collect();

    let index = FeedbackIndex::new(feedback);
    let ideal = metrics::ideal_times(appointments);

    let rows = bank_branches
        .iter()
        .map(|branch| {
            let branch_appointments: Vec<&Appointment> = in_scope
                .iter()
                .copied()
                .filter(|a| a.branch_id.as_deref() == Some(branch.id.as_str()))
                .collect();
            BranchRow {
                branch_id: branch.id.clone(),
                name: branch.name.clone(),
                task_count: metrics::task_count(&branch_appointments),
                efficiency: metrics::branch_efficiency(&branch_appointments, &index, &ideal),
                satisfaction: metrics::satisfaction_rate(&branch_appointments, &index),
            }
        })
        .collect();

    let employee_count = employees
        .iter()
        .filter(|e| {
            e.bank_id.as_deref() == Some(bank.id.as_str())
                || e.branch_id.as_deref().map_or(false, |id| branch_ids.contains(id))
        })
        .count();

    BankPerformance {
        bank_id: bank.id.clone(),
        bank_name: bank.name.clone(),
        year,
        task_count: metrics::task_count(&in_scope),
        employee_count,
        satisfaction: metrics::satisfaction_rate(&in_scope, &index),
        fraud_rate: metrics::prediction_rate(fraud, "Fraud"),
        churn_rate: metrics::prediction_rate(churn, "Churn"),
        efficiency: metrics::branch_efficiency(&in_scope, &index, &ideal),
        avg_queue_time: metrics::average_queue_time(&in_scope),
        monthly_activity: metrics::monthly_activity(&in_scope),
        branches: rows,
    }
}

pub async fn branch_performance(
    client: &ApiClient,
    branch_id: &str,
    year: i32,
) -> ApiResult<BranchPerformance> {
    let (branches, employees, appointments, feedback) = tokio::try_join!(
        client.branches(),
        client.employees(),
        client.appointments(),
        client.feedback(),
    )?;

    let branch = find_branch(&branches, branch_id)?;
    info!(branch = %branch.name, year, "building branch performance");
    Ok(build_branch_performance(
        branch,
        year,
        &employees,
        &appointments,
        &feedback,
    ))
}

pub fn build_branch_performance(
    branch: &Branch,
    year: i32,
    employees: &[Employee],
    appointments: &[Appointment],
    feedback: &[Feedback],
) -> BranchPerformance {
    let in_scope = metrics::completed_in_year(appointments, Some(branch.id.as_str()), year);
    let index = FeedbackIndex::new(feedback);
    let ideal = metrics::ideal_times(appointments);
    let staff = branch_staff(employees, &branch.id);

    let scores = metrics::employee_scores(&staff, &in_scope, &index, &ideal);
    let ranking = metrics::rank_employees(&scores);
    let task_count = metrics::task_count(&in_scope);

    BranchPerformance {
        branch_id: branch.id.clone(),
        branch_name: branch.name.clone(),
        year,
        task_count,
        footfall: metrics::footfall(task_count, year),
        avg_queue_time: metrics::average_queue_time(&in_scope),
        service_deviation: metrics::service_deviation(&in_scope),
        efficiency: metrics::branch_efficiency(&in_scope, &index, &ideal),
        satisfaction: metrics::satisfaction_rate(&in_scope, &index),
        monthly_activity: metrics::monthly_activity(&in_scope),
        scores,
        ranking,
        service_mix: metrics::service_mix(&in_scope),
    }
}

pub async fn employee_performance(
    client: &ApiClient,
    branch_id: &str,
    window: Option<(NaiveDate, NaiveDate)>,
) -> ApiResult<EmployeePerformance> {
    let (branches, employees, appointments, feedback) = tokio::try_join!(
        client.branches(),
        client.employees(),
        client.appointments(),
        client.feedback(),
    )?;

    let branch = find_branch(&branches, branch_id)?;
    Ok(build_employee_performance(
        branch,
        window,
        &employees,
        &appointments,
        &feedback,
    ))
}

pub fn build_employee_performance(
    branch: &Branch,
    window: Option<(NaiveDate, NaiveDate)>,
    employees: &[Employee],
    appointments: &[Appointment],
    feedback: &[Feedback],
) -> EmployeePerformance {
    let in_scope: Vec<&Appointment> = completed_in_window(appointments, window)
        .into_iter()
        .filter(|a| a.branch_id.as_deref() == Some(branch.id.as_str()))
        .collect();
    let index = FeedbackIndex::new(feedback);
    let ideal = metrics::ideal_times(appointments);
    let staff = branch_staff(employees, &branch.id);

    let mut scores = metrics::employee_scores(&staff, &in_scope, &index, &ideal);
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let ranking = metrics::rank_employees(&scores);

    EmployeePerformance {
        branch_id: branch.id.clone(),
        branch_name: branch.name.clone(),
        window,
        ranking,
        series: series_for(&in_scope, window),
        scores,
    }
}

pub async fn employee_detail(
    client: &ApiClient,
    employee_id: &str,
    window: Option<(NaiveDate, NaiveDate)>,
) -> ApiResult<EmployeeDetail> {
    let (employees, appointments, feedback) = tokio::try_join!(
        client.employees(),
        client.appointments(),
        client.feedback(),
    )?;

    let employee = employees
        .iter()
        .find(|e| e.id == employee_id)
        .ok_or_else(|| ApiError::NotFound(format!("Employee {employee_id}")))?;

    Ok(build_employee_detail(employee, window, &appointments, &feedback))
}

pub fn build_employee_detail(
    employee: &Employee,
    window: Option<(NaiveDate, NaiveDate)>,
    appointments: &[Appointment],
    feedback: &[Feedback],
) -> EmployeeDetail {
    let mine: Vec<&Appointment> = completed_in_window(appointments, window)
        .into_iter()
        .filter(|a| a.employee_id.as_deref() == Some(employee.id.as_str()))
        .collect();
    let index = FeedbackIndex::new(feedback);
    let ideal = metrics::ideal_times(appointments);

    EmployeeDetail {
        employee: employee.clone(),
        window,
        task_count: metrics::task_count(&mine),
        avg_queue_time: metrics::average_queue_time(&mine),
        service_deviation: metrics::service_deviation(&mine),
        efficiency: metrics::branch_efficiency(&mine, &index, &ideal),
        satisfaction: metrics::satisfaction_rate(&mine, &index),
        series: series_for(&mine, window),
    }
}

fn find_branch<'a>(branches: &'a [Branch], branch_id: &str) -> ApiResult<&'a Branch> {
    branches
        .iter()
        .find(|b| b.id == branch_id)
        .ok_or_else(|| ApiError::NotFound(format!("Branch {branch_id}")))
}

fn branch_staff(employees: &[Employee], branch_id: &str) -> Vec<Employee> {
    employees
        .iter()
        .filter(|e| e.branch_id.as_deref() == Some(branch_id))
        .cloned()
        .collect()
}

fn completed_in_window(
    appointments: &[Appointment],
    window: Option<(NaiveDate, NaiveDate)>,
) -> Vec<&Appointment> {
    match window {
        Some((from, to)) => metrics::completed_between(appointments, from, to),
        None => appointments.iter().filter(|a| a.is_completed()).collect(),
    }
}

/// Without an explicit window the span of the data itself picks the granularity.
fn series_for(
    appointments: &[&Appointment],
    window: Option<(NaiveDate, NaiveDate)>,
) -> Vec<(BucketKey, usize)> {
    let dates: Vec<NaiveDate> = appointments.iter().filter_map(|a| a.occurred_on()).collect();
    let span = window.or_else(|| {
        let first = dates.iter().min()?;
        let last = dates.iter().max()?;
        Some((*first, *last))
    });
    match span {
        Some((from, to)) => bucket_series(dates, Granularity::for_span(from, to)),
        None => Vec::new(),
    }
}
