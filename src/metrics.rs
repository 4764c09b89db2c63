use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::models::{Appointment, Employee, EmployeeScore, Feedback, Prediction, ServiceSummary};

pub const SPEED_WEIGHT: f64 = 0.4;
pub const SATISFACTION_WEIGHT: f64 = 0.3;
pub const RESOLUTION_WEIGHT: f64 = 0.3;
pub const RANKING_SIZE: usize = 5;
const MAX_RATING: f64 = 5.0;
const WORKING_DAYS_PER_WEEK: f64 = 5.0 / 7.0;

/// Feedback keyed by appointment id. Later records for the same appointment win.
pub struct FeedbackIndex<'a> {
    by_appointment: HashMap<&'a str, &'a Feedback>,
}

impl<'a> FeedbackIndex<'a> {
    pub fn new(feedback: &'a [Feedback]) -> Self {
        let by_appointment = feedback
            .iter()
            .map(|f| (f.appointment_id.as_str(), f))
            .collect();
        Self { by_appointment }
    }

    pub fn for_appointment(&self, appointment_id: &str) -> Option<&'a Feedback> {
        self.by_appointment.get(appointment_id).copied()
    }
}

/// Mean positive benchmark per service, the "ideal time" used when an appointment has none.
pub fn ideal_times(appointments: &[Appointment]) -> HashMap<String, f64> {
    let mut totals: HashMap<String, (f64, usize)> = HashMap::new();
    for appointment in appointments {
        if let (Some(service), Some(benchmark)) =
            (&appointment.service_id, appointment.positive_benchmark())
        {
            let entry = totals.entry(service.clone()).or_insert((0.0, 0));
            entry.0 += benchmark;
            entry.1 += 1;
        }
    }
    totals
        .into_iter()
        .map(|(service, (total, count))| (service, total / count as f64))
        .collect()
}

pub fn completed_in_year<'a>(
    appointments: &'a [Appointment],
    branch_id: Option<&str>,
    year: i32,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| a.is_completed())
        .filter(|a| branch_id.map_or(true, |id| a.branch_id.as_deref() == Some(id)))
        .filter(|a| a.occurred_on().map(|d| d.year()) == Some(year))
        .collect()
}

pub fn completed_between<'a>(
    appointments: &'a [Appointment],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| a.is_completed())
        .filter(|a| a.occurred_on().map_or(false, |d| d >= from && d <= to))
        .collect()
}

pub fn task_count(appointments: &[&Appointment]) -> usize {
    appointments.len()
}

pub fn days_in_year(year: i32) -> u32 {
    match NaiveDate::from_ymd_opt(year, 12, 31) {
        Some(last) => last.ordinal(),
        None => 365,
    }
}

/// Estimated customers per working day across the year.
pub fn footfall(count: usize, year: i32) -> u64 {
    let working_days = days_in_year(year) as f64 * WORKING_DAYS_PER_WEEK;
    (count as f64 / working_days).round() as u64
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueTime {
    pub seconds: u64,
}

impl fmt::Display for QueueTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m {}s", self.seconds / 60, self.seconds % 60)
    }
}

pub fn average_queue_time(appointments: &[&Appointment]) -> QueueTime {
    let durations: Vec<f64> = appointments
        .iter()
        .filter_map(|a| a.duration_minutes())
        .collect();
    match mean(&durations) {
        Some(minutes) => QueueTime {
            seconds: (minutes * 60.0).round() as u64,
        },
        None => QueueTime::default(),
    }
}

/// Mean absolute deviation from benchmark, in percent.
pub fn service_deviation(appointments: &[&Appointment]) -> f64 {
    let deviations: Vec<f64> = appointments
        .iter()
        .filter_map(|a| {
            let benchmark = a.positive_benchmark()?;
            let actual = a.duration_minutes()?;
            Some(((actual - benchmark) / benchmark).abs() * 100.0)
        })
        .collect();
    mean(&deviations).unwrap_or(0.0)
}

/// Efficiency of one appointment in 0..=1, or `None` when it cannot be scored:
/// missing timestamps or no matching feedback.
pub fn appointment_efficiency(
    appointment: &Appointment,
    feedback: Option<&Feedback>,
    ideal_times: &HashMap<String, f64>,
) -> Option<f64> {
    let duration = appointment.duration_minutes()?;
    let feedback = feedback?;
    let benchmark = appointment
        .positive_benchmark()
        .or_else(|| {
            appointment
                .service_id
                .as_ref()
                .and_then(|s| ideal_times.get(s).copied())
        })
        .unwrap_or(0.0);

    let speed = (benchmark / duration).clamp(0.5, 1.0);
    let satisfaction = rating_fraction(feedback.satisfaction_rating);
    let resolution = rating_fraction(feedback.time_resolution_rating);

    Some(SPEED_WEIGHT * speed + SATISFACTION_WEIGHT * satisfaction + RESOLUTION_WEIGHT * resolution)
}

fn rating_fraction(rating: Option<f64>) -> f64 {
    rating.unwrap_or(0.0).clamp(0.0, MAX_RATING) / MAX_RATING
}

/// Branch-wide efficiency: mean over every scorable appointment, regardless of employee.
pub fn branch_efficiency(
    appointments: &[&Appointment],
    feedback: &FeedbackIndex<'_>,
    ideal_times: &HashMap<String, f64>,
) -> f64 {
    let scores: Vec<f64> = appointments
        .iter()
        .filter_map(|a| appointment_efficiency(a, feedback.for_appointment(&a.id), ideal_times))
        .collect();
    mean(&scores).unwrap_or(0.0)
}

/// One score per employee; employees without a scorable appointment get 0.
pub fn employee_scores(
    employees: &[Employee],
    appointments: &[&Appointment],
    feedback: &FeedbackIndex<'_>,
    ideal_times: &HashMap<String, f64>,
) -> Vec<EmployeeScore> {
    let mut per_employee: HashMap<&str, Vec<f64>> = HashMap::new();
    for appointment in appointments {
        let Some(employee_id) = appointment.employee_id.as_deref() else {
            continue;
        };
        if let Some(score) = appointment_efficiency(
            appointment,
            feedback.for_appointment(&appointment.id),
            ideal_times,
        ) {
            per_employee.entry(employee_id).or_default().push(score);
        }
    }

    employees
        .iter()
        .map(|employee| {
            let scores = per_employee
                .get(employee.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            EmployeeScore {
                employee_id: employee.id.clone(),
                full_name: employee.full_name.clone(),
                score: mean(scores).unwrap_or(0.0),
                appointment_count: scores.len(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub strongest: Vec<EmployeeScore>,
    /// Weakest first.
    pub weakest: Vec<EmployeeScore>,
}

pub fn rank_employees(scores: &[EmployeeScore]) -> Ranking {
    let mut ranked: Vec<EmployeeScore> = scores.iter().filter(|s| s.score > 0.0).cloned().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let strongest = ranked.iter().take(RANKING_SIZE).cloned().collect();
    let weakest = ranked.iter().rev().take(RANKING_SIZE).cloned().collect();

    Ranking { strongest, weakest }
}

/// Completed appointments per calendar month, January first.
pub fn monthly_activity(appointments: &[&Appointment]) -> [usize; 12] {
    let mut months = [0usize; 12];
    for date in appointments.iter().filter_map(|a| a.occurred_on()) {
        months[date.month0() as usize] += 1;
    }
    months
}

/// Mean satisfaction as a percentage of the top rating.
/// Only feedback whose appointment is in scope counts.
pub fn satisfaction_rate(appointments: &[&Appointment], feedback: &FeedbackIndex<'_>) -> u32 {
    let ratings: Vec<f64> = appointments
        .iter()
        .filter_map(|a| feedback.for_appointment(&a.id))
        .filter_map(|f| f.satisfaction_rating)
        .collect();
    mean(&ratings)
        .map(|m| (m.clamp(0.0, MAX_RATING) / MAX_RATING * 100.0).round() as u32)
        .unwrap_or(0)
}

/// Share of predictions carrying `label`, as a rounded percentage.
pub fn prediction_rate(predictions: &[Prediction], label: &str) -> u32 {
    if predictions.is_empty() {
        return 0;
    }
    let matching = predictions
        .iter()
        .filter(|p| p.prediction.trim().eq_ignore_ascii_case(label))
        .count();
    (100.0 * matching as f64 / predictions.len() as f64).round() as u32
}

pub fn service_mix(appointments: &[&Appointment]) -> Vec<ServiceSummary> {
    let mut map: HashMap<String, (usize, f64, usize)> = HashMap::new();

    for appointment in appointments {
        let service = appointment
            .service_id
            .clone()
            .unwrap_or_else(|| "unassigned".to_string());
        let entry = map.entry(service).or_insert((0, 0.0, 0));
        entry.0 += 1;
        if let Some(minutes) = appointment.duration_minutes() {
            entry.1 += minutes;
            entry.2 += 1;
        }
    }

    let mut summaries: Vec<ServiceSummary> = map
        .into_iter()
        .map(|(service_id, (count, total_minutes, timed))| ServiceSummary {
            service_id,
            count,
            avg_minutes: if timed == 0 {
                0.0
            } else {
                total_minutes / timed as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.service_id.cmp(&b.service_id)));
    summaries
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
