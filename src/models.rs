use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const COMPLETED: &str = "Completed";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bank {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Branch {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub bank_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Employee {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub full_name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub branch_id: Option<String>,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub bank_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Appointment {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub employee_id: Option<String>,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub branch_id: Option<String>,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub service_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
    /// Expected duration in minutes.
    #[serde(deserialize_with = "flexible_number")]
    pub benchmark_time: Option<f64>,
    pub created_at: Option<String>,
}

impl Appointment {
    pub fn is_completed(&self) -> bool {
        self.status == COMPLETED
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        combine(self.start_date.as_deref()?, self.start_time.as_deref()?)
    }

    pub fn ended_at(&self) -> Option<NaiveDateTime> {
        combine(self.end_date.as_deref()?, self.end_time.as_deref()?)
    }

    /// Handling time in minutes; `None` unless both timestamps parse and the span is positive.
    pub fn duration_minutes(&self) -> Option<f64> {
        let seconds = (self.ended_at()? - self.started_at()?).num_seconds();
        (seconds > 0).then(|| seconds as f64 / 60.0)
    }

    /// The calendar day the appointment belongs to: creation time, else its start date.
    pub fn occurred_on(&self) -> Option<NaiveDate> {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|ts| ts.date())
            .or_else(|| self.start_date.as_deref().and_then(parse_date))
    }

    pub fn positive_benchmark(&self) -> Option<f64> {
        self.benchmark_time.filter(|b| *b > 0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Feedback {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "flexible_id")]
    pub appointment_id: String,
    /// 0 to 5.
    #[serde(deserialize_with = "flexible_number")]
    pub satisfaction_rating: Option<f64>,
    /// 0 to 5.
    #[serde(deserialize_with = "flexible_number")]
    pub time_resolution_rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prediction {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub customer_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub prediction: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[serde(alias = "_id", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub full_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub role: String,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub bank_id: Option<String>,
    #[serde(deserialize_with = "flexible_opt_id")]
    pub branch_id: Option<String>,
}

/// `{ success, data, message }` returned by every mutation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MutationResponse {
    pub success: bool,
    pub data: Value,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCheck<'a> {
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub employee_id: String,
    pub full_name: String,
    pub role: String,
    pub email: String,
    pub password: String,
    pub bank_id: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryGrant {
    pub employee_id: String,
    pub role: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub reason: String,
    pub granted_by: String,
    pub bank_id: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmployeeScore {
    pub employee_id: String,
    pub full_name: String,
    /// Composite efficiency in 0..=1.
    pub score: f64,
    pub appointment_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSummary {
    pub service_id: String,
    pub count: usize,
    pub avg_minutes: f64,
}

/// Joins `YYYY-MM-DD` and `HH:MM[:SS]` with `T`.
/// Date strings that already carry a time keep only the date.
fn combine(date: &str, time: &str) -> Option<NaiveDateTime> {
    let day = parse_date(date)?;
    let time = time.trim();
    let clock = NaiveTime::parse_from_str(time, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .ok()?;
    Some(day.and_time(clock))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().split('T').next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(flexible_opt_id(deserializer)?.unwrap_or_default())
}

fn flexible_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(id_of(Value::deserialize(deserializer)?))
}

/// Populated references arrive as whole documents; their `_id` (or `id`) is the join key.
fn id_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(mut map) => match map.remove("_id").or_else(|| map.remove("id")) {
            Some(inner) => id_of(inner),
            None => Some(Value::Object(map).to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Null or non-string values decode as an empty string so one odd record never fails a fetch.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn flexible_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
