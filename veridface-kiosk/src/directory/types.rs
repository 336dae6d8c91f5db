// Records served by the admin read endpoints, raw and normalised.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const MISSING: &str = "N/A";
pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Transport(#[from] crate::verification::TransportError),
    #[error("response has no data")]
    Empty,
}

// --- Wire shapes ---

/// `{ "data": ... }`, the envelope every admin endpoint answers with.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct UserFields {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Email")]
    pub email: Option<String>,
    #[serde(rename = "Phone")]
    pub phone: Option<Value>,
    #[serde(rename = "DigitalID")]
    pub digital_id: Option<String>,
    #[serde(rename = "Event")]
    pub event: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fields: UserFields,
    #[serde(default)]
    pub log: Vec<LogRecord>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LogFields {
    pub timestamp: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub fields: LogFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourlyCount {
    pub date: String,
    pub hour: i64,
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardRecord {
    pub total_attendance_today: u64,
    pub total_absence_today: u64,
    pub total_late_today: u64,
    pub total_user: u64,
    pub latest_log: Vec<LogRecord>,
    pub hourly_attendance: Vec<HourlyCount>,
    pub daily_attendance: Vec<DailyCount>,
}

// --- Normalised shapes ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityEntry {
    pub date: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub digital_id: String,
    pub event: String,
    pub registered_at: DateTime<Utc>,
    pub activity_log: Vec<ActivityEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeatmapRow {
    pub date: String,
    pub hourly: [u64; HOURS_PER_DAY],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardSummary {
    pub total_attendance_today: u64,
    pub total_absence_today: u64,
    pub total_late_today: u64,
    pub total_users: u64,
    pub latest_log: Vec<ActivityEntry>,
    pub hourly_heatmap: Vec<HeatmapRow>,
    pub daily_series: Vec<(String, u64)>,
}

// --- Normalisation ---

fn or_missing(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => MISSING.to_string(),
    }
}

// Phone numbers come back as text or as a bare number depending on the record
fn phone_text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => or_missing(Some(s)),
        Some(Value::Number(n)) => n.to_string(),
        _ => MISSING.to_string(),
    }
}

/// Accepts RFC 3339 or the `YYYY-MM-DD HH:MM:SS` form the service writes.
/// Anything else reads as "now".
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Utc::now();
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        Ok(naive) => naive.and_utc(),
        Err(_) => Utc::now(),
    }
}

/// Date part of an activity timestamp, i.e. everything before the `T`.
pub fn date_part(timestamp: &str) -> String {
    timestamp
        .split(|c| c == 'T' || c == ' ')
        .next()
        .unwrap_or_default()
        .to_string()
}

impl From<LogRecord> for ActivityEntry {
    fn from(record: LogRecord) -> Self {
        ActivityEntry {
            date: record
                .fields
                .timestamp
                .as_deref()
                .map(date_part)
                .unwrap_or_else(|| MISSING.to_string()),
            title: or_missing(record.fields.title),
        }
    }
}

impl DirectoryUser {
    /// `fallback_id` is used when the record itself carries no id (the
    /// single-user endpoint is addressed by id but may not echo it).
    pub fn from_record(record: UserRecord, fallback_id: Option<&str>) -> Self {
        let UserRecord { id, fields, log } = record;
        let id = id
            .filter(|id| !id.is_empty())
            .or_else(|| fallback_id.map(str::to_string))
            .unwrap_or_else(|| MISSING.to_string());
        DirectoryUser {
            id,
            registered_at: parse_timestamp(fields.timestamp.as_deref()),
            name: or_missing(fields.name),
            email: or_missing(fields.email),
            phone_number: phone_text(fields.phone),
            digital_id: or_missing(fields.digital_id),
            event: or_missing(fields.event),
            activity_log: log.into_iter().map(ActivityEntry::from).collect(),
        }
    }
}

/// Groups hourly counts into one 24-slot row per date, in first-seen order.
pub fn group_hourly(counts: &[HourlyCount]) -> Vec<HeatmapRow> {
    let mut rows: Vec<HeatmapRow> = Vec::new();
    for entry in counts {
        let slot = match usize::try_from(entry.hour) {
            Ok(hour) if hour < HOURS_PER_DAY => hour,
            _ => continue,
        };
        let position = match rows.iter().position(|row| row.date == entry.date) {
            Some(position) => position,
            None => {
                rows.push(HeatmapRow { date: entry.date.clone(), hourly: [0; HOURS_PER_DAY] });
                rows.len() - 1
            }
        };
        rows[position].hourly[slot] = entry.count;
    }
    rows
}

impl From<DashboardRecord> for DashboardSummary {
    fn from(record: DashboardRecord) -> Self {
        DashboardSummary {
            total_attendance_today: record.total_attendance_today,
            total_absence_today: record.total_absence_today,
            total_late_today: record.total_late_today,
            total_users: record.total_user,
            hourly_heatmap: group_hourly(&record.hourly_attendance),
            latest_log: record.latest_log.into_iter().map(ActivityEntry::from).collect(),
            daily_series: record
                .daily_attendance
                .into_iter()
                .map(|day| (day.date, day.count))
                .collect(),
        }
    }
}
