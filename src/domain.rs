//! Domain types for users, workouts and logged sets.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::formulas::calculate_e1rm;

/// A registered user. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Exercise {
    pub exercise_id: i64,
    pub name: String,
    pub category: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Workout {
    pub workout_id: i64,
    pub user_id: i64,
    pub name: String,
    pub workout_date: DateTime<Utc>,
}

/// A logged set group within a workout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkoutLog {
    pub log_id: i64,
    pub workout_id: i64,
    pub exercise_id: i64,
    pub sets: u32,
    pub reps: u32,
    pub weight_kg: f64,
    pub notes: Option<String>,
}

/// A workout log joined with its exercise name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkoutLogDetail {
    pub log_id: i64,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub sets: u32,
    pub reps: u32,
    pub weight_kg: f64,
    pub notes: Option<String>,
}

/// One historical entry for an exercise, as consumed by progress analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LogEntry {
    pub workout_date: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_weight")]
    pub weight_kg: f64,
    pub reps: u32,
    #[serde(default)]
    pub sets: u32,
}

impl LogEntry {
    #[cfg(test)]
    pub fn new(workout_date: DateTime<Utc>, weight_kg: f64, reps: u32, sets: u32) -> Self {
        Self {
            workout_date,
            weight_kg,
            reps,
            sets,
        }
    }

    /// Local calendar day the entry was logged on.
    pub fn calendar_day(&self) -> NaiveDate {
        self.workout_date.with_timezone(&Local).date_naive()
    }

    /// Converts this entry to a scored entry using the e1RM estimate.
    pub fn to_scored(&self) -> ScoredEntry {
        ScoredEntry {
            date: self.calendar_day(),
            score: calculate_e1rm(self.weight_kg, self.reps),
        }
    }
}

/// A log entry reduced to its day and strength score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredEntry {
    pub date: NaiveDate,
    pub score: f64,
}

/// Accepts a weight as a JSON number or a decimal string. Infinities and NaN
/// are rejected.
pub fn deserialize_weight<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    let weight = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n,
        NumberOrString::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid weight value: {}", s)))?,
    };

    if !weight.is_finite() {
        return Err(de::Error::custom(format!("weight must be finite, got {}", weight)));
    }
    Ok(weight)
}

/// Optional variant of [`deserialize_weight`] for request bodies.
pub fn deserialize_optional_weight<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_weight")] f64);

    Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(v)| v))
}

/// Parses a workout date from an RFC 3339 timestamp or a bare `YYYY-MM-DD`.
///
/// A bare date is placed at local noon so it stays on the same calendar day
/// in every time zone offset the server may use.
pub fn parse_workout_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    local_noon(date)
}

/// Noon of a local calendar day, in UTC.
pub fn local_noon(date: NaiveDate) -> Option<DateTime<Utc>> {
    let noon = NaiveTime::from_hms_opt(12, 0, 0)?;
    Local
        .from_local_datetime(&date.and_time(noon))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_log_entry_weight_as_string() {
        let json = r#"{"workout_date": "2024-01-15T10:00:00Z", "weight_kg": "82.50", "reps": 5, "sets": 3}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.weight_kg, 82.5);
        assert_eq!(entry.reps, 5);
        assert_eq!(entry.sets, 3);
    }

    #[test]
    fn test_log_entry_weight_as_number() {
        let json = r#"{"workout_date": "2024-01-15T10:00:00Z", "weight_kg": 100, "reps": 1}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.weight_kg, 100.0);
        assert_eq!(entry.sets, 0);
    }

    #[test]
    fn test_log_entry_weight_invalid_string() {
        let json = r#"{"workout_date": "2024-01-15T10:00:00Z", "weight_kg": "heavy", "reps": 1}"#;
        assert!(serde_json::from_str::<LogEntry>(json).is_err());
    }

    #[test]
    fn test_log_entry_weight_rejects_non_finite() {
        for weight in ["\"inf\"", "\"-infinity\"", "\"NaN\"", "\"1e999\""] {
            let json = format!(
                r#"{{"workout_date": "2024-01-15T10:00:00Z", "weight_kg": {}, "reps": 1}}"#,
                weight
            );
            assert!(serde_json::from_str::<LogEntry>(&json).is_err(), "{}", weight);
        }
    }

    #[test]
    fn test_optional_weight() {
        #[derive(Deserialize)]
        struct Body {
            #[serde(default, deserialize_with = "deserialize_optional_weight")]
            weight_kg: Option<f64>,
        }

        let body: Body = serde_json::from_str(r#"{"weight_kg": "60"}"#).unwrap();
        assert_eq!(body.weight_kg, Some(60.0));
        let body: Body = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.weight_kg, None);
        let body: Body = serde_json::from_str(r#"{"weight_kg": null}"#).unwrap();
        assert_eq!(body.weight_kg, None);
    }

    #[test]
    fn test_scored_entry_uses_local_day() {
        let day = make_date(2024, 3, 10);
        let entry = LogEntry::new(local_noon(day).unwrap(), 100.0, 5, 3);
        let scored = entry.to_scored();
        assert_eq!(scored.date, day);
        assert!((scored.score - 116.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_parse_workout_date_rfc3339() {
        let ts = parse_workout_date("2024-05-01T12:00:00.000Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_parse_workout_date_plain_date() {
        let ts = parse_workout_date("2024-05-01").unwrap();
        assert_eq!(ts.with_timezone(&Local).date_naive(), make_date(2024, 5, 1));
    }

    #[test]
    fn test_parse_workout_date_invalid() {
        assert!(parse_workout_date("yesterday").is_none());
        assert!(parse_workout_date("").is_none());
    }
}
