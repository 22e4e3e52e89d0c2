//! Progress chart reconstruction from irregular workout logs.
//!
//! Logs are scored with the e1RM estimate, placed onto a fixed calendar grid
//! ending today (one bucket per day, keeping the day's best score), and
//! compared against an ideal trend anchored at the first populated day.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::domain::LogEntry;
use crate::error::InvalidWindow;
use crate::formulas::ideal_trend_value;
use crate::standards::{RankTier, StandardsTable};

/// Chart window lengths offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    #[default]
    Week,
    Month,
    Quarter,
}

impl Window {
    /// Number of daily buckets in the window.
    pub fn days(self) -> usize {
        match self {
            Window::Week => 7,
            Window::Month => 30,
            Window::Quarter => 90,
        }
    }
}

impl TryFrom<u32> for Window {
    type Error = InvalidWindow;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(Window::Week),
            30 => Ok(Window::Month),
            90 => Ok(Window::Quarter),
            other => Err(InvalidWindow(other)),
        }
    }
}

/// Best-score-per-day series over a window, oldest day first.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedSeries {
    pub dates: Vec<NaiveDate>,
    pub labels: Vec<String>,
    pub buckets: Vec<Option<f64>>,
    /// Logs dated before the first day of the window.
    pub dropped_before_window: usize,
    /// Logs dated after today.
    pub dropped_future: usize,
}

impl BucketedSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Index and score of the first populated bucket.
    pub fn first_populated(&self) -> Option<(usize, f64)> {
        self.buckets
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.map(|score| (i, score)))
    }

    /// Number of days with at least one log.
    #[cfg(test)]
    pub fn populated_count(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }
}

/// Merges a candidate score into a day's bucket.
///
/// The candidate wins only when the bucket is empty or the candidate is
/// strictly greater; on a tie the existing score stays.
pub fn merge_best(existing: Option<f64>, candidate: f64) -> f64 {
    match existing {
        Some(current) if candidate > current => candidate,
        Some(current) => current,
        None => candidate,
    }
}

/// Calendar days of the window ending at `today`, oldest first.
pub fn window_dates(window: Window, today: NaiveDate) -> Vec<NaiveDate> {
    let days = window.days() as i64;
    (0..days)
        .map(|i| today - Duration::days(days - 1 - i))
        .collect()
}

/// Short human-readable label for a day, e.g. "Oct 7".
pub fn day_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Places scored logs onto a daily grid of `window` days ending at `today`.
///
/// Each bucket keeps the best e1RM of that day. Logs before the window or
/// after today are counted but otherwise ignored.
pub fn bucketize(logs: &[LogEntry], window: Window, today: NaiveDate) -> BucketedSeries {
    let days = window.days();
    let dates = window_dates(window, today);
    let labels = dates.iter().map(|d| day_label(*d)).collect();
    let mut buckets: Vec<Option<f64>> = vec![None; days];
    let mut dropped_before_window = 0;
    let mut dropped_future = 0;

    for log in logs {
        let scored = log.to_scored();
        let days_ago = (today - scored.date).num_days();

        if days_ago < 0 {
            dropped_future += 1;
            continue;
        }
        if days_ago >= days as i64 {
            dropped_before_window += 1;
            continue;
        }

        let index = days - 1 - days_ago as usize;
        buckets[index] = Some(merge_best(buckets[index], scored.score));
    }

    BucketedSeries {
        dates,
        labels,
        buckets,
        dropped_before_window,
        dropped_future,
    }
}

/// Reference growth curve anchored at the first populated bucket.
///
/// Entries before the anchor are `None`. If nothing is populated the whole
/// curve is `None`.
pub fn ideal_trend(series: &BucketedSeries) -> Vec<Option<f64>> {
    let mut trend = vec![None; series.len()];

    if let Some((anchor, anchor_score)) = series.first_populated() {
        for (i, slot) in trend.iter_mut().enumerate().skip(anchor) {
            *slot = Some(ideal_trend_value(anchor_score, i - anchor));
        }
    }

    trend
}

/// Heaviest weight ever logged, regardless of reps.
pub fn best_lifetime_weight(logs: &[LogEntry]) -> Option<f64> {
    logs.iter().map(|l| l.weight_kg).reduce(f64::max)
}

// === Chart Payload ===

#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub label: &'static str,
    pub data: Vec<Option<f64>>,
}

/// Chart data for one exercise, ready for a line chart.
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub exercise: String,
    pub days: usize,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub rank: Option<RankTier>,
    pub best_weight_kg: Option<f64>,
    pub logs_outside_window: usize,
}

/// Builds the chart payload and rank badge for an exercise's full history.
pub fn build_chart(
    exercise_name: &str,
    logs: &[LogEntry],
    window: Window,
    today: NaiveDate,
    standards: &StandardsTable,
) -> ChartData {
    let series = bucketize(logs, window, today);
    let trend = ideal_trend(&series);
    let best_weight_kg = best_lifetime_weight(logs);
    let rank = best_weight_kg.and_then(|w| standards.get_rank(exercise_name, w));
    let logs_outside_window = series.dropped_before_window + series.dropped_future;

    ChartData {
        exercise: exercise_name.to_string(),
        days: window.days(),
        labels: series.labels,
        datasets: vec![
            Dataset {
                label: "Strength Score",
                data: series.buckets,
            },
            Dataset {
                label: "Ideal Trend",
                data: trend,
            },
        ],
        rank,
        best_weight_kg,
        logs_outside_window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::local_noon;
    use chrono::{DateTime, Local, TimeZone, Utc};

    fn make_date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn today() -> NaiveDate {
        make_date(2024, 6, 15)
    }

    fn log_days_ago(days_ago: i64, weight_kg: f64, reps: u32) -> LogEntry {
        let date = today() - Duration::days(days_ago);
        LogEntry::new(local_noon(date).unwrap(), weight_kg, reps, 3)
    }

    fn local_at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        let naive = date.and_hms_opt(hour, minute, 0).unwrap();
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_window_from_days() {
        assert_eq!(Window::try_from(7), Ok(Window::Week));
        assert_eq!(Window::try_from(30), Ok(Window::Month));
        assert_eq!(Window::try_from(90), Ok(Window::Quarter));
        assert_eq!(Window::try_from(14), Err(InvalidWindow(14)));
        assert_eq!(Window::default().days(), 7);
    }

    #[test]
    fn test_merge_best_empty_bucket_takes_candidate() {
        assert_eq!(merge_best(None, 80.0), 80.0);
    }

    #[test]
    fn test_merge_best_keeps_higher() {
        assert_eq!(merge_best(Some(120.0), 116.0), 120.0);
        assert_eq!(merge_best(Some(116.0), 120.0), 120.0);
    }

    #[test]
    fn test_merge_best_tie_keeps_existing() {
        let existing = 100.0_f64;
        let merged = merge_best(Some(existing), 100.0);
        assert_eq!(merged.to_bits(), existing.to_bits());
    }

    #[test]
    fn test_empty_logs_give_empty_series() {
        for window in [Window::Week, Window::Month, Window::Quarter] {
            let series = bucketize(&[], window, today());
            assert_eq!(series.len(), window.days());
            assert_eq!(series.labels.len(), window.days());
            assert!(series.buckets.iter().all(Option::is_none));
            assert!(ideal_trend(&series).iter().all(Option::is_none));
        }
    }

    #[test]
    fn test_same_day_keeps_best_score() {
        let logs = vec![log_days_ago(0, 100.0, 5), log_days_ago(0, 90.0, 10)];
        let series = bucketize(&logs, Window::Week, today());

        assert_eq!(series.populated_count(), 1);
        let today_score = series.buckets[6].unwrap();
        assert!(approx_eq(today_score, 120.0, 1e-9));
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        // With any non-zero offset one of these sits on a different UTC date
        let day = today() - Duration::days(1);
        let logs = vec![
            LogEntry::new(local_at(day, 0, 5), 100.0, 1, 1),
            LogEntry::new(local_at(day, 23, 55), 110.0, 1, 1),
        ];
        let series = bucketize(&logs, Window::Week, today());

        assert_eq!(series.populated_count(), 1);
        assert!(approx_eq(series.buckets[5].unwrap(), 110.0 * (1.0 + 1.0 / 30.0), 1e-9));
        assert!(series.buckets[6].is_none());
        assert_eq!(series.dropped_future, 0);
    }

    #[test]
    fn test_best_score_not_average_or_sum() {
        let logs = vec![
            log_days_ago(2, 60.0, 1),
            log_days_ago(2, 70.0, 1),
            log_days_ago(2, 50.0, 1),
        ];
        let series = bucketize(&logs, Window::Week, today());
        assert!(approx_eq(series.buckets[4].unwrap(), 70.0 * (1.0 + 1.0 / 30.0), 1e-9));
    }

    #[test]
    fn test_log_outside_window_dropped() {
        let logs = vec![log_days_ago(10, 50.0, 5)];
        let series = bucketize(&logs, Window::Week, today());

        assert!(series.buckets.iter().all(Option::is_none));
        assert_eq!(series.dropped_before_window, 1);
        assert_eq!(bucketize(&logs, Window::Week, today()), series);
    }

    #[test]
    fn test_window_edges() {
        // 6 days ago is the oldest bucket of a week, 7 days ago falls outside
        let logs = vec![log_days_ago(6, 100.0, 1), log_days_ago(7, 100.0, 1)];
        let series = bucketize(&logs, Window::Week, today());

        assert!(series.buckets[0].is_some());
        assert_eq!(series.populated_count(), 1);
        assert_eq!(series.dropped_before_window, 1);
    }

    #[test]
    fn test_future_logs_dropped() {
        let logs = vec![log_days_ago(-1, 100.0, 5)];
        let series = bucketize(&logs, Window::Week, today());

        assert!(series.buckets.iter().all(Option::is_none));
        assert_eq!(series.dropped_future, 1);
    }

    #[test]
    fn test_longer_window_includes_older_logs() {
        let logs = vec![log_days_ago(10, 50.0, 5), log_days_ago(45, 40.0, 5)];

        let month = bucketize(&logs, Window::Month, today());
        assert_eq!(month.populated_count(), 1);
        assert!(month.buckets[19].is_some());

        let quarter = bucketize(&logs, Window::Quarter, today());
        assert_eq!(quarter.populated_count(), 2);
        assert!(quarter.buckets[44].is_some());
        assert!(quarter.buckets[79].is_some());
    }

    #[test]
    fn test_unsorted_logs_same_result() {
        let mut logs = vec![
            log_days_ago(1, 80.0, 8),
            log_days_ago(3, 85.0, 5),
            log_days_ago(1, 82.5, 6),
        ];
        let forward = bucketize(&logs, Window::Week, today());
        logs.reverse();
        let reversed = bucketize(&logs, Window::Week, today());
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_bucketize_is_deterministic() {
        let logs = vec![
            log_days_ago(0, 100.0, 5),
            log_days_ago(4, 97.5, 3),
            log_days_ago(5, 95.0, 8),
        ];
        let a = bucketize(&logs, Window::Month, today());
        let b = bucketize(&logs, Window::Month, today());

        let bits = |s: &BucketedSeries| -> Vec<Option<u64>> {
            s.buckets.iter().map(|b| b.map(f64::to_bits)).collect()
        };
        assert_eq!(bits(&a), bits(&b));
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn test_labels_oldest_first() {
        let series = bucketize(&[], Window::Week, today());
        assert_eq!(series.labels.first().unwrap(), "Jun 9");
        assert_eq!(series.labels.last().unwrap(), "Jun 15");
        assert_eq!(series.dates.last(), Some(&today()));
    }

    #[test]
    fn test_labels_cross_month() {
        let series = bucketize(&[], Window::Week, make_date(2024, 3, 2));
        assert_eq!(series.labels[0], "Feb 25");
        assert_eq!(series.labels[4], "Feb 29");
        assert_eq!(series.labels[6], "Mar 2");
    }

    #[test]
    fn test_ideal_trend_before_anchor_is_none() {
        let logs = vec![log_days_ago(3, 100.0, 0)];
        let series = bucketize(&logs, Window::Week, today());
        let trend = ideal_trend(&series);

        assert_eq!(trend.len(), 7);
        assert!(trend[..3].iter().all(Option::is_none));
        assert_eq!(trend[3], Some(100.0));
        assert!(approx_eq(trend[6].unwrap(), 100.0 * (1.0 + 0.0035 * 3.0), 1e-9));
    }

    #[test]
    fn test_ideal_trend_one_week_after_anchor() {
        let logs = vec![log_days_ago(29, 100.0, 0), log_days_ago(22, 90.0, 0)];
        let series = bucketize(&logs, Window::Month, today());
        let trend = ideal_trend(&series);

        let (anchor, score) = series.first_populated().unwrap();
        assert_eq!(anchor, 0);
        assert_eq!(score, 100.0);
        assert!(approx_eq(trend[anchor + 7].unwrap(), 102.45, 1e-9));
    }

    #[test]
    fn test_ideal_trend_ignores_later_scores() {
        let logs = vec![log_days_ago(6, 100.0, 0), log_days_ago(0, 50.0, 0)];
        let series = bucketize(&logs, Window::Week, today());
        let trend = ideal_trend(&series);
        assert!(approx_eq(trend[6].unwrap(), 100.0 * (1.0 + 0.0035 * 6.0), 1e-9));
    }

    #[test]
    fn test_best_lifetime_weight() {
        let logs = vec![
            log_days_ago(200, 140.0, 1),
            log_days_ago(1, 120.0, 8),
        ];
        assert_eq!(best_lifetime_weight(&logs), Some(140.0));
        assert_eq!(best_lifetime_weight(&[]), None);
    }

    #[test]
    fn test_build_chart_with_rank() {
        let standards = StandardsTable::builtin().unwrap();
        let logs = vec![
            log_days_ago(120, 92.5, 1),
            log_days_ago(2, 80.0, 8),
            log_days_ago(0, 85.0, 5),
        ];

        let chart = build_chart("Barbell Bench Press", &logs, Window::Week, today(), &standards);

        assert_eq!(chart.days, 7);
        assert_eq!(chart.labels.len(), 7);
        assert_eq!(chart.datasets.len(), 2);
        assert_eq!(chart.datasets[0].label, "Strength Score");
        assert_eq!(chart.datasets[1].label, "Ideal Trend");
        assert_eq!(chart.rank, Some(RankTier::Gold));
        assert_eq!(chart.best_weight_kg, Some(92.5));
        assert_eq!(chart.logs_outside_window, 1);
    }

    #[test]
    fn test_build_chart_without_standards() {
        let standards = StandardsTable::builtin().unwrap();
        let logs = vec![log_days_ago(0, 20.0, 10)];
        let chart = build_chart("Plank", &logs, Window::Week, today(), &standards);
        assert_eq!(chart.rank, None);
    }

    #[test]
    fn test_build_chart_no_logs() {
        let standards = StandardsTable::builtin().unwrap();
        let chart = build_chart("Deadlift", &[], Window::Quarter, today(), &standards);
        assert_eq!(chart.rank, None);
        assert_eq!(chart.best_weight_kg, None);
        assert_eq!(chart.labels.len(), 90);
    }

    #[test]
    fn test_chart_serializes_gaps_as_null() {
        let standards = StandardsTable::builtin().unwrap();
        let logs = vec![log_days_ago(0, 100.0, 0)];
        let chart = build_chart("Deadlift", &logs, Window::Week, today(), &standards);
        let json = serde_json::to_value(&chart).unwrap();

        assert!(json["datasets"][0]["data"][0].is_null());
        assert_eq!(json["datasets"][0]["data"][6], 100.0);
        assert_eq!(json["rank"], "Bronze");
    }
}
