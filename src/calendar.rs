// ============================================================================
// CALENDAR - Month grid and reflection statistics for the history view
// ============================================================================

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::{Framework, ReflectionRecord, find_framework};

/// Color for records whose framework is missing from the framework list.
pub const FALLBACK_COLOR: &str = "#9CA3AF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    fn offset(self, weekday: Weekday) -> i64 {
        match self {
            Self::Sunday => weekday.num_days_from_sunday() as i64,
            Self::Monday => weekday.num_days_from_monday() as i64,
        }
    }

    /// Two-letter column headers in grid order.
    pub fn headers(self) -> [&'static str; 7] {
        match self {
            Self::Sunday => ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"],
            Self::Monday => ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"],
        }
    }
}

/// One grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub records: Vec<ReflectionRecord>,
    /// Distinct framework ids in first-seen order.
    pub framework_ids: Vec<String>,
    /// Colors matching `framework_ids` index by index.
    pub colors: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkStat {
    pub count: usize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub total_reflections: usize,
    pub unique_dates: usize,
    pub average_per_day: f64,
    pub framework_breakdown: BTreeMap<String, FrameworkStat>,
    pub consecutive_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub week_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active_days: usize,
    pub dates: Vec<NaiveDate>,
    pub framework_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCalendarData {
    pub year: i32,
    pub month: u32,
    pub week_start: WeekStart,
    /// Whole weeks, row-major, `days.len() % 7 == 0`.
    pub days: Vec<CalendarDay>,
    pub monthly_stats: MonthlyStats,
    pub weekly_stats: Vec<WeeklyStats>,
}

impl MonthlyCalendarData {
    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn weeks(&self) -> std::slice::Chunks<'_, CalendarDay> {
        self.days.chunks(7)
    }
}

/// Build the month view with today's local date and Sunday-first weeks.
pub fn build_monthly_calendar(
    year: i32,
    month: u32,
    records: &[ReflectionRecord],
    frameworks: &[Framework],
) -> MonthlyCalendarData {
    build_monthly_calendar_at(
        year,
        month,
        records,
        frameworks,
        Local::now().date_naive(),
        WeekStart::Sunday,
    )
}

pub fn build_monthly_calendar_at(
    year: i32,
    month: u32,
    records: &[ReflectionRecord],
    frameworks: &[Framework],
    today: NaiveDate,
    week_start: WeekStart,
) -> MonthlyCalendarData {
    let consecutive_days = consecutive_days_until(records, today);

    let empty = || MonthlyCalendarData {
        year,
        month,
        week_start,
        days: Vec::new(),
        monthly_stats: MonthlyStats {
            consecutive_days,
            ..MonthlyStats::default()
        },
        weekly_stats: Vec::new(),
    };

    let Some((first, last)) = month_bounds(year, month) else {
        return empty();
    };
    // Padding weeks can fall outside chrono's date range at its edges.
    let grid_start = first.checked_sub_signed(Duration::days(week_start.offset(first.weekday())));
    let grid_end = last.checked_add_signed(Duration::days(6 - week_start.offset(last.weekday())));
    let (Some(grid_start), Some(grid_end)) = (grid_start, grid_end) else {
        return empty();
    };

    let mut by_date: HashMap<NaiveDate, Vec<&ReflectionRecord>> = HashMap::new();
    for record in records {
        if let Some(date) = record.parsed_date() {
            if date >= first && date <= last {
                by_date.entry(date).or_default().push(record);
            }
        }
    }

    let mut days = Vec::new();
    let mut date = grid_start;
    while date <= grid_end {
        let day_records: Vec<ReflectionRecord> = by_date
            .get(&date)
            .map(|list| list.iter().map(|r| (*r).clone()).collect())
            .unwrap_or_default();
        let framework_ids = distinct_framework_ids(&day_records);
        let colors = framework_ids
            .iter()
            .map(|id| framework_color(frameworks, id))
            .collect();

        days.push(CalendarDay {
            date,
            in_month: date.month() == month && date.year() == year,
            is_today: date == today,
            count: day_records.len(),
            records: day_records,
            framework_ids,
            colors,
        });

        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    let monthly_stats = monthly_stats(&days, frameworks, consecutive_days);
    let weekly_stats = weekly_stats(&days);

    MonthlyCalendarData {
        year,
        month,
        week_start,
        days,
        monthly_stats,
        weekly_stats,
    }
}

/// First and last day of the month, `None` for an invalid month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first.pred_opt()?))
}

/// Step a (year, month) pair by `delta` months.
///
/// Years past the `i32` range saturate.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year as i64 * 12 + month as i64 - 1 + delta as i64;
    let year = index.div_euclid(12).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    (year, index.rem_euclid(12) as u32 + 1)
}

pub fn framework_color(frameworks: &[Framework], id: &str) -> String {
    find_framework(frameworks, id)
        .map(|f| f.color.clone())
        .unwrap_or_else(|| FALLBACK_COLOR.to_string())
}

/// Days in a row with at least one record, walking back from `today`.
pub fn consecutive_days_until(records: &[ReflectionRecord], today: NaiveDate) -> u32 {
    let dates: HashSet<NaiveDate> = records.iter().filter_map(|r| r.parsed_date()).collect();
    let mut streak = 0u32;
    let mut day = today;
    while dates.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

fn distinct_framework_ids<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ReflectionRecord>,
{
    let mut ids: Vec<String> = Vec::new();
    for record in records {
        if !ids.contains(&record.framework_id) {
            ids.push(record.framework_id.clone());
        }
    }
    ids
}

fn monthly_stats(days: &[CalendarDay], frameworks: &[Framework], consecutive_days: u32) -> MonthlyStats {
    let month_days = days.iter().filter(|d| d.in_month);

    let mut total_reflections = 0;
    let mut unique_dates = 0;
    let mut framework_breakdown: BTreeMap<String, FrameworkStat> = BTreeMap::new();
    for day in month_days {
        total_reflections += day.count;
        if day.count > 0 {
            unique_dates += 1;
        }
        for record in &day.records {
            framework_breakdown
                .entry(record.framework_id.clone())
                .or_insert_with(|| FrameworkStat {
                    count: 0,
                    color: framework_color(frameworks, &record.framework_id),
                })
                .count += 1;
        }
    }

    let average_per_day = if unique_dates == 0 {
        0.0
    } else {
        (total_reflections as f64 / unique_dates as f64 * 100.0).round() / 100.0
    };

    MonthlyStats {
        total_reflections,
        unique_dates,
        average_per_day,
        framework_breakdown,
        consecutive_days,
    }
}

fn weekly_stats(days: &[CalendarDay]) -> Vec<WeeklyStats> {
    days.chunks(7)
        .enumerate()
        .filter_map(|(idx, week)| {
            let in_month: Vec<&CalendarDay> = week.iter().filter(|d| d.in_month).collect();
            let start_date = in_month.first()?.date;
            let end_date = in_month.last()?.date;
            let active: Vec<&CalendarDay> = in_month.iter().copied().filter(|d| d.count > 0).collect();

            Some(WeeklyStats {
                week_number: idx as u32 + 1,
                start_date,
                end_date,
                active_days: active.len(),
                dates: active.iter().map(|d| d.date).collect(),
                framework_ids: distinct_framework_ids(active.iter().flat_map(|d| d.records.iter())),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::builtin_frameworks;
    use chrono::Utc;

    fn record(id: &str, date: &str, framework_id: &str) -> ReflectionRecord {
        ReflectionRecord {
            id: id.to_string(),
            owner: "u1".to_string(),
            framework_id: framework_id.to_string(),
            content: HashMap::new(),
            date: date.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_grid_covers_whole_weeks_sunday_first() {
        // 2024-11-01 is a Friday, 2024-11-30 a Saturday.
        let data = build_monthly_calendar_at(2024, 11, &[], &[], ymd(2024, 11, 15), WeekStart::Sunday);
        assert_eq!(data.days.len() % 7, 0);
        assert_eq!(data.days.first().unwrap().date, ymd(2024, 10, 27));
        assert_eq!(data.days.last().unwrap().date, ymd(2024, 11, 30));
        assert_eq!(data.days.iter().filter(|d| d.in_month).count(), 30);
        assert!(data.day(ymd(2024, 11, 15)).unwrap().is_today);
    }

    #[test]
    fn test_grid_monday_first() {
        let data = build_monthly_calendar_at(2024, 11, &[], &[], ymd(2024, 11, 15), WeekStart::Monday);
        assert_eq!(data.days.first().unwrap().date, ymd(2024, 10, 28));
        assert_eq!(data.days.last().unwrap().date, ymd(2024, 12, 1));
    }

    #[test]
    fn test_counts_and_stats() {
        let frameworks = builtin_frameworks();
        let records = vec![
            record("1", "2024-11-05", "ywt"),
            record("2", "2024-11-05", "kpt"),
            record("3", "2024-11-10", "ywt"),
            record("4", "2024-10-31", "ywt"),
        ];
        let data = build_monthly_calendar_at(2024, 11, &records, &frameworks, ymd(2024, 11, 20), WeekStart::Sunday);

        let fifth = data.day(ymd(2024, 11, 5)).unwrap();
        assert_eq!(fifth.count, 2);
        assert_eq!(fifth.framework_ids, vec!["ywt", "kpt"]);
        assert_eq!(fifth.colors, vec!["#3B82F6", "#10B981"]);
        assert_eq!(data.day(ymd(2024, 11, 10)).unwrap().count, 1);
        // Padding days only carry records from the displayed month.
        assert_eq!(data.day(ymd(2024, 10, 31)).unwrap().count, 0);

        let stats = &data.monthly_stats;
        assert_eq!(stats.total_reflections, 3);
        assert_eq!(stats.unique_dates, 2);
        assert_eq!(stats.average_per_day, 1.5);
        assert_eq!(stats.framework_breakdown["ywt"].count, 2);
        assert_eq!(stats.framework_breakdown["kpt"].count, 1);

        let in_month_total: usize = data.days.iter().filter(|d| d.in_month).map(|d| d.count).sum();
        assert_eq!(in_month_total, stats.total_reflections);
    }

    #[test]
    fn test_average_rounds_to_two_decimals() {
        let records = vec![
            record("1", "2024-11-01", "ywt"),
            record("2", "2024-11-02", "ywt"),
            record("3", "2024-11-03", "ywt"),
            record("4", "2024-11-03", "ywt"),
        ];
        let data = build_monthly_calendar_at(2024, 11, &records, &[], ymd(2024, 12, 1), WeekStart::Sunday);
        assert_eq!(data.monthly_stats.average_per_day, 1.33);
    }

    #[test]
    fn test_unknown_framework_gets_fallback_color() {
        let data = build_monthly_calendar_at(
            2024,
            11,
            &[record("1", "2024-11-05", "retired")],
            &builtin_frameworks(),
            ymd(2024, 11, 5),
            WeekStart::Sunday,
        );
        assert_eq!(data.day(ymd(2024, 11, 5)).unwrap().colors, vec![FALLBACK_COLOR]);
        assert_eq!(data.monthly_stats.framework_breakdown["retired"].color, FALLBACK_COLOR);
    }

    #[test]
    fn test_malformed_dates_are_skipped() {
        let records = vec![record("1", "not-a-date", "ywt"), record("2", "2024-13-40", "ywt")];
        let data = build_monthly_calendar_at(2024, 11, &records, &[], ymd(2024, 11, 5), WeekStart::Sunday);
        assert_eq!(data.monthly_stats.total_reflections, 0);
    }

    #[test]
    fn test_empty_records_give_zero_stats() {
        let data = build_monthly_calendar_at(2024, 2, &[], &[], ymd(2024, 2, 10), WeekStart::Sunday);
        assert_eq!(data.monthly_stats, MonthlyStats::default());
        assert_eq!(data.monthly_stats.average_per_day, 0.0);
    }

    #[test]
    fn test_invalid_month_is_empty() {
        let data = build_monthly_calendar_at(2024, 13, &[record("1", "2024-11-05", "ywt")], &[], ymd(2024, 11, 5), WeekStart::Sunday);
        assert!(data.days.is_empty());
        assert_eq!(data.monthly_stats.total_reflections, 0);
        assert_eq!(data.monthly_stats.consecutive_days, 1);
    }

    #[test]
    fn test_streak_ends_today_across_months() {
        let records = vec![
            record("1", "2024-12-01", "ywt"),
            record("2", "2024-11-30", "kpt"),
            record("3", "2024-11-29", "ywt"),
            record("4", "2024-11-27", "ywt"),
        ];
        // Displaying October still reports the streak ending today.
        let data = build_monthly_calendar_at(2024, 10, &records, &[], ymd(2024, 12, 1), WeekStart::Sunday);
        assert_eq!(data.monthly_stats.consecutive_days, 3);
    }

    #[test]
    fn test_streak_resets_when_today_is_empty() {
        let records = vec![record("1", "2024-11-29", "ywt"), record("2", "2024-11-30", "ywt")];
        assert_eq!(consecutive_days_until(&records, ymd(2024, 12, 1)), 0);
        assert_eq!(consecutive_days_until(&records, ymd(2024, 11, 30)), 2);
    }

    #[test]
    fn test_weekly_stats() {
        let records = vec![
            record("1", "2024-11-01", "ywt"),
            record("2", "2024-11-04", "kpt"),
            record("3", "2024-11-05", "ywt"),
            record("4", "2024-11-05", "kpt"),
        ];
        let data = build_monthly_calendar_at(2024, 11, &records, &[], ymd(2024, 11, 5), WeekStart::Sunday);

        assert_eq!(data.weekly_stats.len(), 5);
        let first = &data.weekly_stats[0];
        assert_eq!(first.week_number, 1);
        assert_eq!(first.start_date, ymd(2024, 11, 1));
        assert_eq!(first.end_date, ymd(2024, 11, 2));
        assert_eq!(first.active_days, 1);

        let second = &data.weekly_stats[1];
        assert_eq!(second.start_date, ymd(2024, 11, 3));
        assert_eq!(second.dates, vec![ymd(2024, 11, 4), ymd(2024, 11, 5)]);
        assert_eq!(second.framework_ids, vec!["kpt", "ywt"]);
    }

    #[test]
    fn test_shift_month_wraps_years() {
        assert_eq!(shift_month(2024, 1, -1), (2023, 12));
        assert_eq!(shift_month(2024, 12, 1), (2025, 1));
        assert_eq!(shift_month(2024, 6, 0), (2024, 6));
    }

    #[test]
    fn test_shift_month_saturates_at_year_limits() {
        assert_eq!(shift_month(i32::MAX, 12, 1), (i32::MAX, 1));
        assert_eq!(shift_month(i32::MIN, 1, -1), (i32::MIN, 12));
    }

    #[test]
    fn test_months_at_chrono_limits_do_not_panic() {
        let today = ymd(2024, 11, 5);
        let earliest = build_monthly_calendar_at(-262143, 1, &[], &[], today, WeekStart::Sunday);
        assert!(earliest.days.len() % 7 == 0);
        assert_eq!(earliest.monthly_stats, MonthlyStats::default());

        for month in [11, 12] {
            let latest = build_monthly_calendar_at(262142, month, &[], &[], today, WeekStart::Monday);
            assert!(latest.days.len() % 7 == 0);
            assert_eq!(latest.monthly_stats.total_reflections, 0);
        }
    }
}
