use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Utc};
use furikaeri::calendar::{MonthlyStats, WeekStart, build_monthly_calendar, build_monthly_calendar_at};
use furikaeri::models::{ReflectionRecord, builtin_frameworks};

fn record(id: usize, date: &str, framework_id: &str) -> ReflectionRecord {
    ReflectionRecord {
        id: format!("r{id}"),
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
fn test_november_scenario() {
    let records = vec![
        record(1, "2024-11-05", "ywt"),
        record(2, "2024-11-05", "kpt"),
        record(3, "2024-11-10", "ywt"),
    ];
    let data = build_monthly_calendar(2024, 11, &records, &builtin_frameworks());

    assert_eq!(data.day(ymd(2024, 11, 5)).map(|d| d.count), Some(2));
    assert_eq!(data.day(ymd(2024, 11, 10)).map(|d| d.count), Some(1));
    assert_eq!(data.monthly_stats.unique_dates, 2);
    assert_eq!(data.monthly_stats.total_reflections, 3);
    assert_eq!(data.monthly_stats.average_per_day, 1.5);
}

#[test]
fn test_empty_records_any_month() {
    for (year, month) in [(2024, 1), (2024, 2), (1999, 12), (2031, 7)] {
        let data = build_monthly_calendar(year, month, &[], &builtin_frameworks());
        assert_eq!(data.monthly_stats, MonthlyStats::default());
        assert_eq!(data.monthly_stats.average_per_day, 0.0);
        assert!(data.days.len() % 7 == 0);
    }
}

#[test]
fn test_month_day_counts_sum_to_total() {
    let frameworks = builtin_frameworks();
    let ids = ["ywt", "kpt", "4ls", "retired"];
    // Deterministic spread across three months, with repeats and junk dates.
    let mut records = Vec::new();
    let mut seed: u32 = 7;
    for i in 0..200 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let month = 10 + (seed >> 8) % 3;
        let day = 1 + (seed >> 12) % 30;
        let date = if i % 17 == 0 {
            "not-a-date".to_string()
        } else {
            format!("2024-{month:02}-{day:02}")
        };
        records.push(record(i, &date, ids[(seed >> 4) as usize % ids.len()]));
    }

    for week_start in [WeekStart::Sunday, WeekStart::Monday] {
        let data = build_monthly_calendar_at(2024, 11, &records, &frameworks, ymd(2024, 11, 30), week_start);
        let in_month: usize = data
            .days
            .iter()
            .filter(|d| d.date.month() == 11 && d.date.year() == 2024)
            .map(|d| d.count)
            .sum();
        assert_eq!(in_month, data.monthly_stats.total_reflections);
        let breakdown: usize = data.monthly_stats.framework_breakdown.values().map(|s| s.count).sum();
        assert_eq!(breakdown, data.monthly_stats.total_reflections);
    }
}

#[test]
fn test_streak_resets_when_today_has_no_record() {
    let records = vec![
        record(1, "2024-11-03", "ywt"),
        record(2, "2024-11-04", "ywt"),
        record(3, "2024-11-05", "ywt"),
    ];
    let frameworks = builtin_frameworks();

    let on_streak = build_monthly_calendar_at(2024, 11, &records, &frameworks, ymd(2024, 11, 5), WeekStart::Sunday);
    assert_eq!(on_streak.monthly_stats.consecutive_days, 3);

    let next_day = build_monthly_calendar_at(2024, 11, &records, &frameworks, ymd(2024, 11, 6), WeekStart::Sunday);
    assert_eq!(next_day.monthly_stats.consecutive_days, 0);
}
