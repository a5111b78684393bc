use chrono::NaiveDate;
use furikaeri::calendar::{WeekStart, build_monthly_calendar_at};
use furikaeri::journal::{Draft, Journal, SaveFailed};
use furikaeri::models::DATE_FORMAT;
use furikaeri::store::{FileStore, ReflectionStore};
use tempfile::tempdir;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_save_edit_and_reload_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reflections.bin");
    let date = ymd(2024, 11, 5);

    let mut store = FileStore::open(&path).unwrap();
    let mut journal = Journal::load(&store, "user-ann").unwrap();
    let ywt = journal.framework("ywt").cloned().unwrap();

    let mut draft = Draft::new(&ywt, date);
    draft.values.insert("y".into(), "  shipped the parser\r\n".into());
    draft.values.insert("w".into(), "small commits help".into());
    let saved = journal.save(&mut store, &draft).unwrap();
    assert!(saved.created);
    assert_eq!(saved.record.content["y"], "shipped the parser");
    assert_eq!(saved.record.date, date.format(DATE_FORMAT).to_string());

    let mut edit = Draft::from_record(&saved.record, date);
    edit.values.insert("t".into(), "write more tests".into());
    let updated = journal.save(&mut store, &edit).unwrap();
    assert!(!updated.created);
    assert_eq!(updated.record.id, saved.record.id);

    drop(store);
    let store = FileStore::open(&path).unwrap();
    let records = store.list_records("user-ann").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content["t"], "write more tests");
    assert!(store.list_records("someone-else").unwrap().is_empty());

    let data = build_monthly_calendar_at(2024, 11, &records, &store.list_frameworks().unwrap(), date, WeekStart::Sunday);
    assert_eq!(data.monthly_stats.total_reflections, 1);
    assert_eq!(data.monthly_stats.consecutive_days, 1);
    assert_eq!(data.day(date).map(|d| d.colors.clone()), Some(vec!["#3B82F6".to_string()]));
}

#[test]
fn test_invalid_draft_is_not_persisted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reflections.bin");

    let mut store = FileStore::open(&path).unwrap();
    let mut journal = Journal::load(&store, "user-ann").unwrap();
    let kpt = journal.framework("kpt").cloned().unwrap();

    let mut draft = Draft::new(&kpt, ymd(2024, 11, 6));
    draft.values.insert("keep".into(), "<b>bold</b>".into());

    match journal.save(&mut store, &draft) {
        Err(SaveFailed::Invalid(result)) => assert!(!result.is_valid),
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(draft.values["keep"], "<b>bold</b>");
    assert!(journal.records().is_empty());
    assert!(store.list_records("user-ann").unwrap().is_empty());
}
