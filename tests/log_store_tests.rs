use outreachbot::history::HistoryStore;
use outreachbot::outreach_log::{LogEntry, LogStatus, OutreachLog};

#[test]
fn processed_flips_only_after_record() {
    let dir = tempfile::tempdir().unwrap();
    let log = OutreachLog::new(&dir.path().join("outreach_log.csv"));

    assert!(!log.already_processed("https://acme.test"));

    log.record(&LogEntry::new(
        "https://acme.test",
        "info@acme.test",
        "Quick question about acme.test",
        LogStatus::SentSuccessfully,
    ))
    .unwrap();

    assert!(log.already_processed("https://acme.test"));
    assert!(!log.already_processed("https://acme.test/other"));
}

#[test]
fn crash_before_rename_leaves_original_intact() {
    let dir = tempfile::tempdir().unwrap();
    let log = OutreachLog::new(&dir.path().join("outreach_log.csv"));

    log.record(&LogEntry::new("https://a.test", "", "", LogStatus::NoEmail))
        .unwrap();

    // A crash between the copy and the rename leaves a stale temp file
    let temp = log.path().with_extension("csv.tmp");
    std::fs::write(&temp, "half-written garbage").unwrap();

    assert!(log.already_processed("https://a.test"));
    assert_eq!(log.entries().len(), 1);

    // The next record still succeeds and replaces the stale temp
    log.record(&LogEntry::new("https://b.test", "", "", LogStatus::FetchFailed))
        .unwrap();
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn log_rows_carry_all_columns() {
    let dir = tempfile::tempdir().unwrap();
    let log = OutreachLog::new(&dir.path().join("outreach_log.csv"));

    log.record(&LogEntry::new(
        "https://acme.test",
        "info@acme.test",
        "Subject line",
        LogStatus::SendFailed,
    ))
    .unwrap();

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert!(!entry.timestamp.is_empty());
    assert_eq!(entry.url, "https://acme.test");
    assert_eq!(entry.contact, "info@acme.test");
    assert_eq!(entry.subject, "Subject line");
    assert_eq!(entry.status, "send_failed");
}

#[test]
fn history_appends_and_recalls_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(&dir.path().join("history.json"));

    store
        .append_run("3 leads for 'plumber' in 'Austin, TX'", serde_json::json!({"sent": 2}))
        .unwrap();
    store
        .append_run("5 leads from leads.txt", serde_json::json!({"sent": 4}))
        .unwrap();

    let runs = store.last_runs(1);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].summary, "5 leads from leads.txt");
}

#[test]
fn history_survives_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(&dir.path().join("history.json"));

    std::fs::write(store.path(), "][ not json at all").unwrap();
    assert!(store.last_runs(3).is_empty());

    store.append_run("fresh start", serde_json::Value::Null).unwrap();
    assert_eq!(store.last_runs(3).len(), 1);
}
