//! Change history for pattern mutations.

use std::io::Write;
use std::sync::{Arc, Mutex};

use parlance::patterns::audit::content_hash;
use parlance::patterns::{ChangeLog, ChangeRecord, PatternStore, PatternUpdate, PriorityOrder};

/// Shared in-memory writer so the test can read what the log wrote.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().expect("lock").clone()).expect("utf8")
    }
}

fn disable() -> PatternUpdate {
    PatternUpdate {
        enabled: Some(false),
        ..PatternUpdate::default()
    }
}

#[test]
fn update_appends_change_record_with_content_hashes() {
    let store = PatternStore::with_defaults().expect("builtin");
    let before = store.get("query", "weather").expect("weather");

    let record = store
        .update("query", "weather", &disable(), "alice", "flaky")
        .expect("update");
    let after = store.get("query", "weather").expect("weather");

    assert_eq!(record.group, "query");
    assert_eq!(record.name, "weather");
    assert_eq!(record.user, "alice");
    assert_eq!(record.reason, "flaky");
    assert_eq!(record.fields, vec!["enabled"]);
    assert_eq!(record.before_hash, content_hash(&before));
    assert_eq!(record.after_hash, content_hash(&after));
    assert!(!record.is_noop());
    assert_eq!(record.before_hash.len(), 64);
}

#[test]
fn history_filters_by_pattern_in_order() {
    let store = PatternStore::with_defaults().expect("builtin");
    store
        .update("query", "weather", &disable(), "a", "1")
        .expect("update");
    store
        .update("action", "lock", &disable(), "b", "2")
        .expect("update");
    let reenable = PatternUpdate {
        enabled: Some(true),
        ..PatternUpdate::default()
    };
    store
        .update("query", "weather", &reenable, "c", "3")
        .expect("update");

    assert_eq!(store.history(None).len(), 3);
    let weather: Vec<String> = store
        .history(Some(("query", "weather")))
        .into_iter()
        .map(|r| r.reason)
        .collect();
    assert_eq!(weather, vec!["1", "3"]);

    let records = store.history(Some(("query", "weather")));
    assert_eq!(records[0].after_hash, records[1].before_hash);
    assert_eq!(records[0].before_hash, records[1].after_hash);
}

#[test]
fn identical_update_is_a_noop_record() {
    let store = PatternStore::with_defaults().expect("builtin");
    let keep = PatternUpdate {
        enabled: Some(true),
        ..PatternUpdate::default()
    };
    let record = store
        .update("gesture", "thanks", &keep, "ops", "touch")
        .expect("update");
    assert!(record.is_noop());
}

#[test]
fn sink_receives_one_json_line_per_change() {
    let buf = SharedBuf::default();
    let store = PatternStore::with_priority(
        PriorityOrder::default(),
        ChangeLog::with_sink(Box::new(buf.clone())),
    );
    store
        .load(&parlance::patterns::PatternDocument::builtin().expect("builtin"))
        .expect("load");
    store
        .update("memory", "store", &disable(), "ops", "migrating")
        .expect("update");
    store
        .update("memory", "recall", &disable(), "ops", "migrating")
        .expect("update");

    let contents = buf.contents();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    let parsed: ChangeRecord = serde_json::from_str(lines[1]).expect("json line");
    assert_eq!(parsed.name, "recall");
    assert_eq!(parsed, store.history(None)[1]);
}

#[test]
fn change_log_counts() {
    let log = ChangeLog::new();
    assert!(log.is_empty());
    assert_eq!(log.len(), 0);
}
