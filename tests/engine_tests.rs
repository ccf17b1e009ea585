use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use autosense::clock::ManualClock;
use autosense::config::Config;
use autosense::engine::{DetectionStatus, DomainLoadOutcome, Engine, Navigation, RejectReason};
use autosense::error::{Error, Result};
use autosense::model::{Category, Event, EventType};
use autosense::store::{keys, KeyValueStore, MemoryStore, SqliteStore};
use autosense::TabOpener;

const START: i64 = 1_700_000_000_000;

/// Opener that records every url and fails for domains containing "broken"
#[derive(Clone, Default)]
struct RecordingOpener {
    opened: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<Vec<i64>>>,
    next_id: Arc<AtomicI64>,
}

impl RecordingOpener {
    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl TabOpener for RecordingOpener {
    fn open(&self, url: &str) -> Result<i64> {
        if url.contains("broken") {
            return Err(Error::Opener(format!("cannot open {}", url)));
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(100 + self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn close(&self, tab_id: i64) -> Result<()> {
        self.closed.lock().unwrap().push(tab_id);
        Ok(())
    }
}

/// In-memory store whose writes to one chosen key can be made to fail
#[derive(Clone, Default)]
struct FailingStore {
    inner: Arc<MemoryStore>,
    failing_key: Arc<Mutex<Option<&'static str>>>,
}

impl FailingStore {
    fn fail_on(&self, key: Option<&'static str>) {
        *self.failing_key.lock().unwrap() = key;
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get(key)
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        if *self.failing_key.lock().unwrap() == Some(key) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.save(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    fn size_in_bytes(&self) -> Result<u64> {
        self.inner.size_in_bytes()
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.execution.stagger_ms = 0;
    config
}

fn engine_with(config: Config) -> (Engine, RecordingOpener, ManualClock) {
    let opener = RecordingOpener::default();
    let clock = ManualClock::new(START);
    let engine = Engine::with_clock(
        config,
        Box::new(MemoryStore::new()),
        Box::new(opener.clone()),
        Box::new(clock.clone()),
    )
    .unwrap();
    (engine, opener, clock)
}

fn engine() -> (Engine, RecordingOpener, ManualClock) {
    engine_with(test_config())
}

/// Append navigations five seconds apart, starting at `start`
fn record_domains(engine: &Engine, domains: &[&str], start: i64) {
    for (i, domain) in domains.iter().enumerate() {
        let event = Event::new(EventType::TabUpdated, *domain, start + i as i64 * 5_000);
        engine.record_and_maybe_detect(event).unwrap();
    }
}

fn nav(url: &str, tab_id: i64) -> Navigation {
    Navigation {
        event_type: EventType::TabUpdated,
        url: url.to_string(),
        tab_id,
        title: String::new(),
    }
}

#[tokio::test]
async fn test_too_few_events_detects_nothing() {
    let (engine, _, _) = engine();
    record_domains(&engine, &["a.com", "b.com", "a.com", "b.com", "a.com"], START);

    let outcome = engine.detect_patterns().await.unwrap();
    assert_eq!(outcome.status, DetectionStatus::NotEnoughEvents);
    assert!(outcome.patterns_to_save.is_empty());
    assert!(engine.patterns().unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_pair_becomes_pattern() {
    let (engine, _, _) = engine();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );

    let outcome = engine.detect_patterns().await.unwrap();
    assert_eq!(outcome.status, DetectionStatus::Completed);
    assert_eq!(outcome.patterns_to_save.len(), 1);

    let pattern = &outcome.patterns_to_save[0];
    assert_eq!(pattern.signature, "a.com → b.com");
    assert_eq!(pattern.occurrences, 3);
    assert!((pattern.confidence - 0.3).abs() < 1e-9);
    assert_eq!(pattern.suggested_automation.trigger.domain, "a.com");
    assert_eq!(pattern.suggested_automation.actions[0].domain, "b.com");
    assert!(!pattern.is_multi_tab);

    assert_eq!(outcome.patterns_by_trigger["a.com"].len(), 1);
    assert_eq!(engine.patterns().unwrap().len(), 1);

    // Same log again: already shown
    let again = engine.detect_patterns().await.unwrap();
    assert!(again.patterns_to_save.is_empty());
}

#[tokio::test]
async fn test_reverse_of_new_pattern_is_suppressed_in_same_pass() {
    let (engine, _, _) = engine();
    record_domains(
        &engine,
        &["b.com", "a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );

    let outcome = engine.detect_patterns().await.unwrap();
    let signatures: Vec<_> = outcome
        .patterns_to_save
        .iter()
        .map(|p| p.signature.as_str())
        .collect();
    assert_eq!(signatures, vec!["b.com → a.com"]);
}

#[tokio::test]
async fn test_concurrent_detection_passes_store_pattern_once() {
    let (engine, _, _) = engine();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );

    let (first, second) = tokio::join!(engine.detect_patterns(), engine.detect_patterns());
    let outcomes = [first.unwrap(), second.unwrap()];

    let with_patterns = outcomes
        .iter()
        .filter(|o| !o.patterns_to_save.is_empty())
        .count();
    assert_eq!(with_patterns, 1);
    assert_eq!(engine.patterns().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_suppression_write_does_not_duplicate_pattern() {
    let store = FailingStore::default();
    let engine = Engine::with_clock(
        test_config(),
        Box::new(store.clone()),
        Box::new(RecordingOpener::default()),
        Box::new(ManualClock::new(START)),
    )
    .unwrap();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );

    store.fail_on(Some(keys::SHOWN_PATTERNS));
    assert!(matches!(engine.detect_patterns().await, Err(Error::Io(_))));
    assert!(engine.patterns().unwrap().is_empty());

    store.fail_on(None);
    assert_eq!(engine.detect_patterns().await.unwrap().patterns_to_save.len(), 1);
    assert!(engine.detect_patterns().await.unwrap().patterns_to_save.is_empty());
    assert_eq!(engine.patterns().unwrap().len(), 1);
}

#[tokio::test]
async fn test_recorded_domains_are_normalized() {
    let (engine, _, _) = engine();
    record_domains(
        &engine,
        &["WWW.A.com", "b.com", "a.com", "www.b.com", "a.com", "B.com"],
        START,
    );
    assert_eq!(engine.events().unwrap()[0].domain, "a.com");

    let outcome = engine.detect_patterns().await.unwrap();
    assert_eq!(outcome.patterns_to_save.len(), 1);
    assert_eq!(outcome.patterns_to_save[0].signature, "a.com → b.com");
    assert_eq!(outcome.patterns_to_save[0].occurrences, 3);
}

#[tokio::test]
async fn test_recent_suppression_decays() {
    let (engine, _, clock) = engine();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );
    assert_eq!(engine.detect_patterns().await.unwrap().patterns_to_save.len(), 1);

    // A third b.com → a.com transition, still within the suppression window
    record_domains(&engine, &["a.com"], START + 30_000);
    assert!(engine.detect_patterns().await.unwrap().patterns_to_save.is_empty());

    clock.advance(test_config().detection.recent_suppression_ms + 1);
    let outcome = engine.detect_patterns().await.unwrap();
    assert_eq!(outcome.patterns_to_save.len(), 1);
    assert_eq!(outcome.patterns_to_save[0].signature, "b.com → a.com");
}

#[tokio::test]
async fn test_fast_or_slow_transitions_are_ignored() {
    let (engine, _, _) = engine();
    // 500ms apart: under the minimum gap
    for i in 0..8 {
        let domain = if i % 2 == 0 { "a.com" } else { "b.com" };
        let event = Event::new(EventType::TabUpdated, domain, START + i * 500);
        engine.record_and_maybe_detect(event).unwrap();
    }
    let outcome = engine.detect_patterns().await.unwrap();
    assert_eq!(outcome.status, DetectionStatus::Completed);
    assert!(outcome.patterns_to_save.is_empty());
}

#[tokio::test]
async fn test_rate_limited_detection_changes_nothing() {
    let mut config = test_config();
    config.rate_limits.max_detections_per_hour = 1;
    let (engine, _, _) = engine_with(config);

    // Too few events does not spend the quota
    record_domains(&engine, &["a.com", "b.com"], START);
    assert_eq!(
        engine.detect_patterns().await.unwrap().status,
        DetectionStatus::NotEnoughEvents
    );

    record_domains(&engine, &["c.com", "d.com", "c.com", "d.com"], START + 10_000);
    assert_eq!(
        engine.detect_patterns().await.unwrap().status,
        DetectionStatus::Completed
    );

    record_domains(&engine, &["a.com", "b.com", "a.com", "b.com"], START + 40_000);
    let limited = engine.detect_patterns().await.unwrap();
    assert_eq!(limited.status, DetectionStatus::RateLimited);
    assert!(limited.patterns_to_save.is_empty());
    assert!(engine.patterns().unwrap().is_empty());
}

#[tokio::test]
async fn test_existing_automation_blocks_pattern() {
    let (engine, _, _) = engine();
    engine
        .create_automation("b.com", &["a.com".to_string()], None)
        .unwrap();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );

    let outcome = engine.detect_patterns().await.unwrap();
    assert!(outcome.patterns_to_save.is_empty());
}

#[test]
fn test_event_log_is_capped() {
    let mut config = test_config();
    config.recorder.max_events = 10;
    let (engine, _, _) = engine_with(config);

    for i in 0..15 {
        let event = Event::new(EventType::TabUpdated, format!("site{}.com", i), START + i);
        engine.record_and_maybe_detect(event).unwrap();
    }

    let events = engine.events().unwrap();
    assert_eq!(events.len(), 10);
    assert_eq!(events[0].domain, "site5.com");
    assert_eq!(events[9].domain, "site14.com");
}

#[test]
fn test_detection_signal_every_second_event() {
    let (engine, _, _) = engine();
    let signals: Vec<bool> = (0..8)
        .map(|i| {
            let event = Event::new(EventType::TabUpdated, "a.com", START + i * 5_000);
            engine
                .record_and_maybe_detect(event)
                .unwrap()
                .should_detect_patterns
        })
        .collect();
    assert_eq!(
        signals,
        vec![false, false, false, false, false, true, false, true]
    );
}

#[test]
fn test_observe_filters_navigations() {
    let (engine, _, clock) = engine();

    let internal = engine.observe(&nav("chrome://settings", 1)).unwrap();
    assert_eq!(internal.rejected, Some(RejectReason::InternalUrl));

    let first = engine
        .observe(&nav("https://www.Example.com/a?token=1", 1))
        .unwrap();
    assert!(first.recorded);

    clock.advance(1_000);
    let dup = engine.observe(&nav("https://example.com/b", 1)).unwrap();
    assert_eq!(dup.rejected, Some(RejectReason::Duplicate));

    let events = engine.events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].domain, "example.com");
    assert_eq!(events[0].url, "https://www.example.com/a");
}

#[test]
fn test_whitelist_restricts_recording() {
    let (engine, _, _) = engine();
    assert_eq!(
        engine.add_to_whitelist("WWW.Example.com").unwrap(),
        "example.com"
    );
    assert!(matches!(
        engine.add_to_whitelist("not a domain"),
        Err(Error::InvalidInput(_))
    ));

    let outcome = engine.observe(&nav("https://other.com/", 1)).unwrap();
    assert_eq!(outcome.rejected, Some(RejectReason::NotWhitelisted));
    assert!(engine.observe(&nav("https://example.com/", 1)).unwrap().recorded);

    engine.remove_from_whitelist("example.com").unwrap();
    assert!(engine.whitelist().unwrap().is_empty());
}

#[test]
fn test_matching_respects_active_flag_and_www() {
    let (engine, _, _) = engine();
    let automation = engine
        .create_automation("www.Mail.com", &["calendar.com".to_string()], None)
        .unwrap();
    assert_eq!(automation.trigger.domain, "mail.com");

    assert_eq!(
        engine.match_automations("www.mail.com").unwrap().automations.len(),
        1
    );

    assert!(!engine.toggle_automation(&automation.id).unwrap());
    assert!(engine
        .match_automations("mail.com")
        .unwrap()
        .automations
        .is_empty());
}

#[tokio::test]
async fn test_several_matches_are_not_executed() {
    let (engine, opener, _) = engine();
    engine
        .create_automation("mail.com", &["calendar.com".to_string()], None)
        .unwrap();
    engine
        .create_automation("mail.com", &["docs.com".to_string()], None)
        .unwrap();

    match engine.handle_domain_load("mail.com", None).await.unwrap() {
        DomainLoadOutcome::Choose(matched) => assert_eq!(matched.automations.len(), 2),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(opener.opened().is_empty());

    assert_eq!(
        engine.handle_domain_load("nothing.com", None).await.unwrap(),
        DomainLoadOutcome::NoMatch
    );
}

#[tokio::test]
async fn test_execution_updates_usage_and_tags_tabs() {
    let (engine, opener, clock) = engine();
    let automation = engine
        .create_automation(
            "mail.com",
            &["calendar.com".to_string(), "docs.com".to_string()],
            Some(Category::Work),
        )
        .unwrap();
    assert!(automation.is_multi_tab);

    clock.advance(2_000);
    let report = match engine.handle_domain_load("mail.com", Some(7)).await.unwrap() {
        DomainLoadOutcome::Executed(report) => report,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!(report.opened_tab_ids.len(), 2);
    assert_eq!(
        opener.opened(),
        vec!["https://calendar.com", "https://docs.com"]
    );

    let stored = &engine.automations().unwrap()[0];
    assert_eq!(stored.execution_count, 1);
    assert_eq!(stored.last_used, Some(START + 2_000));

    // Navigations in the opened tabs are not recorded
    let tab = report.opened_tab_ids[0];
    let outcome = engine.observe(&nav("https://calendar.com/", tab)).unwrap();
    assert_eq!(outcome.rejected, Some(RejectReason::AutomationTab));

    // The tag is single-use
    clock.advance(5_000);
    assert!(engine.observe(&nav("https://calendar.com/", tab)).unwrap().recorded);

    let related = engine
        .take_related_tabs(7, &[report.opened_tab_ids[1]])
        .unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].domain, "docs.com");
    assert_eq!(engine.close_tabs(&[related[0].tab_id]), 1);
    assert!(engine.take_related_tabs(7, &report.opened_tab_ids).unwrap().is_empty());
}

#[tokio::test]
async fn test_overlapping_execution_is_refused() {
    let (engine, _, clock) = engine();
    let automation = engine
        .create_automation("mail.com", &["calendar.com".to_string()], None)
        .unwrap();

    engine.execute_automation(&automation.id, None).await.unwrap();
    assert!(matches!(
        engine.execute_automation(&automation.id, None).await,
        Err(Error::ExecutionInProgress(_))
    ));

    clock.advance(test_config().execution.tab_grace_ms + 1);
    engine.execute_automation(&automation.id, None).await.unwrap();
    assert_eq!(engine.automations().unwrap()[0].execution_count, 2);
}

#[tokio::test]
async fn test_partial_failure_still_succeeds() {
    let (engine, opener, _) = engine();
    let automation = engine
        .create_automation(
            "mail.com",
            &["broken.com".to_string(), "docs.com".to_string()],
            None,
        )
        .unwrap();

    let report = engine.execute_automation(&automation.id, None).await.unwrap();
    assert_eq!(report.opened_tab_ids.len(), 1);
    assert_eq!(report.failed_domains, vec!["broken.com"]);
    assert_eq!(opener.opened(), vec!["https://docs.com"]);
}

#[tokio::test]
async fn test_approve_and_dismiss_patterns() {
    let (engine, _, _) = engine();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );
    let pattern = engine.detect_patterns().await.unwrap().patterns_to_save[0].clone();

    let automation = engine.approve_pattern(&pattern.id).unwrap();
    assert_eq!(automation.pattern_id.as_deref(), Some(pattern.id.as_str()));
    assert_eq!(automation.trigger.domain, "a.com");
    assert_eq!(automation.action_domains(), vec!["b.com"]);
    assert!(automation.active);

    engine.dismiss_pattern(&pattern.id).unwrap();
    assert!(engine.patterns().unwrap().is_empty());
    assert!(matches!(
        engine.dismiss_pattern(&pattern.id),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        engine.approve_pattern("missing"),
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_pattern_cannot_be_approved_twice() {
    let (engine, opener, _) = engine();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );
    let pattern = engine.detect_patterns().await.unwrap().patterns_to_save[0].clone();

    engine.approve_pattern(&pattern.id).unwrap();
    assert!(matches!(
        engine.approve_pattern(&pattern.id),
        Err(Error::AlreadyExists(_))
    ));
    assert!(matches!(
        engine.create_automation("www.a.com", &["B.com".to_string()], None),
        Err(Error::AlreadyExists(_))
    ));
    assert_eq!(engine.automations().unwrap().len(), 1);

    // Still a single match, so it still runs on load
    assert!(matches!(
        engine.handle_domain_load("a.com", None).await.unwrap(),
        DomainLoadOutcome::Executed(_)
    ));
    assert_eq!(opener.opened(), vec!["https://b.com"]);
}

#[tokio::test]
async fn test_stored_automation_without_actions_is_refused() {
    let (engine, opener, _) = engine();
    engine
        .store()
        .save(
            keys::AUTOMATIONS,
            &serde_json::json!([{
                "id": "x",
                "trigger": {"domain": "mail.com"},
                "active": true
            }]),
        )
        .unwrap();

    assert!(matches!(
        engine.handle_domain_load("mail.com", None).await,
        Err(Error::Serialization(_))
    ));
    assert!(opener.opened().is_empty());
}

#[test]
fn test_automation_validation_and_limit() {
    let mut config = test_config();
    config.rate_limits.max_automations = 2;
    let (engine, _, _) = engine_with(config);

    assert!(matches!(
        engine.create_automation("mail.com", &[], None),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        engine.create_automation("mail", &["docs.com".to_string()], None),
        Err(Error::InvalidInput(_))
    ));

    let first = engine
        .create_automation("mail.com", &["docs.com".to_string()], None)
        .unwrap();
    engine
        .create_automation("news.com", &["weather.com".to_string()], None)
        .unwrap();
    assert!(matches!(
        engine.create_automation("shop.com", &["cart.com".to_string()], None),
        Err(Error::AutomationLimit(2))
    ));

    let edited = engine
        .edit_automation(
            &first.id,
            "mail.com",
            &["docs.com".to_string(), "drive.com".to_string()],
            None,
        )
        .unwrap();
    assert!(edited.is_multi_tab);

    engine.delete_automation(&first.id).unwrap();
    assert!(matches!(
        engine.delete_automation(&first.id),
        Err(Error::NotFound { .. })
    ));
    assert_eq!(engine.automations().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_search_and_clear() {
    let (engine, _, _) = engine();
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );
    engine.detect_patterns().await.unwrap();
    engine
        .create_automation("mail.com", &["docs.com".to_string()], None)
        .unwrap();

    let stats = engine.stats().unwrap();
    assert_eq!(stats.events, 6);
    assert_eq!(stats.patterns, 1);
    assert_eq!(stats.automations, 1);
    assert_eq!(stats.active_automations, 1);
    assert!(stats.storage_bytes > 0);

    let results = engine.search("B.COM").unwrap();
    assert_eq!(results.patterns.len(), 1);
    assert_eq!(results.events.len(), 3);
    assert!(results.automations.is_empty());

    engine.clear_data().await.unwrap();
    let stats = engine.stats().unwrap();
    assert_eq!(stats.events, 0);
    assert_eq!(stats.patterns, 0);
    assert_eq!(stats.automations, 0);

    // Suppression was reset too
    record_domains(
        &engine,
        &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
        START,
    );
    assert_eq!(engine.detect_patterns().await.unwrap().patterns_to_save.len(), 1);
}

#[tokio::test]
async fn test_suppression_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autosense.db");

    {
        let engine = Engine::with_clock(
            test_config(),
            Box::new(SqliteStore::open(&path).unwrap()),
            Box::new(RecordingOpener::default()),
            Box::new(ManualClock::new(START)),
        )
        .unwrap();
        record_domains(
            &engine,
            &["a.com", "b.com", "a.com", "b.com", "a.com", "b.com"],
            START,
        );
        assert_eq!(engine.detect_patterns().await.unwrap().patterns_to_save.len(), 1);
    }

    let engine = Engine::with_clock(
        test_config(),
        Box::new(SqliteStore::open(&path).unwrap()),
        Box::new(RecordingOpener::default()),
        Box::new(ManualClock::new(START + 3_600_000)),
    )
    .unwrap();
    assert_eq!(engine.events().unwrap().len(), 6);
    assert_eq!(engine.patterns().unwrap().len(), 1);

    // Shown forever, even after the recent window has passed
    let outcome = engine.detect_patterns().await.unwrap();
    assert_eq!(outcome.status, DetectionStatus::Completed);
    assert!(outcome.patterns_to_save.is_empty());
}

#[tokio::test]
async fn test_bookkeeping_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autosense.db");
    let mut config = test_config();
    config.rate_limits.max_detections_per_hour = 1;

    let (automation_id, opened_tab) = {
        let engine = Engine::with_clock(
            config.clone(),
            Box::new(SqliteStore::open(&path).unwrap()),
            Box::new(RecordingOpener::default()),
            Box::new(ManualClock::new(START)),
        )
        .unwrap();
        record_domains(
            &engine,
            &["a.com", "b.com", "c.com", "d.com", "e.com", "f.com"],
            START,
        );
        assert_eq!(
            engine.detect_patterns().await.unwrap().status,
            DetectionStatus::Completed
        );

        let automation = engine
            .create_automation("mail.com", &["docs.com".to_string()], None)
            .unwrap();
        let report = match engine.handle_domain_load("mail.com", None).await.unwrap() {
            DomainLoadOutcome::Executed(report) => report,
            other => panic!("unexpected outcome: {:?}", other),
        };
        (automation.id, report.opened_tab_ids[0])
    };

    let engine = Engine::with_clock(
        config,
        Box::new(SqliteStore::open(&path).unwrap()),
        Box::new(RecordingOpener::default()),
        Box::new(ManualClock::new(START + 500)),
    )
    .unwrap();

    let outcome = engine
        .observe(&nav("https://docs.com/", opened_tab))
        .unwrap();
    assert_eq!(outcome.rejected, Some(RejectReason::AutomationTab));

    assert!(matches!(
        engine.execute_automation(&automation_id, None).await,
        Err(Error::ExecutionInProgress(_))
    ));

    assert_eq!(
        engine.detect_patterns().await.unwrap().status,
        DetectionStatus::RateLimited
    );
}

#[test]
fn test_recorder_dedup_survives_reopen() {
    let store = FailingStore::default();
    let open = |at: i64| {
        Engine::with_clock(
            test_config(),
            Box::new(store.clone()),
            Box::new(RecordingOpener::default()),
            Box::new(ManualClock::new(at)),
        )
        .unwrap()
    };

    assert!(open(START).observe(&nav("https://a.com/", 1)).unwrap().recorded);
    let again = open(START + 1_000).observe(&nav("https://a.com/x", 1)).unwrap();
    assert_eq!(again.rejected, Some(RejectReason::Duplicate));
}
