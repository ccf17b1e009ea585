//! Pattern detection and automation engine
//!
//! Pipeline for detection:
//! event log -> extractor -> aggregator -> qualifier -> confidence -> patterns
//!
//! Independently, a domain load goes through the matcher and, for a single
//! match, the executor.
//!
//! Suppression state is loaded from the store on open and written back after
//! every pass that changes it. The short-lived bookkeeping (recorder dedup
//! cache, rate-limit windows, automation-tab tags, execution guards) lives in
//! the store as expiry timestamps and is re-read at the start of each
//! operation, so it holds across processes sharing one database.

pub mod aggregator;
pub mod confidence;
pub mod executor;
pub mod extractor;
pub mod matcher;
pub mod qualifier;
pub mod rate_limit;
pub mod recorder;

pub use aggregator::{FrequencyTable, SequenceCount};
pub use executor::{ExecutionReport, TabOpener};
pub use extractor::{CandidateSequence, TimingBounds};
pub use matcher::{AutomationMatch, MatchRouting};
pub use qualifier::{PatternQualifier, SuppressionState};
pub use recorder::{EventRecorder, Navigation, RecorderState, RejectReason};

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::domain;
use crate::error::{Error, Result};
use crate::model::{Automation, Category, DomainRef, Event, Pattern, RelatedTab};
use crate::store::{keys, KeyValueStore, StoreExt};
use executor::{AutomationTabs, ExecutionGuard};
use rate_limit::RateLimiter;

/// Answer to `record_and_maybe_detect`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub recorded: bool,
    pub should_detect_patterns: bool,
    /// Why the navigation never reached the log, if it didn't
    pub rejected: Option<RejectReason>,
}

impl RecordOutcome {
    fn rejected(reason: RejectReason) -> Self {
        Self {
            recorded: false,
            should_detect_patterns: false,
            rejected: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStatus {
    Completed,
    NotEnoughEvents,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub status: DetectionStatus,
    pub patterns_by_trigger: BTreeMap<String, Vec<Pattern>>,
    pub patterns_to_save: Vec<Pattern>,
}

impl DetectionOutcome {
    fn empty(status: DetectionStatus) -> Self {
        Self {
            status,
            patterns_by_trigger: BTreeMap::new(),
            patterns_to_save: Vec::new(),
        }
    }
}

/// What happened when a tracked domain finished loading
#[derive(Debug, Clone, PartialEq)]
pub enum DomainLoadOutcome {
    NoMatch,
    Executed(ExecutionReport),
    /// More than one automation matched; nothing ran
    Choose(AutomationMatch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub events: usize,
    pub patterns: usize,
    pub automations: usize,
    pub active_automations: usize,
    pub total_executions: u64,
    pub storage_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResults {
    pub automations: Vec<Automation>,
    pub patterns: Vec<Pattern>,
    pub events: Vec<Event>,
}

const SEARCH_EVENT_LIMIT: usize = 20;

pub struct Engine {
    config: Config,
    store: Box<dyn KeyValueStore>,
    opener: Box<dyn TabOpener>,
    clock: Box<dyn Clock>,
    /// Held for a whole detection pass
    suppression: tokio::sync::Mutex<SuppressionState>,
    /// Serializes read-modify-write of the stored bookkeeping documents
    bookkeeping: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Engine {
    pub fn open(
        config: Config,
        store: Box<dyn KeyValueStore>,
        opener: Box<dyn TabOpener>,
    ) -> Result<Self> {
        Self::with_clock(config, store, opener, Box::new(SystemClock))
    }

    pub fn with_clock(
        config: Config,
        store: Box<dyn KeyValueStore>,
        opener: Box<dyn TabOpener>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let suppression = SuppressionState::load(store.as_ref())?;
        info!(
            shown = suppression.shown.len(),
            recent = suppression.recent.len(),
            "loaded suppression state"
        );

        Ok(Self {
            suppression: tokio::sync::Mutex::new(suppression),
            bookkeeping: Mutex::new(()),
            config,
            store,
            opener,
            clock,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    // ============================================
    // EVENT INTAKE
    // ============================================

    /// Filter a raw navigation and, if it survives, append it to the log
    pub fn observe(&self, navigation: &Navigation) -> Result<RecordOutcome> {
        let now = self.now();

        let admitted = {
            let _guard = lock(&self.bookkeeping);

            let mut tabs: AutomationTabs = self.store.state(keys::AUTOMATION_TABS)?;
            if tabs.consume(navigation.tab_id, now) {
                self.store.save_state(keys::AUTOMATION_TABS, &tabs)?;
                debug!(tab_id = navigation.tab_id, "skipping automation-opened tab");
                return Ok(RecordOutcome::rejected(RejectReason::AutomationTab));
            }

            let whitelist = self.store.whitelist()?;
            let mut recorder = EventRecorder::restore(
                &self.config.recorder,
                &self.config.rate_limits,
                self.store.state(keys::RECORDER_STATE)?,
            );
            let admitted = recorder.admit(navigation, &whitelist, now);
            self.store.save_state(keys::RECORDER_STATE, &recorder.state())?;
            admitted
        };

        match admitted {
            Ok(event) => self.record_and_maybe_detect(event),
            Err(reason) => Ok(RecordOutcome::rejected(reason)),
        }
    }

    /// Append an already-filtered event and say whether a detection pass is due
    pub fn record_and_maybe_detect(&self, mut event: Event) -> Result<RecordOutcome> {
        event.domain = domain::normalize_domain(&event.domain);
        let mut events = self.store.events()?;
        debug!(domain = %event.domain, kind = event.event_type.as_str(), "event recorded");
        events.push(event);

        let max = self.config.recorder.max_events;
        if events.len() > max {
            let excess = events.len() - max;
            events.drain(..excess);
        }
        self.store.save_events(&events)?;

        let detection = &self.config.detection;
        let every = detection.detect_every.max(1);
        let should_detect = events.len() >= detection.min_events && events.len() % every == 0;

        Ok(RecordOutcome {
            recorded: true,
            should_detect_patterns: should_detect,
            rejected: None,
        })
    }

    // ============================================
    // DETECTION
    // ============================================

    /// Run one detection pass
    ///
    /// Passes are serialized; suppression state only changes in memory once
    /// the new patterns and the state itself have been persisted.
    pub async fn detect_patterns(&self) -> Result<DetectionOutcome> {
        let mut state = self.suppression.lock().await;
        let detection = &self.config.detection;

        let events = self.store.events()?;
        let navigation = extractor::navigation_events(&events);
        if navigation.len() < detection.min_events {
            debug!(
                have = navigation.len(),
                need = detection.min_events,
                "not enough navigation events"
            );
            return Ok(DetectionOutcome::empty(DetectionStatus::NotEnoughEvents));
        }

        let now = self.now();
        let mut limiter = RateLimiter::per_hour(self.config.rate_limits.max_detections_per_hour)
            .with_hits(self.store.state::<Vec<i64>>(keys::DETECTION_RUNS)?);
        if !limiter.try_acquire(now) {
            info!("pattern detection rate limit exceeded");
            return Ok(DetectionOutcome::empty(DetectionStatus::RateLimited));
        }
        self.store.save_state(keys::DETECTION_RUNS, &limiter.hits())?;

        let mut suppression = state.clone();
        let expired = suppression.purge_expired(now, detection.recent_suppression_ms);
        if expired > 0 {
            debug!(expired, "purged recent pattern trackers");
        }

        let sequences = extractor::extract_sequences(
            &navigation,
            &detection.sequence_lengths,
            TimingBounds::from(detection),
        );
        let table = FrequencyTable::from_sequences(sequences);
        debug!(unique = table.len(), "aggregated sequences");

        let automations = self.store.automations()?;
        let qualifier = PatternQualifier::new(detection.min_repetitions, detection.scoring);
        let new_patterns = qualifier.qualify(&table, &automations, &mut suppression, now);

        if new_patterns.is_empty() {
            if expired > 0 {
                suppression.persist(self.store.as_ref())?;
                *state = suppression;
            }
            info!("no new patterns found");
            return Ok(DetectionOutcome::empty(DetectionStatus::Completed));
        }

        // Never store a pattern whose signature is not yet in `shown`
        suppression.persist(self.store.as_ref())?;
        let mut stored = self.store.patterns()?;
        let fresh: Vec<Pattern> = new_patterns
            .iter()
            .filter(|p| !stored.iter().any(|s| s.signature == p.signature))
            .cloned()
            .collect();
        stored.extend(fresh);
        self.store.save_patterns(&stored)?;
        *state = suppression;

        info!(count = new_patterns.len(), "detected new patterns");
        Ok(DetectionOutcome {
            status: DetectionStatus::Completed,
            patterns_by_trigger: qualifier::group_by_trigger(&new_patterns),
            patterns_to_save: new_patterns,
        })
    }

    // ============================================
    // MATCHING & EXECUTION
    // ============================================

    pub fn match_automations(&self, domain: &str) -> Result<AutomationMatch> {
        let automations = self.store.automations()?;
        let matched = matcher::match_automations(domain, &automations);
        debug!(domain = %matched.domain, found = matched.automations.len(), "checked automations");
        Ok(matched)
    }

    /// Match a loaded domain and run the automation if exactly one applies
    pub async fn handle_domain_load(
        &self,
        domain: &str,
        trigger_tab_id: Option<i64>,
    ) -> Result<DomainLoadOutcome> {
        let matched = self.match_automations(domain)?;
        match matched.routing() {
            MatchRouting::None => Ok(DomainLoadOutcome::NoMatch),
            MatchRouting::Execute(automation) => {
                let report = self.execute_automation(&automation.id, trigger_tab_id).await?;
                Ok(DomainLoadOutcome::Executed(report))
            }
            MatchRouting::Choose(_) => Ok(DomainLoadOutcome::Choose(matched)),
        }
    }

    /// Open every action tab of an automation, staggered
    ///
    /// Individual tab failures do not fail the run; the report lists what
    /// actually opened.
    pub async fn execute_automation(
        &self,
        automation_id: &str,
        trigger_tab_id: Option<i64>,
    ) -> Result<ExecutionReport> {
        let automation = self.store.find_automation(automation_id)?;
        if automation.actions.is_empty() {
            return Err(Error::invalid(format!(
                "automation {} has no actions",
                automation_id
            )));
        }
        let grace_ms = self.config.execution.tab_grace_ms;

        let claimed = {
            let _guard = lock(&self.bookkeeping);
            let mut guards: ExecutionGuard = self.store.state(keys::EXECUTION_GUARDS)?;
            let claimed = guards.try_claim(automation_id, self.now(), grace_ms);
            if claimed {
                self.store.save_state(keys::EXECUTION_GUARDS, &guards)?;
            }
            claimed
        };
        if !claimed {
            warn!(automation_id, "automation already executing");
            return Err(Error::ExecutionInProgress(automation_id.to_string()));
        }

        info!(automation_id, tabs = automation.actions.len(), "executing automation");
        let stagger = Duration::from_millis(self.config.execution.stagger_ms);
        let (opened, failed_domains) =
            executor::open_actions(self.opener.as_ref(), &automation, stagger).await;

        let now = self.now();
        if !opened.is_empty() {
            let _guard = lock(&self.bookkeeping);
            let mut tabs: AutomationTabs = self.store.state(keys::AUTOMATION_TABS)?;
            for tab in &opened {
                tabs.tag(tab.tab_id, now, grace_ms);
            }
            self.store.save_state(keys::AUTOMATION_TABS, &tabs)?;
        }

        if let Some(trigger) = trigger_tab_id {
            if !opened.is_empty() {
                let mut relationships = self.store.tab_relationships()?;
                let related = relationships.entry(trigger).or_default();
                related.extend(opened.iter().map(|tab| RelatedTab {
                    tab_id: tab.tab_id,
                    domain: tab.domain.clone(),
                    automation_id: automation.id.clone(),
                    opened_at: now,
                }));
                self.store.save_tab_relationships(&relationships)?;
            }
        }

        let mut automations = self.store.automations()?;
        if let Some(stored) = automations.iter_mut().find(|a| a.id == automation.id) {
            stored.last_used = Some(now);
            stored.execution_count += 1;
            self.store.save_automations(&automations)?;
        }

        Ok(ExecutionReport {
            automation_id: automation.id,
            opened_tab_ids: opened.iter().map(|t| t.tab_id).collect(),
            failed_domains,
        })
    }

    /// Forget the tabs opened from `trigger_tab_id`, returning those still open
    pub fn take_related_tabs(
        &self,
        trigger_tab_id: i64,
        open_tab_ids: &[i64],
    ) -> Result<Vec<RelatedTab>> {
        let mut relationships = self.store.tab_relationships()?;
        let Some(related) = relationships.remove(&trigger_tab_id) else {
            return Ok(Vec::new());
        };
        self.store.save_tab_relationships(&relationships)?;

        Ok(related
            .into_iter()
            .filter(|r| open_tab_ids.contains(&r.tab_id))
            .collect())
    }

    /// Close tabs, ignoring the ones that refuse; returns how many closed
    pub fn close_tabs(&self, tab_ids: &[i64]) -> usize {
        tab_ids
            .iter()
            .filter(|&&id| match self.opener.close(id) {
                Ok(()) => true,
                Err(e) => {
                    warn!(tab_id = id, error = %e, "failed to close tab");
                    false
                }
            })
            .count()
    }

    // ============================================
    // PATTERNS
    // ============================================

    pub fn patterns(&self) -> Result<Vec<Pattern>> {
        self.store.patterns()
    }

    pub fn dismiss_pattern(&self, pattern_id: &str) -> Result<()> {
        let mut patterns = self.store.patterns()?;
        let before = patterns.len();
        patterns.retain(|p| p.id != pattern_id);
        if patterns.len() == before {
            return Err(Error::not_found("pattern", pattern_id));
        }
        self.store.save_patterns(&patterns)
    }

    /// Turn a pattern's suggestion into an active automation
    pub fn approve_pattern(&self, pattern_id: &str) -> Result<Automation> {
        let pattern = self
            .store
            .patterns()?
            .into_iter()
            .find(|p| p.id == pattern_id)
            .ok_or_else(|| Error::not_found("pattern", pattern_id))?;

        let suggestion = pattern.suggested_automation;
        if suggestion.actions.is_empty() {
            return Err(Error::invalid("pattern suggests no actions"));
        }
        if self
            .store
            .automations()?
            .iter()
            .any(|a| a.pattern_id.as_deref() == Some(pattern.id.as_str()))
        {
            return Err(Error::AlreadyExists(format!(
                "automation for pattern {}",
                pattern.id
            )));
        }

        let automation = Automation {
            id: Uuid::new_v4().to_string(),
            pattern_id: Some(pattern.id),
            is_multi_tab: suggestion.actions.len() > 1,
            trigger: suggestion.trigger,
            actions: suggestion.actions,
            category: pattern.category,
            active: true,
            created_at: self.now(),
            last_used: None,
            execution_count: 0,
        };
        self.insert_automation(automation)
    }

    // ============================================
    // AUTOMATIONS
    // ============================================

    pub fn automations(&self) -> Result<Vec<Automation>> {
        self.store.automations()
    }

    fn validated_domains(trigger: &str, actions: &[String]) -> Result<(DomainRef, Vec<DomainRef>)> {
        if actions.is_empty() {
            return Err(Error::invalid("an automation needs at least one action"));
        }
        let trigger = domain::validate_domain(trigger)
            .ok_or_else(|| Error::invalid(format!("invalid trigger domain: {}", trigger)))?;
        let actions = actions
            .iter()
            .map(|a| {
                domain::validate_domain(a)
                    .map(DomainRef::new)
                    .ok_or_else(|| Error::invalid(format!("invalid action domain: {}", a)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((DomainRef::new(trigger), actions))
    }

    fn insert_automation(&self, automation: Automation) -> Result<Automation> {
        let mut automations = self.store.automations()?;
        let limit = self.config.rate_limits.max_automations;
        if automations.len() >= limit {
            return Err(Error::AutomationLimit(limit));
        }
        let signature = domain::automation_signature(&automation);
        if automations
            .iter()
            .any(|a| domain::automation_signature(a) == signature)
        {
            return Err(Error::AlreadyExists(format!("automation {}", signature)));
        }
        automations.push(automation.clone());
        self.store.save_automations(&automations)?;
        info!(
            trigger = %automation.trigger.domain,
            actions = ?automation.action_domains(),
            "automation activated"
        );
        Ok(automation)
    }

    /// Create an automation by hand
    pub fn create_automation(
        &self,
        trigger: &str,
        actions: &[String],
        category: Option<Category>,
    ) -> Result<Automation> {
        let (trigger, actions) = Self::validated_domains(trigger, actions)?;
        let category = category.unwrap_or_else(|| domain::category_for_domain(&trigger.domain));
        let automation = Automation {
            id: Uuid::new_v4().to_string(),
            pattern_id: None,
            is_multi_tab: actions.len() > 1,
            trigger,
            actions,
            category,
            active: true,
            created_at: self.now(),
            last_used: None,
            execution_count: 0,
        };
        self.insert_automation(automation)
    }

    fn update_automation<F>(&self, automation_id: &str, update: F) -> Result<Automation>
    where
        F: FnOnce(&mut Automation),
    {
        let mut automations = self.store.automations()?;
        let automation = automations
            .iter_mut()
            .find(|a| a.id == automation_id)
            .ok_or_else(|| Error::not_found("automation", automation_id))?;
        update(automation);
        let updated = automation.clone();
        self.store.save_automations(&automations)?;
        Ok(updated)
    }

    /// Flip `active`; returns the new value
    pub fn toggle_automation(&self, automation_id: &str) -> Result<bool> {
        let updated = self.update_automation(automation_id, |a| a.active = !a.active)?;
        Ok(updated.active)
    }

    pub fn edit_automation(
        &self,
        automation_id: &str,
        trigger: &str,
        actions: &[String],
        category: Option<Category>,
    ) -> Result<Automation> {
        let (trigger, actions) = Self::validated_domains(trigger, actions)?;
        self.update_automation(automation_id, move |a| {
            a.trigger = trigger;
            a.is_multi_tab = actions.len() > 1;
            a.actions = actions;
            if let Some(category) = category {
                a.category = category;
            }
        })
    }

    pub fn delete_automation(&self, automation_id: &str) -> Result<()> {
        let mut automations = self.store.automations()?;
        let before = automations.len();
        automations.retain(|a| a.id != automation_id);
        if automations.len() == before {
            return Err(Error::not_found("automation", automation_id));
        }
        self.store.save_automations(&automations)
    }

    // ============================================
    // WHITELIST
    // ============================================

    pub fn whitelist(&self) -> Result<Vec<String>> {
        self.store.whitelist()
    }

    pub fn add_to_whitelist(&self, domain: &str) -> Result<String> {
        let normalized = domain::validate_domain(domain)
            .ok_or_else(|| Error::invalid(format!("invalid domain format: {}", domain)))?;
        let mut whitelist = self.store.whitelist()?;
        if !whitelist.contains(&normalized) {
            whitelist.push(normalized.clone());
            self.store.save_whitelist(&whitelist)?;
        }
        Ok(normalized)
    }

    pub fn remove_from_whitelist(&self, domain: &str) -> Result<()> {
        let normalized = domain::normalize_domain(domain);
        let mut whitelist = self.store.whitelist()?;
        whitelist.retain(|w| *w != normalized);
        self.store.save_whitelist(&whitelist)
    }

    // ============================================
    // QUERIES & MAINTENANCE
    // ============================================

    pub fn events(&self) -> Result<Vec<Event>> {
        self.store.events()
    }

    pub fn stats(&self) -> Result<Stats> {
        let automations = self.store.automations()?;
        Ok(Stats {
            events: self.store.events()?.len(),
            patterns: self.store.patterns()?.len(),
            automations: automations.len(),
            active_automations: automations.iter().filter(|a| a.active).count(),
            total_executions: automations.iter().map(|a| u64::from(a.execution_count)).sum(),
            storage_bytes: self.store.size_in_bytes()?,
        })
    }

    /// Case-insensitive substring search across everything stored
    pub fn search(&self, query: &str) -> Result<SearchResults> {
        let needle = query.to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&needle);

        let automations = self
            .store
            .automations()?
            .into_iter()
            .filter(|a| hit(&a.trigger.domain) || a.actions.iter().any(|x| hit(&x.domain)))
            .collect();

        let patterns = self
            .store
            .patterns()?
            .into_iter()
            .filter(|p| hit(&p.description) || hit(&p.signature))
            .collect();

        let mut events: Vec<Event> = self
            .store
            .events()?
            .into_iter()
            .filter(|e| hit(&e.domain) || hit(&e.url))
            .collect();
        if events.len() > SEARCH_EVENT_LIMIT {
            events.drain(..events.len() - SEARCH_EVENT_LIMIT);
        }

        Ok(SearchResults {
            automations,
            patterns,
            events,
        })
    }

    /// Wipe the store, including all expiry bookkeeping, and reset suppression
    pub async fn clear_data(&self) -> Result<()> {
        let mut state = self.suppression.lock().await;
        let _guard = lock(&self.bookkeeping);
        self.store.clear()?;
        *state = SuppressionState::default();
        info!("all data cleared");
        Ok(())
    }
}
