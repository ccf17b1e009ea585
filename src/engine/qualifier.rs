//! Pattern qualification and suppression bookkeeping
//!
//! A frequent signature becomes a pattern unless it (or its reverse) was
//! qualified recently, it was ever shown before, or an automation already
//! covers it in either direction.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use super::aggregator::{FrequencyTable, SequenceCount};
use super::confidence;
use crate::config::ScoringMode;
use crate::domain;
use crate::error::Result;
use crate::model::{Automation, DomainRef, Pattern, SuggestedAutomation};
use crate::store::StoreExt;

/// Signatures that must not be offered again
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuppressionState {
    /// Every signature ever offered. Never decays.
    pub shown: BTreeSet<String>,
    /// Signature -> time it (or its reverse) was qualified
    pub recent: BTreeMap<String, i64>,
}

impl SuppressionState {
    pub fn load<S: StoreExt + ?Sized>(store: &S) -> Result<Self> {
        Ok(Self {
            shown: store.shown_patterns()?.into_iter().collect(),
            recent: store.recent_patterns()?,
        })
    }

    pub fn persist<S: StoreExt + ?Sized>(&self, store: &S) -> Result<()> {
        let shown: Vec<String> = self.shown.iter().cloned().collect();
        store.save_shown_patterns(&shown)?;
        store.save_recent_patterns(&self.recent)
    }

    /// Drop recent entries older than `window_ms`; returns how many went
    pub fn purge_expired(&mut self, now_ms: i64, window_ms: i64) -> usize {
        let before = self.recent.len();
        self.recent.retain(|signature, &mut at| {
            let keep = now_ms - at <= window_ms;
            if !keep {
                debug!(signature = %signature, "recent pattern tracker expired");
            }
            keep
        });
        before - self.recent.len()
    }

    pub fn is_recent(&self, signature: &str) -> bool {
        self.recent.contains_key(signature)
    }

    pub fn is_shown(&self, signature: &str) -> bool {
        self.shown.contains(signature)
    }

    pub fn mark_qualified(&mut self, signature: &str, reverse: &str, now_ms: i64) {
        self.shown.insert(signature.to_string());
        self.recent.insert(signature.to_string(), now_ms);
        self.recent.insert(reverse.to_string(), now_ms);
    }
}

/// Why a frequent signature was not turned into a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BelowThreshold,
    ReverseOfRecent,
    Recent,
    AlreadyShown,
    AutomationExists,
}

pub struct PatternQualifier {
    pub min_repetitions: u32,
    pub scoring: ScoringMode,
}

impl PatternQualifier {
    pub fn new(min_repetitions: u32, scoring: ScoringMode) -> Self {
        Self {
            min_repetitions,
            scoring,
        }
    }

    /// Check one signature against the threshold and the suppression state
    pub fn check(
        &self,
        entry: &SequenceCount,
        covered: &HashSet<String>,
        state: &SuppressionState,
    ) -> std::result::Result<String, SkipReason> {
        if entry.count < self.min_repetitions {
            return Err(SkipReason::BelowThreshold);
        }

        let reverse = domain::reverse_signature(&entry.domains);
        if state.is_recent(&reverse) {
            return Err(SkipReason::ReverseOfRecent);
        }
        if state.is_recent(&entry.signature) {
            return Err(SkipReason::Recent);
        }
        if state.is_shown(&entry.signature) {
            return Err(SkipReason::AlreadyShown);
        }
        if covered.contains(&entry.signature) || covered.contains(&reverse) {
            return Err(SkipReason::AutomationExists);
        }

        Ok(reverse)
    }

    /// Qualify every eligible signature, updating `state` as each one passes
    pub fn qualify(
        &self,
        table: &FrequencyTable,
        automations: &[Automation],
        state: &mut SuppressionState,
        now_ms: i64,
    ) -> Vec<Pattern> {
        let covered: HashSet<String> = automations.iter().map(domain::automation_signature).collect();
        let mut patterns = Vec::new();

        for entry in table.iter() {
            match self.check(entry, &covered, state) {
                Ok(reverse) => {
                    info!(
                        signature = %entry.signature,
                        occurrences = entry.count,
                        sites = entry.length,
                        "new pattern"
                    );
                    state.mark_qualified(&entry.signature, &reverse, now_ms);
                    patterns.push(self.build_pattern(entry, now_ms));
                }
                Err(reason) => {
                    debug!(
                        signature = %entry.signature,
                        count = entry.count,
                        needed = self.min_repetitions,
                        ?reason,
                        "skipping signature"
                    );
                }
            }
        }

        patterns
    }

    pub fn build_pattern(&self, entry: &SequenceCount, now_ms: i64) -> Pattern {
        let domains = entry.domains.clone();
        let trigger = domains[0].clone();

        Pattern {
            id: Uuid::new_v4().to_string(),
            signature: entry.signature.clone(),
            description: domain::describe(&domains),
            occurrences: entry.count,
            confidence: confidence::score(self.scoring, entry.count, &entry.spans_ms),
            category: domain::category_for_domain(&trigger),
            created_at: now_ms,
            is_multi_tab: domains.len() > 2,
            suggested_automation: SuggestedAutomation {
                trigger: DomainRef::new(trigger),
                actions: domains[1..].iter().map(DomainRef::new).collect(),
            },
            domains,
        }
    }
}

/// Group patterns by trigger domain so one offer covers each trigger
pub fn group_by_trigger(patterns: &[Pattern]) -> BTreeMap<String, Vec<Pattern>> {
    let mut grouped: BTreeMap<String, Vec<Pattern>> = BTreeMap::new();
    for pattern in patterns {
        grouped
            .entry(pattern.trigger_domain().to_string())
            .or_default()
            .push(pattern.clone());
    }
    grouped
}
