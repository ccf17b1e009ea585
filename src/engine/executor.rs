//! Automation execution: staggered tab opens and the bookkeeping around them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain;
use crate::error::Result;
use crate::model::Automation;

/// Tab Opener collaborator
pub trait TabOpener: Send + Sync {
    /// Open `url` in a background tab and return its id
    fn open(&self, url: &str) -> Result<i64>;

    fn close(&self, tab_id: i64) -> Result<()>;
}

/// Result of one execution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionReport {
    pub automation_id: String,
    /// Ids of the tabs that actually opened, in action order
    pub opened_tab_ids: Vec<i64>,
    /// Action domains whose tab failed to open
    pub failed_domains: Vec<String>,
}

/// A tab that opened, with the action it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedTab {
    pub tab_id: i64,
    pub domain: String,
}

/// Open every action of `automation`, `stagger` apart
///
/// A failed open is logged and skipped; the remaining actions still run.
pub async fn open_actions(
    opener: &dyn TabOpener,
    automation: &Automation,
    stagger: Duration,
) -> (Vec<OpenedTab>, Vec<String>) {
    let mut opened = Vec::with_capacity(automation.actions.len());
    let mut failed = Vec::new();

    for (i, action) in automation.actions.iter().enumerate() {
        if i > 0 && !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }

        let url = domain::to_open_url(&action.domain);
        match opener.open(&url) {
            Ok(tab_id) => {
                info!(domain = %action.domain, tab_id, "opened automation tab");
                opened.push(OpenedTab {
                    tab_id,
                    domain: action.domain.clone(),
                });
            }
            Err(e) => {
                warn!(domain = %action.domain, error = %e, "failed to open automation tab");
                failed.push(action.domain.clone());
            }
        }
    }

    (opened, failed)
}

/// Ids with an expiry, checked lazily against the current time
///
/// Serializes as a plain `id -> expires_at` map so it can be stored and
/// picked up by the next process.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpiringSet {
    entries: BTreeMap<String, i64>,
}

impl ExpiringSet {
    pub fn insert(&mut self, key: impl Into<String>, expires_at: i64) {
        self.entries.insert(key.into(), expires_at);
    }

    pub fn contains(&mut self, key: &str, now_ms: i64) -> bool {
        match self.entries.get(key) {
            Some(&expires_at) if now_ms < expires_at => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }

    /// Remove `key`, reporting whether it was still live
    pub fn take(&mut self, key: &str, now_ms: i64) -> bool {
        matches!(self.entries.remove(key), Some(expires_at) if now_ms < expires_at)
    }

    pub fn purge_expired(&mut self, now_ms: i64) {
        self.entries.retain(|_, &mut expires_at| now_ms < expires_at);
    }
}

/// Tabs opened by automations, hidden from the recorder for a grace period
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutomationTabs {
    tags: ExpiringSet,
}

impl AutomationTabs {
    pub fn tag(&mut self, tab_id: i64, now_ms: i64, grace_ms: i64) {
        self.tags.purge_expired(now_ms);
        self.tags.insert(tab_id.to_string(), now_ms + grace_ms);
    }

    /// True once per tagged tab while its tag is live
    pub fn consume(&mut self, tab_id: i64, now_ms: i64) -> bool {
        self.tags.take(&tab_id.to_string(), now_ms)
    }
}

/// Blocks overlapping runs of the same automation
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionGuard {
    running: ExpiringSet,
}

impl ExecutionGuard {
    /// Claim `automation_id` until `now_ms + hold_ms`; false if already held
    pub fn try_claim(&mut self, automation_id: &str, now_ms: i64, hold_ms: i64) -> bool {
        if self.running.contains(automation_id, now_ms) {
            return false;
        }
        self.running.purge_expired(now_ms);
        self.running.insert(automation_id, now_ms + hold_ms);
        true
    }
}
