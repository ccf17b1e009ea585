//! Event intake: turns raw navigations into log entries
//!
//! Filtering happens here so the detection pipeline can assume every logged
//! event is a real, whitelisted, non-duplicate navigation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rate_limit::RateLimiter;
use crate::config::{RateLimitConfig, RecorderConfig};
use crate::domain;
use crate::model::{Event, EventType};

/// A navigation as reported by the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    #[serde(rename = "type", default = "default_navigation_type")]
    pub event_type: EventType,
    pub url: String,
    #[serde(default)]
    pub tab_id: i64,
    #[serde(default)]
    pub title: String,
}

fn default_navigation_type() -> EventType {
    EventType::TabUpdated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InternalUrl,
    NoDomain,
    AutomationTab,
    RateLimited,
    NotWhitelisted,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRecorded {
    pub domain: String,
    pub timestamp: i64,
}

/// What the recorder carries from one navigation to the next
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderState {
    #[serde(default)]
    pub last: Option<LastRecorded>,
    /// Admission times inside the per-minute window
    #[serde(default)]
    pub recent_hits: Vec<i64>,
}

pub struct EventRecorder {
    duplicate_threshold_ms: i64,
    limiter: RateLimiter,
    last: Option<LastRecorded>,
}

impl EventRecorder {
    pub fn new(recorder: &RecorderConfig, limits: &RateLimitConfig) -> Self {
        Self {
            duplicate_threshold_ms: recorder.duplicate_threshold_ms,
            limiter: RateLimiter::per_minute(limits.max_events_per_minute),
            last: None,
        }
    }

    /// Pick up where a previous recorder left off
    pub fn restore(recorder: &RecorderConfig, limits: &RateLimitConfig, state: RecorderState) -> Self {
        Self {
            duplicate_threshold_ms: recorder.duplicate_threshold_ms,
            limiter: RateLimiter::per_minute(limits.max_events_per_minute)
                .with_hits(state.recent_hits),
            last: state.last,
        }
    }

    pub fn state(&self) -> RecorderState {
        RecorderState {
            last: self.last.clone(),
            recent_hits: self.limiter.hits(),
        }
    }

    /// Build an event from `navigation`, or say why it is dropped
    ///
    /// An empty whitelist admits every domain.
    pub fn admit(
        &mut self,
        navigation: &Navigation,
        whitelist: &[String],
        now_ms: i64,
    ) -> Result<Event, RejectReason> {
        if domain::is_internal_url(&navigation.url) {
            return Err(RejectReason::InternalUrl);
        }

        let domain = match domain::extract_domain(&navigation.url) {
            Some(d) if !d.is_empty() => d,
            _ => return Err(RejectReason::NoDomain),
        };

        if !self.limiter.try_acquire(now_ms) {
            debug!(%domain, "event rate limit exceeded");
            return Err(RejectReason::RateLimited);
        }

        if !whitelist.is_empty()
            && !whitelist
                .iter()
                .any(|w| domain::normalize_domain(w) == domain)
        {
            debug!(%domain, "domain not whitelisted");
            return Err(RejectReason::NotWhitelisted);
        }

        if let Some(last) = &self.last {
            if last.domain == domain && now_ms - last.timestamp < self.duplicate_threshold_ms {
                debug!(%domain, "duplicate event");
                return Err(RejectReason::Duplicate);
            }
        }

        self.last = Some(LastRecorded {
            domain: domain.clone(),
            timestamp: now_ms,
        });

        Ok(Event {
            event_type: navigation.event_type,
            url: domain::sanitize_url(&navigation.url),
            domain,
            timestamp: now_ms,
            tab_id: navigation.tab_id,
            title: navigation.title.clone(),
        })
    }
}
