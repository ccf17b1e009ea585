//! Sliding-window sequence extraction
//!
//! A window of `len` consecutive events becomes a candidate only when:
//! - its first-to-last span fits in `max_span_ms`
//! - every consecutive gap is at least `min_gap_ms`
//! - all of its domains are distinct

use std::collections::HashSet;
use tracing::debug;

use crate::config::DetectionConfig;
use crate::domain;
use crate::model::Event;

/// Timing bounds applied to every window
#[derive(Debug, Clone, Copy)]
pub struct TimingBounds {
    pub max_span_ms: i64,
    pub min_gap_ms: i64,
}

impl From<&DetectionConfig> for TimingBounds {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            max_span_ms: config.max_sequence_span_ms,
            min_gap_ms: config.min_event_gap_ms,
        }
    }
}

/// One qualifying window
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSequence {
    pub signature: String,
    pub domains: Vec<String>,
    pub length: usize,
    /// First-to-last span of the window, feeds timing consistency
    pub span_ms: i64,
}

/// Keep only events that count as deliberate navigation
pub fn navigation_events(events: &[Event]) -> Vec<&Event> {
    events
        .iter()
        .filter(|e| e.event_type.is_navigation())
        .collect()
}

/// Emit every qualifying window for each requested length
///
/// Overlapping windows are all reported; counting happens downstream.
pub fn extract_sequences(
    events: &[&Event],
    lengths: &[usize],
    bounds: TimingBounds,
) -> Vec<CandidateSequence> {
    let mut sequences = Vec::new();

    for &length in lengths {
        if length < 2 || events.len() < length {
            continue;
        }

        let before = sequences.len();
        for window in events.windows(length) {
            if let Some(candidate) = inspect_window(window, bounds) {
                sequences.push(candidate);
            }
        }
        debug!(length, found = sequences.len() - before, "extracted sequences");
    }

    sequences
}

fn inspect_window(window: &[&Event], bounds: TimingBounds) -> Option<CandidateSequence> {
    let first = window.first()?;
    let last = window.last()?;

    let span_ms = last.timestamp - first.timestamp;
    if span_ms > bounds.max_span_ms {
        return None;
    }

    if window
        .windows(2)
        .any(|pair| pair[1].timestamp - pair[0].timestamp < bounds.min_gap_ms)
    {
        return None;
    }

    let mut seen = HashSet::with_capacity(window.len());
    if !window.iter().all(|e| seen.insert(e.domain.as_str())) {
        return None;
    }

    let domains: Vec<String> = window.iter().map(|e| e.domain.clone()).collect();
    Some(CandidateSequence {
        signature: domain::signature(&domains),
        length: domains.len(),
        domains,
        span_ms,
    })
}
