//! Command implementations for the `autosense` binary

pub mod automations;
pub mod events;
pub mod patterns;
pub mod stats;
pub mod whitelist;

use std::sync::atomic::{AtomicI64, Ordering};

use crate::engine::TabOpener;
use crate::error::Result;

/// Tab opener for the terminal: prints what it would open
pub struct PrintOpener {
    next_id: AtomicI64,
}

impl PrintOpener {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for PrintOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl TabOpener for PrintOpener {
    fn open(&self, url: &str) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        println!("   ↗ open {} (tab {})", url, id);
        Ok(id)
    }

    fn close(&self, tab_id: i64) -> Result<()> {
        println!("   ✕ close tab {}", tab_id);
        Ok(())
    }
}

/// Shorten long text for table columns
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

/// First eight characters of an id, for display
pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub(crate) fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
