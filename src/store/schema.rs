//! SQLite schema for the key-value store
//!
//! Every persisted collection (events, patterns, automations, suppression
//! sets, whitelist, expiry bookkeeping) is one JSON document keyed by name.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                   -- JSON document
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Storage keys
pub mod keys {
    pub const EVENTS: &str = "autosense_events";
    pub const PATTERNS: &str = "autosense_patterns";
    pub const AUTOMATIONS: &str = "autosense_automations";
    pub const SHOWN_PATTERNS: &str = "autosense_shown_patterns";
    pub const RECENT_PATTERNS: &str = "autosense_recent_patterns";
    pub const WHITELIST: &str = "autosense_whitelist";
    pub const TAB_RELATIONSHIPS: &str = "autosense_tab_relationships";
    pub const AUTOMATION_TABS: &str = "autosense_automation_tabs";
    pub const EXECUTION_GUARDS: &str = "autosense_execution_guards";
    pub const DETECTION_RUNS: &str = "autosense_detection_runs";
    pub const RECORDER_STATE: &str = "autosense_recorder_state";
}
