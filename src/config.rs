//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// How a qualified pattern's confidence is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// occurrences / 10, capped at 1
    #[default]
    Frequency,
    /// 0.6 frequency + 0.4 timing consistency
    Blended,
}

/// Sequence mining and qualification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_min_repetitions")]
    pub min_repetitions: u32,

    #[serde(default = "default_sequence_lengths")]
    pub sequence_lengths: Vec<usize>,

    /// Upper bound on first-to-last event span inside one sequence
    #[serde(default = "default_max_sequence_span_ms")]
    pub max_sequence_span_ms: i64,

    /// Lower bound on every consecutive gap inside one sequence
    #[serde(default = "default_min_event_gap_ms")]
    pub min_event_gap_ms: i64,

    /// How long a freshly qualified signature and its reverse stay suppressed
    #[serde(default = "default_recent_suppression_ms")]
    pub recent_suppression_ms: i64,

    #[serde(default = "default_min_events")]
    pub min_events: usize,

    /// Signal a detection pass every Nth recorded event
    #[serde(default = "default_detect_every")]
    pub detect_every: usize,

    #[serde(default)]
    pub scoring: ScoringMode,
}

/// Automation execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Delay between consecutive tab opens
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,

    /// How long an opened tab is ignored by the recorder
    #[serde(default = "default_tab_grace_ms")]
    pub tab_grace_ms: i64,
}

/// Event log intake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// Same domain recorded again within this window is dropped
    #[serde(default = "default_duplicate_threshold_ms")]
    pub duplicate_threshold_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_events_per_minute")]
    pub max_events_per_minute: usize,

    #[serde(default = "default_max_detections_per_hour")]
    pub max_detections_per_hour: usize,

    #[serde(default = "default_max_automations")]
    pub max_automations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/autosense/autosense.db".to_string()
}

fn default_min_repetitions() -> u32 {
    3
}

fn default_sequence_lengths() -> Vec<usize> {
    vec![2, 3]
}

fn default_max_sequence_span_ms() -> i64 {
    120_000
}

fn default_min_event_gap_ms() -> i64 {
    1_000
}

fn default_recent_suppression_ms() -> i64 {
    5 * 60 * 1000
}

fn default_min_events() -> usize {
    6
}

fn default_detect_every() -> usize {
    2
}

fn default_stagger_ms() -> u64 {
    300
}

fn default_tab_grace_ms() -> i64 {
    10_000
}

fn default_max_events() -> usize {
    1000
}

fn default_duplicate_threshold_ms() -> i64 {
    3_000
}

fn default_max_events_per_minute() -> usize {
    30
}

fn default_max_detections_per_hour() -> usize {
    10
}

fn default_max_automations() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_repetitions: default_min_repetitions(),
            sequence_lengths: default_sequence_lengths(),
            max_sequence_span_ms: default_max_sequence_span_ms(),
            min_event_gap_ms: default_min_event_gap_ms(),
            recent_suppression_ms: default_recent_suppression_ms(),
            min_events: default_min_events(),
            detect_every: default_detect_every(),
            scoring: ScoringMode::default(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            stagger_ms: default_stagger_ms(),
            tab_grace_ms: default_tab_grace_ms(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            duplicate_threshold_ms: default_duplicate_threshold_ms(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events_per_minute: default_max_events_per_minute(),
            max_detections_per_hour: default_max_detections_per_hour(),
            max_automations: default_max_automations(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./autosense.yaml (current directory)
    /// 3. <config dir>/autosense/autosense.yaml
    pub fn load(path: &str) -> Result<Self> {
        let mut search_paths = vec![
            PathBuf::from(shellexpand::tilde(path).to_string()),
            PathBuf::from("autosense.yaml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("autosense").join("autosense.yaml"));
        }

        for search_path in &search_paths {
            if search_path.exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }
}
