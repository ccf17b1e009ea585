//! Navigation events, detected patterns and automations
//!
//! These are the shapes persisted in the key-value store. Field names are
//! camelCase on the wire so records written by earlier builds keep loading.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of navigation that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TabUpdated,
    TabCreated,
    /// Tab switch. Recorded but never mined for sequences.
    TabActivated,
    ManualEntry,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TabUpdated => "tab_updated",
            EventType::TabCreated => "tab_created",
            EventType::TabActivated => "tab_activated",
            EventType::ManualEntry => "manual_entry",
        }
    }

    /// Whether events of this kind take part in sequence extraction
    pub fn is_navigation(&self) -> bool {
        matches!(self, EventType::TabUpdated | EventType::ManualEntry)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tab_updated" => Some(EventType::TabUpdated),
            "tab_created" => Some(EventType::TabCreated),
            "tab_activated" => Some(EventType::TabActivated),
            "manual_entry" => Some(EventType::ManualEntry),
            _ => None,
        }
    }
}

/// A recorded navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub domain: String,
    /// Query and fragment already stripped
    pub url: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub tab_id: i64,
    #[serde(default)]
    pub title: String,
}

impl Event {
    pub fn new(event_type: EventType, domain: impl Into<String>, timestamp: i64) -> Self {
        let domain = domain.into();
        Self {
            event_type,
            url: format!("https://{}/", domain),
            domain,
            timestamp,
            tab_id: 0,
            title: String::new(),
        }
    }
}

/// Coarse grouping shown next to patterns and automations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Work,
    Social,
    Entertainment,
    Shopping,
    News,
    Education,
    Finance,
    Health,
    Tech,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "WORK",
            Category::Social => "SOCIAL",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Shopping => "SHOPPING",
            Category::News => "NEWS",
            Category::Education => "EDUCATION",
            Category::Finance => "FINANCE",
            Category::Health => "HEALTH",
            Category::Tech => "TECH",
            Category::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let category = match value.to_ascii_uppercase().as_str() {
            "WORK" => Category::Work,
            "SOCIAL" => Category::Social,
            "ENTERTAINMENT" => Category::Entertainment,
            "SHOPPING" => Category::Shopping,
            "NEWS" => Category::News,
            "EDUCATION" => Category::Education,
            "FINANCE" => Category::Finance,
            "HEALTH" => Category::Health,
            "TECH" => Category::Tech,
            "OTHER" => Category::Other,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bare domain reference, used for triggers and actions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainRef {
    pub domain: String,
}

impl DomainRef {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAutomation {
    pub trigger: DomainRef,
    pub actions: Vec<DomainRef>,
}

/// A recurring domain sequence offered to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: String,
    pub signature: String,
    pub domains: Vec<String>,
    pub description: String,
    pub occurrences: u32,
    pub confidence: f64,
    pub category: Category,
    pub created_at: i64,
    pub is_multi_tab: bool,
    pub suggested_automation: SuggestedAutomation,
}

impl Pattern {
    pub fn trigger_domain(&self) -> &str {
        &self.domains[0]
    }
}

/// An approved or manually created automation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "AutomationRecord")]
pub struct Automation {
    pub id: String,
    pub pattern_id: Option<String>,
    pub trigger: DomainRef,
    pub actions: Vec<DomainRef>,
    pub category: Category,
    pub active: bool,
    pub created_at: i64,
    pub last_used: Option<i64>,
    pub execution_count: u32,
    pub is_multi_tab: bool,
}

impl Automation {
    pub fn action_domains(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.domain.as_str()).collect()
    }
}

/// Stored form of an automation, accepting the older single-`action` layout
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutomationRecord {
    id: String,
    #[serde(default)]
    pattern_id: Option<String>,
    trigger: DomainRef,
    #[serde(default)]
    actions: Option<Vec<DomainRef>>,
    #[serde(default)]
    action: Option<DomainRef>,
    #[serde(default)]
    category: Category,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    last_used: Option<i64>,
    #[serde(default)]
    execution_count: u32,
}

fn default_active() -> bool {
    true
}

impl TryFrom<AutomationRecord> for Automation {
    type Error = String;

    fn try_from(record: AutomationRecord) -> Result<Self, Self::Error> {
        let actions = match (record.actions, record.action) {
            (Some(actions), _) if !actions.is_empty() => actions,
            (_, Some(action)) => vec![action],
            _ => return Err(format!("automation {} has no actions", record.id)),
        };
        Ok(Automation {
            id: record.id,
            pattern_id: record.pattern_id,
            trigger: record.trigger,
            is_multi_tab: actions.len() > 1,
            actions,
            category: record.category,
            active: record.active,
            created_at: record.created_at,
            last_used: record.last_used,
            execution_count: record.execution_count,
        })
    }
}

/// A tab opened by an automation, remembered against the tab that triggered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTab {
    pub tab_id: i64,
    pub domain: String,
    pub automation_id: String,
    pub opened_at: i64,
}
