//! Trigger matching for a freshly loaded domain

use crate::domain::normalize_domain;
use crate::model::Automation;

/// Active automations whose trigger matches a loaded domain
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationMatch {
    /// Normalized domain that was matched against
    pub domain: String,
    pub automations: Vec<Automation>,
}

/// What the caller should do with a match
#[derive(Debug, Clone, PartialEq)]
pub enum MatchRouting {
    None,
    /// Exactly one candidate: run it straight away
    Execute(Automation),
    /// Several candidates: the user picks one
    Choose(Vec<Automation>),
}

impl AutomationMatch {
    pub fn routing(&self) -> MatchRouting {
        match self.automations.as_slice() {
            [] => MatchRouting::None,
            [single] => MatchRouting::Execute(single.clone()),
            many => MatchRouting::Choose(many.to_vec()),
        }
    }
}

pub fn match_automations(domain: &str, automations: &[Automation]) -> AutomationMatch {
    let normalized = normalize_domain(domain);
    let matching = automations
        .iter()
        .filter(|a| a.active && normalize_domain(&a.trigger.domain) == normalized)
        .cloned()
        .collect();

    AutomationMatch {
        domain: normalized,
        automations: matching,
    }
}
