//! Automation commands

use anyhow::Result;

use super::{format_timestamp, short_id, truncate};
use crate::engine::{DomainLoadOutcome, Engine, ExecutionReport};
use crate::model::{Automation, Category};

fn parse_category(category: Option<String>) -> Result<Option<Category>> {
    category
        .map(|c| Category::parse(&c).ok_or_else(|| anyhow::anyhow!("Unknown category: {}", c)))
        .transpose()
}

fn resolve(engine: &Engine, query: &str) -> Result<Automation> {
    engine
        .automations()?
        .into_iter()
        .find(|a| a.id.starts_with(query))
        .ok_or_else(|| anyhow::anyhow!("Automation not found: {}", query))
}

fn print_report(report: &ExecutionReport) {
    println!(
        "🚀 Opened {} tab(s) for {}",
        report.opened_tab_ids.len(),
        short_id(&report.automation_id)
    );
    for domain in &report.failed_domains {
        println!("   ⚠ could not open {}", domain);
    }
}

pub fn list(engine: &Engine) -> Result<()> {
    let automations = engine.automations()?;
    if automations.is_empty() {
        println!("No automations yet. Approve a pattern or create one.");
        return Ok(());
    }

    println!(
        "{:<10} {:<7} {:<14} {:<6} {:<12} {:<22} {}",
        "ID", "Active", "Category", "Runs", "Last Used", "Trigger", "Actions"
    );
    println!("{}", "-".repeat(100));
    for a in automations {
        println!(
            "{:<10} {:<7} {:<14} {:<6} {:<12} {:<22} {}",
            short_id(&a.id),
            if a.active { "yes" } else { "no" },
            a.category.as_str(),
            a.execution_count,
            a.last_used.map(format_timestamp).unwrap_or_else(|| "-".to_string()),
            truncate(&a.trigger.domain, 22),
            a.action_domains().join(", "),
        );
    }
    Ok(())
}

pub fn create(
    engine: &Engine,
    trigger: String,
    actions: Vec<String>,
    category: Option<String>,
) -> Result<()> {
    let automation = engine.create_automation(&trigger, &actions, parse_category(category)?)?;
    println!(
        "Automation {} created: {} → {}",
        short_id(&automation.id),
        automation.trigger.domain,
        automation.action_domains().join(", ")
    );
    Ok(())
}

pub fn toggle(engine: &Engine, query: &str) -> Result<()> {
    let automation = resolve(engine, query)?;
    let active = engine.toggle_automation(&automation.id)?;
    println!(
        "Automation {} is now {}",
        short_id(&automation.id),
        if active { "active" } else { "paused" }
    );
    Ok(())
}

pub fn edit(
    engine: &Engine,
    query: &str,
    trigger: String,
    actions: Vec<String>,
    category: Option<String>,
) -> Result<()> {
    let automation = resolve(engine, query)?;
    let updated =
        engine.edit_automation(&automation.id, &trigger, &actions, parse_category(category)?)?;
    println!(
        "Automation {} updated: {} → {}",
        short_id(&updated.id),
        updated.trigger.domain,
        updated.action_domains().join(", ")
    );
    Ok(())
}

pub fn delete(engine: &Engine, query: &str) -> Result<()> {
    let automation = resolve(engine, query)?;
    engine.delete_automation(&automation.id)?;
    println!("Deleted automation {}", short_id(&automation.id));
    Ok(())
}

pub async fn run(engine: &Engine, query: &str, trigger_tab: Option<i64>) -> Result<()> {
    let automation = resolve(engine, query)?;
    let report = engine.execute_automation(&automation.id, trigger_tab).await?;
    print_report(&report);
    Ok(())
}

pub fn matches(engine: &Engine, domain: &str) -> Result<()> {
    let matched = engine.match_automations(domain)?;
    if matched.automations.is_empty() {
        println!("No active automation triggers on {}", matched.domain);
        return Ok(());
    }

    println!("{} automation(s) trigger on {}:", matched.automations.len(), matched.domain);
    for a in &matched.automations {
        println!("   {} → {}", short_id(&a.id), a.action_domains().join(", "));
    }
    Ok(())
}

/// Simulate a finished page load on `domain`
pub async fn load(engine: &Engine, domain: &str, tab_id: Option<i64>) -> Result<()> {
    match engine.handle_domain_load(domain, tab_id).await? {
        DomainLoadOutcome::NoMatch => println!("No automation for {}", domain),
        DomainLoadOutcome::Executed(report) => print_report(&report),
        DomainLoadOutcome::Choose(matched) => {
            println!(
                "Several automations trigger on {}; run one with 'autosense automations run <id>':",
                matched.domain
            );
            for a in &matched.automations {
                println!("   {} → {}", short_id(&a.id), a.action_domains().join(", "));
            }
        }
    }
    Ok(())
}
