//! Stats, search and data reset

use anyhow::Result;

use super::format_timestamp;
use crate::engine::Engine;

pub fn stats(engine: &Engine) -> Result<()> {
    let stats = engine.stats()?;
    println!("Events:             {}", stats.events);
    println!("Patterns:           {}", stats.patterns);
    println!(
        "Automations:        {} ({} active)",
        stats.automations, stats.active_automations
    );
    println!("Total executions:   {}", stats.total_executions);
    println!("Storage:            {} bytes", stats.storage_bytes);
    Ok(())
}

pub fn search(engine: &Engine, query: &str) -> Result<()> {
    let results = engine.search(query)?;

    println!("Automations ({}):", results.automations.len());
    for a in &results.automations {
        println!("   {} → {}", a.trigger.domain, a.action_domains().join(", "));
    }

    println!("Patterns ({}):", results.patterns.len());
    for p in &results.patterns {
        println!("   {}", p.description);
    }

    println!("Recent events ({}):", results.events.len());
    for e in &results.events {
        println!("   {} {}", format_timestamp(e.timestamp), e.url);
    }
    Ok(())
}

pub async fn clear(engine: &Engine, yes: bool) -> Result<()> {
    if !yes {
        println!("This deletes every event, pattern and automation. Re-run with --yes.");
        return Ok(());
    }
    engine.clear_data().await?;
    println!("All data cleared.");
    Ok(())
}
