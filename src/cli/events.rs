//! Event intake commands: record, replay, list

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{format_timestamp, patterns, truncate};
use crate::engine::{Engine, Navigation};
use crate::model::{Event, EventType};

pub async fn record(
    engine: &Engine,
    url: String,
    event_type: &str,
    tab_id: i64,
    title: Option<String>,
) -> Result<()> {
    let event_type = EventType::parse(event_type)
        .ok_or_else(|| anyhow::anyhow!("Unknown event type: {}", event_type))?;

    let navigation = Navigation {
        event_type,
        url,
        tab_id,
        title: title.unwrap_or_default(),
    };

    let outcome = engine.observe(&navigation)?;
    if let Some(reason) = outcome.rejected {
        println!("Skipped ({:?})", reason);
        return Ok(());
    }

    println!("✅ Recorded {}", navigation.url);
    if outcome.should_detect_patterns {
        patterns::detect(engine).await?;
    }
    Ok(())
}

/// Feed a JSON-lines file of already-recorded events through the log
pub async fn replay(engine: &Engine, path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut count = 0;
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: Event = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", line_number + 1))?;
        let outcome = engine.record_and_maybe_detect(event)?;
        count += 1;

        if outcome.should_detect_patterns {
            patterns::detect(engine).await?;
        }
    }

    println!("Replayed {} events", count);
    Ok(())
}

pub fn list(engine: &Engine, limit: usize) -> Result<()> {
    let events = engine.events()?;
    if events.is_empty() {
        println!("No events recorded yet.");
        return Ok(());
    }

    println!("{:<12} {:<14} {:<8} {:<25} {}", "Time", "Type", "Tab", "Domain", "Title");
    println!("{}", "-".repeat(90));

    let start = events.len().saturating_sub(limit);
    for event in &events[start..] {
        println!(
            "{:<12} {:<14} {:<8} {:<25} {}",
            format_timestamp(event.timestamp),
            event.event_type.as_str(),
            event.tab_id,
            truncate(&event.domain, 25),
            truncate(&event.title, 30),
        );
    }
    Ok(())
}
