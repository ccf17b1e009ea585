//! Pattern commands

use anyhow::Result;

use super::{short_id, truncate};
use crate::engine::{DetectionStatus, Engine};

pub async fn detect(engine: &Engine) -> Result<()> {
    println!("🔍 Analyzing navigation patterns...");
    let outcome = engine.detect_patterns().await?;

    match outcome.status {
        DetectionStatus::NotEnoughEvents => {
            println!("Not enough events yet.");
            return Ok(());
        }
        DetectionStatus::RateLimited => {
            println!("Detection rate limit reached, try again later.");
            return Ok(());
        }
        DetectionStatus::Completed => {}
    }

    if outcome.patterns_to_save.is_empty() {
        println!("No new patterns found.");
        return Ok(());
    }

    for (trigger, patterns) in &outcome.patterns_by_trigger {
        if patterns.len() == 1 {
            println!("\n📢 New pattern for {}", trigger);
        } else {
            println!("\n📢 {} patterns start at {} (pick one)", patterns.len(), trigger);
        }
        for pattern in patterns {
            println!(
                "   {} [{}] {} ({}x, confidence {:.2})",
                short_id(&pattern.id),
                pattern.category,
                pattern.description,
                pattern.occurrences,
                pattern.confidence,
            );
        }
    }
    Ok(())
}

pub fn list(engine: &Engine) -> Result<()> {
    let patterns = engine.patterns()?;
    if patterns.is_empty() {
        println!("No patterns found. Run 'autosense detect' after browsing a while.");
        return Ok(());
    }

    println!(
        "{:<10} {:<14} {:<6} {:<6} {}",
        "ID", "Category", "Seen", "Conf", "Signature"
    );
    println!("{}", "-".repeat(90));
    for p in patterns {
        println!(
            "{:<10} {:<14} {:<6} {:<6.2} {}",
            short_id(&p.id),
            p.category.as_str(),
            p.occurrences,
            p.confidence,
            truncate(&p.signature, 60),
        );
    }
    Ok(())
}

fn resolve(engine: &Engine, query: &str) -> Result<String> {
    engine
        .patterns()?
        .into_iter()
        .find(|p| p.id.starts_with(query))
        .map(|p| p.id)
        .ok_or_else(|| anyhow::anyhow!("Pattern not found: {}", query))
}

pub fn approve(engine: &Engine, query: &str) -> Result<()> {
    let id = resolve(engine, query)?;
    let automation = engine.approve_pattern(&id)?;
    println!(
        "✅ Automation activated: when you visit {}, {} will open automatically.",
        automation.trigger.domain,
        automation.action_domains().join(", ")
    );
    Ok(())
}

pub fn dismiss(engine: &Engine, query: &str) -> Result<()> {
    let id = resolve(engine, query)?;
    engine.dismiss_pattern(&id)?;
    println!("Dismissed pattern {}", short_id(&id));
    Ok(())
}
