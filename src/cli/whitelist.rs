use anyhow::Result;

use crate::engine::Engine;

pub fn list(engine: &Engine) -> Result<()> {
    let whitelist = engine.whitelist()?;
    if whitelist.is_empty() {
        println!("Whitelist is empty: every domain is recorded.");
        return Ok(());
    }
    for domain in whitelist {
        println!("{}", domain);
    }
    Ok(())
}

pub fn add(engine: &Engine, domain: &str) -> Result<()> {
    let normalized = engine.add_to_whitelist(domain)?;
    println!("Added '{}' to the whitelist", normalized);
    Ok(())
}

pub fn remove(engine: &Engine, domain: &str) -> Result<()> {
    engine.remove_from_whitelist(domain)?;
    println!("Removed '{}' from the whitelist", domain);
    Ok(())
}
