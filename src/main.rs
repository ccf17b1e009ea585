use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use autosense::cli::{automations, events, patterns, stats, whitelist, PrintOpener};
use autosense::config::Config;
use autosense::engine::Engine;
use autosense::logging::init_logging;
use autosense::store::SqliteStore;

#[derive(Parser)]
#[command(name = "autosense")]
#[command(about = "Detect recurring site sequences and automate them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "autosense.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a single navigation
    Record {
        /// Full URL that was visited
        url: String,

        /// Event type (tab_updated, tab_created, tab_activated, manual_entry)
        #[arg(long = "type", default_value = "tab_updated")]
        event_type: String,

        #[arg(long, default_value_t = 0)]
        tab_id: i64,

        #[arg(long)]
        title: Option<String>,
    },

    /// Replay a JSON-lines file of recorded events
    Replay {
        file: PathBuf,
    },

    /// Show the most recent events
    Events {
        #[arg(short, long, default_value_t = 30)]
        limit: usize,
    },

    /// Run a pattern detection pass
    Detect,

    /// List automations that trigger on a domain
    Match {
        domain: String,
    },

    /// Simulate a page load: runs the automation on a single match
    Load {
        domain: String,

        #[arg(long)]
        tab_id: Option<i64>,
    },

    /// Pattern management
    Patterns {
        #[command(subcommand)]
        command: PatternCommands,
    },

    /// Automation management
    Automations {
        #[command(subcommand)]
        command: AutomationCommands,
    },

    /// Whitelist management
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommands,
    },

    /// Close the tabs an automation opened from a trigger tab
    CloseRelated {
        trigger_tab: i64,

        /// Tab ids that are still open
        #[arg(long, value_delimiter = ',')]
        open: Vec<i64>,
    },

    /// Show statistics
    Stats,

    /// Search automations, patterns and events
    Search {
        query: String,
    },

    /// Delete all stored data
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PatternCommands {
    /// List detected patterns
    List,
    /// Turn a pattern into an automation
    Approve {
        /// Pattern ID (prefix)
        pattern: String,
    },
    /// Discard a pattern
    Dismiss {
        /// Pattern ID (prefix)
        pattern: String,
    },
}

#[derive(Subcommand)]
enum AutomationCommands {
    /// List automations
    List,
    /// Create an automation by hand
    Create {
        trigger: String,
        /// Domains to open, in order
        #[arg(required = true)]
        actions: Vec<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Pause or resume an automation
    Toggle {
        automation: String,
    },
    /// Replace an automation's trigger and actions
    Edit {
        automation: String,
        trigger: String,
        #[arg(required = true)]
        actions: Vec<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete an automation
    Delete {
        automation: String,
    },
    /// Execute an automation now
    Run {
        automation: String,
        #[arg(long)]
        trigger_tab: Option<i64>,
    },
}

#[derive(Subcommand)]
enum WhitelistCommands {
    List,
    Add { domain: String },
    Remove { domain: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config).unwrap_or_default();
    init_logging(&config.logging);

    // Initialize store and engine
    let store = SqliteStore::open(&config.database_path())?;
    let engine = Engine::open(config, Box::new(store), Box::new(PrintOpener::new()))?;

    match cli.command {
        Commands::Record {
            url,
            event_type,
            tab_id,
            title,
        } => {
            events::record(&engine, url, &event_type, tab_id, title).await?;
        }
        Commands::Replay { file } => {
            events::replay(&engine, &file).await?;
        }
        Commands::Events { limit } => {
            events::list(&engine, limit)?;
        }
        Commands::Detect => {
            patterns::detect(&engine).await?;
        }
        Commands::Match { domain } => {
            automations::matches(&engine, &domain)?;
        }
        Commands::Load { domain, tab_id } => {
            automations::load(&engine, &domain, tab_id).await?;
        }
        Commands::Patterns { command } => match command {
            PatternCommands::List => patterns::list(&engine)?,
            PatternCommands::Approve { pattern } => patterns::approve(&engine, &pattern)?,
            PatternCommands::Dismiss { pattern } => patterns::dismiss(&engine, &pattern)?,
        },
        Commands::Automations { command } => match command {
            AutomationCommands::List => automations::list(&engine)?,
            AutomationCommands::Create {
                trigger,
                actions,
                category,
            } => automations::create(&engine, trigger, actions, category)?,
            AutomationCommands::Toggle { automation } => {
                automations::toggle(&engine, &automation)?
            }
            AutomationCommands::Edit {
                automation,
                trigger,
                actions,
                category,
            } => automations::edit(&engine, &automation, trigger, actions, category)?,
            AutomationCommands::Delete { automation } => {
                automations::delete(&engine, &automation)?
            }
            AutomationCommands::Run {
                automation,
                trigger_tab,
            } => automations::run(&engine, &automation, trigger_tab).await?,
        },
        Commands::Whitelist { command } => match command {
            WhitelistCommands::List => whitelist::list(&engine)?,
            WhitelistCommands::Add { domain } => whitelist::add(&engine, &domain)?,
            WhitelistCommands::Remove { domain } => whitelist::remove(&engine, &domain)?,
        },
        Commands::CloseRelated { trigger_tab, open } => {
            let related = engine.take_related_tabs(trigger_tab, &open)?;
            let ids: Vec<i64> = related.iter().map(|r| r.tab_id).collect();
            let closed = engine.close_tabs(&ids);
            println!("Closed {} related tab(s)", closed);
        }
        Commands::Stats => {
            stats::stats(&engine)?;
        }
        Commands::Search { query } => {
            stats::search(&engine, &query)?;
        }
        Commands::Clear { yes } => {
            stats::clear(&engine, yes).await?;
        }
    }

    Ok(())
}
