pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

pub use config::Config;
pub use engine::{Engine, TabOpener};
pub use error::{Error, Result};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
