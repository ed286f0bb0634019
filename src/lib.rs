pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use config::SyncConfig;
pub use core::{SyncDecision, SyncEngine, SyncEvent, SyncReport};
pub use error::{SyncError, SyncResult};
