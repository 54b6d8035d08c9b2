// taskbot - per-user to-do lists over SQLite with a chat command front end

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

// Re-export main types for convenience
pub use commands::{Command, Cooldown, Dispatcher, ParseError};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use models::Task;
pub use store::{DEFAULT_PAGE_SIZE, TaskStore};
