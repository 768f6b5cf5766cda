pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod interactive;
pub mod utils;

#[cfg(test)]
pub mod tests;

// Re-export commonly used item
pub use error::{IndexSyncError, IndexSyncResult};
