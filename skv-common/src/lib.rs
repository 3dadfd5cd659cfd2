//! # Skilvania Common Library
//!
//! Shared code for the Skilvania progress services:
//! - Database bootstrap, migrations and models
//! - Retry wrapper for transient storage failures
//! - Safe upsert against uniqueness constraints
//! - Safe node-completion transaction (exactly-once XP credit)
//! - Level progression and node-type lookup cache
//! - Configuration loading

pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod node_types;
pub mod progression;
pub mod retry;
pub mod upsert;

pub use completion::{complete_node, CompletionResult, ErrorDetail};
pub use error::{Error, Result};
pub use node_types::NodeTypeCache;
pub use progression::{LevelProgression, LinearProgression};
pub use retry::{Backoff, RetryPolicy};
