//! Database models and queries

pub mod courses;
pub mod init;
pub mod learners;
pub mod migrations;
pub mod models;
pub mod settings;

pub use init::*;
pub use models::*;
