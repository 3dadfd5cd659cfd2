//! HTTP API handlers for skv-progress

pub mod completion;
pub mod error;
pub mod health;
pub mod learner;
pub mod profile;
pub mod ratings;
pub mod tree;

pub use completion::complete_node;
pub use error::ApiError;
pub use health::health_routes;
pub use learner::{LearnerId, LEARNER_HEADER};
pub use profile::learner_profile;
pub use ratings::{rating_summary, submit_rating};
pub use tree::course_tree;
