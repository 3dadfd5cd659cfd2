//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LearnerProfile {
    pub id: i64,
    pub display_name: String,
    pub xp: i64,
    pub level: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Node {
    pub id: i64,
    pub course_id: i64,
    pub node_type_id: Option<i64>,
    pub title: String,
    pub xp_reward: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseRating {
    pub id: i64,
    pub course_id: i64,
    pub learner_id: i64,
    pub score: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: DateTime<Utc>,
}

/// Node of a course tree as seen by one learner
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TreeNode {
    pub id: i64,
    pub title: String,
    pub node_type: Option<String>,
    pub xp_reward: i64,
    pub completed: bool,
    /// No prerequisites, or every prerequisite completed
    pub unlocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSummary {
    pub course_id: i64,
    pub count: i64,
    pub average: Option<f64>,
}
