//! Learner profile queries

use sqlx::SqlitePool;

use super::models::LearnerProfile;
use crate::Result;

pub async fn create_learner(pool: &SqlitePool, display_name: &str) -> Result<LearnerProfile> {
    let profile = sqlx::query_as::<_, LearnerProfile>(
        "INSERT INTO learner_profiles (display_name) VALUES (?) RETURNING *",
    )
    .bind(display_name)
    .fetch_one(pool)
    .await?;

    Ok(profile)
}

pub async fn get_profile(pool: &SqlitePool, learner_id: i64) -> Result<Option<LearnerProfile>> {
    let profile = sqlx::query_as::<_, LearnerProfile>("SELECT * FROM learner_profiles WHERE id = ?")
        .bind(learner_id)
        .fetch_optional(pool)
        .await?;

    Ok(profile)
}

pub async fn count_completions(pool: &SqlitePool, learner_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM node_completions WHERE learner_id = ?")
        .bind(learner_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn has_completed(pool: &SqlitePool, learner_id: i64, node_id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM node_completions WHERE learner_id = ? AND node_id = ?)",
    )
    .bind(learner_id)
    .bind(node_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}
