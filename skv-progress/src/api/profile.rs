//! Learner profile endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use skv_common::db::learners::{count_completions, get_profile};

use super::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub display_name: String,
    pub xp: i64,
    pub level: i64,
    pub completed_nodes: i64,
}

/// GET /api/learners/:learner_id/profile
pub async fn learner_profile(
    State(state): State<AppState>,
    Path(learner_id): Path<i64>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = get_profile(&state.db, learner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Learner {}", learner_id)))?;
    let completed_nodes = count_completions(&state.db, learner_id).await?;

    Ok(Json(ProfileResponse {
        id: profile.id,
        display_name: profile.display_name,
        xp: profile.xp,
        level: profile.level,
        completed_nodes,
    }))
}
