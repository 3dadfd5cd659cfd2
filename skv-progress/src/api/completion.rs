//! Node completion endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use skv_common::db::courses::get_node;

use super::{ApiError, LearnerId};
use crate::AppState;

/// POST /api/courses/:course_id/nodes/:node_id/complete
///
/// Credits the node's configured XP reward on the first completion only.
/// 200 on success (including an already-completed node), 500 on failure;
/// the body is the completion result either way.
pub async fn complete_node(
    State(state): State<AppState>,
    LearnerId(learner_id): LearnerId,
    Path((course_id, node_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let node = get_node(&state.db, node_id)
        .await?
        .filter(|node| node.course_id == course_id)
        .ok_or_else(|| ApiError::NotFound(format!("Node {} in course {}", node_id, course_id)))?;

    let result = skv_common::complete_node(
        &state.db,
        state.progression.as_ref(),
        &state.settings.completion_retry,
        learner_id,
        node.id,
        node.xp_reward,
    )
    .await;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(result)).into_response())
}
