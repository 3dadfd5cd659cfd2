//! Course skill tree for the requesting learner

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use skv_common::db::courses::{get_course, list_tree};
use skv_common::db::models::TreeNode;

use super::{ApiError, LearnerId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    /// Restrict to one node type, by name
    #[serde(rename = "type")]
    pub node_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TreeResponse {
    pub course_id: i64,
    pub learner_id: i64,
    pub nodes: Vec<TreeNode>,
}

/// GET /api/courses/:course_id/tree?type=<name>
pub async fn course_tree(
    State(state): State<AppState>,
    LearnerId(learner_id): LearnerId,
    Path(course_id): Path<i64>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>, ApiError> {
    if get_course(&state.db, course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Course {}", course_id)));
    }

    let node_type_id = match query.node_type.as_deref() {
        Some(name) => Some(
            state
                .node_types
                .resolve(&state.db, name)
                .await?
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown node type: {}", name)))?,
        ),
        None => None,
    };

    let nodes = list_tree(&state.db, course_id, learner_id, node_type_id).await?;

    Ok(Json(TreeResponse {
        course_id,
        learner_id,
        nodes,
    }))
}
