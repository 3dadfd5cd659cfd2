//! Course rating endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use skv_common::db::courses::{self, get_course};
use skv_common::db::learners::get_profile;
use skv_common::db::models::{CourseRating, RatingSummary};
use skv_common::upsert::{upsert_course_rating, RatingInput};

use super::{ApiError, LearnerId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    /// 1 to 5
    pub score: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub rating: CourseRating,
    /// True when this submission created the rating
    pub created: bool,
}

/// POST /api/courses/:course_id/ratings
///
/// One rating per learner and course; resubmitting overwrites score and
/// comment. 201 when created, 200 when updated.
pub async fn submit_rating(
    State(state): State<AppState>,
    LearnerId(learner_id): LearnerId,
    Path(course_id): Path<i64>,
    payload: Result<Json<RatingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RatingResponse>), ApiError> {
    let Json(request) = payload?;

    if !(1..=5).contains(&request.score) {
        return Err(ApiError::BadRequest(format!(
            "Score must be between 1 and 5, got {}",
            request.score
        )));
    }

    if get_course(&state.db, course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Course {}", course_id)));
    }
    if get_profile(&state.db, learner_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Learner {}", learner_id)));
    }

    let input = RatingInput {
        course_id,
        learner_id,
        score: request.score,
        comment: request.comment.filter(|c| !c.trim().is_empty()),
    };
    let outcome = upsert_course_rating(&state.db, &state.settings.rating_retry, &input).await?;

    tracing::info!(
        course_id,
        learner_id,
        score = input.score,
        created = outcome.inserted,
        "Course rating stored"
    );

    let status = if outcome.inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(RatingResponse {
            rating: outcome.row,
            created: outcome.inserted,
        }),
    ))
}

/// GET /api/courses/:course_id/ratings/summary
pub async fn rating_summary(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> Result<Json<RatingSummary>, ApiError> {
    if get_course(&state.db, course_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Course {}", course_id)));
    }

    let summary = courses::rating_summary(&state.db, course_id).await?;
    Ok(Json(summary))
}
