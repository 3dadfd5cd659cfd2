//! Authenticated learner identity
//!
//! Sessions are handled by the upstream gateway, which forwards the
//! authenticated learner's id in `X-Learner-Id`. Requests without a valid id
//! are rejected with 401.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

pub const LEARNER_HEADER: &str = "x-learner-id";

/// Id of the learner making the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnerId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for LearnerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(LEARNER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Learner-Id header".to_string()))?;

        value
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(LearnerId)
            .ok_or_else(|| ApiError::Unauthorized("Malformed X-Learner-Id header".to_string()))
    }
}
