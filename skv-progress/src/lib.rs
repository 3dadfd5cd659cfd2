//! skv-progress library - learner progress service
//!
//! HTTP surface for node completion and course ratings. Learner identity is
//! established upstream and arrives in the `X-Learner-Id` header.

use std::sync::Arc;

use axum::Router;
use skv_common::config::RuntimeSettings;
use skv_common::{LevelProgression, LinearProgression, NodeTypeCache};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cli;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Runtime settings loaded at startup
    pub settings: Arc<RuntimeSettings>,
    /// XP to level rule applied after every credit
    pub progression: Arc<dyn LevelProgression>,
    /// Node-type name lookups for tree filtering
    pub node_types: Arc<NodeTypeCache>,
}

impl AppState {
    /// Create application state with linear level progression
    pub fn new(db: SqlitePool, settings: RuntimeSettings) -> Self {
        let progression = Arc::new(LinearProgression::new(settings.xp_per_level));
        let node_types = Arc::new(NodeTypeCache::new(settings.node_type_cache_ttl));

        Self {
            db,
            settings: Arc::new(settings),
            progression,
            node_types,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route(
            "/api/courses/:course_id/nodes/:node_id/complete",
            post(api::complete_node),
        )
        .route("/api/courses/:course_id/ratings", post(api::submit_rating))
        .route(
            "/api/courses/:course_id/ratings/summary",
            get(api::rating_summary),
        )
        .route("/api/courses/:course_id/tree", get(api::course_tree))
        .route("/api/learners/:learner_id/profile", get(api::learner_profile));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
