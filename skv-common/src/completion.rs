//! Safe node-completion transaction
//!
//! Marks a node complete for a learner exactly once and credits the node's XP
//! exactly once, however many times (and however concurrently) the request is
//! repeated.
//!
//! Record creation, XP credit and level recompute share one SQLite write
//! transaction:
//!
//! 1. `INSERT ... ON CONFLICT(learner_id, node_id) DO NOTHING` on
//!    `node_completions`. Zero rows affected means another request already
//!    completed the node; nothing else is written.
//! 2. `UPDATE learner_profiles SET xp = xp + ?` as an atomic increment.
//! 3. Level recomputed from the new XP via [`LevelProgression`].
//! 4. Commit.
//!
//! A failure anywhere rolls back the whole unit, so a completion record never
//! exists without its XP credit. The unit is retried on transient errors.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::progression::LevelProgression;
use crate::retry::{self, RetryPolicy};
use crate::{Error, Result};

/// Machine-readable failure description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ErrorDetail {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome reported to the calling route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub success: bool,
    pub already_completed: bool,
    pub xp_gained: i64,
    /// Learner's XP after the credit (first completion only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_xp: Option<i64>,
    /// Learner's level after the credit (first completion only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl CompletionResult {
    fn credited(xp_gained: i64, new_xp: i64, level: i64) -> Self {
        Self {
            success: true,
            already_completed: false,
            xp_gained,
            new_xp: Some(new_xp),
            level: Some(level),
            error: None,
        }
    }

    fn already_completed() -> Self {
        Self {
            success: true,
            already_completed: true,
            xp_gained: 0,
            new_xp: None,
            level: None,
            error: None,
        }
    }

    fn failed(err: &Error) -> Self {
        Self {
            success: false,
            already_completed: false,
            xp_gained: 0,
            new_xp: None,
            level: None,
            error: Some(ErrorDetail::from(err)),
        }
    }
}

enum Outcome {
    AlreadyCompleted,
    Credited { new_xp: i64, level: i64 },
}

/// Complete `node_id` for `learner_id`, crediting `xp_reward` on the first
/// completion only.
///
/// Never returns an error: failures are reported as `success: false` with an
/// [`ErrorDetail`]. An already-completed node is a success with zero XP.
pub async fn complete_node(
    pool: &SqlitePool,
    progression: &dyn LevelProgression,
    policy: &RetryPolicy,
    learner_id: i64,
    node_id: i64,
    xp_reward: i64,
) -> CompletionResult {
    if xp_reward < 0 {
        let err = Error::InvalidInput(format!("XP reward must be non-negative, got {}", xp_reward));
        return CompletionResult::failed(&err);
    }

    let outcome = retry::retry("node completion", policy, || {
        record_completion(pool, progression, learner_id, node_id, xp_reward)
    })
    .await;

    match outcome {
        Ok(Outcome::Credited { new_xp, level }) => {
            info!(learner_id, node_id, xp_reward, new_xp, level, "Node completed");
            CompletionResult::credited(xp_reward, new_xp, level)
        }
        Ok(Outcome::AlreadyCompleted) => {
            debug!(learner_id, node_id, "Node already completed, no XP credited");
            CompletionResult::already_completed()
        }
        Err(err) => {
            error!(learner_id, node_id, error = %err, "Node completion failed");
            CompletionResult::failed(&err)
        }
    }
}

/// One attempt of the completion unit. Dropping `tx` on any early return
/// rolls the attempt back.
async fn record_completion(
    pool: &SqlitePool,
    progression: &dyn LevelProgression,
    learner_id: i64,
    node_id: i64,
    xp_reward: i64,
) -> Result<Outcome> {
    let mut tx = pool.begin().await?;

    let created = sqlx::query(
        r#"
        INSERT INTO node_completions (learner_id, node_id)
        VALUES (?, ?)
        ON CONFLICT(learner_id, node_id) DO NOTHING
        "#,
    )
    .bind(learner_id)
    .bind(node_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| missing_reference(e, learner_id, node_id))?
    .rows_affected()
        == 1;

    if !created {
        tx.rollback().await?;
        return Ok(Outcome::AlreadyCompleted);
    }

    let new_xp: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE learner_profiles
        SET xp = xp + ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        RETURNING xp
        "#,
    )
    .bind(xp_reward)
    .bind(learner_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(new_xp) = new_xp else {
        return Err(Error::NotFound(format!("Learner profile {}", learner_id)));
    };

    let level = progression.level_for(new_xp);
    sqlx::query("UPDATE learner_profiles SET level = ? WHERE id = ?")
        .bind(level)
        .bind(learner_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Outcome::Credited { new_xp, level })
}

/// Foreign-key failures on insert mean the learner or node does not exist
fn missing_reference(err: sqlx::Error, learner_id: i64, node_id: i64) -> Error {
    let is_fk = matches!(&err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation());
    if is_fk {
        Error::NotFound(format!("Learner {} or node {}", learner_id, node_id))
    } else {
        Error::Database(err)
    }
}
