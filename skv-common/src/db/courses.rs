//! Course, node and rating queries

use sqlx::SqlitePool;

use super::models::{Course, Node, RatingSummary, TreeNode};
use crate::Result;

pub async fn create_course(pool: &SqlitePool, title: &str) -> Result<Course> {
    let course = sqlx::query_as::<_, Course>("INSERT INTO courses (title) VALUES (?) RETURNING *")
        .bind(title)
        .fetch_one(pool)
        .await?;

    Ok(course)
}

pub async fn get_course(pool: &SqlitePool, course_id: i64) -> Result<Option<Course>> {
    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(course_id)
        .fetch_optional(pool)
        .await?;

    Ok(course)
}

/// Create a node; `xp_reward` defaults to the column default (100)
pub async fn create_node(
    pool: &SqlitePool,
    course_id: i64,
    node_type_id: Option<i64>,
    title: &str,
    xp_reward: Option<i64>,
) -> Result<Node> {
    let node = sqlx::query_as::<_, Node>(
        r#"
        INSERT INTO nodes (course_id, node_type_id, title, xp_reward)
        VALUES (?, ?, ?, COALESCE(?, 100))
        RETURNING *
        "#,
    )
    .bind(course_id)
    .bind(node_type_id)
    .bind(title)
    .bind(xp_reward)
    .fetch_one(pool)
    .await?;

    Ok(node)
}

pub async fn get_node(pool: &SqlitePool, node_id: i64) -> Result<Option<Node>> {
    let node = sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = ?")
        .bind(node_id)
        .fetch_optional(pool)
        .await?;

    Ok(node)
}

/// `to_node_id` requires `from_node_id` to be completed first
pub async fn add_edge(pool: &SqlitePool, from_node_id: i64, to_node_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO node_edges (from_node_id, to_node_id) VALUES (?, ?)")
        .bind(from_node_id)
        .bind(to_node_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Nodes of a course with completion and unlock status for one learner.
///
/// A node is unlocked when none of its direct predecessors is left
/// uncompleted. Optionally restricted to one node type.
pub async fn list_tree(
    pool: &SqlitePool,
    course_id: i64,
    learner_id: i64,
    node_type_id: Option<i64>,
) -> Result<Vec<TreeNode>> {
    let nodes = sqlx::query_as::<_, TreeNode>(
        r#"
        SELECT
            n.id,
            n.title,
            t.name AS node_type,
            n.xp_reward,
            EXISTS(
                SELECT 1 FROM node_completions c
                WHERE c.node_id = n.id AND c.learner_id = ?1
            ) AS completed,
            NOT EXISTS(
                SELECT 1 FROM node_edges e
                WHERE e.to_node_id = n.id
                  AND NOT EXISTS(
                      SELECT 1 FROM node_completions p
                      WHERE p.node_id = e.from_node_id AND p.learner_id = ?1
                  )
            ) AS unlocked
        FROM nodes n
        LEFT JOIN node_types t ON t.id = n.node_type_id
        WHERE n.course_id = ?2
          AND (?3 IS NULL OR n.node_type_id = ?3)
        ORDER BY n.id
        "#,
    )
    .bind(learner_id)
    .bind(course_id)
    .bind(node_type_id)
    .fetch_all(pool)
    .await?;

    Ok(nodes)
}

pub async fn rating_summary(pool: &SqlitePool, course_id: i64) -> Result<RatingSummary> {
    let (count, average): (i64, Option<f64>) =
        sqlx::query_as("SELECT COUNT(*), AVG(score) FROM course_ratings WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(pool)
            .await?;

    Ok(RatingSummary {
        course_id,
        count,
        average,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;
    use crate::db::learners::create_learner;

    #[tokio::test]
    async fn test_node_reward_defaults_to_100() {
        let pool = init_memory_database().await.unwrap();
        let course = create_course(&pool, "Graphs").await.unwrap();

        let node = create_node(&pool, course.id, None, "BFS", None).await.unwrap();
        assert_eq!(node.xp_reward, 100);

        let custom = create_node(&pool, course.id, None, "DFS", Some(40)).await.unwrap();
        assert_eq!(custom.xp_reward, 40);
    }

    #[tokio::test]
    async fn test_tree_unlock_follows_prerequisites() {
        let pool = init_memory_database().await.unwrap();
        let learner = create_learner(&pool, "Ada").await.unwrap();
        let course = create_course(&pool, "Rust").await.unwrap();
        let basics = create_node(&pool, course.id, None, "Basics", None).await.unwrap();
        let traits = create_node(&pool, course.id, None, "Traits", None).await.unwrap();
        add_edge(&pool, basics.id, traits.id).await.unwrap();

        let tree = list_tree(&pool, course.id, learner.id, None).await.unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree[0].unlocked && !tree[0].completed);
        assert!(!tree[1].unlocked);

        sqlx::query("INSERT INTO node_completions (learner_id, node_id) VALUES (?, ?)")
            .bind(learner.id)
            .bind(basics.id)
            .execute(&pool)
            .await
            .unwrap();

        let tree = list_tree(&pool, course.id, learner.id, None).await.unwrap();
        assert!(tree[0].completed);
        assert!(tree[1].unlocked);
    }

    #[tokio::test]
    async fn test_tree_filters_by_type() {
        let pool = init_memory_database().await.unwrap();
        let learner = create_learner(&pool, "Ada").await.unwrap();
        let course = create_course(&pool, "Rust").await.unwrap();
        let quiz_id: i64 = sqlx::query_scalar("SELECT id FROM node_types WHERE name = 'quiz'")
            .fetch_one(&pool)
            .await
            .unwrap();
        create_node(&pool, course.id, None, "Read", None).await.unwrap();
        create_node(&pool, course.id, Some(quiz_id), "Check", None).await.unwrap();

        let quizzes = list_tree(&pool, course.id, learner.id, Some(quiz_id)).await.unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].node_type.as_deref(), Some("quiz"));
    }

    #[tokio::test]
    async fn test_rating_summary_empty_course() {
        let pool = init_memory_database().await.unwrap();
        let course = create_course(&pool, "Rust").await.unwrap();

        let summary = rating_summary(&pool, course.id).await.unwrap();
        assert_eq!(summary.count, 0);
        assert!(summary.average.is_none());
    }
}
