//! Integration tests for course rating upserts

use futures::future::join_all;
use skv_common::db::courses::{create_course, rating_summary};
use skv_common::db::init::init_database;
use skv_common::db::learners::create_learner;
use skv_common::upsert::{upsert_course_rating, RatingInput};
use skv_common::RetryPolicy;
use tempfile::TempDir;

#[tokio::test]
async fn test_sequential_ratings_converge_to_last_score() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("skilvania.db")).await.unwrap();
    let learner = create_learner(&pool, "Barbara").await.unwrap();
    let course = create_course(&pool, "Distributed Systems").await.unwrap();
    let policy = RetryPolicy::default();

    for score in [2, 4] {
        let input = RatingInput {
            course_id: course.id,
            learner_id: learner.id,
            score,
            comment: Some(format!("now {}", score)),
        };
        upsert_course_rating(&pool, &policy, &input).await.unwrap();
    }

    let (count, score, comment): (i64, i64, Option<String>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(score), MAX(comment) FROM course_ratings WHERE course_id = ? AND learner_id = ?",
    )
    .bind(course.id)
    .bind(learner.id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(count, 1);
    assert_eq!(score, 4);
    assert_eq!(comment.as_deref(), Some("now 4"));
}

#[tokio::test]
async fn test_concurrent_ratings_leave_one_row() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("skilvania.db")).await.unwrap();
    let learner = create_learner(&pool, "Barbara").await.unwrap();
    let course = create_course(&pool, "Distributed Systems").await.unwrap();
    let policy = RetryPolicy::default();

    let inputs: Vec<RatingInput> = (0..10)
        .map(|i| RatingInput {
            course_id: course.id,
            learner_id: learner.id,
            score: (i % 5) + 1,
            comment: None,
        })
        .collect();

    let results = join_all(
        inputs
            .iter()
            .map(|input| upsert_course_rating(&pool, &policy, input)),
    )
    .await;

    let outcomes: Vec<_> = results
        .into_iter()
        .map(|r| r.expect("no duplicate-key error escapes"))
        .collect();
    assert_eq!(outcomes.iter().filter(|o| o.inserted).count(), 1);

    let first_id = outcomes[0].row.id;
    assert!(outcomes.iter().all(|o| o.row.id == first_id));

    let summary = rating_summary(&pool, course.id).await.unwrap();
    assert_eq!(summary.count, 1);
}

#[tokio::test]
async fn test_ratings_from_different_learners_are_separate() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("skilvania.db")).await.unwrap();
    let course = create_course(&pool, "Compilers").await.unwrap();
    let policy = RetryPolicy::default();

    for (name, score) in [("Ken", 5), ("Dennis", 3)] {
        let learner = create_learner(&pool, name).await.unwrap();
        let input = RatingInput {
            course_id: course.id,
            learner_id: learner.id,
            score,
            comment: None,
        };
        let outcome = upsert_course_rating(&pool, &policy, &input).await.unwrap();
        assert!(outcome.inserted);
    }

    let summary = rating_summary(&pool, course.id).await.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.average, Some(4.0));
}
