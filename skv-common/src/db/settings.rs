//! Key/value runtime settings
//!
//! Runtime configuration lives in the `settings` table. Missing or NULL values
//! are initialized with built-in defaults at startup.

use std::str::FromStr;

use sqlx::SqlitePool;
use tracing::info;

use crate::{Error, Result};

/// Built-in defaults for every runtime setting
pub const DEFAULT_SETTINGS: [(&str, &str); 6] = [
    ("completion_max_retries", "3"),
    ("completion_retry_delay_ms", "50"),
    ("rating_max_retries", "3"),
    ("rating_retry_delay_ms", "50"),
    ("xp_per_level", "100"),
    ("node_type_cache_ttl_secs", "300"),
];

/// Create the settings table
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure every runtime setting exists with a non-NULL value
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, default_value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, default_value).await?;
    }
    Ok(())
}

/// Insert `default_value` when `key` is missing, reset it when NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let existing: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some(Some(_)) => {}
        Some(None) => {
            info!("Setting '{}' is NULL, resetting to default: {}", key, default_value);
            set_setting(pool, key, default_value).await?;
        }
        None => {
            set_setting(pool, key, default_value).await?;
        }
    }

    Ok(())
}

/// Read and parse a setting, `None` if missing or NULL
pub async fn get_setting<T>(pool: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: FromStr,
{
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value.flatten() {
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("Failed to parse setting '{}' value: {}", key, s))),
        None => Ok(None),
    }
}

/// Insert or update a setting
pub async fn set_setting<T: ToString>(pool: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_defaults_initialized() {
        let pool = setup_test_db().await;
        init_default_settings(&pool).await.unwrap();

        let retries: Option<u32> = get_setting(&pool, "completion_max_retries").await.unwrap();
        assert_eq!(retries, Some(3));
        let xp: Option<i64> = get_setting(&pool, "xp_per_level").await.unwrap();
        assert_eq!(xp, Some(100));
    }

    #[tokio::test]
    async fn test_existing_value_preserved() {
        let pool = setup_test_db().await;
        set_setting(&pool, "xp_per_level", 250).await.unwrap();

        init_default_settings(&pool).await.unwrap();

        let xp: Option<i64> = get_setting(&pool, "xp_per_level").await.unwrap();
        assert_eq!(xp, Some(250));
    }

    #[tokio::test]
    async fn test_null_value_reset() {
        let pool = setup_test_db().await;
        sqlx::query("INSERT INTO settings (key, value) VALUES ('rating_max_retries', NULL)")
            .execute(&pool)
            .await
            .unwrap();

        init_default_settings(&pool).await.unwrap();

        let retries: Option<u32> = get_setting(&pool, "rating_max_retries").await.unwrap();
        assert_eq!(retries, Some(3));
    }

    #[tokio::test]
    async fn test_unparsable_value_is_config_error() {
        let pool = setup_test_db().await;
        set_setting(&pool, "completion_retry_delay_ms", "soon").await.unwrap();

        let result: Result<Option<u64>> = get_setting(&pool, "completion_retry_delay_ms").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_setting_is_none() {
        let pool = setup_test_db().await;
        let value: Option<String> = get_setting(&pool, "nope").await.unwrap();
        assert!(value.is_none());
    }
}
