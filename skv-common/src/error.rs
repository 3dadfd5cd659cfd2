//! Common error types for Skilvania

use thiserror::Error;

/// Common result type for Skilvania operations
pub type Result<T> = std::result::Result<T, Error>;

/// SQLite primary result codes that signal lock contention
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Common error types across Skilvania services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Lock contention (`SQLITE_BUSY`/`SQLITE_LOCKED` and their extended
    /// codes), pool acquisition timeouts and I/O failures are transient.
    /// Constraint violations, validation failures and missing rows are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(db_err) => is_transient_sqlx(db_err),
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Stable snake_case label for this error, used in API responses
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::Internal(_) => "internal",
        }
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code_is_lock = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                .unwrap_or(false);

            code_is_lock || db_err.message().contains("database is locked")
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn test_io_error_is_transient() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_validation_errors_are_not_transient() {
        assert!(!Error::InvalidInput("score out of range".to_string()).is_transient());
        assert!(!Error::NotFound("learner 7".to_string()).is_transient());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn test_closed_pool_is_not_transient() {
        // A closed pool never reopens; retrying only delays the failure
        assert!(!Error::Database(sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::NotFound("x".to_string()).kind(), "not_found");
        assert_eq!(Error::InvalidInput("x".to_string()).kind(), "invalid_input");
        assert_eq!(Error::Database(sqlx::Error::PoolTimedOut).kind(), "database");
    }
}
