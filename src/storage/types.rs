use thiserror::Error;

/// SQLite primary result codes that mean the state file is held elsewhere.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";
const SQLITE_CANTOPEN: &str = "14";

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The state database is held by another dishdeck process.
    #[error("state database is in use by another dishdeck instance")]
    InstanceLocked,

    #[error("state database migration failed: {0}")]
    Migration(String),

    #[error("state database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, mapping busy/locked/can't-open to `InstanceLocked`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err) {
            DatabaseError::InstanceLocked
        } else {
            DatabaseError::Other(err)
        }
    }
}

pub(crate) fn is_lock_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            // Extended codes carry the primary code in the low byte
            let primary = code
                .parse::<u32>()
                .map(|c| (c & 0xff).to_string())
                .unwrap_or_else(|_| code.to_string());
            matches!(
                primary.as_str(),
                SQLITE_BUSY | SQLITE_LOCKED | SQLITE_CANTOPEN
            )
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_locks() {
        assert!(!is_lock_error(&sqlx::Error::RowNotFound));
        assert!(matches!(
            DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut),
            DatabaseError::Other(_)
        ));
    }

    #[test]
    fn test_messages() {
        assert!(DatabaseError::InstanceLocked
            .to_string()
            .contains("another dishdeck instance"));
        assert!(DatabaseError::Migration("boom".to_string())
            .to_string()
            .ends_with("boom"));
    }
}
