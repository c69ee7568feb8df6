use crate::domain::repository::RepositoryError;

pub mod memory;
pub mod postgres;
pub mod query;
pub mod result;
pub mod schema;

/// Translate a driver error, constraint violations keep their meaning
pub fn database_error(error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            RepositoryError::UniqueViolation(
                db_error
                    .constraint()
                    .unwrap_or("library item")
                    .to_string(),
            )
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        _ => {
            tracing::error!("Database error: {}", error);
            RepositoryError::DatabaseError(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_is_not_found() {
        assert_eq!(
            database_error(sqlx::Error::RowNotFound),
            RepositoryError::NotFound
        );
    }

    #[test]
    fn pool_errors_are_database_errors() {
        assert!(matches!(
            database_error(sqlx::Error::PoolTimedOut),
            RepositoryError::DatabaseError(_)
        ));
    }
}
