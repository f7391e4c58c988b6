//! `LifeExecutor` Module
//!
//! Provides the `LifeExecutor` trait that abstracts statement execution over `may_postgres`.
//!
//! Joined queries are executed through this trait and their rows handed to the
//! graph builder. Connection management and transactions stay with the caller.

use crate::error::MaterializeError;
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// `LifeExecutor` error type
#[derive(Debug)]
pub enum LifeError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// Rows did not match the declared entity mappings
    Materialize(MaterializeError),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for LifeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {e}")
            }
            LifeError::QueryError(s) => {
                write!(f, "Query error: {s}")
            }
            LifeError::ParseError(s) => {
                write!(f, "Parse error: {s}")
            }
            LifeError::Materialize(e) => {
                write!(f, "Materialize error: {e}")
            }
            LifeError::Other(s) => {
                write!(f, "Execution error: {s}")
            }
        }
    }
}

impl std::error::Error for LifeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifeError::PostgresError(e) => Some(e),
            LifeError::Materialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for LifeError {
    fn from(err: PostgresError) -> Self {
        LifeError::PostgresError(err)
    }
}

impl From<MaterializeError> for LifeError {
    fn from(err: MaterializeError) -> Self {
        LifeError::Materialize(err)
    }
}

/// Trait for executing database operations
///
/// This trait abstracts statement execution, allowing different implementations
/// (direct client, pooled connection, transaction, etc.) to be used interchangeably.
///
/// # Examples
///
/// ```no_run
/// use lifeline::executor::{LifeError, LifeExecutor};
///
/// # fn example(executor: &dyn LifeExecutor) -> Result<(), LifeError> {
/// let rows = executor.query_all(
///     "SELECT o.id, li.id FROM orders o JOIN line_items li ON li.order_id = o.id",
///     &[],
/// )?;
/// let order_ids: Vec<i32> = rows.iter().map(|r| r.get(0)).collect();
/// # Ok(())
/// # }
/// ```
pub trait LifeExecutor {
    /// Execute a SQL statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query execution fails.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError>;

    /// Execute a query and return a single row
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query fails or does not return exactly one row.
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError>;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query execution fails.
    fn query_all(
        &self,
        query: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, LifeError>;
}

/// Implementation of `LifeExecutor` for `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Consume the executor and return the underlying client
    pub fn into_client(self) -> Client {
        self.client
    }

    fn timed<T>(
        &self,
        query: &str,
        run: impl FnOnce(&Client) -> Result<T, PostgresError>,
    ) -> Result<T, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();
        #[cfg(not(feature = "tracing"))]
        let _ = query;

        let start = Instant::now();
        let result = run(&self.client).map_err(|e| {
            #[cfg(feature = "metrics")]
            METRICS.record_query_error();
            log::debug!("query failed: {e}");
            LifeError::PostgresError(e)
        });

        let duration = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_query_duration(duration);
        log::trace!("query completed in {duration:?}");

        result
    }
}

impl LifeExecutor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.timed(query, |client| client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.timed(query, |client| client.query_one(query, params))
    }

    fn query_all(
        &self,
        query: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, LifeError> {
        self.timed(query, |client| client.query(query, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::EntityType;

    struct Order;

    #[test]
    fn test_life_error_display() {
        let err = LifeError::QueryError("test error".to_string());
        assert!(err.to_string().contains("Query error"));
    }

    #[test]
    fn test_life_error_all_variants() {
        let err = LifeError::QueryError("test".to_string());
        assert!(err.to_string().contains("Query error"));

        let err = LifeError::ParseError("test".to_string());
        assert!(err.to_string().contains("Parse error"));

        let err = LifeError::Other("test".to_string());
        assert!(err.to_string().contains("Execution error"));
    }

    #[test]
    fn test_materialize_error_converts() {
        let err: LifeError = MaterializeError::UnknownEntity {
            entity: EntityType::of::<Order>(),
        }
        .into();
        assert!(err.to_string().contains("Materialize error"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
