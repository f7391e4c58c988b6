//! Running joined queries into entity graphs
//!
//! A joined query selects the columns of every participating entity side by
//! side. A [`FromJoinedRow`] decoder splits one database row into one optional
//! entity per lane; [`query_graph`] executes the statement and materializes the
//! result.

use crate::config::MaterializeConfig;
use crate::executor::{LifeError, LifeExecutor};
use crate::mapping::{EntityMapping, Shared};
use crate::materialize::{GraphStream, JoinedRow};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Root entity type produced by decoder `Q`
pub type RootOf<Q> = <<Q as FromJoinedRow>::Row as JoinedRow>::Root;

/// Decoder from a database row to one optional entity per lane
///
/// A lane whose key columns are all NULL is an outer join miss and decodes to
/// `None`.
///
/// # Example
///
/// ```no_run
/// use lifeline::executor::LifeError;
/// use lifeline::query::FromJoinedRow;
/// use may_postgres::Row;
///
/// struct Employee { id: i32 }
/// struct Workstation { id: i32 }
///
/// struct EmployeeWithWorkstation;
///
/// impl FromJoinedRow for EmployeeWithWorkstation {
///     type Row = (Option<Employee>, Option<Workstation>);
///
///     fn from_row(row: &Row) -> Result<Self::Row, LifeError> {
///         let employee = Employee { id: row.try_get("e_id")? };
///         let workstation = row
///             .try_get::<_, Option<i32>>("w_id")?
///             .map(|id| Workstation { id });
///         Ok((Some(employee), workstation))
///     }
/// }
/// ```
pub trait FromJoinedRow {
    type Row: JoinedRow;

    /// # Errors
    ///
    /// Returns `LifeError` when a column is missing or has an unexpected type.
    fn from_row(row: &Row) -> Result<Self::Row, LifeError>;
}

/// Execute a joined query and return its distinct root entities, fully linked
///
/// `mappings` lists one mapping per lane of `Q::Row`, in lane order. Roots are
/// returned in the order their first row arrived.
///
/// # Errors
///
/// Returns `LifeError` if the query fails, a row cannot be decoded, or the rows
/// do not match `mappings`.
pub fn query_graph<Q, E>(
    executor: &E,
    sql: &str,
    params: &[&dyn ToSql],
    mappings: impl IntoIterator<Item = Arc<EntityMapping>>,
    config: &MaterializeConfig,
) -> Result<Vec<Shared<RootOf<Q>>>, LifeError>
where
    Q: FromJoinedRow,
    E: LifeExecutor + ?Sized,
{
    let rows = executor.query_all(sql, params)?;
    log::debug!(
        "materializing {} joined rows over {} lanes",
        rows.len(),
        <Q::Row as JoinedRow>::LANES
    );

    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::materialize_span(<Q::Row as JoinedRow>::LANES).entered();

    GraphStream::new(mappings, rows.iter().map(Q::from_row), config).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaterializeError;

    #[derive(Debug, Default)]
    struct Employee {
        id: i32,
    }

    struct EmployeeOnly;

    impl FromJoinedRow for EmployeeOnly {
        type Row = (Option<Employee>,);

        fn from_row(row: &Row) -> Result<Self::Row, LifeError> {
            Ok((Some(Employee {
                id: row.try_get("id")?,
            }),))
        }
    }

    /// Executor that never reaches a database
    struct StubExecutor {
        fail: bool,
    }

    impl LifeExecutor for StubExecutor {
        fn execute(&self, _query: &str, _params: &[&dyn ToSql]) -> Result<u64, LifeError> {
            Ok(0)
        }

        fn query_one(&self, _query: &str, _params: &[&dyn ToSql]) -> Result<Row, LifeError> {
            Err(LifeError::QueryError("no rows".to_string()))
        }

        fn query_all(&self, _query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
            if self.fail {
                return Err(LifeError::QueryError(
                    "relation \"employees\" does not exist".to_string(),
                ));
            }
            Ok(Vec::new())
        }
    }

    fn employees() -> Arc<EntityMapping> {
        EntityMapping::builder::<Employee>("employees")
            .key(|e: &Employee| vec![e.id.into()])
            .build()
            .unwrap()
    }

    #[test]
    fn test_query_graph_empty_result() {
        let executor = StubExecutor { fail: false };
        let roots = query_graph::<EmployeeOnly, _>(
            &executor,
            "SELECT id FROM employees",
            &[],
            [employees()],
            &MaterializeConfig::default(),
        )
        .unwrap();
        assert!(roots.is_empty());
    }

    #[test]
    fn test_query_graph_propagates_query_error() {
        let executor = StubExecutor { fail: true };
        let err = query_graph::<EmployeeOnly, _>(
            &executor,
            "SELECT id FROM employees",
            &[],
            [employees()],
            &MaterializeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LifeError::QueryError(_)));
    }

    #[test]
    fn test_query_graph_accepts_dyn_executor() {
        let executor = StubExecutor { fail: false };
        let executor: &dyn LifeExecutor = &executor;
        let roots = query_graph::<EmployeeOnly, _>(
            executor,
            "SELECT id FROM employees",
            &[],
            [employees()],
            &MaterializeConfig::default(),
        );
        assert!(roots.is_ok());
    }

    #[test]
    fn test_materialize_error_surfaces_as_life_error() {
        let err: LifeError = MaterializeError::SlotOverflow { capacity: 1 }.into();
        assert!(matches!(
            err,
            LifeError::Materialize(MaterializeError::SlotOverflow { capacity: 1 })
        ));
    }
}
