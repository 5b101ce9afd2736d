//! Byte-budgeted batching of rows into INSERT/REPLACE statements.
//!
//! Rows are packed greedily: a statement takes the next row while the
//! statement stays within `max_query_len` bytes, otherwise it is closed and
//! a new one is started with the same prefix. Statements always end on a row
//! boundary. A row that does not fit into an empty statement is a fatal
//! capacity error.
//!
//! The whole plan is built before anything is executed, so a capacity error
//! means no statement has run.

use tracing::{debug, info};

use crate::core::{Catalog, SqlSession};
use crate::error::{Result, StoreError};

use super::translate::TableLayout;

/// Statements produced for one ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    statements: Vec<String>,
    rows: usize,
}

impl BatchPlan {
    /// Pack row tuples behind `prefix` into statements of at most
    /// `max_query_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RowTooLarge`] if a single row cannot fit, and
    /// propagates any error produced while rendering rows.
    pub fn build<I>(prefix: &str, rows: I, max_query_len: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Result<String>>,
    {
        let budget = max_query_len.saturating_sub(prefix.len());
        let mut statements = Vec::new();
        let mut current = String::from(prefix);
        let mut remaining = budget;
        let mut in_current = 0usize;
        let mut total = 0usize;

        for (row, tuple) in rows.into_iter().enumerate() {
            let mut value = tuple?;
            value.push(',');

            if value.len() > remaining && in_current > 0 {
                statements.push(close(current));
                current = String::from(prefix);
                remaining = budget;
                in_current = 0;
            }
            if value.len() > remaining {
                return Err(StoreError::RowTooLarge {
                    row,
                    row_len: value.len(),
                    budget,
                });
            }

            remaining -= value.len();
            current.push_str(&value);
            in_current += 1;
            total += 1;
        }
        if in_current > 0 {
            statements.push(close(current));
        }

        Ok(Self {
            statements,
            rows: total,
        })
    }

    /// Plan the statements that ingest `catalog` into `table`.
    pub fn for_catalog(
        layout: &TableLayout,
        catalog: &Catalog,
        table: &str,
        max_query_len: usize,
    ) -> Result<Self> {
        let prefix = layout.insert_prefix(table)?;
        Self::build(
            &prefix,
            catalog.records().iter().map(|r| layout.row_literal(r)),
            max_query_len,
        )
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Number of rows across all statements.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Execute every statement in order, then commit once.
    pub async fn execute<S>(&self, session: &mut S) -> Result<()>
    where
        S: SqlSession + ?Sized,
    {
        for (i, sql) in self.statements.iter().enumerate() {
            debug!(
                "Executing batch {}/{} ({} bytes)",
                i + 1,
                self.statements.len(),
                sql.len()
            );
            session.execute(sql).await?;
        }
        session.commit().await?;
        info!(
            "Inserted {} rows in {} statements",
            self.rows,
            self.statements.len()
        );
        Ok(())
    }
}

/// Drop the trailing separator of a finished statement.
fn close(mut statement: String) -> String {
    statement.pop();
    statement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::RecordingSession;

    const PREFIX: &str = "INSERT INTO `t` (`a`) VALUES ";

    fn rows(n: usize, tuple: &str) -> Vec<Result<String>> {
        (0..n).map(|_| Ok(tuple.to_string())).collect()
    }

    #[test]
    fn test_statement_count_matches_budget() {
        // Each row is "(1234)," = 7 bytes including its separator.
        let k = 7;
        for (n, per_statement) in [(10, 3), (9, 3), (1, 1), (7, 7), (20, 4)] {
            let budget = PREFIX.len() + per_statement * k;
            let plan = BatchPlan::build(PREFIX, rows(n, "(1234)"), budget).unwrap();
            let expected = n.div_ceil(per_statement);
            assert_eq!(plan.len(), expected, "n={} per={}", n, per_statement);
            assert_eq!(plan.rows(), n);
            for sql in plan.statements() {
                assert!(sql.len() <= budget);
                assert!(sql.starts_with(PREFIX));
                assert!(sql.ends_with(')'));
                let body = &sql[PREFIX.len()..];
                assert_eq!((body.len() + 1) % k, 0, "partial row in {}", sql);
            }
        }
    }

    #[test]
    fn test_budget_with_slack() {
        // Room for 2 rows plus 6 spare bytes.
        let budget = PREFIX.len() + 2 * 7 + 6;
        let plan = BatchPlan::build(PREFIX, rows(5, "(1234)"), budget).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.statements()[0], format!("{}(1234),(1234)", PREFIX));
        assert_eq!(plan.statements()[2], format!("{}(1234)", PREFIX));
    }

    #[test]
    fn test_empty_input_has_no_statements() {
        let plan = BatchPlan::build(PREFIX, Vec::new(), 1000).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.rows(), 0);
    }

    #[test]
    fn test_single_oversized_row_is_fatal() {
        let budget = PREFIX.len() + 6;
        let err = BatchPlan::build(PREFIX, rows(3, "(1234)"), budget).unwrap_err();
        assert!(matches!(
            err,
            StoreError::RowTooLarge {
                row: 0,
                row_len: 7,
                budget: 6
            }
        ));
    }

    #[test]
    fn test_oversized_row_later_in_stream() {
        let input = vec![
            Ok("(1)".to_string()),
            Ok("(1)".to_string()),
            Ok("(123456789)".to_string()),
        ];
        let err = BatchPlan::build(PREFIX, input, PREFIX.len() + 8).unwrap_err();
        assert!(matches!(err, StoreError::RowTooLarge { row: 2, .. }));
    }

    #[test]
    fn test_prefix_longer_than_budget() {
        let err = BatchPlan::build(PREFIX, rows(1, "(1)"), 4).unwrap_err();
        assert!(matches!(err, StoreError::RowTooLarge { budget: 0, .. }));
    }

    #[test]
    fn test_render_error_propagates() {
        let input = vec![Ok("(1)".to_string()), Err(StoreError::Unsupported("x".into()))];
        assert!(BatchPlan::build(PREFIX, input, 1000).is_err());
    }

    #[tokio::test]
    async fn test_execute_runs_all_then_commits() {
        let plan = BatchPlan::build(PREFIX, rows(4, "(1234)"), PREFIX.len() + 14).unwrap();
        let mut session = RecordingSession::new();
        plan.execute(&mut session).await.unwrap();
        assert_eq!(session.executed.len(), 2);
        assert_eq!(session.commits, 1);
    }

    #[tokio::test]
    async fn test_capacity_error_executes_nothing() {
        let mut session = RecordingSession::new();
        let result = BatchPlan::build(PREFIX, rows(2, "(1234)"), PREFIX.len() + 3);
        if let Ok(plan) = result {
            plan.execute(&mut session).await.unwrap();
        }
        assert!(session.executed.is_empty());
        assert_eq!(session.commits, 0);
    }
}
