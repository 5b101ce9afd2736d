//! In-memory session that records statements, for tests.

use async_trait::async_trait;

use crate::core::{ResultSet, SqlSession};
use crate::error::{Result, StoreError};

struct Failure {
    starts_with: String,
    code: u16,
    remaining: usize,
}

/// Records every statement and answers queries from canned results.
#[derive(Default)]
pub struct RecordingSession {
    pub executed: Vec<String>,
    pub commits: usize,
    failures: Vec<Failure>,
    responses: Vec<(String, ResultSet)>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` statements starting with `starts_with` with a
    /// server error.
    pub fn fail_on(mut self, starts_with: &str, code: u16, times: usize) -> Self {
        self.failures.push(Failure {
            starts_with: starts_with.to_string(),
            code,
            remaining: times,
        });
        self
    }

    /// Answer queries starting with `starts_with` with a single text value.
    pub fn respond(mut self, starts_with: &str, value: &str) -> Self {
        let rs = ResultSet {
            columns: Vec::new(),
            rows: vec![vec![Some(value.as_bytes().to_vec())]],
        };
        self.responses.push((starts_with.to_string(), rs));
        self
    }

    fn record(&mut self, sql: &str) -> Result<()> {
        self.executed.push(sql.to_string());
        for failure in &mut self.failures {
            if failure.remaining > 0 && sql.starts_with(&failure.starts_with) {
                failure.remaining -= 1;
                return Err(StoreError::Server {
                    code: failure.code,
                    message: format!("injected failure for {}", failure.starts_with),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SqlSession for RecordingSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.record(sql)
    }

    async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.record(sql)?;
        Ok(self
            .responses
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, rs)| rs.clone())
            .unwrap_or_default())
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }
}
