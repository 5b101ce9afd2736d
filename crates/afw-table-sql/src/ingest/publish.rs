//! Create -> populate -> rename publication of a staging table.
//!
//! The catalog is written into a freshly created staging table which is then
//! renamed to its public name. If another writer already holds the public
//! name, the holder is dropped and the rename retried, up to
//! [`MAX_RENAME_ATTEMPTS`] times. When every attempt loses the race, the
//! populated staging table is left in place and the outcome is
//! [`PublishOutcome::Stranded`].

use tracing::{debug, info, warn};

use crate::core::identifier::{assert_statement_is_safe, quote_mysql};
use crate::core::SqlSession;
use crate::error::Result;

use super::batch::BatchPlan;

/// Number of rename attempts before giving up.
pub const MAX_RENAME_ATTEMPTS: usize = 3;

/// Protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Creating,
    Populating,
    Renaming { attempt: usize },
    Done { attempts: usize },
    Stranded { attempts: usize },
}

/// Terminal result of a publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The staging table now holds the public name.
    Published { attempts: usize },

    /// Every rename lost a race; the data remains under the staging name.
    Stranded { staging: String, attempts: usize },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// `RENAME TABLE` statement moving `from` to `to`.
pub fn rename_table_sql(from: &str, to: &str) -> Result<String> {
    Ok(format!(
        "RENAME TABLE {} TO {}",
        quote_mysql(from)?,
        quote_mysql(to)?
    ))
}

/// Statements of one publication, fully built before the first one runs.
#[derive(Debug, Clone)]
pub struct Publication {
    pub staging: String,
    pub table: String,
    pub create_sql: String,
    pub plan: BatchPlan,
}

impl Publication {
    /// Check the statements that embed caller-supplied text.
    pub fn new(
        staging: impl Into<String>,
        table: impl Into<String>,
        create_sql: String,
        plan: BatchPlan,
    ) -> Result<Self> {
        assert_statement_is_safe(&create_sql)?;
        let publication = Self {
            staging: staging.into(),
            table: table.into(),
            create_sql,
            plan,
        };
        assert_statement_is_safe(&publication.rename_sql()?)?;
        assert_statement_is_safe(&publication.drop_sql()?)?;
        Ok(publication)
    }

    fn rename_sql(&self) -> Result<String> {
        rename_table_sql(&self.staging, &self.table)
    }

    fn drop_sql(&self) -> Result<String> {
        Ok(format!("DROP TABLE IF EXISTS {}", quote_mysql(&self.table)?))
    }

    /// Run the protocol to a terminal state.
    pub async fn run<S>(&self, session: &mut S) -> Result<PublishOutcome>
    where
        S: SqlSession + ?Sized,
    {
        let rename = self.rename_sql()?;
        let drop = self.drop_sql()?;
        let mut state = PublishState::Creating;

        loop {
            debug!("Publishing {}: {:?}", self.table, state);
            state = match state {
                PublishState::Creating => {
                    session.execute(&self.create_sql).await?;
                    PublishState::Populating
                }
                PublishState::Populating => {
                    self.plan.execute(session).await?;
                    PublishState::Renaming { attempt: 1 }
                }
                PublishState::Renaming { attempt } => match session.execute(&rename).await {
                    Ok(()) => PublishState::Done { attempts: attempt },
                    Err(e) if e.is_table_exists() => {
                        debug!(
                            "{} already exists on rename attempt {}, dropping it",
                            self.table, attempt
                        );
                        session.execute(&drop).await?;
                        if attempt >= MAX_RENAME_ATTEMPTS {
                            PublishState::Stranded { attempts: attempt }
                        } else {
                            PublishState::Renaming {
                                attempt: attempt + 1,
                            }
                        }
                    }
                    Err(e) => return Err(e),
                },
                PublishState::Done { attempts } => {
                    info!("Published {} as {}", self.staging, self.table);
                    return Ok(PublishOutcome::Published { attempts });
                }
                PublishState::Stranded { attempts } => {
                    warn!(
                        "Could not rename temp table {} to final dataset name {}, \
                         perhaps another process is thrashing against this one?",
                        self.staging, self.table
                    );
                    return Ok(PublishOutcome::Stranded {
                        staging: self.staging.clone(),
                        attempts,
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ER_TABLE_EXISTS_ERROR};
    use crate::ingest::testing::RecordingSession;

    fn publication() -> Publication {
        let plan = BatchPlan::build(
            "INSERT INTO `tmp_1` (`a`) VALUES ",
            vec![Ok("(1)".to_string()), Ok("(2)".to_string())],
            1000,
        )
        .unwrap();
        Publication::new(
            "tmp_1",
            "src",
            "CREATE TABLE `tmp_1` (\n\t`a` INT NOT NULL\n)".to_string(),
            plan,
        )
        .unwrap()
    }

    fn renames(session: &RecordingSession) -> usize {
        session
            .executed
            .iter()
            .filter(|s| s.starts_with("RENAME TABLE"))
            .count()
    }

    #[tokio::test]
    async fn test_free_destination_renames_once() {
        let mut session = RecordingSession::new();
        let outcome = publication().run(&mut session).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Published { attempts: 1 });
        assert_eq!(
            session.executed,
            vec![
                "CREATE TABLE `tmp_1` (\n\t`a` INT NOT NULL\n)".to_string(),
                "INSERT INTO `tmp_1` (`a`) VALUES (1),(2)".to_string(),
                "RENAME TABLE `tmp_1` TO `src`".to_string(),
            ]
        );
        assert_eq!(session.commits, 1);
    }

    #[tokio::test]
    async fn test_occupied_destination_is_dropped_and_retried() {
        let mut session =
            RecordingSession::new().fail_on("RENAME TABLE", ER_TABLE_EXISTS_ERROR, 1);
        let outcome = publication().run(&mut session).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Published { attempts: 2 });
        assert_eq!(renames(&session), 2);
        assert!(session
            .executed
            .contains(&"DROP TABLE IF EXISTS `src`".to_string()));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_strands_staging_table() {
        let mut session =
            RecordingSession::new().fail_on("RENAME TABLE", ER_TABLE_EXISTS_ERROR, usize::MAX);
        let outcome = publication().run(&mut session).await.unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::Stranded {
                staging: "tmp_1".into(),
                attempts: MAX_RENAME_ATTEMPTS
            }
        );
        assert_eq!(renames(&session), MAX_RENAME_ATTEMPTS);
        // The staging table itself is never dropped.
        assert!(!session.executed.iter().any(|s| s.contains("DROP TABLE IF EXISTS `tmp_1`")));
    }

    #[tokio::test]
    async fn test_other_rename_errors_are_fatal() {
        let mut session = RecordingSession::new().fail_on("RENAME TABLE", 1142, 1);
        let err = publication().run(&mut session).await.unwrap_err();
        assert!(matches!(err, StoreError::Server { code: 1142, .. }));
        assert_eq!(renames(&session), 1);
    }

    #[test]
    fn test_unsafe_statements_rejected_before_running() {
        let plan = BatchPlan::default();
        let err = Publication::new(
            "tmp_1",
            "src",
            "CREATE TABLE `tmp_1` (a INT); DROP TABLE x".to_string(),
            plan.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Security(_)));

        let err = Publication::new("tmp_1", "a;b", "CREATE TABLE t (a INT)".into(), plan)
            .unwrap_err();
        assert!(matches!(err, StoreError::Security(_)));
    }
}
