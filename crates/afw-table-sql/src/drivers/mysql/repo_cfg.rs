//! Repository configuration persisted in a single-row table.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::core::{Location, ObjectFormatter, RepositoryCfg, SqlSession, StoredObject};
use crate::error::{Result, StoreError};

use super::session::MysqlSession;

/// Table holding the repository configuration.
pub const REPOSITORY_CFG_TABLE: &str = "repositoryCfg";

/// The only serialization version written and understood.
pub const SERIALIZATION_VERSION: i32 = 1;

const CREATE_SQL: &str = "CREATE TABLE IF NOT EXISTS `repositoryCfg` (\
    serializationVersion INT NOT NULL, \
    id INT PRIMARY KEY, \
    root TEXT, \
    mapper TEXT, \
    mapperArgs TEXT, \
    parents TEXT, \
    policy TEXT)";

const REPLACE_SQL: &str = "REPLACE INTO `repositoryCfg` \
    (serializationVersion, id, root, mapper, mapperArgs, parents, policy) \
    VALUES (?, 0, ?, ?, ?, ?, ?)";

const SELECT_SQL: &str = "SELECT serializationVersion, root, mapper, mapperArgs, parents, policy \
    FROM `repositoryCfg` WHERE id = 0";

/// One stored row: version, root, mapper, then the JSON columns.
type CfgRow = (
    i32,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Reads and writes [`RepositoryCfg`] objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepositoryCfgFormatter;

impl RepositoryCfgFormatter {
    /// Stored configuration, or `None` if the database has none.
    pub async fn read_cfg(&self, conn: &ConnectionConfig) -> Result<Option<RepositoryCfg>> {
        let mut session = MysqlSession::connect(conn).await?;
        let result = session.exec_scalar::<CfgRow, _>(SELECT_SQL, ()).await;
        session.release().await;

        match result {
            Ok(Some(row)) => decode(row).map(Some),
            Ok(None) => Ok(None),
            Err(e) if e.is_no_such_table() => {
                debug!("No {} table in {}", REPOSITORY_CFG_TABLE, conn.database);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Store `cfg` as the single configuration row.
    pub async fn write_cfg(&self, conn: &ConnectionConfig, cfg: &RepositoryCfg) -> Result<()> {
        let row = encode(cfg)?;
        let mut session = MysqlSession::connect(conn).await?;
        let result = async {
            session.exec_drop(CREATE_SQL, ()).await?;
            session.exec_drop(REPLACE_SQL, row).await?;
            session.commit().await
        }
        .await;
        session.release().await;
        result
    }
}

#[async_trait]
impl ObjectFormatter for RepositoryCfgFormatter {
    async fn read(&self, conn: &ConnectionConfig, _location: &Location) -> Result<StoredObject> {
        self.read_cfg(conn)
            .await?
            .map(StoredObject::RepositoryCfg)
            .ok_or_else(|| StoreError::NoRepositoryAtRoot(conn.uri()))
    }

    async fn write(
        &self,
        conn: &ConnectionConfig,
        _location: &Location,
        obj: &StoredObject,
    ) -> Result<()> {
        match obj {
            StoredObject::RepositoryCfg(cfg) => self.write_cfg(conn, cfg).await,
            other => Err(StoreError::Unsupported(format!(
                "repository configuration formatter cannot write a {}",
                other.kind()
            ))),
        }
    }
}

fn encode(cfg: &RepositoryCfg) -> Result<CfgRow> {
    Ok((
        SERIALIZATION_VERSION,
        cfg.root.clone(),
        cfg.mapper.clone(),
        Some(serde_json::to_string(&cfg.mapper_args)?),
        Some(serde_json::to_string(&cfg.parents)?),
        Some(serde_json::to_string(&cfg.policy)?),
    ))
}

fn decode(row: CfgRow) -> Result<RepositoryCfg> {
    let (version, root, mapper, mapper_args, parents, policy) = row;
    if version != SERIALIZATION_VERSION {
        return Err(StoreError::Unsupported(format!(
            "Unable to read repository configuration serialization version {}",
            version
        )));
    }
    Ok(RepositoryCfg {
        root,
        mapper,
        mapper_args: json_or_null(mapper_args)?,
        parents: match parents {
            Some(text) => serde_json::from_str(&text)?,
            None => Vec::new(),
        },
        policy: json_or_null(policy)?,
    })
}

fn json_or_null(text: Option<String>) -> Result<JsonValue> {
    match text {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(JsonValue::Null),
    }
}
