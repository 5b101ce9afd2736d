//! MySQL driver.
//!
//! - [`MysqlSession`]: one connection with autocommit disabled
//! - [`CatalogSqlFormatter`]: catalogs as tables, written through the
//!   publish protocol and read back from column metadata
//! - [`RepositoryCfgFormatter`]: repository configuration in `repositoryCfg`
//! - [`MySqlStorage`]: the `mysql://host:port/database` storage
//!
//! Credentials come from the connection configuration or the `[client]`
//! section of the user's option file.

mod catalog;
mod repo_cfg;
mod session;
mod storage;

pub use catalog::{catalog_from_result_set, CatalogSqlFormatter};
pub use repo_cfg::{RepositoryCfgFormatter, REPOSITORY_CFG_TABLE, SERIALIZATION_VERSION};
pub use session::MysqlSession;
pub use storage::{MySqlStorage, SCHEME};
