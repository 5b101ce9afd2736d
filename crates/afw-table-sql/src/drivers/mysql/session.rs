//! Single-connection MySQL session.

use async_trait::async_trait;
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::*;
use mysql_async::{Column, Conn, OptsBuilder, Row, Value};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::core::{ResultColumn, ResultSet, SqlSession, SqlType};
use crate::error::{Result, StoreError};

/// Character set id MySQL reports for binary data.
const BINARY_CHARSET: u16 = 63;

/// One MySQL connection with autocommit disabled.
///
/// Sessions are opened per read or write and closed with
/// [`MysqlSession::close`] on every exit path.
pub struct MysqlSession {
    conn: Conn,
}

impl MysqlSession {
    /// Connect to the configured database.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        Self::open(config, Some(&config.database)).await
    }

    /// Connect to the server without selecting a database.
    pub async fn connect_server(config: &ConnectionConfig) -> Result<Self> {
        Self::open(config, None).await
    }

    async fn open(config: &ConnectionConfig, database: Option<&str>) -> Result<Self> {
        let (user, password) = config.credentials()?;
        let builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(database)
            .user(user)
            .pass(password)
            .init(vec!["SET autocommit=0"]);

        let conn = Conn::new(builder)
            .await
            .map_err(|e| StoreError::connection(e, format!("connecting to {}", config.uri())))?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            config.host,
            config.port,
            database.unwrap_or("")
        );
        Ok(Self { conn })
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.conn.disconnect().await.map_err(map_error)
    }

    /// Close the connection, logging instead of returning a failure.
    pub async fn release(self) {
        if let Err(e) = self.close().await {
            warn!("Error closing MySQL connection: {}", e);
        }
    }

    /// First column of the first row of a query with bound parameters.
    pub async fn exec_scalar<T, P>(&mut self, sql: &str, params: P) -> Result<Option<T>>
    where
        T: FromRow + Send + 'static,
        P: Into<mysql_async::Params> + Send,
    {
        debug!("{}", sql);
        self.conn.exec_first(sql, params).await.map_err(map_error)
    }

    /// All first-column values of a query with bound parameters.
    pub async fn exec_column<T, P>(&mut self, sql: &str, params: P) -> Result<Vec<T>>
    where
        T: FromRow + Send + 'static,
        P: Into<mysql_async::Params> + Send,
    {
        debug!("{}", sql);
        self.conn.exec(sql, params).await.map_err(map_error)
    }

    /// Execute a statement with bound parameters.
    pub async fn exec_drop<P>(&mut self, sql: &str, params: P) -> Result<()>
    where
        P: Into<mysql_async::Params> + Send,
    {
        debug!("{}", sql);
        self.conn.exec_drop(sql, params).await.map_err(map_error)
    }
}

#[async_trait]
impl SqlSession for MysqlSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("{}", sql);
        self.conn.query_drop(sql).await.map_err(map_error)
    }

    async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        debug!("{}", sql);
        let mut result = self.conn.query_iter(sql).await.map_err(map_error)?;
        let columns = result
            .columns()
            .map(|cols| cols.iter().map(result_column).collect())
            .unwrap_or_default();
        let rows: Vec<Row> = result.collect().await.map_err(map_error)?;
        result.drop_result().await.map_err(map_error)?;

        Ok(ResultSet {
            columns,
            rows: rows
                .into_iter()
                .map(|row| row.unwrap().into_iter().map(value_bytes).collect())
                .collect(),
        })
    }

    async fn commit(&mut self) -> Result<()> {
        debug!("COMMIT");
        self.conn.query_drop("COMMIT").await.map_err(map_error)
    }
}

/// Keep server errors distinguishable by code.
pub(crate) fn map_error(e: mysql_async::Error) -> StoreError {
    match e {
        mysql_async::Error::Server(server) => StoreError::Server {
            code: server.code,
            message: server.message,
        },
        other => StoreError::Mysql(other),
    }
}

fn value_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(bytes),
        Value::Int(v) => Some(v.to_string().into_bytes()),
        Value::UInt(v) => Some(v.to_string().into_bytes()),
        Value::Float(v) => Some(v.to_string().into_bytes()),
        Value::Double(v) => Some(v.to_string().into_bytes()),
        other => Some(other.as_sql(true).into_bytes()),
    }
}

fn result_column(column: &Column) -> ResultColumn {
    let charset = column.character_set();
    let sql_type = sql_type(column.column_type(), column.flags(), charset);
    // Lengths are reported in bytes of the result character set.
    let length = match sql_type {
        SqlType::Char => column.column_length() / max_bytes_per_char(charset),
        _ => column.column_length(),
    };
    ResultColumn {
        name: column.name_str().into_owned(),
        sql_type,
        length,
    }
}

/// Widest character of a collation's character set, in bytes.
fn max_bytes_per_char(collation: u16) -> u32 {
    match collation {
        // big5, sjis, euckr, gb2312, gbk, cp932
        1 | 84 | 13 | 88 | 19 | 85 | 24 | 86 | 28 | 87 | 95 | 96 => 2,
        // ujis, eucjpms
        12 | 91 | 97 | 98 => 3,
        // ucs2
        35 | 90 | 128..=151 | 159 => 2,
        // utf8mb3
        33 | 76 | 83 | 192..=215 | 223 => 3,
        // utf8mb4, utf16, utf16le, utf32, gb18030
        45 | 46 | 224..=247 | 255..=323 => 4,
        54 | 55 | 56 | 62 | 101..=124 => 4,
        60 | 61 | 160..=183 | 248..=250 => 4,
        _ => 1,
    }
}

fn sql_type(ty: ColumnType, flags: ColumnFlags, charset: u16) -> SqlType {
    let unsigned = flags.contains(ColumnFlags::UNSIGNED_FLAG);
    let binary = charset == BINARY_CHARSET;
    match ty {
        ColumnType::MYSQL_TYPE_SHORT if unsigned => SqlType::SmallIntUnsigned,
        ColumnType::MYSQL_TYPE_LONG if unsigned => SqlType::BigInt,
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_YEAR => SqlType::Int,
        ColumnType::MYSQL_TYPE_LONGLONG => SqlType::BigInt,
        ColumnType::MYSQL_TYPE_FLOAT => SqlType::Float,
        ColumnType::MYSQL_TYPE_DOUBLE => SqlType::Double,
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => SqlType::Decimal,
        ColumnType::MYSQL_TYPE_BIT => SqlType::Bit,
        ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING => {
            if binary {
                SqlType::Binary
            } else {
                SqlType::Char
            }
        }
        ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
            if binary =>
        {
            SqlType::Binary
        }
        _ => SqlType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_integers() {
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_SHORT, ColumnFlags::UNSIGNED_FLAG, 63),
            SqlType::SmallIntUnsigned
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_SHORT, ColumnFlags::empty(), 63),
            SqlType::Int
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty(), 63),
            SqlType::Int
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_LONG, ColumnFlags::UNSIGNED_FLAG, 63),
            SqlType::BigInt
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty(), 63),
            SqlType::BigInt
        );
    }

    #[test]
    fn test_max_bytes_per_char() {
        assert_eq!(max_bytes_per_char(BINARY_CHARSET), 1);
        assert_eq!(max_bytes_per_char(11), 1);
        assert_eq!(max_bytes_per_char(8), 1);
        assert_eq!(max_bytes_per_char(33), 3);
        assert_eq!(max_bytes_per_char(45), 4);
        assert_eq!(max_bytes_per_char(255), 4);
        // VARCHAR(8) read over a utf8mb4 connection reports 32 bytes.
        assert_eq!(32 / max_bytes_per_char(255), 8);
    }

    #[test]
    fn test_sql_type_strings_by_charset() {
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty(), 11),
            SqlType::Char
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_STRING, ColumnFlags::empty(), 63),
            SqlType::Binary
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_BLOB, ColumnFlags::empty(), 63),
            SqlType::Binary
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_BLOB, ColumnFlags::empty(), 255),
            SqlType::Other
        );
        assert_eq!(
            sql_type(ColumnType::MYSQL_TYPE_DATETIME, ColumnFlags::empty(), 63),
            SqlType::Other
        );
    }

    #[test]
    fn test_value_bytes() {
        assert_eq!(value_bytes(Value::NULL), None);
        assert_eq!(value_bytes(Value::Bytes(b"1.5".to_vec())), Some(b"1.5".to_vec()));
        assert_eq!(value_bytes(Value::Int(-3)), Some(b"-3".to_vec()));
    }
}
