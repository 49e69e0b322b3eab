//! SQLiteのドライバ

use std::path::{Path, PathBuf};

use rusqlite::{
    params_from_iter,
    types::{self, ToSqlOutput, ValueRef},
    Connection, OptionalExtension, ToSql,
};

use super::{Driver, Table, Value};
use crate::error::{Error, Result};

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(Box::new(err))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(value) => ToSqlOutput::Owned(types::Value::Integer(*value)),
            Value::Real(value) => ToSqlOutput::Owned(types::Value::Real(*value)),
            Value::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Value::Blob(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value)),
        })
    }
}

impl From<types::Value> for Value {
    fn from(value: types::Value) -> Self {
        match value {
            types::Value::Null => Value::Null,
            types::Value::Integer(value) => Value::Integer(value),
            types::Value::Real(value) => Value::Real(value),
            types::Value::Text(value) => Value::Text(value),
            types::Value::Blob(value) => Value::Blob(value),
        }
    }
}

/// データベースファイルのパスを接続文字列とするSQLiteドライバ
#[derive(Debug)]
pub struct SqliteDriver {
    path: PathBuf,
    connection: Option<Connection>,
}

impl SqliteDriver {
    /// `SqliteDriver`を作成する。接続はまだ開かない。
    ///
    /// # 引数
    ///
    /// * path: データベースファイルのパス。
    ///
    /// # 戻り値
    ///
    /// `SqliteDriver`インスタンス。パスが空の場合は`Error::EmptyConnectionString`。
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::EmptyConnectionString);
        }

        Ok(Self {
            path: path.to_path_buf(),
            connection: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(Error::NotOpen)
    }
}

impl Driver for SqliteDriver {
    fn open(&mut self) -> Result<()> {
        self.connection = Some(Connection::open(&self.path)?);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            if let Err((connection, err)) = connection.close() {
                self.connection = Some(connection);
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Table> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(sql)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = statement.query(params_from_iter(params))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                record.push(Value::from(row.get::<_, types::Value>(index)?));
            }
            values.push(record);
        }

        Ok(Table::new(columns, values))
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        Ok(self.connection()?.execute(sql, params_from_iter(params))?)
    }

    fn scalar(&mut self, sql: &str, params: &[Value]) -> Result<Value> {
        let value = self
            .connection()?
            .query_row(sql, params_from_iter(params), |row| {
                row.get::<_, types::Value>(0)
            })
            .optional()?;

        Ok(value.map_or(Value::Null, Value::from))
    }

    fn begin(&mut self) -> Result<()> {
        Ok(self.connection()?.execute_batch("BEGIN")?)
    }

    fn commit(&mut self) -> Result<()> {
        Ok(self.connection()?.execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(self.connection()?.execute_batch("ROLLBACK")?)
    }
}
