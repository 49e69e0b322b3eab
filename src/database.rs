//! リレーショナルデータベースの薄いラッパー
//!
//! 呼び出しのたびに接続を開き、文を1つ実行して、結果にかかわらず接続を閉じる。
//! 接続を呼び出しをまたいで保持することはない。

pub mod sqlite;

use crate::error::{Error, Result};

/// データベースとやり取りする値
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(value) => Some(*value),
            Value::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// 問い合わせの結果を保持する表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 行番号と列名で値を取得する。
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(index)
    }
}

/// データベースドライバ
///
/// `Database`はこのトレイトを通してのみドライバを操作する。
pub trait Driver {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// 問い合わせを実行し、すべての行を読み込んで返却する。
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Table>;

    /// 文を実行し、影響を受けた行数を返却する。
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize>;

    /// 最初の行の最初の列を返却する。行がない場合は`Value::Null`。
    fn scalar(&mut self, sql: &str, params: &[Value]) -> Result<Value>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// 呼び出しごとに接続を開閉するデータベース
#[derive(Debug)]
pub struct Database<D> {
    driver: D,
}

impl<D: Driver> Database<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_open()
    }

    /// 接続を開く。既に開いている場合は何もしない。
    pub fn open(&mut self) -> Result<()> {
        if !self.driver.is_open() {
            self.driver.open()?;
        }
        Ok(())
    }

    /// 接続を閉じる。既に閉じている場合は何もしない。
    pub fn close(&mut self) -> Result<()> {
        if self.driver.is_open() {
            self.driver.close()?;
        }
        Ok(())
    }

    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Table> {
        self.scoped(|driver| driver.query(sql, params))
    }

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        self.scoped(|driver| driver.execute(sql, params))
    }

    pub fn scalar(&mut self, sql: &str, params: &[Value]) -> Result<Value> {
        self.scoped(|driver| driver.scalar(sql, params))
    }

    /// トランザクション内で`f`を実行する。
    ///
    /// `f`が成功すればコミットし、失敗すればロールバックしてそのエラーを返す。
    /// 接続は結果にかかわらず閉じる。
    ///
    /// # 引数
    ///
    /// * f: トランザクション内で実行する処理。
    ///
    /// # 戻り値
    ///
    /// `f`の戻り値。
    pub fn run_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_, D>) -> Result<T, E>,
        E: From<Error>,
    {
        self.open()?;
        let result = {
            let mut guard = UnwindGuard::new(&mut self.driver, true);
            Self::transact(&mut *guard.driver, f)
        };
        let closed = self.close();

        let value = result?;
        closed?;
        Ok(value)
    }

    fn transact<T, E, F>(driver: &mut D, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_, D>) -> Result<T, E>,
        E: From<Error>,
    {
        driver.begin()?;
        let mut transaction = Transaction {
            driver: &mut *driver,
        };

        match f(&mut transaction) {
            Ok(value) => {
                driver.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = driver.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// 接続を開いて`f`を実行し、結果にかかわらず接続を閉じる。
    fn scoped<T>(&mut self, f: impl FnOnce(&mut D) -> Result<T>) -> Result<T> {
        self.open()?;
        let result = {
            let mut guard = UnwindGuard::new(&mut self.driver, false);
            f(&mut *guard.driver)
        };
        let closed = self.close();

        let value = result?;
        closed?;
        Ok(value)
    }
}

/// パニックで処理を抜けるときに、必要ならロールバックしてから接続を閉じる。
struct UnwindGuard<'a, D: Driver> {
    driver: &'a mut D,
    rollback: bool,
}

impl<'a, D: Driver> UnwindGuard<'a, D> {
    fn new(driver: &'a mut D, rollback: bool) -> Self {
        Self { driver, rollback }
    }
}

impl<D: Driver> Drop for UnwindGuard<'_, D> {
    fn drop(&mut self) {
        if !std::thread::panicking() || !self.driver.is_open() {
            return;
        }
        if self.rollback {
            let _ = self.driver.rollback();
        }
        let _ = self.driver.close();
    }
}

/// トランザクション中の接続
#[derive(Debug)]
pub struct Transaction<'a, D> {
    driver: &'a mut D,
}

impl<D: Driver> Transaction<'_, D> {
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Table> {
        self.driver.query(sql, params)
    }

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        self.driver.execute(sql, params)
    }

    pub fn scalar(&mut self, sql: &str, params: &[Value]) -> Result<Value> {
        self.driver.scalar(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    /// 呼び出しを記録するだけのドライバ
    #[derive(Debug, Default)]
    struct RecordingDriver {
        open: bool,
        calls: Vec<&'static str>,
        fail_statements: bool,
    }

    impl RecordingDriver {
        fn run(&mut self, name: &'static str) -> Result<()> {
            if !self.open {
                return Err(Error::NotOpen);
            }
            self.calls.push(name);
            if self.fail_statements {
                return Err(Error::Database("statement failed".into()));
            }
            Ok(())
        }
    }

    impl Driver for RecordingDriver {
        fn open(&mut self) -> Result<()> {
            self.calls.push("open");
            self.open = true;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.calls.push("close");
            self.open = false;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn query(&mut self, _sql: &str, _params: &[Value]) -> Result<Table> {
            self.run("query")?;
            Ok(Table::new(vec!["n".into()], vec![vec![Value::Integer(1)]]))
        }

        fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<usize> {
            self.run("execute")?;
            Ok(3)
        }

        fn scalar(&mut self, _sql: &str, _params: &[Value]) -> Result<Value> {
            self.run("scalar")?;
            Ok(Value::Integer(42))
        }

        fn begin(&mut self) -> Result<()> {
            self.calls.push("begin");
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            self.calls.push("commit");
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.calls.push("rollback");
            Ok(())
        }
    }

    #[test]
    fn test_open_and_close_are_idempotent() {
        let mut db = Database::new(RecordingDriver::default());
        db.open().unwrap();
        db.open().unwrap();
        assert!(db.is_open());
        db.close().unwrap();
        db.close().unwrap();

        assert!(!db.is_open());
        assert_eq!(vec!["open", "close"], db.driver().calls);
    }

    #[test]
    fn test_each_call_opens_and_closes() {
        let mut db = Database::new(RecordingDriver::default());

        assert_eq!(1, db.query("select", &[]).unwrap().len());
        assert_eq!(3, db.execute("update", &[]).unwrap());
        assert_eq!(Value::Integer(42), db.scalar("count", &[]).unwrap());

        assert!(!db.is_open());
        assert_eq!(
            vec!["open", "query", "close", "open", "execute", "close", "open", "scalar", "close"],
            db.driver().calls
        );
    }

    #[test]
    fn test_failed_statement_still_closes() {
        let mut db = Database::new(RecordingDriver {
            fail_statements: true,
            ..Default::default()
        });

        assert!(matches!(db.execute("update", &[]), Err(Error::Database(_))));
        assert!(!db.is_open());
        assert_eq!(vec!["open", "execute", "close"], db.driver().calls);
    }

    #[test]
    fn test_transaction_commits() {
        let mut db = Database::new(RecordingDriver::default());

        let count = db
            .run_transaction(|tx| -> Result<usize> { tx.execute("update", &[]) })
            .unwrap();

        assert_eq!(3, count);
        assert_eq!(
            vec!["open", "begin", "execute", "commit", "close"],
            db.driver().calls
        );
    }

    #[test]
    fn test_transaction_rolls_back_and_propagates() {
        let mut db = Database::new(RecordingDriver::default());

        let result: Result<()> = db.run_transaction(|tx| {
            tx.execute("update", &[])?;
            Err(Error::Database("constraint violated".into()))
        });

        assert!(matches!(result, Err(Error::Database(_))));
        assert!(!db.is_open());
        assert_eq!(
            vec!["open", "begin", "execute", "rollback", "close"],
            db.driver().calls
        );
    }

    #[test]
    fn test_panicking_transaction_rolls_back_and_closes() {
        let mut db = Database::new(RecordingDriver::default());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            db.run_transaction(|tx| -> Result<()> {
                tx.execute("update", &[])?;
                panic!("closure failed midway");
            })
        }));

        assert!(outcome.is_err());
        assert!(!db.is_open());
        assert_eq!(
            vec!["open", "begin", "execute", "rollback", "close"],
            db.driver().calls
        );

        let count = db
            .run_transaction(|tx| -> Result<usize> { tx.execute("update", &[]) })
            .unwrap();
        assert_eq!(3, count);
    }

    #[test]
    fn test_panicking_statement_closes_without_rollback() {
        let mut db = Database::new(RecordingDriver::default());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            db.scoped(|_| -> Result<()> { panic!("driver failed midway") })
        }));

        assert!(outcome.is_err());
        assert!(!db.is_open());
        assert_eq!(vec!["open", "close"], db.driver().calls);
    }

    #[test]
    fn test_table_lookup_by_column() {
        let table = Table::new(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Integer(7), Value::from("seven")]],
        );

        assert_eq!(Some(&Value::from("seven")), table.get(0, "name"));
        assert_eq!(None, table.get(0, "missing"));
        assert_eq!(None, table.get(1, "id"));
    }

    #[test]
    fn test_value_from_option() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Some(5), Value::from(Some(5_i64)).as_i64());
    }
}
