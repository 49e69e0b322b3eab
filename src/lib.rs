//! Rotating Logger
//!
//! ----------------------------------------------------------------------------
//!
//! このクレートには、ログを記録する`RotatingLogger`構造体と、リレーショナルデータベースの
//! 薄いラッパーである`Database`構造体が含まれている。
//!
//! `RotatingLogger`は、作成時の日付と周期からログファイルパスを決定し、ログをそのファイルに
//! 追記すると同時にコンソールにも出力する。ログファイルは以下に作成される。
//!
//! - 日毎: `<root>/<yyyy>/<MM>/log_<yyyyMMdd>[_<suffix>].txt`
//! - 週毎: `<root>/<yyyy>/<MM>/log_week<週番号>[_<suffix>].txt`
//! - 月毎: `<root>/<yyyy>/log_<yyyyMM>[_<suffix>].txt`
//!
//! ログファイルパスはロガーの作成時に一度だけ決定する。周期が切り替わった後も、新しい設定が
//! 要求されるまでは同じファイルに書き込み続ける。
//!
//! プロセス全体で1つのロガーを共有する場合は、`registry`モジュールを使用する。

pub mod appenders;
pub mod database;
pub mod error;
pub mod registry;
pub mod rotation;

pub use appenders::{ErrorDetail, LogLevel, RotatingLogger, RotatingLoggerBuilder};
pub use database::{sqlite::SqliteDriver, Database, Driver, Table, Transaction, Value};
pub use error::{Error, Result};
pub use rotation::{Clock, LocalClock, LoggerConfig, RotationPeriod};
