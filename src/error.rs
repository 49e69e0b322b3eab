use std::{io, path::PathBuf};

use thiserror::Error;

/// クレート全体で使用するエラー
#[derive(Debug, Error)]
pub enum Error {
    /// ログディレクトリの作成に失敗した。
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// ログファイルへの追記に失敗した。
    #[error("failed to append to log file {}: {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// ログのルートディレクトリを決定できなかった。
    #[error("unable to resolve log root directory: {0}")]
    LogRoot(#[source] io::Error),

    #[error("unable to format date: {0}")]
    Format(#[from] time::error::Format),

    #[error("connection string is empty")]
    EmptyConnectionString,

    #[error("connection is not open")]
    NotOpen,

    /// データベースドライバが返したエラー
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
