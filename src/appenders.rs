use std::{
    backtrace::Backtrace,
    fmt::{self, Display},
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use time::{macros::format_description, OffsetDateTime};
use tracing_subscriber::fmt::{writer::BoxMakeWriter, MakeWriter};

use crate::{
    error::{Error, Result},
    rotation::{prepare_log_filepath, Clock, LocalClock, LoggerConfig},
};

/// ログレベル
///
/// 表示にのみ使用し、フィルタリングには使用しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Fatal => "Fatal",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ログに添えるエラーの詳細
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    description: String,
    trace: String,
}

impl ErrorDetail {
    pub fn new(description: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            trace: trace.into(),
        }
    }

    /// エラーから詳細を作成する。
    ///
    /// 説明には`Display`の出力を、トレースには呼び出し時点のバックトレースを使用する。
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(error.to_string(), Backtrace::force_capture().to_string())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }
}

/// ログレコードを整形する。
///
/// レコードは`[yyyy-MM-dd HH:mm:ss] [<LEVEL>] <message>`の1行で、エラーが渡された場合は
/// `Exception: `と`Stack Trace: `の2行が続く。各行は改行で終わる。
pub fn format_record(
    now: &OffsetDateTime,
    level: LogLevel,
    message: &str,
    error: Option<&ErrorDetail>,
) -> String {
    let timestamp = now
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| now.to_string());

    let mut record = format!("[{}] [{}] {}\n", timestamp, level, message);
    if let Some(error) = error {
        record.push_str(&format!("Exception: {}\n", error.description()));
        record.push_str(&format!("Stack Trace: {}\n", error.trace()));
    }

    record
}

/// 周期ごとに決まるファイルとコンソールにログを出力するロガー
///
/// ファイルパスは作成時に一度だけ決定し、その後に周期が切り替わっても変更しない。
/// ファイルへの書き込みはロックで直列化し、コンソールへの書き込みは直列化しない。
pub struct RotatingLogger {
    config: LoggerConfig,
    log_filepath: PathBuf,
    lock: Mutex<()>,
    clock: Box<dyn Clock>,
    console: BoxMakeWriter,
    diagnostics: BoxMakeWriter,
}

impl fmt::Debug for RotatingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingLogger")
            .field("config", &self.config)
            .field("log_filepath", &self.log_filepath)
            .finish_non_exhaustive()
    }
}

/// `RotatingLogger`のビルダー
pub struct RotatingLoggerBuilder {
    root: PathBuf,
    config: LoggerConfig,
    clock: Box<dyn Clock>,
    console: BoxMakeWriter,
    diagnostics: BoxMakeWriter,
}

impl RotatingLoggerBuilder {
    /// 現在日時を返す時計を設定する。既定はローカル時刻。
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// ログレコードを複写する出力先を設定する。既定は標準出力。
    pub fn console<M>(mut self, console: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.console = BoxMakeWriter::new(console);
        self
    }

    /// ファイルへの書き込み失敗を報告する出力先を設定する。既定は標準エラー出力。
    pub fn diagnostics<M>(mut self, diagnostics: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.diagnostics = BoxMakeWriter::new(diagnostics);
        self
    }

    /// `RotatingLogger`を作成する。
    ///
    /// 現在日時からログファイルパスを決定し、それを格納するディレクトリを作成する。
    pub fn build(self) -> Result<RotatingLogger> {
        let now = self.clock.now();
        let log_filepath = prepare_log_filepath(&self.root, &self.config, &now)?;
        tracing::debug!(path = %log_filepath.display(), "log file path resolved");

        Ok(RotatingLogger {
            config: self.config,
            log_filepath,
            lock: Mutex::new(()),
            clock: self.clock,
            console: self.console,
            diagnostics: self.diagnostics,
        })
    }
}

impl RotatingLogger {
    /// 既定の時計と出力先で`RotatingLogger`を作成する。
    ///
    /// # Arguments
    ///
    /// * root: ログのルートディレクトリ。
    /// * config: ロガーの設定。
    pub fn new(root: impl AsRef<Path>, config: LoggerConfig) -> Result<Self> {
        Self::builder(root, config).build()
    }

    pub fn builder(root: impl AsRef<Path>, config: LoggerConfig) -> RotatingLoggerBuilder {
        RotatingLoggerBuilder {
            root: root.as_ref().to_path_buf(),
            config,
            clock: Box::new(LocalClock),
            console: BoxMakeWriter::new(io::stdout),
            diagnostics: BoxMakeWriter::new(io::stderr),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// 作成時に決定したログファイルパス
    pub fn path(&self) -> &Path {
        &self.log_filepath
    }

    /// ログを出力する。
    ///
    /// ファイルへの書き込みに失敗しても呼び出し元にはエラーを返さず、失敗を報告したうえで
    /// コンソールへの出力を続ける。
    ///
    /// # Arguments
    ///
    /// * level: ログレベル。
    /// * message: メッセージ。
    /// * error: メッセージに添えるエラーの詳細。
    pub fn log(&self, level: LogLevel, message: &str, error: Option<&ErrorDetail>) {
        let record = format_record(&self.clock.now(), level, message, error);
        self.dispatch(record.as_bytes());
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message, None);
    }

    pub fn error(&self, message: &str, error: Option<&ErrorDetail>) {
        self.log(LogLevel::Error, message, error);
    }

    pub fn fatal(&self, message: &str, error: Option<&ErrorDetail>) {
        self.log(LogLevel::Fatal, message, error);
    }

    /// ファイルとコンソールに出力する。
    ///
    /// `tracing`の書き込み先として使われるため、ここから`tracing`のイベントを発行してはならない。
    fn dispatch(&self, record: &[u8]) {
        if let Err(err) = self.append(record) {
            let _ = writeln!(
                self.diagnostics.make_writer(),
                "failed to write log file: {}",
                err
            );
        }

        let _ = self.console.make_writer().write_all(record);
    }

    /// ロックを取得してログファイルに追記する。ロックはエラー時も含めて解放される。
    fn append(&self, record: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_filepath)
            .and_then(|mut file| file.write_all(record))
            .map_err(|source| Error::Append {
                path: self.log_filepath.clone(),
                source,
            })
    }
}

/// `tracing-subscriber`の書き込み先として使用する。
///
/// 書き込まれたバイト列を、そのままファイルとコンソールに出力する。
impl Write for &RotatingLogger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.dispatch(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RotatingLogger {
    type Writer = &'a RotatingLogger;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
