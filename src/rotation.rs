use std::{
    fs,
    path::{Path, PathBuf},
};

use time::{macros::format_description, OffsetDateTime};

use crate::error::{Error, Result};

/// ファイルを切り替える周期
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationPeriod {
    /// 日毎にファイルを切り替え
    #[default]
    Daily,
    /// 年初から7日単位の週毎にファイルを切り替え
    Weekly,
    /// 月毎にファイルを切り替え
    Monthly,
}

/// ロガーの設定
///
/// 2つの設定は、周期と接尾語が一致するときに等しい。
/// 接尾語が空文字列の場合、接尾語なしとして扱う。
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct LoggerConfig {
    period: RotationPeriod,
    suffix: String,
}

impl LoggerConfig {
    /// `LoggerConfig`を作成する。
    ///
    /// # 引数
    ///
    /// * period: ファイルを切り替える周期。
    /// * suffix: ファイル名の接尾語。空文字列の場合は接尾語をつけない。
    pub fn new(period: RotationPeriod, suffix: impl Into<String>) -> Self {
        Self {
            period,
            suffix: suffix.into(),
        }
    }

    pub fn period(&self) -> RotationPeriod {
        self.period
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

/// 現在日時を返す時計
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// ローカル時刻を返す時計
///
/// ローカルのオフセットを取得できない場合はUTCを返す。
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}

impl<F> Clock for F
where
    F: Fn() -> OffsetDateTime + Send + Sync,
{
    fn now(&self) -> OffsetDateTime {
        self()
    }
}

/// 年初からの週番号を返却する。
///
/// 1月1日から7日ごとに区切った1始まりの番号で、範囲は1から53。
pub fn week_of_year(now: &OffsetDateTime) -> u16 {
    (now.ordinal() - 1) / 7 + 1
}

/// ログファイルを格納するディレクトリを返却する。
///
/// 月毎の場合は`<root>/<yyyy>`、それ以外は`<root>/<yyyy>/<MM>`となる。
pub fn create_log_directory(root: &Path, period: RotationPeriod, now: &OffsetDateTime) -> PathBuf {
    let year_directory = root.join(format!("{:04}", now.year()));
    match period {
        RotationPeriod::Monthly => year_directory,
        RotationPeriod::Daily | RotationPeriod::Weekly => {
            year_directory.join(format!("{:02}", u8::from(now.month())))
        }
    }
}

/// ログファイルの名前を作成して、返却する。
///
/// ログファイル名は周期によって以下となる。
///
/// - 日毎: `log_<yyyyMMdd>[_<suffix>].txt`
/// - 週毎: `log_week<週番号>[_<suffix>].txt`
/// - 月毎: `log_<yyyyMM>[_<suffix>].txt`
///
/// # 引数
///
/// * config: ロガーの設定。
/// * now: ファイルの日付。
///
/// # 戻り値
///
/// ログファイル名。
pub fn create_log_filename(config: &LoggerConfig, now: &OffsetDateTime) -> Result<String> {
    let stem = match config.period() {
        RotationPeriod::Daily => now.format(format_description!("[year][month][day]"))?,
        RotationPeriod::Weekly => format!("week{}", week_of_year(now)),
        RotationPeriod::Monthly => now.format(format_description!("[year][month]"))?,
    };
    let suffix = if config.suffix().is_empty() {
        String::new()
    } else {
        format!("_{}", config.suffix())
    };

    Ok(format!("log_{}{}.txt", stem, suffix))
}

/// ログファイルパスを作成して返却する。
///
/// ディスクには触れないため、同じ引数に対して常に同じパスを返す。
pub fn create_log_filepath(
    root: &Path,
    config: &LoggerConfig,
    now: &OffsetDateTime,
) -> Result<PathBuf> {
    let filename = create_log_filename(config, now)?;

    Ok(create_log_directory(root, config.period(), now).join(filename))
}

/// ログファイルパスを作成し、それを格納するディレクトリを作成する。
///
/// # 引数
///
/// * root: ログのルートディレクトリ。
/// * config: ロガーの設定。
/// * now: ファイルの日付。
///
/// # 戻り値
///
/// ログファイルパス。ディレクトリを作成できなかった場合は`Error::CreateDirectory`。
pub fn prepare_log_filepath(
    root: &Path,
    config: &LoggerConfig,
    now: &OffsetDateTime,
) -> Result<PathBuf> {
    let directory = create_log_directory(root, config.period(), now);
    fs::create_dir_all(&directory).map_err(|source| Error::CreateDirectory {
        path: directory.clone(),
        source,
    })?;

    create_log_filepath(root, config, now)
}
