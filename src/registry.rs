//! プロセス全体で共有するロガー
//!
//! 有効なロガーは常に1つで、異なる設定が要求されたときに新しいロガーへ置き換える。
//! 置き換えはロック下での参照の差し替えで行い、置き換え前に取得された参照を使っている
//! 呼び出しは、そのまま古いロガーに書き込みを完了する。

use std::{
    env,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    appenders::RotatingLogger,
    error::{Error, Result},
    rotation::LoggerConfig,
};

/// ログのルートディレクトリを上書きする環境変数
pub const LOG_DIR_ENV: &str = "ROTATING_LOGGER_DIR";

static ACTIVE: RwLock<Option<Arc<RotatingLogger>>> = RwLock::new(None);

/// ログのルートディレクトリを返却する。
///
/// 環境変数`ROTATING_LOGGER_DIR`が設定されていればその値を、設定されていなければ
/// 実行ファイルのディレクトリ直下の`Logs`を返す。
pub fn log_root() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(LOG_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let exe = env::current_exe().map_err(Error::LogRoot)?;
    let base = exe.parent().map(PathBuf::from).unwrap_or_default();

    Ok(base.join("Logs"))
}

/// 指定された設定のロガーを返却する。
///
/// 有効なロガーがない場合、または有効なロガーの設定が異なる場合は、新しいロガーを作成して
/// 有効なロガーと置き換える。
///
/// # 引数
///
/// * config: ロガーの設定。
///
/// # 戻り値
///
/// 有効なロガー。ディレクトリを作成できなかった場合はエラー。
pub fn get_instance(config: LoggerConfig) -> Result<Arc<RotatingLogger>> {
    let mut active = ACTIVE.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(logger) = active.as_ref().filter(|logger| *logger.config() == config) {
        return Ok(Arc::clone(logger));
    }

    let logger = Arc::new(RotatingLogger::new(log_root()?, config)?);
    tracing::debug!(
        path = %logger.path().display(),
        replaced = active.is_some(),
        "activated logger"
    );
    *active = Some(Arc::clone(&logger));

    Ok(logger)
}

/// 有効なロガーを設定にかかわらず返却する。有効なロガーがない場合は既定の設定で作成する。
pub fn instance() -> Result<Arc<RotatingLogger>> {
    if let Some(logger) = current() {
        return Ok(logger);
    }

    let mut active = ACTIVE.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(logger) = active.as_ref() {
        return Ok(Arc::clone(logger));
    }

    let logger = Arc::new(RotatingLogger::new(log_root()?, LoggerConfig::default())?);
    *active = Some(Arc::clone(&logger));

    Ok(logger)
}

/// 有効なロガーの参照を返却する。ロガーは作成しない。
pub fn current() -> Option<Arc<RotatingLogger>> {
    ACTIVE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(Arc::clone)
}
