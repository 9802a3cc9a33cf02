//! ロギング初期化
//!
//! 標準出力とデータディレクトリ配下の日次ローテーションファイルへ出力する。

use crate::config::{get_data_dir, get_env_with_fallback_or};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログファイル名のプレフィックス
pub const LOG_FILE_PREFIX: &str = "fieldreg.log";

/// ログディレクトリ
pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// `FIELDREG_LOG_LEVEL`（旧: `RUST_LOG`）からフィルタを構築
pub fn build_filter() -> EnvFilter {
    let level = get_env_with_fallback_or("FIELDREG_LOG_LEVEL", "RUST_LOG", "info");
    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// tracingサブスクライバーを初期化
///
/// 戻り値のガードはプロセス終了まで保持すること（drop時に未書き込みログをフラッシュする）。
pub fn init() -> anyhow::Result<WorkerGuard> {
    let dir = log_dir(&get_data_dir());
    std::fs::create_dir_all(&dir)?;

    let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(build_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()?;

    Ok(guard)
}
