//! 環境変数による設定
//!
//! `FIELDREG_`付きの変数を優先し、未設定ならコンテナ環境で一般的な
//! 接頭辞なしの変数名（`PORT`、`DATABASE_URL`など）を参照する。

use std::path::PathBuf;
use std::time::Duration;

/// クラスタ半径のデフォルト値（メートル）
pub const DEFAULT_CLUSTER_RADIUS_M: f64 = 50.0;

/// 接頭辞付きの変数を読み、なければ接頭辞なしの変数を読む
///
/// ```
/// use fieldreg::config::get_env_with_fallback;
///
/// let port = get_env_with_fallback("FIELDREG_PORT", "PORT");
/// ```
pub fn get_env_with_fallback(name: &str, fallback_name: &str) -> Option<String> {
    std::env::var(name).ok().or_else(|| {
        let value = std::env::var(fallback_name).ok()?;
        tracing::debug!(variable = fallback_name, "Using unprefixed environment variable");
        Some(value)
    })
}

/// [`get_env_with_fallback`]に文字列のデフォルトを付けたもの
pub fn get_env_with_fallback_or(name: &str, fallback_name: &str, default: &str) -> String {
    get_env_with_fallback(name, fallback_name).unwrap_or_else(|| default.to_owned())
}

/// 型付きで読む。未設定・パース失敗時は`default`
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    name: &str,
    fallback_name: &str,
    default: T,
) -> T {
    match get_env_with_fallback(name, fallback_name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "Unparsable value, using default");
            default
        }),
        None => default,
    }
}

/// データディレクトリを取得
///
/// `FIELDREG_DATA_DIR`が未設定の場合は`~/.fieldreg`、ホームも不明なら`./.fieldreg`。
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = get_env_with_fallback("FIELDREG_DATA_DIR", "DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".fieldreg"))
        .unwrap_or_else(|| PathBuf::from(".fieldreg"))
}

/// データベースURLを取得
///
/// 未設定の場合はデータディレクトリ配下の`fieldreg.db`。
pub fn get_database_url() -> String {
    get_env_with_fallback("FIELDREG_DATABASE_URL", "DATABASE_URL").unwrap_or_else(|| {
        format!("sqlite:{}", get_data_dir().join("fieldreg.db").display())
    })
}

/// レビューコアの設定
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewConfig {
    /// `settings`テーブルに値がない場合のクラスタ半径（メートル）
    pub default_cluster_radius_m: f64,
    /// SQLiteのロック待ちタイムアウト
    pub busy_timeout: Duration,
    /// ベストエフォート監査ライターのチャネル容量
    pub audit_buffer_capacity: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_cluster_radius_m: DEFAULT_CLUSTER_RADIUS_M,
            busy_timeout: Duration::from_millis(5_000),
            audit_buffer_capacity: 1_000,
        }
    }
}

impl ReviewConfig {
    /// Load review configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_cluster_radius_m = get_env_with_fallback_parse(
            "FIELDREG_CLUSTER_RADIUS_M",
            "CLUSTER_RADIUS_M",
            defaults.default_cluster_radius_m,
        );
        let busy_timeout_ms = get_env_with_fallback_parse(
            "FIELDREG_DB_BUSY_TIMEOUT_MS",
            "DB_BUSY_TIMEOUT_MS",
            defaults.busy_timeout.as_millis() as u64,
        );
        let audit_buffer_capacity = get_env_with_fallback_parse(
            "FIELDREG_AUDIT_BUFFER_CAPACITY",
            "AUDIT_BUFFER_CAPACITY",
            defaults.audit_buffer_capacity,
        );

        Self {
            default_cluster_radius_m: if default_cluster_radius_m.is_finite()
                && default_cluster_radius_m > 0.0
            {
                default_cluster_radius_m
            } else {
                tracing::warn!(
                    "Ignoring invalid cluster radius {}, using {}",
                    default_cluster_radius_m,
                    DEFAULT_CLUSTER_RADIUS_M
                );
                DEFAULT_CLUSTER_RADIUS_M
            },
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            audit_buffer_capacity: audit_buffer_capacity.max(1),
        }
    }
}
