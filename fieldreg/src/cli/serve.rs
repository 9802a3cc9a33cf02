//! serve サブコマンド
//!
//! HTTPサーバーを起動します。

use crate::config::{get_env_with_fallback_or, get_env_with_fallback_parse};
use clap::Args;

/// デフォルトの待ち受けポート
pub const DEFAULT_PORT: u16 = 8080;

/// デフォルトのバインドアドレス
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// serve サブコマンドの引数
///
/// 未指定の項目は`FIELDREG_PORT`/`PORT`、`FIELDREG_HOST`/`HOST`の順で解決する。
/// サブコマンドなしの起動は`ServeArgs::default()`で同じ解決を通る。
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Listen port [default: 8080]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(short = 'H', long)]
    pub host: Option<String>,
}

impl ServeArgs {
    /// フラグ、環境変数、デフォルトの順で決まる待ち受けポート
    pub fn resolved_port(&self) -> u16 {
        self.port
            .unwrap_or_else(|| get_env_with_fallback_parse("FIELDREG_PORT", "PORT", DEFAULT_PORT))
    }

    /// フラグ、環境変数、デフォルトの順で決まるバインドアドレス
    pub fn resolved_host(&self) -> String {
        self.host
            .clone()
            .unwrap_or_else(|| get_env_with_fallback_or("FIELDREG_HOST", "HOST", DEFAULT_HOST))
    }

    /// バインドアドレス
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.resolved_host(), self.resolved_port())
    }
}
