//! 設定テーブルのストレージ層
//!
//! SQLiteベースのキーバリュー設定を永続化

use crate::common::error::{RegistryError, RegistryResult};
use crate::db::traits::ConfigStore;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// クラスタ半径（メートル）の設定キー
pub const CLUSTER_RADIUS_KEY: &str = "fraud.cluster_radius_m";

/// 設定ストレージ
#[derive(Clone)]
pub struct SettingsStorage {
    pool: SqlitePool,
    default_cluster_radius_m: f64,
}

impl SettingsStorage {
    /// 新しいストレージインスタンスを作成
    pub fn new(pool: SqlitePool, default_cluster_radius_m: f64) -> Self {
        Self {
            pool,
            default_cluster_radius_m,
        }
    }

    /// 設定値を取得
    pub async fn get_setting(&self, key: &str) -> RegistryResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to get setting", e))
    }

    /// 設定値を保存（INSERT OR REPLACE）
    pub async fn set_setting(&self, key: &str, value: &str) -> RegistryResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to set setting", e))?;

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for SettingsStorage {
    async fn cluster_radius_m(&self) -> RegistryResult<f64> {
        let Some(raw) = self.get_setting(CLUSTER_RADIUS_KEY).await? else {
            return Ok(self.default_cluster_radius_m);
        };

        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
            _ => {
                tracing::warn!(
                    key = CLUSTER_RADIUS_KEY,
                    value = %raw,
                    "Invalid cluster radius setting, using default"
                );
                Ok(self.default_cluster_radius_m)
            }
        }
    }
}
