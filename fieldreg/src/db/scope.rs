//! チーム割り当てテーブルによるスコープ解決

use crate::common::error::{RegistryError, RegistryResult};
use crate::db::traits::ScopeResolver;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// `team_assignments`を参照するScopeResolver
#[derive(Clone)]
pub struct SqliteScopeResolver {
    pool: SqlitePool,
}

impl SqliteScopeResolver {
    /// 新しいインスタンスを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 割り当てを追加（既存なら何もしない）
    pub async fn assign(&self, supervisor_id: &str, owner_id: &str) -> RegistryResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO team_assignments (supervisor_id, owner_id) VALUES (?, ?)",
        )
        .bind(supervisor_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to insert team assignment", e))?;
        Ok(())
    }
}

#[async_trait]
impl ScopeResolver for SqliteScopeResolver {
    async fn owned_entity_ids(&self, actor_id: &str) -> RegistryResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT owner_id FROM team_assignments WHERE supervisor_id = ? ORDER BY owner_id",
        )
        .bind(actor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to resolve team scope", e))
    }
}
