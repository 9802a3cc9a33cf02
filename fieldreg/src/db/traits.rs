//! 外部協調者のtrait定義
//!
//! スコープ解決と設定値の参照を抽象化し、テストでは固定値の実装に差し替える。

use async_trait::async_trait;
use std::collections::HashMap;

use crate::common::error::RegistryResult;

// ---------------------------------------------------------------------------
// ScopeResolver
// ---------------------------------------------------------------------------

/// レビュー担当者の操作可能範囲を解決するtrait
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    /// アクターが操作可能な提出者IDの集合を返す（割り当てなしは空）
    async fn owned_entity_ids(&self, actor_id: &str) -> RegistryResult<Vec<String>>;
}

/// 固定マップによるScopeResolver
#[derive(Debug, Clone, Default)]
pub struct StaticScopeResolver {
    assignments: HashMap<String, Vec<String>>,
}

impl StaticScopeResolver {
    /// 空の割り当てで作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 割り当てを追加
    pub fn with_assignment<I, S>(mut self, actor_id: impl Into<String>, owner_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignments
            .entry(actor_id.into())
            .or_default()
            .extend(owner_ids.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl ScopeResolver for StaticScopeResolver {
    async fn owned_entity_ids(&self, actor_id: &str) -> RegistryResult<Vec<String>> {
        Ok(self.assignments.get(actor_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// バージョン管理された設定値の参照trait
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// 現在のクラスタ半径（メートル）
    ///
    /// 表示用。クラスタ計算そのものには使わない。
    async fn cluster_radius_m(&self) -> RegistryResult<f64>;
}

/// 固定値のConfigStore
#[derive(Debug, Clone, Copy)]
pub struct FixedConfigStore {
    /// クラスタ半径（メートル）
    pub cluster_radius_m: f64,
}

#[async_trait]
impl ConfigStore for FixedConfigStore {
    async fn cluster_radius_m(&self) -> RegistryResult<f64> {
        Ok(self.cluster_radius_m)
    }
}
