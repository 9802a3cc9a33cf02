//! 操作主体（レビュー担当者）の型定義

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// アクターのスコープ種別
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorScope {
    /// 全データに対して操作可能（上位ロール）
    Unrestricted,
    /// 割り当てられた提出者のデータのみ操作可能
    Restricted,
}

impl ActorScope {
    /// ActorScopeを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Restricted => "restricted",
        }
    }
}

impl FromStr for ActorScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unrestricted" => Ok(Self::Unrestricted),
            "restricted" => Ok(Self::Restricted),
            other => Err(format!("unknown actor scope '{}'", other)),
        }
    }
}

/// 認証済みの操作主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// ユーザーID
    pub id: String,
    /// スコープ種別
    pub scope: ActorScope,
    /// クライアントIP
    pub ip_address: Option<String>,
    /// User-Agent
    pub user_agent: Option<String>,
}

impl Actor {
    /// スコープ制限なしのアクター
    pub fn unrestricted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: ActorScope::Unrestricted,
            ip_address: None,
            user_agent: None,
        }
    }

    /// スコープ制限付きのアクター
    pub fn restricted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: ActorScope::Restricted,
            ip_address: None,
            user_agent: None,
        }
    }

    /// スコープ制限付きか
    pub fn is_restricted(&self) -> bool {
        self.scope == ActorScope::Restricted
    }
}
