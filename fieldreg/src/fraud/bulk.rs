//! 一括レビュー要求の検証
//!
//! I/Oの前に行う事前条件チェック。違反はすべて検証エラーになり、副作用は発生しない。

use crate::common::error::{RegistryError, RegistryResult};
use crate::types::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 一括レビューの最小件数
pub const MIN_BULK_IDS: usize = 2;
/// 一括レビューの最大件数
pub const MAX_BULK_IDS: usize = 50;
/// レビューメモの最小文字数（前後の空白を除く）
pub const MIN_NOTES_CHARS: usize = 10;

/// 一括レビュー要求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkResolveRequest {
    /// 対象の検知ID
    pub ids: Vec<String>,
    /// レビュー結果（文字列のまま受け取り、検証時に解釈する）
    pub resolution: String,
    /// レビューメモ
    pub notes: String,
}

/// 検証済みの一括レビュー要求
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBulkResolve {
    /// 対象の検知ID（要求の順序を保持）
    pub ids: Vec<String>,
    /// レビュー結果
    pub resolution: Resolution,
    /// 前後の空白を除いたメモ
    pub notes: String,
}

/// 一括レビューの結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkResolveOutcome {
    /// 更新件数
    pub count: usize,
    /// 設定したレビュー結果
    pub resolution: Resolution,
}

impl BulkResolveRequest {
    /// 事前条件を検証
    pub fn validate(&self) -> RegistryResult<ValidatedBulkResolve> {
        if self.ids.len() < MIN_BULK_IDS || self.ids.len() > MAX_BULK_IDS {
            return Err(RegistryError::validation(format!(
                "ids must contain between {} and {} entries (got {})",
                MIN_BULK_IDS,
                MAX_BULK_IDS,
                self.ids.len()
            )));
        }

        if self.ids.iter().any(|id| id.trim().is_empty()) {
            return Err(RegistryError::validation("ids must not contain empty values"));
        }

        let mut seen = HashSet::with_capacity(self.ids.len());
        if !self.ids.iter().all(|id| seen.insert(id.as_str())) {
            return Err(RegistryError::validation("ids must not contain duplicates"));
        }

        let notes = self.notes.trim();
        if notes.chars().count() < MIN_NOTES_CHARS {
            return Err(RegistryError::validation(format!(
                "notes must be at least {} characters",
                MIN_NOTES_CHARS
            )));
        }

        let resolution: Resolution = self.resolution.parse().map_err(|_| {
            let allowed: Vec<&str> = Resolution::ALL.iter().map(|r| r.as_str()).collect();
            RegistryError::validation(format!(
                "resolution must be one of: {}",
                allowed.join(", ")
            ))
        })?;

        Ok(ValidatedBulkResolve {
            ids: self.ids.clone(),
            resolution,
            notes: notes.to_string(),
        })
    }
}
