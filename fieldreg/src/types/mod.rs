//! 型定義モジュール
//!
//! ドメインエンティティの型定義を提供

/// 不正検知レコード
pub mod detection;

/// 操作主体
pub mod actor;

pub use actor::{Actor, ActorScope};
pub use detection::{
    ComponentScores, FlaggedDetection, ProximityRef, Resolution, ResolutionPatch, Severity,
};
