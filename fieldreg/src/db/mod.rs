//! データベースアクセス層
//!
//! SQLiteベースのデータ永続化

/// データベースマイグレーション
pub mod migrations;

/// 監査台帳ストレージ
pub mod audit_log;

/// 不正検知レコード
pub mod detections;

/// チーム割り当てによるスコープ解決
pub mod scope;

/// 設定管理
pub mod settings;

/// 外部協調者のtrait（スコープ解決・設定参照）
pub mod traits;
