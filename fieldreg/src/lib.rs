//! Field registry: fraud review and tamper-evident audit core
//!
//! 不正検知レコードの近接クラスタ表示と一括レビュー、およびハッシュチェーン監査台帳

#![warn(missing_docs)]

/// 共通ユーティリティ（エラー型・IP正規化）
pub mod common;

/// REST APIハンドラー
pub mod api;

/// 改ざん検知付き監査台帳
pub mod audit;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// データベースアクセス
pub mod db;

/// 不正レビュー（クラスタ・一括レビュー）
pub mod fraud;

/// ロギング初期化ユーティリティ
pub mod logging;

/// axumサーバー起動
pub mod server;

/// Shutdown controller
pub mod shutdown;

/// 型定義
pub mod types;

use std::sync::Arc;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// データベース接続プール
    pub db_pool: sqlx::SqlitePool,
    /// 不正レビューサービス
    pub review: fraud::FraudReviewService,
    /// 検知レコードストレージ
    pub detections: db::detections::DetectionStorage,
    /// 監査台帳ストレージ（全クローンで単一ライターロックを共有）
    pub audit_log_storage: db::audit_log::AuditLogStorage,
    /// ベストエフォート監査ライター
    pub audit_log_writer: audit::writer::AuditLogWriter,
    /// 設定ストレージ
    pub settings: db::settings::SettingsStorage,
    /// Cooperative shutdown controller
    pub shutdown: shutdown::ShutdownController,
}

impl AppState {
    /// プールと設定から状態を構築する
    ///
    /// 監査ライターのバックグラウンドタスクを起動するため、tokioランタイム内で呼ぶこと。
    pub fn new(
        db_pool: sqlx::SqlitePool,
        config: config::ReviewConfig,
        scope_resolver: Arc<dyn db::traits::ScopeResolver>,
    ) -> Self {
        let detections = db::detections::DetectionStorage::new(db_pool.clone());
        let audit_log_storage = db::audit_log::AuditLogStorage::new(db_pool.clone());
        let audit_log_writer = audit::writer::AuditLogWriter::new(
            audit_log_storage.clone(),
            audit::writer::AuditLogWriterConfig {
                buffer_capacity: config.audit_buffer_capacity.max(1),
            },
        );
        let settings =
            db::settings::SettingsStorage::new(db_pool.clone(), config.default_cluster_radius_m);
        let review = fraud::FraudReviewService::new(
            detections.clone(),
            audit_log_storage.clone(),
            scope_resolver,
            Arc::new(settings.clone()),
        )
        .with_view_log(audit_log_writer.clone());

        Self {
            db_pool,
            review,
            detections,
            audit_log_storage,
            audit_log_writer,
            settings,
            shutdown: shutdown::ShutdownController::default(),
        }
    }
}
