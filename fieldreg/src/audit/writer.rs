//! ベストエフォート監査ライター
//!
//! 閲覧系の操作ログ用。mpscチャネルでエントリを受信し、バックグラウンドタスクが
//! 1件ずつ独立したトランザクションで台帳に追記する。
//! 失敗はwarnログに残して破棄し、呼び出し元の処理結果には影響しない。
//! 状態変更を伴う操作は`AuditLogStorage::append_in_tx`を使うこと。

use crate::audit::types::NewAuditEntry;
use crate::config::get_env_with_fallback_parse;
use crate::db::audit_log::AuditLogStorage;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 監査ライター設定
#[derive(Debug, Clone)]
pub struct AuditLogWriterConfig {
    /// チャネル容量。デフォルト: 1000
    pub buffer_capacity: usize,
}

impl Default for AuditLogWriterConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: get_env_with_fallback_parse(
                "FIELDREG_AUDIT_BUFFER_CAPACITY",
                "AUDIT_BUFFER_CAPACITY",
                1_000usize,
            )
            .max(1),
        }
    }
}

/// 監査ログの非同期ライター
///
/// Clone可能（senderのクローン）。全クローンがdropされるとタスクは残りを書き込んで終了する。
#[derive(Clone)]
pub struct AuditLogWriter {
    sender: mpsc::Sender<NewAuditEntry>,
}

impl AuditLogWriter {
    /// 新しいAuditLogWriterを作成し、バックグラウンドタスクを起動
    pub fn new(storage: AuditLogStorage, config: AuditLogWriterConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_capacity.max(1));

        tokio::spawn(Self::background_task(rx, storage));

        Self { sender: tx }
    }

    /// エントリを送信（ブロックしない）
    ///
    /// チャネルが満杯または閉じている場合は破棄してwarnを出す。
    pub fn send(&self, entry: NewAuditEntry) {
        if let Err(e) = self.sender.try_send(entry) {
            warn!("Failed to enqueue audit entry: {}", e);
        }
    }

    async fn background_task(mut rx: mpsc::Receiver<NewAuditEntry>, storage: AuditLogStorage) {
        while let Some(entry) = rx.recv().await {
            let action = entry.action.clone();
            match storage.append(entry).await {
                Ok(appended) => {
                    debug!(seq = appended.seq, action = %action, "Best-effort audit entry written");
                }
                Err(e) => {
                    warn!(action = %action, error = %e, "Dropping best-effort audit entry");
                }
            }
        }
        info!("Audit log writer background task stopped");
    }
}
