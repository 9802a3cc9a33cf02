//! 不正レビューサービス
//!
//! 読み取り側（クラスタ一覧）と書き込み側（一括レビュー）の入口。
//! 一括レビューは検知レコードの更新と監査エントリの追記を1トランザクションで行い、
//! どちらかが失敗すれば両方とも反映されない。

use crate::audit::types::NewAuditEntry;
use crate::audit::writer::AuditLogWriter;
use crate::common::error::{RegistryError, RegistryResult};
use crate::db::audit_log::{AuditLogStorage, LedgerTransaction};
use crate::db::detections::DetectionStorage;
use crate::db::traits::{ConfigStore, ScopeResolver};
use crate::fraud::bulk::{BulkResolveOutcome, BulkResolveRequest, ValidatedBulkResolve};
use crate::fraud::cluster::{build_clusters, Cluster};
use crate::types::{Actor, ResolutionPatch};
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// 一括レビューの監査アクション名
pub const ACTION_BULK_REVIEWED: &str = "fraud_detection.bulk_reviewed";
/// クラスタ一覧閲覧の監査アクション名
pub const ACTION_CLUSTERS_VIEWED: &str = "fraud_detection.clusters_viewed";
/// 監査エントリの対象リソース種別
pub const TARGET_FRAUD_DETECTIONS: &str = "fraud_detections";

/// 不正レビューサービス
#[derive(Clone)]
pub struct FraudReviewService {
    detections: DetectionStorage,
    ledger: AuditLogStorage,
    scope_resolver: Arc<dyn ScopeResolver>,
    config_store: Arc<dyn ConfigStore>,
    view_log: Option<AuditLogWriter>,
}

impl FraudReviewService {
    /// 新しいサービスを作成
    pub fn new(
        detections: DetectionStorage,
        ledger: AuditLogStorage,
        scope_resolver: Arc<dyn ScopeResolver>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            detections,
            ledger,
            scope_resolver,
            config_store,
            view_log: None,
        }
    }

    /// 閲覧ログ用のライターを設定
    pub fn with_view_log(mut self, writer: AuditLogWriter) -> Self {
        self.view_log = Some(writer);
        self
    }

    /// スコープ制限付きアクターの担当提出者集合（制限なしはNone）
    async fn resolve_scope(&self, actor: &Actor) -> RegistryResult<Option<Vec<String>>> {
        if !actor.is_restricted() {
            return Ok(None);
        }
        let owners = self.scope_resolver.owned_entity_ids(&actor.id).await?;
        Ok(Some(owners))
    }

    /// 未レビューの近接クラスタ一覧
    ///
    /// スコープ制限付きで割り当てがないアクターには空の一覧を返す。
    pub async fn get_clusters(&self, actor: &Actor) -> RegistryResult<Vec<Cluster>> {
        let scope = self.resolve_scope(actor).await?;
        let candidates = self
            .detections
            .list_cluster_candidates(scope.as_deref())
            .await?;
        let radius_m = self.config_store.cluster_radius_m().await?;
        let clusters = build_clusters(&candidates, radius_m);

        if let Some(writer) = &self.view_log {
            writer.send(
                NewAuditEntry::new(ACTION_CLUSTERS_VIEWED, TARGET_FRAUD_DETECTIONS)
                    .with_actor(actor.id.clone())
                    .with_details(json!({
                        "cluster_count": clusters.len(),
                        "candidate_count": candidates.len(),
                    }))
                    .with_client(actor.ip_address.clone(), actor.user_agent.clone()),
            );
        }

        Ok(clusters)
    }

    /// 検知レコードを一括でレビュー済みにする（全件成功か全件失敗）
    pub async fn resolve_many(
        &self,
        request: &BulkResolveRequest,
        actor: &Actor,
    ) -> RegistryResult<BulkResolveOutcome> {
        let validated = request.validate()?;

        let scope = match self.resolve_scope(actor).await? {
            Some(owners) if owners.is_empty() => {
                return Err(RegistryError::NoScope(format!(
                    "actor {} has no assigned owners",
                    actor.id
                )));
            }
            Some(owners) => Some(owners.into_iter().collect::<HashSet<_>>()),
            None => None,
        };

        let mut tx = self.ledger.begin_write().await?;
        match self
            .apply_in_tx(&mut tx, &validated, actor, scope.as_ref())
            .await
        {
            Ok(outcome) => {
                tx.commit().await?;
                info!(
                    actor_id = %actor.id,
                    count = outcome.count,
                    resolution = %outcome.resolution,
                    "Bulk fraud review committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Failed to roll back bulk fraud review: {}", rb);
                }
                Err(e)
            }
        }
    }

    async fn apply_in_tx(
        &self,
        tx: &mut LedgerTransaction,
        request: &ValidatedBulkResolve,
        actor: &Actor,
        scope: Option<&HashSet<String>>,
    ) -> RegistryResult<BulkResolveOutcome> {
        let rows = self.detections.fetch_by_ids(tx.conn(), &request.ids).await?;
        if rows.len() != request.ids.len() {
            return Err(RegistryError::NotFound(format!(
                "{} of {} detections exist",
                rows.len(),
                request.ids.len()
            )));
        }

        if let Some(scope) = scope {
            let outside = rows
                .iter()
                .filter(|d| !scope.contains(&d.owner_id))
                .count();
            if outside > 0 {
                return Err(RegistryError::ScopeViolation(format!(
                    "{} detections are outside the scope of actor {}",
                    outside, actor.id
                )));
            }
        }

        let patch = ResolutionPatch {
            resolution: request.resolution,
            notes: request.notes.clone(),
            reviewed_by: actor.id.clone(),
            reviewed_at: Utc::now(),
        };
        let updated = self
            .detections
            .update_many(tx.conn(), &request.ids, &patch)
            .await?;
        if updated as usize != request.ids.len() {
            return Err(RegistryError::Internal(format!(
                "updated {} rows, expected {}",
                updated,
                request.ids.len()
            )));
        }

        self.ledger
            .append_in_tx(
                tx,
                NewAuditEntry::new(ACTION_BULK_REVIEWED, TARGET_FRAUD_DETECTIONS)
                    .with_actor(actor.id.clone())
                    .with_details(json!({
                        "ids": request.ids,
                        "count": request.ids.len(),
                        "resolution": request.resolution.as_str(),
                        "notes": request.notes,
                    }))
                    .with_client(actor.ip_address.clone(), actor.user_agent.clone()),
            )
            .await?;

        Ok(BulkResolveOutcome {
            count: request.ids.len(),
            resolution: request.resolution,
        })
    }
}
