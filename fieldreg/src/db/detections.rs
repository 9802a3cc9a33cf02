//! 不正検知レコードのストレージ層
//!
//! 検知レコードはスコアリングエンジンが書き込み、レビュー結果の列だけを一括レビューが更新する。
//! 一括レビューで使う取得・更新は呼び出し側のトランザクション接続を受け取る。

use crate::common::error::{RegistryError, RegistryResult};
use crate::types::{
    ComponentScores, FlaggedDetection, ProximityRef, Resolution, ResolutionPatch, Severity,
};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

const DETECTION_SELECT: &str = r#"
    SELECT d.id, d.submission_id, d.owner_id, o.display_name AS owner_name, d.computed_at,
           d.gps_latitude, d.gps_longitude,
           d.gps_cluster_score, d.speed_score, d.straightline_score, d.duplicate_score,
           d.timing_score, d.total_score, d.severity, d.proximity_refs,
           d.resolution, d.resolution_notes, d.reviewed_by, d.reviewed_at
    FROM fraud_detections d
    LEFT JOIN owners o ON o.id = d.owner_id
"#;

/// 検知レコードストレージ
#[derive(Clone)]
pub struct DetectionStorage {
    pool: SqlitePool,
}

/// sqlx::FromRow用の行構造体
#[derive(Debug, sqlx::FromRow)]
struct DetectionRow {
    id: String,
    submission_id: String,
    owner_id: String,
    owner_name: Option<String>,
    computed_at: String,
    gps_latitude: Option<f64>,
    gps_longitude: Option<f64>,
    gps_cluster_score: f64,
    speed_score: f64,
    straightline_score: f64,
    duplicate_score: f64,
    timing_score: f64,
    total_score: f64,
    severity: String,
    proximity_refs: String,
    resolution: Option<String>,
    resolution_notes: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<String>,
}

fn parse_timestamp(field: &str, value: &str) -> RegistryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RegistryError::Database(format!("Failed to parse {}: {}", field, e)))
}

impl TryFrom<DetectionRow> for FlaggedDetection {
    type Error = RegistryError;

    fn try_from(row: DetectionRow) -> Result<Self, Self::Error> {
        let severity: Severity = row.severity.parse().map_err(RegistryError::Database)?;
        let resolution = row
            .resolution
            .as_deref()
            .map(str::parse::<Resolution>)
            .transpose()
            .map_err(RegistryError::Database)?;
        let proximity_refs: Vec<ProximityRef> = serde_json::from_str(&row.proximity_refs)
            .map_err(|e| RegistryError::Database(format!("Failed to parse proximity_refs: {}", e)))?;
        let reviewed_at = row
            .reviewed_at
            .as_deref()
            .map(|v| parse_timestamp("reviewed_at", v))
            .transpose()?;

        Ok(FlaggedDetection {
            id: row.id,
            submission_id: row.submission_id,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            computed_at: parse_timestamp("computed_at", &row.computed_at)?,
            latitude: row.gps_latitude,
            longitude: row.gps_longitude,
            scores: ComponentScores {
                gps_cluster: row.gps_cluster_score,
                speed: row.speed_score,
                straightline: row.straightline_score,
                duplicate: row.duplicate_score,
                timing: row.timing_score,
            },
            total_score: row.total_score,
            severity,
            resolution,
            resolution_notes: row.resolution_notes,
            reviewed_by: row.reviewed_by,
            reviewed_at,
            proximity_refs,
        })
    }
}

fn into_detections(rows: Vec<DetectionRow>) -> RegistryResult<Vec<FlaggedDetection>> {
    rows.into_iter()
        .map(FlaggedDetection::try_from)
        .collect::<Result<Vec<_>, _>>()
}

/// ID集合をjson_eachで展開できるJSON配列にする
fn json_array(ids: &[String]) -> RegistryResult<String> {
    serde_json::to_string(ids).map_err(|e| RegistryError::Internal(e.to_string()))
}

impl DetectionStorage {
    /// 新しいストレージインスタンスを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 提出者の表示名を登録・更新
    pub async fn upsert_owner(&self, owner_id: &str, display_name: &str) -> RegistryResult<()> {
        sqlx::query(
            "INSERT INTO owners (id, display_name) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
        )
        .bind(owner_id)
        .bind(display_name)
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to upsert owner", e))?;
        Ok(())
    }

    /// 検知レコードを登録（スコアリングエンジンからの取り込み用）
    pub async fn insert(&self, detection: &FlaggedDetection) -> RegistryResult<()> {
        let refs = serde_json::to_string(&detection.proximity_refs)
            .map_err(|e| RegistryError::Internal(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO fraud_detections (
                id, submission_id, owner_id, computed_at, gps_latitude, gps_longitude,
                gps_cluster_score, speed_score, straightline_score, duplicate_score, timing_score,
                total_score, severity, proximity_refs,
                resolution, resolution_notes, reviewed_by, reviewed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&detection.id)
        .bind(&detection.submission_id)
        .bind(&detection.owner_id)
        .bind(detection.computed_at.to_rfc3339())
        .bind(detection.latitude)
        .bind(detection.longitude)
        .bind(detection.scores.gps_cluster)
        .bind(detection.scores.speed)
        .bind(detection.scores.straightline)
        .bind(detection.scores.duplicate)
        .bind(detection.scores.timing)
        .bind(detection.total_score)
        .bind(detection.severity.as_str())
        .bind(refs)
        .bind(detection.resolution.map(|r| r.as_str()))
        .bind(&detection.resolution_notes)
        .bind(&detection.reviewed_by)
        .bind(detection.reviewed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to insert fraud detection", e))?;

        Ok(())
    }

    /// IDで検知レコードを取得
    pub async fn get(&self, id: &str) -> RegistryResult<Option<FlaggedDetection>> {
        let sql = format!("{} WHERE d.id = ?", DETECTION_SELECT);
        let row = sqlx::query_as::<_, DetectionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to get fraud detection", e))?;

        row.map(FlaggedDetection::try_from).transpose()
    }

    /// クラスタ候補（未レビューかつGPSクラスタスコアが正）を取得
    ///
    /// `owner_scope`がSomeの場合はその提出者に限定する。空集合なら結果も空。
    pub async fn list_cluster_candidates(
        &self,
        owner_scope: Option<&[String]>,
    ) -> RegistryResult<Vec<FlaggedDetection>> {
        let base = format!(
            "{} WHERE d.resolution IS NULL AND d.gps_cluster_score > 0",
            DETECTION_SELECT
        );

        let rows = match owner_scope {
            Some([]) => return Ok(Vec::new()),
            Some(owners) => {
                let sql = format!(
                    "{} AND d.owner_id IN (SELECT value FROM json_each(?)) ORDER BY d.id",
                    base
                );
                sqlx::query_as::<_, DetectionRow>(&sql)
                    .bind(json_array(owners)?)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("{} ORDER BY d.id", base);
                sqlx::query_as::<_, DetectionRow>(&sql)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| RegistryError::from_sqlx("Failed to list cluster candidates", e))?;

        into_detections(rows)
    }

    /// トランザクション内でID集合の検知レコードを取得
    ///
    /// 存在しないIDは結果に含まれない。
    pub async fn fetch_by_ids(
        &self,
        conn: &mut SqliteConnection,
        ids: &[String],
    ) -> RegistryResult<Vec<FlaggedDetection>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE d.id IN (SELECT value FROM json_each(?)) ORDER BY d.id",
            DETECTION_SELECT
        );
        let rows = sqlx::query_as::<_, DetectionRow>(&sql)
            .bind(json_array(ids)?)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to fetch fraud detections", e))?;

        into_detections(rows)
    }

    /// トランザクション内でID集合にレビュー結果を設定
    ///
    /// 更新件数を返す。
    pub async fn update_many(
        &self,
        conn: &mut SqliteConnection,
        ids: &[String],
        patch: &ResolutionPatch,
    ) -> RegistryResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE fraud_detections \
             SET resolution = ?, resolution_notes = ?, reviewed_by = ?, reviewed_at = ? \
             WHERE id IN (SELECT value FROM json_each(?))",
        )
        .bind(patch.resolution.as_str())
        .bind(&patch.notes)
        .bind(&patch.reviewed_by)
        .bind(patch.reviewed_at.to_rfc3339())
        .bind(json_array(ids)?)
        .execute(&mut *conn)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to update fraud detections", e))?;

        Ok(result.rows_affected())
    }
}
