//! 監査台帳ストレージ
//!
//! 追記は直列化される。書き込みトランザクションは
//! 1. プロセス内の単一ライターMutexを取得し、
//! 2. `audit_chain_tail`行を更新してSQLiteの書き込みロックを取り、
//! 3. 末尾ハッシュを読み、エントリを挿入し、
//! 4. 末尾行を旧ハッシュから新ハッシュへcompare-and-swapする。
//!
//! MutexとDBロックはコミット（またはロールバック）まで保持される。

use crate::audit::canonical::{canonicalize, normalize_details};
use crate::audit::hash_chain::{self, compute_entry_hash, format_timestamp};
use crate::audit::types::{AuditEntry, AuditEntryFilter, NewAuditEntry};
use crate::common::error::{RegistryError, RegistryResult};
use chrono::{SubsecRound, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// 単独追記の最大試行回数（末尾CASの競合・ロック待ちタイムアウト時）
const MAX_APPEND_ATTEMPTS: u32 = 5;

const ENTRY_COLUMNS: &str = "seq, id, actor_id, action, target_resource, target_id, details, \
                             ip_address, user_agent, created_at, hash, previous_hash";

/// 監査台帳のDB操作
///
/// Clone可能。クローン間で単一ライターMutexを共有する。
#[derive(Clone)]
pub struct AuditLogStorage {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

/// 台帳の書き込みトランザクション
///
/// 末尾ロックを保持したまま、呼び出し側のドメイン更新も同じトランザクションで行える。
/// commitせずにdropした場合はロールバックされる。
pub struct LedgerTransaction {
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

/// 検証用の一貫した読み取り結果
#[derive(Debug, Clone)]
pub struct VerificationSnapshot {
    /// 台帳全体の件数
    pub total_records: i64,
    /// 検証対象（連番昇順）
    pub entries: Vec<AuditEntry>,
    /// 先頭エントリの直前エントリのハッシュ（台帳先頭ならNone）
    pub preceding_hash: Option<String>,
}

impl LedgerTransaction {
    /// トランザクション内の接続
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// コミット
    pub async fn commit(self) -> RegistryResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to commit ledger transaction", e))
    }

    /// ロールバック
    pub async fn rollback(self) -> RegistryResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to roll back ledger transaction", e))
    }
}

/// sqlx::FromRow用の行構造体
#[derive(Debug, sqlx::FromRow)]
struct AuditEntryRow {
    seq: i64,
    id: String,
    actor_id: Option<String>,
    action: String,
    target_resource: String,
    target_id: Option<String>,
    details: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: String,
    hash: String,
    previous_hash: String,
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = RegistryError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RegistryError::Database(format!("Failed to parse created_at: {}", e)))?;
        let details = serde_json::from_str(&row.details)
            .map_err(|e| RegistryError::Database(format!("Failed to parse details: {}", e)))?;

        Ok(AuditEntry {
            seq: row.seq,
            id: row.id,
            actor_id: row.actor_id,
            action: row.action,
            target_resource: row.target_resource,
            target_id: row.target_id,
            details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at,
            hash: row.hash,
            previous_hash: row.previous_hash,
        })
    }
}

impl AuditLogStorage {
    /// 新しいAuditLogStorageを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 接続プール
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 書き込みトランザクションを開始し、チェーン末尾をロックする
    pub async fn begin_write(&self) -> RegistryResult<LedgerTransaction> {
        let guard = self.write_lock.clone().lock_owned().await;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to begin transaction", e))?;

        // 最初の文で書き込みを行い、トランザクション全体で書き込みロックを保持する
        let locked = sqlx::query("UPDATE audit_chain_tail SET locked_at = ? WHERE id = 1")
            .bind(format_timestamp(&Utc::now()))
            .execute(&mut *tx)
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to lock audit chain tail", e))?;

        if locked.rows_affected() != 1 {
            return Err(RegistryError::Database(
                "audit_chain_tail row is missing".to_string(),
            ));
        }

        Ok(LedgerTransaction { tx, _guard: guard })
    }

    /// 呼び出し側のトランザクション内でエントリを追記（トランザクション型）
    ///
    /// 失敗した場合、呼び出し側はトランザクション全体をロールバックしなければならない。
    pub async fn append_in_tx(
        &self,
        ledger_tx: &mut LedgerTransaction,
        entry: NewAuditEntry,
    ) -> RegistryResult<AuditEntry> {
        let conn = ledger_tx.conn();

        let tail: Option<String> =
            sqlx::query_scalar("SELECT hash FROM audit_entries ORDER BY seq DESC LIMIT 1")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| RegistryError::from_sqlx("Failed to read audit chain tail", e))?;
        let previous_hash = tail
            .clone()
            .unwrap_or_else(|| hash_chain::genesis_hash().to_string());

        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().trunc_subsecs(3);
        // 保存するテキストから読み戻した値でハッシュし、検証時の再パースと一致させる
        let stored_details = canonicalize(&normalize_details(entry.details.as_ref()));
        let details: serde_json::Value = serde_json::from_str(&stored_details)
            .map_err(|e| RegistryError::Internal(format!("Failed to reparse details: {}", e)))?;
        let hash = compute_entry_hash(
            &id,
            &entry.action,
            entry.actor_id.as_deref(),
            &created_at,
            Some(&details),
            &previous_hash,
        );

        let result = sqlx::query(
            r#"INSERT INTO audit_entries (
                id, actor_id, action, target_resource, target_id, details,
                ip_address, user_agent, created_at, hash, previous_hash
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.target_resource)
        .bind(&entry.target_id)
        .bind(&stored_details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(format_timestamp(&created_at))
        .bind(&hash)
        .bind(&previous_hash)
        .execute(&mut *conn)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to insert audit entry", e))?;
        let seq = result.last_insert_rowid();

        let swapped = sqlx::query(
            "UPDATE audit_chain_tail SET tail_hash = ?, tail_seq = ? \
             WHERE id = 1 AND tail_hash IS ?",
        )
        .bind(&hash)
        .bind(seq)
        .bind(&tail)
        .execute(&mut *conn)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to advance audit chain tail", e))?;

        if swapped.rows_affected() != 1 {
            return Err(RegistryError::Transient(format!(
                "Audit chain tail moved during append (expected {:?})",
                tail
            )));
        }

        debug!(seq, entry_id = %id, action = %entry.action, "Appended audit entry");

        Ok(AuditEntry {
            seq,
            id,
            actor_id: entry.actor_id,
            action: entry.action,
            target_resource: entry.target_resource,
            target_id: entry.target_id,
            details,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at,
            hash,
            previous_hash,
        })
    }

    /// 単独トランザクションでエントリを追記
    ///
    /// 一時的エラーは短いバックオフを挟んで再試行する。
    pub async fn append(&self, entry: NewAuditEntry) -> RegistryResult<AuditEntry> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_append(entry.clone()).await {
                Ok(appended) => return Ok(appended),
                Err(e) if e.is_transient() && attempt < MAX_APPEND_ATTEMPTS => {
                    warn!(attempt, error = %e, "Retrying audit append");
                    tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_append(&self, entry: NewAuditEntry) -> RegistryResult<AuditEntry> {
        let mut tx = self.begin_write().await?;
        match self.append_in_tx(&mut tx, entry).await {
            Ok(appended) => {
                tx.commit().await?;
                Ok(appended)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Failed to roll back audit append: {}", rb);
                }
                Err(e)
            }
        }
    }

    /// 総エントリ数
    pub async fn count_all(&self) -> RegistryResult<i64> {
        let mut conn = self.acquire().await?;
        count_all_on(&mut *conn).await
    }

    /// 検証に必要な読み取りを1つの読み取りトランザクションで行う
    ///
    /// 件数・エントリ・窓の直前ハッシュが同じスナップショットから得られる。
    pub async fn verification_snapshot(
        &self,
        limit: Option<i64>,
    ) -> RegistryResult<VerificationSnapshot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to begin read transaction", e))?;

        let total_records = count_all_on(&mut *tx).await?;
        let entries = if total_records == 0 {
            Vec::new()
        } else {
            list_for_verification_on(&mut *tx, limit).await?
        };
        let preceding_hash = match entries.first() {
            Some(first) => hash_before_on(&mut *tx, first.seq).await?,
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to end read transaction", e))?;

        Ok(VerificationSnapshot {
            total_records,
            entries,
            preceding_hash,
        })
    }

    async fn acquire(&self) -> RegistryResult<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to acquire connection", e))
    }

    /// IDでエントリを取得
    pub async fn get_by_id(&self, id: &str) -> RegistryResult<Option<AuditEntry>> {
        let sql = format!("SELECT {} FROM audit_entries WHERE id = ?", ENTRY_COLUMNS);
        let row = sqlx::query_as::<_, AuditEntryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to get audit entry by id", e))?;

        row.map(AuditEntry::try_from).transpose()
    }

    /// フィルタ条件に基づいてエントリを検索（新しい順）
    pub async fn query(&self, filter: &AuditEntryFilter) -> RegistryResult<Vec<AuditEntry>> {
        let (where_clause, bind_values) = build_where_clause(filter);
        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter.per_page.unwrap_or(50).clamp(1, 500);
        let offset = (page - 1) * per_page;

        let sql = format!(
            "SELECT {} FROM audit_entries {} ORDER BY seq DESC LIMIT ? OFFSET ?",
            ENTRY_COLUMNS, where_clause
        );

        let mut query = sqlx::query_as::<_, AuditEntryRow>(&sql);
        for val in &bind_values {
            query = query.bind(val.as_str());
        }
        query = query.bind(per_page).bind(offset);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to query audit entries", e))?;

        rows.into_iter()
            .map(AuditEntry::try_from)
            .collect::<Result<Vec<_>, _>>()
    }

    /// フィルタ条件に基づいて件数を取得
    pub async fn count(&self, filter: &AuditEntryFilter) -> RegistryResult<i64> {
        let (where_clause, bind_values) = build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_entries {}", where_clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for val in &bind_values {
            query = query.bind(val.as_str());
        }

        query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RegistryError::from_sqlx("Failed to count audit entries", e))
    }
}

async fn count_all_on(conn: &mut SqliteConnection) -> RegistryResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM audit_entries")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to count audit entries", e))
}

/// 検証用にエントリを連番昇順で取得（`limit`指定時は直近`limit`件）
async fn list_for_verification_on(
    conn: &mut SqliteConnection,
    limit: Option<i64>,
) -> RegistryResult<Vec<AuditEntry>> {
    let rows = match limit {
        Some(n) => {
            let sql = format!(
                "SELECT {cols} FROM (SELECT {cols} FROM audit_entries ORDER BY seq DESC LIMIT ?) \
                 ORDER BY seq ASC",
                cols = ENTRY_COLUMNS
            );
            sqlx::query_as::<_, AuditEntryRow>(&sql)
                .bind(n)
                .fetch_all(&mut *conn)
                .await
        }
        None => {
            let sql = format!("SELECT {} FROM audit_entries ORDER BY seq ASC", ENTRY_COLUMNS);
            sqlx::query_as::<_, AuditEntryRow>(&sql)
                .fetch_all(&mut *conn)
                .await
        }
    }
    .map_err(|e| RegistryError::from_sqlx("Failed to load audit entries", e))?;

    rows.into_iter()
        .map(AuditEntry::try_from)
        .collect::<Result<Vec<_>, _>>()
}

async fn hash_before_on(conn: &mut SqliteConnection, seq: i64) -> RegistryResult<Option<String>> {
    sqlx::query_scalar("SELECT hash FROM audit_entries WHERE seq < ? ORDER BY seq DESC LIMIT 1")
        .bind(seq)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RegistryError::from_sqlx("Failed to read preceding audit hash", e))
}

fn build_where_clause(filter: &AuditEntryFilter) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let Some(ref actor_id) = filter.actor_id {
        conditions.push("actor_id = ?");
        binds.push(actor_id.clone());
    }
    if let Some(ref action) = filter.action {
        conditions.push("action = ?");
        binds.push(action.clone());
    }
    if let Some(ref target_resource) = filter.target_resource {
        conditions.push("target_resource = ?");
        binds.push(target_resource.clone());
    }
    if let Some(ref from) = filter.time_from {
        conditions.push("created_at >= ?");
        binds.push(format_timestamp(from));
    }
    if let Some(ref to) = filter.time_to {
        conditions.push("created_at <= ?");
        binds.push(format_timestamp(to));
    }

    if conditions.is_empty() {
        (String::new(), binds)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), binds)
    }
}
