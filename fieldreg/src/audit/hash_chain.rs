//! SHA-256ハッシュチェーン（改ざん検知）
//!
//! エントリ単位でハッシュを計算し、直前エントリのハッシュを含むチェーンを構成する。
//! 追記時の計算と検証時の再計算は同じ`compute_entry_hash`を通る。

use crate::audit::canonical::{canonicalize, normalize_details};
use crate::audit::types::{
    AuditEntry, ChainVerificationResult, TamperKind, TamperedEntry, SYSTEM_ACTOR,
};
use crate::common::error::{RegistryError, RegistryResult};
use crate::db::audit_log::AuditLogStorage;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

/// ジェネシスハッシュの元になる固定リテラル
pub const GENESIS_SEED: &str = "fieldreg:audit-ledger:genesis:v1";

static GENESIS_HASH: Lazy<String> = Lazy::new(|| sha256_hex(GENESIS_SEED.as_bytes()));

/// 空の台帳に最初に追記するエントリのprevious_hash
pub fn genesis_hash() -> &'static str {
    GENESIS_HASH.as_str()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// ハッシュ入力に使うISO-8601表現（ミリ秒・`Z`固定）
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// エントリハッシュを計算
///
/// `SHA-256(canonicalize({id, action, actorId ?? "SYSTEM", createdAt, details ?? {}, previousHash}))`
pub fn compute_entry_hash(
    id: &str,
    action: &str,
    actor_id: Option<&str>,
    created_at: &DateTime<Utc>,
    details: Option<&Value>,
    previous_hash: &str,
) -> String {
    let payload = json!({
        "id": id,
        "action": action,
        "actorId": actor_id.unwrap_or(SYSTEM_ACTOR),
        "createdAt": format_timestamp(created_at),
        "details": normalize_details(details),
        "previousHash": previous_hash,
    });
    sha256_hex(canonicalize(&payload).as_bytes())
}

/// 保存済みエントリの内容（主張しているprevious_hashを含む）からハッシュを再計算
pub fn recompute_hash(entry: &AuditEntry) -> String {
    compute_entry_hash(
        &entry.id,
        &entry.action,
        entry.actor_id.as_deref(),
        &entry.created_at,
        Some(&entry.details),
        &entry.previous_hash,
    )
}

/// 昇順に並んだエントリ列を検証
///
/// `expected_previous`は先頭エントリが参照すべきハッシュ。
/// 戻り値は（検証を通過した件数, 最初の改ざん箇所）。
pub fn verify_entries(
    entries: &[AuditEntry],
    expected_previous: &str,
) -> (i64, Option<TamperedEntry>) {
    let mut expected_previous = expected_previous.to_string();
    let mut verified = 0i64;

    for entry in entries {
        let kind = if recompute_hash(entry) != entry.hash {
            Some(TamperKind::HashMismatch)
        } else if entry.previous_hash != expected_previous {
            Some(TamperKind::BrokenLink)
        } else {
            None
        };

        if let Some(kind) = kind {
            warn!(
                entry_id = %entry.id,
                seq = entry.seq,
                kind = ?kind,
                "Hash chain broken"
            );
            return (
                verified,
                Some(TamperedEntry {
                    id: entry.id.clone(),
                    seq: entry.seq,
                    created_at: entry.created_at,
                    kind,
                }),
            );
        }

        verified += 1;
        expected_previous = entry.hash.clone();
    }

    (verified, None)
}

/// 台帳のハッシュチェーンを検証
///
/// `limit`指定時は直近`limit`件のみを検証する（スポットチェック）。
/// その場合、先頭エントリのリンクは窓の直前エントリの保存ハッシュと照合する。
/// `total_records`は常に台帳全体の件数。
pub async fn verify_chain(
    storage: &AuditLogStorage,
    limit: Option<i64>,
) -> RegistryResult<ChainVerificationResult> {
    if let Some(n) = limit {
        if n < 1 {
            return Err(RegistryError::validation("limit must be a positive integer"));
        }
    }

    let snapshot = storage.verification_snapshot(limit).await?;
    let total_records = snapshot.total_records;
    if total_records == 0 {
        return Ok(ChainVerificationResult {
            valid: true,
            total_records: 0,
            verified: 0,
            first_tampered: None,
            message: Some("No entries to verify".to_string()),
        });
    }

    let entries = snapshot.entries;
    let expected_previous = snapshot
        .preceding_hash
        .unwrap_or_else(|| genesis_hash().to_string());

    let (verified, first_tampered) = verify_entries(&entries, &expected_previous);
    let message = first_tampered.as_ref().map(|t| match t.kind {
        TamperKind::HashMismatch => format!("Entry hash mismatch at seq {}", t.seq),
        TamperKind::BrokenLink => format!("Previous hash mismatch at seq {}", t.seq),
    });

    Ok(ChainVerificationResult {
        valid: first_tampered.is_none(),
        total_records,
        verified,
        first_tampered,
        message,
    })
}

impl ChainVerificationResult {
    /// 改ざんが検出されていれば`LedgerIntegrity`エラーに変換
    pub fn into_result(self) -> RegistryResult<Self> {
        if self.valid {
            return Ok(self);
        }
        let detail = self
            .first_tampered
            .as_ref()
            .map(|t| format!("entry {} (seq {}): {:?}", t.id, t.seq, t.kind))
            .unwrap_or_else(|| "unknown entry".to_string());
        Err(RegistryError::LedgerIntegrity(detail))
    }
}
