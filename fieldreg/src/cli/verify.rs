//! verify-chain サブコマンド
//!
//! 監査台帳のハッシュチェーンを検証し、結果をJSONで出力します。
//! 改ざんを検出した場合は終了コード1で終了します。

use crate::audit::hash_chain::verify_chain;
use crate::audit::types::ChainVerificationResult;
use crate::config::{get_database_url, ReviewConfig};
use crate::db::audit_log::AuditLogStorage;
use crate::db::migrations::initialize_database;
use clap::Args;

/// verify-chain サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct VerifyChainArgs {
    /// Verify only the most recent N entries
    #[arg(long)]
    pub limit: Option<i64>,
}

/// 検証を実行し、チェーンが有効ならtrueを返す
pub async fn execute(args: &VerifyChainArgs) -> anyhow::Result<bool> {
    let config = ReviewConfig::from_env();
    let pool = initialize_database(&get_database_url(), config.busy_timeout).await?;
    let storage = AuditLogStorage::new(pool.clone());

    let result = verify_chain(&storage, args.limit).await;
    pool.close().await;
    let result = result?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(report(result))
}

/// 検証結果をログに出し、改ざんがなければtrue
fn report(result: ChainVerificationResult) -> bool {
    match result.into_result() {
        Ok(result) => {
            tracing::info!(
                verified = result.verified,
                total_records = result.total_records,
                "Audit ledger chain is intact"
            );
            true
        }
        Err(err) => {
            tracing::error!(error_type = err.error_type(), "{}", err);
            false
        }
    }
}
