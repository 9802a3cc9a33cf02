//! ファイルDBを共有する複数プロセス相当の同時追記テスト
//!
//! 2つのAppStateはそれぞれ独立したプロセス内ロックを持つため、
//! 直列化はSQLiteの書き込みロックと末尾ハッシュのCASに依存する。

use fieldreg::audit::hash_chain::verify_chain;
use fieldreg::audit::types::NewAuditEntry;
use fieldreg::db::audit_log::AuditLogStorage;
use fieldreg::db::migrations::initialize_database;
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_pools_on_one_file_keep_a_single_chain() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("ledger.db").display());

    let pool_a = initialize_database(&url, Duration::from_secs(10))
        .await
        .unwrap();
    let pool_b = initialize_database(&url, Duration::from_secs(10))
        .await
        .unwrap();
    let ledger_a = AuditLogStorage::new(pool_a.clone());
    let ledger_b = AuditLogStorage::new(pool_b.clone());

    let mut handles = Vec::new();
    for (name, ledger) in [("a", ledger_a.clone()), ("b", ledger_b.clone())] {
        for worker in 0..3 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..5 {
                    ledger
                        .append(
                            NewAuditEntry::new("fraud_detection.bulk_reviewed", "fraud_detections")
                                .with_actor(format!("{}-{}-{}", name, worker, i)),
                        )
                        .await
                        .unwrap();
                }
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let entries = ledger_a.verification_snapshot(None).await.unwrap().entries;
    assert_eq!(entries.len(), 30);

    let previous: HashSet<&str> = entries.iter().map(|e| e.previous_hash.as_str()).collect();
    assert_eq!(previous.len(), 30, "no two entries may share a predecessor");

    let result = verify_chain(&ledger_b, None).await.unwrap();
    assert!(result.valid);
    assert_eq!(result.verified, 30);

    pool_a.close().await;
    pool_b.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn verification_during_appends_sees_one_consistent_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("ledger.db").display());
    let pool = initialize_database(&url, Duration::from_secs(10))
        .await
        .unwrap();
    let ledger = AuditLogStorage::new(pool.clone());

    let writer = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            for i in 0..40 {
                ledger
                    .append(
                        NewAuditEntry::new("fraud_detection.bulk_reviewed", "fraud_detections")
                            .with_actor(format!("writer-{}", i)),
                    )
                    .await
                    .unwrap();
            }
        })
    };

    while !writer.is_finished() {
        let full = verify_chain(&ledger, None).await.unwrap();
        assert!(full.valid);
        assert_eq!(full.verified, full.total_records);

        let window = verify_chain(&ledger, Some(3)).await.unwrap();
        assert!(window.valid);
        assert!(window.verified <= window.total_records);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    writer.await.unwrap();

    let result = verify_chain(&ledger, None).await.unwrap();
    assert!(result.valid);
    assert_eq!(result.verified, 40);

    pool.close().await;
}
