use chrono::{DateTime, Duration, TimeZone, Utc};
use fieldreg::config::ReviewConfig;
use fieldreg::db::detections::DetectionStorage;
use fieldreg::db::migrations::run_migrations;
use fieldreg::db::scope::SqliteScopeResolver;
use fieldreg::types::{ComponentScores, FlaggedDetection, ProximityRef, Severity};
use fieldreg::AppState;
use sqlx::SqlitePool;
use std::sync::Arc;

/// テスト用のインメモリSQLiteプールを作成する
#[allow(dead_code)]
pub async fn create_test_db_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// スコープ解決にteam_assignmentsを使うAppStateを構築する
#[allow(dead_code)]
pub async fn create_test_state() -> (AppState, SqliteScopeResolver) {
    let pool = create_test_db_pool().await;
    let resolver = SqliteScopeResolver::new(pool.clone());
    let state = AppState::new(pool, ReviewConfig::default(), Arc::new(resolver.clone()));
    (state, resolver)
}

#[allow(dead_code)]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
}

/// 未レビューの検知レコード（GPSスコア正）
#[allow(dead_code)]
pub fn detection(id: &str, owner_id: &str, minutes: i64) -> FlaggedDetection {
    FlaggedDetection {
        id: id.to_string(),
        submission_id: format!("sub-{}", id),
        owner_id: owner_id.to_string(),
        owner_name: None,
        computed_at: base_time() + Duration::minutes(minutes),
        latitude: Some(9.0579),
        longitude: Some(7.4951),
        scores: ComponentScores {
            gps_cluster: 12.0,
            ..Default::default()
        },
        total_score: 45.0,
        severity: Severity::High,
        resolution: None,
        resolution_notes: None,
        reviewed_by: None,
        reviewed_at: None,
        proximity_refs: Vec::new(),
    }
}

/// `from`に`to`への近接参照を追加
#[allow(dead_code)]
pub fn linked(mut from: FlaggedDetection, to: &FlaggedDetection) -> FlaggedDetection {
    from.proximity_refs.push(ProximityRef {
        submission_id: to.submission_id.clone(),
        lat: to.latitude.unwrap_or_default(),
        lng: to.longitude.unwrap_or_default(),
        observed_at: to.computed_at,
    });
    from
}

/// 2つの提出者と2つのクラスタ、孤立レコード1件を投入する
///
/// - owner-a: d-01 <-> d-02
/// - owner-b: d-03 <-> d-04
/// - owner-b: d-05（近接参照なし）
#[allow(dead_code)]
pub async fn seed_two_clusters(state: &AppState) {
    let storage: &DetectionStorage = &state.detections;
    storage
        .upsert_owner("owner-a", "Amina Bello")
        .await
        .unwrap();
    storage
        .upsert_owner("owner-b", "Chidi Okafor")
        .await
        .unwrap();

    let d1 = detection("d-01", "owner-a", 0);
    let d2 = detection("d-02", "owner-a", 5);
    let d3 = detection("d-03", "owner-b", 10);
    let d4 = detection("d-04", "owner-b", 15);
    let d5 = detection("d-05", "owner-b", 20);

    let d1 = linked(d1, &d2);
    let d3 = linked(d3, &d4);

    for d in [&d1, &d2, &d3, &d4, &d5] {
        storage.insert(d).await.unwrap();
    }
}
