//! POST /api/fraud-detections/bulk-review の契約テスト

use crate::support::http::{get, post_json, post_raw};
use crate::support::review::{create_test_state, seed_two_clusters};
use axum::http::StatusCode;
use fieldreg::api::create_app;
use fieldreg::audit::types::AuditEntryFilter;
use fieldreg::fraud::service::ACTION_BULK_REVIEWED;
use fieldreg::types::Resolution;
use fieldreg::AppState;
use serde_json::json;

const BULK_URI: &str = "/api/fraud-detections/bulk-review";

async fn bulk_entries(state: &AppState) -> i64 {
    state
        .audit_log_storage
        .count(&AuditEntryFilter {
            action: Some(ACTION_BULK_REVIEWED.to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
}

async fn assert_unreviewed(state: &AppState, ids: &[&str]) {
    for id in ids {
        let d = state.detections.get(id).await.unwrap().unwrap();
        assert!(d.resolution.is_none(), "{} should be unreviewed", id);
        assert!(d.reviewed_by.is_none());
    }
}

#[tokio::test]
async fn bulk_review_updates_all_and_appends_one_entry() {
    let (state, _) = create_test_state().await;
    seed_two_clusters(&state).await;
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        BULK_URI,
        Some(("assessor-1", "unrestricted")),
        json!({
            "ids": ["d-01", "d-02"],
            "resolution": "confirmed_fraud",
            "notes": "  Same GPS fix on both household visits  ",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["resolution"], "confirmed_fraud");

    for id in ["d-01", "d-02"] {
        let d = state.detections.get(id).await.unwrap().unwrap();
        assert_eq!(d.resolution, Some(Resolution::ConfirmedFraud));
        assert_eq!(
            d.resolution_notes.as_deref(),
            Some("Same GPS fix on both household visits")
        );
        assert_eq!(d.reviewed_by.as_deref(), Some("assessor-1"));
        assert!(d.reviewed_at.is_some());
    }

    assert_eq!(bulk_entries(&state).await, 1);
    let entries = state
        .audit_log_storage
        .query(&AuditEntryFilter {
            action: Some(ACTION_BULK_REVIEWED.to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let details = &entries[0].details;
    assert_eq!(details["ids"], json!(["d-01", "d-02"]));
    assert_eq!(details["count"], 2);
    assert_eq!(details["resolution"], "confirmed_fraud");

    // 解決済みのクラスタは一覧から消える
    let (_, clusters) = get(
        &app,
        "/api/fraud-detections/clusters",
        Some(("assessor-1", "unrestricted")),
    )
    .await;
    let remaining = clusters["clusters"].as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["cluster_id"], "d-03");
}

#[tokio::test]
async fn bulk_review_rejects_single_id() {
    let (state, _) = create_test_state().await;
    seed_two_clusters(&state).await;
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        BULK_URI,
        Some(("assessor-1", "unrestricted")),
        json!({"ids": ["d-01"], "resolution": "dismissed", "notes": "Not enough evidence"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
    assert_unreviewed(&state, &["d-01"]).await;
    assert_eq!(bulk_entries(&state).await, 0);
}

#[tokio::test]
async fn bulk_review_rejects_short_notes_and_unknown_resolution() {
    let (state, _) = create_test_state().await;
    seed_two_clusters(&state).await;
    let app = create_app(state.clone());

    let (status, _) = post_json(
        &app,
        BULK_URI,
        Some(("assessor-1", "unrestricted")),
        json!({"ids": ["d-01", "d-02"], "resolution": "dismissed", "notes": "   too short   "}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        BULK_URI,
        Some(("assessor-1", "unrestricted")),
        json!({"ids": ["d-01", "d-02"], "resolution": "approved", "notes": "Looks fine after call"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_unreviewed(&state, &["d-01", "d-02"]).await;
    assert_eq!(bulk_entries(&state).await, 0);
}

#[tokio::test]
async fn bulk_review_malformed_body_is_validation_error() {
    let (state, _) = create_test_state().await;
    seed_two_clusters(&state).await;
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        BULK_URI,
        Some(("assessor-1", "unrestricted")),
        json!({"ids": "d-01", "resolution": "dismissed", "notes": "Not enough evidence"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
    assert!(body["error"]["message"].is_string());

    let (status, body) = post_raw(
        &app,
        BULK_URI,
        Some(("assessor-1", "unrestricted")),
        r#"{"ids": ["d-01", "d-02"], "resolution": "#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");

    assert_unreviewed(&state, &["d-01", "d-02"]).await;
    assert_eq!(bulk_entries(&state).await, 0);
}

#[tokio::test]
async fn bulk_review_unknown_id_changes_nothing() {
    let (state, _) = create_test_state().await;
    seed_two_clusters(&state).await;
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        BULK_URI,
        Some(("assessor-1", "unrestricted")),
        json!({
            "ids": ["d-01", "d-02", "d-missing"],
            "resolution": "false_positive",
            "notes": "Shared compound, legitimate",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
    assert_unreviewed(&state, &["d-01", "d-02"]).await;
    assert_eq!(bulk_entries(&state).await, 0);
}

#[tokio::test]
async fn bulk_review_outside_scope_is_forbidden_and_atomic() {
    let (state, resolver) = create_test_state().await;
    seed_two_clusters(&state).await;
    resolver.assign("sup-1", "owner-a").await.unwrap();
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        BULK_URI,
        Some(("sup-1", "restricted")),
        json!({
            "ids": ["d-01", "d-03"],
            "resolution": "needs_investigation",
            "notes": "Cross-team overlap, escalate",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "scope_violation");
    assert_unreviewed(&state, &["d-01", "d-03"]).await;
    assert_eq!(bulk_entries(&state).await, 0);
}

#[tokio::test]
async fn bulk_review_within_scope_succeeds_for_restricted_actor() {
    let (state, resolver) = create_test_state().await;
    seed_two_clusters(&state).await;
    resolver.assign("sup-1", "owner-b").await.unwrap();
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        BULK_URI,
        Some(("sup-1", "restricted")),
        json!({
            "ids": ["d-03", "d-04", "d-05"],
            "resolution": "enumerator_warned",
            "notes": "Warned during weekly team call",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(bulk_entries(&state).await, 1);
}

#[tokio::test]
async fn bulk_review_without_assignments_is_no_scope() {
    let (state, _) = create_test_state().await;
    seed_two_clusters(&state).await;
    let app = create_app(state.clone());

    let (status, body) = post_json(
        &app,
        BULK_URI,
        Some(("sup-9", "restricted")),
        json!({
            "ids": ["d-01", "d-02"],
            "resolution": "dismissed",
            "notes": "Reviewed by field lead",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "no_scope");
    assert_unreviewed(&state, &["d-01", "d-02"]).await;
}

#[tokio::test]
async fn bulk_review_chain_stays_valid_after_mixed_outcomes() {
    let (state, _) = create_test_state().await;
    seed_two_clusters(&state).await;
    let app = create_app(state.clone());
    let actor = Some(("assessor-1", "unrestricted"));

    let (ok, _) = post_json(
        &app,
        BULK_URI,
        actor,
        json!({"ids": ["d-01", "d-02"], "resolution": "dismissed", "notes": "Duplicate upload confirmed"}),
    )
    .await;
    assert_eq!(ok, StatusCode::OK);

    let (missing, _) = post_json(
        &app,
        BULK_URI,
        actor,
        json!({"ids": ["d-03", "d-404"], "resolution": "dismissed", "notes": "Duplicate upload confirmed"}),
    )
    .await;
    assert_eq!(missing, StatusCode::NOT_FOUND);

    let (ok, _) = post_json(
        &app,
        BULK_URI,
        actor,
        json!({"ids": ["d-03", "d-04"], "resolution": "confirmed_fraud", "notes": "Fabricated interviews"}),
    )
    .await;
    assert_eq!(ok, StatusCode::OK);

    let result = fieldreg::audit::hash_chain::verify_chain(&state.audit_log_storage, None)
        .await
        .unwrap();
    assert!(result.valid);
    assert_eq!(bulk_entries(&state).await, 2);
}
