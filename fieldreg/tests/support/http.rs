use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

/// アクターヘッダー付きのGETを送信
#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str, actor: Option<(&str, &str)>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some((id, scope)) = actor {
        builder = builder
            .header("x-actor-id", id)
            .header("x-actor-scope", scope);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

/// アクターヘッダー付きのJSON POSTを送信
#[allow(dead_code)]
pub async fn post_json(
    app: &Router,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some((id, scope)) = actor {
        builder = builder
            .header("x-actor-id", id)
            .header("x-actor-scope", scope);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

/// 任意のボディ文字列をJSONとしてPOSTする（構文エラーの検証用）
#[allow(dead_code)]
pub async fn post_raw(
    app: &Router,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some((id, scope)) = actor {
        builder = builder
            .header("x-actor-id", id)
            .header("x-actor-scope", scope);
    }
    send(app, builder.body(Body::from(body.to_owned())).unwrap()).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
