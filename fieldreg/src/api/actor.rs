// 操作主体の特定（ゲートウェイが付与するヘッダーを信頼する）

use super::error::AppError;
use crate::common::error::RegistryError;
use crate::common::ip::client_ip;
use crate::types::{Actor, ActorScope};
use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

/// アクターIDヘッダー
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// アクタースコープヘッダー（`restricted` / `unrestricted`）
pub const ACTOR_SCOPE_HEADER: &str = "x-actor-scope";

/// ヘッダーからアクターを組み立てる
///
/// スコープヘッダーがない場合はスコープ制限付きとして扱う。
pub fn actor_from_headers(
    headers: &HeaderMap,
    peer: Option<&SocketAddr>,
) -> Result<Actor, RegistryError> {
    let id = headers
        .get(ACTOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RegistryError::Authentication("Missing actor identity".to_string()))?;

    let scope = match headers.get(ACTOR_SCOPE_HEADER) {
        None => ActorScope::Restricted,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<ActorScope>().ok())
            .ok_or_else(|| RegistryError::Authentication("Invalid actor scope".to_string()))?,
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(Actor {
        id: id.to_string(),
        scope,
        ip_address: client_ip(headers, peer),
        user_agent,
    })
}

/// アクターを検証してrequestの拡張データに格納するミドルウェア
///
/// 失敗時は401を返す。
pub async fn actor_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let actor = actor_from_headers(request.headers(), peer.as_ref())?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}
