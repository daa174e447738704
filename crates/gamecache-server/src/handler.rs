//! Request handlers.

use crate::server::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gamecache::{CacheStats, FetchRequest, FetchResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

/// Largest request body forwarded by the proxy.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Health check endpoint.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "state": state.worker.state(),
        "online": state.worker.is_online(),
    }))
}

/// Cache statistics for every namespace.
pub async fn handle_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStats>, (StatusCode, String)> {
    state.worker.stats().map(Json).map_err(|e| {
        error!("Failed to read cache stats: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

/// Deliver a control message to the worker.
pub async fn handle_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<Value>,
) -> Response {
    match state.worker.post_message(message, None).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct OnlineRequest {
    pub online: bool,
}

/// Mark the network reachable or not.
pub async fn handle_online(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OnlineRequest>,
) -> impl IntoResponse {
    state.worker.set_online(request.online);
    Json(json!({"online": state.worker.is_online()}))
}

/// Offer the request to the worker; send it upstream if the worker passes.
pub async fn handle_proxy(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request = match to_fetch_request(&state.worker.config().origin, request).await {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };

    if let Some(response) = state.worker.handle_fetch(&request).await {
        return to_response(response);
    }

    debug!("Passing through {} {}", request.method, request.url);
    match state.upstream.fetch(&request).await {
        Ok(response) => to_response(response),
        Err(e) => {
            warn!("Upstream fetch failed for {}: {}", request.url, e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Convert an inbound request. Absolute-form targets are kept; origin-form
/// targets are resolved against the portal origin.
async fn to_fetch_request(
    origin: &Url,
    request: Request,
) -> Result<FetchRequest, (StatusCode, String)> {
    let (parts, body) = request.into_parts();

    let parsed = if parts.uri.scheme().is_some() {
        Url::parse(&parts.uri.to_string())
    } else {
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        origin.join(target)
    };
    let url = parsed
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid URL {}: {}", parts.uri, e)))?;

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read body: {}", e)))?;

    let mut fetch_request = FetchRequest::new(parts.method, url);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            fetch_request = fetch_request.with_header(name.as_str(), value);
        }
    }
    if !body.is_empty() {
        fetch_request = fetch_request.with_body(body);
    }
    Ok(fetch_request)
}

fn to_response(response: FetchResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(Body::from(response.body)).unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        StatusCode::BAD_GATEWAY.into_response()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_origin_form_resolves_against_origin() {
        let origin = Url::parse("https://portal.test/").unwrap();
        let request = axum::http::Request::post("/api/games?page=2")
            .header("x-custom", "1")
            .body(Body::from("payload"))
            .unwrap();

        let converted = to_fetch_request(&origin, request).await.unwrap();
        assert_eq!(converted.url.as_str(), "https://portal.test/api/games?page=2");
        assert_eq!(converted.method, axum::http::Method::POST);
        assert!(converted.headers.contains(&("x-custom".to_string(), "1".to_string())));
        assert_eq!(converted.body.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_absolute_form_is_kept() {
        let origin = Url::parse("https://portal.test/").unwrap();
        let request = axum::http::Request::get("https://cdn.test/a.js")
            .body(Body::empty())
            .unwrap();

        let converted = to_fetch_request(&origin, request).await.unwrap();
        assert_eq!(converted.url.as_str(), "https://cdn.test/a.js");
        assert!(converted.body.is_none());
    }

    #[test]
    fn test_to_response_keeps_status_and_headers() {
        let response = to_response(
            FetchResponse::new(503, "offline").with_header("Content-Type", "application/json"),
        );
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
