//! HTTP request handlers
//!
//! Includes the configuration API, static file serving and the WebSocket
//! entry points.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use qrpair_core::{ConfigUpdate, PairingConfig, ServerEvent};
use qrpair_session::EventSink;
use qrpair_web::Assets;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::websocket::{handle_socket, ws_handler};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        // Dashboard, or WebSocket when the request asks for an upgrade
        .route("/", get(root_handler))
        .route("/ws", get(ws_handler))
        // Configuration API
        .route("/api/config", get(get_config_handler).post(set_config_handler));

    let router = match &state.public_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/*path", get(static_handler)),
    };

    router
        .layer(cors_layer(&state.cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Invalid CORS origin {:?}, cross-origin requests disabled", origin);
            layer
        }
    }
}

/// Serve the dashboard, or upgrade to a WebSocket
///
/// Clients are handed the bare host as their WebSocket URL, so `/` has to
/// accept upgrades too.
async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Some(ws) = ws {
        return ws
            .on_upgrade(|socket| handle_socket(socket, state))
            .into_response();
    }

    match &state.public_dir {
        Some(dir) => serve_index_from(dir).await,
        None => match Assets::get("index.html") {
            Some(content) => Html(content.data.to_vec()).into_response(),
            None => (StatusCode::NOT_FOUND, "Not found").into_response(),
        },
    }
}

async fn serve_index_from(dir: &Path) -> Response {
    match tokio::fs::read(dir.join("index.html")).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            debug!("No index.html in {:?}: {}", dir, e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

/// Serve embedded static assets with proper content types
async fn static_handler(
    axum::extract::Path(path): axum::extract::Path<String>,
) -> impl IntoResponse {
    serve_asset(&path)
}

fn serve_asset(path: &str) -> Response {
    let path = path.trim_start_matches('/');

    debug!("Serving asset: {}", path);

    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();

            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime)],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

// ============================================================================
// Configuration API
// ============================================================================

/// Configuration as published to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    #[serde(flatten)]
    pub config: PairingConfig,
    /// WebSocket URL clients should connect to
    pub ws_url: String,
    /// Base URL for HTTP API calls
    pub api_base: String,
    /// Public key derived from the server secret
    pub public_key: String,
}

/// Response after a configuration change
#[derive(Debug, Serialize)]
pub struct SetConfigResponse {
    pub status: &'static str,
    pub config: PairingConfig,
}

/// Get the current configuration and connection endpoints
async fn get_config_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ConfigResponse> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");

    let (http, ws) = if state.tls_enabled {
        ("https://", "wss://")
    } else {
        ("http://", "ws://")
    };

    Json(ConfigResponse {
        config: state.config.get(),
        ws_url: format!("{}{}", ws, host),
        api_base: format!("{}{}", http, host),
        public_key: state.public_key.clone(),
    })
}

/// Update the configuration
///
/// Only sessions created afterwards see the new values.
async fn set_config_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> Json<SetConfigResponse> {
    let config = state.config.apply(&update);
    info!(
        "Config updated: parts={}, required={}, single_client={}",
        config.parts_count, config.required_tokens, config.single_client_only
    );

    state.registry.publish(ServerEvent::ConfigUpdate { config });

    Json(SetConfigResponse {
        status: "ok",
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::ws::Message;
    use axum::http::Request;
    use qrpair_core::SharedConfig;
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn create_test_state(tls_enabled: bool) -> Arc<AppState> {
        Arc::new(AppState::new(
            SharedConfig::new(PairingConfig::default()),
            "ChangeMe123!",
            tls_enabled,
        ))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_config() {
        let state = create_test_state(false);
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::get("/api/config")
                    .header(header::HOST, "pair.local:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["partsCount"], 20);
        assert_eq!(body["requiredTokens"], 2);
        assert_eq!(body["singleClientOnly"], false);
        assert_eq!(body["wsUrl"], "ws://pair.local:3000");
        assert_eq!(body["apiBase"], "http://pair.local:3000");
        assert_eq!(body["publicKey"], state.public_key.as_str());
    }

    #[tokio::test]
    async fn test_get_config_over_tls() {
        let app = create_router(create_test_state(true));

        let response = app
            .oneshot(
                Request::get("/api/config")
                    .header(header::HOST, "pair.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["wsUrl"], "wss://pair.local");
        assert_eq!(body["apiBase"], "https://pair.local");
    }

    #[tokio::test]
    async fn test_set_config_broadcasts_update() {
        let state = create_test_state(false);
        let (_conn, mut rx) = state.registry.register();
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::post("/api/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"partsCount":"10","requiredTokens":3}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["config"]["partsCount"], 10);
        assert_eq!(body["config"]["requiredTokens"], 3);
        assert_eq!(state.config.get().parts_count, 10);

        let frame = rx.try_recv().unwrap();
        let Message::Text(json) = frame else {
            panic!("expected text frame");
        };
        let event: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            event,
            json!({
                "event": "config-update",
                "config": {"partsCount": 10, "requiredTokens": 3, "singleClientOnly": false}
            })
        );
    }

    #[tokio::test]
    async fn test_index_served_without_upgrade() {
        let app = create_router(create_test_state(false));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("qrpair sessions"));
    }

    #[tokio::test]
    async fn test_embedded_asset_mime_type() {
        let app = create_router(create_test_state(false));

        let response = app
            .oneshot(Request::get("/style.css").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    }

    #[tokio::test]
    async fn test_public_dir_overrides_embedded_assets() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>custom</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1);").unwrap();

        let state = AppState::new(SharedConfig::default(), "secret", false)
            .with_public_dir(Some(dir.path().to_path_buf()));
        let app = create_router(Arc::new(state));

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>custom</h1>");

        let response = app
            .oneshot(Request::get("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_asset_not_found() {
        let app = create_router(create_test_state(false));

        let response = app
            .oneshot(Request::get("/missing.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
