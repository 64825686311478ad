use anyhow::Context;
use ao_collection_client::{CollectionTransport, FetchError};
use ao_collection_stargaze::StargazeTransport;
use ao_gallery::{GalleryConfig, GalleryController, GalleryError};
use ao_session::BridgeWallet;
use ao_storage::{InMemoryStore, KeyValueStore, RocksDbStore};
use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

mod gallery;
mod runtime;
mod session;

use runtime::{GalleryHandle, RuntimeClosed};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
pub(crate) struct AppState {
    gallery: GalleryHandle,
    wallet: Arc<BridgeWallet>,
}

impl AppState {
    /// Builds the controller, issues its first fetch and moves it onto the
    /// runtime task. Must run inside a tokio runtime.
    fn start(
        config: &GalleryConfig,
        store: Arc<dyn KeyValueStore>,
        wallet: Arc<BridgeWallet>,
        transport: Arc<dyn CollectionTransport>,
    ) -> Result<Self, GalleryError> {
        let mut controller = GalleryController::new(config, store, wallet.clone(), transport);
        let initial = controller.start()?;
        Ok(Self {
            gallery: GalleryHandle::spawn(controller, initial),
            wallet,
        })
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(session::get_session))
        .route("/session/chain", post(session::select_chain))
        .route("/session/status", post(session::push_status))
        .route("/session/connect", post(session::connect))
        .route("/session/requests", get(session::drain_requests))
        .route("/gallery", get(gallery::get_gallery))
        .route("/gallery/owner", post(gallery::view_owner))
        .route("/gallery/refresh", post(gallery::refresh))
        .route("/gallery/limit", post(gallery::set_limit))
        .route("/gallery/move", post(gallery::move_item))
        .route("/gallery/hide", post(gallery::hide))
        .route("/gallery/unhide", post(gallery::unhide))
        .route("/gallery/reset", post(gallery::reset))
        .route(
            "/gallery/background",
            post(gallery::set_background).delete(gallery::clear_background),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = GalleryConfig::from_env();
    let store = open_store()?;
    let transport = Arc::new(StargazeTransport::new(None));
    info!("collection endpoint: {}", transport.endpoint());

    let state = AppState::start(&config, store, Arc::new(BridgeWallet::new(None)), transport)
        .context("failed to start gallery controller")?;

    let addr = listen_addr();
    info!("gallery-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn open_store() -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match std::env::var("AO_STORE_PATH") {
        Ok(path) if !path.trim().is_empty() => {
            info!("using RocksDB store at {path}");
            let store = RocksDbStore::open_default(path.trim())?;
            Ok(Arc::new(store))
        }
        _ => {
            info!("AO_STORE_PATH not set; customizations will not survive a restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

fn listen_addr() -> SocketAddr {
    let fallback = SocketAddr::from(([0, 0, 0, 0], 8080));
    match std::env::var("AO_LISTEN_ADDR") {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("AO_LISTEN_ADDR '{raw}' is not a socket address, using {DEFAULT_LISTEN_ADDR}");
            fallback
        }),
        Err(_) => fallback,
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "gallery-service",
        status: "ok",
    })
}

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

pub(crate) fn unavailable(_: RuntimeClosed) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "gallery runtime is not running".to_owned(),
        }),
    )
}

pub(crate) fn gallery_error(err: GalleryError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        GalleryError::InvalidArgument(_)
        | GalleryError::NoOwner
        | GalleryError::Session(_)
        | GalleryError::Fetch(FetchError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
        GalleryError::Fetch(FetchError::Network(_) | FetchError::Protocol(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_api_types::{OwnerAddress, Token, TokenCollection, TokenMedia};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct FixedTransport;

    #[async_trait]
    impl CollectionTransport for FixedTransport {
        fn endpoint(&self) -> &str {
            "fixed://tokens"
        }

        async fn fetch_owned_tokens(&self, owner: &OwnerAddress, limit: u32) -> Result<Vec<Token>, FetchError> {
            if owner.0 == "stars1down" {
                return Err(FetchError::Network("HTTP 503: maintenance".to_owned()));
            }
            Ok(["1", "2", "3"]
                .iter()
                .take(limit as usize)
                .map(|id| Token {
                    id: (*id).to_owned(),
                    token_id: (*id).to_owned(),
                    name: format!("{} #{id}", owner.0),
                    rarity_order: None,
                    rarity_score: None,
                    minted_at: "2024-01-01T00:00:00Z".to_owned(),
                    sale_type: None,
                    media: TokenMedia {
                        url: format!("https://img.example/{id}.png"),
                        media_type: "image".to_owned(),
                    },
                    collection: TokenCollection {
                        name: "Observers".to_owned(),
                        contract_address: "stars1observers".to_owned(),
                    },
                })
                .collect())
        }
    }

    fn test_app() -> anyhow::Result<Router> {
        let state = AppState::start(
            &GalleryConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(BridgeWallet::new(None)),
            Arc::new(FixedTransport),
        )?;
        Ok(app(state))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    /// Polls the gallery until no fetch for the current owner is pending.
    async fn settled_gallery(app: &Router) -> anyhow::Result<Value> {
        for _ in 0..100 {
            let (_, body) = send(app, Method::GET, "/gallery", None).await?;
            if body["state"] != "loading" && body["refreshing"] != true {
                return Ok(body);
            }
            tokio::task::yield_now().await;
        }
        anyhow::bail!("gallery never settled")
    }

    fn item_ids(body: &Value) -> Vec<String> {
        body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_str().map(ToOwned::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn health_reports_ok() -> anyhow::Result<()> {
        let app = test_app()?;
        let (status, body) = send(&app, Method::GET, "/health", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "gallery-service");
        Ok(())
    }

    #[tokio::test]
    async fn session_starts_on_default_chain_and_rejects_unknown() -> anyhow::Result<()> {
        let app = test_app()?;

        let (_, session) = send(&app, Method::GET, "/session", None).await?;
        assert_eq!(session["chain"], "stargaze");
        assert_eq!(session["connect_action"], "connect");
        assert!(
            session["known_chains"]
                .as_array()
                .is_some_and(|chains| chains.iter().any(|c| c == "osmosis"))
        );

        let (_, requests) = send(&app, Method::GET, "/session/requests", None).await?;
        assert_eq!(requests["requests"][0]["kind"], "switch_chain");
        assert_eq!(requests["requests"][0]["chain"], "stargaze");

        let (status, body) =
            send(&app, Method::POST, "/session/chain", Some(json!({ "chain": "mars" }))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|e| e.contains("mars")));

        let (status, body) =
            send(&app, Method::POST, "/session/chain", Some(json!({ "chain": "osmosis" }))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chain"], "osmosis");
        Ok(())
    }

    #[tokio::test]
    async fn connected_wallet_fills_the_gallery() -> anyhow::Result<()> {
        let app = test_app()?;

        let (_, gallery) = send(&app, Method::GET, "/gallery", None).await?;
        assert_eq!(gallery["state"], "waiting_for_address");

        let (status, session) = send(
            &app,
            Method::POST,
            "/session/status",
            Some(json!({ "status": "connected", "chain": "stargaze", "address": "stars1abcdefghijklmnopqrstuvwxyz" })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["connect_action"], "open_detail_view");
        assert_eq!(session["short_address"], "stars1abcdefghijk...");

        let gallery = settled_gallery(&app).await?;
        assert_eq!(gallery["state"], "ready");
        assert_eq!(gallery["owner"], "stars1abcdefghijklmnopqrstuvwxyz");
        assert_eq!(gallery["limit"], 300);
        assert_eq!(item_ids(&gallery), vec!["1", "2", "3"]);
        Ok(())
    }

    #[tokio::test]
    async fn edits_apply_to_the_visible_sequence() -> anyhow::Result<()> {
        let app = test_app()?;
        send(&app, Method::POST, "/gallery/owner", Some(json!({ "owner": "stars1me" }))).await?;
        settled_gallery(&app).await?;

        let (status, _) = send(&app, Method::POST, "/gallery/hide", Some(json!({ "id": "2" }))).await?;
        assert_eq!(status, StatusCode::OK);
        let (status, body) =
            send(&app, Method::POST, "/gallery/move", Some(json!({ "from": 1, "to": 0 }))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item_ids(&body), vec!["3", "1"]);

        let (_, body) = send(&app, Method::POST, "/gallery/unhide", Some(json!({ "id": "2" }))).await?;
        assert_eq!(item_ids(&body), vec!["3", "1", "2"]);

        send(&app, Method::POST, "/gallery/reset", None).await?;
        let gallery = settled_gallery(&app).await?;
        assert_eq!(item_ids(&gallery), vec!["1", "2", "3"]);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_requests_are_bad_requests() -> anyhow::Result<()> {
        let app = test_app()?;

        let (status, _) = send(&app, Method::POST, "/gallery/hide", Some(json!({ "id": "1" }))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, Method::POST, "/gallery/owner", Some(json!({ "owner": "stars1me" }))).await?;
        settled_gallery(&app).await?;

        for (uri, body) in [
            ("/gallery/limit", json!({ "limit": 0 })),
            ("/gallery/limit", json!({ "limit": -5 })),
            ("/gallery/move", json!({ "from": -1, "to": 0 })),
            ("/gallery/move", json!({ "from": 0, "to": 9 })),
            ("/gallery/hide", json!({ "id": "404" })),
            ("/gallery/background", json!({ "url": "  " })),
        ] {
            let (status, response) = send(&app, Method::POST, uri, Some(body)).await?;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(response["error"].is_string());
        }
        Ok(())
    }

    #[tokio::test]
    async fn limit_change_reports_new_key() -> anyhow::Result<()> {
        let app = test_app()?;
        send(&app, Method::POST, "/gallery/owner", Some(json!({ "owner": "stars1me" }))).await?;
        settled_gallery(&app).await?;

        let (status, body) = send(&app, Method::POST, "/gallery/limit", Some(json!({ "limit": 2 }))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 2);

        let gallery = settled_gallery(&app).await?;
        assert_eq!(item_ids(&gallery), vec!["1", "2"]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_first_fetch_is_an_error_state() -> anyhow::Result<()> {
        let app = test_app()?;
        send(&app, Method::POST, "/gallery/owner", Some(json!({ "owner": "stars1down" }))).await?;

        let gallery = settled_gallery(&app).await?;
        assert_eq!(gallery["state"], "error");
        assert!(gallery["message"].as_str().is_some_and(|m| m.contains("maintenance")));
        Ok(())
    }

    #[tokio::test]
    async fn background_override_round_trips() -> anyhow::Result<()> {
        let app = test_app()?;
        send(&app, Method::POST, "/gallery/owner", Some(json!({ "owner": "stars1me" }))).await?;
        settled_gallery(&app).await?;

        let (_, body) = send(
            &app,
            Method::POST,
            "/gallery/background",
            Some(json!({ "url": "https://cdn.example/nebula.jpg" })),
        )
        .await?;
        assert_eq!(body["background_url"], "https://cdn.example/nebula.jpg");

        let (_, body) = send(&app, Method::DELETE, "/gallery/background", None).await?;
        assert_eq!(body["background_url"], "/images/background.png");
        Ok(())
    }
}
