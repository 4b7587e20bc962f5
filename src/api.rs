//! HTTP API server.
//!
//! Thin axum layer over the pipeline and the moderation stores:
//! - `POST /speak` (form `text`): returns the artifact reference as text
//! - `GET /banned`: whether the caller is banned
//! - `GET /status`: counts and latest artifact
//! - `GET /events`: SSE stream of `play-audio` notifications
//! - `GET /audio/{name}`: rendered artifacts
//! - `/admin/*`: message listing and ban management, restricted by peer IP

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{Extensions, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::bans::BanRegistry;
use crate::broadcast::Broadcaster;
use crate::config::AdminConfig;
use crate::error::Error;
use crate::messages::{MessageLog, MessageRecord};
use crate::pipeline::{artifact_reference, Cleanup, SpeakRequest, SpeechPipeline, AUDIO_ROUTE};

pub const BANNED_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Banned</title></head>\n\
<body><h1>You have been banned</h1><p>Your messages are no longer accepted.</p></body>\n</html>\n";

pub const SPEECH_ERROR: &str = "Error in generating speech";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SpeechPipeline>,
    pub bans: Arc<BanRegistry>,
    pub log: Arc<MessageLog>,
    pub broadcaster: Arc<Broadcaster>,
    pub admin: Arc<AdminConfig>,
    pub trust_forwarded_for: bool,
}

// --- Client identity ---

/// Submitter id: first `X-Forwarded-For` hop when trusted, else the peer IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl FromRequestParts<AppState> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(client_id(parts, state.trust_forwarded_for)))
    }
}

fn client_id(parts: &Parts, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
    }

    peer_ip(&parts.extensions).unwrap_or_else(|| "unknown".to_string())
}

/// Address of the connected peer. Never taken from request headers.
fn peer_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SpeakForm {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ModerationRequest {
    #[serde(default, alias = "sourceId")]
    ip: Option<String>,
}

#[derive(Serialize)]
struct BannedResponse {
    banned: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    messages: usize,
    banned: usize,
    listeners: usize,
    latest: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidArgument(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Banned => (StatusCode::FORBIDDEN, Html(BANNED_PAGE)).into_response(),
            Self::Synthesis(_) => (StatusCode::INTERNAL_SERVER_ERROR, SPEECH_ERROR).into_response(),
            other => {
                error!("Request failed: {other}");
                (StatusCode::INTERNAL_SERVER_ERROR, SPEECH_ERROR).into_response()
            }
        }
    }
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/messages", get(handle_messages))
        .route("/bans", get(handle_bans))
        .route("/ban", post(handle_ban))
        .route("/unban", post(handle_unban))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_only));

    let audio = ServeDir::new(state.pipeline.artifacts().root());

    Router::new()
        .route("/speak", post(handle_speak))
        .route("/banned", get(handle_banned))
        .route("/status", get(handle_status))
        .route("/events", get(handle_events))
        .nest("/admin", admin)
        .nest_service(AUDIO_ROUTE, audio)
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    })
    .await
}

// Matches the socket peer, not `X-Forwarded-For`, so the header cannot
// impersonate an allowed address.
async fn admin_only(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let peer = peer_ip(req.extensions());
    let allowed = match &peer {
        Some(peer) => state.admin.allows(peer),
        None => state.admin.allowed_ips.is_empty(),
    };
    if !allowed {
        warn!(
            "Refused admin request from {}",
            peer.as_deref().unwrap_or("unknown peer")
        );
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    next.run(req).await
}

// --- Handlers ---

async fn handle_speak(
    State(state): State<AppState>,
    ClientId(client): ClientId,
    Form(form): Form<SpeakForm>,
) -> Result<String, Error> {
    let delivered = state
        .pipeline
        .speak(SpeakRequest {
            text: form.text,
            source_id: client,
        })
        .await?;

    if let Cleanup::Failed { artifact, reason } = &delivered.cleanup {
        warn!("Delivered {} but {artifact} is still on disk: {reason}", delivered.reference);
    }
    Ok(delivered.reference)
}

async fn handle_banned(
    State(state): State<AppState>,
    ClientId(client): ClientId,
) -> Json<BannedResponse> {
    Json(BannedResponse {
        banned: state.bans.is_banned(&client),
    })
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        messages: state.log.len(),
        banned: state.bans.len(),
        listeners: state.broadcaster.subscriber_count(),
        latest: state
            .log
            .latest()
            .map(|r| artifact_reference(&r.artifact_name)),
    })
}

async fn handle_events(State(state): State<AppState>) -> impl IntoResponse {
    info!("Listener connected ({} total)", state.broadcaster.subscriber_count() + 1);
    state.broadcaster.clone().sse()
}

async fn handle_messages(State(state): State<AppState>) -> Json<Vec<MessageRecord>> {
    Json(state.log.snapshot())
}

async fn handle_bans(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.bans.snapshot())
}

async fn handle_ban(
    State(state): State<AppState>,
    Json(req): Json<ModerationRequest>,
) -> Result<String, Error> {
    let ip = req.ip.unwrap_or_default();
    state.bans.ban(&ip)?;
    Ok(format!("IP {} has been banned", ip.trim()))
}

async fn handle_unban(
    State(state): State<AppState>,
    Json(req): Json<ModerationRequest>,
) -> Result<String, Error> {
    let ip = req.ip.unwrap_or_default();
    state.bans.unban(&ip)?;
    Ok(format!("IP {} has been unbanned", ip.trim()))
}
