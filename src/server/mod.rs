/// HTTP surface of the relay.
///
/// Four endpoints: the Talk webhook for chat events, the task-completion
/// webhook, the AppAPI enable/disable toggle, and a liveness probe. Every
/// authenticated endpoint runs its verification policy to completion before
/// the body is interpreted.
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::platform::{AppIdentity, PlatformClient};
use crate::relay::{CompletionEnvelope, Relay};
use crate::secrets::SecretCache;
use crate::talk::TalkClient;
use crate::talk::event::TalkEvent;
use crate::verify;

/// Max inbound webhook payload: 1 MB.
const MAX_BODY: usize = 1_048_576;

const BOT_DISPLAY_NAME: &str = "Assistant Talk Bot";
const BOT_DESCRIPTION: &str = "Usage: `@assistant What sounds do cats make?`";

/// Shared state between the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    platform: Arc<PlatformClient>,
    secrets: Arc<SecretCache>,
    relay: Arc<Relay>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let identity = AppIdentity::from_config(&config);
        let platform = Arc::new(PlatformClient::new(config.nextcloud_url.clone(), identity));
        let secrets = Arc::new(SecretCache::new(platform.clone()));
        let talk = Arc::new(TalkClient::new(
            config.nextcloud_url.clone(),
            config.bot_route.clone(),
            secrets.clone(),
        ));
        let relay = Arc::new(Relay::new(
            platform.clone(),
            talk,
            config.bot_route.clone(),
        ));
        Self {
            config,
            platform,
            secrets,
            relay,
        }
    }
}

/// Build the router; the chat webhook path is the configured bot route.
pub fn build_router(state: AppState) -> Router {
    let bot_path = format!("/{}", state.config.bot_route);
    Router::new()
        .route(&bot_path, post(bot_event_handler))
        .route("/message", post(task_completion_handler))
        .route("/enabled", put(enabled_handler))
        .route("/heartbeat", get(heartbeat_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CompletionQuery {
    reply_to: i64,
    token: String,
}

#[derive(Debug, Deserialize)]
struct EnabledQuery {
    enabled: bool,
}

/// GET /heartbeat — liveness probe, no authentication.
async fn heartbeat_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /<bot-route> — chat events from Talk, authenticated with the route's
/// HMAC scheme. Processing is handed off to a background task so the webhook
/// returns without waiting on the platform.
async fn bot_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    if body.len() > MAX_BODY {
        warn!("chat webhook: payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let secret = match state.secrets.get(&state.config.bot_route).await {
        Ok(secret) => secret,
        Err(e) => {
            warn!("chat webhook: cannot resolve route secret: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
    if let Err(e) = verify::bot_webhook(&secret, &headers, &body) {
        warn!("chat webhook: {}", e);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let event = match TalkEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("chat webhook: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if event.object_name() == "message" {
        state.relay.clone().spawn_process(event);
    } else {
        debug!("chat webhook: ignoring {} event", event.object_name());
    }
    StatusCode::OK.into_response()
}

/// POST /message?reply_to=&token= — task completion callback from the
/// platform. The reply target is carried entirely by the query parameters.
async fn task_completion_handler(
    State(state): State<AppState>,
    Query(query): Query<CompletionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    if let Err(e) = verify::platform_call(&headers, state.platform.identity()) {
        warn!("task completion: {}", e);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let envelope: CompletionEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("task completion: invalid payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // The task already finished upstream; a failed reply degrades to silence
    if let Err(e) = state
        .relay
        .handle_completion(query.reply_to, &query.token, &envelope.task)
        .await
    {
        error!("task completion for reply_to={}: {}", query.reply_to, e);
    }
    StatusCode::OK.into_response()
}

/// PUT /enabled?enabled= — AppAPI toggle. Registers or deregisters the bot
/// route; outcomes are reported in-band with HTTP 200 either way, which is
/// what the platform expects from this hook.
async fn enabled_handler(
    State(state): State<AppState>,
    Query(query): Query<EnabledQuery>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Err(e) = verify::platform_call(&headers, state.platform.identity()) {
        warn!("enabled toggle: {}", e);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    info!(
        "bot {} requested",
        if query.enabled { "registration" } else { "deregistration" }
    );
    let outcome = if query.enabled {
        register_bot(&state).await
    } else {
        state.platform.unregister_bot(&state.config.bot_route).await
    };
    let error = match outcome {
        Ok(()) => String::new(),
        Err(e) => {
            warn!("enabled toggle failed: {}", e);
            e.to_string()
        }
    };
    Json(serde_json::json!({ "error": error })).into_response()
}

/// Register the bot route and seed the secret cache with the returned
/// id/secret pair so the first chat webhook needs no extra lookup.
async fn register_bot(state: &AppState) -> Result<()> {
    let (id, secret) = state
        .platform
        .register_bot(BOT_DISPLAY_NAME, &state.config.bot_route, BOT_DESCRIPTION)
        .await?;
    state.secrets.insert(id, secret).await;
    Ok(())
}

/// Bind and serve. Returns the server task handle.
pub async fn start(state: AppState) -> Result<JoinHandle<()>> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("server error: {}", e);
        }
    }))
}

/// Wire configuration into a running relay and serve until the task ends.
pub async fn run(config: Config) -> Result<()> {
    let state = AppState::new(config);
    let handle = start(state).await?;
    handle.await?;
    Ok(())
}
