use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, State, WebSocketUpgrade},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use gitchat_api::error::ApiError;
use gitchat_api::session::{self, AppState, AppStateInner};
use gitchat_api::uploads::{MAX_IMAGE_BYTES, UploadStore};
use gitchat_api::{conversations, messages, reactions, users};
use gitchat_gateway::connection;
use gitchat_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    session_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitchat=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let session_secret = session::default_secret();
    let db_path = std::env::var("GITCHAT_DB_PATH").unwrap_or_else(|_| "gitchat.db".into());
    let host = std::env::var("GITCHAT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("GITCHAT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let upload_dir =
        PathBuf::from(std::env::var("GITCHAT_UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()));
    let public_url = std::env::var("GITCHAT_PUBLIC_URL")
        .unwrap_or_else(|_| format!("http://localhost:{}", port));

    // Init database and upload store
    let db = gitchat_db::Database::open(&PathBuf::from(&db_path))?;
    let uploads = UploadStore::new(upload_dir.clone(), public_url).await?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        session_secret: session_secret.clone(),
        uploads,
    });

    // Routes
    let public_routes = Router::new()
        .route("/session", post(session::create_session))
        .route("/ping", get(ping))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/chat/conversations", get(conversations::list_conversations))
        .route("/chat/conversations/{username}", get(conversations::get_or_create))
        .route("/chat/conversations/{id}/messages", get(messages::list_messages))
        .route(
            "/chat/conversations/{id}/repo",
            post(conversations::link_repo).delete(conversations::unlink_repo),
        )
        .route("/chat/messages", post(messages::send_message))
        .route("/chat/messages/image", post(messages::send_image))
        .route("/chat/messages/{id}/reply", post(messages::reply))
        .route("/chat/messages/{id}/forward", post(messages::forward))
        .route("/chat/messages/{id}/reactions", post(reactions::react))
        .route("/chat/messages/{id}", delete(messages::soft_delete))
        .route("/chat/messages/{id}/everyone", delete(messages::hard_delete))
        .route("/chat/users", get(users::list_chat_users))
        .route(
            "/users/{username}/like",
            post(users::like_user).delete(users::unlike_user),
        )
        .route("/users/{username}/likes", get(users::list_likes))
        .layer(middleware::from_fn(session::require_session))
        .with_state(app_state);

    let ws_route = Router::new().route("/gateway", get(ws_upgrade)).with_state(ServerState {
        dispatcher,
        session_secret,
    });

    let app = Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .merge(ws_route)
        .nest_service("/uploads", ServeDir::new(&upload_dir))
        // Headroom over the image cap so multipart framing never trips the limit
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Gitchat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ping() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

#[derive(Deserialize)]
struct GatewayQuery {
    token: String,
}

/// Browsers cannot set headers on a websocket handshake, so the session
/// token rides in the query string instead.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(claims) = session::verify_token(&state.session_secret, &query.token) else {
        return ApiError::Unauthorized.into_response();
    };
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.dispatcher, claims.sub))
        .into_response()
}
