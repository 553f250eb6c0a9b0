use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use tradbridge_core::{AnnouncementFormat, PostMetadata};
use tradbridge_db::published_posts::MAX_HISTORY_ROWS;
use tradbridge_db::{DbError, NewPublishedPost, PublishedPost, PublishedPostRepository};

use crate::channel::{ChannelError, NewPost, PostEdit};
use crate::state::{AppState, LogEntry};

/// Errors returned by the API, rendered as `{ok: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Discord bot is not configured")]
    NotConfigured,

    #[error("No forum configured")]
    NoForum,

    #[error("{0}")]
    BadRequest(String),

    #[error("Discord error: {0}")]
    Discord(#[from] ChannelError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotConfigured | ApiError::NoForum => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Discord(_) => StatusCode::BAD_GATEWAY,
            ApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("API request failed: {self}");
        }
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Discord ids arrive as strings (JavaScript clients) or numbers.
fn snowflake<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(id)) => Ok(Some(id)),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "forumId", deserialize_with = "snowflake")]
    pub forum_id: Option<u64>,
    #[serde(default)]
    pub metadata: Option<PostMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default, alias = "threadId", deserialize_with = "snowflake")]
    pub thread_id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<PostMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePostRequest {
    #[serde(default, alias = "threadId", deserialize_with = "snowflake")]
    pub thread_id: Option<u64>,
    #[serde(default, alias = "postTitle")]
    pub title: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreatePostResponse {
    pub ok: bool,
    pub thread_id: String,
    pub message_id: String,
    pub thread_url: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ok: bool,
    pub count: usize,
    pub posts: Vec<PublishedPost>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub configured: bool,
    pub version: String,
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the router with all routes
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/forum-post", post(create_post_handler))
        .route("/api/forum-post/update", post(update_post_handler))
        .route("/api/forum-post/delete", post(delete_post_handler))
        .route("/api/history", get(history_handler))
        .route("/logs", get(logs_ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn metadata_json(metadata: Option<&PostMetadata>) -> Option<String> {
    metadata.and_then(|meta| match serde_json::to_string(meta) {
        Ok(json) => Some(json),
        Err(err) => {
            warn!("failed to serialize post metadata: {err}");
            None
        }
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        configured: state.forum().is_some(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/forum-post
async fn create_post_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let forum = state.forum().ok_or(ApiError::NotConfigured)?;
    let forum_id = request
        .forum_id
        .or(state.default_forum_id())
        .ok_or(ApiError::NoForum)?;
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }

    let post = NewPost {
        title,
        content: request.content,
        tags: request.tags,
        metadata: request.metadata,
    };
    let created = forum.create_post(forum_id, &post).await?;
    info!(thread_id = created.thread_id, title = %post.title, "forum post created");

    let metadata = metadata_json(post.metadata.as_ref());
    let record = NewPublishedPost {
        thread_id: created.thread_id,
        message_id: created.message_id,
        forum_id,
        title: &post.title,
        content: &post.content,
        tags: &post.tags,
        metadata: metadata.as_deref(),
        thread_url: &created.thread_url,
    };
    if let Err(err) = PublishedPostRepository::upsert(state.db.pool(), &record).await {
        warn!(thread_id = created.thread_id, "failed to record published post: {err}");
    }

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            ok: true,
            thread_id: created.thread_id.to_string(),
            message_id: created.message_id.to_string(),
            thread_url: created.thread_url,
        }),
    ))
}

/// POST /api/forum-post/update
async fn update_post_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let forum = state.forum().ok_or(ApiError::NotConfigured)?;
    let thread_id = request
        .thread_id
        .ok_or_else(|| ApiError::BadRequest("thread_id is required".to_string()))?;

    let edit = PostEdit {
        title: non_empty(request.title),
        content: request.content,
        tags: request.tags,
        metadata: request.metadata,
    };
    if edit.is_empty() {
        return Err(ApiError::BadRequest("nothing to update".to_string()));
    }
    forum.edit_post(thread_id, &edit).await?;
    info!(thread_id, "forum post updated");

    match PublishedPostRepository::get_by_thread(state.db.pool(), thread_id).await {
        Ok(Some(stored)) => {
            let metadata = metadata_json(edit.metadata.as_ref()).or(stored.metadata.clone());
            let record = NewPublishedPost {
                thread_id,
                message_id: stored.message_id,
                forum_id: stored.forum_id,
                title: edit.title.as_deref().unwrap_or(&stored.title),
                content: edit.content.as_deref().unwrap_or(&stored.content),
                tags: edit.tags.as_deref().unwrap_or(&stored.tags),
                metadata: metadata.as_deref(),
                thread_url: &stored.thread_url,
            };
            if let Err(err) = PublishedPostRepository::upsert(state.db.pool(), &record).await {
                warn!(thread_id, "failed to update published post record: {err}");
            }
        }
        Ok(None) => debug!(thread_id, "updated post has no history record"),
        Err(err) => warn!(thread_id, "failed to read published post record: {err}"),
    }

    Ok(Json(json!({ "ok": true, "thread_id": thread_id.to_string() })))
}

/// POST /api/forum-post/delete
async fn delete_post_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeletePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let forum = state.forum().ok_or(ApiError::NotConfigured)?;
    let thread_id = request
        .thread_id
        .ok_or_else(|| ApiError::BadRequest("thread_id is required".to_string()))?;

    let stored = PublishedPostRepository::get_by_thread(state.db.pool(), thread_id).await?;
    forum.delete_post(thread_id).await?;
    PublishedPostRepository::delete_by_thread(state.db.pool(), thread_id).await?;

    let title = non_empty(request.title).or(stored.map(|post| post.title));
    info!(thread_id, title = title.as_deref().unwrap_or("-"), "forum post deleted");

    match (title, state.announcements()) {
        (Some(title), Some(channel)) => {
            let notice = AnnouncementFormat::render_deletion(&title, request.reason.as_deref());
            if let Err(err) = channel.send(&notice).await {
                warn!(thread_id, "failed to send deletion notice: {err}");
            }
        }
        (None, _) => debug!(thread_id, "no title known, deletion notice skipped"),
        (_, None) => debug!(thread_id, "no announcement channel, deletion notice skipped"),
    }

    Ok(Json(json!({ "ok": true, "thread_id": thread_id.to_string() })))
}

/// GET /api/history
async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(MAX_HISTORY_ROWS)
        .clamp(1, MAX_HISTORY_ROWS);
    let posts = PublishedPostRepository::list_recent(state.db.pool(), limit).await?;
    Ok(Json(HistoryResponse {
        ok: true,
        count: posts.len(),
        posts,
    }))
}

/// WebSocket upgrade handler for logs
async fn logs_ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_logs_websocket(socket, state))
}

/// Handle logs WebSocket connection - streams log entries to client
async fn handle_logs_websocket(socket: axum::extract::ws::WebSocket, state: Arc<AppState>) {
    use axum::extract::ws::Message;
    use futures::{sink::SinkExt, stream::StreamExt};

    let client_id = format!("log_client_{}", uuid::Uuid::new_v4());
    info!("Log WebSocket client connected: {}", client_id);
    state
        .log(LogEntry::WebSocket {
            event: "connected".to_string(),
            client_id: client_id.clone(),
        })
        .await;

    let (mut sender, mut receiver) = socket.split();

    // Subscribe to log broadcasts
    let mut log_rx = state.subscribe_logs();

    let _ = sender
        .send(Message::Text(
            json!({
                "type": "connected",
                "message": "Connected to tradbridge logs"
            })
            .to_string()
            .into(),
        ))
        .await;

    loop {
        tokio::select! {
            Ok(entry) = log_rx.recv() => {
                let log_line = entry.to_string();
                if sender.send(Message::Text(log_line.into())).await.is_err() {
                    break;
                }
            }

            Some(Ok(msg)) = receiver.next() => {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }

            else => break,
        }
    }

    info!("Log WebSocket client disconnected: {}", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::fakes::{FakeChannel, FakeForum};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;
    use tradbridge_core::Settings;
    use tradbridge_db::test_helpers::create_test_pool;

    struct Fixture {
        state: Arc<AppState>,
        forum: Arc<FakeForum>,
        announcements: Arc<FakeChannel>,
    }

    async fn fixture() -> Fixture {
        let mut settings = Settings::default();
        settings.discord.forum_id = Some(20);
        let state = Arc::new(AppState::new(settings, create_test_pool().await.unwrap()));
        let forum = Arc::new(FakeForum::default());
        let announcements = Arc::new(FakeChannel::new(1));
        state.attach_discord(forum.clone(), Some(announcements.clone()));
        Fixture {
            state,
            forum,
            announcements,
        }
    }

    async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_configuration() {
        let state = Arc::new(AppState::new(Settings::default(), create_test_pool().await.unwrap()));
        let (status, body) = call(&state, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["configured"], false);
    }

    #[tokio::test]
    async fn unconfigured_discord_is_unavailable() {
        let state = Arc::new(AppState::new(Settings::default(), create_test_pool().await.unwrap()));
        let (status, body) = call(
            &state,
            "POST",
            "/api/forum-post",
            Some(json!({"title": "Eternum [v0.6]", "content": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn create_records_history() {
        let f = fixture().await;
        let (status, body) = call(
            &f.state,
            "POST",
            "/api/forum-post",
            Some(json!({
                "title": "Eternum [v0.6]",
                "content": "**Version du jeu :** `v0.6`",
                "tags": ["Traduction"],
                "metadata": {"game_name": "Eternum", "game_version": "v0.6", "translate_version": "v0.6"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["thread_id"], "7001");

        let created = f.forum.created.lock().unwrap().clone();
        assert_eq!(created[0].0, 20);
        assert_eq!(created[0].1.metadata.as_ref().unwrap().game_name, "Eternum");

        let (_, history) = call(&f.state, "GET", "/api/history", None).await;
        assert_eq!(history["count"], 1);
        assert_eq!(history["posts"][0]["title"], "Eternum [v0.6]");
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let f = fixture().await;
        let (status, _) = call(&f.state, "POST", "/api/forum-post", Some(json!({"title": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(f.forum.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_edits_post_and_history() {
        let f = fixture().await;
        call(
            &f.state,
            "POST",
            "/api/forum-post",
            Some(json!({"title": "Eternum [v0.6]", "content": "old"})),
        )
        .await;

        let (status, _) = call(
            &f.state,
            "POST",
            "/api/forum-post/update",
            Some(json!({"threadId": "7001", "title": "Eternum [v0.7]"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let edits = f.forum.edits.lock().unwrap().clone();
        assert_eq!(edits, vec![(7001, PostEdit {
            title: Some("Eternum [v0.7]".to_string()),
            ..PostEdit::default()
        })]);

        let stored = PublishedPostRepository::get_by_thread(f.state.db.pool(), 7001)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Eternum [v0.7]");
        assert_eq!(stored.content, "old");
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let f = fixture().await;
        let (status, body) = call(
            &f.state,
            "POST",
            "/api/forum-post/update",
            Some(json!({"thread_id": 7001})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "nothing to update");
    }

    #[tokio::test]
    async fn delete_removes_thread_and_announces() {
        let f = fixture().await;
        call(
            &f.state,
            "POST",
            "/api/forum-post",
            Some(json!({"title": "Eternum [v0.6]"})),
        )
        .await;

        let (status, _) = call(
            &f.state,
            "POST",
            "/api/forum-post/delete",
            Some(json!({"thread_id": "7001", "reason": "Demande de l'auteur"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(f.forum.deleted.lock().unwrap().clone(), vec![7001]);

        let sent = f.announcements.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.contains("**Publication supprimée :** Eternum [v0.6]"));
        assert!(sent[0].content.contains("**Raison :** Demande de l'auteur"));

        let (_, history) = call(&f.state, "GET", "/api/history", None).await;
        assert_eq!(history["count"], 0);
    }
}
