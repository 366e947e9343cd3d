//! HTTP API for the client portal.
//!
//! # Endpoints
//!
//! | Method   | Path                   | Access | Description |
//! |----------|------------------------|--------|-------------|
//! | `POST`   | `/api/auth/login`      | open   | Establish a session from a verified identity |
//! | `GET`    | `/api/auth/me`         | session| Current user profile |
//! | `POST`   | `/api/auth/logout`     | open   | Clear the session cookie |
//! | `POST`   | `/api/documents`       | admin  | Multipart upload; ingestion runs in the background |
//! | `GET`    | `/api/documents`       | admin  | List documents, newest first |
//! | `GET`    | `/api/documents/{id}`  | admin  | Processing status for one document |
//! | `DELETE` | `/api/documents/{id}`  | admin  | Remove file, vectors, and record |
//! | `POST`   | `/api/chat`            | open   | Grounded chat answer with sources |
//! | `GET`    | `/api/health`          | open   | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use one envelope:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: d1" } }
//! ```
//!
//! Codes: `bad_request` (400), `unsupported_format` (400), `unauthorized`
//! (401), `forbidden` (403), `not_found` (404), `chat_error` (500),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the portal frontend is
//! served from a different origin.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::auth::{role_for_email, session_from_cookie_header, SessionClaims, SessionSigner};
use crate::config::Config;
use crate::extract::{is_supported, SUPPORTED_EXTENSIONS};
use crate::ingest::IngestQueue;
use crate::models::{ChatMessage, Document, DocumentStatus, User};
use crate::services::Services;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    services: Services,
    signer: SessionSigner,
    queue: IngestQueue,
}

/// Starts the portal API server.
///
/// Binds to `[server].bind` and runs until the process is terminated. The
/// ingestion queue worker is spawned here and lives as long as the server.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let signer = SessionSigner::new(&config.auth);
    let queue = IngestQueue::start(services.ingestor.clone(), config.ingest.queue_depth);

    let state = AppState {
        services,
        signer,
        queue,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/me", get(handle_me))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/documents", post(handle_upload).get(handle_list))
        .route("/api/documents/{id}", get(handle_status).delete(handle_delete))
        .route("/api/chat", post(handle_chat))
        .route("/api/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    tracing::info!("portal API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unsupported_format(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "unsupported_format".to_string(),
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: "authentication required".to_string(),
    }
}

fn forbidden() -> AppError {
    AppError {
        status: StatusCode::FORBIDDEN,
        code: "forbidden".to_string(),
        message: "admin access required".to_string(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn chat_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "chat_error".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Session helpers ============

fn session_claims(headers: &HeaderMap, signer: &SessionSigner) -> Option<SessionClaims> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = session_from_cookie_header(cookie_header)?;
    signer.verify(token)
}

fn require_session(headers: &HeaderMap, signer: &SessionSigner) -> Result<SessionClaims, AppError> {
    session_claims(headers, signer).ok_or_else(unauthorized)
}

fn require_admin(headers: &HeaderMap, signer: &SessionSigner) -> Result<SessionClaims, AppError> {
    let claims = require_session(headers, signer)?;
    if !claims.is_admin() {
        return Err(forbidden());
    }
    Ok(claims)
}

// ============ POST /api/auth/login ============

/// Identity assertion from the frontend after external verification.
#[derive(Deserialize)]
struct LoginRequest {
    uid: String,
    email: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: User,
}

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if req.uid.is_empty() || !req.email.contains('@') {
        return Err(bad_request("uid and a valid email are required"));
    }

    let role = role_for_email(&req.email, &state.services.config.auth.admin_domain);
    let user = User {
        uid: req.uid,
        email: req.email,
        display_name: req.display_name,
        role: role.to_string(),
    };

    state
        .services
        .registry
        .upsert_user(&user)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let token = state.signer.issue(&user.uid, &user.email, &user.role);
    let cookie = state.signer.cookie(&token);
    tracing::info!(uid = %user.uid, role = %user.role, "user logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse { user }),
    )
        .into_response())
}

// ============ GET /api/auth/me ============

async fn handle_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, AppError> {
    let claims = require_session(&headers, &state.signer)?;
    let user = state
        .services
        .registry
        .get_user(&claims.uid)
        .await
        .map_err(|_| unauthorized())?;
    Ok(Json(LoginResponse { user }))
}

// ============ POST /api/auth/logout ============

async fn handle_logout(State(state): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, state.signer.clear_cookie())],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}

// ============ POST /api/documents ============

#[derive(Serialize)]
struct UploadResponse {
    document_id: String,
    status: DocumentStatus,
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let claims = require_admin(&headers, &state.signer)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .ok_or_else(|| bad_request("file field must carry a filename"))?
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(e.to_string()))?;
            upload = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| bad_request("missing multipart field: file"))?;
    if !is_supported(&filename) {
        return Err(unsupported_format(format!(
            "unsupported file format; accepted: {}",
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    let id = Uuid::new_v4().to_string();
    let path = state
        .services
        .store
        .save(&id, &filename, &bytes)
        .map_err(|e| internal(e.to_string()))?;

    let doc = Document {
        id: id.clone(),
        filename,
        storage_location: path.to_string_lossy().into_owned(),
        uploaded_by: claims.uid,
        uploaded_at: Utc::now(),
        status: DocumentStatus::Processing,
        chunk_count: 0,
        error_message: None,
    };
    state
        .services
        .registry
        .create(&doc)
        .await
        .map_err(|e| internal(e.to_string()))?;

    state
        .queue
        .enqueue(doc)
        .map_err(|_| internal("ingestion queue unavailable"))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id: id,
            status: DocumentStatus::Processing,
        }),
    ))
}

// ============ GET /api/documents ============

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<Document>,
}

async fn handle_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, AppError> {
    require_admin(&headers, &state.signer)?;

    let mut documents = state
        .services
        .registry
        .list()
        .await
        .map_err(|e| internal(e.to_string()))?;
    documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

    Ok(Json(ListResponse { documents }))
}

// ============ GET /api/documents/{id} ============

async fn handle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    require_admin(&headers, &state.signer)?;

    let doc = state
        .services
        .registry
        .get(&id)
        .await
        .map_err(|e| match e {
            crate::error::RegistryError::NotFound(_) => not_found(e.to_string()),
            other => internal(other.to_string()),
        })?;
    Ok(Json(doc))
}

// ============ DELETE /api/documents/{id} ============

async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.signer)?;

    let doc = state
        .services
        .registry
        .get(&id)
        .await
        .map_err(|e| match e {
            crate::error::RegistryError::NotFound(_) => not_found(e.to_string()),
            other => internal(other.to_string()),
        })?;

    state
        .services
        .ingestor
        .delete_document(&doc)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(serde_json::json!({ "deleted": id })))
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<crate::models::ChatReply>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let reply = state
        .services
        .responder
        .answer(&req.message, &req.history)
        .await
        .map_err(|e| chat_error(e.to_string()))?;
    Ok(Json(reply))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
