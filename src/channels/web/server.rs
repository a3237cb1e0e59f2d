//! Axum HTTP server for the case gateway.
//!
//! Handles the case API routes, the gateway probe, health, and static file
//! serving for the browser UI.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::channels::web::types::*;
use crate::error::{CaseError, ChannelError, GatewayError};
use crate::legal::assistant::CaseAssistant;
use crate::legal::case::{Case, ChatMessage, Document};

/// Shared state for all gateway handlers.
pub struct GatewayState {
    /// Case store plus the AI gateway used for chat and document analysis.
    pub assistant: CaseAssistant,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
    /// Running `axum::serve` task, awaited on shutdown so in-flight requests drain.
    server_task: Mutex<Option<JoinHandle<()>>>,
    /// Server startup time for uptime calculation.
    pub startup_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(assistant: CaseAssistant) -> Self {
        Self {
            assistant,
            shutdown_tx: tokio::sync::RwLock::new(None),
            server_task: Mutex::new(None),
            startup_time: std::time::Instant::now(),
        }
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
        let task = self.server_task.lock().await.take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!("Case gateway task failed: {}", e);
        }
    }
}

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data:; connect-src 'self'; object-src 'none'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

/// Maximum size accepted for a single uploaded document (10 MiB).
const UPLOAD_FILE_SIZE_LIMIT: usize = 10 * 1024 * 1024;
/// Multipart field carrying the uploaded document.
const UPLOAD_FIELD: &str = "file";
const DEFAULT_UPLOAD_NAME: &str = "document";

/// Build the gateway router without binding it.
pub fn gateway_router(state: Arc<GatewayState>, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/cases",
            get(cases_list_handler).post(cases_create_handler),
        )
        .route("/api/cases/{id}/chat", post(case_chat_handler))
        .route(
            "/api/cases/{id}/documents",
            post(case_document_upload_handler)
                .layer(DefaultBodyLimit::max(UPLOAD_FILE_SIZE_LIMIT)),
        )
        .route("/api/test-gemini", get(gateway_probe_handler));

    // Static file routes, served from embedded strings.
    let statics = Router::new()
        .route("/", get(index_handler))
        .route("/style.css", get(css_handler))
        .route("/app.js", get(js_handler));

    Router::new()
        .merge(api)
        .merge(statics)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy: the bound localhost origins plus any configured extras.
pub fn cors_layer(bound: SocketAddr, extra_origins: &[String]) -> Result<CorsLayer, ChannelError> {
    let mut origins = vec![
        format!("http://{}:{}", bound.ip(), bound.port()),
        format!("http://localhost:{}", bound.port()),
    ];
    origins.extend(extra_origins.iter().cloned());

    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| ChannelError::StartupFailed {
                    name: "gateway".to_string(),
                    reason: format!("Invalid CORS origin {origin}: {e}"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE])))
}

/// Start the gateway HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<GatewayState>,
    extra_origins: &[String],
) -> Result<SocketAddr, ChannelError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("Failed to bind to {}: {}", addr, e),
        })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("Failed to get local addr: {}", e),
        })?;

    let app = gateway_router(state.clone(), cors_layer(bound_addr, extra_origins)?);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Case gateway shutting down");
            })
            .await
        {
            tracing::error!("Case gateway server error: {}", e);
        }
    });
    *state.server_task.lock().await = Some(task);

    Ok(bound_addr)
}

fn case_error_response(err: CaseError) -> (StatusCode, String) {
    let status = match err {
        CaseError::Validation(_) => StatusCode::BAD_REQUEST,
        CaseError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (status, err.to_string())
}

// --- Static file handlers ---

async fn index_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/index.html"),
    )
}

async fn css_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/css"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/style.css"),
    )
}

async fn js_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/app.js"),
    )
}

// --- Health ---

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        channel: "gateway",
        ai_configured: state.assistant.is_configured(),
        uptime_secs: state.startup_time.elapsed().as_secs(),
    })
}

// --- Case handlers ---

async fn cases_list_handler(State(state): State<Arc<GatewayState>>) -> Json<Vec<Case>> {
    Json(state.assistant.store().list_cases().await)
}

async fn cases_create_handler(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<Case>), (StatusCode, String)> {
    let case = state
        .assistant
        .store()
        .create_case(req.name.as_deref().unwrap_or_default())
        .await
        .map_err(case_error_response)?;
    Ok((StatusCode::CREATED, Json(case)))
}

async fn case_chat_handler(
    State(state): State<Arc<GatewayState>>,
    Path(case_id): Path<u64>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatMessage>, (StatusCode, String)> {
    let reply = state
        .assistant
        .chat_turn(case_id, req.message.as_deref().unwrap_or_default())
        .await
        .map_err(case_error_response)?;
    Ok(Json(reply))
}

/// Keep only the final path segment of a client-supplied filename.
fn upload_basename(raw: Option<&str>) -> String {
    let name = raw
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        name.to_string()
    }
}

async fn case_document_upload_handler(
    State(state): State<Arc<GatewayState>>,
    Path(case_id): Path<u64>,
    mut multipart: Multipart,
) -> Result<Json<Document>, (StatusCode, String)> {
    if !state.assistant.store().contains(case_id).await {
        return Err(case_error_response(CaseError::NotFound(case_id)));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), format!("Multipart read error: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = upload_basename(field.file_name());
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| (e.status(), format!("Failed to read upload body: {e}")))?;

        let document = state
            .assistant
            .upload_document(case_id, &filename, content_type.as_deref(), &data)
            .await
            .map_err(case_error_response)?;
        return Ok(Json(document));
    }

    Err((
        StatusCode::BAD_REQUEST,
        format!("Missing multipart field '{UPLOAD_FIELD}'"),
    ))
}

// --- Gateway probe ---

async fn gateway_probe_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<GatewayProbeResponse>, (StatusCode, String)> {
    match state.assistant.probe().await {
        Ok(response) => Ok(Json(GatewayProbeResponse {
            status: "success",
            message: "Gemini API connection is working!",
            response,
        })),
        Err(GatewayError::NotConfigured) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Gemini API key not found. Please create a .env file and add GOOGLE_API_KEY='your-key'."
                .to_string(),
        )),
        Err(GatewayError::EmptyResponse) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Gemini API returned an empty response.".to_string(),
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Gateway probe failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to connect to Gemini API. Error: {e}"),
            ))
        }
    }
}
