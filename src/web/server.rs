//! Axum HTTP server for the marketplace API.
//!
//! Handlers are thin: parse the path and body, call a service, and map the
//! `ServiceError` kind onto a status code. The body of every failure is the
//! plain user-facing message.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::booking::{BookingReceipt, BookingRequest, Scheduler, UpcomingConsultation};
use crate::config::BookingConfig;
use crate::db::{
    AttorneyRecord, AttorneySearch, ClientRecord, ConsultationRecord, CreateReviewParams,
    Database, FileRecord, MatterRecord, MessageRecord, ReviewRecord,
};
use crate::directory::{AttorneyDirectory, RatingSummary, ReviewLedger};
use crate::error::{ServerError, ServiceError};
use crate::web::types::*;
use crate::workspace::{FileUpload, Registry, Relay};

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Services shared by every handler.
pub struct AppState {
    pub scheduler: Scheduler,
    pub directory: AttorneyDirectory,
    pub reviews: ReviewLedger,
    pub registry: Registry,
    pub relay: Relay,
    /// Server startup time for uptime calculation.
    pub startup_time: Instant,
    /// Shutdown signal sender, set once the server is running.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, booking: BookingConfig) -> Self {
        Self {
            scheduler: Scheduler::new(Arc::clone(&db), booking),
            directory: AttorneyDirectory::new(Arc::clone(&db)),
            reviews: ReviewLedger::new(Arc::clone(&db)),
            registry: Registry::new(Arc::clone(&db)),
            relay: Relay::new(db),
            startup_time: Instant::now(),
            shutdown_tx: tokio::sync::RwLock::new(None),
        }
    }

    /// Ask a running server to stop accepting connections.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: ServiceError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::debug!(kind = err.kind(), error = %err, "request rejected");
    }
    (status, err.to_string())
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid {what} id")))
}

/// Build the router without binding a socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(health_handler))
        // Attorneys
        .route(
            "/api/attorneys",
            get(attorneys_search_handler).post(attorneys_register_handler),
        )
        .route("/api/attorneys/lookup", get(attorneys_lookup_handler))
        .route(
            "/api/attorneys/{id}",
            get(attorneys_get_handler).patch(attorneys_update_handler),
        )
        .route("/api/attorneys/{id}/verify", post(attorneys_verify_handler))
        .route("/api/attorneys/{id}/slots", get(attorney_slots_handler))
        .route(
            "/api/attorneys/{id}/consultations",
            get(attorney_consultations_handler),
        )
        .route(
            "/api/attorneys/{id}/consultations/upcoming",
            get(attorney_upcoming_handler),
        )
        .route(
            "/api/attorneys/{id}/reviews",
            get(attorney_reviews_handler).post(reviews_create_handler),
        )
        .route("/api/attorneys/{id}/rating", get(attorney_rating_handler))
        .route("/api/attorneys/{id}/matters", get(attorney_matters_handler))
        // Reviews
        .route("/api/reviews", get(reviews_by_email_handler))
        .route(
            "/api/reviews/{id}",
            axum::routing::patch(reviews_update_handler).delete(reviews_delete_handler),
        )
        // Consultations
        .route("/api/consultations", post(consultations_create_handler))
        .route("/api/consultations/{id}", get(consultations_get_handler))
        .route(
            "/api/consultations/{id}/status",
            post(consultations_status_handler),
        )
        .route(
            "/api/consultations/{id}/cancel",
            post(consultations_cancel_handler),
        )
        // Clients
        .route("/api/clients/lookup", get(clients_lookup_handler))
        .route("/api/clients/{id}", get(clients_get_handler))
        .route(
            "/api/clients/{id}/consultations",
            get(client_consultations_handler),
        )
        .route("/api/clients/{id}/matters", get(client_matters_handler))
        // Matters
        .route(
            "/api/matters/{id}",
            get(matters_get_handler).patch(matters_rename_handler),
        )
        .route(
            "/api/matters/{id}/consultations",
            get(matter_consultations_handler),
        )
        .route(
            "/api/matters/{id}/messages",
            get(matter_messages_handler).post(matter_post_message_handler),
        )
        .route(
            "/api/matters/{id}/files",
            get(matter_files_handler).post(matter_attach_file_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<SocketAddr, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        ServerError::StartupFailed {
            name: "http".to_string(),
            reason: format!("Failed to bind to {}: {}", addr, e),
        }
    })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ServerError::StartupFailed {
            name: "http".to_string(),
            reason: format!("Failed to get local addr: {}", e),
        })?;

    let app = build_router(Arc::clone(&state));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("HTTP server shutting down");
            })
            .await
        {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "HTTP server listening");
    Ok(bound_addr)
}

// --- Health ---

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "counsel-desk",
        uptime_secs: state.startup_time.elapsed().as_secs(),
    })
}

// --- Attorneys ---

async fn attorneys_search_handler(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<AttorneySearch>,
) -> ApiResult<Vec<AttorneyRecord>> {
    state
        .directory
        .search(&filters)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn attorneys_register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterAttorneyRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), ApiError> {
    let attorney = state
        .directory
        .register(req.into())
        .await
        .map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::ok(
            attorney.id,
            "Attorney registered successfully",
        )),
    ))
}

async fn attorneys_lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<AttorneyRecord> {
    state
        .directory
        .get_by_email(&query.email)
        .await
        .map_err(api_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Attorney not found".to_string()))
}

async fn attorneys_get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<AttorneyRecord> {
    let id = parse_id(&id, "attorney")?;
    state.directory.get(id).await.map(Json).map_err(api_error)
}

async fn attorneys_update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAttorneyRequest>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(&id, "attorney")?;
    state
        .directory
        .update(id, req.into())
        .await
        .map_err(api_error)?;
    Ok(Json(ActionResponse::ok(id, "Attorney updated successfully")))
}

async fn attorneys_verify_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<VerifyAttorneyRequest>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(&id, "attorney")?;
    let attorney = state
        .directory
        .verify(id, req.verified)
        .await
        .map_err(api_error)?;
    let message = if attorney.is_verified {
        "Attorney verified"
    } else {
        "Attorney verification removed"
    };
    Ok(Json(ActionResponse::ok(id, message)))
}

async fn attorney_slots_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> ApiResult<SlotsResponse> {
    let attorney_id = parse_id(&id, "attorney")?;
    let slots = state
        .scheduler
        .compute_available_slots(attorney_id, query.date)
        .await
        .map_err(api_error)?;
    Ok(Json(SlotsResponse {
        attorney_id,
        date: query.date,
        slots,
    }))
}

async fn attorney_consultations_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ConsultationRecord>> {
    let attorney_id = parse_id(&id, "attorney")?;
    state
        .scheduler
        .list_for_attorney(attorney_id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn attorney_upcoming_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Vec<UpcomingConsultation>> {
    let attorney_id = parse_id(&id, "attorney")?;
    state
        .scheduler
        .get_upcoming_consultations(attorney_id, query.days, query.limit)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn attorney_reviews_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ReviewRecord>> {
    let attorney_id = parse_id(&id, "attorney")?;
    state
        .reviews
        .list_for_attorney(attorney_id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn attorney_rating_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<RatingSummary> {
    let attorney_id = parse_id(&id, "attorney")?;
    state
        .reviews
        .get_average_rating(attorney_id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn attorney_matters_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<MatterRecord>> {
    let attorney_id = parse_id(&id, "attorney")?;
    state
        .registry
        .list_matters_for_attorney(attorney_id)
        .await
        .map(Json)
        .map_err(api_error)
}

// --- Reviews ---

async fn reviews_create_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), ApiError> {
    let attorney_id = parse_id(&id, "attorney")?;
    let review = state
        .reviews
        .create(CreateReviewParams {
            attorney_id,
            client_name: req.client_name,
            client_email: req.client_email,
            rating: req.rating,
            comment: req.comment,
        })
        .await
        .map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::ok(review.id, "Review submitted successfully")),
    ))
}

async fn reviews_by_email_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewsByEmailQuery>,
) -> ApiResult<Vec<ReviewRecord>> {
    state
        .reviews
        .list_by_client_email(&query.client_email)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn reviews_update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateReviewRequest>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(&id, "review")?;
    state
        .reviews
        .update(id, req.into())
        .await
        .map_err(api_error)?;
    Ok(Json(ActionResponse::ok(id, "Review updated successfully")))
}

async fn reviews_delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(&id, "review")?;
    state.reviews.delete(id).await.map_err(api_error)?;
    Ok(Json(ActionResponse::ok(id, "Review deleted successfully")))
}

// --- Consultations ---

async fn consultations_create_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), ApiError> {
    let receipt = state
        .scheduler
        .create_consultation(req)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn consultations_get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ConsultationRecord> {
    let id = parse_id(&id, "consultation")?;
    state
        .scheduler
        .get_consultation(id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn consultations_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(&id, "consultation")?;
    let updated = state
        .scheduler
        .update_status(id, req.status)
        .await
        .map_err(api_error)?;
    Ok(Json(ActionResponse::ok(
        id,
        format!("Consultation status set to {}", updated.status.as_str()),
    )))
}

async fn consultations_cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(&id, "consultation")?;
    state.scheduler.cancel(id).await.map_err(api_error)?;
    Ok(Json(ActionResponse::ok(id, "Consultation cancelled")))
}

// --- Clients ---

async fn clients_lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<ClientRecord> {
    state
        .registry
        .get_client_by_email(&query.email)
        .await
        .map_err(api_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Client not found".to_string()))
}

async fn clients_get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ClientRecord> {
    let id = parse_id(&id, "client")?;
    state.registry.get_client(id).await.map(Json).map_err(api_error)
}

async fn client_consultations_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ConsultationRecord>> {
    let client_id = parse_id(&id, "client")?;
    state
        .scheduler
        .list_for_client(client_id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn client_matters_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<MatterRecord>> {
    let client_id = parse_id(&id, "client")?;
    state
        .registry
        .list_matters_for_client(client_id)
        .await
        .map(Json)
        .map_err(api_error)
}

// --- Matters ---

async fn matters_get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<MatterRecord> {
    let id = parse_id(&id, "matter")?;
    state.registry.get_matter(id).await.map(Json).map_err(api_error)
}

async fn matters_rename_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameMatterRequest>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(&id, "matter")?;
    state
        .registry
        .rename_matter(id, req.title.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(ActionResponse::ok(id, "Matter updated successfully")))
}

async fn matter_consultations_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ConsultationRecord>> {
    let matter_id = parse_id(&id, "matter")?;
    state
        .scheduler
        .list_for_matter(matter_id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn matter_messages_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<MessageRecord>> {
    let matter_id = parse_id(&id, "matter")?;
    state
        .relay
        .list_messages(matter_id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn matter_post_message_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), ApiError> {
    let matter_id = parse_id(&id, "matter")?;
    let message = state
        .relay
        .post_message(matter_id, req.sender, req.sender_id, &req.content)
        .await
        .map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::ok(message.id, "Message sent")),
    ))
}

async fn matter_files_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<FileRecord>> {
    let matter_id = parse_id(&id, "matter")?;
    state
        .relay
        .list_files(matter_id)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn matter_attach_file_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AttachFileRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), ApiError> {
    let matter_id = parse_id(&id, "matter")?;
    let file = state
        .relay
        .attach_file(
            matter_id,
            FileUpload {
                uploaded_by: req.uploaded_by,
                file_name: req.file_name,
                content_type: req.content_type,
                size_bytes: req.size_bytes,
                storage_key: req.storage_key,
            },
        )
        .await
        .map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::ok(file.id, "File uploaded")),
    ))
}
