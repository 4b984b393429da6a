//! Telemetry API Server
//!
//! HTTP API for a collection point: the network server posts uplinks here,
//! and peer collection points use the watermark, pull and push endpoints
//! to run anti-entropy sync against this replica.

use crate::application::{IngestError, IngestService};
use crate::domain::entities::{TelemetryRecord, WatermarkMap};
use crate::domain::errors::StoreError;
use crate::domain::ports::TelemetryStore;
use crate::domain::value_objects::{GatewayFilter, GatewayId};
use crate::infrastructure::ShutdownController;
use crate::replication::WatermarkResolver;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Default ceiling for push/pull bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default ceiling for a single uplink.
pub const DEFAULT_UPLINK_MAX_BYTES: usize = 4096;

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) => Self::Unavailable(e.to_string()),
            StoreError::PartialInsert { .. } => Self::Conflict(e.to_string()),
            StoreError::InvalidData(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Malformed(e) => Self::Unprocessable(e.to_string()),
            IngestError::Identifier(e) => Self::BadRequest(e.to_string()),
            IngestError::Store(e) => e.into(),
        }
    }
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn TelemetryStore>,
    pub ingest: Arc<IngestService>,
    pub resolver: WatermarkResolver,
    /// Gateway that `/gwlatest/self` resolves to
    pub own_gateway: Option<GatewayId>,
}

impl ApiState {
    pub fn new(store: Arc<dyn TelemetryStore>, own_gateway: Option<GatewayId>) -> Self {
        Self {
            ingest: Arc::new(IngestService::new(store.clone())),
            resolver: WatermarkResolver::new(store.clone()),
            store,
            own_gateway,
        }
    }
}

/// HTTP API server.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
    max_body_bytes: usize,
    uplink_max_bytes: usize,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self {
            listen_addr,
            state,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            uplink_max_bytes: DEFAULT_UPLINK_MAX_BYTES,
        }
    }

    pub fn with_body_limits(mut self, max_body_bytes: usize, uplink_max_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self.uplink_max_bytes = uplink_max_bytes;
        self
    }

    pub fn state(&self) -> ApiState {
        self.state.clone()
    }

    /// Build the router with all routes and limits applied.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/gwlatest", get(latest_all_handler))
            .route("/gwlatest/:filter", get(latest_filtered_handler))
            .route("/pull", post(pull_handler))
            .route("/push", post(push_handler))
            .route(
                "/uplink",
                post(uplink_handler).layer(DefaultBodyLimit::max(self.uplink_max_bytes)),
            )
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind `listen_addr` and serve until `shutdown` fires.
    pub async fn run(&self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("telemetry API listening on {}", self.listen_addr);
        self.run_with_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn run_with_listener(
        &self,
        listener: TcpListener,
        shutdown: ShutdownController,
    ) -> anyhow::Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.wait())
            .await?;
        tracing::info!("telemetry API stopped");
        Ok(())
    }
}

// Handler functions

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn latest_all_handler(
    State(state): State<ApiState>,
) -> Result<Json<WatermarkMap>, ApiError> {
    Ok(Json(state.resolver.latest().await?))
}

async fn latest_filtered_handler(
    State(state): State<ApiState>,
    Path(filter): Path<String>,
) -> Result<Json<WatermarkMap>, ApiError> {
    let filter = filter
        .parse::<GatewayFilter>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let marks = match filter {
        GatewayFilter::All => state.resolver.latest().await?,
        GatewayFilter::Gateway(gw) => state.resolver.latest_for(&gw).await?,
        GatewayFilter::Own => {
            let gw = state
                .own_gateway
                .ok_or_else(|| ApiError::NotFound("no gateway configured for self".to_string()))?;
            state.resolver.latest_for(&gw).await?
        }
    };
    Ok(Json(marks))
}

async fn pull_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Vec<TelemetryRecord>>, ApiError> {
    let since: WatermarkMap =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let records = state.store.records_after(&since).await?;
    tracing::debug!(
        "pull: {} records for {} gateways",
        records.len(),
        since.len()
    );
    Ok(Json(records))
}

async fn push_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let records: Vec<TelemetryRecord> =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let count = records.len();
    state.store.bulk_insert(records).await?;
    tracing::debug!("push: stored {} records", count);
    Ok(StatusCode::NO_CONTENT)
}

async fn uplink_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Err(ApiError::UnsupportedMediaType(
            "expected application/json".to_string(),
        ));
    }

    match state.ingest.ingest_json(&body).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            tracing::warn!("dropping uplink: {}", e);
            Err(e.into())
        }
    }
}
