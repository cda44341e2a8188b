//! # HTTP API
//!
//! JSON endpoints over the capacity engine, the admission controller and the
//! weather aggregator. Capacity denials are ordinary responses carrying a
//! `BookingDecision`; only real failures go through `AppError`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use lib_ecogate::admission::{AdmissionError, RequestOutcome};
use lib_ecogate::capacity::CapacityError;
use lib_ecogate::configs::ConfigError;
use lib_ecogate::models::{BookingStatus, CleanupEvent, EcologicalIndicators, Site};
use lib_ecogate::store::{StoreError, TransitionOutcome};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::capacity_logic::events;
use crate::capacity_logic::state::AppState;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_)
            | AppError::Admission(AdmissionError::UnknownSite(_))
            | AppError::Admission(AdmissionError::UnknownBooking(_))
            | AppError::Admission(AdmissionError::UnknownEvent(_))
            | AppError::Admission(AdmissionError::Capacity(CapacityError::UnknownSite(_)))
            | AppError::Capacity(CapacityError::UnknownSite(_)) => (StatusCode::NOT_FOUND, "NotFound"),
            AppError::Admission(AdmissionError::InvalidTransition { .. })
            | AppError::Store(StoreError::InvalidTransition { .. }) => (StatusCode::CONFLICT, "InvalidTransition"),
            AppError::BadRequest(_)
            | AppError::Store(StoreError::InvalidSite { .. })
            | AppError::Admission(AdmissionError::Store(StoreError::InvalidSite { .. }))
            | AppError::Admission(AdmissionError::InvalidAmount(_))
            | AppError::Capacity(CapacityError::Config(ConfigError::InvalidMultiplier(_))) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest")
            }
            AppError::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "NotFound"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = json!({
            "error_type": error_type,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, AppError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/capacity", get(batch_capacity))
        .route("/sites/{id}/capacity", get(site_capacity))
        .route("/sites/{id}/eligibility", post(eligibility))
        .route("/sites/{id}/override", put(set_override).delete(clear_override))
        .route("/sites/{id}/indicators", post(record_indicators))
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/transition", post(transition_booking))
        .route("/weather/check", post(check_weather))
        .route("/weather/stats", get(weather_stats))
        .route("/weather/stats/reset", post(reset_weather_stats))
        .route("/weather/invalidate", post(invalidate_weather))
        .route("/cleanup-events", post(create_cleanup_event))
        .route(
            "/cleanup-events/{id}/participants",
            post(register_participant).delete(cancel_registration),
        )
        .route("/users/{id}/eco-points", get(eco_points).post(adjust_eco_points))
        .route("/events", get(events::ws_handler))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "policyVersion": state.policies.version(),
        "subscribers": state.dispatcher.subscriber_count(),
        "monitorRunning": state.monitor.is_running(),
    }))
}

async fn site_capacity(State(state): State<AppState>, Path(site_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let capacity = state.engine.dynamic_capacity(&site_id).await?;
    Ok(Json(capacity))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchQuery {
    /// Comma-separated site ids. All sites when absent.
    ids: Option<String>,
    #[serde(default)]
    summary: bool,
}

async fn load_sites(state: &AppState, ids: Option<&str>) -> ApiResult<Option<Vec<Site>>> {
    let Some(ids) = ids else { return Ok(None) };
    let mut sites = Vec::new();
    for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        let site = state
            .store
            .site(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Site '{}' not found", id)))?;
        sites.push(site);
    }
    Ok(Some(sites))
}

async fn batch_capacity(State(state): State<AppState>, Query(query): Query<BatchQuery>) -> ApiResult<Response> {
    let sites = load_sites(&state, query.ids.as_deref()).await?;
    if query.summary {
        let adjusted = state.engine.batch_adjusted_capacities(sites).await?;
        return Ok(Json(adjusted).into_response());
    }
    let capacities = state.engine.batch_evaluate(sites).await?;
    Ok(Json(capacities).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityRequest {
    group_size: u32,
}

async fn eligibility(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Json(request): Json<EligibilityRequest>,
) -> ApiResult<impl IntoResponse> {
    let decision = state.engine.is_booking_allowed(&site_id, request.group_size).await?;
    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideRequest {
    multiplier: f64,
    #[serde(default = "default_active")]
    active: bool,
    expires_at: Option<DateTime<Utc>>,
    author: Option<String>,
}

fn default_active() -> bool {
    true
}

async fn set_override(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> ApiResult<impl IntoResponse> {
    let author = request.author.as_deref().unwrap_or("admin");
    let (entry, capacity) = state
        .engine
        .set_capacity_override(&site_id, request.multiplier, request.active, request.expires_at, author)
        .await?;
    info!(site_id = %site_id, multiplier = request.multiplier, author, "Capacity override set");
    Ok(Json(json!({ "override": entry, "capacity": capacity })))
}

async fn clear_override(State(state): State<AppState>, Path(site_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let (removed, capacity) = state.engine.clear_capacity_override(&site_id).await?;
    info!(site_id = %site_id, removed, "Capacity override cleared");
    Ok(Json(json!({ "removed": removed, "capacity": capacity })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndicatorsRequest {
    soil_compaction: f64,
    vegetation_disturbance: f64,
    wildlife_disturbance: f64,
    water_source_impact: f64,
    recorded_at: Option<DateTime<Utc>>,
}

async fn record_indicators(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
    Json(request): Json<IndicatorsRequest>,
) -> ApiResult<impl IntoResponse> {
    if state.store.site(&site_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Site '{}' not found", site_id)));
    }
    let indicators = state
        .indicators
        .record(EcologicalIndicators {
            site_id: site_id.clone(),
            soil_compaction: request.soil_compaction,
            vegetation_disturbance: request.vegetation_disturbance,
            wildlife_disturbance: request.wildlife_disturbance,
            water_source_impact: request.water_source_impact,
            recorded_at: request.recorded_at.unwrap_or_else(Utc::now),
        })
        .await?;
    let capacity = state.engine.dynamic_capacity(&site_id).await?;
    Ok(Json(json!({ "indicators": indicators, "capacity": capacity })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingRequest {
    site_id: String,
    user_id: String,
    group_size: u32,
}

async fn create_booking(State(state): State<AppState>, Json(request): Json<BookingRequest>) -> ApiResult<Response> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("userId must not be empty".to_string()));
    }
    let outcome = state
        .controller
        .request_booking(&request.site_id, &request.user_id, request.group_size)
        .await?;
    let status = match outcome {
        RequestOutcome::Created { .. } => StatusCode::CREATED,
        RequestOutcome::Rejected { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)).into_response())
}

async fn get_booking(State(state): State<AppState>, Path(booking_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let booking = state
        .controller
        .booking(&booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking '{}' not found", booking_id)))?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    status: BookingStatus,
}

async fn transition_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Response> {
    let outcome = state.controller.transition(&booking_id, request.status).await?;
    let status = match outcome {
        TransitionOutcome::Committed { .. } => StatusCode::OK,
        TransitionOutcome::Denied { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)).into_response())
}

async fn check_weather(State(state): State<AppState>) -> Response {
    match state.monitor.check_weather_now().await {
        Some(report) => (StatusCode::OK, Json(json!({ "status": "completed", "report": report }))).into_response(),
        None => (StatusCode::ACCEPTED, Json(json!({ "status": "already_running" }))).into_response(),
    }
}

async fn weather_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.aggregator.stats())
}

async fn reset_weather_stats(State(state): State<AppState>) -> StatusCode {
    state.aggregator.reset_stats();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvalidateRequest {
    site_id: Option<String>,
    region: Option<String>,
}

async fn invalidate_weather(
    State(state): State<AppState>,
    body: Option<Json<InvalidateRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let removed = match (request.site_id, request.region) {
        (Some(site_id), _) => usize::from(state.aggregator.invalidate_site(&site_id).await),
        (None, Some(region)) => state.aggregator.invalidate_region(&region).await,
        (None, None) => state.aggregator.invalidate_all().await,
    };
    Json(json!({ "removed": removed }))
}

async fn create_cleanup_event(
    State(state): State<AppState>,
    Json(event): Json<CleanupEvent>,
) -> ApiResult<impl IntoResponse> {
    if state.store.site(&event.site_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Site '{}' not found", event.site_id)));
    }
    state.community.create_event(event.clone()).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantRequest {
    user_id: String,
}

async fn register_participant(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.community.register_participant(&event_id, &request.user_id).await?;
    Ok(Json(outcome))
}

async fn cancel_registration(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.community.cancel_registration(&event_id, &request.user_id).await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn eco_points(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let balance = state.community.balance(&user_id).await?;
    Ok(Json(json!({ "userId": user_id, "balance": balance })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PointsAction {
    Award,
    Redeem,
}

#[derive(Debug, Deserialize)]
struct PointsRequest {
    action: PointsAction,
    points: i64,
}

async fn adjust_eco_points(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<PointsRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = match request.action {
        PointsAction::Award => state.community.award_points(&user_id, request.points).await?,
        PointsAction::Redeem => state.community.redeem_points(&user_id, request.points).await?,
    };
    Ok(Json(outcome))
}
