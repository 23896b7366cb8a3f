//! Request handlers for the queue API
//!
//! Handlers parse the request, call into the queue engine, and map engine
//! errors onto HTTP status codes through `ApiError`.

use crate::api::messages::{
    BookRequest, BookResponse, CheckInRequest, CheckInResponse, DoctorLoginResponse, ErrorBody,
    EventsQuery, FinishResponse, LoginRequest, ReceptionLoginResponse, StatsResponse,
    BOOKED_MESSAGE, CHECKED_IN_MESSAGE, FINISHED_MESSAGE, RECEPTION_LOGIN_MESSAGE,
};
use crate::error::QueueError;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::types::{BreakState, PatientToken, QueueSnapshot, Ward};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// Error returned by every API handler
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl ApiError {
    fn from_rejection(rejection: JsonRejection) -> Self {
        Self(QueueError::validation(rejection.body_text()).into())
    }

    /// HTTP status for the wrapped error
    pub fn status(&self) -> StatusCode {
        match QueueError::from_anyhow(&self.0) {
            Some(QueueError::Validation { .. }) | Some(QueueError::DuplicateBooking { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Some(QueueError::TokenNotFound { .. }) | Some(QueueError::UnknownWard { .. }) => {
                StatusCode::NOT_FOUND
            }
            Some(QueueError::DoctorOnBreak { .. }) | Some(QueueError::NoArrivedPatients { .. }) => {
                StatusCode::CONFLICT
            }
            Some(QueueError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Some(QueueError::Configuration { .. }) | Some(QueueError::Internal { .. }) | None => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn is_invalid_credentials(&self) -> bool {
        matches!(
            QueueError::from_anyhow(&self.0),
            Some(QueueError::InvalidCredentials)
        )
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_ward(raw: &str) -> Result<Ward, ApiError> {
    raw.parse::<Ward>().map_err(ApiError::from)
}

/// Root endpoint handler - shows service information
pub async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": state.config().service.name,
        "version": env!("CARGO_PKG_VERSION"),
        "wards": Ward::ALL,
        "endpoints": [
            "/api/book",
            "/api/checkin",
            "/api/queue/{ward}",
            "/api/call-next/{ward}",
            "/api/toggle-break/{ward}",
            "/api/finish-consultation/{ward}",
            "/api/login",
            "/api/reception-login",
            "/api/events",
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats"
        ]
    }))
}

pub async fn book_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> ApiResult<BookResponse> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;
    let ward = parse_ward(&request.ward)?;

    let receipt = state
        .queue_manager()
        .book_token(&request.name, &request.phone, ward, request.emergency)
        .await?;

    Ok(Json(BookResponse {
        token: receipt.token.token.clone(),
        estimated_time: receipt.token.estimated_time,
        position: receipt.position,
        message: BOOKED_MESSAGE.to_string(),
        patient: receipt.token,
    }))
}

pub async fn check_in_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckInRequest>, JsonRejection>,
) -> ApiResult<CheckInResponse> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;
    let code = request
        .code()
        .ok_or_else(|| QueueError::validation("token or QR data is required"))?;

    let patient = state
        .queue_manager()
        .check_in(code, request.vitals.clone())
        .await?;

    Ok(Json(CheckInResponse {
        message: CHECKED_IN_MESSAGE.to_string(),
        patient,
    }))
}

pub async fn queue_handler(
    State(state): State<Arc<AppState>>,
    Path(ward): Path<String>,
) -> ApiResult<QueueSnapshot> {
    let ward = parse_ward(&ward)?;
    Ok(Json(state.queue_manager().get_queue(ward).await?))
}

pub async fn call_next_handler(
    State(state): State<Arc<AppState>>,
    Path(ward): Path<String>,
) -> ApiResult<PatientToken> {
    let ward = parse_ward(&ward)?;
    Ok(Json(state.queue_manager().call_next(ward).await?))
}

pub async fn toggle_break_handler(
    State(state): State<Arc<AppState>>,
    Path(ward): Path<String>,
) -> ApiResult<BreakState> {
    let ward = parse_ward(&ward)?;
    Ok(Json(state.queue_manager().toggle_break(ward).await?))
}

pub async fn finish_consultation_handler(
    State(state): State<Arc<AppState>>,
    Path(ward): Path<String>,
) -> ApiResult<FinishResponse> {
    let ward = parse_ward(&ward)?;
    let finished = state.queue_manager().finish_consultation(ward).await?;

    Ok(Json(FinishResponse {
        message: FINISHED_MESSAGE.to_string(),
        token: finished.map(|patient| patient.token),
    }))
}

pub async fn doctor_login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<DoctorLoginResponse> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;

    let identity = match state
        .authenticator()
        .authenticate_doctor(&request.username, &request.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) => return Err(login_failed(&state, e)),
    };

    let ward = identity.ward.ok_or_else(|| QueueError::Internal {
        message: format!("Doctor account {} has no ward", identity.username),
    })?;
    let doctor = state.queue_manager().doctor_status(ward).await?;
    info!("Doctor {} logged in to the {} ward", identity.username, ward);

    Ok(Json(DoctorLoginResponse {
        username: identity.username,
        ward,
        doctor,
    }))
}

pub async fn reception_login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<ReceptionLoginResponse> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;

    let identity = match state
        .authenticator()
        .authenticate_receptionist(&request.username, &request.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) => return Err(login_failed(&state, e)),
    };
    info!("Reception user {} logged in", identity.username);

    Ok(Json(ReceptionLoginResponse {
        username: identity.username,
        role: identity.role,
        message: RECEPTION_LOGIN_MESSAGE.to_string(),
    }))
}

fn login_failed(state: &AppState, error: anyhow::Error) -> ApiError {
    let error = ApiError::from(error);
    if error.is_invalid_credentials() {
        state.metrics_collector().record_login_failure();
    }
    error
}

/// Server-sent stream of queue events, optionally limited to one ward
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let filter = match query.ward.as_deref().map(str::trim) {
        Some(ward) if !ward.is_empty() => Some(parse_ward(ward)?),
        _ => None,
    };

    let publisher = state.event_publisher();
    let receiver = publisher.subscribe();
    info!(
        "Display subscribed to events (ward: {}), {} subscribers",
        filter.map_or("all", |w| w.as_str()),
        publisher.subscriber_count()
    );

    let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(envelope) => {
            if filter.is_some_and(|ward| envelope.event.ward() != ward) {
                return None;
            }
            match envelope.to_json() {
                Ok(data) => Some(Ok(Event::default()
                    .event(envelope.event.kind())
                    .id(envelope.event_id.to_string())
                    .data(data))),
                Err(e) => {
                    warn!("Dropping event {}: {}", envelope.event_id, e);
                    None
                }
            }
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Event subscriber lagged, skipped {} events", skipped);
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Statistics board: total served today plus per-ward figures
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatsResponse> {
    debug!("Stats endpoint requested");
    let stats = state.queue_manager().stats().await?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Lightweight health check endpoint handler
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = match HealthCheck::liveness_check(state.clone()).await {
        Ok(status) => status,
        Err(e) => {
            error!("Liveness check failed: {}", e);
            HealthStatus::Unhealthy
        }
    };
    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": state.config().service.name,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint handler
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match HealthCheck::readiness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

/// Liveness check endpoint handler
pub async fn alive_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match HealthCheck::liveness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

/// Prometheus metrics endpoint handler
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    debug!("Metrics endpoint requested");

    let collector = state.metrics_collector();
    collector.update_uptime(state.uptime());

    let metric_families = collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            metrics_output,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (QueueError::validation("x"), StatusCode::BAD_REQUEST),
            (
                QueueError::DuplicateBooking {
                    phone: "1".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                QueueError::TokenNotFound {
                    token: "G1".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                QueueError::UnknownWard {
                    ward: "Cardio".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                QueueError::DoctorOnBreak {
                    ward: "General".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                QueueError::NoArrivedPatients {
                    ward: "General".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (QueueError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (
                QueueError::lock_failed("ward"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
        assert_eq!(
            ApiError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_ward_path_parsing() {
        assert_eq!(parse_ward("orthopedic").unwrap(), Ward::Orthopedic);
        assert_eq!(
            parse_ward("Cardiology").unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }
}
