//! HTTP surface: on-demand route computation and driver location reports.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::RouteError;
use crate::model::{Coordinate, Motion, Route};
use crate::service::RouteService;
use crate::traits::PositionSink;

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteService>,
    pub sink: Arc<dyn PositionSink>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/drivers/{entity_id}/route", get(get_route))
        .route(
            "/drivers/{entity_id}/location",
            axum::routing::post(report_location).delete(report_offline),
        )
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
}

impl From<RouteError> for ApiError {
    fn from(error: RouteError) -> Self {
        match error {
            RouteError::NoPosition(_) => ApiError::NotFound(error.to_string()),
            RouteError::FetchFailed(_) => ApiError::BadGateway(error.to_string()),
            RouteError::InvalidCoordinate { .. } | RouteError::MalformedEvent(_) => {
                ApiError::BadRequest(error.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::BadGateway(message) => (StatusCode::BAD_GATEWAY, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn get_route(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<Route>, ApiError> {
    match state.routes.compute_route(&entity_id).await {
        Ok(route) => Ok(Json(route)),
        Err(err) => {
            tracing::warn!(entity_id = %entity_id, error = %err, "route request failed");
            Err(err.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocationReport {
    lat: f64,
    lng: f64,
    heading: Option<f64>,
    speed: Option<f64>,
}

async fn report_location(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    body: Result<Json<LocationReport>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(report) = body.map_err(|rejection| {
        ApiError::BadRequest(format!(
            "latitude and longitude must be numbers: {}",
            rejection.body_text()
        ))
    })?;
    let coordinate = Coordinate::new(report.lat, report.lng)?;
    let motion = Motion {
        heading: report.heading,
        speed: report.speed,
    };

    state
        .sink
        .report_position(&entity_id, coordinate, motion)
        .await
        .map_err(RouteError::from)?;

    Ok(Json(json!({ "success": true })))
}

async fn report_offline(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .sink
        .report_offline(&entity_id)
        .await
        .map_err(RouteError::from)?;

    Ok(StatusCode::NO_CONTENT)
}
