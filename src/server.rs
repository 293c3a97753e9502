//! HTTP surface: thin plumbing over the query-execution core.
//!
//! Each request independently provisions its own session (and agent where
//! needed); nothing is pooled or shared across requests beyond the immutable
//! configuration.

use crate::agent::SqlAgent;
use crate::assistant;
use crate::config::AppConfig;
use crate::db::{DbSession, DEFAULT_SCHEMA};
use crate::error::InsightError;
use crate::llm::LlmClient;
use crate::weather;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/connect", get(connect))
        .route("/get_response", post(get_response))
        .route("/weather_data", get(weather_data_params).post(weather_data_body))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

/// Errors cross the HTTP boundary as a 500 with the underlying message.
pub struct ApiError(InsightError);

impl From<InsightError> for ApiError {
    fn from(error: InsightError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct WeatherDataRequest {
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

async fn connect(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let config = &state.config;
    DbSession::connect(
        &config.database_connection_string,
        &config.database_password,
        DEFAULT_SCHEMA,
    )
    .await?;
    Ok(Json(json!({ "status": "connected" })))
}

async fn get_response(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = &state.config;
    info!(question = %request.query, "handling agent query");

    let session = DbSession::connect(
        &config.database_connection_string,
        &config.database_password,
        DEFAULT_SCHEMA,
    )
    .await?;
    let llm = LlmClient::new(config);
    let agent = SqlAgent::new(llm, session);

    let reply = assistant::ask(&agent, &request.query).await?;
    Ok(Json(json!({ "response": reply })))
}

async fn weather_data_params(
    State(state): State<AppState>,
    Query(request): Query<WeatherDataRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    weather_data(state, request).await
}

async fn weather_data_body(
    State(state): State<AppState>,
    Json(request): Json<WeatherDataRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    weather_data(state, request).await
}

async fn weather_data(
    state: AppState,
    request: WeatherDataRequest,
) -> Result<Json<serde_json::Value>, ApiError> {
    let data = weather::fetch_window(
        &state.config,
        request.start_datetime,
        request.end_datetime,
        &request.schema,
    )
    .await?;
    Ok(Json(json!({ "data": data })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_request_defaults_schema() {
        let request: WeatherDataRequest = serde_json::from_value(json!({
            "start_datetime": "2024-01-01T00:00:00",
            "end_datetime": "2024-01-02T00:00:00",
        }))
        .unwrap();
        assert_eq!(request.schema, "dbo");
        assert!(request.start_datetime < request.end_datetime);
    }

    #[test]
    fn weather_request_parses_from_query_string() {
        let request: WeatherDataRequest = serde_urlencoded::from_str(
            "start_datetime=2024-01-01T00:00:00&end_datetime=2024-01-02T00:00:00&schema=telemetry",
        )
        .unwrap();
        assert_eq!(request.schema, "telemetry");
    }
}
