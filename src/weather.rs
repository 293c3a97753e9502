//! Windowed extract reader for the curated weather table.
//!
//! A direct, parameterized, time-bounded read that bypasses the reasoning
//! agent. The schema identifier is a trusted configuration value and is
//! interpolated as a quoted identifier; identifiers cannot be bound by the
//! query protocol. The timestamp bounds are bound parameters.

use crate::config::AppConfig;
use crate::db::build_connection_string;
use crate::error::{InsightError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;

/// One observation from the curated weather table. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherRecord {
    pub temperature: f64,
    pub wind_speed: f64,
    pub sun_shine: f64,
    pub time: NaiveDateTime,
}

pub(crate) fn window_query(schema: &str) -> String {
    format!(
        "SELECT temperature, wind_speed, sun_shine, time \
         FROM \"{}\".curated_weather_data \
         WHERE time >= $1 AND time <= $2 \
         ORDER BY time",
        schema
    )
}

/// Fetch every record whose observation time lies in the inclusive window
/// `[start, end]`, ascending by time. An inverted window yields an empty
/// result, not an error. Any execution failure is a `Query` error with no
/// partial rows; the scoped connection is released on every exit path.
pub async fn fetch_window(
    config: &AppConfig,
    start: NaiveDateTime,
    end: NaiveDateTime,
    schema: &str,
) -> Result<Vec<WeatherRecord>> {
    let url = build_connection_string(
        &config.database_connection_string,
        &config.database_password,
    )
    .map_err(|e| InsightError::Query(e.to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .map_err(|e| InsightError::Query(format!("failed to open database engine: {}", e)))?;

    let result = sqlx::query_as::<_, WeatherRecord>(&window_query(schema))
        .bind(start)
        .bind(end)
        .fetch_all(&pool)
        .await;

    pool.close().await;

    result.map_err(|e| InsightError::Query(e.to_string()))
}
