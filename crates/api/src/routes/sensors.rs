//! Sensor Routes

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use data_validator::{RawReading, Reading};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::SharedState;

/// Response for the ingest endpoint
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub data: Reading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Accept a reading from a sensor or the dashboard form
///
/// Persistence failures do not fail the request: the reading was valid,
/// so the caller gets it back with a warning.
pub async fn submit_reading(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    metrics::counter!("floodwatch_readings_received_total").increment(1);

    let reading = parse_and_normalize(&state, &headers, &body).inspect_err(|e| {
        metrics::counter!("floodwatch_readings_rejected_total").increment(1);
        warn!("Rejected sensor payload: {}", e);
    })?;

    info!(
        "Received flood sensor reading: {:.1} cm, {}, {}",
        reading.distance(),
        reading.water_level(),
        reading.status()
    );
    metrics::gauge!("floodwatch_last_distance_cm").set(reading.distance());
    if reading.is_alert() {
        metrics::counter!("floodwatch_flood_alerts_total").increment(1);
    }

    let Some(store) = state.store.as_ref() else {
        info!("No store configured - reading received but not persisted");
        return Ok(Json(IngestResponse {
            success: true,
            message: "Sensor data received (Google Sheets not configured)".to_string(),
            data: reading,
            warning: None,
        }));
    };

    let response = match store.append(&reading).await {
        Ok(()) => {
            metrics::counter!("floodwatch_readings_persisted_total").increment(1);
            IngestResponse {
                success: true,
                message: format!("Sensor data saved to {}", store.backend()),
                data: reading,
                warning: None,
            }
        }
        Err(e) => {
            metrics::counter!("floodwatch_storage_errors_total").increment(1);
            error!("Error saving reading: {}", e);
            IngestResponse {
                success: true,
                message: "Sensor data received but not saved".to_string(),
                data: reading,
                warning: Some(format!("Storage integration failed: {}", e)),
            }
        }
    };

    Ok(Json(response))
}

fn parse_and_normalize(
    state: &SharedState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Reading, ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return Err(ApiError::BadRequest(
            "Content-Type must be application/json".to_string(),
        ));
    }

    let payload: Value = serde_json::from_slice(body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON in request body".to_string()))?;

    Ok(state
        .normalizer
        .normalize(&RawReading::from_value(&payload))?)
}

/// Recent readings, newest first
pub async fn list_readings(State(state): State<SharedState>) -> Result<Json<Vec<Reading>>, ApiError> {
    let readings = state
        .require_store()?
        .list_recent(state.recent_limit)
        .await
        .inspect_err(|_| metrics::counter!("floodwatch_storage_errors_total").increment(1))?;

    info!("Fetched {} readings", readings.len());
    Ok(Json(readings))
}

/// The newest reading, or `null` when nothing is stored
pub async fn latest_reading(
    State(state): State<SharedState>,
) -> Result<Json<Option<Reading>>, ApiError> {
    let latest = state.require_store()?.latest().await?;
    Ok(Json(latest))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// Remove every stored reading
pub async fn clear_readings(State(state): State<SharedState>) -> Result<Json<ClearResponse>, ApiError> {
    state.require_store()?.clear().await?;

    warn!("All stored readings cleared");
    Ok(Json(ClearResponse {
        success: true,
        message: "Sensor data cleared".to_string(),
    }))
}
