//! Google Sheets Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_validator::timestamp::format_timestamp;
use serde::Serialize;
use serde_json::json;
use storage::ConnectionStatus;
use tracing::{error, info};

use crate::config::SheetsConfigStatus;
use crate::SharedState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetStatusResponse {
    #[serde(flatten)]
    pub status: ConnectionStatus,
    pub config_status: SheetsConfigStatus,
    pub timestamp: String,
}

/// Write the header row if the sheet does not have one yet
pub async fn init_sheet(State(state): State<SharedState>) -> Response {
    let Some(store) = state.store.as_ref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Google Sheets not configured. Please check environment variables." })),
        )
            .into_response();
    };

    match store.initialize().await {
        Ok(()) => {
            info!("Store initialized ({})", store.backend());
            Json(json!({
                "success": true,
                "message": "Google Sheet initialized successfully with headers for flood detection data",
                "timestamp": now(),
            }))
            .into_response()
        }
        Err(e) => {
            error!("Error initializing store: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to initialize Google Sheet: {}", e) })),
            )
                .into_response()
        }
    }
}

/// Connection check plus which credentials are configured
pub async fn sheet_status(State(state): State<SharedState>) -> Json<SheetStatusResponse> {
    let status = match state.store.as_ref() {
        Some(store) => store.connection_status().await,
        None => ConnectionStatus::failed(
            None,
            "Google Sheets not configured. Missing environment variables.",
        ),
    };

    Json(SheetStatusResponse {
        status,
        config_status: state.sheets_status,
        timestamp: now(),
    })
}

fn now() -> String {
    format_timestamp(&chrono::Utc::now())
}
