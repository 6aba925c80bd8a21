//! Dashboard Routes

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use crate::dashboard::Dashboard;
use crate::error::ApiError;
use crate::SharedState;

/// Query parameters for the dashboard endpoint
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// 1-based table page
    #[serde(default = "default_page")]
    pub page: usize,
}

fn default_page() -> usize {
    1
}

/// Dashboard view-model over the most recent readings
pub async fn get_dashboard(
    State(state): State<SharedState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Result<Json<Dashboard>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let readings = state
        .require_store()?
        .list_recent(state.recent_limit)
        .await?;

    Ok(Json(Dashboard::build(&readings, params.page)))
}
