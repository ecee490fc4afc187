use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::AppError,
    services::campaign_store::{CampaignOverview, MeasurementRecord, SummaryRecord},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/campaigns", get(list_campaigns))
        .route("/api/campaign/:campaign_id", get(campaign_detail))
}

#[derive(Debug, Serialize)]
pub struct CampaignListResponse {
    ok: bool,
    campaigns: Vec<CampaignOverview>,
}

#[derive(Debug, Serialize)]
pub struct CampaignDetailResponse {
    ok: bool,
    summaries: Vec<SummaryRecord>,
    measurements: Vec<MeasurementRecord>,
}

async fn list_campaigns(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CampaignListResponse>, AppError> {
    let store = state.store.clone();
    let campaigns = tokio::task::spawn_blocking(move || store.list_campaigns()).await??;
    tracing::debug!("Returning {} campaigns", campaigns.len());

    Ok(Json(CampaignListResponse {
        ok: true,
        campaigns,
    }))
}

async fn campaign_detail(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<i64>,
) -> Result<Json<CampaignDetailResponse>, AppError> {
    let store = state.store.clone();
    let detail = tokio::task::spawn_blocking(move || store.campaign_detail(campaign_id))
        .await??
        .ok_or_else(|| AppError::NotFound(format!("campaign {}", campaign_id)))?;

    Ok(Json(CampaignDetailResponse {
        ok: true,
        summaries: detail.summaries,
        measurements: detail.measurements,
    }))
}
