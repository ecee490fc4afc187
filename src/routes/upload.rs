use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::AppError,
    services::{
        excel::loader::load_workbook_from_bytes,
        file_processor::{persist_campaigns, process_workbook, UploadReport},
    },
    AppState,
};

const FILE_FIELD: &str = "file";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload_workbook))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    ok: bool,
    report: UploadReport,
}

async fn upload_workbook(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let start = std::time::Instant::now();

    let mut file_data: Option<Bytes> = None;
    // Bodies over the configured limit fail here with 413.
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("<unnamed>").to_string();
        let data = field.bytes().await?;
        tracing::info!("Received {} ({}KB)", file_name, data.len() / 1024);
        file_data = Some(data);
        break;
    }

    let file_data = file_data
        .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;

    let timestamp_seed = chrono::Utc::now().timestamp_millis();
    let store = state.store.clone();
    let report = tokio::task::spawn_blocking(move || -> Result<UploadReport, AppError> {
        let workbook = load_workbook_from_bytes(file_data)?;
        let extraction = process_workbook(workbook, timestamp_seed);
        Ok(persist_campaigns(&store, extraction))
    })
    .await??;

    tracing::info!(
        "Upload finished in {:?}: {}/{} sheets created",
        start.elapsed(),
        report.created,
        report.total_sheets
    );

    Ok(Json(UploadResponse { ok: true, report }))
}
