//! Admin Handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::domain::ResourceClass;
use crate::retention::SweepReport;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Run one retention cycle for a class now and return its report.
///
/// Honors the same shutdown signal as the scheduled workers.
pub async fn run_retention(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<Json<SweepReport>, AppError> {
    let class: ResourceClass = class.parse().map_err(AppError::BadRequest)?;

    tracing::info!(class = %class, "Retention cycle triggered on demand");
    let report = state.sweeper.run_cycle(class, state.shutdown.clone()).await?;
    Ok(Json(report))
}
