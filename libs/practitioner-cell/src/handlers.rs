// libs/practitioner-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{DaySlotsResponse, ScheduleError, WorkableDatesResponse};
use crate::services::availability::{self, AvailabilityService};
use crate::services::directory::DirectoryService;
use crate::services::slots;

const DEFAULT_HORIZON_DAYS: u32 = 30;
const MAX_HORIZON_DAYS: u32 = 90;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct WorkableDatesQuery {
    pub from: Option<NaiveDate>,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DaySlotsQuery {
    pub date: NaiveDate,
}

fn map_schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::BranchNotFound => AppError::NotFound("Branch not found".to_string()),
        ScheduleError::PractitionerNotFound => {
            AppError::NotFound("Practitioner not found".to_string())
        }
        ScheduleError::ScheduleNotFound => {
            AppError::NotFound("No schedule published for practitioner".to_string())
        }
        ScheduleError::InvalidWorkingHours { .. } => AppError::Internal(e.to_string()),
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// DIRECTORY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_branches(State(state): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);
    let branches = directory.list_branches().await.map_err(map_schedule_error)?;

    Ok(Json(json!({ "branches": branches })))
}

#[axum::debug_handler]
pub async fn list_branch_practitioners(
    State(state): State<Arc<AppConfig>>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let directory = DirectoryService::new(&state);

    // 404 on unknown branch rather than an empty practitioner list
    let branch = directory.get_branch(branch_id).await.map_err(map_schedule_error)?;
    let practitioners = directory
        .list_branch_practitioners(branch_id)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "branch": branch,
        "practitioners": practitioners
    })))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

/// Workable dates over a horizon, defaulting to the 30 days starting
/// tomorrow.
#[axum::debug_handler]
pub async fn get_workable_dates(
    State(state): State<Arc<AppConfig>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<WorkableDatesQuery>,
) -> Result<Json<WorkableDatesResponse>, AppError> {
    let from = query
        .from
        .unwrap_or_else(|| Utc::now().date_naive() + Duration::days(1));
    let horizon_days = query.days.unwrap_or(DEFAULT_HORIZON_DAYS);

    if horizon_days > MAX_HORIZON_DAYS {
        return Err(AppError::BadRequest(format!(
            "Horizon cannot exceed {} days",
            MAX_HORIZON_DAYS
        )));
    }

    let service = AvailabilityService::new(&state);
    let dates = service
        .workable_dates_for(practitioner_id, from, horizon_days)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(WorkableDatesResponse {
        practitioner_id,
        from,
        horizon_days,
        dates,
    }))
}

/// The day's slot grid with peak flags. Reservation state is not known
/// at this layer; the booking session overlays it.
#[axum::debug_handler]
pub async fn get_day_slots(
    State(state): State<Arc<AppConfig>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<DaySlotsQuery>,
) -> Result<Json<DaySlotsResponse>, AppError> {
    let service = AvailabilityService::new(&state);
    let schedule = service
        .get_schedule(practitioner_id)
        .await
        .map_err(map_schedule_error)?;

    match availability::is_workable(&schedule, query.date) {
        Ok(()) => Ok(Json(DaySlotsResponse {
            practitioner_id,
            date: query.date,
            workable: true,
            reason: None,
            slots: slots::generate_slots(&schedule, query.date),
        })),
        Err(reason) => Ok(Json(DaySlotsResponse {
            practitioner_id,
            date: query.date,
            workable: false,
            reason: Some(reason.to_string()),
            slots: vec![],
        })),
    }
}
