// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use practitioner_cell::models::ScheduleError;
use shared_models::error::AppError;

use crate::models::{
    BookingError, ChooseBranchRequest, ChoosePractitionerRequest, ConfirmSlotRequest,
    RescheduleAppointmentRequest, StartSessionRequest,
};
use crate::state::BookingState;

const DEFAULT_HORIZON_DAYS: u32 = 30;
const MAX_HORIZON_DAYS: u32 = 90;

#[derive(Debug, Deserialize)]
pub struct SessionDatesQuery {
    pub from: Option<NaiveDate>,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SessionSlotsQuery {
    pub date: NaiveDate,
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::SessionNotFound | BookingError::AppointmentNotFound => {
            AppError::NotFound(e.to_string())
        }
        BookingError::InvalidTransition(_)
        | BookingError::PractitionerNotAtBranch
        | BookingError::DateNotWorkable { .. }
        | BookingError::InvalidSlot { .. }
        | BookingError::InvalidStatusTransition(_) => AppError::BadRequest(e.to_string()),
        BookingError::SlotTaken { .. } => AppError::Conflict(e.to_string()),
        BookingError::ReservationNotHeld => AppError::Internal(e.to_string()),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
        BookingError::Schedule(inner) => match inner {
            ScheduleError::BranchNotFound
            | ScheduleError::PractitionerNotFound
            | ScheduleError::ScheduleNotFound => AppError::NotFound(inner.to_string()),
            ScheduleError::InvalidWorkingHours { .. } => AppError::Internal(inner.to_string()),
            ScheduleError::DatabaseError(msg) => AppError::Database(msg),
        },
    }
}

// ==============================================================================
// SESSION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<Arc<BookingState>>,
    Json(payload): Json<StartSessionRequest>,
) -> (StatusCode, Json<Value>) {
    let session = state.sessions.start_session(payload.patient_id);
    (StatusCode::CREATED, Json(json!({ "session": session })))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .sessions
        .get_view(session_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "session": session })))
}

#[axum::debug_handler]
pub async fn choose_branch(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<ChooseBranchRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .sessions
        .choose_branch(session_id, payload.branch_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "session": session })))
}

#[axum::debug_handler]
pub async fn choose_practitioner(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<ChoosePractitionerRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .sessions
        .choose_practitioner(session_id, payload.practitioner_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "session": session })))
}

/// Workable dates for the session's practitioner, defaulting to the 30
/// days starting tomorrow.
#[axum::debug_handler]
pub async fn get_session_dates(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionDatesQuery>,
) -> Result<Json<Value>, AppError> {
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

    let dates = state
        .sessions
        .workable_dates(session_id, from, horizon_days)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "from": from,
        "horizon_days": horizon_days,
        "dates": dates
    })))
}

/// The day's slots with live reservation state.
#[axum::debug_handler]
pub async fn get_session_slots(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .sessions
        .day_slots(session_id, query.date)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "date": query.date,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn confirm_session(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<ConfirmSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .sessions
        .confirm(session_id, payload.date, payload.time)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "session": session })))
}

#[axum::debug_handler]
pub async fn abandon_session(
    State(state): State<Arc<BookingState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .sessions
        .abandon(session_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "session": session })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking()
        .get_appointment(appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking()
        .cancel_appointment(appointment_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking()
        .reschedule_appointment(appointment_id, payload.new_date, payload.new_time)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}
