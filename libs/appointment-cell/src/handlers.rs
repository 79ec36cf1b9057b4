// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::{is_self, require_admin, require_party_or_admin, require_self_or_admin};

use crate::models::{
    AddNoteRequest, AppointmentError, CancelAppointmentRequest, ConflictCheckQuery,
    ConflictCheckResponse, CreateAppointmentRequest, NewConsultationNote, UpdateAppointmentRequest,
    UpdateNoteRequest, UpdateStatusRequest,
};
use crate::services::{AppointmentBookingService, ConsultationNoteService};

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::InvalidState(msg) => AppError::InvalidState(msg),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

fn appointment_not_found() -> AppError {
    AppError::NotFound("Appointment not found".to_string())
}

fn note_not_found() -> AppError {
    AppError::NotFound("Consultation note not found".to_string())
}

/// Recorded as `cancelled_by`.
fn actor_label(user: &User) -> String {
    user.email.clone().unwrap_or_else(|| user.id.clone())
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, request.patient_id, "book appointments for this patient")?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.create_appointment(request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_all(auth.token()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.get_appointment(appointment_id, auth.token()).await?
        .ok_or_else(appointment_not_found)?;
    require_party_or_admin(&user, &appointment.appointment.parties(), "view this appointment")?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let mut appointment = booking_service.find_appointment(appointment_id, auth.token()).await?
        .ok_or_else(appointment_not_found)?;
    require_party_or_admin(&user, &appointment.parties(), "update this appointment")?;

    request.apply_to(&mut appointment);
    let updated = booking_service.update_appointment(&appointment, auth.token()).await?
        .ok_or_else(appointment_not_found)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.find_appointment(appointment_id, auth.token()).await?
        .ok_or_else(appointment_not_found)?;
    require_party_or_admin(&user, &appointment.parties(), "cancel this appointment")?;

    let cancelled = booking_service.cancel_appointment(
        appointment_id,
        &actor_label(&user),
        request.reason.as_deref(),
        auth.token(),
    ).await?;

    if !cancelled {
        return Err(appointment_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.find_appointment(appointment_id, auth.token()).await?
        .ok_or_else(appointment_not_found)?;
    if !user.is_admin() && !is_self(&user, appointment.doctor_id) {
        warn!("User {} attempted to change status of appointment {}", user.id, appointment_id);
        return Err(AppError::Forbidden("Only the appointment's doctor can change its status".to_string()));
    }

    if !booking_service.update_status(appointment_id, request.status, auth.token()).await? {
        return Err(appointment_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "status": request.status,
        "message": format!("Appointment status updated to {}", request.status)
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, patient_id, "view this patient's appointments")?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_for_patient(patient_id, auth.token()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, doctor_id, "view this doctor's appointments")?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_for_doctor(doctor_id, auth.token()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let conflicting = booking_service.check_conflict(
        query.doctor_id,
        query.appointment_date,
        query.exclude_appointment_id,
        auth.token(),
    ).await?;

    Ok(Json(ConflictCheckResponse {
        has_conflict: conflicting.is_some(),
        conflicting_appointment_id: conflicting,
    }))
}

// ==============================================================================
// CONSULTATION NOTE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_consultation_note(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AddNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.find_appointment(appointment_id, auth.token()).await?
        .ok_or_else(appointment_not_found)?;
    if !user.is_admin() && !is_self(&user, appointment.doctor_id) {
        return Err(AppError::Forbidden("Only the appointment's doctor can add notes".to_string()));
    }

    let note_service = ConsultationNoteService::new(&state);
    let note = note_service.add_note(NewConsultationNote {
        appointment_id,
        doctor_id: appointment.doctor_id,
        patient_id: appointment.patient_id,
        notes: request.notes,
    }, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "note": note,
        "message": "Consultation note added"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_notes(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service.find_appointment(appointment_id, auth.token()).await?
        .ok_or_else(appointment_not_found)?;
    require_party_or_admin(&user, &appointment.parties(), "view notes for this appointment")?;

    let note_service = ConsultationNoteService::new(&state);
    let notes = note_service.list_notes_for_appointment(appointment_id, auth.token()).await?;

    Ok(Json(json!({
        "notes": notes,
        "total": notes.len()
    })))
}

#[axum::debug_handler]
pub async fn update_consultation_note(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(note_id): Path<Uuid>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let note_service = ConsultationNoteService::new(&state);

    let mut note = note_service.get_note(note_id, auth.token()).await?
        .ok_or_else(note_not_found)?;
    require_self_or_admin(&user, note.doctor_id, "edit this note")?;

    note.notes = request.notes;
    let updated = note_service.update_note(&note, auth.token()).await?
        .ok_or_else(note_not_found)?;

    Ok(Json(json!({
        "success": true,
        "note": updated,
        "message": "Consultation note updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_consultation_note(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(note_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let note_service = ConsultationNoteService::new(&state);

    let note = note_service.get_note(note_id, auth.token()).await?
        .ok_or_else(note_not_found)?;
    require_self_or_admin(&user, note.doctor_id, "delete this note")?;

    if !note_service.delete_note(note_id, auth.token()).await? {
        return Err(note_not_found());
    }

    Ok(Json(json!({
        "success": true,
        "message": "Consultation note deleted"
    })))
}

#[axum::debug_handler]
pub async fn get_patient_notes(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, patient_id, "view this patient's notes")?;

    let note_service = ConsultationNoteService::new(&state);
    let notes = note_service.list_notes_for_patient(patient_id, auth.token()).await?;

    Ok(Json(json!({
        "notes": notes,
        "total": notes.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_notes(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, doctor_id, "view this doctor's notes")?;

    let note_service = ConsultationNoteService::new(&state);
    let notes = note_service.list_notes_for_doctor(doctor_id, auth.token()).await?;

    Ok(Json(json!({
        "notes": notes,
        "total": notes.len()
    })))
}
