// libs/appointment-cell/src/services/booking.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient, SupabaseError};
use directory_cell::services::DoctorProfileService;

use crate::models::{
    Appointment, AppointmentError, AppointmentRules, AppointmentStatus, AppointmentWithParties,
    CreateAppointmentRequest, CANCEL_COMPLETED_MESSAGE, DOCTOR_UNAVAILABLE_MESSAGE, SLOT_TAKEN_MESSAGE,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;

const PATIENT_EMBED: &str = "patient:users!appointments_patient_id_fkey(id,first_name,last_name,email,phone_number)";
const DOCTOR_EMBED: &str = "doctor:users!appointments_doctor_id_fkey(id,first_name,last_name,email,phone_number)";

/// Sole writer of appointment state.
pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    doctor_profiles: DoctorProfileService,
    rules: AppointmentRules,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let rules = AppointmentRules {
            strict_status_transitions: config.strict_status_transitions,
            ..AppointmentRules::default()
        };
        Self::with_rules(config, rules)
    }

    pub fn with_rules(config: &AppConfig, rules: AppointmentRules) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::new(),
            doctor_profiles: DoctorProfileService::with_client(Arc::clone(&supabase)),
            supabase,
            rules,
        }
    }

    /// Books a new `scheduled` appointment.
    ///
    /// Only doctors with an approved profile can be booked. Fails with `Conflict` when the
    /// doctor already holds an active appointment at the exact same instant, whether found
    /// up front or reported by the store's unique index.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {} at {}",
              request.patient_id, request.doctor_id, request.appointment_date);

        request.validate(&self.rules)?;

        let profile = self.doctor_profiles
            .get_doctor_profile(request.doctor_id, auth_token)
            .await?
            .map(|details| details.profile)
            .filter(|profile| profile.is_approved);
        let profile = match profile {
            Some(profile) => profile,
            None => {
                warn!("Booking rejected: doctor {} has no approved profile", request.doctor_id);
                return Err(AppointmentError::Validation(DOCTOR_UNAVAILABLE_MESSAGE.to_string()));
            }
        };

        if let Some(existing) = self.conflict_service
            .find_conflict(request.doctor_id, request.appointment_date, None, auth_token)
            .await?
        {
            warn!("Booking rejected: doctor {} slot {} held by {}",
                  request.doctor_id, request.appointment_date, existing);
            return Err(AppointmentError::Conflict(SLOT_TAKEN_MESSAGE.to_string()));
        }

        let consultation_fee = request.consultation_fee.or(profile.consultation_fee);

        let appointment_data = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "appointment_date": request.appointment_date.to_rfc3339(),
            "reason": request.reason.trim(),
            "symptoms": request.symptoms,
            "status": AppointmentStatus::Scheduled,
            "consultation_fee": consultation_fee,
            "is_paid": false,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(appointment_data),
            Some(return_representation()),
        ).await.map_err(|e| self.slot_error(e, request.doctor_id))?;

        let appointment = result.into_iter().next().ok_or_else(|| SupabaseError::Api {
            status: 201,
            message: "Insert into appointments returned no rows".to_string(),
        })?;

        info!("Created appointment {} for patient {} with doctor {}",
              appointment.id, appointment.patient_id, appointment.doctor_id);
        Ok(appointment)
    }

    /// Persists the editable fields of `appointment` and stamps `updated_at`.
    ///
    /// Status, cancellation and completion fields are owned by `cancel_appointment` and
    /// `update_status` and are not written here. Returns `Ok(None)` if the row is gone.
    pub async fn update_appointment(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Updating appointment: {}", appointment.id);

        appointment.validate(&self.rules)?;

        if appointment.status.blocks_slot() {
            if let Some(existing) = self.conflict_service
                .find_conflict(appointment.doctor_id, appointment.appointment_date, Some(appointment.id), auth_token)
                .await?
            {
                warn!("Update of {} rejected: slot held by {}", appointment.id, existing);
                return Err(AppointmentError::Conflict(SLOT_TAKEN_MESSAGE.to_string()));
            }
        }

        let update_data = json!({
            "appointment_date": appointment.appointment_date.to_rfc3339(),
            "reason": appointment.reason,
            "symptoms": appointment.symptoms,
            "basic_consultation_notes": appointment.basic_consultation_notes,
            "consultation_fee": appointment.consultation_fee,
            "is_paid": appointment.is_paid,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
            Some(return_representation()),
        ).await.map_err(|e| self.slot_error(e, appointment.doctor_id))?;

        let updated = result.into_iter().next();
        match &updated {
            Some(_) => info!("Appointment {} updated", appointment.id),
            None => debug!("Appointment {} not found, nothing updated", appointment.id),
        }

        Ok(updated)
    }

    /// Cancels an appointment. `Ok(false)` if it does not exist; `InvalidState` if it is
    /// completed, in which case the record is left unchanged.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        cancelled_by: &str,
        reason: Option<&str>,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let current = match self.find_appointment(appointment_id, auth_token).await? {
            Some(appointment) => appointment,
            None => return Ok(false),
        };

        self.rules.check_cancellation_reason(reason)?;

        if !self.lifecycle_service.can_cancel(&current.status) {
            warn!("Refused to cancel completed appointment {}", appointment_id);
            return Err(AppointmentError::InvalidState(CANCEL_COMPLETED_MESSAGE.to_string()));
        }

        let cancellation = json!({
            "status": AppointmentStatus::Cancelled,
            "cancelled_by": cancelled_by,
            "cancellation_reason": reason,
            "updated_at": Utc::now().to_rfc3339()
        });

        // Conditional on the row not having been completed in the meantime.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=neq.completed", appointment_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(cancellation),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to cancel appointment {}: {}", appointment_id, e);
            e
        })?;

        if result.is_empty() {
            return match self.find_appointment(appointment_id, auth_token).await? {
                Some(latest) if latest.status == AppointmentStatus::Completed => {
                    warn!("Appointment {} completed before it could be cancelled", appointment_id);
                    Err(AppointmentError::InvalidState(CANCEL_COMPLETED_MESSAGE.to_string()))
                }
                _ => Ok(false),
            };
        }

        info!("Appointment {} cancelled by {}", appointment_id, cancelled_by);
        Ok(true)
    }

    /// Moves an appointment to `new_status`, stamping `completed_at` when it completes.
    ///
    /// Any target is accepted unless strict transitions are enabled, in which case the
    /// lifecycle graph applies and the write only lands if the status is still the one read.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        debug!("Setting appointment {} status to {}", appointment_id, new_status);

        let now = Utc::now().to_rfc3339();
        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(new_status));
        update_data.insert("updated_at".to_string(), json!(now));
        if new_status == AppointmentStatus::Completed {
            update_data.insert("completed_at".to_string(), json!(now));
        }

        let mut path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut observed = None;

        if self.rules.strict_status_transitions {
            let current = match self.find_appointment(appointment_id, auth_token).await? {
                Some(appointment) => appointment,
                None => return Ok(false),
            };
            self.lifecycle_service.validate_status_transition(&current.status, &new_status)?;
            path.push_str(&format!("&status=eq.{}", current.status));
            observed = Some(current.status);
        }

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to update status of appointment {}: {}", appointment_id, e);
            e
        })?;

        if result.is_empty() {
            if let Some(previous) = observed {
                if self.find_appointment(appointment_id, auth_token).await?.is_some() {
                    warn!("Appointment {} changed from {} concurrently", appointment_id, previous);
                    return Err(AppointmentError::InvalidState(format!(
                        "Appointment is no longer {}",
                        previous
                    )));
                }
            }
            debug!("Appointment {} not found, status unchanged", appointment_id);
            return Ok(false);
        }

        info!("Appointment {} status set to {}", appointment_id, new_status);
        Ok(true)
    }

    /// Appointment with both parties attached.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<AppointmentWithParties>, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&select=*,{},{}",
            appointment_id, PATIENT_EMBED, DOCTOR_EMBED
        );
        let result: Vec<AppointmentWithParties> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to fetch appointment {}: {}", appointment_id, e);
            e
        })?;

        Ok(result.into_iter().next())
    }

    /// The bare appointment row.
    pub async fn find_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to read appointment {}: {}", appointment_id, e);
            e
        })?;

        Ok(result.into_iter().next())
    }

    /// A patient's appointments, newest first, with the doctor attached.
    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithParties>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&select=*,{}&order=appointment_date.desc",
            patient_id, DOCTOR_EMBED
        );
        let appointments: Vec<AppointmentWithParties> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to list appointments for patient {}: {}", patient_id, e);
            e
        })?;

        debug!("Found {} appointments for patient {}", appointments.len(), patient_id);
        Ok(appointments)
    }

    /// A doctor's appointments, newest first, with the patient attached.
    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithParties>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&select=*,{}&order=appointment_date.desc",
            doctor_id, PATIENT_EMBED
        );
        let appointments: Vec<AppointmentWithParties> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to list appointments for doctor {}: {}", doctor_id, e);
            e
        })?;

        debug!("Found {} appointments for doctor {}", appointments.len(), doctor_id);
        Ok(appointments)
    }

    pub async fn list_all(&self, auth_token: &str) -> Result<Vec<AppointmentWithParties>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?select=*,{},{}&order=appointment_date.desc",
            PATIENT_EMBED, DOCTOR_EMBED
        );
        let appointments: Vec<AppointmentWithParties> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to list all appointments: {}", e);
            e
        })?;

        Ok(appointments)
    }

    pub async fn check_conflict(
        &self,
        doctor_id: Uuid,
        at: chrono::DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<Uuid>, AppointmentError> {
        self.conflict_service.find_conflict(doctor_id, at, exclude_appointment_id, auth_token).await
    }

    /// Maps a lost race on the slot index to `Conflict`.
    fn slot_error(&self, err: SupabaseError, doctor_id: Uuid) -> AppointmentError {
        if err.is_unique_violation() {
            warn!("Store rejected double booking for doctor {}: {}", doctor_id, err);
            AppointmentError::Conflict(SLOT_TAKEN_MESSAGE.to_string())
        } else {
            error!("Appointment write for doctor {} failed: {}", doctor_id, err);
            AppointmentError::Database(err)
        }
    }
}
