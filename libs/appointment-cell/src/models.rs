// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use directory_cell::models::{DirectoryError, UserSummary};
use shared_database::SupabaseError;
use shared_utils::validation::{limit_optional_text, require_text};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub reason: String,
    pub symptoms: Option<String>,
    pub basic_consultation_notes: Option<String>,
    pub status: AppointmentStatus,
    pub consultation_fee: Option<f64>,
    pub is_paid: bool,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn validate(&self, rules: &AppointmentRules) -> Result<(), AppointmentError> {
        rules.check_reason(&self.reason)?;
        rules.check_symptoms(self.symptoms.as_deref())?;
        limit_optional_text(
            "basic_consultation_notes",
            self.basic_consultation_notes.as_deref(),
            rules.max_consultation_notes_length,
        )
        .and_then(|_| limit_optional_text(
            "cancellation_reason",
            self.cancellation_reason.as_deref(),
            rules.max_cancellation_reason_length,
        ))
        .map_err(AppointmentError::Validation)?;
        rules.check_fee(self.consultation_fee)
    }

    pub fn parties(&self) -> [Uuid; 2] {
        [self.patient_id, self.doctor_id]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Whether an appointment in this status holds its doctor's time slot.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An appointment with its patient and/or doctor embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentWithParties {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<UserSummary>,
}

// ==============================================================================
// CONSULTATION NOTES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultationNote {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConsultationNote {
    pub fn validate(&self, rules: &AppointmentRules) -> Result<(), AppointmentError> {
        rules.check_note(&self.notes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConsultationNote {
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsultationNoteWithParties {
    #[serde(flatten)]
    pub note: ConsultationNote,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<UserSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddNoteRequest {
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNoteRequest {
    pub notes: String,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub reason: String,
    pub symptoms: Option<String>,
    /// Falls back to the doctor's profile fee when absent.
    pub consultation_fee: Option<f64>,
}

impl CreateAppointmentRequest {
    pub fn validate(&self, rules: &AppointmentRules) -> Result<(), AppointmentError> {
        rules.check_reason(&self.reason)?;
        rules.check_symptoms(self.symptoms.as_deref())?;
        rules.check_fee(self.consultation_fee)
    }
}

/// Partial edit of an appointment's mutable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub basic_consultation_notes: Option<String>,
    pub consultation_fee: Option<f64>,
    pub is_paid: Option<bool>,
}

impl UpdateAppointmentRequest {
    pub fn apply_to(self, appointment: &mut Appointment) {
        if let Some(date) = self.appointment_date {
            appointment.appointment_date = date;
        }
        if let Some(reason) = self.reason {
            appointment.reason = reason;
        }
        if self.symptoms.is_some() {
            appointment.symptoms = self.symptoms;
        }
        if self.basic_consultation_notes.is_some() {
            appointment.basic_consultation_notes = self.basic_consultation_notes;
        }
        if self.consultation_fee.is_some() {
            appointment.consultation_fee = self.consultation_fee;
        }
        if let Some(paid) = self.is_paid {
            appointment.is_paid = paid;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointment_id: Option<Uuid>,
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct AppointmentRules {
    pub max_reason_length: usize,
    pub max_symptoms_length: usize,
    pub max_consultation_notes_length: usize,
    pub max_cancellation_reason_length: usize,
    pub max_note_length: usize,
    /// Fees are stored as numeric(18,2).
    pub max_consultation_fee: f64,
    pub strict_status_transitions: bool,
}

impl Default for AppointmentRules {
    fn default() -> Self {
        Self {
            max_reason_length: 200,
            max_symptoms_length: 1000,
            max_consultation_notes_length: 1000,
            max_cancellation_reason_length: 500,
            max_note_length: 2000,
            max_consultation_fee: 1e16,
            strict_status_transitions: false,
        }
    }
}

impl AppointmentRules {
    pub fn check_reason(&self, reason: &str) -> Result<(), AppointmentError> {
        require_text("reason", reason, self.max_reason_length).map_err(AppointmentError::Validation)
    }

    pub fn check_symptoms(&self, symptoms: Option<&str>) -> Result<(), AppointmentError> {
        limit_optional_text("symptoms", symptoms, self.max_symptoms_length).map_err(AppointmentError::Validation)
    }

    pub fn check_cancellation_reason(&self, reason: Option<&str>) -> Result<(), AppointmentError> {
        limit_optional_text("cancellation_reason", reason, self.max_cancellation_reason_length)
            .map_err(AppointmentError::Validation)
    }

    pub fn check_note(&self, notes: &str) -> Result<(), AppointmentError> {
        require_text("notes", notes, self.max_note_length).map_err(AppointmentError::Validation)
    }

    pub fn check_fee(&self, fee: Option<f64>) -> Result<(), AppointmentError> {
        match fee {
            Some(amount) if !amount.is_finite() || amount < 0.0 || amount >= self.max_consultation_fee => {
                Err(AppointmentError::Validation(
                    "consultation_fee must be a non-negative amount".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] SupabaseError),
}

impl From<DirectoryError> for AppointmentError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Conflict(msg) => AppointmentError::Conflict(msg),
            DirectoryError::Validation(msg) => AppointmentError::Validation(msg),
            DirectoryError::Database(e) => AppointmentError::Database(e),
        }
    }
}

pub const SLOT_TAKEN_MESSAGE: &str = "Doctor already has an appointment at this time.";
pub const CANCEL_COMPLETED_MESSAGE: &str = "Cannot cancel a completed appointment.";
pub const DOCTOR_UNAVAILABLE_MESSAGE: &str = "Doctor is not available for booking.";

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn booking(reason: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            appointment_date: Utc::now(),
            reason: reason.to_string(),
            symptoms: None,
            consultation_fee: Some(50.0),
        }
    }

    #[test]
    fn status_wire_form_is_snake_case() {
        assert_eq!(serde_json::to_value(AppointmentStatus::InProgress).unwrap(), "in_progress");
        assert_eq!(
            serde_json::from_str::<AppointmentStatus>("\"no_show\"").unwrap(),
            AppointmentStatus::NoShow
        );
        assert_eq!(AppointmentStatus::NoShow.to_string(), "no_show");
    }

    #[test]
    fn only_cancelled_and_no_show_release_the_slot() {
        assert!(AppointmentStatus::Scheduled.blocks_slot());
        assert!(AppointmentStatus::Completed.blocks_slot());
        assert!(!AppointmentStatus::Cancelled.blocks_slot());
        assert!(!AppointmentStatus::NoShow.blocks_slot());
    }

    #[test]
    fn reason_is_required_and_bounded() {
        let rules = AppointmentRules::default();

        assert!(booking("Checkup").validate(&rules).is_ok());
        assert!(booking(&"r".repeat(200)).validate(&rules).is_ok());
        assert_matches!(booking("").validate(&rules), Err(AppointmentError::Validation(_)));
        assert_matches!(
            booking(&"r".repeat(201)).validate(&rules),
            Err(AppointmentError::Validation(msg)) if msg.starts_with("reason")
        );
    }

    #[test]
    fn symptoms_limit() {
        let rules = AppointmentRules::default();
        let mut request = booking("Checkup");
        request.symptoms = Some("s".repeat(1001));

        assert_matches!(request.validate(&rules), Err(AppointmentError::Validation(_)));
    }

    #[test]
    fn notes_must_not_be_blank() {
        let rules = AppointmentRules::default();
        assert!(rules.check_note("Follow up in two weeks").is_ok());
        assert!(rules.check_note("  ").is_err());
        assert!(rules.check_note(&"n".repeat(2001)).is_err());
    }

    #[test]
    fn partial_update_leaves_status_alone() {
        let mut appointment: Appointment = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "appointment_date": "2026-03-01T09:00:00Z",
            "reason": "Checkup",
            "symptoms": null,
            "basic_consultation_notes": null,
            "status": "confirmed",
            "consultation_fee": null,
            "is_paid": false,
            "cancelled_by": null,
            "cancellation_reason": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": null,
            "completed_at": null
        }))
        .unwrap();

        UpdateAppointmentRequest {
            reason: Some("Follow-up".to_string()),
            is_paid: Some(true),
            ..Default::default()
        }
        .apply_to(&mut appointment);

        assert_eq!(appointment.reason, "Follow-up");
        assert!(appointment.is_paid);
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    }
}
