use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info};
use uuid::Uuid;
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient, SupabaseError};

use crate::models::{
    AppointmentError, AppointmentRules, ConsultationNote, ConsultationNoteWithParties,
    NewConsultationNote,
};

const NOTE_PATIENT_EMBED: &str = "patient:users!consultation_notes_patient_id_fkey(id,first_name,last_name,email,phone_number)";
const NOTE_DOCTOR_EMBED: &str = "doctor:users!consultation_notes_doctor_id_fkey(id,first_name,last_name,email,phone_number)";

/// Free-text notes a doctor attaches to an appointment.
pub struct ConsultationNoteService {
    supabase: Arc<SupabaseClient>,
    rules: AppointmentRules,
}

impl ConsultationNoteService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            rules: AppointmentRules::default(),
        }
    }

    pub async fn add_note(
        &self,
        note: NewConsultationNote,
        auth_token: &str,
    ) -> Result<ConsultationNote, AppointmentError> {
        self.rules.check_note(&note.notes)?;
        debug!("Adding consultation note to appointment {}", note.appointment_id);

        let note_data = json!({
            "appointment_id": note.appointment_id,
            "doctor_id": note.doctor_id,
            "patient_id": note.patient_id,
            "notes": note.notes,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<ConsultationNote> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/consultation_notes",
            Some(auth_token),
            Some(note_data),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to add note to appointment {}: {}", note.appointment_id, e);
            e
        })?;

        let created = result.into_iter().next().ok_or_else(|| SupabaseError::Api {
            status: 201,
            message: "Insert into consultation_notes returned no rows".to_string(),
        })?;

        info!("Consultation note {} added to appointment {}", created.id, created.appointment_id);
        Ok(created)
    }

    /// Rewrites the note text. `Ok(None)` if the note no longer exists.
    pub async fn update_note(
        &self,
        note: &ConsultationNote,
        auth_token: &str,
    ) -> Result<Option<ConsultationNote>, AppointmentError> {
        note.validate(&self.rules)?;

        let path = format!("/rest/v1/consultation_notes?id=eq.{}", note.id);
        let result: Vec<ConsultationNote> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "notes": note.notes,
                "updated_at": Utc::now().to_rfc3339()
            })),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to update consultation note {}: {}", note.id, e);
            e
        })?;

        Ok(result.into_iter().next())
    }

    pub async fn delete_note(&self, note_id: Uuid, auth_token: &str) -> Result<bool, AppointmentError> {
        let path = format!("/rest/v1/consultation_notes?id=eq.{}", note_id);
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to delete consultation note {}: {}", note_id, e);
            e
        })?;

        if deleted.is_empty() {
            debug!("Consultation note {} not found, nothing deleted", note_id);
            return Ok(false);
        }

        info!("Consultation note {} deleted", note_id);
        Ok(true)
    }

    pub async fn get_note(&self, note_id: Uuid, auth_token: &str) -> Result<Option<ConsultationNote>, AppointmentError> {
        let path = format!("/rest/v1/consultation_notes?id=eq.{}", note_id);
        let result: Vec<ConsultationNote> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to fetch consultation note {}: {}", note_id, e);
            e
        })?;

        Ok(result.into_iter().next())
    }

    /// Notes on one appointment, oldest first.
    pub async fn list_notes_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ConsultationNote>, AppointmentError> {
        let path = format!(
            "/rest/v1/consultation_notes?appointment_id=eq.{}&order=created_at.asc",
            appointment_id
        );
        let notes: Vec<ConsultationNote> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to list notes for appointment {}: {}", appointment_id, e);
            e
        })?;

        Ok(notes)
    }

    /// A patient's notes across appointments, oldest first, with the authoring doctor.
    pub async fn list_notes_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ConsultationNoteWithParties>, AppointmentError> {
        let path = format!(
            "/rest/v1/consultation_notes?patient_id=eq.{}&select=*,{}&order=created_at.asc",
            patient_id, NOTE_DOCTOR_EMBED
        );
        let notes: Vec<ConsultationNoteWithParties> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to list notes for patient {}: {}", patient_id, e);
            e
        })?;

        debug!("Found {} notes for patient {}", notes.len(), patient_id);
        Ok(notes)
    }

    /// Notes a doctor has written, newest first.
    pub async fn list_notes_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ConsultationNoteWithParties>, AppointmentError> {
        let path = format!(
            "/rest/v1/consultation_notes?doctor_id=eq.{}&select=*,{},{}&order=created_at.desc",
            doctor_id, NOTE_PATIENT_EMBED, NOTE_DOCTOR_EMBED
        );
        let notes: Vec<ConsultationNoteWithParties> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await.map_err(|e| {
            error!("Failed to list notes by doctor {}: {}", doctor_id, e);
            e
        })?;

        debug!("Found {} notes by doctor {}", notes.len(), doctor_id);
        Ok(notes)
    }
}
