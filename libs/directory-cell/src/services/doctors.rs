use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient, SupabaseError};

use crate::models::{
    CreateDoctorProfileRequest, DirectoryError, DoctorProfile, DoctorProfileDetails, UserRole,
};
use crate::services::{SpecialtyService, UserService};

const PROFILE_SELECT: &str = "select=*,doctor:users!doctor_profiles_doctor_id_fkey(id,first_name,last_name,email,phone_number),specialty:medical_specialties(*)";

pub struct DoctorProfileService {
    supabase: Arc<SupabaseClient>,
    users: UserService,
    specialties: SpecialtyService,
}

impl DoctorProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            users: UserService::with_client(Arc::clone(&supabase)),
            specialties: SpecialtyService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Creates the single profile of a doctor-role user. Profiles start unapproved.
    pub async fn create_doctor_profile(
        &self,
        doctor_id: Uuid,
        request: CreateDoctorProfileRequest,
        auth_token: &str,
    ) -> Result<DoctorProfile, DirectoryError> {
        request.validate()?;
        debug!("Creating doctor profile for {}", doctor_id);

        let doctor = self.users.get_user(doctor_id, auth_token).await?
            .ok_or_else(|| DirectoryError::Validation(format!("User {} does not exist", doctor_id)))?;
        if doctor.role != UserRole::Doctor {
            warn!("Rejected doctor profile for user {} with role {}", doctor_id, doctor.role);
            return Err(DirectoryError::Validation(format!(
                "User {} is not registered as a doctor",
                doctor_id
            )));
        }

        match self.specialties.get_specialty(request.specialty_id, auth_token).await? {
            Some(specialty) if specialty.is_active => {}
            _ => {
                return Err(DirectoryError::Validation(format!(
                    "Unknown medical specialty {}",
                    request.specialty_id
                )));
            }
        }

        let profile_data = json!({
            "doctor_id": doctor_id,
            "specialty_id": request.specialty_id,
            "license_number": request.license_number,
            "qualifications": request.qualifications,
            "experience": request.experience,
            "consultation_fee": request.consultation_fee,
            "is_approved": false,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<DoctorProfile> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_profiles",
            Some(auth_token),
            Some(profile_data),
            Some(return_representation()),
        ).await.map_err(|e| {
            if e.is_unique_violation() {
                DirectoryError::Conflict(format!("Doctor {} already has a profile", doctor_id))
            } else {
                error!("Failed to create doctor profile for {}: {}", doctor_id, e);
                DirectoryError::Database(e)
            }
        })?;

        let profile = result.into_iter().next().ok_or_else(|| SupabaseError::Api {
            status: 201,
            message: "Insert into doctor_profiles returned no rows".to_string(),
        })?;

        info!("Created doctor profile {} for {}", profile.id, doctor_id);
        Ok(profile)
    }

    pub async fn get_doctor_profile(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<DoctorProfileDetails>, DirectoryError> {
        debug!("Fetching doctor profile for {}", doctor_id);

        let path = format!("/rest/v1/doctor_profiles?doctor_id=eq.{}&{}", doctor_id, PROFILE_SELECT);
        let result: Vec<DoctorProfileDetails> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        Ok(result.into_iter().next())
    }

    /// Persists the editable profile fields. The doctor link and approval state are never
    /// rewritten here; the row is matched on both `id` and `doctor_id`.
    pub async fn update_doctor_profile(
        &self,
        profile: &DoctorProfile,
        auth_token: &str,
    ) -> Result<Option<DoctorProfile>, DirectoryError> {
        profile.validate()?;
        debug!("Updating doctor profile {}", profile.id);

        let update_data = json!({
            "specialty_id": profile.specialty_id,
            "license_number": profile.license_number,
            "qualifications": profile.qualifications,
            "experience": profile.experience,
            "consultation_fee": profile.consultation_fee
        });

        let path = format!(
            "/rest/v1/doctor_profiles?id=eq.{}&doctor_id=eq.{}",
            profile.id, profile.doctor_id
        );
        let result: Vec<DoctorProfile> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to update doctor profile {}: {}", profile.id, e);
            e
        })?;

        Ok(result.into_iter().next())
    }

    /// Marks the doctor's profile approved. `Ok(false)` when the doctor has no profile.
    pub async fn approve_doctor_profile(
        &self,
        doctor_id: Uuid,
        approved_by: &str,
        auth_token: &str,
    ) -> Result<bool, DirectoryError> {
        debug!("Approving doctor profile for {}", doctor_id);

        let approval = json!({
            "is_approved": true,
            "approved_at": Utc::now().to_rfc3339(),
            "approved_by": approved_by
        });

        let path = format!("/rest/v1/doctor_profiles?doctor_id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(approval),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to approve doctor profile for {}: {}", doctor_id, e);
            e
        })?;

        if result.is_empty() {
            debug!("No doctor profile for {}, nothing approved", doctor_id);
            return Ok(false);
        }

        info!("Doctor {} approved by {}", doctor_id, approved_by);
        Ok(true)
    }

    /// All profiles with doctor and specialty attached, by doctor last then first name.
    pub async fn list_doctor_profiles(&self, auth_token: &str) -> Result<Vec<DoctorProfileDetails>, DirectoryError> {
        let path = format!("/rest/v1/doctor_profiles?{}", PROFILE_SELECT);
        let mut profiles: Vec<DoctorProfileDetails> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        // PostgREST cannot order a parent by an embedded column.
        profiles.sort_by_key(DoctorProfileDetails::name_key);

        debug!("Listed {} doctor profiles", profiles.len());
        Ok(profiles)
    }

    /// Approved doctors, optionally narrowed to one specialty.
    pub async fn list_approved_doctors(
        &self,
        specialty_id: Option<i32>,
        auth_token: Option<&str>,
    ) -> Result<Vec<DoctorProfileDetails>, DirectoryError> {
        let mut path = format!("/rest/v1/doctor_profiles?is_approved=eq.true&{}", PROFILE_SELECT);
        if let Some(specialty_id) = specialty_id {
            path.push_str(&format!("&specialty_id=eq.{}", specialty_id));
        }

        let mut profiles: Vec<DoctorProfileDetails> = self.supabase.request(Method::GET, &path, auth_token, None).await?;
        profiles.sort_by_key(DoctorProfileDetails::name_key);

        debug!("Listed {} approved doctors (specialty filter: {:?})", profiles.len(), specialty_id);
        Ok(profiles)
    }
}
