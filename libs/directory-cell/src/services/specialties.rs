use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{ignore_duplicates, SupabaseClient};

use crate::models::{DirectoryError, MedicalSpecialty, DEFAULT_SPECIALTIES};

pub struct SpecialtyService {
    supabase: Arc<SupabaseClient>,
}

impl SpecialtyService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn list_active_specialties(&self, auth_token: Option<&str>) -> Result<Vec<MedicalSpecialty>, DirectoryError> {
        let specialties: Vec<MedicalSpecialty> = self.supabase.request(
            Method::GET,
            "/rest/v1/medical_specialties?is_active=eq.true&order=name.asc",
            auth_token,
            None,
        ).await?;

        debug!("Listed {} active specialties", specialties.len());
        Ok(specialties)
    }

    pub async fn get_specialty(&self, specialty_id: i32, auth_token: &str) -> Result<Option<MedicalSpecialty>, DirectoryError> {
        let path = format!("/rest/v1/medical_specialties?id=eq.{}", specialty_id);
        let result: Vec<MedicalSpecialty> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        Ok(result.into_iter().next())
    }

    /// Upserts the reference specialties, leaving rows that already exist alone.
    /// Returns how many were inserted.
    pub async fn seed_default_specialties(&self, auth_token: &str) -> Result<usize, DirectoryError> {
        let now = Utc::now();
        let mut rows = Vec::with_capacity(DEFAULT_SPECIALTIES.len());

        for (id, name, description) in DEFAULT_SPECIALTIES {
            let specialty = MedicalSpecialty {
                id,
                name: name.to_string(),
                description: Some(description.to_string()),
                is_active: true,
                created_at: Some(now),
            };
            specialty.validate()?;
            rows.push(json!(specialty));
        }

        let inserted: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/medical_specialties?on_conflict=name",
            Some(auth_token),
            Some(Value::Array(rows)),
            Some(ignore_duplicates()),
        ).await?;

        info!("Seeded {} medical specialties", inserted.len());
        Ok(inserted.len())
    }
}
