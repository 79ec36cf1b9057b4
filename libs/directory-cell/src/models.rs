use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_utils::validation::{is_valid_email, limit_optional_text, require_text};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_ADDRESS_LENGTH: usize = 200;
pub const MAX_NATIONAL_ID_LENGTH: usize = 20;
pub const MAX_GENDER_LENGTH: usize = 10;
pub const MAX_MEDICAL_HISTORY_LENGTH: usize = 500;
pub const MAX_EMERGENCY_NAME_LENGTH: usize = 100;
pub const MAX_EMERGENCY_PHONE_LENGTH: usize = 20;
pub const MAX_LICENSE_NUMBER_LENGTH: usize = 50;
pub const MAX_PROFILE_TEXT_LENGTH: usize = 1000;
pub const MAX_SPECIALTY_NAME_LENGTH: usize = 100;
pub const MAX_SPECIALTY_DESCRIPTION_LENGTH: usize = 500;
/// Fees are stored as numeric(18,2).
pub const MAX_CONSULTATION_FEE: f64 = 1e16;

// ==============================================================================
// USERS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::Doctor => "doctor",
            UserRole::Admin => "admin",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Patient
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub gender: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: Some(self.email.clone()),
            phone_number: self.phone_number.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), DirectoryError> {
        validate_profile_fields(&ProfileFields {
            first_name: &self.first_name,
            last_name: &self.last_name,
            address: self.address.as_deref(),
            national_id: self.national_id.as_deref(),
            gender: self.gender.as_deref(),
            medical_history: self.medical_history.as_deref(),
            emergency_contact_name: self.emergency_contact_name.as_deref(),
            emergency_contact_phone: self.emergency_contact_phone.as_deref(),
        })
    }
}

/// Party details attached to appointments, notes and doctor profiles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl UserSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub gender: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), DirectoryError> {
        if !is_valid_email(self.email.trim()) {
            return Err(DirectoryError::Validation(format!("Invalid email address: {}", self.email)));
        }

        validate_profile_fields(&ProfileFields {
            first_name: &self.first_name,
            last_name: &self.last_name,
            address: self.address.as_deref(),
            national_id: self.national_id.as_deref(),
            gender: self.gender.as_deref(),
            medical_history: self.medical_history.as_deref(),
            emergency_contact_name: self.emergency_contact_name.as_deref(),
            emergency_contact_phone: self.emergency_contact_phone.as_deref(),
        })
    }
}

/// Partial profile edit. Email and role are not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub gender: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

impl UpdateUserRequest {
    pub fn apply_to(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if self.date_of_birth.is_some() {
            user.date_of_birth = self.date_of_birth;
        }
        if self.phone_number.is_some() {
            user.phone_number = self.phone_number;
        }
        if self.address.is_some() {
            user.address = self.address;
        }
        if self.national_id.is_some() {
            user.national_id = self.national_id;
        }
        if self.gender.is_some() {
            user.gender = self.gender;
        }
        if self.medical_history.is_some() {
            user.medical_history = self.medical_history;
        }
        if self.emergency_contact_name.is_some() {
            user.emergency_contact_name = self.emergency_contact_name;
        }
        if self.emergency_contact_phone.is_some() {
            user.emergency_contact_phone = self.emergency_contact_phone;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

struct ProfileFields<'a> {
    first_name: &'a str,
    last_name: &'a str,
    address: Option<&'a str>,
    national_id: Option<&'a str>,
    gender: Option<&'a str>,
    medical_history: Option<&'a str>,
    emergency_contact_name: Option<&'a str>,
    emergency_contact_phone: Option<&'a str>,
}

fn validate_profile_fields(fields: &ProfileFields<'_>) -> Result<(), DirectoryError> {
    require_text("first_name", fields.first_name, MAX_NAME_LENGTH)
        .and_then(|_| require_text("last_name", fields.last_name, MAX_NAME_LENGTH))
        .and_then(|_| limit_optional_text("address", fields.address, MAX_ADDRESS_LENGTH))
        .and_then(|_| limit_optional_text("national_id", fields.national_id, MAX_NATIONAL_ID_LENGTH))
        .and_then(|_| limit_optional_text("gender", fields.gender, MAX_GENDER_LENGTH))
        .and_then(|_| limit_optional_text("medical_history", fields.medical_history, MAX_MEDICAL_HISTORY_LENGTH))
        .and_then(|_| limit_optional_text("emergency_contact_name", fields.emergency_contact_name, MAX_EMERGENCY_NAME_LENGTH))
        .and_then(|_| limit_optional_text("emergency_contact_phone", fields.emergency_contact_phone, MAX_EMERGENCY_PHONE_LENGTH))
        .map_err(DirectoryError::Validation)
}

// ==============================================================================
// SPECIALTIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalSpecialty {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl MedicalSpecialty {
    pub fn validate(&self) -> Result<(), DirectoryError> {
        require_text("name", &self.name, MAX_SPECIALTY_NAME_LENGTH)
            .and_then(|_| limit_optional_text("description", self.description.as_deref(), MAX_SPECIALTY_DESCRIPTION_LENGTH))
            .map_err(DirectoryError::Validation)
    }
}

/// Reference specialties with their stable ids.
pub const DEFAULT_SPECIALTIES: [(i32, &str, &str); 5] = [
    (1, "General Practice", "General medical practice and primary care"),
    (2, "Pediatrics", "Medical care for infants, children, and adolescents"),
    (3, "Cardiology", "Heart and cardiovascular system"),
    (4, "Dermatology", "Skin, hair, and nail conditions"),
    (5, "Mental Health", "Psychiatric and psychological care"),
];

// ==============================================================================
// DOCTOR PROFILES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: i32,
    pub license_number: Option<String>,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub consultation_fee: Option<f64>,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DoctorProfile {
    pub fn validate(&self) -> Result<(), DirectoryError> {
        validate_profile_text(
            self.license_number.as_deref(),
            self.qualifications.as_deref(),
            self.experience.as_deref(),
        )?;
        validate_fee(self.consultation_fee)
    }
}

/// A profile with its doctor and specialty embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorProfileDetails {
    #[serde(flatten)]
    pub profile: DoctorProfile,
    #[serde(default)]
    pub doctor: Option<UserSummary>,
    #[serde(default)]
    pub specialty: Option<MedicalSpecialty>,
}

impl DoctorProfileDetails {
    /// Sort key: last name, then first name. Profiles without a linked user sort last.
    pub fn name_key(&self) -> (bool, String, String) {
        match &self.doctor {
            Some(doctor) => (
                false,
                doctor.last_name.to_lowercase(),
                doctor.first_name.to_lowercase(),
            ),
            None => (true, String::new(), String::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorProfileRequest {
    pub specialty_id: i32,
    pub license_number: Option<String>,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub consultation_fee: Option<f64>,
}

impl CreateDoctorProfileRequest {
    pub fn validate(&self) -> Result<(), DirectoryError> {
        validate_profile_text(
            self.license_number.as_deref(),
            self.qualifications.as_deref(),
            self.experience.as_deref(),
        )?;
        validate_fee(self.consultation_fee)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorProfileRequest {
    pub specialty_id: Option<i32>,
    pub license_number: Option<String>,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub consultation_fee: Option<f64>,
}

impl UpdateDoctorProfileRequest {
    pub fn apply_to(self, profile: &mut DoctorProfile) {
        if let Some(specialty_id) = self.specialty_id {
            profile.specialty_id = specialty_id;
        }
        if self.license_number.is_some() {
            profile.license_number = self.license_number;
        }
        if self.qualifications.is_some() {
            profile.qualifications = self.qualifications;
        }
        if self.experience.is_some() {
            profile.experience = self.experience;
        }
        if self.consultation_fee.is_some() {
            profile.consultation_fee = self.consultation_fee;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorBrowseQuery {
    pub specialty_id: Option<i32>,
}

fn validate_profile_text(
    license_number: Option<&str>,
    qualifications: Option<&str>,
    experience: Option<&str>,
) -> Result<(), DirectoryError> {
    limit_optional_text("license_number", license_number, MAX_LICENSE_NUMBER_LENGTH)
        .and_then(|_| limit_optional_text("qualifications", qualifications, MAX_PROFILE_TEXT_LENGTH))
        .and_then(|_| limit_optional_text("experience", experience, MAX_PROFILE_TEXT_LENGTH))
        .map_err(DirectoryError::Validation)
}

fn validate_fee(fee: Option<f64>) -> Result<(), DirectoryError> {
    match fee {
        Some(amount) if !amount.is_finite() || amount < 0.0 || amount >= MAX_CONSULTATION_FEE => {
            Err(DirectoryError::Validation(
                "consultation_fee must be a non-negative amount".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] SupabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn registration() -> CreateUserRequest {
        CreateUserRequest {
            email: "amina@example.com".to_string(),
            first_name: "Amina".to_string(),
            last_name: "Otieno".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1992, 4, 12),
            phone_number: Some("+254700000001".to_string()),
            address: None,
            national_id: Some("12345678".to_string()),
            gender: Some("female".to_string()),
            medical_history: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            role: None,
        }
    }

    #[test]
    fn role_wire_form_is_snake_case() {
        assert_eq!(serde_json::to_value(UserRole::Doctor).unwrap(), "doctor");
        assert_eq!(serde_json::from_str::<UserRole>("\"admin\"").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::default(), UserRole::Patient);
    }

    #[test]
    fn registration_validation() {
        assert!(registration().validate().is_ok());

        let mut bad_email = registration();
        bad_email.email = "not-an-email".to_string();
        assert_matches!(bad_email.validate(), Err(DirectoryError::Validation(_)));

        let mut long_id = registration();
        long_id.national_id = Some("9".repeat(MAX_NATIONAL_ID_LENGTH + 1));
        assert_matches!(
            long_id.validate(),
            Err(DirectoryError::Validation(msg)) if msg.starts_with("national_id")
        );

        let mut blank_name = registration();
        blank_name.last_name = " ".to_string();
        assert_matches!(blank_name.validate(), Err(DirectoryError::Validation(_)));
    }

    #[test]
    fn profile_request_rejects_negative_fee() {
        let request = CreateDoctorProfileRequest {
            specialty_id: 1,
            license_number: Some("MD789012".to_string()),
            qualifications: None,
            experience: None,
            consultation_fee: Some(-1.0),
        };
        assert_matches!(request.validate(), Err(DirectoryError::Validation(_)));
    }

    #[test]
    fn details_deserialize_from_embedded_row() {
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "specialty_id": 3,
            "license_number": "MD789012",
            "qualifications": null,
            "experience": null,
            "consultation_fee": 50.0,
            "is_approved": true,
            "approved_at": "2026-01-02T00:00:00Z",
            "approved_by": "admin@afyaconnect.com",
            "created_at": "2026-01-01T00:00:00Z",
            "doctor": {
                "id": Uuid::new_v4(),
                "first_name": "John",
                "last_name": "Smith",
                "email": "dr.smith@afyaconnect.com",
                "phone_number": null
            },
            "specialty": {
                "id": 3,
                "name": "Cardiology",
                "description": null,
                "is_active": true,
                "created_at": null
            }
        });

        let details: DoctorProfileDetails = serde_json::from_value(row).unwrap();
        assert_eq!(details.profile.specialty_id, 3);
        assert_eq!(details.doctor.as_ref().map(|d| d.full_name()).as_deref(), Some("John Smith"));
        assert_eq!(details.specialty.map(|s| s.name).as_deref(), Some("Cardiology"));
    }

    #[test]
    fn partial_update_keeps_unset_fields() {
        let mut user: User = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "email": "amina@example.com",
            "first_name": "Amina",
            "last_name": "Otieno",
            "date_of_birth": null,
            "phone_number": "555-0100",
            "address": null,
            "national_id": null,
            "gender": null,
            "medical_history": null,
            "emergency_contact_name": null,
            "emergency_contact_phone": null,
            "role": "patient",
            "is_active": true,
            "created_at": "2026-01-01T00:00:00Z",
            "last_login_at": null
        }))
        .unwrap();

        UpdateUserRequest {
            address: Some("Kisumu".to_string()),
            ..Default::default()
        }
        .apply_to(&mut user);

        assert_eq!(user.address.as_deref(), Some("Kisumu"));
        assert_eq!(user.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(user.first_name, "Amina");
    }
}
