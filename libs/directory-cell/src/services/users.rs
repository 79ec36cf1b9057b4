use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient, SupabaseError};

use crate::models::{CreateUserRequest, DirectoryError, User, UserRole};

const USER_NAME_ORDER: &str = "order=last_name.asc,first_name.asc";

pub struct UserService {
    supabase: Arc<SupabaseClient>,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_user(&self, user_id: Uuid, auth_token: &str) -> Result<Option<User>, DirectoryError> {
        debug!("Fetching user {}", user_id);

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Vec<User> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        Ok(result.into_iter().next())
    }

    pub async fn get_user_by_email(&self, email: &str, auth_token: &str) -> Result<Option<User>, DirectoryError> {
        debug!("Fetching user by email");

        let path = format!("/rest/v1/users?email=eq.{}", urlencoding::encode(email.trim()));
        let result: Vec<User> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        Ok(result.into_iter().next())
    }

    /// Every user, active or not, by last then first name.
    pub async fn list_users(&self, auth_token: &str) -> Result<Vec<User>, DirectoryError> {
        let path = format!("/rest/v1/users?{}", USER_NAME_ORDER);
        let users: Vec<User> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        debug!("Listed {} users", users.len());
        Ok(users)
    }

    /// Active users holding `role`, by last then first name.
    pub async fn list_users_by_role(&self, role: UserRole, auth_token: &str) -> Result<Vec<User>, DirectoryError> {
        let path = format!(
            "/rest/v1/users?role=eq.{}&is_active=eq.true&{}",
            role, USER_NAME_ORDER
        );
        let users: Vec<User> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        debug!("Listed {} active users with role {}", users.len(), role);
        Ok(users)
    }

    /// Creates the profile row for a freshly registered auth subject.
    pub async fn create_user(
        &self,
        user_id: Uuid,
        request: CreateUserRequest,
        auth_token: &str,
    ) -> Result<User, DirectoryError> {
        request.validate()?;
        let email = request.email.trim().to_string();
        let role = request.role.unwrap_or_default();

        debug!("Creating {} profile for user {}", role, user_id);

        if self.get_user_by_email(&email, auth_token).await?.is_some() {
            warn!("Rejected registration for user {}: email already in use", user_id);
            return Err(DirectoryError::Conflict(format!("A user with email {} already exists", email)));
        }

        let user_data = json!({
            "id": user_id,
            "email": email,
            "first_name": request.first_name.trim(),
            "last_name": request.last_name.trim(),
            "date_of_birth": request.date_of_birth,
            "phone_number": request.phone_number,
            "address": request.address,
            "national_id": request.national_id,
            "gender": request.gender,
            "medical_history": request.medical_history,
            "emergency_contact_name": request.emergency_contact_name,
            "emergency_contact_phone": request.emergency_contact_phone,
            "role": role,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<User> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/users",
            Some(auth_token),
            Some(user_data),
            Some(return_representation()),
        ).await.map_err(|e| {
            if e.is_unique_violation() {
                DirectoryError::Conflict(format!("A user with email {} already exists", email))
            } else {
                error!("Failed to create user {}: {}", user_id, e);
                DirectoryError::Database(e)
            }
        })?;

        let user = result.into_iter().next().ok_or_else(|| SupabaseError::Api {
            status: 201,
            message: "Insert into users returned no rows".to_string(),
        })?;

        info!("Created {} profile {}", user.role, user.id);
        Ok(user)
    }

    /// Persists profile fields. Email, role and activation are left to their own operations.
    pub async fn update_user(&self, user: &User, auth_token: &str) -> Result<Option<User>, DirectoryError> {
        user.validate()?;
        debug!("Updating user {}", user.id);

        let update_data = json!({
            "first_name": user.first_name,
            "last_name": user.last_name,
            "date_of_birth": user.date_of_birth,
            "phone_number": user.phone_number,
            "address": user.address,
            "national_id": user.national_id,
            "gender": user.gender,
            "medical_history": user.medical_history,
            "emergency_contact_name": user.emergency_contact_name,
            "emergency_contact_phone": user.emergency_contact_phone
        });

        let path = format!("/rest/v1/users?id=eq.{}", user.id);
        let result: Vec<User> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to update user {}: {}", user.id, e);
            e
        })?;

        Ok(result.into_iter().next())
    }

    pub async fn deactivate_user(&self, user_id: Uuid, auth_token: &str) -> Result<bool, DirectoryError> {
        self.set_active(user_id, false, auth_token).await
    }

    pub async fn activate_user(&self, user_id: Uuid, auth_token: &str) -> Result<bool, DirectoryError> {
        self.set_active(user_id, true, auth_token).await
    }

    /// Appointments of a deactivated user are left untouched.
    async fn set_active(&self, user_id: Uuid, is_active: bool, auth_token: &str) -> Result<bool, DirectoryError> {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_active": is_active })),
            Some(return_representation()),
        ).await.map_err(|e| {
            error!("Failed to set is_active={} on user {}: {}", is_active, user_id, e);
            e
        })?;

        if result.is_empty() {
            debug!("User {} not found, activation unchanged", user_id);
            return Ok(false);
        }

        info!("User {} is_active set to {}", user_id, is_active);
        Ok(true)
    }
}
