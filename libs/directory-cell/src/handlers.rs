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
use shared_utils::access::{caller_id, require_admin, require_self_or_admin};

use crate::models::{
    CreateDoctorProfileRequest, CreateUserRequest, DirectoryError, DoctorBrowseQuery,
    UpdateDoctorProfileRequest, UpdateUserRequest, UserListQuery, UserRole,
};
use crate::services::{DoctorProfileService, SpecialtyService, UserService};

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Conflict(msg) => AppError::Conflict(msg),
            DirectoryError::Validation(msg) => AppError::ValidationError(msg),
            DirectoryError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

// ==============================================================================
// USERS
// ==============================================================================

/// Registers the caller's own profile.
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    if request.role == Some(UserRole::Admin) && !user.is_admin() {
        warn!("User {} attempted to self-assign the admin role", user_id);
        return Err(AppError::Forbidden("Cannot assign the admin role".to_string()));
    }

    let service = UserService::new(&state);
    let created = service.create_user(user_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "user": created,
        "message": "User profile created"
    })))
}

#[axum::debug_handler]
pub async fn get_current_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;
    let service = UserService::new(&state);

    let profile = service.get_user(user_id, auth.token()).await?
        .ok_or_else(|| AppError::NotFound("User profile not found".to_string()))?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, user_id, "view this user")?;
    let service = UserService::new(&state);

    let profile = service.get_user(user_id, auth.token()).await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = UserService::new(&state);

    let users = match query.role {
        Some(role) => service.list_users_by_role(role, auth.token()).await?,
        None => service.list_users(auth.token()).await?,
    };

    Ok(Json(json!({
        "users": users,
        "total": users.len()
    })))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, user_id, "update this user")?;
    let service = UserService::new(&state);

    let mut profile = service.get_user(user_id, auth.token()).await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    request.apply_to(&mut profile);

    let updated = service.update_user(&profile, auth.token()).await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "user": updated,
        "message": "User profile updated"
    })))
}

#[axum::debug_handler]
pub async fn deactivate_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = UserService::new(&state);

    if !service.deactivate_user(user_id, auth.token()).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "User deactivated"
    })))
}

#[axum::debug_handler]
pub async fn activate_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = UserService::new(&state);

    if !service.activate_user(user_id, auth.token()).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "User activated"
    })))
}

// ==============================================================================
// DOCTOR PROFILES
// ==============================================================================

/// Public doctor browsing, optionally by specialty.
#[axum::debug_handler]
pub async fn browse_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorBrowseQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorProfileService::new(&state);
    let doctors = service.list_approved_doctors(query.specialty_id, None).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn create_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = caller_id(&user)?;
    if !user.is_doctor() {
        return Err(AppError::Forbidden("Only doctors can create a doctor profile".to_string()));
    }

    let service = DoctorProfileService::new(&state);
    let profile = service.create_doctor_profile(doctor_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "profile": profile,
        "message": "Doctor profile submitted for approval"
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorProfileService::new(&state);

    let profile = service.get_doctor_profile(doctor_id, auth.token()).await?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_self_or_admin(&user, doctor_id, "update this doctor profile")?;
    let service = DoctorProfileService::new(&state);

    let mut profile = service.get_doctor_profile(doctor_id, auth.token()).await?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?
        .profile;
    request.apply_to(&mut profile);

    let updated = service.update_doctor_profile(&profile, auth.token()).await?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "profile": updated,
        "message": "Doctor profile updated"
    })))
}

#[axum::debug_handler]
pub async fn approve_doctor_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let approved_by = user.email.clone().unwrap_or_else(|| user.id.clone());
    let service = DoctorProfileService::new(&state);

    if !service.approve_doctor_profile(doctor_id, &approved_by, auth.token()).await? {
        return Err(AppError::NotFound("Doctor profile not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Doctor profile approved"
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_profiles(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let service = DoctorProfileService::new(&state);
    let profiles = service.list_doctor_profiles(auth.token()).await?;

    Ok(Json(json!({
        "profiles": profiles,
        "total": profiles.len()
    })))
}

// ==============================================================================
// SPECIALTIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = SpecialtyService::new(&state);
    let specialties = service.list_active_specialties(None).await?;

    Ok(Json(json!({
        "specialties": specialties,
        "total": specialties.len()
    })))
}
