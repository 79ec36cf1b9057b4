//! Role guards applied by handlers before a service call.
//!
//! Services assume a trusted caller; every check about *who* may do *what* lives here.

use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

/// The caller's id as a `Uuid`. Supabase subjects are always UUIDs.
pub fn caller_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))
}

pub fn is_self(user: &User, id: Uuid) -> bool {
    caller_id(user).map(|caller| caller == id).unwrap_or(false)
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Administrator access required".to_string()))
    }
}

/// Passes when the caller is `id` or an admin.
pub fn require_self_or_admin(user: &User, id: Uuid, action: &str) -> Result<(), AppError> {
    if user.is_admin() || is_self(user, id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Not authorized to {}", action)))
    }
}

/// Passes when the caller is any of `parties` or an admin.
pub fn require_party_or_admin(user: &User, parties: &[Uuid], action: &str) -> Result<(), AppError> {
    if user.is_admin() || parties.iter().any(|id| is_self(user, *id)) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Not authorized to {}", action)))
    }
}
