use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, AppointmentStatus};

#[derive(Debug, Deserialize)]
struct SlotHolder {
    id: Uuid,
    status: AppointmentStatus,
}

/// Exact-instant slot check for a doctor's calendar.
///
/// This is the fast path only; the partial unique index on
/// `(doctor_id, appointment_date)` settles concurrent bookings.
pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Id of an appointment holding `doctor_id`'s slot at exactly `at`, if any.
    /// Cancelled and no-show appointments release their slot.
    pub async fn find_conflict(
        &self,
        doctor_id: Uuid,
        at: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<Uuid>, AppointmentError> {
        debug!("Checking slot {} for doctor {}", at, doctor_id);

        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=not.in.(cancelled,no_show)&select=id,status",
            doctor_id,
            encode_timestamp(at)
        );
        if let Some(exclude_id) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }

        let holders: Vec<SlotHolder> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        // Re-check locally in case the store ignored a filter.
        let conflict = holders
            .into_iter()
            .find(|holder| holder.status.blocks_slot() && Some(holder.id) != exclude_appointment_id)
            .map(|holder| holder.id);

        if let Some(existing) = conflict {
            warn!("Doctor {} already booked at {} by appointment {}", doctor_id, at, existing);
        }

        Ok(conflict)
    }
}

/// RFC 3339 in UTC, percent-encoded for use in a PostgREST filter.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    urlencoding::encode(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
}
