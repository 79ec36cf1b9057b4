use std::env;
use tracing::warn;

const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Only used for startup maintenance such as seeding reference data.
    pub supabase_service_role_key: String,
    pub server_port: u16,
    /// Enforce the appointment status graph on every status change.
    pub strict_status_transitions: bool,
    /// Upsert the default medical specialties at startup.
    pub seed_reference_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default(),
            server_port: parse_port(env::var("PORT").ok().as_deref()),
            strict_status_transitions: parse_flag(env::var("STRICT_STATUS_TRANSITIONS").ok().as_deref()),
            seed_reference_data: parse_flag(env::var("SEED_REFERENCE_DATA").ok().as_deref()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_port(raw: Option<&str>) -> u16 {
    match raw {
        None => DEFAULT_SERVER_PORT,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("PORT value '{}' is not a valid port, using {}", value, DEFAULT_SERVER_PORT);
            DEFAULT_SERVER_PORT
        }),
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}
