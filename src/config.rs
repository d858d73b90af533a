use dotenvy::dotenv;
use std::env;

/// Tunables for the attendance recorder. Injected, never hardcoded,
/// so tests can run with tight windows.
#[derive(Clone, Copy, Debug)]
pub struct AttendancePolicy {
    /// Local hour of day at or after which a check-in counts as late.
    pub late_after_hour: u32,
    /// Minimum seconds between two attendance actions by the same employee.
    pub cooldown_secs: i64,
    /// Advisory geofence radius around a QR code's location, in meters.
    pub geofence_radius_m: f64,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            late_after_hour: 9,
            cooldown_secs: 300,
            geofence_radius_m: 100.0,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub policy: AttendancePolicy,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|e| panic!("{} must be a valid value: {:?}", key, e))
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env_parse("ACCESS_TOKEN_TTL", "900"), // 15 min
            refresh_token_ttl: env_parse("REFRESH_TOKEN_TTL", "604800"), // 7 days

            rate_login_per_min: env_parse("RATE_LOGIN_PER_MIN", "60"),
            rate_register_per_min: env_parse("RATE_REGISTER_PER_MIN", "30"),
            rate_refresh_per_min: env_parse("RATE_REFRESH_PER_MIN", "30"),
            rate_protected_per_min: env_parse("RATE_PROTECTED_PER_MIN", "1000"),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            policy: AttendancePolicy {
                late_after_hour: env_parse("LATE_AFTER_HOUR", "9"),
                cooldown_secs: env_parse("ATTENDANCE_COOLDOWN_SECS", "300"),
                geofence_radius_m: env_parse("GEOFENCE_RADIUS_M", "100"),
            },
        }
    }
}
