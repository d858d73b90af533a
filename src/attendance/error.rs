use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDateTime;
use derive_more::{Display, Error};
use serde_json::json;

use crate::model::attendance::ActionKind;

/// Transient storage failure. The only rejection a client may retry.
#[derive(Debug, Display, Error)]
#[display(fmt = "storage unavailable: {}", message)]
pub struct StorageError {
    pub message: String,
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError {
            message: e.to_string(),
        }
    }
}

/// Every way an attendance submission can be rejected. All variants
/// except `Storage` are terminal for the request and must not be
/// retried automatically.
#[derive(Debug)]
pub enum RecordingError {
    /// Neither a QR code id nor a short code was supplied.
    MissingIdentifier,
    /// No QR code matches the supplied identifier.
    InvalidToken,
    /// The code exists but is disabled or outside its validity window.
    TokenExpiredOrInactive,
    /// An employee-specific code used by somebody else.
    WrongEmployeeScope,
    /// The acting employee is deactivated.
    EmployeeInactive,
    /// A previous action is still inside the spam-suppression window.
    CooldownActive {
        last_action: ActionKind,
        last_action_time: NaiveDateTime,
        seconds_remaining: i64,
        retry_after: NaiveDateTime,
    },
    /// Explicit check-in while a session is already open today.
    AlreadyOpenToday,
    /// The one check-in/check-out cycle for today is already closed.
    AlreadyCompletedToday,
    /// Check-out without an open session today.
    NoOpenSession,
    /// The `type` field was neither "check-in" nor "check-out".
    InvalidAttendanceType { given: String },
    Storage(StorageError),
}

impl From<StorageError> for RecordingError {
    fn from(e: StorageError) -> Self {
        RecordingError::Storage(e)
    }
}

fn wait_message(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let minutes_left = seconds / 60;
    let seconds_left = seconds % 60;
    if minutes_left > 0 {
        format!(
            "{} minute{} and {} second{}",
            minutes_left,
            if minutes_left != 1 { "s" } else { "" },
            seconds_left,
            if seconds_left != 1 { "s" } else { "" },
        )
    } else {
        format!(
            "{} second{}",
            seconds_left,
            if seconds_left != 1 { "s" } else { "" }
        )
    }
}

impl std::fmt::Display for RecordingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingError::MissingIdentifier => {
                write!(f, "QR code ID or short code is required")
            }
            RecordingError::InvalidToken => write!(f, "Invalid QR code or short code"),
            RecordingError::TokenExpiredOrInactive => {
                write!(f, "QR code has expired or is inactive")
            }
            RecordingError::WrongEmployeeScope => {
                write!(f, "This QR code is assigned to another employee")
            }
            RecordingError::EmployeeInactive => {
                write!(f, "Employee account is inactive")
            }
            RecordingError::CooldownActive {
                last_action,
                seconds_remaining,
                ..
            } => write!(
                f,
                "You already performed a {} in the last few minutes. Please wait {} before trying again.",
                last_action,
                wait_message(*seconds_remaining)
            ),
            RecordingError::AlreadyOpenToday => write!(
                f,
                "You already have an active check-in today. Please check out first before checking in again."
            ),
            RecordingError::AlreadyCompletedToday => write!(
                f,
                "You have already checked in and out today. Attendance allows one cycle per day."
            ),
            RecordingError::NoOpenSession => write!(
                f,
                "No active check-in found for today. Please check in first."
            ),
            RecordingError::InvalidAttendanceType { given } => write!(
                f,
                "Invalid attendance type '{}'. Must be check-in or check-out.",
                given
            ),
            RecordingError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl ResponseError for RecordingError {
    fn status_code(&self) -> StatusCode {
        match self {
            RecordingError::WrongEmployeeScope | RecordingError::EmployeeInactive => {
                StatusCode::FORBIDDEN
            }
            RecordingError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            RecordingError::CooldownActive {
                last_action,
                last_action_time,
                seconds_remaining,
                retry_after,
            } => json!({
                "message": self.to_string(),
                "cooldownSeconds": (*seconds_remaining).max(0),
                "lastAction": last_action,
                "lastActionTime": last_action_time,
                "retryAfter": retry_after,
            }),
            RecordingError::InvalidAttendanceType { given } => json!({
                "message": self.to_string(),
                "detectedType": given,
            }),
            RecordingError::Storage(_) => json!({
                "message": "Storage temporarily unavailable, please retry",
                "transient": true,
            }),
            _ => json!({ "message": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_message_pluralizes() {
        assert_eq!(wait_message(1), "1 second");
        assert_eq!(wait_message(45), "45 seconds");
        assert_eq!(wait_message(60), "1 minute and 0 seconds");
        assert_eq!(wait_message(121), "2 minutes and 1 second");
        assert_eq!(wait_message(-3), "0 seconds");
    }

    #[test]
    fn storage_errors_are_service_unavailable() {
        let err = RecordingError::Storage(StorageError {
            message: "pool timed out".into(),
        });
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
