use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Alphabet for human-enterable short codes. Visually ambiguous
/// characters (O/0, I/1/L) are excluded. 32 entries, so indexing by
/// `byte % 32` is unbiased.
pub const SHORT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const SHORT_CODE_LEN: usize = 6;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString, ToSchema,
)]
#[sqlx(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum QrKind {
    /// Anyone may scan it.
    Session,
    /// Only the assigned employee may scan it.
    EmployeeSpecific,
}

/// Why a structurally known QR code cannot be used right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Inactive,
    Expired,
    WrongEmployeeScope,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct QrCode {
    #[schema(example = 1)]
    pub id: u64,

    /// Opaque identifier embedded in the QR image URL.
    #[schema(example = "6f2c9a7e4b1d4e0a8c3f5d2b7a9e1c4d")]
    pub qr_code_id: String,

    /// Human-enterable fallback code, matched case-insensitively.
    #[schema(example = "AB12CD")]
    pub short_code: String,

    #[schema(example = "Main entrance")]
    pub name: String,

    pub location_id: u64,

    #[schema(nullable = true)]
    pub description: Option<String>,

    pub created_by: u64,

    #[schema(value_type = String, format = "date-time")]
    pub valid_from: NaiveDateTime,

    #[schema(value_type = String, format = "date-time")]
    pub valid_until: NaiveDateTime,

    pub kind: QrKind,

    /// Present iff `kind` is employee-specific.
    pub specific_employee_id: Option<u64>,

    pub is_active: bool,

    #[schema(nullable = true)]
    pub image_url: Option<String>,
}

impl QrCode {
    /// Active and inside the validity window, bounds inclusive.
    pub fn is_valid(&self, now: NaiveDateTime) -> bool {
        self.is_active && now >= self.valid_from && now <= self.valid_until
    }

    /// Whether `actor_id` may use this code at `now`. Inactive/expired
    /// are reported before a scope mismatch, matching the error
    /// precedence callers observe.
    pub fn usable_by(&self, actor_id: u64, now: NaiveDateTime) -> Result<(), TokenRejection> {
        if !self.is_active {
            return Err(TokenRejection::Inactive);
        }
        if now < self.valid_from || now > self.valid_until {
            return Err(TokenRejection::Expired);
        }
        if self.kind == QrKind::EmployeeSpecific {
            match self.specific_employee_id {
                Some(scoped) if scoped != actor_id => {
                    return Err(TokenRejection::WrongEmployeeScope);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Random opaque id for a new QR code.
pub fn generate_qr_code_id() -> String {
    Uuid::new_v4().to_simple().to_string()
}

/// Random short code drawn from the ambiguity-free alphabet.
pub fn generate_short_code() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    bytes[..SHORT_CODE_LEN]
        .iter()
        .map(|b| SHORT_CODE_ALPHABET[(*b as usize) % SHORT_CODE_ALPHABET.len()] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn token(valid_from: NaiveDateTime, valid_until: NaiveDateTime) -> QrCode {
        QrCode {
            id: 1,
            qr_code_id: "abc123".into(),
            short_code: "AB12CD".into(),
            name: "Main entrance".into(),
            location_id: 1,
            description: None,
            created_by: 1,
            valid_from,
            valid_until,
            kind: QrKind::Session,
            specific_employee_id: None,
            is_active: true,
            image_url: None,
        }
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn validity_window_is_inclusive_on_both_ends() {
        let start = t0();
        let end = start + Duration::days(7);
        let qr = token(start, end);

        assert!(qr.usable_by(42, start).is_ok());
        assert!(qr.usable_by(42, end).is_ok());
        assert_eq!(
            qr.usable_by(42, start - Duration::seconds(1)),
            Err(TokenRejection::Expired)
        );
        assert_eq!(
            qr.usable_by(42, end + Duration::seconds(1)),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn inactive_token_rejected_regardless_of_window() {
        let mut qr = token(t0(), t0() + Duration::days(7));
        qr.is_active = false;
        assert_eq!(qr.usable_by(42, t0()), Err(TokenRejection::Inactive));
    }

    #[test]
    fn employee_scoped_token_rejects_other_employees() {
        let mut qr = token(t0(), t0() + Duration::days(7));
        qr.kind = QrKind::EmployeeSpecific;
        qr.specific_employee_id = Some(7);

        assert_eq!(
            qr.usable_by(42, t0()),
            Err(TokenRejection::WrongEmployeeScope)
        );
        assert!(qr.usable_by(7, t0()).is_ok());
    }

    #[test]
    fn inactive_reported_before_scope_mismatch() {
        let mut qr = token(t0(), t0() + Duration::days(7));
        qr.kind = QrKind::EmployeeSpecific;
        qr.specific_employee_id = Some(7);
        qr.is_active = false;

        assert_eq!(qr.usable_by(42, t0()), Err(TokenRejection::Inactive));
    }

    #[test]
    fn short_codes_use_only_the_safe_alphabet() {
        for _ in 0..50 {
            let code = generate_short_code();
            assert_eq!(code.len(), SHORT_CODE_LEN);
            assert!(
                code.bytes().all(|b| SHORT_CODE_ALPHABET.contains(&b)),
                "unexpected character in {}",
                code
            );
        }
    }
}
