use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::location::Coordinates;

/// Decided once, at check-in time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString, ToSchema,
)]
#[sqlx(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    OnTime,
    Late,
}

/// The two attendance actions. String form is the wire form
/// ("check-in" / "check-out").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CheckIn,
    CheckOut,
}

/// One check-in/check-out cycle for one employee on one calendar day.
/// Open while `check_out` is null; closed (and immutable) afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,

    /// Grouping key, local calendar day of the check-in.
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,

    #[schema(value_type = String, format = "date-time")]
    pub check_in: NaiveDateTime,

    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub check_out: Option<NaiveDateTime>,

    /// 0 until checkout.
    pub duration_minutes: i64,

    /// Denormalized display name, resolved at write time.
    pub location_name: String,

    /// The QR code used, if any.
    pub qr_code_id: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub status: AttendanceStatus,

    /// Opaque client device description (JSON text), passed through.
    pub device_info: Option<String>,

    pub ip_address: Option<String>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }
}
