use crate::api::attendance::{
    AdminAttendanceQuery, HistoryEntry, HistoryQuery, RecordAttendanceReq, SummaryQuery,
};
use crate::api::employee::{CreateEmployee, EmployeeQuery};
use crate::api::location::{CreateLocation, LocationQuery};
use crate::api::qrcode::{CreateQrCode, QrCodeQuery, ValidateQrReq};
use crate::geo::ProximityReport;
use crate::model::attendance::{ActionKind, AttendanceRecord, AttendanceStatus};
use crate::model::employee::Employee;
use crate::model::location::Location;
use crate::model::qrcode::{QrCode, QrKind};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "QR Attendance API",
        version = "1.0.0",
        description = r#"
## QR-code Employee Attendance Service

This API powers QR-code based attendance tracking for an organization.

### 🔹 Key Features
- **Attendance Recording**
  - Scan a QR code (or type its short code) to check in or out
  - One check-in/check-out cycle per employee per day
  - Late marking after the configured hour, cooldown between scans
- **QR Code Management**
  - Session codes anyone may scan, or codes bound to one employee
  - Validity windows, short codes, advisory location checks
- **Locations & Employees**
  - Named locations with optional coordinates, employee directory
- **Reporting**
  - Personal history, admin lists, daily summaries, CSV export

### 🔐 Security
Endpoints under the API prefix require **JWT Bearer authentication**.
Administrative operations require the **Admin** role.

### 📦 Response Format
- JSON-based RESTful responses, camelCase attendance payloads
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::record_attendance,
        crate::api::attendance::my_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_summary,
        crate::api::attendance::export_attendance,

        crate::api::qrcode::create_qr_code,
        crate::api::qrcode::list_qr_codes,
        crate::api::qrcode::get_qr_code,
        crate::api::qrcode::update_qr_code,
        crate::api::qrcode::delete_qr_code,
        crate::api::qrcode::validate_qr_code,

        crate::api::location::create_location,
        crate::api::location::list_locations,
        crate::api::location::get_location,
        crate::api::location::update_location,
        crate::api::location::delete_location,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee
    ),
    components(
        schemas(
            RecordAttendanceReq,
            HistoryEntry,
            HistoryQuery,
            AdminAttendanceQuery,
            SummaryQuery,
            AttendanceRecord,
            AttendanceStatus,
            ActionKind,
            ProximityReport,
            CreateQrCode,
            QrCodeQuery,
            ValidateQrReq,
            QrCode,
            QrKind,
            CreateLocation,
            LocationQuery,
            Location,
            CreateEmployee,
            EmployeeQuery,
            Employee
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "QR attendance recording and reporting APIs"),
        (name = "QrCode", description = "QR code management APIs"),
        (name = "Location", description = "Location management APIs"),
        (name = "Employee", description = "Employee management APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
