use crate::{
    api::AppRecorder,
    attendance::{RecordOutcome, RecordRequest, RecordingError},
    auth::auth::AuthEmployee,
    model::attendance::{ActionKind, AttendanceRecord, AttendanceStatus},
    model::location::Coordinates,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::attendance::ledger::{AttendanceLedger, LedgerFilter};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordAttendanceReq {
    #[schema(example = "6f2c9a7e4b1d4e0a8c3f5d2b7a9e1c4d", nullable = true)]
    pub qr_code_id: Option<String>,
    #[schema(example = "AB12CD", nullable = true)]
    pub short_code: Option<String>,
    /// "check-in" or "check-out"; auto-detected when omitted.
    #[serde(rename = "type")]
    #[schema(example = "check-in", nullable = true)]
    pub attendance_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[schema(example = "Main office", nullable = true)]
    pub location_name: Option<String>,
    /// Opaque client device description, stored as JSON text.
    pub device_info: Option<String>,
}

/// Record attendance by QR code
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = RecordAttendanceReq,
    responses(
        (status = 201, description = "Checked in", body = Object, example = json!({
            "message": "Checked in successfully",
            "type": "check-in",
            "timestamp": "2025-06-02T08:00:00",
            "location": "Main office",
            "status": "onTime"
        })),
        (status = 200, description = "Checked out", body = Object, example = json!({
            "message": "Checked out successfully",
            "type": "check-out",
            "timestamp": "2025-06-02T17:00:00",
            "duration": 540,
            "location": "Main office"
        })),
        (status = 400, description = "Rejected submission"),
        (status = 403, description = "Wrong employee scope or inactive account"),
        (status = 503, description = "Storage temporarily unavailable")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn record_attendance(
    auth: AuthEmployee,
    recorder: web::Data<AppRecorder>,
    http_req: HttpRequest,
    body: web::Json<RecordAttendanceReq>,
) -> Result<HttpResponse, RecordingError> {
    let body = body.into_inner();

    let coordinates = match (body.latitude, body.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
        _ => None,
    };

    let ip_address = http_req
        .connection_info()
        .realip_remote_addr()
        .map(|s| s.to_string());

    let request = RecordRequest {
        qr_code_id: body.qr_code_id,
        short_code: body.short_code,
        requested_type: body.attendance_type,
        coordinates,
        device_info: body.device_info,
        observed_location_name: body.location_name,
        ip_address,
    };

    let now = Local::now().naive_local();
    let outcome = recorder.record(auth.employee_id, request, now).await?;

    info!(employee_id = auth.employee_id, "Attendance recorded");

    Ok(match outcome {
        RecordOutcome::CheckedIn {
            timestamp,
            location,
            status,
            proximity,
        } => {
            let mut resp = json!({
                "message": "Checked in successfully",
                "type": ActionKind::CheckIn,
                "timestamp": timestamp,
                "location": location,
                "status": status,
            });
            if let Some(report) = proximity {
                resp["locationValid"] = json!(report.location_valid);
                resp["locationMessage"] = json!(report.location_message);
            }
            HttpResponse::Created().json(resp)
        }
        RecordOutcome::CheckedOut {
            timestamp,
            duration_minutes,
            location,
            proximity,
        } => {
            let mut resp = json!({
                "message": "Checked out successfully",
                "type": ActionKind::CheckOut,
                "timestamp": timestamp,
                "duration": duration_minutes,
                "location": location,
            });
            if let Some(report) = proximity {
                resp["locationValid"] = json!(report.location_valid);
                resp["locationMessage"] = json!(report.location_message);
            }
            HttpResponse::Ok().json(resp)
        }
    })
}

/// One row of an employee's expanded history: a record contributes a
/// check-out entry (if closed) and a check-in entry.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub action: ActionKind,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: NaiveDateTime,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub location: String,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

/// Turns day-records (newest first) into per-action entries, newest
/// action first.
fn expand_history(records: &[AttendanceRecord]) -> Vec<HistoryEntry> {
    let mut entries = Vec::with_capacity(records.len() * 2);
    for record in records {
        if let Some(check_out) = record.check_out {
            entries.push(HistoryEntry {
                action: ActionKind::CheckOut,
                timestamp: check_out,
                date: record.date,
                location: record.location_name.clone(),
                status: record.status,
                duration: Some(record.duration_minutes),
            });
        }
        entries.push(HistoryEntry {
            action: ActionKind::CheckIn,
            timestamp: record.check_in,
            date: record.date,
            location: record.location_name.clone(),
            status: record.status,
            duration: None,
        });
    }
    entries
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Own attendance history
#[utoipa::path(
    get,
    path = "/api/v1/attendance/me",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Day-records per page"),
        ("from", Query, description = "Start date (inclusive)"),
        ("to", Query, description = "End date (inclusive)")
    ),
    responses(
        (status = 200, description = "Expanded per-action history", body = Object)
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn my_attendance(
    auth: AuthEmployee,
    recorder: web::Data<AppRecorder>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, RecordingError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let filter = LedgerFilter {
        employee_id: Some(auth.employee_id),
        date_from: query.from,
        date_to: query.to,
        status: None,
    };

    let store = recorder.store();
    let total = store.count_in_range(&filter).await?;
    let records = store.list(&filter, page, per_page).await?;

    let today = Local::now().naive_local().date();
    let today_checked_in = store
        .find_open_session(auth.employee_id, today)
        .await?
        .is_some();

    Ok(HttpResponse::Ok().json(json!({
        "data": expand_history(&records),
        "todayCheckedIn": today_checked_in,
        "page": page,
        "perPage": per_page,
        "total": total,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminAttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// "onTime" or "late".
    pub status: Option<AttendanceStatus>,
}

impl AdminAttendanceQuery {
    fn filter(&self) -> LedgerFilter {
        LedgerFilter {
            employee_id: self.employee_id,
            date_from: self.from,
            date_to: self.to,
            status: self.status,
        }
    }
}

/// Admin attendance list
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Records per page"),
        ("employee_id", Query, description = "Filter by employee"),
        ("from", Query, description = "Start date (inclusive)"),
        ("to", Query, description = "End date (inclusive)"),
        ("status", Query, description = "Filter by status (onTime/late)")
    ),
    responses(
        (status = 200, description = "Paginated attendance records", body = Object),
        (status = 403, description = "Admin only")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_attendance(
    auth: AuthEmployee,
    recorder: web::Data<AppRecorder>,
    query: web::Query<AdminAttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let filter = query.filter();

    let store = recorder.store();
    let total = store
        .count_in_range(&filter)
        .await
        .map_err(RecordingError::Storage)?;
    let records = store
        .list(&filter, page, per_page)
        .await
        .map_err(RecordingError::Storage)?;

    Ok(HttpResponse::Ok().json(json!({
        "data": records,
        "page": page,
        "perPage": per_page,
        "total": total,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SummaryQuery {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

/// Daily attendance summary
#[utoipa::path(
    get,
    path = "/api/v1/attendance/stats/summary",
    params(
        ("date", Query, description = "Day to summarize, defaults to today")
    ),
    responses(
        (status = 200, description = "Daily counts", body = Object, example = json!({
            "date": "2025-06-02",
            "onTime": 12,
            "late": 3,
            "present": 15,
            "absent": 5,
            "totalActiveEmployees": 20
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn attendance_summary(
    auth: AuthEmployee,
    recorder: web::Data<AppRecorder>,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let date = query.date.unwrap_or_else(|| Local::now().naive_local().date());

    let day_filter = |status| LedgerFilter {
        employee_id: None,
        date_from: Some(date),
        date_to: Some(date),
        status,
    };

    let store = recorder.store();
    let on_time = store
        .count_in_range(&day_filter(Some(AttendanceStatus::OnTime)))
        .await
        .map_err(RecordingError::Storage)?;
    let late = store
        .count_in_range(&day_filter(Some(AttendanceStatus::Late)))
        .await
        .map_err(RecordingError::Storage)?;

    let active_employees =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE is_active = TRUE")
            .fetch_one(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to count active employees");
                actix_web::error::ErrorInternalServerError("Database error")
            })?;

    let present = on_time + late;

    Ok(HttpResponse::Ok().json(json!({
        "date": date,
        "onTime": on_time,
        "late": late,
        "present": present,
        "absent": (active_employees - present).max(0),
        "totalActiveEmployees": active_employees,
    })))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn records_to_csv(records: &[AttendanceRecord]) -> String {
    let mut csv =
        String::from("employee_id,date,check_in,check_out,duration_minutes,location,status\n");
    for r in records {
        let check_out = r
            .check_out
            .map(|t| t.to_string())
            .unwrap_or_default();
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            r.employee_id,
            r.date,
            r.check_in,
            check_out,
            r.duration_minutes,
            csv_field(&r.location_name),
            r.status,
        ));
    }
    csv
}

/// Export attendance as CSV
#[utoipa::path(
    get,
    path = "/api/v1/attendance/export",
    params(
        ("employee_id", Query, description = "Filter by employee"),
        ("from", Query, description = "Start date (inclusive)"),
        ("to", Query, description = "End date (inclusive)"),
        ("status", Query, description = "Filter by status (onTime/late)")
    ),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 403, description = "Admin only")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn export_attendance(
    auth: AuthEmployee,
    recorder: web::Data<AppRecorder>,
    query: web::Query<AdminAttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    // One bounded fetch; exports beyond this need a date filter.
    let records = recorder
        .store()
        .list(&query.filter(), 1, 10_000)
        .await
        .map_err(RecordingError::Storage)?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"attendance.csv\"",
        ))
        .body(records_to_csv(&records)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(closed: bool) -> AttendanceRecord {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        AttendanceRecord {
            id: 1,
            employee_id: 42,
            date,
            check_in: date.and_hms_opt(8, 0, 0).unwrap(),
            check_out: closed.then(|| date.and_hms_opt(17, 0, 0).unwrap()),
            duration_minutes: if closed { 540 } else { 0 },
            location_name: "Main office".into(),
            qr_code_id: Some("abc".into()),
            latitude: None,
            longitude: None,
            status: AttendanceStatus::OnTime,
            device_info: None,
            ip_address: None,
        }
    }

    #[test]
    fn closed_record_expands_to_two_entries_newest_first() {
        let entries = expand_history(&[record(true)]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, ActionKind::CheckOut);
        assert_eq!(entries[0].duration, Some(540));
        assert_eq!(entries[1].action, ActionKind::CheckIn);
        assert_eq!(entries[1].duration, None);
    }

    #[test]
    fn open_record_expands_to_a_single_check_in() {
        let entries = expand_history(&[record(false)]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActionKind::CheckIn);
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        assert_eq!(csv_field("Office"), "Office");
        assert_eq!(csv_field("Dhaka, HQ"), "\"Dhaka, HQ\"");
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn csv_includes_header_and_rows() {
        let csv = records_to_csv(&[record(true)]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "employee_id,date,check_in,check_out,duration_minutes,location,status"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("42,2025-06-02,"));
        assert!(row.contains("540"));
        assert!(row.ends_with("onTime"));
    }
}
