//! Storage seams the recorder writes through, and their MySQL
//! implementation. The conditional-write semantics here carry the
//! "at most one open session per employee per day" invariant: the
//! attendance table has a `UNIQUE (employee_id, date)` key, so a racing
//! second insert surfaces as SQLSTATE 23000 and is reported as a
//! conflict instead of a second row.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;

use crate::attendance::error::StorageError;
use crate::model::attendance::{ActionKind, AttendanceRecord, AttendanceStatus};
use crate::model::location::Coordinates;
use crate::model::qrcode::QrCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(u64),
    /// A record for this (employee, day) already exists.
    Conflict,
}

/// Fields of a record created at check-in.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: NaiveDateTime,
    pub status: AttendanceStatus,
    pub location_name: String,
    pub qr_code_id: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
}

/// The single mutation a record receives, at check-out. Optional
/// fields fall back to the values captured at check-in.
#[derive(Debug, Clone)]
pub struct ClosePatch {
    pub check_out: NaiveDateTime,
    pub duration_minutes: i64,
    pub location_name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub device_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastAction {
    pub kind: ActionKind,
    pub at: NaiveDateTime,
}

/// Reporting filter used by the list/count capability.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub employee_id: Option<u64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

#[allow(async_fn_in_trait)]
pub trait AttendanceLedger: Send + Sync {
    /// The open record for (employee, day), most recently started if
    /// several somehow exist.
    async fn find_open_session(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StorageError>;

    /// The employee's most recent check-in or check-out instant across
    /// all records. Drives the cooldown check.
    async fn last_action(&self, employee_id: u64) -> Result<Option<LastAction>, StorageError>;

    /// Conditional insert of an open record; `Conflict` when a record
    /// for the same (employee, day) already exists.
    async fn insert_open(&self, new: &NewAttendance) -> Result<InsertOutcome, StorageError>;

    /// Conditional close; false when the record was already closed by
    /// a concurrent request.
    async fn close_session(&self, id: u64, patch: &ClosePatch) -> Result<bool, StorageError>;

    async fn count_in_range(&self, filter: &LedgerFilter) -> Result<i64, StorageError>;

    async fn list(
        &self,
        filter: &LedgerFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<AttendanceRecord>, StorageError>;
}

#[allow(async_fn_in_trait)]
pub trait QrCodeStore: Send + Sync {
    async fn find_by_qr_code_id(&self, qr_code_id: &str)
        -> Result<Option<QrCode>, StorageError>;

    /// Case-insensitive exact match.
    async fn find_by_short_code(&self, short_code: &str)
        -> Result<Option<QrCode>, StorageError>;
}

#[allow(async_fn_in_trait)]
pub trait EmployeeDirectory: Send + Sync {
    async fn is_active(&self, employee_id: u64) -> Result<bool, StorageError>;
}

#[derive(Debug, Clone)]
pub struct LocationInfo {
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

#[allow(async_fn_in_trait)]
pub trait LocationRegistry: Send + Sync {
    async fn location_info(&self, location_id: u64)
        -> Result<Option<LocationInfo>, StorageError>;
}

// -------------------- MySQL implementation --------------------

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

enum Bind {
    U64(u64),
    Str(String),
    Date(NaiveDate),
}

fn filter_conditions(filter: &LedgerFilter) -> (Vec<&'static str>, Vec<Bind>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    if let Some(employee_id) = filter.employee_id {
        conditions.push("employee_id = ?");
        binds.push(Bind::U64(employee_id));
    }
    if let Some(from) = filter.date_from {
        conditions.push("date >= ?");
        binds.push(Bind::Date(from));
    }
    if let Some(to) = filter.date_to {
        conditions.push("date <= ?");
        binds.push(Bind::Date(to));
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        binds.push(Bind::Str(status.to_string()));
    }

    (conditions, binds)
}

fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// True when the driver reports a duplicate-key violation.
fn is_duplicate_key(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

impl AttendanceLedger for MySqlStore {
    async fn find_open_session(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StorageError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT * FROM attendance
            WHERE employee_id = ? AND date = ? AND check_out IS NULL
            ORDER BY check_in DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn last_action(&self, employee_id: u64) -> Result<Option<LastAction>, StorageError> {
        let (max_in, max_out) =
            sqlx::query_as::<_, (Option<NaiveDateTime>, Option<NaiveDateTime>)>(
                "SELECT MAX(check_in), MAX(check_out) FROM attendance WHERE employee_id = ?",
            )
            .bind(employee_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(latest_action(max_in, max_out))
    }

    async fn insert_open(&self, new: &NewAttendance) -> Result<InsertOutcome, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (employee_id, date, check_in, check_out, duration_minutes,
             location_name, qr_code_id, latitude, longitude, status,
             device_info, ip_address)
            VALUES (?, ?, ?, NULL, 0, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.date)
        .bind(new.check_in)
        .bind(&new.location_name)
        .bind(&new.qr_code_id)
        .bind(new.coordinates.map(|c| c.latitude))
        .bind(new.coordinates.map(|c| c.longitude))
        .bind(new.status)
        .bind(&new.device_info)
        .bind(&new.ip_address)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_id())),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn close_session(&self, id: u64, patch: &ClosePatch) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?,
                duration_minutes = ?,
                location_name = COALESCE(?, location_name),
                latitude = COALESCE(?, latitude),
                longitude = COALESCE(?, longitude),
                device_info = COALESCE(?, device_info)
            WHERE id = ? AND check_out IS NULL
            "#,
        )
        .bind(patch.check_out)
        .bind(patch.duration_minutes)
        .bind(&patch.location_name)
        .bind(patch.coordinates.map(|c| c.latitude))
        .bind(patch.coordinates.map(|c| c.longitude))
        .bind(&patch.device_info)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_in_range(&self, filter: &LedgerFilter) -> Result<i64, StorageError> {
        let (conditions, binds) = filter_conditions(filter);
        let sql = format!(
            "SELECT COUNT(*) FROM attendance {}",
            where_clause(&conditions)
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for b in binds {
            query = match b {
                Bind::U64(v) => query.bind(v),
                Bind::Str(v) => query.bind(v),
                Bind::Date(v) => query.bind(v),
            };
        }

        Ok(query.fetch_one(&self.pool).await?)
    }

    async fn list(
        &self,
        filter: &LedgerFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        let (conditions, binds) = filter_conditions(filter);
        let offset = (page.max(1) - 1) * per_page;
        let sql = format!(
            "SELECT * FROM attendance {} ORDER BY date DESC, check_in DESC LIMIT ? OFFSET ?",
            where_clause(&conditions)
        );

        let mut query = sqlx::query_as::<_, AttendanceRecord>(&sql);
        for b in binds {
            query = match b {
                Bind::U64(v) => query.bind(v),
                Bind::Str(v) => query.bind(v),
                Bind::Date(v) => query.bind(v),
            };
        }
        query = query.bind(per_page as i64).bind(offset as i64);

        Ok(query.fetch_all(&self.pool).await?)
    }
}

/// Picks the later of the newest check-in and newest check-out; ties go
/// to the check-out, since it necessarily happened after its check-in.
pub(crate) fn latest_action(
    max_in: Option<NaiveDateTime>,
    max_out: Option<NaiveDateTime>,
) -> Option<LastAction> {
    match (max_in, max_out) {
        (Some(ci), Some(co)) if co >= ci => Some(LastAction {
            kind: ActionKind::CheckOut,
            at: co,
        }),
        (Some(ci), _) => Some(LastAction {
            kind: ActionKind::CheckIn,
            at: ci,
        }),
        (None, Some(co)) => Some(LastAction {
            kind: ActionKind::CheckOut,
            at: co,
        }),
        (None, None) => None,
    }
}

impl QrCodeStore for MySqlStore {
    async fn find_by_qr_code_id(
        &self,
        qr_code_id: &str,
    ) -> Result<Option<QrCode>, StorageError> {
        let qr = sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE qr_code_id = ?")
            .bind(qr_code_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(qr)
    }

    async fn find_by_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<QrCode>, StorageError> {
        let qr = sqlx::query_as::<_, QrCode>(
            "SELECT * FROM qr_codes WHERE UPPER(short_code) = UPPER(?)",
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(qr)
    }
}

impl EmployeeDirectory for MySqlStore {
    async fn is_active(&self, employee_id: u64) -> Result<bool, StorageError> {
        let active =
            sqlx::query_scalar::<_, bool>("SELECT is_active FROM employees WHERE id = ?")
                .bind(employee_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(active.unwrap_or(false))
    }
}

impl LocationRegistry for MySqlStore {
    async fn location_info(
        &self,
        location_id: u64,
    ) -> Result<Option<LocationInfo>, StorageError> {
        let row = sqlx::query_as::<_, (String, Option<f64>, Option<f64>)>(
            "SELECT name, latitude, longitude FROM locations WHERE id = ?",
        )
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(name, latitude, longitude)| LocationInfo {
            name,
            coordinates: match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
                _ => None,
            },
        }))
    }
}
