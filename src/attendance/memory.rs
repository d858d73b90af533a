//! In-memory store for recorder tests. Mirrors the MySQL store's
//! conditional-write semantics, including the unique (employee, date)
//! key behind `insert_open`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::attendance::error::StorageError;
use crate::attendance::ledger::{
    AttendanceLedger, ClosePatch, EmployeeDirectory, InsertOutcome, LastAction, LedgerFilter,
    LocationInfo, LocationRegistry, NewAttendance, QrCodeStore, latest_action,
};
use crate::model::attendance::AttendanceRecord;
use crate::model::location::Coordinates;
use crate::model::qrcode::QrCode;

#[derive(Default)]
struct Inner {
    next_id: u64,
    records: Vec<AttendanceRecord>,
    qr_codes: Vec<QrCode>,
    employees: HashMap<u64, bool>,
    locations: HashMap<u64, LocationInfo>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn add_employee(&self, id: u64, active: bool) {
        self.inner.lock().unwrap().employees.insert(id, active);
    }

    pub fn add_location(&self, id: u64, name: &str, coordinates: Option<Coordinates>) {
        self.inner.lock().unwrap().locations.insert(
            id,
            LocationInfo {
                name: name.to_string(),
                coordinates,
            },
        );
    }

    pub fn add_qr_code(&self, qr: QrCode) {
        self.inner.lock().unwrap().qr_codes.push(qr);
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.inner.lock().unwrap().records.clone()
    }
}

fn matches_filter(record: &AttendanceRecord, filter: &LedgerFilter) -> bool {
    if let Some(employee_id) = filter.employee_id {
        if record.employee_id != employee_id {
            return false;
        }
    }
    if let Some(from) = filter.date_from {
        if record.date < from {
            return false;
        }
    }
    if let Some(to) = filter.date_to {
        if record.date > to {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if record.status != status {
            return false;
        }
    }
    true
}

impl AttendanceLedger for MemoryStore {
    async fn find_open_session(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|r| r.employee_id == employee_id && r.date == day && r.is_open())
            .max_by_key(|r| r.check_in)
            .cloned())
    }

    async fn last_action(&self, employee_id: u64) -> Result<Option<LastAction>, StorageError> {
        let inner = self.inner.lock().unwrap();
        let max_in = inner
            .records
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .map(|r| r.check_in)
            .max();
        let max_out = inner
            .records
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .filter_map(|r| r.check_out)
            .max();
        Ok(latest_action(max_in, max_out))
    }

    async fn insert_open(&self, new: &NewAttendance) -> Result<InsertOutcome, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .records
            .iter()
            .any(|r| r.employee_id == new.employee_id && r.date == new.date)
        {
            return Ok(InsertOutcome::Conflict);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.push(AttendanceRecord {
            id,
            employee_id: new.employee_id,
            date: new.date,
            check_in: new.check_in,
            check_out: None,
            duration_minutes: 0,
            location_name: new.location_name.clone(),
            qr_code_id: new.qr_code_id.clone(),
            latitude: new.coordinates.map(|c| c.latitude),
            longitude: new.coordinates.map(|c| c.longitude),
            status: new.status,
            device_info: new.device_info.clone(),
            ip_address: new.ip_address.clone(),
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn close_session(&self, id: u64, patch: &ClosePatch) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner
            .records
            .iter_mut()
            .find(|r| r.id == id && r.is_open())
        else {
            return Ok(false);
        };

        record.check_out = Some(patch.check_out);
        record.duration_minutes = patch.duration_minutes;
        if let Some(name) = &patch.location_name {
            record.location_name = name.clone();
        }
        if let Some(c) = patch.coordinates {
            record.latitude = Some(c.latitude);
            record.longitude = Some(c.longitude);
        }
        if let Some(device) = &patch.device_info {
            record.device_info = Some(device.clone());
        }
        Ok(true)
    }

    async fn count_in_range(&self, filter: &LedgerFilter) -> Result<i64, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|r| matches_filter(r, filter))
            .count() as i64)
    }

    async fn list(
        &self,
        filter: &LedgerFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        let inner = self.inner.lock().unwrap();
        let mut matched: Vec<_> = inner
            .records
            .iter()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.check_in.cmp(&a.check_in));

        let skip = ((page.max(1) - 1) * per_page) as usize;
        Ok(matched
            .into_iter()
            .skip(skip)
            .take(per_page as usize)
            .collect())
    }
}

impl QrCodeStore for MemoryStore {
    async fn find_by_qr_code_id(
        &self,
        qr_code_id: &str,
    ) -> Result<Option<QrCode>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .qr_codes
            .iter()
            .find(|q| q.qr_code_id == qr_code_id)
            .cloned())
    }

    async fn find_by_short_code(
        &self,
        short_code: &str,
    ) -> Result<Option<QrCode>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .qr_codes
            .iter()
            .find(|q| q.short_code.eq_ignore_ascii_case(short_code))
            .cloned())
    }
}

impl EmployeeDirectory for MemoryStore {
    async fn is_active(&self, employee_id: u64) -> Result<bool, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.employees.get(&employee_id).copied().unwrap_or(false))
    }
}

impl LocationRegistry for MemoryStore {
    async fn location_info(
        &self,
        location_id: u64,
    ) -> Result<Option<LocationInfo>, StorageError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.locations.get(&location_id).cloned())
    }
}
