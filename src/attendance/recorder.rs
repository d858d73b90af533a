//! The check-in/check-out state machine. Per employee and calendar day
//! a record moves NoSession -> Open -> Closed, and Closed is terminal:
//! one cycle per day. All reads and the final conditional write for one
//! employee happen under a per-employee async mutex, and the ledger's
//! unique (employee, date) key backstops the invariant even if two
//! processes race.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Timelike};
use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::attendance::error::RecordingError;
use crate::attendance::ledger::{
    AttendanceLedger, ClosePatch, EmployeeDirectory, InsertOutcome, LocationInfo,
    LocationRegistry, NewAttendance, QrCodeStore,
};
use crate::config::AttendancePolicy;
use crate::geo::{self, ProximityReport};
use crate::model::attendance::{ActionKind, AttendanceRecord, AttendanceStatus};
use crate::model::location::Coordinates;
use crate::model::qrcode::{QrCode, TokenRejection};
use crate::notify::{AttendanceEvent, EventNotifier};

/// Display name used when neither the caller nor the location registry
/// can name the place.
const FALLBACK_LOCATION_NAME: &str = "Office";

/// An attendance submission as the HTTP layer hands it over, with the
/// actor identity already verified upstream.
#[derive(Debug, Clone, Default)]
pub struct RecordRequest {
    pub qr_code_id: Option<String>,
    pub short_code: Option<String>,
    /// "check-in" / "check-out"; auto-detected when absent.
    pub requested_type: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Opaque device description, passed through as JSON text.
    pub device_info: Option<String>,
    /// Caller-supplied display name, preferred over the registry's.
    pub observed_location_name: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RecordOutcome {
    CheckedIn {
        timestamp: NaiveDateTime,
        location: String,
        status: AttendanceStatus,
        proximity: Option<ProximityReport>,
    },
    CheckedOut {
        timestamp: NaiveDateTime,
        duration_minutes: i64,
        location: String,
        proximity: Option<ProximityReport>,
    },
}

pub struct AttendanceRecorder<S, N> {
    store: S,
    notifier: N,
    policy: AttendancePolicy,
    /// Per-employee serialization points. Entries are cheap and evicted
    /// by capacity, so the map stays bounded.
    locks: Cache<u64, Arc<Mutex<()>>>,
}

impl<S, N> AttendanceRecorder<S, N>
where
    S: AttendanceLedger + QrCodeStore + EmployeeDirectory + LocationRegistry,
    N: EventNotifier,
{
    pub fn new(store: S, notifier: N, policy: AttendancePolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
            locks: Cache::new(10_000),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &AttendancePolicy {
        &self.policy
    }

    /// Records one attendance action for `actor_id` at `now`. Resolves
    /// and validates the QR code, determines the effective action,
    /// enforces cooldown and session rules, then mutates the ledger.
    /// Nothing is persisted and no event is emitted on any rejection.
    pub async fn record(
        &self,
        actor_id: u64,
        req: RecordRequest,
        now: NaiveDateTime,
    ) -> Result<RecordOutcome, RecordingError> {
        if !self.store.is_active(actor_id).await? {
            return Err(RecordingError::EmployeeInactive);
        }

        let qr = self.resolve_token(&req).await?;
        qr.usable_by(actor_id, now).map_err(|r| match r {
            TokenRejection::Inactive | TokenRejection::Expired => {
                RecordingError::TokenExpiredOrInactive
            }
            TokenRejection::WrongEmployeeScope => RecordingError::WrongEmployeeScope,
        })?;

        let location = self.store.location_info(qr.location_id).await?;

        // Advisory only; reported back, never blocking.
        let proximity = geo::check_proximity(
            req.coordinates,
            location.as_ref().and_then(|l| l.coordinates),
            self.policy.geofence_radius_m,
        );

        // Everything from the open-session read to the conditional
        // write runs under the employee's lock.
        let lock = self
            .locks
            .get_with(actor_id, async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        let today = now.date();

        let effective = match &req.requested_type {
            Some(raw) => raw.parse::<ActionKind>().map_err(|_| {
                RecordingError::InvalidAttendanceType { given: raw.clone() }
            })?,
            None => {
                if self.store.find_open_session(actor_id, today).await?.is_some() {
                    ActionKind::CheckOut
                } else {
                    ActionKind::CheckIn
                }
            }
        };
        debug!(actor_id, %effective, "resolved attendance action");

        // Spam suppression, regardless of action type.
        if let Some(last) = self.store.last_action(actor_id).await? {
            let elapsed = (now - last.at).num_seconds();
            if elapsed < self.policy.cooldown_secs {
                return Err(RecordingError::CooldownActive {
                    last_action: last.kind,
                    last_action_time: last.at,
                    seconds_remaining: self.policy.cooldown_secs - elapsed,
                    retry_after: last.at + Duration::seconds(self.policy.cooldown_secs),
                });
            }
        }

        match effective {
            ActionKind::CheckIn => {
                self.check_in(actor_id, &qr, location, proximity, &req, now)
                    .await
            }
            ActionKind::CheckOut => self.check_out(actor_id, proximity, &req, now).await,
        }
    }

    async fn resolve_token(&self, req: &RecordRequest) -> Result<QrCode, RecordingError> {
        let found = if let Some(qr_code_id) = &req.qr_code_id {
            self.store.find_by_qr_code_id(qr_code_id).await?
        } else if let Some(short_code) = &req.short_code {
            self.store.find_by_short_code(short_code).await?
        } else {
            return Err(RecordingError::MissingIdentifier);
        };

        found.ok_or(RecordingError::InvalidToken)
    }

    async fn check_in(
        &self,
        actor_id: u64,
        qr: &QrCode,
        location: Option<LocationInfo>,
        proximity: Option<ProximityReport>,
        req: &RecordRequest,
        now: NaiveDateTime,
    ) -> Result<RecordOutcome, RecordingError> {
        if self
            .store
            .find_open_session(actor_id, now.date())
            .await?
            .is_some()
        {
            return Err(RecordingError::AlreadyOpenToday);
        }

        let status = if now.hour() >= self.policy.late_after_hour {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::OnTime
        };

        let location_name = req
            .observed_location_name
            .clone()
            .or(location.map(|l| l.name))
            .unwrap_or_else(|| FALLBACK_LOCATION_NAME.to_string());

        let new = NewAttendance {
            employee_id: actor_id,
            date: now.date(),
            check_in: now,
            status,
            location_name: location_name.clone(),
            qr_code_id: Some(qr.qr_code_id.clone()),
            coordinates: req.coordinates,
            device_info: req.device_info.clone(),
            ip_address: req.ip_address.clone(),
        };

        match self.store.insert_open(&new).await? {
            InsertOutcome::Inserted(id) => {
                info!(actor_id, record_id = id, %status, "check-in recorded");
                self.notifier
                    .emit(AttendanceEvent::Recorded(record_from_new(id, &new)));

                Ok(RecordOutcome::CheckedIn {
                    timestamp: now,
                    location: location_name,
                    status,
                    proximity,
                })
            }
            // Lost a race, or the day's cycle is already closed. The
            // unique (employee, date) key rejected the row either way;
            // re-read to tell the two apart.
            InsertOutcome::Conflict => {
                if self
                    .store
                    .find_open_session(actor_id, now.date())
                    .await?
                    .is_some()
                {
                    Err(RecordingError::AlreadyOpenToday)
                } else {
                    Err(RecordingError::AlreadyCompletedToday)
                }
            }
        }
    }

    async fn check_out(
        &self,
        actor_id: u64,
        proximity: Option<ProximityReport>,
        req: &RecordRequest,
        now: NaiveDateTime,
    ) -> Result<RecordOutcome, RecordingError> {
        let open = self
            .store
            .find_open_session(actor_id, now.date())
            .await?
            .ok_or(RecordingError::NoOpenSession)?;

        let duration_minutes =
            ((now - open.check_in).num_seconds() as f64 / 60.0).round() as i64;

        let patch = ClosePatch {
            check_out: now,
            duration_minutes,
            location_name: req.observed_location_name.clone(),
            coordinates: req.coordinates,
            device_info: req.device_info.clone(),
        };

        // Conditional on the record still being open; a concurrent
        // close wins and this request is told there is no session.
        if !self.store.close_session(open.id, &patch).await? {
            return Err(RecordingError::NoOpenSession);
        }

        let closed = record_with_patch(open, &patch);
        info!(
            actor_id,
            record_id = closed.id,
            duration_minutes,
            "check-out recorded"
        );
        let location = closed.location_name.clone();
        self.notifier.emit(AttendanceEvent::Updated(closed));

        Ok(RecordOutcome::CheckedOut {
            timestamp: now,
            duration_minutes,
            location,
            proximity,
        })
    }
}

fn record_from_new(id: u64, new: &NewAttendance) -> AttendanceRecord {
    AttendanceRecord {
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
    }
}

fn record_with_patch(mut record: AttendanceRecord, patch: &ClosePatch) -> AttendanceRecord {
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
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::memory::MemoryStore;
    use crate::model::qrcode::QrKind;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Mutex as StdMutex;

    const ALICE: u64 = 1;
    const BOB: u64 = 2;
    const OFFICE_LOCATION: u64 = 10;

    /// Notifier that captures emitted events for assertions.
    #[derive(Default)]
    struct CapturingNotifier {
        events: StdMutex<Vec<AttendanceEvent>>,
    }

    impl EventNotifier for &CapturingNotifier {
        fn emit(&self, event: AttendanceEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl CapturingNotifier {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|e| e.name()).collect()
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn session_token() -> QrCode {
        QrCode {
            id: 1,
            qr_code_id: "qr-main".into(),
            short_code: "AB12CD".into(),
            name: "Main entrance".into(),
            location_id: OFFICE_LOCATION,
            description: None,
            created_by: 99,
            valid_from: at(0, 0, 0),
            valid_until: at(23, 59, 59),
            kind: QrKind::Session,
            specific_employee_id: None,
            is_active: true,
            image_url: None,
        }
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::default();
        store.add_employee(ALICE, true);
        store.add_employee(BOB, true);
        store.add_location(
            OFFICE_LOCATION,
            "Head Office",
            Some(Coordinates {
                latitude: 0.0,
                longitude: 0.0,
            }),
        );
        store.add_qr_code(session_token());
        store
    }

    fn recorder<'a>(
        store: MemoryStore,
        notifier: &'a CapturingNotifier,
        policy: AttendancePolicy,
    ) -> AttendanceRecorder<MemoryStore, &'a CapturingNotifier> {
        AttendanceRecorder::new(store, notifier, policy)
    }

    fn by_short_code(code: &str) -> RecordRequest {
        RecordRequest {
            short_code: Some(code.into()),
            ..Default::default()
        }
    }

    fn by_id(id: &str) -> RecordRequest {
        RecordRequest {
            qr_code_id: Some(id.into()),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn check_in_creates_an_open_on_time_record() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        // Lowercase short code resolves case-insensitively.
        let outcome = rec
            .record(ALICE, by_short_code("ab12cd"), at(8, 0, 0))
            .await
            .unwrap();

        match outcome {
            RecordOutcome::CheckedIn {
                timestamp,
                location,
                status,
                ..
            } => {
                assert_eq!(timestamp, at(8, 0, 0));
                assert_eq!(location, "Head Office");
                assert_eq!(status, AttendanceStatus::OnTime);
            }
            other => panic!("expected check-in, got {:?}", other),
        }

        let records = rec.store().records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_open());
        assert_eq!(records[0].duration_minutes, 0);
        assert_eq!(notifier.names(), vec!["attendance:recorded"]);
    }

    #[actix_web::test]
    async fn late_threshold_is_nine_o_clock_sharp() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        let on_time = rec
            .record(ALICE, by_short_code("AB12CD"), at(8, 59, 59))
            .await
            .unwrap();
        assert!(matches!(
            on_time,
            RecordOutcome::CheckedIn {
                status: AttendanceStatus::OnTime,
                ..
            }
        ));

        let late = rec
            .record(BOB, by_short_code("AB12CD"), at(9, 0, 0))
            .await
            .unwrap();
        assert!(matches!(
            late,
            RecordOutcome::CheckedIn {
                status: AttendanceStatus::Late,
                ..
            }
        ));
    }

    #[actix_web::test]
    async fn repeat_inside_cooldown_is_rejected_without_a_write() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        rec.record(ALICE, by_short_code("AB12CD"), at(8, 0, 0))
            .await
            .unwrap();

        // 4:59 later: one second of cooldown left.
        let err = rec
            .record(ALICE, by_short_code("AB12CD"), at(8, 4, 59))
            .await
            .unwrap_err();
        match err {
            RecordingError::CooldownActive {
                last_action,
                last_action_time,
                seconds_remaining,
                retry_after,
            } => {
                assert_eq!(last_action, ActionKind::CheckIn);
                assert_eq!(last_action_time, at(8, 0, 0));
                assert_eq!(seconds_remaining, 1);
                assert_eq!(retry_after, at(8, 5, 0));
            }
            other => panic!("expected cooldown, got {:?}", other),
        }

        assert_eq!(rec.store().records().len(), 1);
        assert_eq!(notifier.names().len(), 1);
    }

    #[actix_web::test]
    async fn cooldown_expires_exactly_at_the_window_edge() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        rec.record(ALICE, by_short_code("AB12CD"), at(8, 0, 0))
            .await
            .unwrap();

        // Exactly five minutes later the cooldown no longer applies and
        // auto-detection resolves to check-out.
        let outcome = rec
            .record(ALICE, by_short_code("AB12CD"), at(8, 5, 0))
            .await
            .unwrap();
        match outcome {
            RecordOutcome::CheckedOut {
                duration_minutes, ..
            } => assert_eq!(duration_minutes, 5),
            other => panic!("expected check-out, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn forced_check_in_with_open_session_is_rejected() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        rec.record(ALICE, by_short_code("AB12CD"), at(8, 0, 0))
            .await
            .unwrap();

        let mut req = by_short_code("AB12CD");
        req.requested_type = Some("check-in".into());
        let err = rec.record(ALICE, req, at(8, 10, 0)).await.unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyOpenToday));
        assert_eq!(rec.store().records().len(), 1);
    }

    #[actix_web::test]
    async fn full_day_duration_is_rounded_minutes() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        rec.record(ALICE, by_short_code("AB12CD"), at(8, 0, 0))
            .await
            .unwrap();
        let outcome = rec
            .record(ALICE, by_short_code("AB12CD"), at(17, 0, 0))
            .await
            .unwrap();

        match outcome {
            RecordOutcome::CheckedOut {
                duration_minutes,
                timestamp,
                ..
            } => {
                assert_eq!(duration_minutes, 540);
                assert_eq!(timestamp, at(17, 0, 0));
            }
            other => panic!("expected check-out, got {:?}", other),
        }

        let records = rec.store().records();
        assert_eq!(records[0].check_out, Some(at(17, 0, 0)));
        assert_eq!(records[0].duration_minutes, 540);
        assert_eq!(
            notifier.names(),
            vec!["attendance:recorded", "attendance:updated"]
        );
    }

    #[actix_web::test]
    async fn duration_rounds_half_minutes_up() {
        let notifier = CapturingNotifier::default();
        let policy = AttendancePolicy {
            cooldown_secs: 0,
            ..Default::default()
        };
        let rec = recorder(store(), &notifier, policy);

        rec.record(ALICE, by_short_code("AB12CD"), at(8, 0, 0))
            .await
            .unwrap();
        let outcome = rec
            .record(ALICE, by_short_code("AB12CD"), at(8, 1, 30))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            RecordOutcome::CheckedOut {
                duration_minutes: 2,
                ..
            }
        ));
    }

    #[actix_web::test]
    async fn check_out_without_open_session_is_rejected() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        let mut req = by_short_code("AB12CD");
        req.requested_type = Some("check-out".into());
        let err = rec.record(ALICE, req, at(9, 0, 0)).await.unwrap_err();
        assert!(matches!(err, RecordingError::NoOpenSession));
        assert!(rec.store().records().is_empty());
    }

    #[actix_web::test]
    async fn one_cycle_per_day_second_check_in_rejected() {
        let notifier = CapturingNotifier::default();
        let policy = AttendancePolicy {
            cooldown_secs: 0,
            ..Default::default()
        };
        let rec = recorder(store(), &notifier, policy);

        rec.record(ALICE, by_short_code("AB12CD"), at(8, 0, 0))
            .await
            .unwrap();
        rec.record(ALICE, by_short_code("AB12CD"), at(12, 0, 0))
            .await
            .unwrap();

        // Auto-detect now resolves to check-in again, but the closed
        // cycle blocks it.
        let err = rec
            .record(ALICE, by_short_code("AB12CD"), at(14, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyCompletedToday));
        assert_eq!(rec.store().records().len(), 1);
    }

    #[actix_web::test]
    async fn concurrent_check_ins_leave_a_single_open_record() {
        let notifier = CapturingNotifier::default();
        let policy = AttendancePolicy {
            cooldown_secs: 0,
            ..Default::default()
        };
        let rec = recorder(store(), &notifier, policy);

        let mut forced = by_short_code("AB12CD");
        forced.requested_type = Some("check-in".into());

        let (a, b) = futures::join!(
            rec.record(ALICE, forced.clone(), at(8, 0, 0)),
            rec.record(ALICE, forced.clone(), at(8, 0, 0)),
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one check-in may win: {:?} / {:?}", a, b);

        let records = rec.store().records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_open());
    }

    #[actix_web::test]
    async fn scoped_token_enforced_even_when_time_valid() {
        let notifier = CapturingNotifier::default();
        let store = store();
        let mut scoped = session_token();
        scoped.id = 2;
        scoped.qr_code_id = "qr-bob-only".into();
        scoped.short_code = "ZZ99ZZ".into();
        scoped.kind = QrKind::EmployeeSpecific;
        scoped.specific_employee_id = Some(BOB);
        store.add_qr_code(scoped);
        let rec = recorder(store, &notifier, AttendancePolicy::default());

        let err = rec
            .record(ALICE, by_id("qr-bob-only"), at(8, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordingError::WrongEmployeeScope));
        assert!(rec.store().records().is_empty());

        assert!(rec.record(BOB, by_id("qr-bob-only"), at(8, 0, 0)).await.is_ok());
    }

    #[actix_web::test]
    async fn expired_and_inactive_tokens_are_rejected() {
        let notifier = CapturingNotifier::default();
        let store = store();
        let mut disabled = session_token();
        disabled.id = 3;
        disabled.qr_code_id = "qr-disabled".into();
        disabled.short_code = "DD22DD".into();
        disabled.is_active = false;
        store.add_qr_code(disabled);
        let rec = recorder(store, &notifier, AttendancePolicy::default());

        let err = rec
            .record(ALICE, by_id("qr-disabled"), at(8, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordingError::TokenExpiredOrInactive));

        // Past the validity window of the main token.
        let err = rec
            .record(
                ALICE,
                by_id("qr-main"),
                at(23, 59, 59) + Duration::seconds(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RecordingError::TokenExpiredOrInactive));
    }

    #[actix_web::test]
    async fn unknown_token_and_missing_identifier() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        let err = rec
            .record(ALICE, by_id("nope"), at(8, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordingError::InvalidToken));

        let err = rec
            .record(ALICE, RecordRequest::default(), at(8, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordingError::MissingIdentifier));
    }

    #[actix_web::test]
    async fn inactive_employee_cannot_record() {
        let notifier = CapturingNotifier::default();
        let store = store();
        store.add_employee(3, false);
        let rec = recorder(store, &notifier, AttendancePolicy::default());

        let err = rec
            .record(3, by_short_code("AB12CD"), at(8, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordingError::EmployeeInactive));
    }

    #[actix_web::test]
    async fn invalid_attendance_type_is_a_client_error() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        let mut req = by_short_code("AB12CD");
        req.requested_type = Some("lunch-break".into());
        let err = rec.record(ALICE, req, at(8, 0, 0)).await.unwrap_err();
        match err {
            RecordingError::InvalidAttendanceType { given } => {
                assert_eq!(given, "lunch-break")
            }
            other => panic!("expected invalid type, got {:?}", other),
        }
        assert!(rec.store().records().is_empty());
    }

    #[actix_web::test]
    async fn location_name_prefers_caller_then_registry_then_fallback() {
        let notifier = CapturingNotifier::default();
        let store = store();
        // Token pointing at a location the registry does not know.
        let mut orphan = session_token();
        orphan.id = 4;
        orphan.qr_code_id = "qr-orphan".into();
        orphan.short_code = "EE33EE".into();
        orphan.location_id = 999;
        store.add_qr_code(orphan);
        let policy = AttendancePolicy {
            cooldown_secs: 0,
            ..Default::default()
        };
        let rec = recorder(store, &notifier, policy);

        let mut named = by_short_code("AB12CD");
        named.observed_location_name = Some("Rooftop".into());
        let outcome = rec.record(ALICE, named, at(8, 0, 0)).await.unwrap();
        assert!(
            matches!(outcome, RecordOutcome::CheckedIn { ref location, .. } if location == "Rooftop")
        );

        let outcome = rec
            .record(BOB, by_id("qr-orphan"), at(8, 0, 0))
            .await
            .unwrap();
        assert!(
            matches!(outcome, RecordOutcome::CheckedIn { ref location, .. } if location == "Office")
        );
    }

    #[actix_web::test]
    async fn proximity_is_advisory_and_never_blocks() {
        let notifier = CapturingNotifier::default();
        let rec = recorder(store(), &notifier, AttendancePolicy::default());

        let mut req = by_short_code("AB12CD");
        // About 111 km from the registered office.
        req.coordinates = Some(Coordinates {
            latitude: 1.0,
            longitude: 0.0,
        });
        let outcome = rec.record(ALICE, req, at(8, 0, 0)).await.unwrap();

        match outcome {
            RecordOutcome::CheckedIn { proximity, .. } => {
                let report = proximity.expect("both positions were known");
                assert!(!report.location_valid);
                assert!(report.distance_meters > 100_000.0);
            }
            other => panic!("expected check-in, got {:?}", other),
        }
        assert_eq!(rec.store().records().len(), 1);
    }

    #[actix_web::test]
    async fn check_out_retains_check_in_details_unless_resupplied() {
        let notifier = CapturingNotifier::default();
        let policy = AttendancePolicy {
            cooldown_secs: 0,
            ..Default::default()
        };
        let rec = recorder(store(), &notifier, policy);

        let mut req = by_short_code("AB12CD");
        req.coordinates = Some(Coordinates {
            latitude: 0.0,
            longitude: 0.0001,
        });
        req.device_info = Some(r#"{"os":"android"}"#.into());
        rec.record(ALICE, req, at(8, 0, 0)).await.unwrap();

        // Bare check-out: no coordinates, no device, no name.
        rec.record(ALICE, by_short_code("AB12CD"), at(17, 0, 0))
            .await
            .unwrap();

        let records = rec.store().records();
        assert_eq!(records[0].location_name, "Head Office");
        assert_eq!(records[0].latitude, Some(0.0));
        assert_eq!(records[0].longitude, Some(0.0001));
        assert_eq!(records[0].device_info.as_deref(), Some(r#"{"os":"android"}"#));
    }
}
