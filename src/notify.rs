//! Fire-and-forget event sink the recorder announces successful
//! mutations to. The real-time push transport lives behind this seam.

use serde::Serialize;
use tracing::info;

use crate::model::attendance::AttendanceRecord;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "record")]
pub enum AttendanceEvent {
    #[serde(rename = "attendance:recorded")]
    Recorded(AttendanceRecord),
    #[serde(rename = "attendance:updated")]
    Updated(AttendanceRecord),
}

impl AttendanceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AttendanceEvent::Recorded(_) => "attendance:recorded",
            AttendanceEvent::Updated(_) => "attendance:updated",
        }
    }

    pub fn record(&self) -> &AttendanceRecord {
        match self {
            AttendanceEvent::Recorded(r) | AttendanceEvent::Updated(r) => r,
        }
    }
}

pub trait EventNotifier: Send + Sync {
    fn emit(&self, event: AttendanceEvent);
}

/// Default sink: structured log lines. Swapped out for a websocket
/// broadcaster when a dashboard is attached.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl EventNotifier for LogNotifier {
    fn emit(&self, event: AttendanceEvent) {
        let record = event.record();
        info!(
            event = event.name(),
            record_id = record.id,
            employee_id = record.employee_id,
            "attendance event"
        );
    }
}
