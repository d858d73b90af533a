//! Attendance recording core: QR validation, the check-in/check-out
//! state machine, and the ledger storage seam.

pub mod error;
pub mod ledger;
pub mod recorder;

#[cfg(test)]
pub mod memory;

pub use error::{RecordingError, StorageError};
pub use recorder::{AttendanceRecorder, RecordOutcome, RecordRequest};
