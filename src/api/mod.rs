pub mod attendance;
pub mod employee;
pub mod location;
pub mod qrcode;

use crate::attendance::AttendanceRecorder;
use crate::attendance::ledger::MySqlStore;
use crate::notify::LogNotifier;

/// The recorder as wired up in `main`.
pub type AppRecorder = AttendanceRecorder<MySqlStore, LogNotifier>;
