pub mod attendance;
pub mod employee;
pub mod location;
pub mod qrcode;
pub mod role;
