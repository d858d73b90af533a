use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterReq {
    pub employee_code: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
}

/// Credential columns of the employees table, fetched at login.
#[derive(FromRow)]
pub struct EmployeeAuthRow {
    pub id: u64,
    pub email: String,
    pub password_hash: String,
    pub role_id: u8,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The verified actor; everything downstream keys on this.
    pub employee_id: u64,
    pub sub: String,
    pub role: u8,
    pub exp: usize,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
