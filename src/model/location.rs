use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A claimed or registered geographic position, WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = 23.8103)]
    pub latitude: f64,
    #[schema(example = 90.4125)]
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Location {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Head Office")]
    pub name: String,

    #[schema(example = "12 Gulshan Ave, Dhaka", nullable = true)]
    pub address: Option<String>,

    #[schema(nullable = true)]
    pub description: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub is_active: bool,

    #[schema(example = 1)]
    pub created_by: u64,
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }
}
