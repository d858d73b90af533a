//! Advisory proximity check between a claimed position and a QR code's
//! registered location. Never blocks an attendance action.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::location::Coordinates;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters (haversine).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

pub fn within_threshold(distance_m: f64, threshold_m: f64) -> bool {
    distance_m <= threshold_m
}

/// Outcome of the advisory check, reported back to the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProximityReport {
    pub location_valid: bool,
    pub location_message: String,
    pub distance_meters: f64,
}

/// Builds the report when both a claimed and a registered position are
/// known; `None` means the check could not be performed.
pub fn check_proximity(
    claimed: Option<Coordinates>,
    registered: Option<Coordinates>,
    threshold_m: f64,
) -> Option<ProximityReport> {
    let claimed = claimed?;
    let registered = registered?;

    let distance = distance_meters(
        claimed.latitude,
        claimed.longitude,
        registered.latitude,
        registered.longitude,
    );
    let valid = within_threshold(distance, threshold_m);
    let message = if valid {
        format!(
            "You are within {} meters of the expected location.",
            distance.round() as i64
        )
    } else {
        format!(
            "You are {} meters away from the expected location.",
            distance.round() as i64
        )
    };

    Some(ProximityReport {
        location_valid: valid,
        location_message: message,
        distance_meters: distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_along_the_equator() {
        // 0.001 degrees of longitude at the equator is about 111.2 m.
        let d = distance_meters(0.0, 0.0, 0.0, 0.001);
        assert!((d - 111.2).abs() < 0.5, "got {}", d);
        assert!(!within_threshold(d, 100.0));
    }

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(distance_meters(23.8103, 90.4125, 23.8103, 90.4125), 0.0);
    }

    #[test]
    fn report_requires_both_positions() {
        let here = Coordinates {
            latitude: 0.0,
            longitude: 0.0,
        };
        assert!(check_proximity(Some(here), None, 100.0).is_none());
        assert!(check_proximity(None, Some(here), 100.0).is_none());

        let report = check_proximity(
            Some(here),
            Some(Coordinates {
                latitude: 0.0,
                longitude: 0.001,
            }),
            100.0,
        )
        .unwrap();
        assert!(!report.location_valid);
        assert!(report.location_message.contains("away from"));
    }

    #[test]
    fn nearby_position_passes_the_threshold() {
        let report = check_proximity(
            Some(Coordinates {
                latitude: 0.0,
                longitude: 0.0,
            }),
            Some(Coordinates {
                latitude: 0.0,
                longitude: 0.0005,
            }),
            100.0,
        )
        .unwrap();
        assert!(report.location_valid);
        assert!(report.location_message.contains("within"));
    }
}
