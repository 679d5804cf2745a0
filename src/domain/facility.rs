//! The `Facility` entity and its value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;

/// A physical street address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

/// A geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// Validates the invariant `-90 <= lat <= 90`, `-180 <= lon <= 180`.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(RepositoryError::Validation(format!(
                "latitude {} out of range [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(RepositoryError::Validation(format!(
                "longitude {} out of range [-180, 180]",
                self.lon
            )));
        }
        Ok(())
    }

    /// Great-circle distance to `other`, in kilometers.
    pub fn haversine_km(&self, other: Location) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }

    /// Coarse region cell id for pub/sub fan-out, `floor(lat*10)_floor(lon*10)`.
    pub fn region_cell(&self) -> String {
        format!(
            "{}_{}",
            (self.lat * 10.0).floor() as i64,
            (self.lon * 10.0).floor() as i64
        )
    }
}

/// Capacity status reported by a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStatus {
    Available,
    Limited,
    Busy,
    Unknown,
}

/// A single ward's reported capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ward {
    pub id: String,
    pub name: String,
    pub status: CapacityStatus,
}

/// A healthcare facility record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub facility_type: String,
    pub address: Address,
    pub location: Location,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: u32,
    pub capacity_status: CapacityStatus,
    pub avg_wait_minutes: Option<u32>,
    pub urgent_care: bool,
    pub wards: Vec<Ward>,
    pub accepted_insurance: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Facility {
    /// Validates the entity invariants: coordinate bounds and `updated >= created`.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        self.location.validate()?;
        if self.updated_at < self.created_at {
            return Err(RepositoryError::Validation(
                "updated_at must not precede created_at".into(),
            ));
        }
        Ok(())
    }
}
