//! `FacilityEvent` and the typed `ChangedFields` sum.
//!
//! `changed_fields` is modeled as a tagged enum rather than a stringly-typed
//! JSON map (see the design notes on stringly-typed payloads): each variant
//! names exactly the attributes that kind of mutation can touch, while the
//! serde representation keeps the observable wire shape a consumer expects
//! for each `event_type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::facility::{CapacityStatus, Location};

/// The kind of mutation a `FacilityEvent` reports, and the fields it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangedFields {
    CapacityUpdate {
        status: CapacityStatus,
        avg_wait_minutes: Option<u32>,
        urgent_care_available: bool,
    },
    WardCapacityUpdate {
        ward_id: String,
        status: CapacityStatus,
    },
    WaitTimeUpdate {
        avg_wait_minutes: u32,
    },
    UrgentCareUpdate {
        available: bool,
    },
    ServiceHealthUpdate {
        service: String,
        healthy: bool,
    },
    ServiceAvailabilityUpdate {
        service: String,
        available: bool,
    },
    Heartbeat,
}

impl ChangedFields {
    /// The `event_type` discriminant as it appears on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            ChangedFields::CapacityUpdate { .. } => "capacity_update",
            ChangedFields::WardCapacityUpdate { .. } => "ward_capacity_update",
            ChangedFields::WaitTimeUpdate { .. } => "wait_time_update",
            ChangedFields::UrgentCareUpdate { .. } => "urgent_care_update",
            ChangedFields::ServiceHealthUpdate { .. } => "service_health_update",
            ChangedFields::ServiceAvailabilityUpdate { .. } => "service_availability_update",
            ChangedFields::Heartbeat => "heartbeat",
        }
    }
}

/// A facility mutation, propagated over the event bus and to SSE subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityEvent {
    pub id: String,
    pub facility_id: String,
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    pub changed_fields: ChangedFields,
}

impl FacilityEvent {
    /// Builds a new event with a process-unique id (`timestamp_hex + 8 random hex chars`).
    pub fn new(facility_id: impl Into<String>, location: Location, changed_fields: ChangedFields) -> Self {
        Self {
            id: new_event_id(),
            facility_id: facility_id.into(),
            timestamp: Utc::now(),
            location,
            changed_fields,
        }
    }

    /// The `event_type` discriminant, delegated to `changed_fields`.
    pub fn event_type(&self) -> &'static str {
        self.changed_fields.event_type()
    }
}

fn new_event_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let event = FacilityEvent::new(
            "f1",
            Location { lat: 6.5, lon: 3.4 },
            ChangedFields::CapacityUpdate {
                status: CapacityStatus::Limited,
                avg_wait_minutes: Some(30),
                urgent_care_available: true,
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let decoded: FacilityEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, decoded);
        assert_eq!(decoded.event_type(), "capacity_update");
    }

    #[test]
    fn event_ids_are_unique_within_a_process() {
        let a = new_event_id();
        let b = new_event_id();
        assert_ne!(a, b);
    }
}
