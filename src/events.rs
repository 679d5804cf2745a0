//! Publish/subscribe event bus keyed by facility and by geographic region.
//!
//! Channels: a well-known global channel, one per facility, and one per
//! coarse region cell. A publish emits the same event once on each of the
//! (global, facility, region-cell) channels that apply — three publishes per
//! mutation. Delivery is at-least-once, unordered across channels, ordered
//! per channel per subscriber; there is no durable replay. The bus fails
//! open: a publish with no subscribers is not an error, and subscribers
//! that lag behind simply miss the events they couldn't keep up with (lag is
//! the SSE hub's problem to react to, not the bus's).

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::domain::event::FacilityEvent;
use crate::domain::facility::Location;

pub const GLOBAL_CHANNEL: &str = "facility:events:global";

/// Per-channel broadcast capacity. A lagging subscriber observes
/// `RecvError::Lagged` once this many unconsumed events have piled up.
const CHANNEL_CAPACITY: usize = 256;

fn facility_channel(facility_id: &str) -> String {
    format!("facility:events:{facility_id}")
}

fn region_channel(cell_id: &str) -> String {
    format!("facility:events:region:{cell_id}")
}

/// Shared publish/subscribe bus. Cheap to clone; every clone shares the same
/// channel registry.
#[derive(Clone, Default)]
pub struct EventBus {
    channels: std::sync::Arc<DashMap<String, broadcast::Sender<FacilityEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<FacilityEvent> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribes to a named channel, creating it if it doesn't exist yet.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<FacilityEvent> {
        self.sender_for(channel).subscribe()
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<FacilityEvent> {
        self.subscribe(GLOBAL_CHANNEL)
    }

    pub fn subscribe_facility(&self, facility_id: &str) -> broadcast::Receiver<FacilityEvent> {
        self.subscribe(&facility_channel(facility_id))
    }

    pub fn subscribe_region(&self, cell_id: &str) -> broadcast::Receiver<FacilityEvent> {
        self.subscribe(&region_channel(cell_id))
    }

    /// Publishes `event` once on the global channel, the facility's own
    /// channel, and its region-cell channel. A channel with no subscribers
    /// is not an error — the bus fails open.
    #[tracing::instrument(skip(self, event), fields(facility_id = %event.facility_id, event_type = event.event_type()))]
    pub fn publish(&self, event: FacilityEvent) {
        let cell = event.location.region_cell();
        self.publish_on(GLOBAL_CHANNEL, event.clone());
        self.publish_on(&facility_channel(&event.facility_id), event.clone());
        self.publish_on(&region_channel(&cell), event);
    }

    fn publish_on(&self, channel: &str, event: FacilityEvent) {
        let sender = self.sender_for(channel);
        if sender.send(event).is_err() {
            tracing::debug!(channel, "published with no subscribers");
        }
    }
}

/// Region selector used by regional SSE subscriptions. The resolved design
/// (see open questions) evaluates this filter against the global channel
/// rather than reading from a region-cell channel directly, so a facility
/// near a cell boundary still reaches subscribers whose radius covers it.
#[derive(Debug, Clone, Copy)]
pub struct RegionSelector {
    pub center: Location,
    pub radius_km: f64,
}

impl RegionSelector {
    pub fn matches(&self, location: Location) -> bool {
        self.center.haversine_km(location) <= self.radius_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::ChangedFields;
    use crate::domain::facility::CapacityStatus;

    fn sample_event(facility_id: &str, location: Location) -> FacilityEvent {
        FacilityEvent::new(
            facility_id,
            location,
            ChangedFields::CapacityUpdate {
                status: CapacityStatus::Limited,
                avg_wait_minutes: Some(10),
                urgent_care_available: false,
            },
        )
    }

    #[tokio::test]
    async fn subscriber_on_facility_channel_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_facility("f1");

        bus.publish(sample_event("f1", Location { lat: 6.5, lon: 3.4 }));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.facility_id, "f1");
    }

    #[tokio::test]
    async fn subscriber_on_other_facility_channel_receives_nothing() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_facility("f2");

        bus.publish(sample_event("f1", Location { lat: 6.5, lon: 3.4 }));

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn global_subscriber_receives_every_facilitys_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_global();

        bus.publish(sample_event("f1", Location { lat: 6.5, lon: 3.4 }));
        bus.publish(sample_event("f2", Location { lat: 9.0, lon: 7.4 }));

        assert_eq!(rx.recv().await.unwrap().facility_id, "f1");
        assert_eq!(rx.recv().await.unwrap().facility_id, "f2");
    }

    #[test]
    fn region_selector_filters_by_haversine_radius() {
        let selector = RegionSelector {
            center: Location { lat: 6.5244, lon: 3.3792 },
            radius_km: 25.0,
        };

        assert!(selector.matches(Location { lat: 6.53, lon: 3.38 }));
        assert!(!selector.matches(Location { lat: 9.05, lon: 7.49 }));
    }
}
