//! Cache-invalidation service: bridges the event bus back to the cache
//! provider for the key families the repository decorator doesn't scan
//! itself (notably `facility:search:*`, which can be expensive to scan on
//! every write and is deferred here instead).
//!
//! Subscribes to the global channel; every event is mapped to its key
//! patterns via a static table and evicted. Idempotent — invalidating an
//! already-evicted pattern is a no-op — so duplicate or replayed events
//! never cause observable harm.

use std::sync::Arc;

use crate::cache::CacheProvider;
use crate::domain::event::{ChangedFields, FacilityEvent};
use crate::events::EventBus;

/// The key patterns to evict for a given event's `changed_fields` kind.
fn patterns_for(event: &FacilityEvent) -> Vec<String> {
    let id_pattern = format!("facility:id:{}", event.facility_id);
    match &event.changed_fields {
        ChangedFields::CapacityUpdate { .. }
        | ChangedFields::WardCapacityUpdate { .. }
        | ChangedFields::WaitTimeUpdate { .. }
        | ChangedFields::UrgentCareUpdate { .. } => {
            vec![id_pattern, "facility:active:*".to_string(), "facility:search:*".to_string()]
        }
        ChangedFields::ServiceHealthUpdate { .. } | ChangedFields::ServiceAvailabilityUpdate { .. } => {
            vec!["facility:search:*".to_string()]
        }
        ChangedFields::Heartbeat => Vec::new(),
    }
}

/// Runs the invalidation consumer loop until the bus's global channel
/// closes (which in practice means the process is shutting down — the
/// channel's sender, held by the `EventBus`, outlives every subscriber).
#[tracing::instrument(skip(bus, cache))]
pub async fn run(bus: EventBus, cache: Arc<dyn CacheProvider>) {
    let mut events = bus.subscribe_global();
    loop {
        match events.recv().await {
            Ok(event) => {
                for pattern in patterns_for(&event) {
                    if let Err(err) = cache.delete_pattern(&pattern).await {
                        tracing::warn!(%err, pattern, "invalidation: delete_pattern failed, retrying once");
                        if let Err(err) = cache.delete_pattern(&pattern).await {
                            tracing::warn!(%err, pattern, "invalidation: retry failed, giving up on this pattern");
                        }
                    }
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "invalidation consumer lagged, some events were not processed");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use crate::domain::facility::{CapacityStatus, Location};
    use std::time::Duration;

    #[tokio::test]
    async fn capacity_update_evicts_search_and_active_and_id_patterns() {
        let cache: Arc<dyn CacheProvider> = Arc::new(MemoryCache::new());
        cache.set("facility:search:abc", bytes::Bytes::from_static(b"x"), Duration::from_secs(60)).await.unwrap();
        cache.set("facility:active:20:0", bytes::Bytes::from_static(b"x"), Duration::from_secs(60)).await.unwrap();
        cache.set("facility:id:f1", bytes::Bytes::from_static(b"x"), Duration::from_secs(60)).await.unwrap();

        let bus = EventBus::new();
        let handle = tokio::spawn(run(bus.clone(), cache.clone()));

        bus.publish(FacilityEvent::new(
            "f1",
            Location { lat: 6.5, lon: 3.4 },
            ChangedFields::CapacityUpdate {
                status: CapacityStatus::Busy,
                avg_wait_minutes: Some(20),
                urgent_care_available: false,
            },
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(cache.get("facility:search:abc").await.unwrap().is_none());
        assert!(cache.get("facility:active:20:0").await.unwrap().is_none());
        assert!(cache.get("facility:id:f1").await.unwrap().is_none());
    }

    #[test]
    fn heartbeat_has_no_invalidation_patterns() {
        let event = FacilityEvent::new("f1", Location { lat: 0.0, lon: 0.0 }, ChangedFields::Heartbeat);
        assert!(patterns_for(&event).is_empty());
    }
}
