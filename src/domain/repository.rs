//! The primary facility repository interface and the cache-aside decorator
//! that fronts it.
//!
//! [`FacilityRepository`] is the out-of-scope collaborator (SQL schema and
//! query shapes are a different concern); [`InMemoryFacilityRepository`] is
//! a deterministic test double standing in for it. [`CachedFacilityRepository`]
//! is the component that matters here: a read-through/write-through decorator
//! with the exact cache-key namespace and invalidation order from the
//! component design.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::cache::{keys, CacheProvider};
use crate::domain::event::{ChangedFields, FacilityEvent};
use crate::domain::facility::{CapacityStatus, Facility};
use crate::error::RepositoryError;
use crate::events::EventBus;
use crate::metrics::Metrics;

const TTL_FACILITY_ID: std::time::Duration = std::time::Duration::from_secs(10 * 60);
const TTL_LIST: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// A partial update to a facility. Only the fields the caller sets are
/// applied; everything else is left as-is. The shape of what changed drives
/// which [`ChangedFields`] variant the decorator publishes.
#[derive(Debug, Clone, Default)]
pub struct FacilityPatch {
    pub facility_type: Option<String>,
    pub capacity_status: Option<CapacityStatus>,
    pub avg_wait_minutes: Option<u32>,
    pub urgent_care: Option<bool>,
    pub ward_update: Option<(String, CapacityStatus)>,
}

/// The facility repository's public contract. The SQL-backed implementation
/// of this trait is out of scope; only the interface and a deterministic
/// test double ([`InMemoryFacilityRepository`]) live in this crate.
#[async_trait]
pub trait FacilityRepository: Send + Sync + 'static {
    async fn get_by_id(&self, id: &str) -> Result<Facility, RepositoryError>;
    async fn get_by_type(&self, facility_type: &str) -> Result<Vec<Facility>, RepositoryError>;
    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Facility>, RepositoryError>;
    async fn create(&self, facility: Facility) -> Result<Facility, RepositoryError>;
    async fn update(&self, id: &str, patch: FacilityPatch) -> Result<Facility, RepositoryError>;
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Deterministic in-memory stand-in for the SQL-backed primary repository,
/// sufficient to exercise [`CachedFacilityRepository`]'s invalidation and
/// publish side effects without a database.
#[derive(Default)]
pub struct InMemoryFacilityRepository {
    facilities: DashMap<String, Facility>,
}

impl InMemoryFacilityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, facility: Facility) {
        self.facilities.insert(facility.id.clone(), facility);
    }
}

#[async_trait]
impl FacilityRepository for InMemoryFacilityRepository {
    async fn get_by_id(&self, id: &str) -> Result<Facility, RepositoryError> {
        self.facilities
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_by_type(&self, facility_type: &str) -> Result<Vec<Facility>, RepositoryError> {
        Ok(self
            .facilities
            .iter()
            .filter(|entry| entry.facility_type == facility_type)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Facility>, RepositoryError> {
        let mut all: Vec<Facility> = self.facilities.iter().map(|entry| entry.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn create(&self, facility: Facility) -> Result<Facility, RepositoryError> {
        facility.validate()?;
        if self.facilities.contains_key(&facility.id) {
            return Err(RepositoryError::Validation(format!(
                "facility {} already exists",
                facility.id
            )));
        }
        self.facilities.insert(facility.id.clone(), facility.clone());
        Ok(facility)
    }

    async fn update(&self, id: &str, patch: FacilityPatch) -> Result<Facility, RepositoryError> {
        let mut entry = self
            .facilities
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if let Some(facility_type) = patch.facility_type {
            entry.facility_type = facility_type;
        }
        if let Some(status) = patch.capacity_status {
            entry.capacity_status = status;
        }
        if let Some(avg_wait) = patch.avg_wait_minutes {
            entry.avg_wait_minutes = Some(avg_wait);
        }
        if let Some(urgent_care) = patch.urgent_care {
            entry.urgent_care = urgent_care;
        }
        if let Some((ward_id, status)) = patch.ward_update {
            if let Some(ward) = entry.wards.iter_mut().find(|w| w.id == ward_id) {
                ward.status = status;
            }
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.facilities
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

/// Derives the published [`ChangedFields`] for a patch, or `None` if the
/// patch touched nothing the event taxonomy represents.
///
/// A patch touching `capacity_status` always reports the full capacity
/// snapshot (`CapacityUpdate`), since a status change can make the other
/// capacity fields stale too. A patch touching only `avg_wait_minutes` or
/// only `urgent_care` gets the narrower, single-field variant instead.
fn derive_changed_fields(updated: &Facility, patch: &FacilityPatch) -> Option<ChangedFields> {
    if patch.capacity_status.is_some() {
        return Some(ChangedFields::CapacityUpdate {
            status: updated.capacity_status,
            avg_wait_minutes: updated.avg_wait_minutes,
            urgent_care_available: updated.urgent_care,
        });
    }
    if let Some(avg_wait_minutes) = patch.avg_wait_minutes {
        return Some(ChangedFields::WaitTimeUpdate { avg_wait_minutes });
    }
    if let Some(available) = patch.urgent_care {
        return Some(ChangedFields::UrgentCareUpdate { available });
    }
    if let Some((ward_id, status)) = &patch.ward_update {
        return Some(ChangedFields::WardCapacityUpdate {
            ward_id: ward_id.clone(),
            status: *status,
        });
    }
    None
}

/// Read-through/write-through decorator over a [`FacilityRepository`].
///
/// Owns the `facility:*` cache-key namespace exclusively: nothing else in
/// the crate writes those keys. See the component design for the exact
/// per-operation algorithm this type implements.
pub struct CachedFacilityRepository<R: FacilityRepository> {
    inner: R,
    cache: Arc<dyn CacheProvider>,
    bus: EventBus,
    metrics: Metrics,
}

impl<R: FacilityRepository> CachedFacilityRepository<R> {
    pub fn new(inner: R, cache: Arc<dyn CacheProvider>, bus: EventBus, metrics: Metrics) -> Self {
        Self { inner, cache, bus, metrics }
    }

    /// Serializes and caches `facility` under its canonical key, swallowing
    /// and logging any cache-write error (the inner repository has already
    /// committed; a cache-population failure must not undo that).
    async fn populate_id(&self, facility: &Facility) {
        match serde_json::to_vec(facility) {
            Ok(bytes) => {
                if let Err(err) = self
                    .cache
                    .set(&keys::facility_id(&facility.id), bytes.into(), TTL_FACILITY_ID)
                    .await
                {
                    tracing::warn!(%err, facility_id = %facility.id, "failed to populate facility cache entry");
                }
            }
            Err(err) => tracing::warn!(%err, facility_id = %facility.id, "failed to serialize facility for caching"),
        }
    }

    async fn read_through<F, Fut>(&self, key: String, family: &str, fetch: F) -> Result<Vec<u8>, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<u8>, RepositoryError>>,
    {
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => {
                self.metrics.record_cache_hit(family);
                return Ok(bytes.to_vec());
            }
            Ok(None) => self.metrics.record_cache_miss(family),
            Err(err) => {
                tracing::warn!(%err, key, "cache read error, treating as miss");
                self.metrics.record_cache_miss(family);
            }
        }

        let bytes = fetch().await?;
        if let Err(err) = self.cache.set(&key, bytes.clone().into(), TTL_LIST).await {
            tracing::warn!(%err, key, "failed to populate cache entry");
        }
        Ok(bytes)
    }

    /// Invalidates the key families a create/update/delete on `id` can
    /// stale, in the order the component design specifies.
    async fn invalidate_after_write(&self, id: &str, old_type: &str, new_type: &str) {
        let _ = self.cache.delete(&keys::facility_id(id)).await;
        let _ = self.cache.delete(&keys::facility_type(old_type)).await;
        if new_type != old_type {
            let _ = self.cache.delete(&keys::facility_type(new_type)).await;
        }
        let _ = self.cache.delete_pattern(&keys::facility_active_pattern()).await;
        if let Err(err) = self.cache.delete_pattern(&keys::facility_search_pattern()).await {
            tracing::warn!(%err, "best-effort facility:search:* invalidation failed");
        }
    }
}

#[async_trait]
impl<R: FacilityRepository> FacilityRepository for CachedFacilityRepository<R> {
    async fn get_by_id(&self, id: &str) -> Result<Facility, RepositoryError> {
        let key = keys::facility_id(id);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Facility>(&bytes) {
                Ok(facility) => {
                    self.metrics.record_cache_hit("facility:id");
                    return Ok(facility);
                }
                Err(err) => tracing::warn!(%err, id, "cached facility failed to deserialize, treating as miss"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, id, "cache read error, treating as miss"),
        }
        self.metrics.record_cache_miss("facility:id");

        let facility = self.inner.get_by_id(id).await?;
        self.populate_id(&facility).await;
        Ok(facility)
    }

    async fn get_by_type(&self, facility_type: &str) -> Result<Vec<Facility>, RepositoryError> {
        let key = keys::facility_type(facility_type);
        let bytes = self
            .read_through(key, "facility:type", || async {
                let facilities = self.inner.get_by_type(facility_type).await?;
                serde_json::to_vec(&facilities).map_err(|e| RepositoryError::Backend(e.to_string()))
            })
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| RepositoryError::Backend(e.to_string()))
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Facility>, RepositoryError> {
        let key = keys::facility_active(limit, offset);
        let bytes = self
            .read_through(key, "facility:active", || async {
                let facilities = self.inner.list(limit, offset).await?;
                serde_json::to_vec(&facilities).map_err(|e| RepositoryError::Backend(e.to_string()))
            })
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| RepositoryError::Backend(e.to_string()))
    }

    async fn create(&self, facility: Facility) -> Result<Facility, RepositoryError> {
        let created = self.inner.create(facility).await?;
        self.invalidate_after_write(&created.id, &created.facility_type, &created.facility_type)
            .await;

        self.bus.publish(FacilityEvent::new(
            created.id.clone(),
            created.location,
            ChangedFields::CapacityUpdate {
                status: created.capacity_status,
                avg_wait_minutes: created.avg_wait_minutes,
                urgent_care_available: created.urgent_care,
            },
        ));
        Ok(created)
    }

    async fn update(&self, id: &str, patch: FacilityPatch) -> Result<Facility, RepositoryError> {
        let old = self.get_by_id(id).await?;
        let updated = self.inner.update(id, patch.clone()).await?;

        self.invalidate_after_write(id, &old.facility_type, &updated.facility_type).await;

        if let Some(changed) = derive_changed_fields(&updated, &patch) {
            self.bus.publish(FacilityEvent::new(id, updated.location, changed));
        }
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let old = self.get_by_id(id).await?;
        self.inner.delete(id).await?;
        self.invalidate_after_write(id, &old.facility_type, &old.facility_type).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use crate::domain::facility::{Address, Location};

    fn sample_facility(id: &str) -> Facility {
        let now = Utc::now();
        Facility {
            id: id.to_string(),
            name: "Test Hospital".into(),
            facility_type: "hospital".into(),
            address: Address {
                street: "1 Main St".into(),
                city: "Lagos".into(),
                state: "LA".into(),
                zip: "100001".into(),
                country: "NG".into(),
            },
            location: Location { lat: 6.5244, lon: 3.3792 },
            phone: None,
            website: None,
            rating: None,
            review_count: 0,
            capacity_status: CapacityStatus::Available,
            avg_wait_minutes: None,
            urgent_care: false,
            wards: Vec::new(),
            accepted_insurance: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn decorator() -> CachedFacilityRepository<InMemoryFacilityRepository> {
        let inner = InMemoryFacilityRepository::new();
        inner.seed(sample_facility("f1"));
        let cache: Arc<dyn CacheProvider> = Arc::new(MemoryCache::new());
        CachedFacilityRepository::new(inner, cache, EventBus::new(), Metrics::new())
    }

    #[tokio::test]
    async fn get_by_id_populates_cache_on_miss_and_hits_on_second_read() {
        let repo = decorator();

        repo.get_by_id("f1").await.unwrap();
        assert_eq!(repo.metrics.counter_total("cache.miss.count"), 1);

        repo.get_by_id("f1").await.unwrap();
        assert_eq!(repo.metrics.counter_total("cache.hit.count"), 1);
    }

    #[tokio::test]
    async fn update_invalidates_and_is_visible_immediately() {
        let repo = decorator();
        repo.get_by_id("f1").await.unwrap();

        let mut rx = repo.bus.subscribe_facility("f1");

        let updated = repo
            .update(
                "f1",
                FacilityPatch {
                    capacity_status: Some(CapacityStatus::Limited),
                    avg_wait_minutes: Some(30),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.capacity_status, CapacityStatus::Limited);
        assert_eq!(updated.avg_wait_minutes, Some(30));

        // Cache must have been invalidated: the next read goes to the inner repo again.
        assert!(repo.cache.get(&keys::facility_id("f1")).await.unwrap().is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "capacity_update");
    }

    #[tokio::test]
    async fn patch_touching_only_wait_time_publishes_wait_time_update() {
        let repo = decorator();
        repo.get_by_id("f1").await.unwrap();
        let mut rx = repo.bus.subscribe_facility("f1");

        repo.update(
            "f1",
            FacilityPatch { avg_wait_minutes: Some(15), ..Default::default() },
        )
        .await
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "wait_time_update");
        assert!(matches!(
            event.changed_fields,
            ChangedFields::WaitTimeUpdate { avg_wait_minutes: 15 }
        ));
    }

    #[tokio::test]
    async fn patch_touching_only_urgent_care_publishes_urgent_care_update() {
        let repo = decorator();
        repo.get_by_id("f1").await.unwrap();
        let mut rx = repo.bus.subscribe_facility("f1");

        repo.update("f1", FacilityPatch { urgent_care: Some(true), ..Default::default() })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "urgent_care_update");
        assert!(matches!(
            event.changed_fields,
            ChangedFields::UrgentCareUpdate { available: true }
        ));
    }

    #[tokio::test]
    async fn not_found_is_never_cached() {
        let repo = decorator();
        let result = repo.get_by_id("missing").await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
        assert!(repo.cache.get(&keys::facility_id("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_publishes_no_event() {
        let repo = decorator();
        let mut rx = repo.bus.subscribe_facility("f1");

        repo.delete("f1").await.unwrap();

        assert!(rx.try_recv().is_err());
        assert!(matches!(repo.get_by_id("f1").await, Err(RepositoryError::NotFound(_))));
    }
}
