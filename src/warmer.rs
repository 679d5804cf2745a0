//! Cache warmer: preloads hot keys on startup and on a periodic interval.
//!
//! Warming failures are logged and otherwise ignored — a cold cache just
//! falls through to the inner repository on the next read, which is already
//! the miss path every read-through method supports.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::repository::FacilityRepository;

/// Page size used for the three preloaded list pages, matching the
/// `facility:active:{limit}:{offset}` key family.
const PAGE_SIZE: u32 = 20;
const PRELOAD_PAGES: u32 = 3;
const TOP_N_FACILITIES: u32 = 50;

/// Default interval between warming passes.
pub const DEFAULT_WARM_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Preloads the first `PRELOAD_PAGES` list pages and the first
/// `TOP_N_FACILITIES` facilities (by list order, absent a ranking signal on
/// the repository interface) into `repo`'s cache.
///
/// `repo` must be the cache-decorated repository — warming a bare inner
/// repository would have no effect.
#[tracing::instrument(skip(repo))]
pub async fn warm_once<R: FacilityRepository + ?Sized>(repo: &R) {
    for page in 0..PRELOAD_PAGES {
        let offset = page * PAGE_SIZE;
        if let Err(err) = repo.list(PAGE_SIZE, offset).await {
            tracing::warn!(%err, offset, "cache warmer: failed to preload list page");
        }
    }

    match repo.list(TOP_N_FACILITIES, 0).await {
        Ok(facilities) => {
            for facility in &facilities {
                if let Err(err) = repo.get_by_id(&facility.id).await {
                    tracing::warn!(%err, facility_id = %facility.id, "cache warmer: failed to preload facility");
                }
            }
        }
        Err(err) => tracing::warn!(%err, "cache warmer: failed to list top facilities"),
    }
}

/// Spawns the periodic warming task. Runs `warm_once` immediately, then every
/// `interval`, until `repo`'s last clone is dropped is irrelevant — the task
/// runs until the process exits or the returned handle is aborted.
pub fn spawn_periodic<R: FacilityRepository + ?Sized + 'static>(repo: Arc<R>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        warm_once(repo.as_ref()).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; already warmed above.
        loop {
            ticker.tick().await;
            warm_once(repo.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use crate::cache::{keys, CacheProvider};
    use crate::domain::facility::{Address, CapacityStatus, Facility, Location};
    use crate::domain::repository::{CachedFacilityRepository, InMemoryFacilityRepository};
    use crate::events::EventBus;
    use crate::metrics::Metrics;
    use chrono::Utc;

    fn facility(id: &str) -> Facility {
        let now = Utc::now();
        Facility {
            id: id.to_string(),
            name: "Clinic".into(),
            facility_type: "clinic".into(),
            address: Address {
                street: "1 Main St".into(),
                city: "Lagos".into(),
                state: "LA".into(),
                zip: "100001".into(),
                country: "NG".into(),
            },
            location: Location { lat: 6.5, lon: 3.4 },
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

    #[tokio::test]
    async fn warm_once_populates_the_first_page_and_top_facilities() {
        let inner = InMemoryFacilityRepository::new();
        for i in 0..5 {
            inner.seed(facility(&format!("f{i}")));
        }
        let cache: Arc<dyn CacheProvider> = Arc::new(MemoryCache::new());
        let repo = CachedFacilityRepository::new(inner, cache.clone(), EventBus::new(), Metrics::new());

        warm_once(&repo).await;

        assert!(cache.get(&keys::facility_active(20, 0)).await.unwrap().is_some());
        assert!(cache.get(&keys::facility_id("f0")).await.unwrap().is_some());
    }
}
