//! Composition root: wires the cache, repository, event bus, SSE hub,
//! scheduler, and metrics into shared state, and exposes the HTTP surface.
//!
//! Nothing here is reusable library logic — it is the one place that is
//! allowed to know about every component at once. Everything downstream
//! (handlers) reaches its collaborators through the `State<AppState>`
//! extractor rather than by constructing anything itself.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::memory::MemoryCache;
use crate::cache::{keys, CacheProvider};
use crate::domain::facility::{CapacityStatus, Facility, Location};
use crate::domain::repository::{CachedFacilityRepository, FacilityPatch, FacilityRepository, InMemoryFacilityRepository};
use crate::error::AppError;
use crate::events::{EventBus, RegionSelector};
use crate::extractors::json::Json;
use crate::extractors::params::Params;
use crate::extractors::query::Query;
use crate::extractors::state::State;
use crate::metrics::Metrics;
use crate::responder::Responder;
use crate::router::Router;
use crate::scheduler::{JobConfig, NoopSyncProvider, Scheduler};
use crate::sse::{SseConnection, SseHub, SseSubscription};
use crate::types::Response;
use crate::{http_cache, invalidation, warmer};

/// Literal defaults named throughout the component design (§4). A real
/// deployment's CLI/env/file loader would populate this; that loader is out
/// of scope here, so `Default` carries the documented constants instead.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// How often the cache warmer repeats after its initial pass.
    pub warmer_interval: Duration,
    /// SSE heartbeat cadence. Informational here — [`crate::sse::SseHub`]
    /// hardcodes the same value as a module constant.
    pub heartbeat_interval: Duration,
    /// Outbound SSE queue depth. Informational for the same reason.
    pub sse_queue_depth: usize,
    /// How long a stalled SSE subscriber is tolerated before disconnecting.
    pub sse_backpressure_timeout: Duration,
    /// Whether the periodic external-provider sync job is scheduled at
    /// startup. Off by default since this crate ships no real provider.
    pub schedule_demo_sync_job: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            warmer_interval: warmer::DEFAULT_WARM_INTERVAL,
            heartbeat_interval: Duration::from_secs(15),
            sse_queue_depth: 64,
            sse_backpressure_timeout: Duration::from_secs(30),
            schedule_demo_sync_job: false,
        }
    }
}

/// Shared application state, threaded into handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn CacheProvider>,
    pub repository: Arc<dyn FacilityRepository>,
    pub bus: EventBus,
    pub sse_hub: Arc<SseHub>,
    pub scheduler: Scheduler,
    pub metrics: Metrics,
    pub config: AppConfig,
}

/// Builds the shared state and every background task, but does not touch
/// routing. Split from [`router`] so tests can drive the state directly
/// without spinning up an HTTP listener.
pub async fn bootstrap(config: AppConfig) -> AppState {
    let metrics = Metrics::new();
    let cache: Arc<dyn CacheProvider> = Arc::new(MemoryCache::new());
    let bus = EventBus::new();

    let inner = InMemoryFacilityRepository::new();
    seed_demo_facilities(&inner);
    let repository: Arc<dyn FacilityRepository> =
        Arc::new(CachedFacilityRepository::new(inner, cache.clone(), bus.clone(), metrics.clone()));

    let sse_hub = Arc::new(SseHub::new(bus.clone(), metrics.clone()));
    let scheduler = Scheduler::new(metrics.clone());

    tokio::spawn(invalidation::run(bus.clone(), cache.clone()));
    warmer::spawn_periodic(repository.clone(), config.warmer_interval);

    if config.schedule_demo_sync_job {
        scheduler
            .schedule(JobConfig {
                name: "facility-provider-sync".to_string(),
                interval: Duration::from_secs(15 * 60),
                run_immediately: true,
                provider: Arc::new(NoopSyncProvider),
            })
            .await;
    }

    AppState { cache, repository, bus, sse_hub, scheduler, metrics, config }
}

fn seed_demo_facilities(repo: &InMemoryFacilityRepository) {
    let now = chrono::Utc::now();
    repo.seed(Facility {
        id: "f1".to_string(),
        name: "Lagos General Hospital".to_string(),
        facility_type: "hospital".to_string(),
        address: crate::domain::facility::Address {
            street: "1 Broad Street".to_string(),
            city: "Lagos".to_string(),
            state: "Lagos".to_string(),
            zip: "100001".to_string(),
            country: "NG".to_string(),
        },
        location: Location { lat: 6.5244, lon: 3.3792 },
        phone: Some("+234-1-555-0100".to_string()),
        website: None,
        rating: Some(4.1),
        review_count: 812,
        capacity_status: CapacityStatus::Available,
        avg_wait_minutes: Some(25),
        urgent_care: true,
        wards: Vec::new(),
        accepted_insurance: vec!["NHIS".to_string()],
        created_at: now,
        updated_at: now,
    });
}

/// Builds the HTTP surface: every route named in the external interfaces
/// section, wired to `state`, plus the HTTP response cache plugin stack.
pub fn router(state: AppState) -> Router {
    let cache = state.cache.clone();
    let mut router = Router::new();
    router.state(state);

    router.route(hyper::Method::GET, "/api/facilities/search", search_facilities);
    router.route(hyper::Method::GET, "/api/facilities/suggest", suggest_facilities);
    router.route(hyper::Method::GET, "/api/facilities", list_facilities);
    router.route(hyper::Method::POST, "/api/facilities", create_facility);
    router.route(hyper::Method::GET, "/api/facilities/{id}", get_facility);
    router.route(hyper::Method::PATCH, "/api/facilities/{id}", update_facility);
    router.route(hyper::Method::DELETE, "/api/facilities/{id}", delete_facility);

    router.route(hyper::Method::GET, "/api/insurance-providers", insurance_providers);
    router.route(hyper::Method::GET, "/api/procedures", procedures);
    router.route(hyper::Method::GET, "/api/geocode", geocode);

    router.route(hyper::Method::GET, "/api/stream/facilities/region", stream_region);
    router.route(hyper::Method::GET, "/api/stream/facilities/{id}", stream_facility);

    http_cache::install(&mut router, cache);
    router
}

fn json_ok<T: Serialize>(body: &T) -> Response {
    let payload = serde_json::to_string(body).unwrap_or_else(|_| "null".to_string());
    hyper::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(crate::body::TakoBody::from(payload))
        .expect("well-formed json response")
}

#[derive(Debug, Deserialize)]
struct FacilityIdParam {
    id: String,
}

async fn get_facility(Params(p): Params<FacilityIdParam>, State(state): State<AppState>) -> Response {
    match state.repository.get_by_id(&p.id).await {
        Ok(facility) => json_ok(&facility),
        Err(err) => AppError::from(err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ListQuery {
    limit: u32,
    offset: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

async fn list_facilities(Query(q): Query<ListQuery>, State(state): State<AppState>) -> Response {
    match state.repository.list(q.limit, q.offset).await {
        Ok(facilities) => json_ok(&facilities),
        Err(err) => AppError::from(err).into_response(),
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
struct SearchQuery {
    #[serde(rename = "type")]
    facility_type: Option<String>,
    name: Option<String>,
    limit: u32,
    offset: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self { facility_type: None, name: None, limit: 20, offset: 0 }
    }
}

/// Not backed by the primary repository's narrow `list`/`get_by_type`
/// contract — this is the one handler that owns the `facility:search:*`
/// key family directly, matching the reserved namespace in the cache-key
/// grammar and giving the invalidation service's `facility:search:*`
/// eviction an actual writer to invalidate.
async fn search_facilities(Query(q): Query<SearchQuery>, State(state): State<AppState>) -> Response {
    let raw = serde_json::to_string(&q).unwrap_or_default();
    let key = keys::facility_search(&raw);

    if let Ok(Some(cached)) = state.cache.get(&key).await {
        if let Ok(facilities) = serde_json::from_slice::<Vec<Facility>>(&cached) {
            return json_ok(&facilities);
        }
    }

    let candidates = match &q.facility_type {
        Some(facility_type) => state.repository.get_by_type(facility_type).await,
        None => state.repository.list(q.limit.max(1) * 10, 0).await,
    };

    let facilities = match candidates {
        Ok(facilities) => facilities,
        Err(err) => return AppError::from(err).into_response(),
    };

    let filtered: Vec<Facility> = facilities
        .into_iter()
        .filter(|f| q.name.as_deref().is_none_or(|n| f.name.to_lowercase().contains(&n.to_lowercase())))
        .skip(q.offset as usize)
        .take(q.limit as usize)
        .collect();

    if let Ok(bytes) = serde_json::to_vec(&filtered) {
        let _ = state.cache.set(&key, bytes.into(), Duration::from_secs(5 * 60)).await;
    }
    json_ok(&filtered)
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SuggestQuery {
    q: String,
    limit: u32,
}

impl Default for SuggestQuery {
    fn default() -> Self {
        Self { q: String::new(), limit: 5 }
    }
}

/// Lightweight name-prefix autocomplete over the same repository listing
/// the search endpoint uses; domain entity CRUD beyond the invalidation
/// signal is out of scope, so this stays a thin filter rather than its own
/// ranked index.
async fn suggest_facilities(Query(q): Query<SuggestQuery>, State(state): State<AppState>) -> Response {
    let facilities = match state.repository.list(200, 0).await {
        Ok(facilities) => facilities,
        Err(err) => return AppError::from(err).into_response(),
    };
    let needle = q.q.to_lowercase();
    let suggestions: Vec<String> = facilities
        .into_iter()
        .filter(|f| needle.is_empty() || f.name.to_lowercase().starts_with(&needle))
        .take(q.limit as usize)
        .map(|f| f.name)
        .collect();
    json_ok(&suggestions)
}

async fn create_facility(Json(facility): Json<Facility>, State(state): State<AppState>) -> Response {
    match state.repository.create(facility).await {
        Ok(created) => hyper::Response::builder()
            .status(http::StatusCode::CREATED)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(crate::body::TakoBody::from(serde_json::to_string(&created).unwrap_or_default()))
            .expect("well-formed json response"),
        Err(err) => AppError::from(err).into_response(),
    }
}

#[derive(Debug, Deserialize, Default)]
struct UpdateFacilityBody {
    facility_type: Option<String>,
    capacity_status: Option<CapacityStatus>,
    avg_wait_minutes: Option<u32>,
    urgent_care: Option<bool>,
}

async fn update_facility(
    Params(p): Params<FacilityIdParam>,
    Json(body): Json<UpdateFacilityBody>,
    State(state): State<AppState>,
) -> Response {
    let patch = FacilityPatch {
        facility_type: body.facility_type,
        capacity_status: body.capacity_status,
        avg_wait_minutes: body.avg_wait_minutes,
        urgent_care: body.urgent_care,
        ward_update: None,
    };
    match state.repository.update(&p.id, patch).await {
        Ok(updated) => json_ok(&updated),
        Err(err) => AppError::from(err).into_response(),
    }
}

async fn delete_facility(Params(p): Params<FacilityIdParam>, State(state): State<AppState>) -> Response {
    match state.repository.delete(&p.id).await {
        Ok(()) => hyper::Response::builder()
            .status(http::StatusCode::NO_CONTENT)
            .body(crate::body::TakoBody::empty())
            .expect("well-formed empty response"),
        Err(err) => AppError::from(err).into_response(),
    }
}

/// Static reference data. Persistence and a real provider catalog are out
/// of scope (§1); this exists so `/api/insurance-providers` has a body to
/// exercise the response-cache/ETag/gzip stack against.
async fn insurance_providers() -> Response {
    json_ok(&["NHIS", "AXA Mansard", "Hygeia HMO", "Reliance HMO"])
}

async fn procedures() -> Response {
    json_ok(&["consultation", "imaging", "laboratory", "surgery", "vaccination"])
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GeocodeQuery {
    address: String,
}

#[derive(Debug, Serialize)]
struct GeocodeResult {
    address: String,
    lat: f64,
    lon: f64,
}

/// The geocoding adapter itself is out of scope (§1 — "the relational and
/// KV drivers themselves... the full-text search adapter" and its
/// neighbors draw the same external-collaborator line around this kind of
/// provider); this returns Lagos's coordinates for any input so the route
/// still exercises the cached-GET path end to end.
async fn geocode(Query(q): Query<GeocodeQuery>) -> Response {
    json_ok(&GeocodeResult { address: q.address, lat: 6.5244, lon: 3.3792 })
}

#[derive(Debug, Deserialize)]
struct StreamIdParam {
    id: String,
}

async fn stream_facility(Params(p): Params<StreamIdParam>, State(state): State<AppState>) -> SseConnection {
    state.sse_hub.connect(SseSubscription::Facility(p.id))
}

#[derive(Debug, Deserialize)]
struct RegionQuery {
    lat: f64,
    lon: f64,
    #[serde(default = "default_radius_km")]
    radius: f64,
}

fn default_radius_km() -> f64 {
    50.0
}

async fn stream_region(Query(q): Query<RegionQuery>, State(state): State<AppState>) -> SseConnection {
    let selector = RegionSelector { center: Location { lat: q.lat, lon: q.lon }, radius_km: q.radius };
    state.sse_hub.connect(SseSubscription::Region(selector))
}
