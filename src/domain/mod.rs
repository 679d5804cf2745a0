//! Facility entities, facility events, and the cached repository decorator.

pub mod event;
pub mod facility;
pub mod repository;

pub use event::{ChangedFields, FacilityEvent};
pub use facility::{Address, CapacityStatus, Facility, Location, Ward};
pub use repository::{CachedFacilityRepository, FacilityPatch, FacilityRepository, InMemoryFacilityRepository};
