//! Type-keyed global state store, used to hand `AppState` to extractors
//! without threading it through every route registration by hand.

use std::{
    any::{Any, TypeId},
    sync::Arc,
};

use dashmap::DashMap;
use once_cell::sync::Lazy;

pub(crate) static GLOBAL_STATE: Lazy<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = Lazy::new(DashMap::new);

/// Stores `value`, keyed by its concrete type. Replaces any prior value of
/// the same type.
pub fn set_state<T: Send + Sync + 'static>(value: T) {
    GLOBAL_STATE.insert(TypeId::of::<T>(), Arc::new(value));
}

/// Retrieves the value previously stored for `T`, if any.
pub fn get_state<T: Send + Sync + 'static>() -> Option<Arc<T>> {
    GLOBAL_STATE.get(&TypeId::of::<T>()).map(|v| v.clone()).and_then(|v| v.downcast::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    #[test]
    fn stores_and_retrieves_by_type() {
        set_state(Marker(7));
        assert_eq!(get_state::<Marker>().as_deref(), Some(&Marker(7)));
    }

    #[test]
    fn missing_type_returns_none() {
        struct NeverStored;
        assert!(get_state::<NeverStored>().is_none());
    }
}
