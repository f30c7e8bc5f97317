//! Process-wide binding plan cache.
//!
//! Plans are keyed by the request type's `TypeId` and built on first use (or eagerly when
//! endpoints are mapped). Lookups take a read lock; a miss builds the plan outside any
//! lock and then re-checks under the write lock, so two concurrent first requests may
//! both build but only the first stored plan is ever returned.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use super::error::BindingError;
use super::parser::ParserRegistry;
use super::plan::{BindingOptions, BindingPlan, PlanBuilder};
use crate::descriptor::EndpointRequest;

type ErasedPlan = Arc<dyn Any + Send + Sync>;

/// Type-keyed store of [`BindingPlan`]s together with the registry and options used to
/// build them.
///
/// Construct one per application (or per test); nothing here is global.
pub struct PlanCache {
    plans: RwLock<HashMap<TypeId, ErasedPlan>>,
    parsers: ParserRegistry,
    options: BindingOptions,
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("plans", &self.len())
            .field("parsers", &self.parsers)
            .field("options", &self.options)
            .finish()
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(ParserRegistry::with_defaults(), BindingOptions::default())
    }
}

impl PlanCache {
    #[must_use]
    pub fn new(parsers: ParserRegistry, options: BindingOptions) -> Self {
        Self {
            plans: RwLock::new(HashMap::new()),
            parsers,
            options,
        }
    }

    #[must_use]
    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    #[must_use]
    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    /// Return the plan for `T`, building and storing it on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`BindingError::UnsupportedType`] from plan building. A failed build
    /// stores nothing.
    pub fn get_or_build<T>(&self) -> Result<Arc<BindingPlan<T>>, BindingError>
    where
        T: EndpointRequest,
    {
        let key = TypeId::of::<T>();

        // Fast path: plan already published.
        {
            let plans = self.plans.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(plan) = plans.get(&key) {
                if let Some(plan) = downcast::<T>(plan) {
                    return Ok(plan);
                }
            }
        }

        // Slow path: build without holding the lock, then publish.
        let built = Arc::new(PlanBuilder::new(&self.parsers, &self.options).build::<T>()?);
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = plans.get(&key).and_then(downcast::<T>) {
            debug!(
                type_name = std::any::type_name::<T>(),
                "Binding plan built by another thread"
            );
            return Ok(existing);
        }

        plans.insert(key, Arc::clone(&built) as ErasedPlan);
        info!(
            type_name = std::any::type_name::<T>(),
            cache_size = plans.len(),
            "Binding plan built and cached"
        );
        Ok(built)
    }

    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn downcast<T: EndpointRequest>(plan: &ErasedPlan) -> Option<Arc<BindingPlan<T>>> {
    Arc::clone(plan).downcast::<BindingPlan<T>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RequestDescriptor;
    use crate::route::RouteTemplate;

    #[derive(Default)]
    struct Ping {
        count: i32,
    }

    impl EndpointRequest for Ping {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/ping"))
                .field("count", |r| &mut r.count)
        }
    }

    #[test]
    fn test_second_lookup_returns_stored_plan() {
        let cache = PlanCache::default();
        assert!(!cache.contains::<Ping>());
        let first = cache.get_or_build::<Ping>().unwrap();
        let second = cache.get_or_build::<Ping>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_caches_are_isolated() {
        let a = PlanCache::default();
        let b = PlanCache::default();
        a.get_or_build::<Ping>().unwrap();
        assert!(a.contains::<Ping>());
        assert!(b.is_empty());
    }
}
