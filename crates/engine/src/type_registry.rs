// SPDX-License-Identifier: MIT

//! Registry of want type name → step-logic constructor (spec.md §9
//! "polymorphism over want types"; §9 "global state: three process-wide
//! registries... initialized once at startup").

use crate::want_logic::WantLogic;
use mywant_core::Want;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type WantLogicFactory = Arc<dyn Fn(&Want) -> Box<dyn WantLogic> + Send + Sync>;

/// Read-mostly process-wide registry mapping a want's `want_type` to the
/// constructor for its step logic. Accessed read-mostly under a lock
/// (spec.md §9).
#[derive(Default, Clone)]
pub struct WantTypeRegistry {
    factories: Arc<RwLock<HashMap<String, WantLogicFactory>>>,
}

impl WantTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, want_type: impl Into<String>, factory: WantLogicFactory) {
        self.factories.write().insert(want_type.into(), factory);
    }

    pub fn construct(&self, want: &Want) -> Option<Box<dyn WantLogic>> {
        self.factories.read().get(&want.want_type).map(|f| f(want))
    }

    pub fn contains(&self, want_type: &str) -> bool {
        self.factories.read().contains_key(want_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::want_logic::{Inputs, Outputs, StateHandle, StepOutcome};
    use crate::DefaultClock;

    struct Noop;

    #[async_trait::async_trait]
    impl WantLogic for Noop {
        async fn step(&mut self, _inputs: &mut Inputs, _outputs: &Outputs, _state: &StateHandle<DefaultClock>) -> StepOutcome {
            StepOutcome::Achieved
        }
    }

    #[test]
    fn register_then_construct() {
        let registry = WantTypeRegistry::new();
        registry.register("noop", Arc::new(|_want: &Want| Box::new(Noop) as Box<dyn WantLogic>));
        let want = Want::new("a", "noop", 0);
        assert!(registry.construct(&want).is_some());
    }

    #[test]
    fn unknown_type_returns_none() {
        let registry = WantTypeRegistry::new();
        let want = Want::new("a", "missing", 0);
        assert!(registry.construct(&want).is_none());
    }

    #[test]
    fn contains_reflects_registration() {
        let registry = WantTypeRegistry::new();
        assert!(!registry.contains("noop"));
        registry.register("noop", Arc::new(|_want: &Want| Box::new(Noop) as Box<dyn WantLogic>));
        assert!(registry.contains("noop"));
    }
}
