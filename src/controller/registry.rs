//! Name -> controller definition map.
//!
//! Readers take a lock-free snapshot; writers publish a whole new map with
//! `rcu`. A request that already holds an `Arc<ControllerDef>` keeps using
//! it even if the controller is replaced mid-flight.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::ControllerDef;

#[derive(Default)]
pub struct ControllerRegistry {
    defs: ArcSwap<HashMap<String, Arc<ControllerDef>>>,
}

impl ControllerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a definition under its own name.
    pub fn register(&self, def: ControllerDef) -> Arc<ControllerDef> {
        let def = Arc::new(def);
        let name = def.name().to_string();
        let replaced = self.defs.load().contains_key(&name);
        self.defs.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), Arc::clone(&def));
            next
        });
        info!(
            controller = %name,
            routes = def.router().table().len(),
            actions = def.action_names().len(),
            replaced,
            "Controller registered"
        );
        def
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ControllerDef>> {
        self.defs.load().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ControllerDef>> {
        let existing = self.get(name)?;
        self.defs.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(name);
            next
        });
        Some(existing)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.defs.load().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("names", &self.names())
            .finish()
    }
}
