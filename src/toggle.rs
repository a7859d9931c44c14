//! Process-level override feature toggle.
//!
//! Whether overrides are applied at all is a deployment decision made
//! outside the store. The toggle is an injected service, not global
//! state: whoever owns the override containers also owns (or is handed)
//! a toggle, subscribes for changes, and re-evaluates its consumers when
//! notified.

use std::collections::HashMap;
use std::sync::RwLock;

use log::info;
use uuid::Uuid;

type ToggleListener = Box<dyn Fn(bool) + Send + Sync>;

/// Feature switch with synchronous change broadcast.
#[derive(Default)]
pub struct OverrideFeatureToggle {
    enabled: RwLock<bool>,
    listeners: RwLock<HashMap<Uuid, ToggleListener>>,
}

impl OverrideFeatureToggle {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: RwLock::new(enabled),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self.enabled.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Flips the switch, notifying every subscriber when the state
    /// actually changes.
    pub fn set_enabled(&self, enabled: bool) {
        {
            let mut guard = match self.enabled.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *guard == enabled {
                return;
            }
            *guard = enabled;
        }
        info!("overrides {}", if enabled { "enabled" } else { "disabled" });
        let listeners = match self.listeners.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for listener in listeners.values() {
            listener(enabled);
        }
    }

    /// Registers a change listener and returns its subscription id.
    pub fn subscribe<F>(&self, listener: F) -> Uuid
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let mut listeners = match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.insert(id, Box::new(listener));
        id
    }

    /// Drops a subscription. Returns true if it was registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let mut listeners = match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.remove(&id).is_some()
    }
}
