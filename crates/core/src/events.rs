//! Synchronous publish/subscribe channel used to decouple dashboard widgets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::Candidate;

/// Events routed through an [`EventChannel`] are keyed by name.
pub trait NamedEvent {
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// Opens the details panel for the carried record without a fetch.
    OpenCandidateDetails(Candidate),
}

impl DashboardEvent {
    pub const OPEN_CANDIDATE_DETAILS: &'static str = "open_candidate_details";
}

impl NamedEvent for DashboardEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::OpenCandidateDetails(_) => Self::OPEN_CANDIDATE_DETAILS,
        }
    }
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: HashMap<&'static str, Vec<(u64, Listener<E>)>>,
}

/// Cloneable handle to a shared listener registry.
///
/// Listeners run synchronously inside [`EventChannel::emit`], in registration order.
/// The registry lock is released before they are called, so a listener may subscribe,
/// drop its own subscription or emit again.
pub struct EventChannel<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = lock(&self.registry);
        f.debug_struct("EventChannel")
            .field("events", &registry.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<E> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Registers `listener` for events named `name`. The listener stays registered
    /// until the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription deregisters the listener"]
    pub fn subscribe<F>(&self, name: &'static str, listener: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(name)
            .or_default()
            .push((id, Arc::new(listener)));

        Subscription {
            registry: Arc::clone(&self.registry),
            name,
            id,
        }
    }

    pub fn listener_count(&self, name: &str) -> usize {
        lock(&self.registry)
            .listeners
            .get(name)
            .map_or(0, Vec::len)
    }
}

impl<E: NamedEvent> EventChannel<E> {
    /// Delivers `event` to every listener registered under its name and returns how
    /// many were reached. There is no replay for listeners that subscribe later.
    pub fn emit(&self, event: &E) -> usize {
        let listeners: Vec<Listener<E>> = lock(&self.registry)
            .listeners
            .get(event.name())
            .map(|entries| entries.iter().map(|(_, listener)| Arc::clone(listener)).collect())
            .unwrap_or_default();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}

/// Registration guard returned by [`EventChannel::subscribe`].
pub struct Subscription<E> {
    registry: Arc<Mutex<Registry<E>>>,
    name: &'static str,
    id: u64,
}

impl<E> Subscription<E> {
    pub fn event_name(&self) -> &'static str {
        self.name
    }
}

impl<E> std::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        let mut registry = lock(&self.registry);
        if let Some(entries) = registry.listeners.get_mut(self.name) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                registry.listeners.remove(self.name);
            }
        }
    }
}

fn lock<E>(registry: &Mutex<Registry<E>>) -> MutexGuard<'_, Registry<E>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
