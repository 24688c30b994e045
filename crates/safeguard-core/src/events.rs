//! Event subscriptions and handler dispatch.
//!
//! Handlers are keyed by event name, compared case-insensitively. A single
//! "all events" handler receives anything without a named handler. Events
//! that match nothing are dropped.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use tracing::{debug, error, trace};

/// Result returned by an event handler.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback invoked with the event name and its raw body.
pub type EventHandler = Arc<dyn Fn(&str, &str) -> HandlerResult + Send + Sync>;

/// An event received from the appliance.
///
/// The body is passed through untouched; decoding it is up to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The event name.
    pub name: String,
    /// The raw event body.
    pub body: String,
}

impl Event {
    /// Create a new event.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// What happened to a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran and returned successfully.
    Handled,
    /// A handler returned an error or panicked; it was logged and swallowed.
    HandlerFailed,
    /// No handler matched; the event was dropped.
    Unmatched,
}

#[derive(Default)]
struct Registry {
    named: HashMap<String, EventHandler>,
    all: Option<EventHandler>,
}

/// Registered event handlers, shared between a listener and its channels.
///
/// Registration may happen at any time; changes apply to the next event
/// dispatched, including on a live channel.
#[derive(Default)]
pub struct EventSubscriptions {
    registry: RwLock<Registry>,
}

impl EventSubscriptions {
    /// Create an empty set of subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `name`, replacing any previous one.
    pub fn register<F>(&self, name: &str, handler: F)
    where
        F: Fn(&str, &str) -> HandlerResult + Send + Sync + 'static,
    {
        let key = normalize(name);
        debug!(event = %key, "Registering event handler");
        self.write().named.insert(key, Arc::new(handler));
    }

    /// Register the handler for every event without a named handler,
    /// replacing any previous one.
    pub fn register_all<F>(&self, handler: F)
    where
        F: Fn(&str, &str) -> HandlerResult + Send + Sync + 'static,
    {
        debug!("Registering handler for all events");
        self.write().all = Some(Arc::new(handler));
    }

    /// Remove the handler for `name`. Returns true if one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.write().named.remove(&normalize(name)).is_some()
    }

    /// Returns the registered event names (normalized), sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().named.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns true if no handler at all is registered.
    pub fn is_empty(&self) -> bool {
        let registry = self.read();
        registry.named.is_empty() && registry.all.is_none()
    }

    /// Deliver one event to its handler.
    ///
    /// Handler errors and panics are caught and logged here so that a broken
    /// handler can never take down the channel or other handlers.
    pub fn dispatch(&self, event: &Event) -> DispatchOutcome {
        let handler = {
            let registry = self.read();
            registry
                .named
                .get(&normalize(&event.name))
                .or(registry.all.as_ref())
                .cloned()
        };

        let Some(handler) = handler else {
            trace!(event = %event.name, "No handler registered, dropping event");
            return DispatchOutcome::Unmatched;
        };

        match catch_unwind(AssertUnwindSafe(|| handler(&event.name, &event.body))) {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(e)) => {
                error!(event = %event.name, error = %e, "Event handler returned an error");
                DispatchOutcome::HandlerFailed
            }
            Err(panic) => {
                error!(
                    event = %event.name,
                    panic = %panic_message(panic.as_ref()),
                    "Event handler panicked"
                );
                DispatchOutcome::HandlerFailed
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        // Handlers run outside the lock, so a poisoned lock still holds a
        // consistent registry.
        self.registry.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl fmt::Debug for EventSubscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.read();
        f.debug_struct("EventSubscriptions")
            .field("named", &registry.named.keys().collect::<Vec<_>>())
            .field("all", &registry.all.is_some())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
