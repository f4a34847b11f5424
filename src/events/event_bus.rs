//! Per-instance observer list for save system events.
//!
//! Every slot manager owns its own [`SaveEventBus`]. Handlers run
//! synchronously on the thread that emits, in registration order, and the
//! list is cleared explicitly when the owner shuts down.

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::base_event::SaveEvent;

type Handler = Arc<dyn Fn(&dyn SaveEvent) + Send + Sync>;

/// Identifies a registered handler so it can be removed with [`SaveEventBus::off`].
#[derive(Clone)]
pub struct HandlerId {
    /// Human-readable name.
    pub name: String,
    id: u64,
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerId({}:{})", self.id, self.name)
    }
}

impl PartialEq for HandlerId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for HandlerId {}

impl std::hash::Hash for HandlerId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Clone)]
struct HandlerEntry {
    id: HandlerId,
    /// `None` subscribes to every event type.
    event_type: Option<TypeId>,
    handler: Handler,
}

/// Fan-out of save system events to registered handlers.
pub struct SaveEventBus {
    handlers: RwLock<Vec<HandlerEntry>>,
    next_handler_id: AtomicU64,
    emission_sequence: AtomicU64,
}

impl fmt::Debug for SaveEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveEventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl Default for SaveEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveEventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_handler_id: AtomicU64::new(1),
            emission_sequence: AtomicU64::new(1),
        }
    }

    fn next_id(&self, name: impl Into<String>) -> HandlerId {
        HandlerId {
            name: name.into(),
            id: self.next_handler_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Register a handler for event type `E`.
    pub fn on<E: SaveEvent>(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&E) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.next_id(name);
        let wrapped: Handler = Arc::new(move |event: &dyn SaveEvent| {
            if let Some(event) = event.as_any().downcast_ref::<E>() {
                handler(event);
            }
        });
        self.handlers.write().push(HandlerEntry {
            id: id.clone(),
            event_type: Some(TypeId::of::<E>()),
            handler: wrapped,
        });
        id
    }

    /// Register a handler that receives every event.
    pub fn on_any(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&dyn SaveEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.next_id(name);
        self.handlers.write().push(HandlerEntry {
            id: id.clone(),
            event_type: None,
            handler: Arc::new(handler),
        });
        id
    }

    /// Unregister a handler. Returns `false` if it was not registered.
    pub fn off(&self, handler_id: &HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|e| e.id != *handler_id);
        handlers.len() != before
    }

    /// Deliver `event` to every matching handler in registration order.
    ///
    /// A panicking handler is logged and does not stop delivery to the rest.
    pub fn emit<E: SaveEvent>(&self, mut event: E) {
        event.meta_mut().emission_sequence =
            Some(self.emission_sequence.fetch_add(1, Ordering::Relaxed));

        let type_id = TypeId::of::<E>();
        // Snapshot so handlers may (un)register without deadlocking.
        let entries: Vec<HandlerEntry> = self
            .handlers
            .read()
            .iter()
            .filter(|e| e.event_type.map_or(true, |t| t == type_id))
            .cloned()
            .collect();

        log::debug!(
            "SaveEventBus::emit: {} for slot {} to {} handler(s)",
            event.event_type(),
            event.slot_name(),
            entries.len()
        );

        for entry in entries {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (entry.handler)(&event);
            }));
            if let Err(e) = result {
                log::error!("[SaveEventBus] Handler {:?} panicked: {:?}", entry.id, e);
            }
        }
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl Drop for SaveEventBus {
    fn drop(&mut self) {
        self.clear();
    }
}
