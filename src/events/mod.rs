//! Save system events.
//!
//! Each slot manager owns a [`SaveEventBus`]; subscribe with
//! [`SaveEventBus::on`] for one event type or [`SaveEventBus::on_any`] for all.

/// Event trait, metadata and the `impl_save_event!` macro.
pub mod base_event;

/// Per-instance observer list.
pub mod event_bus;

/// Concrete event structs.
pub mod types;

pub use base_event::{EventMeta, SaveEvent};
pub use event_bus::{HandlerId, SaveEventBus};
pub use types::{
    DataLoadedEvent, DataSavedEvent, SlotAddedEvent, SlotCreatedEvent, SlotRemovedEvent,
};
