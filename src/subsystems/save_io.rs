//! Background I/O against a persisted store.
//!
//! Synchronous operations call the store inline. Asynchronous ones run on a
//! tokio blocking pool and report back through a completion queue that only
//! the owning manager drains, so slot state is never touched off the owner
//! thread.
//!
//! Writes to one slot name are serialized through a per-name gate that also
//! records the lowest generation still allowed to write. Deleting a slot
//! raises that bound, so a queued write from before the delete is skipped and
//! one already running finishes before the delete goes through.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::payload::WeakSaveGame;
use crate::store::{SaveRecord, SaveStore};
use crate::utilities::errors::{SlotError, StoreError};

/// Identifies the slot incarnation an async operation was issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub slot_name: String,
    /// Incarnation counter of the slot when the operation was issued.
    pub generation: u64,
}

impl Ticket {
    pub fn new(slot_name: impl Into<String>, generation: u64) -> Self {
        Self {
            slot_name: slot_name.into(),
            generation,
        }
    }
}

/// Outcome of an asynchronous store operation.
#[derive(Debug)]
pub enum Completion {
    Saved {
        ticket: Ticket,
        /// The payload whose snapshot was written.
        payload: WeakSaveGame,
        result: Result<(), StoreError>,
    },
    Restored {
        ticket: Ticket,
        result: Result<Option<SaveRecord>, StoreError>,
    },
}

impl Completion {
    pub fn ticket(&self) -> &Ticket {
        match self {
            Completion::Saved { ticket, .. } | Completion::Restored { ticket, .. } => ticket,
        }
    }
}

/// Lowest generation allowed to write a slot name.
type WriteGate = Arc<Mutex<u64>>;

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run a store call, turning a panic into a store error.
fn guarded<T>(
    op: &str,
    name: &str,
    call: impl FnOnce() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|panic| {
        let message = panic_message(panic.as_ref());
        log::error!("SaveIo: store panicked during {} of slot {}: {}", op, name, message);
        Err(StoreError::other(format!("store panicked during {}: {}", op, message)))
    })
}

/// Store access plus the background worker and its completion queue.
pub struct SaveIo {
    store: Arc<dyn SaveStore>,
    gates: Arc<DashMap<String, WriteGate>>,
    /// Present when this instance owns its runtime.
    runtime: Option<Runtime>,
    handle: Handle,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    in_flight: Vec<JoinHandle<()>>,
}

impl fmt::Debug for SaveIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveIo")
            .field("store", &self.store)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl SaveIo {
    /// Create I/O over `store` with a dedicated runtime of `worker_threads` threads.
    pub fn new(store: Arc<dyn SaveStore>, worker_threads: usize) -> Result<Self, SlotError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .max_blocking_threads(worker_threads.max(1))
            .thread_name("save-io")
            .enable_all()
            .build()
            .map_err(|e| SlotError::Runtime {
                message: e.to_string(),
            })?;
        let handle = runtime.handle().clone();
        Ok(Self::build(store, Some(runtime), handle))
    }

    /// Create I/O over `store` that spawns onto an existing tokio runtime.
    pub fn with_handle(store: Arc<dyn SaveStore>, handle: Handle) -> Self {
        Self::build(store, None, handle)
    }

    fn build(store: Arc<dyn SaveStore>, runtime: Option<Runtime>, handle: Handle) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            store,
            gates: Arc::new(DashMap::new()),
            runtime,
            handle,
            tx,
            rx,
            in_flight: Vec::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SaveStore> {
        &self.store
    }

    fn gate(&self, name: &str) -> WriteGate {
        Arc::clone(self.gates.entry(name.to_string()).or_default().value())
    }

    /// Delete `name` from the store and discard writes issued below `generation`.
    ///
    /// Blocks while a write to `name` is running. Returns whether the store
    /// no longer holds the name.
    pub fn delete(&self, name: &str, generation: u64) -> bool {
        let gate = self.gate(name);
        let mut lowest = gate.lock();
        *lowest = (*lowest).max(generation);
        log::debug!("SaveIo: writes to slot {} below generation {} discarded", name, *lowest);
        !self.store.exists(name) || self.store.delete(name)
    }

    /// Write `record` in the background.
    ///
    /// The write is skipped if `name` was deleted after the ticket was issued.
    pub fn submit_save(&mut self, ticket: Ticket, record: SaveRecord, payload: WeakSaveGame) {
        let store = Arc::clone(&self.store);
        let gate = self.gate(&ticket.slot_name);
        let tx = self.tx.clone();
        log::debug!("SaveIo: queue save for slot {}", ticket.slot_name);
        let handle = self.handle.spawn_blocking(move || {
            let result = guarded("save", &ticket.slot_name, || {
                let lowest = gate.lock();
                if ticket.generation < *lowest {
                    log::debug!(
                        "SaveIo: skip save of deleted slot {} (generation {})",
                        ticket.slot_name,
                        ticket.generation
                    );
                    return Err(StoreError::other(format!(
                        "slot {} was deleted before the write ran",
                        ticket.slot_name
                    )));
                }
                store.save(&ticket.slot_name, &record)
            });
            // The receiver only disappears when the owner is gone.
            let _ = tx.send(Completion::Saved {
                ticket,
                payload,
                result,
            });
        });
        self.track(handle);
    }

    /// Read the record for `ticket.slot_name` in the background.
    pub fn submit_restore(&mut self, ticket: Ticket) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        log::debug!("SaveIo: queue restore for slot {}", ticket.slot_name);
        let handle = self.handle.spawn_blocking(move || {
            let result = guarded("restore", &ticket.slot_name, || {
                store.restore(&ticket.slot_name)
            });
            let _ = tx.send(Completion::Restored { ticket, result });
        });
        self.track(handle);
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.push(handle);
    }

    /// Next completion that has already arrived, without blocking.
    pub fn try_next(&mut self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }

    /// Number of operations still running.
    pub fn in_flight(&mut self) -> usize {
        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.len()
    }

    /// Block until every submitted operation has finished.
    ///
    /// Must not be called from inside an async context; use [`wait_idle`](Self::wait_idle) there.
    pub fn wait_idle_blocking(&mut self) {
        for handle in std::mem::take(&mut self.in_flight) {
            if let Err(e) = futures::executor::block_on(handle) {
                log::error!("SaveIo: background operation failed: {}", e);
            }
        }
    }

    /// Wait until every submitted operation has finished.
    pub async fn wait_idle(&mut self) {
        for handle in std::mem::take(&mut self.in_flight) {
            if let Err(e) = handle.await {
                log::error!("SaveIo: background operation failed: {}", e);
            }
        }
    }
}

impl Drop for SaveIo {
    fn drop(&mut self) {
        // Work that has not started yet is abandoned; call `wait_idle*` first to keep it.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
