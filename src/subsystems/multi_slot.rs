//! Registry of named save slots with an active-slot selector.
//!
//! Slot state per name moves `Unregistered -> Unloaded -> Cached` and back to
//! `Unregistered` on removal. Every registration gets a fresh generation
//! number; background completions carry the generation they were issued
//! against and are discarded when it no longer matches, so a removed (or
//! removed and re-added) slot is never written to by an old operation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SaveSystemConfig;
use crate::events::{SaveEventBus, SlotAddedEvent, SlotCreatedEvent, SlotRemovedEvent};
use crate::payload::{downcast_save_game, SaveGame, SaveGameClass, SaveGameRef, WeakSaveGame};
use crate::subsystems::save_core::{IoMode, SaveCore};
use crate::subsystems::save_io::{Completion, SaveIo, Ticket};
use crate::utilities::errors::SlotError;

/// What `add_slot` does with a name that is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateSlotPolicy {
    /// Fail with [`SlotError::DuplicateName`].
    #[default]
    Reject,
    /// Succeed without touching the slot or firing events.
    Idempotent,
}

/// Where a slot name stands in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Unregistered,
    /// Registered, payload only on the persisted store.
    Unloaded,
    /// Registered with a cached payload.
    Cached,
}

#[derive(Debug)]
struct SlotEntry {
    generation: u64,
    payload: Option<SaveGameRef>,
}

/// Multi-slot save registry.
pub struct SlotRegistry {
    core: SaveCore,
    /// Registered names in creation order.
    names: Vec<String>,
    slots: HashMap<String, SlotEntry>,
    active: Option<String>,
    /// Every payload this registry created or loaded.
    created: Vec<WeakSaveGame>,
    next_generation: u64,
    policy: DuplicateSlotPolicy,
}

impl fmt::Debug for SlotRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotRegistry")
            .field("slots", &self.names)
            .field("active", &self.active)
            .field("class", &self.core.class)
            .field("policy", &self.policy)
            .finish()
    }
}

fn validate_name(name: &str) -> Result<(), SlotError> {
    if name.trim().is_empty() {
        log::error!("Slot name is empty");
        return Err(SlotError::EmptyName);
    }
    Ok(())
}

fn unknown(name: &str) -> SlotError {
    log::error!("Slot {} is not registered", name);
    SlotError::UnknownSlot {
        name: name.to_string(),
    }
}

impl SlotRegistry {
    pub fn new(class: Option<SaveGameClass>, io: SaveIo) -> Self {
        Self {
            core: SaveCore::new(class, io),
            names: Vec::new(),
            slots: HashMap::new(),
            active: None,
            created: Vec::new(),
            next_generation: 0,
            policy: DuplicateSlotPolicy::default(),
        }
    }

    /// Build a registry over the configured store and duplicate policy.
    pub fn from_config(
        config: &SaveSystemConfig,
        class: Option<SaveGameClass>,
    ) -> Result<Self, SlotError> {
        let io = config.build_io()?;
        Ok(Self::new(class, io).with_duplicate_policy(config.duplicate_slot_policy))
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicateSlotPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn duplicate_policy(&self) -> DuplicateSlotPolicy {
        self.policy
    }

    pub fn events(&self) -> &SaveEventBus {
        &self.core.events
    }

    pub fn save_game_class(&self) -> Option<&SaveGameClass> {
        self.core.class.as_ref()
    }

    /// Change the payload class. Cached payloads of another class are unloaded.
    pub fn set_save_game_class(&mut self, class: Option<SaveGameClass>) {
        let mut unloaded = 0;
        for entry in self.slots.values_mut() {
            let keep = match (&class, &entry.payload) {
                (Some(class), Some(payload)) => class.is_instance(payload.as_ref()),
                (_, None) => true,
                (None, Some(_)) => false,
            };
            if !keep {
                self.next_generation += 1;
                entry.generation = self.next_generation;
                entry.payload = None;
                unloaded += 1;
            }
        }
        if unloaded > 0 {
            log::info!("Save game class changed; unloaded {} slot(s)", unloaded);
        }
        self.core.class = class;
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    fn register(&mut self, name: &str, payload: Option<SaveGameRef>) -> usize {
        self.next_generation += 1;
        if let Some(payload) = &payload {
            self.track(payload);
        }
        self.slots.insert(
            name.to_string(),
            SlotEntry {
                generation: self.next_generation,
                payload,
            },
        );
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    fn track(&mut self, payload: &SaveGameRef) {
        self.created.retain(|weak| weak.strong_count() > 0);
        self.created.push(Arc::downgrade(payload));
    }

    /// Register `name`.
    ///
    /// A name already persisted is restored into the cache and announced
    /// with [`SlotAddedEvent`]. Otherwise a default payload is created and
    /// [`SlotCreatedEvent`] follows.
    pub fn add_slot(&mut self, name: &str) -> Result<(), SlotError> {
        validate_name(name)?;
        if self.slots.contains_key(name) {
            return match self.policy {
                DuplicateSlotPolicy::Reject => {
                    log::error!("Slot {} already exists", name);
                    Err(SlotError::DuplicateName {
                        name: name.to_string(),
                    })
                }
                DuplicateSlotPolicy::Idempotent => {
                    log::debug!("Slot {} already exists; nothing to add", name);
                    Ok(())
                }
            };
        }

        let restored = self.core.restore_now(name).map_err(|e| {
            log::error!("Could not restore slot {}: {}", name, e);
            e
        })?;
        match restored {
            Some(payload) => {
                log::info!("Adding slot {} from persisted data", name);
                self.core.after_load(name, &payload);
                let index = self.register(name, Some(payload));
                self.core.events.emit(SlotAddedEvent::new(name, index));
            }
            None => {
                log::info!("Adding slot {} with a new save game", name);
                let payload = self.core.new_payload()?;
                let index = self.register(name, Some(payload));
                self.core.events.emit(SlotAddedEvent::new(name, index));
                self.core.events.emit(SlotCreatedEvent::new(name, index));
            }
        }
        Ok(())
    }

    /// Register `name` only if nothing is persisted under it yet.
    ///
    /// Fails with [`SlotError::AlreadyPersisted`] when the store already holds
    /// the name; otherwise behaves like [`add_slot`](Self::add_slot).
    pub fn add_new_slot(&mut self, name: &str) -> Result<(), SlotError> {
        validate_name(name)?;
        if self.core.exists(name) {
            log::error!("Slot {} already exists on the store", name);
            return Err(SlotError::AlreadyPersisted {
                name: name.to_string(),
            });
        }
        self.add_slot(name)
    }

    /// [`add_slot`](Self::add_slot) then [`set_active_slot`](Self::set_active_slot).
    pub fn add_slot_and_set_active(
        &mut self,
        name: &str,
        load: Option<IoMode>,
    ) -> Result<(), SlotError> {
        self.add_slot(name)?;
        self.set_active_slot(name, load)
    }

    /// Unregister `name` and release the registry's reference to its payload.
    ///
    /// The persisted copy is left alone; see [`delete_slot`](Self::delete_slot).
    pub fn remove_slot(&mut self, name: &str) -> Result<(), SlotError> {
        let index = self.slot_index(name).ok_or_else(|| unknown(name))?;
        log::info!("Removing slot {} at index {}", name, index);
        self.names.remove(index);
        self.slots.remove(name);
        if self.active.as_deref() == Some(name) {
            log::info!("Removed slot {} was active; clearing active slot", name);
            self.active = None;
        }
        self.core.events.emit(SlotRemovedEvent::new(name, index));
        Ok(())
    }

    /// Remove `name` and delete its persisted copy.
    ///
    /// Background saves issued for the slot never outlive the delete.
    pub fn delete_slot(&mut self, name: &str) -> Result<(), SlotError> {
        self.remove_slot(name)?;
        self.core.delete(name, self.next_generation + 1);
        Ok(())
    }

    /// Register every persisted slot that is not yet known, without loading it.
    ///
    /// Returns the newly registered names.
    pub fn discover_slots(&mut self) -> Result<Vec<String>, SlotError> {
        let mut discovered = Vec::new();
        for name in self.core.store().list_names()? {
            if name.trim().is_empty() || self.slots.contains_key(&name) {
                continue;
            }
            let index = self.register(&name, None);
            log::debug!("Discovered persisted slot {}", name);
            self.core.events.emit(SlotAddedEvent::new(&name, index));
            discovered.push(name);
        }
        Ok(discovered)
    }

    /// Replace the slot's payload with a fresh default and delete its persisted copy.
    pub fn reset_slot(&mut self, name: &str) -> Result<(), SlotError> {
        let index = self.slot_index(name).ok_or_else(|| unknown(name))?;
        let payload = self.core.new_payload()?;
        self.next_generation += 1;
        let generation = self.next_generation;
        self.core.delete(name, generation);
        self.track(&payload);
        if let Some(entry) = self.slots.get_mut(name) {
            entry.generation = generation;
            entry.payload = Some(payload);
        }
        log::info!("Created new save game in slot {}", name);
        self.core.events.emit(SlotCreatedEvent::new(name, index));
        Ok(())
    }

    /// Make `name` the active slot, registering it if needed.
    ///
    /// With `overwrite`, data already cached or persisted under `name` is
    /// replaced by a fresh payload. Without it, existing data is kept and only
    /// an unknown, unpersisted name gets a new payload.
    pub fn create_slot_and_set_active(
        &mut self,
        name: &str,
        overwrite: bool,
    ) -> Result<(), SlotError> {
        validate_name(name)?;
        if !self.slots.contains_key(name) {
            let persisted = self.core.exists(name);
            self.add_slot(name)?;
            self.set_active_slot(name, None)?;
            if persisted && overwrite {
                self.reset_slot(name)?;
            }
            return Ok(());
        }
        self.set_active_slot(name, None)?;
        if overwrite {
            self.reset_slot(name)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Active slot
    // ---------------------------------------------------------------------

    /// Select `name` as the active slot, optionally loading it.
    ///
    /// The selector moves only once a sync load has succeeded or an async
    /// load has been queued.
    pub fn set_active_slot(&mut self, name: &str, load: Option<IoMode>) -> Result<(), SlotError> {
        if !self.slots.contains_key(name) {
            return Err(unknown(name));
        }
        if let Some(mode) = load {
            self.load_slot(name, mode)?;
        }
        log::info!("Setting active slot to {}", name);
        self.active = Some(name.to_string());
        Ok(())
    }

    /// Select the slot at creation-order `index` as the active slot.
    pub fn set_active_slot_index(
        &mut self,
        index: usize,
        load: Option<IoMode>,
    ) -> Result<(), SlotError> {
        let name = self
            .slot_name_at(index)
            .map(str::to_string)
            .ok_or_else(|| {
                log::error!("Slot index {} is not valid", index);
                SlotError::InvalidIndex { index }
            })?;
        self.set_active_slot(&name, load)
    }

    pub fn active_slot(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_slot_index(&self) -> Option<usize> {
        self.active.as_deref().and_then(|name| self.slot_index(name))
    }

    fn require_active(&self) -> Result<String, SlotError> {
        self.active.clone().ok_or_else(|| {
            log::error!("No active slot");
            SlotError::NoActiveSlot
        })
    }

    /// Save the active slot.
    pub fn save_active(&mut self, mode: IoMode) -> Result<(), SlotError> {
        let name = self.require_active()?;
        self.save_slot(&name, mode)
    }

    /// Load the active slot.
    pub fn load_active(&mut self, mode: IoMode) -> Result<(), SlotError> {
        let name = self.require_active()?;
        self.load_slot(&name, mode)
    }

    // ---------------------------------------------------------------------
    // Save / load
    // ---------------------------------------------------------------------

    /// The cached payload for `name`, restoring an unloaded slot first.
    fn ensure_cached(&mut self, name: &str) -> Result<SaveGameRef, SlotError> {
        let entry = self.slots.get(name).ok_or_else(|| unknown(name))?;
        if let Some(payload) = &entry.payload {
            return Ok(Arc::clone(payload));
        }

        log::debug!("Slot {} is not loaded; restoring from store", name);
        let (payload, created) = match self.core.restore_now(name)? {
            Some(payload) => {
                self.core.after_load(name, &payload);
                (payload, false)
            }
            None => {
                log::warn!("Slot {} is no longer persisted; creating a new save game", name);
                (self.core.new_payload()?, true)
            }
        };
        self.track(&payload);
        if let Some(entry) = self.slots.get_mut(name) {
            entry.payload = Some(Arc::clone(&payload));
        }
        if created {
            if let Some(index) = self.slot_index(name) {
                self.core.events.emit(SlotCreatedEvent::new(name, index));
            }
        }
        Ok(payload)
    }

    /// Persist the payload of `name`.
    ///
    /// `Async` returns once the write is queued; the outcome arrives as a
    /// [`DataSavedEvent`](crate::events::DataSavedEvent).
    pub fn save_slot(&mut self, name: &str, mode: IoMode) -> Result<(), SlotError> {
        let payload = self.ensure_cached(name)?;
        log::debug!("Saving slot {} ({:?})", name, mode);
        match mode {
            IoMode::Sync => self.core.save_now(name, &payload),
            IoMode::Async => {
                let generation = self.generation_of(name).ok_or_else(|| unknown(name))?;
                self.core
                    .save_later(Ticket::new(name, generation), &payload)
            }
        }
    }

    /// Reload `name` from the persisted store.
    ///
    /// When nothing is persisted the cached payload (or a fresh default) is
    /// announced as loaded.
    pub fn load_slot(&mut self, name: &str, mode: IoMode) -> Result<(), SlotError> {
        let generation = self.generation_of(name).ok_or_else(|| unknown(name))?;
        self.core.require_class()?;
        log::debug!("Loading slot {} ({:?})", name, mode);
        match mode {
            IoMode::Sync => match self.core.restore_now(name) {
                Ok(restored) => self.install_loaded(name, restored),
                Err(e) => {
                    self.core.fail_load(name, e.to_string());
                    Err(e)
                }
            },
            IoMode::Async => {
                self.core.load_later(Ticket::new(name, generation));
                Ok(())
            }
        }
    }

    fn install_loaded(
        &mut self,
        name: &str,
        restored: Option<SaveGameRef>,
    ) -> Result<(), SlotError> {
        let cached = self.slots.get(name).and_then(|e| e.payload.clone());
        let payload = match (restored, cached) {
            (Some(payload), _) => {
                self.track(&payload);
                payload
            }
            (None, Some(cached)) => cached,
            (None, None) => {
                let payload = self.core.new_payload()?;
                self.track(&payload);
                payload
            }
        };
        if let Some(entry) = self.slots.get_mut(name) {
            entry.payload = Some(Arc::clone(&payload));
        }
        self.core.finish_load(name, &payload);
        Ok(())
    }

    fn generation_of(&self, name: &str) -> Option<u64> {
        self.slots.get(name).map(|entry| entry.generation)
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation_of(&ticket.slot_name) == Some(ticket.generation)
    }

    fn apply(&mut self, completion: Completion) {
        if !self.is_current(completion.ticket()) {
            self.core.reject_stale(completion);
            return;
        }
        match completion {
            Completion::Saved {
                ticket,
                payload,
                result,
            } => {
                let outcome = result.map_err(|e| e.to_string());
                self.core
                    .finish_save(&ticket.slot_name, payload.upgrade(), outcome);
            }
            Completion::Restored { ticket, result } => {
                let installed = self
                    .core
                    .decode_restored(result)
                    .and_then(|restored| self.install_loaded(&ticket.slot_name, restored));
                if let Err(e) = installed {
                    self.core.fail_load(&ticket.slot_name, e.to_string());
                }
            }
        }
    }

    /// Apply every completion that has arrived. Returns how many were applied.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.core.io.try_next() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Block until background I/O is idle, then apply completions.
    ///
    /// Must not be called from inside an async context; use [`settle`](Self::settle) there.
    pub fn flush(&mut self) -> usize {
        self.core.io.wait_idle_blocking();
        self.poll_completions()
    }

    /// Wait for background I/O to go idle, then apply completions.
    pub async fn settle(&mut self) -> usize {
        self.core.io.wait_idle().await;
        self.poll_completions()
    }

    /// Finish outstanding I/O and drop every observer.
    pub fn shutdown(&mut self) {
        self.flush();
        self.core.events.clear();
        log::debug!("Slot registry shut down with {} slot(s)", self.names.len());
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// Registered names in creation order.
    pub fn all_slot_names(&self) -> &[String] {
        &self.names
    }

    /// Payloads created or loaded by this registry that are still alive.
    pub fn all_live_payloads(&self) -> Vec<SaveGameRef> {
        self.created.iter().filter_map(|weak| weak.upgrade()).collect()
    }

    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn slot_name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn slot_state(&self, name: &str) -> SlotState {
        match self.slots.get(name) {
            None => SlotState::Unregistered,
            Some(SlotEntry { payload: None, .. }) => SlotState::Unloaded,
            Some(SlotEntry {
                payload: Some(_), ..
            }) => SlotState::Cached,
        }
    }

    /// Whether the persisted store holds data for `name`. Always asks the store.
    pub fn exists_on_store(&self, name: &str) -> bool {
        self.core.exists(name)
    }

    /// Cached payload of `name` without touching the store.
    pub fn cached_save_game(&self, name: &str) -> Option<SaveGameRef> {
        self.slots.get(name).and_then(|entry| entry.payload.clone())
    }

    /// Payload of `name`, restoring an unloaded slot first.
    pub fn save_game_at(&mut self, name: &str) -> Result<SaveGameRef, SlotError> {
        self.ensure_cached(name)
    }

    /// Payload of `name` as a concrete type. `None` if unavailable or of another type.
    pub fn save_game_at_as<T: SaveGame>(&mut self, name: &str) -> Option<Arc<T>> {
        let payload = self.ensure_cached(name).ok()?;
        downcast_save_game::<T>(&payload)
    }
}

impl Drop for SlotRegistry {
    fn drop(&mut self) {
        self.core.events.clear();
    }
}
