//! Per-level save data: which actors were interacted with and which were moved.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::SaveSystemConfig;
use crate::events::SaveEventBus;
use crate::impl_save_game;
use crate::payload::SaveGameClass;
use crate::subsystems::save_core::IoMode;
use crate::subsystems::save_io::SaveIo;
use crate::subsystems::single_slot::{FixedSlotName, SingleSlotSaveManager};
use crate::utilities::errors::SlotError;

/// Position, orientation (quaternion `x, y, z, w`) and scale of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }
}

/// Payload recording actor state for one level.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LevelSaveData {
    /// Actor id -> interacted flag.
    #[serde(default)]
    pub interacted_actors: RwLock<BTreeMap<String, bool>>,
    /// Actor id -> last recorded transform.
    #[serde(default)]
    pub moved_actors: RwLock<BTreeMap<String, Transform>>,
}

impl_save_game!(LevelSaveData, "LevelSaveData");

impl LevelSaveData {
    pub fn interacted(&self, actor_id: &str) -> Option<bool> {
        self.interacted_actors.read().get(actor_id).copied()
    }

    pub fn moved(&self, actor_id: &str) -> Option<Transform> {
        self.moved_actors.read().get(actor_id).copied()
    }
}

/// An actor in a level that can take back its saved state.
pub trait LevelActor {
    /// Stable identifier used as the key in [`LevelSaveData`].
    fn actor_id(&self) -> &str;

    /// Restore the interacted flag.
    fn update_actor(&self, interacted: bool);

    /// Restore a recorded transform.
    fn apply_transform(&self, _transform: &Transform) {}
}

/// Save manager for the level currently being played.
///
/// The slot name is the level name and the payload is always [`LevelSaveData`].
#[derive(Debug)]
pub struct LevelSaveManager {
    level_name: String,
    slot: SingleSlotSaveManager,
}

impl LevelSaveManager {
    pub fn new(level_name: impl Into<String>, io: SaveIo) -> Self {
        let level_name = level_name.into();
        log::debug!("Level save slot: {}", level_name);
        let slot = SingleSlotSaveManager::new(
            Some(SaveGameClass::of::<LevelSaveData>()),
            io,
            FixedSlotName::new(level_name.clone()),
        );
        Self { level_name, slot }
    }

    pub fn from_config(
        config: &SaveSystemConfig,
        level_name: impl Into<String>,
    ) -> Result<Self, SlotError> {
        Ok(Self::new(level_name, config.build_io()?))
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn events(&self) -> &SaveEventBus {
        self.slot.events()
    }

    /// The loaded level data, if any.
    pub fn data(&self) -> Option<Arc<LevelSaveData>> {
        self.slot.save_game_as::<LevelSaveData>()
    }

    /// Record whether `actor_id` was interacted with. Returns `false` if nothing is loaded.
    pub fn update_actor(&self, actor_id: &str, interacted: bool) -> bool {
        match self.data() {
            Some(data) => {
                data.interacted_actors
                    .write()
                    .insert(actor_id.to_string(), interacted);
                true
            }
            None => {
                log::debug!(
                    "No level data loaded for {}; ignoring update of {}",
                    self.level_name,
                    actor_id
                );
                false
            }
        }
    }

    /// Record the transform of a moved actor. Returns `false` if nothing is loaded.
    pub fn update_moved_actor(&self, actor_id: &str, transform: Transform) -> bool {
        match self.data() {
            Some(data) => {
                data.moved_actors
                    .write()
                    .insert(actor_id.to_string(), transform);
                true
            }
            None => {
                log::debug!(
                    "No level data loaded for {}; ignoring move of {}",
                    self.level_name,
                    actor_id
                );
                false
            }
        }
    }

    pub fn save_data(&mut self, mode: IoMode) -> Result<(), SlotError> {
        self.slot.save_data(mode)
    }

    pub fn load_data(&mut self, mode: IoMode) -> Result<(), SlotError> {
        self.slot.load_data(mode)
    }

    /// Hand recorded state back to the actors present in the level.
    ///
    /// Returns how many actors had recorded state.
    pub fn apply_to_actors(&self, actors: &[&dyn LevelActor]) -> usize {
        let Some(data) = self.data() else {
            log::debug!("No level data loaded for {}; nothing to apply", self.level_name);
            return 0;
        };
        let interacted = data.interacted_actors.read();
        let moved = data.moved_actors.read();
        let mut updated = 0;
        for actor in actors {
            let id = actor.actor_id();
            let flag = interacted.get(id);
            let transform = moved.get(id);
            if let Some(flag) = flag {
                actor.update_actor(*flag);
            }
            if let Some(transform) = transform {
                actor.apply_transform(transform);
            }
            if flag.is_some() || transform.is_some() {
                updated += 1;
            }
        }
        updated
    }

    pub fn poll_completions(&mut self) -> usize {
        self.slot.poll_completions()
    }

    pub fn flush(&mut self) -> usize {
        self.slot.flush()
    }

    pub async fn settle(&mut self) -> usize {
        self.slot.settle().await
    }
}
