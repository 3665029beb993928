use bevy::prelude::*;

use crate::resources::Storage;
use arena_common::game::Arena;

// Flush bot learning and settings on the save interval.
pub fn storage_autosave_system(time: Res<Time>, mut storage: ResMut<Storage>, mut arena: ResMut<Arena>) {
    if storage.tick(time.delta()) {
        storage.save(&mut arena);
    }
}
