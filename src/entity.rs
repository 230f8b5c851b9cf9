// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity identifiers and per-entity bookkeeping.

use rustc_hash::FxHashMap;
use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::component::{ComponentData, ComponentTypeId};
use crate::mask::TypeMask;
use crate::query::QueryId;

new_key_type! {
    /// Entity handle backed by slotmap's generational keys.
    pub struct Entity;
}

/// Per-entity record owned by the world's entity arena.
///
/// `added` flips when the entity enters the world; `alive` flips back off
/// at disposal. A record with `added && !alive` is either queued for
/// end-of-tick finalization or, while `num_state_components > 0`, a ghost.
pub(crate) struct EntityRecord {
    /// World-monotonic numeric id, never reused.
    pub id: u64,
    pub name: Option<String>,
    pub added: bool,
    pub alive: bool,
    /// Mask over currently attached component types.
    pub mask: TypeMask,
    /// Mask over types whose instances await end-of-tick finalization.
    pub removed_mask: TypeMask,
    pub components: FxHashMap<ComponentTypeId, ComponentData>,
    pub components_to_remove: FxHashMap<ComponentTypeId, ComponentData>,
    /// Queries this entity currently belongs to.
    pub queries: SmallVec<[QueryId; 4]>,
    pub num_state_components: u32,
}

impl EntityRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: None,
            added: false,
            alive: false,
            mask: TypeMask::new(),
            removed_mask: TypeMask::new(),
            components: FxHashMap::default(),
            components_to_remove: FxHashMap::default(),
            queries: SmallVec::new(),
            num_state_components: 0,
        }
    }

    /// Dead but retained by attached system-state components.
    pub fn is_ghost(&self) -> bool {
        self.added && !self.alive && self.num_state_components > 0
    }

    /// Rejects mutations once the entity has been disposed.
    pub fn accepts_operations(&self) -> bool {
        !self.added || self.alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_flags() {
        let mut rec = EntityRecord::new(1);
        assert!(rec.accepts_operations());
        assert!(!rec.is_ghost());

        rec.added = true;
        rec.alive = true;
        assert!(rec.accepts_operations());

        rec.alive = false;
        rec.num_state_components = 1;
        assert!(rec.is_ghost());
        assert!(!rec.accepts_operations());

        rec.num_state_components = 0;
        assert!(!rec.is_ghost());
    }
}
