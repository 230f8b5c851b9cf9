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

//! Queries: materialized entity sets over an include/exclude predicate.
//!
//! A query is built from spec terms — component types to require and
//! [`not`]-wrapped types to reject. The world keeps one query per
//! canonical key and updates its entity list incrementally on every
//! component mutation.

use serde::Serialize;

use crate::component::ComponentTypeId;
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::event::{EventDispatcher, QueryEvent};
use crate::mask::TypeMask;

/// Index into the world's query table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u32);

impl QueryId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One element of a query spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTerm {
    /// Entity must have the component.
    With(ComponentTypeId),
    /// Entity must not have the component.
    Without(ComponentTypeId),
}

impl From<ComponentTypeId> for QueryTerm {
    fn from(ty: ComponentTypeId) -> Self {
        QueryTerm::With(ty)
    }
}

/// Exclusion marker for query specs.
pub fn not(ty: ComponentTypeId) -> QueryTerm {
    QueryTerm::Without(ty)
}

/// Canonical query key: sorted component names, exclusions `!`-prefixed.
/// Stable under permutation of the spec.
pub(crate) fn canonical_key<F>(terms: &[QueryTerm], mut name_of: F) -> String
where
    F: FnMut(ComponentTypeId) -> String,
{
    let mut parts: Vec<String> = terms
        .iter()
        .map(|term| match term {
            QueryTerm::With(ty) => name_of(*ty),
            QueryTerm::Without(ty) => format!("!{}", name_of(*ty)),
        })
        .collect();
    parts.sort();
    parts.join("-")
}

/// Size counters for one query.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    pub num_components: usize,
    pub num_entities: usize,
}

pub struct Query {
    id: QueryId,
    key: String,
    include: TypeMask,
    exclude: TypeMask,
    include_ids: Vec<ComponentTypeId>,
    exclude_ids: Vec<ComponentTypeId>,
    entities: Vec<Entity>,
    reactive: bool,
    pub(crate) dispatcher: EventDispatcher,
}

impl Query {
    pub(crate) fn new(id: QueryId, key: String, terms: &[QueryTerm]) -> Result<Self> {
        let mut include = TypeMask::new();
        let mut exclude = TypeMask::new();
        let mut include_ids = Vec::new();
        let mut exclude_ids = Vec::new();
        for term in terms {
            match term {
                QueryTerm::With(ty) => {
                    if !include.contains(*ty) {
                        include.insert(*ty);
                        include_ids.push(*ty);
                    }
                }
                QueryTerm::Without(ty) => {
                    if !exclude.contains(*ty) {
                        exclude.insert(*ty);
                        exclude_ids.push(*ty);
                    }
                }
            }
        }
        if include_ids.is_empty() {
            return Err(EcsError::EmptyQuery);
        }
        include_ids.sort();
        exclude_ids.sort();
        Ok(Self {
            id,
            key,
            include,
            exclude,
            include_ids,
            exclude_ids,
            entities: Vec::new(),
            reactive: false,
            dispatcher: EventDispatcher::new(),
        })
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn reactive(&self) -> bool {
        self.reactive
    }

    pub(crate) fn set_reactive(&mut self) {
        self.reactive = true;
    }

    pub fn include_ids(&self) -> &[ComponentTypeId] {
        &self.include_ids
    }

    pub fn exclude_ids(&self) -> &[ComponentTypeId] {
        &self.exclude_ids
    }

    /// Every component type the predicate references.
    pub(crate) fn referenced_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.include_ids
            .iter()
            .chain(self.exclude_ids.iter())
            .copied()
    }

    pub fn includes(&self, ty: ComponentTypeId) -> bool {
        self.include.contains(ty)
    }

    pub fn excludes(&self, ty: ComponentTypeId) -> bool {
        self.exclude.contains(ty)
    }

    /// Predicate over an entity's attached-type mask.
    pub fn match_mask(&self, mask: &TypeMask) -> bool {
        mask.contains_all(&self.include) && mask.is_disjoint(&self.exclude)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    /// Append during bootstrap, without emitting events.
    pub(crate) fn bootstrap_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Append and emit `EntityAdded`.
    pub(crate) fn push_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
        self.dispatcher
            .dispatch(QueryEvent::EntityAdded, entity, None);
    }

    /// Remove, preserving order, and emit `EntityRemoved`.
    pub(crate) fn drop_entity(&mut self, entity: Entity) {
        if let Some(pos) = self.entities.iter().position(|&e| e == entity) {
            self.entities.remove(pos);
            self.dispatcher
                .dispatch(QueryEvent::EntityRemoved, entity, None);
        }
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            num_components: self.include_ids.len() + self.exclude_ids.len(),
            num_entities: self.entities.len(),
        }
    }
}
