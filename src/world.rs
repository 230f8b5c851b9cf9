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

//! World: central entity, component, and query coordinator.
//!
//! The world owns the entity arena, the per-type component stores, the
//! query table, and the system manager. Every component mutation routes
//! through the world so exactly the queries referencing the affected
//! type are updated, at the call site.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::time::Instant;

use ahash::AHashMap;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::warn;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::component::{
    ComponentData, ComponentDesc, ComponentInfo, ComponentKind, ComponentStore, ComponentTypeId,
    PoolPolicy,
};
use crate::entity::{Entity, EntityRecord};
use crate::error::{EcsError, Result};
use crate::event::{event_buffer, QueryEvent};
use crate::mask::TypeMask;
use crate::observer::ObservabilitySink;
use crate::query::{canonical_key, Query, QueryId, QueryTerm};
use crate::schedule::{SystemEntry, SystemManager};
use crate::stats::{
    ComponentStats, EventCountJson, ListenJson, PoolStats, QueryComponentsJson, QueryJson,
    SystemJson, SystemQueryJson, WorldStats,
};
use crate::system::{Changed, System, SystemAttributes, SystemQueries, SystemQuery};
use crate::types::Value;

/// Construction options.
pub struct WorldOptions {
    /// When false, every deferred mutator degrades to its synchronous
    /// variant and the end-of-tick drain is a no-op.
    pub deferred_removal_enabled: bool,
    /// Host observability sink, notified of world lifecycle events.
    pub sink: Option<Box<dyn ObservabilitySink>>,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            deferred_removal_enabled: true,
            sink: None,
        }
    }
}

/// Central ECS world.
pub struct World {
    entities: SlotMap<Entity, EntityRecord>,
    /// Monotonic numeric entity id, never reused.
    next_entity_id: u64,
    names: AHashMap<String, Vec<Entity>>,

    stores: Vec<ComponentStore>,
    store_index: AHashMap<String, ComponentTypeId>,

    queries: Vec<Query>,
    query_index: AHashMap<String, QueryId>,
    /// Reverse index: component type -> queries referencing it.
    queries_by_component: FxHashMap<ComponentTypeId, Vec<QueryId>>,

    entities_to_dispose: Vec<Entity>,
    entities_with_removed_components: Vec<Entity>,

    systems: SystemManager,
    enabled: bool,
    deferred_removal_enabled: bool,

    last_tick: Option<Instant>,
    elapsed: f64,

    sink: Option<Box<dyn ObservabilitySink>>,
}

impl World {
    pub fn new() -> Self {
        Self::with_options(WorldOptions::default())
    }

    pub fn with_options(options: WorldOptions) -> Self {
        let mut world = Self {
            entities: SlotMap::with_key(),
            next_entity_id: 0,
            names: AHashMap::new(),
            stores: Vec::new(),
            store_index: AHashMap::new(),
            queries: Vec::new(),
            query_index: AHashMap::new(),
            queries_by_component: FxHashMap::default(),
            entities_to_dispose: Vec::new(),
            entities_with_removed_components: Vec::new(),
            systems: SystemManager::new(),
            enabled: true,
            deferred_removal_enabled: options.deferred_removal_enabled,
            last_tick: None,
            elapsed: 0.0,
            sink: options.sink,
        };
        if let Some(sink) = &mut world.sink {
            sink.world_created(crate::VERSION);
        }
        world
    }

    // ------------------------------------------------------------------
    // Component registration

    /// Register a component type with a pooled store.
    pub fn register_component(&mut self, desc: ComponentDesc) -> Result<ComponentTypeId> {
        self.register_component_with(desc, PoolPolicy::Pooled)
    }

    /// Register a component type with an explicit pooling policy.
    ///
    /// Double registration of a name warns and returns the existing id.
    pub fn register_component_with(
        &mut self,
        desc: ComponentDesc,
        policy: PoolPolicy,
    ) -> Result<ComponentTypeId> {
        if desc.name().is_empty() {
            warn!("registering a component type with an empty name");
        } else if let Some(&existing) = self.store_index.get(desc.name()) {
            warn!(component = desc.name(), "component already registered");
            return Ok(existing);
        }

        let (name, kind, schema) = desc.build()?;
        let id = ComponentTypeId::from_index(self.stores.len());
        let info = ComponentInfo {
            id,
            name: name.clone(),
            kind,
            schema: std::sync::Arc::new(schema),
        };
        self.stores.push(ComponentStore::new(info, policy));
        if !name.is_empty() {
            self.store_index.insert(name, id);
        }
        Ok(id)
    }

    pub fn has_registered_component(&self, name: &str) -> bool {
        self.store_index.contains_key(name)
    }

    pub fn component_id(&self, name: &str) -> Option<ComponentTypeId> {
        self.store_index.get(name).copied()
    }

    pub fn component_name(&self, ty: ComponentTypeId) -> Option<&str> {
        self.stores.get(ty.index()).map(|s| s.info.name.as_str())
    }

    pub fn component_kind(&self, ty: ComponentTypeId) -> Option<ComponentKind> {
        self.stores.get(ty.index()).map(|s| s.info.kind)
    }

    /// Live attached instances of a type, world-wide.
    pub fn component_count(&self, ty: ComponentTypeId) -> usize {
        self.stores.get(ty.index()).map(|s| s.count).unwrap_or(0)
    }

    pub fn component_pool_stats(&self, ty: ComponentTypeId) -> Option<PoolStats> {
        let pool = self.stores.get(ty.index())?.pool.as_ref()?;
        Some(PoolStats {
            size: pool.total_size(),
            free: pool.total_free(),
            used: pool.total_used(),
        })
    }

    fn valid_type(&self, ty: ComponentTypeId) -> bool {
        ty.index() < self.stores.len()
    }

    /// Name used in query keys; unnamed types fall back to their id.
    fn key_name_of(&self, ty: ComponentTypeId) -> String {
        let name = &self.stores[ty.index()].info.name;
        if name.is_empty() {
            format!("#{}", ty.raw())
        } else {
            name.clone()
        }
    }

    // ------------------------------------------------------------------
    // Entity lifecycle

    /// Create an entity and add it to the world.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.create_detached_entity();
        self.add_entity(entity)
    }

    /// Create a named entity and add it to the world.
    pub fn create_named_entity(&mut self, name: &str) -> Entity {
        let entity = self.create_detached_entity();
        if let Some(rec) = self.entities.get_mut(entity) {
            rec.name = Some(name.to_string());
        }
        self.add_entity(entity)
    }

    /// Create an entity that is not yet part of the world. Components
    /// added before [`World::add_entity`] emit no events; the add step
    /// replays them to all queries.
    pub fn create_detached_entity(&mut self) -> Entity {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.insert(EntityRecord::new(id))
    }

    /// Add a detached entity to the world, replaying its components to
    /// every query. Adding a live entity warns and returns it unchanged.
    pub fn add_entity(&mut self, entity: Entity) -> Entity {
        let Some(rec) = self.entities.get_mut(entity) else {
            warn!("add_entity on an unknown entity handle");
            return entity;
        };
        if rec.added {
            warn!(id = rec.id, "entity already added");
            return entity;
        }
        rec.added = true;
        rec.alive = true;
        if let Some(name) = rec.name.clone() {
            self.names.entry(name).or_default().push(entity);
        }
        let types: Vec<ComponentTypeId> = self.entities[entity].mask.iter().collect();
        for ty in types {
            self.route_component_added(entity, ty);
        }
        entity
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.get(entity).map(|r| r.alive).unwrap_or(false)
    }

    /// World-unique numeric id of the entity.
    pub fn entity_id(&self, entity: Entity) -> Option<u64> {
        self.entities.get(entity).map(|r| r.id)
    }

    pub fn entity_name(&self, entity: Entity) -> Option<&str> {
        self.entities.get(entity)?.name.as_deref()
    }

    pub fn find_entity_by_name(&self, name: &str) -> Option<Entity> {
        self.names.get(name).and_then(|list| list.first().copied())
    }

    pub fn get_entities_by_name(&self, name: &str) -> Vec<Entity> {
        self.names.get(name).cloned().unwrap_or_default()
    }

    /// Entities currently added to the world, ghosts included.
    pub fn num_entities(&self) -> usize {
        self.entities.values().filter(|r| r.added).count()
    }

    pub fn entity(&self, entity: Entity) -> Option<EntityRef<'_>> {
        self.entities.get(entity)?;
        Some(EntityRef {
            world: self,
            entity,
        })
    }

    /// Remove the entity's components and retire it at end of tick.
    /// With attached system-state components it lingers as a ghost.
    pub fn dispose_entity(&mut self, entity: Entity) -> Result<()> {
        self.dispose_entity_inner(entity, false)
    }

    /// Dispose synchronously: finalize components, drop the record, and
    /// recycle the handle immediately.
    pub fn dispose_entity_immediately(&mut self, entity: Entity) -> Result<()> {
        self.dispose_entity_inner(entity, true)
    }

    fn dispose_entity_inner(&mut self, entity: Entity, forced: bool) -> Result<()> {
        let immediate = forced || !self.deferred_removal_enabled;
        let Some(rec) = self.entities.get_mut(entity) else {
            return Err(EcsError::EntityNotFound);
        };
        if !rec.added {
            self.release_entity(entity);
            return Ok(());
        }
        rec.alive = false;
        if rec.num_state_components == 0 {
            let qids: SmallVec<[QueryId; 8]> = rec.queries.drain(..).collect();
            for qid in qids {
                self.queries[qid.index()].drop_entity(entity);
            }
            self.remove_all_components(entity, immediate)?;
            if immediate {
                self.process_removed_components(entity);
                self.release_entity(entity);
            } else {
                self.entities_to_dispose.push(entity);
            }
        } else {
            // Ghost: drain the plain components, keep the state ones.
            self.remove_all_components(entity, immediate)?;
        }
        Ok(())
    }

    /// Finalize pending removals, recycle instances, drop the record.
    fn release_entity(&mut self, entity: Entity) {
        let Some(mut rec) = self.entities.remove(entity) else {
            return;
        };
        if let Some(name) = &rec.name {
            if let Some(list) = self.names.get_mut(name) {
                list.retain(|&e| e != entity);
                if list.is_empty() {
                    self.names.remove(name);
                }
            }
        }
        for (ty, data) in rec.components.drain() {
            let store = &mut self.stores[ty.index()];
            store.count -= 1;
            store.release_instance(data);
        }
        for (ty, data) in rec.components_to_remove.drain() {
            self.stores[ty.index()].release_instance(data);
        }
    }

    /// Copy every component of `src` onto `dst`, emitting the usual
    /// add events when `dst` is live.
    pub fn copy_entity(&mut self, dst: Entity, src: Entity) -> Result<()> {
        let types: Vec<ComponentTypeId> = self
            .entities
            .get(src)
            .ok_or(EcsError::EntityNotFound)?
            .mask
            .iter()
            .collect();
        for ty in types {
            let data = self.entities[src].components[&ty].clone();
            self.attach_component(dst, data)?;
        }
        Ok(())
    }

    /// Structural clone into a fresh detached entity.
    pub fn clone_entity(&mut self, src: Entity) -> Result<Entity> {
        let dst = self.create_detached_entity();
        self.copy_entity(dst, src)?;
        Ok(dst)
    }

    // ------------------------------------------------------------------
    // Component attachment

    /// Attach a default-constructed component. No-op when already
    /// attached.
    pub fn add_component(&mut self, entity: Entity, ty: ComponentTypeId) -> Result<()> {
        self.add_component_with(entity, ty, std::iter::empty::<(&str, Value)>())
    }

    /// Attach a component with construction props copied over the
    /// defaults.
    pub fn add_component_with<'a>(
        &mut self,
        entity: Entity,
        ty: ComponentTypeId,
        props: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<()> {
        if !self.valid_type(ty) {
            warn!(type_id = ty.raw(), "component type used without registration");
            return Ok(());
        }
        {
            let Some(rec) = self.entities.get(entity) else {
                return Err(EcsError::EntityNotFound);
            };
            if !rec.accepts_operations() {
                warn!(id = rec.id, "component add on a disposed entity ignored");
                return Ok(());
            }
            if rec.mask.contains(ty) {
                return Ok(());
            }
        }

        let store = &mut self.stores[ty.index()];
        let mut data = store.create_instance();
        if let Err(err) = data.apply(props) {
            store.release_instance(data);
            return Err(err);
        }
        self.finish_attach(entity, ty, data);
        Ok(())
    }

    /// Attach a pre-built instance by its runtime type. Semantics match
    /// [`World::add_component`] minus construction; an instance attached
    /// to an entity that already has the type is recycled.
    pub fn attach_component(&mut self, entity: Entity, data: ComponentData) -> Result<()> {
        let ty = data.type_id();
        if !self.valid_type(ty) {
            warn!(type_id = ty.raw(), "component type used without registration");
            return Ok(());
        }
        {
            let Some(rec) = self.entities.get(entity) else {
                return Err(EcsError::EntityNotFound);
            };
            if !rec.accepts_operations() {
                warn!(id = rec.id, "component attach on a disposed entity ignored");
                return Ok(());
            }
            if rec.mask.contains(ty) {
                self.stores[ty.index()].release_instance(data);
                return Ok(());
            }
        }
        self.finish_attach(entity, ty, data);
        Ok(())
    }

    fn finish_attach(&mut self, entity: Entity, ty: ComponentTypeId, data: ComponentData) {
        let store = &mut self.stores[ty.index()];
        store.count += 1;
        let kind = store.info.kind;

        let rec = &mut self.entities[entity];
        rec.mask.insert(ty);
        rec.components.insert(ty, data);
        if kind == ComponentKind::SystemState {
            rec.num_state_components += 1;
        }
        if rec.alive {
            self.route_component_added(entity, ty);
        }
    }

    /// Detach a component. The type leaves the attached set at the call
    /// site (queries reindex now); the instance is parked until the
    /// end-of-tick drain finalizes it.
    pub fn remove_component(&mut self, entity: Entity, ty: ComponentTypeId) -> Result<()> {
        self.remove_component_inner(entity, ty, false)
    }

    /// Detach and finalize a component in one step.
    pub fn remove_component_immediately(
        &mut self,
        entity: Entity,
        ty: ComponentTypeId,
    ) -> Result<()> {
        self.remove_component_inner(entity, ty, true)
    }

    fn remove_component_inner(
        &mut self,
        entity: Entity,
        ty: ComponentTypeId,
        forced: bool,
    ) -> Result<()> {
        let immediate = forced || !self.deferred_removal_enabled;
        if !self.valid_type(ty) {
            warn!(type_id = ty.raw(), "component type used without registration");
            return Ok(());
        }
        let kind = self.stores[ty.index()].info.kind;

        let Some(rec) = self.entities.get_mut(entity) else {
            return Err(EcsError::EntityNotFound);
        };
        if !rec.mask.contains(ty) {
            return Ok(());
        }
        rec.mask.remove(ty);
        let data = rec.components.remove(&ty);
        let routed = rec.added;

        if immediate {
            if let Some(data) = data {
                self.stores[ty.index()].release_instance(data);
            }
        } else if let Some(data) = data {
            if rec.components_to_remove.is_empty() {
                self.entities_with_removed_components.push(entity);
            }
            rec.components_to_remove.insert(ty, data);
            rec.removed_mask.insert(ty);
        }
        self.stores[ty.index()].count -= 1;

        if routed {
            self.route_component_removed(entity, ty);
        }

        if kind == ComponentKind::SystemState {
            let rec = &mut self.entities[entity];
            rec.num_state_components -= 1;
            if rec.num_state_components == 0 && rec.added && !rec.alive {
                // Last state component left a ghost: it retires itself.
                self.dispose_entity_inner(entity, immediate)?;
            }
        }
        Ok(())
    }

    /// Remove every non-state component, in mask order.
    fn remove_all_components(&mut self, entity: Entity, immediate: bool) -> Result<()> {
        let types: Vec<ComponentTypeId> = self.entities[entity].mask.iter().collect();
        for ty in types {
            if self.stores[ty.index()].info.kind != ComponentKind::SystemState {
                self.remove_component_inner(entity, ty, immediate)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Component access

    pub fn has_component(&self, entity: Entity, ty: ComponentTypeId) -> bool {
        self.entities
            .get(entity)
            .map(|r| r.mask.contains(ty))
            .unwrap_or(false)
    }

    /// Whether the type awaits end-of-tick finalization on this entity.
    pub fn has_removed_component(&self, entity: Entity, ty: ComponentTypeId) -> bool {
        self.entities
            .get(entity)
            .map(|r| r.removed_mask.contains(ty))
            .unwrap_or(false)
    }

    pub fn has_all_components(&self, entity: Entity, types: &[ComponentTypeId]) -> bool {
        self.entities
            .get(entity)
            .map(|r| types.iter().all(|&ty| r.mask.contains(ty)))
            .unwrap_or(false)
    }

    pub fn has_any_components(&self, entity: Entity, types: &[ComponentTypeId]) -> bool {
        self.entities
            .get(entity)
            .map(|r| types.iter().any(|&ty| r.mask.contains(ty)))
            .unwrap_or(false)
    }

    /// Read-only component view.
    pub fn get_component(&self, entity: Entity, ty: ComponentTypeId) -> Option<&ComponentData> {
        self.entities.get(entity)?.components.get(&ty)
    }

    /// Read-only view that also resolves instances pending removal.
    pub fn get_component_including_removed(
        &self,
        entity: Entity,
        ty: ComponentTypeId,
    ) -> Option<&ComponentData> {
        let rec = self.entities.get(entity)?;
        rec.components
            .get(&ty)
            .or_else(|| rec.components_to_remove.get(&ty))
    }

    /// Instance pending end-of-tick finalization, if any.
    pub fn get_removed_component(
        &self,
        entity: Entity,
        ty: ComponentTypeId,
    ) -> Option<&ComponentData> {
        self.entities.get(entity)?.components_to_remove.get(&ty)
    }

    /// Mutable component view. Dispatches `ComponentChanged` to every
    /// reactive query that references the type and currently contains
    /// this entity, synchronously, before returning the borrow.
    pub fn get_mutable_component(
        &mut self,
        entity: Entity,
        ty: ComponentTypeId,
    ) -> Option<&mut ComponentData> {
        if !self.entities.get(entity)?.components.contains_key(&ty) {
            return None;
        }
        let qids: SmallVec<[QueryId; 4]> = self.entities[entity].queries.clone();
        for qid in qids {
            let query = &mut self.queries[qid.index()];
            if query.reactive() && query.includes(ty) {
                query
                    .dispatcher
                    .dispatch(QueryEvent::ComponentChanged, entity, Some(ty));
            }
        }
        self.entities.get_mut(entity)?.components.get_mut(&ty)
    }

    /// Types awaiting finalization on this entity.
    pub fn components_to_remove(&self, entity: Entity) -> Vec<ComponentTypeId> {
        self.entities
            .get(entity)
            .map(|r| r.components_to_remove.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Drain this entity's pending-removal map, recycling each instance.
    pub fn process_removed_components(&mut self, entity: Entity) {
        let Some(rec) = self.entities.get_mut(entity) else {
            return;
        };
        let pending: Vec<(ComponentTypeId, ComponentData)> =
            rec.components_to_remove.drain().collect();
        rec.removed_mask.clear();
        for (ty, data) in pending {
            self.stores[ty.index()].release_instance(data);
        }
    }

    // ------------------------------------------------------------------
    // Query maintenance

    /// Incremental reindex after `ty` was attached to a live entity.
    fn route_component_added(&mut self, entity: Entity, ty: ComponentTypeId) {
        let qids = match self.queries_by_component.get(&ty) {
            Some(list) => list.clone(),
            None => return,
        };
        for qid in qids {
            let (is_exclude, is_include) = {
                let query = &self.queries[qid.index()];
                (query.excludes(ty), query.includes(ty))
            };
            if is_exclude {
                if self.entities[entity].queries.contains(&qid) {
                    self.query_drop_entity(qid, entity);
                }
            } else if is_include {
                let should_add = {
                    let rec = &self.entities[entity];
                    !rec.queries.contains(&qid)
                        && self.queries[qid.index()].match_mask(&rec.mask)
                };
                if should_add {
                    self.query_push_entity(qid, entity);
                }
            }
        }
    }

    /// Incremental reindex after `ty` left an entity's attached set.
    fn route_component_removed(&mut self, entity: Entity, ty: ComponentTypeId) {
        let qids = match self.queries_by_component.get(&ty) {
            Some(list) => list.clone(),
            None => return,
        };
        for qid in qids {
            let (is_exclude, is_include) = {
                let query = &self.queries[qid.index()];
                (query.excludes(ty), query.includes(ty))
            };
            if is_exclude {
                let should_add = {
                    let rec = &self.entities[entity];
                    (rec.alive || rec.num_state_components > 0)
                        && !rec.queries.contains(&qid)
                        && self.queries[qid.index()].match_mask(&rec.mask)
                };
                if should_add {
                    self.query_push_entity(qid, entity);
                }
            } else if is_include {
                let should_remove = {
                    let rec = &self.entities[entity];
                    rec.queries.contains(&qid)
                        && !self.queries[qid.index()].match_mask(&rec.mask)
                };
                if should_remove {
                    self.query_drop_entity(qid, entity);
                }
            }
        }
    }

    fn query_push_entity(&mut self, qid: QueryId, entity: Entity) {
        if let Some(rec) = self.entities.get_mut(entity) {
            rec.queries.push(qid);
        }
        self.queries[qid.index()].push_entity(entity);
    }

    fn query_drop_entity(&mut self, qid: QueryId, entity: Entity) {
        if let Some(rec) = self.entities.get_mut(entity) {
            rec.queries.retain(|q| *q != qid);
        }
        self.queries[qid.index()].drop_entity(entity);
    }

    /// Resolve a spec to its shared query, creating and silently
    /// populating a new one on first use.
    pub fn get_query(&mut self, terms: &[QueryTerm]) -> Result<QueryId> {
        for term in terms {
            let ty = match term {
                QueryTerm::With(ty) | QueryTerm::Without(ty) => *ty,
            };
            if !self.valid_type(ty) {
                return Err(EcsError::UnknownComponentType(ty.raw()));
            }
        }
        let key = canonical_key(terms, |ty| self.key_name_of(ty));
        if let Some(&qid) = self.query_index.get(&key) {
            return Ok(qid);
        }

        let qid = QueryId::from_index(self.queries.len());
        let mut query = Query::new(qid, key.clone(), terms)?;
        for (entity, rec) in self.entities.iter_mut() {
            if rec.added && query.match_mask(&rec.mask) {
                rec.queries.push(qid);
                query.bootstrap_entity(entity);
            }
        }
        let referenced: Vec<ComponentTypeId> = query.referenced_types().collect();
        self.queries.push(query);
        self.query_index.insert(key, qid);
        for ty in referenced {
            self.queries_by_component.entry(ty).or_default().push(qid);
        }
        Ok(qid)
    }

    pub fn query(&self, qid: QueryId) -> &Query {
        &self.queries[qid.index()]
    }

    pub fn query_entities(&self, qid: QueryId) -> &[Entity] {
        self.queries[qid.index()].entities()
    }

    pub fn num_queries(&self) -> usize {
        self.queries.len()
    }

    pub fn query_json(&self, qid: QueryId) -> QueryJson {
        let query = &self.queries[qid.index()];
        QueryJson {
            key: query.key().to_string(),
            reactive: query.reactive(),
            components: QueryComponentsJson {
                included: query
                    .include_ids()
                    .iter()
                    .map(|&ty| self.key_name_of(ty))
                    .collect(),
                not: query
                    .exclude_ids()
                    .iter()
                    .map(|&ty| self.key_name_of(ty))
                    .collect(),
            },
            num_entities: query.entities().len(),
        }
    }

    // ------------------------------------------------------------------
    // Systems

    /// Register a system with default attributes.
    pub fn register_system<S: System>(&mut self, system: S) -> Result<()> {
        self.register_system_with(system, SystemAttributes::default())
    }

    /// Register a system: resolve its query declarations, wire reactive
    /// listeners, run `init`, and slot it into the execute order.
    /// Duplicate registration by type warns and is a no-op.
    pub fn register_system_with<S: System>(
        &mut self,
        mut system: S,
        attrs: SystemAttributes,
    ) -> Result<()> {
        let type_id = TypeId::of::<S>();
        if self.systems.contains_type(type_id) {
            warn!(system = system.name(), "system already registered");
            return Ok(());
        }

        let mut queries = SystemQueries::default();
        for (name, def) in system.query_defs() {
            let qid = self.get_query(&def.terms)?;
            let mut slot = SystemQuery {
                query: qid,
                mandatory: def.mandatory,
                added: None,
                removed: None,
                changed: None,
                listener_ids: Vec::new(),
            };
            if def.listen.any() {
                self.queries[qid.index()].set_reactive();
            }
            if def.listen.added {
                let buffer = event_buffer();
                let id = self.queries[qid.index()].dispatcher.add_listener(
                    QueryEvent::EntityAdded,
                    buffer.clone(),
                    None,
                );
                slot.added = Some(buffer);
                slot.listener_ids.push((QueryEvent::EntityAdded, id));
            }
            if def.listen.removed {
                let buffer = event_buffer();
                let id = self.queries[qid.index()].dispatcher.add_listener(
                    QueryEvent::EntityRemoved,
                    buffer.clone(),
                    None,
                );
                slot.removed = Some(buffer);
                slot.listener_ids.push((QueryEvent::EntityRemoved, id));
            }
            match &def.listen.changed {
                Changed::No => {}
                Changed::Any => {
                    let buffer = event_buffer();
                    let id = self.queries[qid.index()].dispatcher.add_listener(
                        QueryEvent::ComponentChanged,
                        buffer.clone(),
                        None,
                    );
                    slot.changed = Some(buffer);
                    slot.listener_ids.push((QueryEvent::ComponentChanged, id));
                }
                Changed::Components(list) => {
                    let filter: TypeMask = list.iter().copied().collect();
                    let buffer = event_buffer();
                    let id = self.queries[qid.index()].dispatcher.add_listener(
                        QueryEvent::ComponentChanged,
                        buffer.clone(),
                        Some(filter),
                    );
                    slot.changed = Some(buffer);
                    slot.listener_ids.push((QueryEvent::ComponentChanged, id));
                }
            }
            queries.insert(name.to_string(), slot);
        }

        system.init(self);
        self.systems.insert(Box::new(system), type_id, queries, attrs.priority);
        Ok(())
    }

    /// Remove a system by type identity, stopping it and releasing its
    /// query listeners. Returns whether it was registered.
    pub fn unregister_system<S: System>(&mut self) -> bool {
        let Some(entry) = self.systems.remove(TypeId::of::<S>()) else {
            warn!("unregister of a system that was never registered");
            return false;
        };
        for (_, slot) in entry.queries.iter() {
            for (event, id) in &slot.listener_ids {
                self.queries[slot.id().index()]
                    .dispatcher
                    .remove_listener(*event, *id);
            }
        }
        true
    }

    pub fn get_system<S: System>(&self) -> Option<&S> {
        self.systems.get::<S>()
    }

    pub fn get_system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.get_mut::<S>()
    }

    pub fn system_manager(&self) -> &SystemManager {
        &self.systems
    }

    pub fn system_manager_mut(&mut self) -> &mut SystemManager {
        &mut self.systems
    }

    // ------------------------------------------------------------------
    // Tick

    /// Run one tick: every enabled system in order, then the deferred
    /// drain. With `delta` absent it is measured from the previous tick
    /// on the monotonic clock. Systems must not register systems from
    /// inside `execute`.
    pub fn execute(&mut self, delta: Option<f32>, time: Option<f64>) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.execute", systems = self.systems.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let now = Instant::now();
        let delta = delta.unwrap_or_else(|| {
            self.last_tick
                .map(|t| now.duration_since(t).as_secs_f32())
                .unwrap_or(0.0)
        });
        self.last_tick = Some(now);
        self.elapsed += delta as f64;
        let time = time.unwrap_or(self.elapsed);

        if self.enabled {
            let mut systems = std::mem::take(&mut self.systems);
            let result = systems.run(self, delta, time, false);
            self.systems = systems;
            result?;
            self.process_deferred_removal();
        }
        Ok(())
    }

    /// Drive every system once regardless of its enabled flag, without
    /// the deferred drain. For host-side steppers.
    pub fn step_systems(&mut self, delta: f32, time: f64) -> Result<()> {
        let mut systems = std::mem::take(&mut self.systems);
        let result = systems.run(self, delta, time, true);
        self.systems = systems;
        result
    }

    /// End-of-tick drain: finalize queued disposals, then queued
    /// component removals. Stale queue slots are skipped.
    pub fn process_deferred_removal(&mut self) {
        if !self.deferred_removal_enabled {
            return;
        }
        let to_dispose = std::mem::take(&mut self.entities_to_dispose);
        for entity in to_dispose {
            if self.entities.contains_key(entity) {
                self.process_removed_components(entity);
                self.release_entity(entity);
            }
        }
        let pending = std::mem::take(&mut self.entities_with_removed_components);
        for entity in pending {
            if self.entities.contains_key(entity) {
                self.process_removed_components(entity);
            }
        }
    }

    pub fn stop(&mut self) {
        self.enabled = false;
        self.systems.stop_all();
    }

    pub fn play(&mut self) {
        self.enabled = true;
        self.systems.play_all();
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    // ------------------------------------------------------------------
    // Stats

    pub fn stats(&self) -> WorldStats {
        let mut queries = BTreeMap::new();
        for query in &self.queries {
            queries.insert(query.key().to_string(), query.stats());
        }
        let mut components = BTreeMap::new();
        for store in &self.stores {
            let name = if store.info.name.is_empty() {
                format!("#{}", store.info.id.raw())
            } else {
                store.info.name.clone()
            };
            components.insert(
                name,
                ComponentStats {
                    count: store.count,
                    pool: self.component_pool_stats(store.info.id),
                },
            );
        }
        WorldStats {
            num_entities: self.num_entities(),
            num_queries: self.queries.len(),
            queries,
            components,
            num_systems: self.systems.len(),
            systems: self
                .systems
                .entries()
                .iter()
                .map(|entry| self.system_json(entry))
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.stats()).unwrap_or(serde_json::Value::Null)
    }

    pub fn system_to_json<S: System>(&self) -> Option<SystemJson> {
        self.systems
            .entry_of(TypeId::of::<S>())
            .map(|entry| self.system_json(entry))
    }

    fn system_json(&self, entry: &SystemEntry) -> SystemJson {
        let mut queries = BTreeMap::new();
        for (name, slot) in entry.queries.iter() {
            let query = self.query(slot.id());
            let listen = ListenJson {
                added: SystemQuery::buffer_len(&slot.added).map(|entities| EventCountJson { entities }),
                removed: SystemQuery::buffer_len(&slot.removed)
                    .map(|entities| EventCountJson { entities }),
                changed: SystemQuery::buffer_len(&slot.changed)
                    .map(|entities| EventCountJson { entities }),
            };
            queries.insert(
                name.to_string(),
                SystemQueryJson {
                    key: query.key().to_string(),
                    mandatory: slot.is_mandatory(),
                    reactive: query.reactive(),
                    listen: if listen.is_empty() { None } else { Some(listen) },
                },
            );
        }
        SystemJson {
            name: entry.name.to_string(),
            enabled: entry.enabled,
            execute_time: entry.execute_time_ms,
            priority: entry.priority,
            queries,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of one entity.
pub struct EntityRef<'w> {
    world: &'w World,
    entity: Entity,
}

impl<'w> EntityRef<'w> {
    pub fn handle(&self) -> Entity {
        self.entity
    }

    pub fn id(&self) -> u64 {
        self.world.entities[self.entity].id
    }

    pub fn name(&self) -> Option<&'w str> {
        self.world.entity_name(self.entity)
    }

    pub fn is_alive(&self) -> bool {
        self.world.is_alive(self.entity)
    }

    pub fn has_component(&self, ty: ComponentTypeId) -> bool {
        self.world.has_component(self.entity, ty)
    }

    pub fn has_removed_component(&self, ty: ComponentTypeId) -> bool {
        self.world.has_removed_component(self.entity, ty)
    }

    pub fn has_all_components(&self, types: &[ComponentTypeId]) -> bool {
        self.world.has_all_components(self.entity, types)
    }

    pub fn has_any_components(&self, types: &[ComponentTypeId]) -> bool {
        self.world.has_any_components(self.entity, types)
    }

    pub fn get_component(&self, ty: ComponentTypeId) -> Option<&'w ComponentData> {
        self.world.get_component(self.entity, ty)
    }

    pub fn component_types(&self) -> Vec<ComponentTypeId> {
        self.world.entities[self.entity].mask.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;

    fn test_world() -> (World, ComponentTypeId, ComponentTypeId) {
        let mut world = World::new();
        let a = world
            .register_component(
                ComponentDesc::new("A")
                    .field("x", types::number())
                    .field("y", types::number()),
            )
            .unwrap();
        let b = world
            .register_component(ComponentDesc::tag("B"))
            .unwrap();
        (world, a, b)
    }

    #[test]
    fn test_create_and_dispose() {
        let (mut world, a, _) = test_world();
        let e = world.create_entity();
        assert!(world.is_alive(e));
        world.add_component(e, a).unwrap();
        assert!(world.has_component(e, a));
        assert_eq!(world.component_count(a), 1);

        world.dispose_entity_immediately(e).unwrap();
        assert!(!world.is_alive(e));
        assert_eq!(world.component_count(a), 0);
        assert_eq!(world.num_entities(), 0);
    }

    #[test]
    fn test_entity_ids_are_unique() {
        let (mut world, _, _) = test_world();
        let e1 = world.create_entity();
        let id1 = world.entity_id(e1).unwrap();
        world.dispose_entity_immediately(e1).unwrap();

        let e2 = world.create_entity();
        let id2 = world.entity_id(e2).unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_double_add_component_is_noop() {
        let (mut world, a, _) = test_world();
        let e = world.create_entity();
        world
            .add_component_with(e, a, [("x", Value::Number(5.0))])
            .unwrap();
        world.add_component(e, a).unwrap();

        let data = world.get_component(e, a).unwrap();
        assert_eq!(data.get("x").unwrap(), &Value::Number(5.0));
        assert_eq!(world.component_count(a), 1);
    }

    #[test]
    fn test_remove_unattached_is_noop() {
        let (mut world, a, _) = test_world();
        let e = world.create_entity();
        assert!(world.remove_component(e, a).is_ok());
        assert_eq!(world.component_count(a), 0);
    }

    #[test]
    fn test_duplicate_registration_returns_existing() {
        let (mut world, a, _) = test_world();
        let again = world
            .register_component(ComponentDesc::new("A").field("x", types::number()))
            .unwrap();
        assert_eq!(a, again);
    }

    #[test]
    fn test_named_lookup() {
        let (mut world, _, _) = test_world();
        let player = world.create_named_entity("player");
        world.create_named_entity("enemy");
        world.create_named_entity("enemy");

        assert_eq!(world.find_entity_by_name("player"), Some(player));
        assert_eq!(world.get_entities_by_name("enemy").len(), 2);
        assert!(world.find_entity_by_name("missing").is_none());

        world.dispose_entity_immediately(player).unwrap();
        assert!(world.find_entity_by_name("player").is_none());
    }

    #[test]
    fn test_empty_drain_is_noop() {
        let (mut world, _, _) = test_world();
        world.process_deferred_removal();
        assert_eq!(world.num_entities(), 0);
    }

    #[test]
    fn test_clone_entity_matches_fieldwise() {
        let (mut world, a, b) = test_world();
        let src = world.create_entity();
        world
            .add_component_with(src, a, [("x", Value::Number(3.0)), ("y", Value::Number(4.0))])
            .unwrap();
        world.add_component(src, b).unwrap();

        let dst = world.clone_entity(src).unwrap();
        assert!(world.has_component(dst, a));
        assert!(world.has_component(dst, b));
        let src_data = world.get_component(src, a).unwrap();
        let dst_data = world.get_component(dst, a).unwrap();
        assert!(src_data.values_eq(dst_data));
    }

    #[test]
    fn test_mutable_access_requires_attachment() {
        let (mut world, a, _) = test_world();
        let e = world.create_entity();
        assert!(world.get_mutable_component(e, a).is_none());
    }
}
