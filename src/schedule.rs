//! System manager: registration order, priority sort, tick execution.
//!
//! Systems run sequentially, sorted by `(priority asc, registration
//! order asc)`. The registration counter is monotonic for the world's
//! lifetime, so removal never perturbs the ordering of survivors.

use std::any::TypeId;
use std::time::Instant;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::error::Result;
use crate::system::{BoxedSystem, SystemContext, SystemQueries};
use crate::world::World;

pub(crate) struct SystemEntry {
    pub system: BoxedSystem,
    pub type_id: TypeId,
    pub name: &'static str,
    pub queries: SystemQueries,
    pub enabled: bool,
    pub initialized: bool,
    pub priority: i32,
    pub order: u64,
    /// Wall time of the last execute, in milliseconds.
    pub execute_time_ms: f64,
}

#[derive(Default)]
pub struct SystemManager {
    entries: Vec<SystemEntry>,
    /// Indices of entries with an execute, sorted by (priority, order).
    execute_order: Vec<usize>,
    next_order: u64,
}

impl SystemManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_type(&self, type_id: TypeId) -> bool {
        self.entries.iter().any(|e| e.type_id == type_id)
    }

    pub(crate) fn insert(
        &mut self,
        system: BoxedSystem,
        type_id: TypeId,
        queries: SystemQueries,
        priority: i32,
    ) {
        let name = system.name();
        let order = self.next_order;
        self.next_order += 1;
        self.entries.push(SystemEntry {
            system,
            type_id,
            name,
            queries,
            enabled: true,
            initialized: true,
            priority,
            order,
            execute_time_ms: 0.0,
        });
        self.rebuild_execute_order();
    }

    fn rebuild_execute_order(&mut self) {
        self.execute_order = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.system.has_execute())
            .map(|(i, _)| i)
            .collect();
        self.execute_order
            .sort_by_key(|&i| (self.entries[i].priority, self.entries[i].order));
    }

    /// Run one tick over the execute list. With `force_play`, disabled
    /// systems run too.
    pub(crate) fn run(
        &mut self,
        world: &mut World,
        delta: f32,
        time: f64,
        force_play: bool,
    ) -> Result<()> {
        for i in 0..self.execute_order.len() {
            let idx = self.execute_order[i];
            if force_play || self.entries[idx].enabled {
                self.execute_system(idx, world, delta, time)?;
            }
        }
        Ok(())
    }

    /// Whether a system's mandatory queries are all non-empty. False for
    /// systems that were never registered.
    pub fn can_execute(&self, world: &World, type_id: TypeId) -> bool {
        self.entry_of(type_id)
            .map(|entry| Self::mandatory_queries_satisfied(entry, world))
            .unwrap_or(false)
    }

    fn mandatory_queries_satisfied(entry: &SystemEntry, world: &World) -> bool {
        entry
            .queries
            .iter()
            .all(|(_, sq)| !sq.is_mandatory() || !world.query(sq.id()).is_empty())
    }

    fn execute_system(
        &mut self,
        idx: usize,
        world: &mut World,
        delta: f32,
        time: f64,
    ) -> Result<()> {
        {
            let entry = &self.entries[idx];
            if !entry.initialized || !Self::mandatory_queries_satisfied(entry, world) {
                return Ok(());
            }
        }
        let entry = &mut self.entries[idx];

        #[cfg(feature = "profiling")]
        let span = info_span!("system.execute", system = entry.name);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let start = Instant::now();
        {
            let SystemEntry {
                system, queries, ..
            } = &mut *entry;
            let ctx = SystemContext {
                delta,
                time,
                queries,
            };
            system.execute(world, &ctx)?;
        }
        entry.execute_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        entry.queries.clear_events();
        Ok(())
    }

    /// Disable every system and zero its timing.
    pub fn stop_all(&mut self) {
        for entry in &mut self.entries {
            entry.enabled = false;
            entry.execute_time_ms = 0.0;
        }
    }

    pub fn play_all(&mut self) {
        for entry in &mut self.entries {
            entry.enabled = true;
        }
    }

    pub fn stop_system(&mut self, type_id: TypeId) -> bool {
        match self.entries.iter_mut().find(|e| e.type_id == type_id) {
            Some(entry) => {
                entry.enabled = false;
                entry.execute_time_ms = 0.0;
                true
            }
            None => false,
        }
    }

    pub fn play_system(&mut self, type_id: TypeId) -> bool {
        match self.entries.iter_mut().find(|e| e.type_id == type_id) {
            Some(entry) => {
                entry.enabled = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, type_id: TypeId) -> Option<SystemEntry> {
        let pos = self.entries.iter().position(|e| e.type_id == type_id)?;
        let mut entry = self.entries.remove(pos);
        entry.enabled = false;
        entry.execute_time_ms = 0.0;
        self.rebuild_execute_order();
        Some(entry)
    }

    pub(crate) fn entry_of(&self, type_id: TypeId) -> Option<&SystemEntry> {
        self.entries.iter().find(|e| e.type_id == type_id)
    }

    pub(crate) fn entries(&self) -> &[SystemEntry] {
        &self.entries
    }

    pub fn systems(&self) -> impl Iterator<Item = &dyn crate::system::System> {
        self.entries.iter().map(|e| e.system.as_ref())
    }

    pub fn get<S: crate::system::System>(&self) -> Option<&S> {
        self.entry_of(TypeId::of::<S>())
            .and_then(|e| e.system.as_any().downcast_ref::<S>())
    }

    pub fn get_mut<S: crate::system::System>(&mut self) -> Option<&mut S> {
        let type_id = TypeId::of::<S>();
        self.entries
            .iter_mut()
            .find(|e| e.type_id == type_id)
            .and_then(|e| e.system.as_any_mut().downcast_mut::<S>())
    }

    /// Drop all buffered events without executing anything.
    pub fn clear_events(&mut self) {
        for entry in &self.entries {
            entry.queries.clear_events();
        }
    }
}
