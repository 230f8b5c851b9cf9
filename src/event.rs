//! Query event dispatch.
//!
//! Each query owns an [`EventDispatcher`] with an ordered listener list
//! per event kind. Listeners are shared entity buffers; reactive systems
//! hold the other end and drain them after their own execute. Dispatch
//! snapshots the listener list first so a handler may unsubscribe safely.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::component::ComponentTypeId;
use crate::entity::Entity;
use crate::mask::TypeMask;

/// Reactive query event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryEvent {
    EntityAdded,
    EntityRemoved,
    ComponentChanged,
}

/// Shared per-tick entity buffer filled by dispatch.
pub type EventBuffer = Arc<Mutex<Vec<Entity>>>;

pub fn event_buffer() -> EventBuffer {
    Arc::new(Mutex::new(Vec::new()))
}

/// Handle for unsubscribing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    /// For `ComponentChanged`: only changes to these types are delivered.
    filter: Option<TypeMask>,
    sink: EventBuffer,
}

/// Dispatch counters, exposed through stats.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DispatcherStats {
    pub fired: u64,
    pub handled: u64,
}

#[derive(Default)]
pub struct EventDispatcher {
    listeners: FxHashMap<QueryEvent, Vec<Listener>>,
    next_listener: u64,
    stats: DispatcherStats,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for an event kind; returns its unsubscribe handle.
    pub fn add_listener(
        &mut self,
        event: QueryEvent,
        sink: EventBuffer,
        filter: Option<TypeMask>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.entry(event).or_default().push(Listener {
            id,
            filter,
            sink,
        });
        id
    }

    pub fn has_listener(&self, event: QueryEvent, id: ListenerId) -> bool {
        self.listeners
            .get(&event)
            .map(|list| list.iter().any(|l| l.id == id))
            .unwrap_or(false)
    }

    /// Remove a listener; returns whether it was present.
    pub fn remove_listener(&mut self, event: QueryEvent, id: ListenerId) -> bool {
        if let Some(list) = self.listeners.get_mut(&event) {
            if let Some(pos) = list.iter().position(|l| l.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver an entity to every listener of the event kind, in
    /// subscription order. Buffers deduplicate, so an entity already
    /// pending in a sink is not appended twice.
    pub fn dispatch(
        &mut self,
        event: QueryEvent,
        entity: Entity,
        changed: Option<ComponentTypeId>,
    ) {
        self.stats.fired += 1;
        let snapshot = match self.listeners.get(&event) {
            Some(list) => list.clone(),
            None => return,
        };
        for listener in snapshot {
            if let (Some(filter), Some(ty)) = (&listener.filter, changed) {
                if !filter.contains(ty) {
                    continue;
                }
            }
            let mut buffer = listener.sink.lock();
            if !buffer.contains(&entity) {
                buffer.push(entity);
            }
            self.stats.handled += 1;
        }
    }

    pub fn listener_count(&self, event: QueryEvent) -> usize {
        self.listeners.get(&event).map(Vec::len).unwrap_or(0)
    }

    pub fn stats(&self) -> DispatcherStats {
        self.stats
    }

    pub fn reset_counters(&mut self) {
        self.stats = DispatcherStats::default();
    }
}
