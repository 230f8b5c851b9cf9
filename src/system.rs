//! System trait and query declarations.
//!
//! A system names the queries it consumes via [`QueryDef`]s. Declaring a
//! listener turns the shared query reactive and wires an event buffer
//! that fills between this system's executes and is cleared after each
//! one.

use std::any::Any;

use rustc_hash::FxHashMap;

use crate::component::ComponentTypeId;
use crate::entity::Entity;
use crate::error::Result;
use crate::event::{EventBuffer, ListenerId, QueryEvent};
use crate::query::{QueryId, QueryTerm};
use crate::world::World;

/// Change-listening mode for a declared query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Changed {
    /// No change events.
    #[default]
    No,
    /// Any mutable access to an in-query component.
    Any,
    /// Only mutable access to the listed component types.
    Components(Vec<ComponentTypeId>),
}

/// Event kinds a declared query listens for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listen {
    pub added: bool,
    pub removed: bool,
    pub changed: Changed,
}

impl Listen {
    pub fn any(&self) -> bool {
        self.added || self.removed || self.changed != Changed::No
    }
}

/// One named query declaration of a system.
#[derive(Debug, Clone)]
pub struct QueryDef {
    pub terms: Vec<QueryTerm>,
    pub mandatory: bool,
    pub listen: Listen,
}

impl QueryDef {
    pub fn new(terms: impl IntoIterator<Item = QueryTerm>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
            mandatory: false,
            listen: Listen::default(),
        }
    }

    /// The system only executes while this query is non-empty.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn listen_added(mut self) -> Self {
        self.listen.added = true;
        self
    }

    pub fn listen_removed(mut self) -> Self {
        self.listen.removed = true;
        self
    }

    /// Buffer changes to any in-query component.
    pub fn listen_changed(mut self) -> Self {
        self.listen.changed = Changed::Any;
        self
    }

    /// Buffer changes to the listed component types only.
    pub fn listen_changed_components(
        mut self,
        components: impl IntoIterator<Item = ComponentTypeId>,
    ) -> Self {
        self.listen.changed = Changed::Components(components.into_iter().collect());
        self
    }
}

/// Registration attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAttributes {
    /// Lower runs earlier; ties break on registration order.
    pub priority: i32,
}

impl SystemAttributes {
    pub fn with_priority(priority: i32) -> Self {
        Self { priority }
    }
}

/// A resolved query slot of a registered system.
pub struct SystemQuery {
    pub(crate) query: QueryId,
    pub(crate) mandatory: bool,
    pub(crate) added: Option<EventBuffer>,
    pub(crate) removed: Option<EventBuffer>,
    pub(crate) changed: Option<EventBuffer>,
    /// Dispatcher subscriptions, released when the system unregisters.
    pub(crate) listener_ids: Vec<(QueryEvent, ListenerId)>,
}

impl SystemQuery {
    pub fn id(&self) -> QueryId {
        self.query
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Materialized entity list of the shared query.
    pub fn entities<'w>(&self, world: &'w World) -> &'w [Entity] {
        world.query(self.query).entities()
    }

    /// Entities added to the query since this system last executed.
    pub fn added(&self) -> Vec<Entity> {
        Self::snapshot(&self.added)
    }

    /// Entities removed from the query since this system last executed.
    pub fn removed(&self) -> Vec<Entity> {
        Self::snapshot(&self.removed)
    }

    /// Entities whose listened components were mutably accessed since
    /// this system last executed.
    pub fn changed(&self) -> Vec<Entity> {
        Self::snapshot(&self.changed)
    }

    fn snapshot(buffer: &Option<EventBuffer>) -> Vec<Entity> {
        buffer
            .as_ref()
            .map(|buf| buf.lock().clone())
            .unwrap_or_default()
    }

    pub(crate) fn buffer_len(buffer: &Option<EventBuffer>) -> Option<usize> {
        buffer.as_ref().map(|buf| buf.lock().len())
    }

    pub(crate) fn clear_events(&self) {
        for buffer in [&self.added, &self.removed, &self.changed]
            .into_iter()
            .flatten()
        {
            buffer.lock().clear();
        }
    }
}

/// Named query slots of a registered system, keyed by declaration name.
#[derive(Default)]
pub struct SystemQueries {
    entries: FxHashMap<String, SystemQuery>,
}

impl SystemQueries {
    pub(crate) fn insert(&mut self, name: String, query: SystemQuery) {
        self.entries.insert(name, query);
    }

    pub fn get(&self, name: &str) -> Option<&SystemQuery> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SystemQuery)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn clear_events(&self) {
        for query in self.entries.values() {
            query.clear_events();
        }
    }
}

/// Per-execute context handed to a system.
pub struct SystemContext<'a> {
    pub delta: f32,
    pub time: f64,
    pub queries: &'a SystemQueries,
}

/// A periodic procedure over query results.
///
/// Implementations declare queries through [`System::query_defs`]; the
/// world resolves them at registration and drives [`System::execute`]
/// once per tick in `(priority, registration order)`.
pub trait System: 'static {
    /// Display name used in logs and stats.
    fn name(&self) -> &'static str;

    /// Named query declarations, resolved once at registration.
    fn query_defs(&self) -> Vec<(&'static str, QueryDef)> {
        Vec::new()
    }

    /// One-time setup, called during registration.
    fn init(&mut self, _world: &mut World) {}

    /// Per-tick work. Errors abort the tick.
    fn execute(&mut self, _world: &mut World, _ctx: &SystemContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether the scheduler should call `execute` each tick. Systems
    /// that only consume event buffers out-of-band may opt out.
    fn has_execute(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;
