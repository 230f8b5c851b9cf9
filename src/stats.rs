//! Serializable snapshots of world, query, and system state.
//!
//! These are the `to_json` payload shapes; builders live on
//! [`crate::world::World`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::query::QueryStats;

/// Pool occupancy for one component store.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub free: usize,
    pub used: usize,
}

/// Per-component-type counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStats {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

/// Query snapshot: predicate plus current size.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJson {
    pub key: String,
    pub reactive: bool,
    pub components: QueryComponentsJson,
    pub num_entities: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryComponentsJson {
    pub included: Vec<String>,
    pub not: Vec<String>,
}

/// Buffered event count of one listener slot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventCountJson {
    pub entities: usize,
}

/// Listener slots of one declared query, present only when listening.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListenJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<EventCountJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<EventCountJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<EventCountJson>,
}

impl ListenJson {
    pub fn is_empty(&self) -> bool {
        self.added.is_none() && self.removed.is_none() && self.changed.is_none()
    }
}

/// One declared query of a system.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemQueryJson {
    pub key: String,
    pub mandatory: bool,
    pub reactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<ListenJson>,
}

/// System snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemJson {
    pub name: String,
    pub enabled: bool,
    pub execute_time: f64,
    pub priority: i32,
    pub queries: BTreeMap<String, SystemQueryJson>,
}

/// Whole-world snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldStats {
    pub num_entities: usize,
    pub num_queries: usize,
    pub queries: BTreeMap<String, QueryStats>,
    pub components: BTreeMap<String, ComponentStats>,
    pub num_systems: usize,
    pub systems: Vec<SystemJson>,
}
