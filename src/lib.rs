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

//! Reactive ECS - Entity Component System with incremental query indexing
//!
//! Entities carry schema-driven components; queries are materialized
//! entity sets maintained at every mutation; systems run per tick in
//! priority order and observe add/remove/change events through reactive
//! buffers.

pub mod component;
pub mod entity;
pub mod error;
pub mod event;
pub mod mask;
pub mod observer;
pub mod pool;
pub mod prelude;
pub mod query;
pub mod schedule;
pub mod stats;
pub mod system;
pub mod types;
pub mod world;

// Re-exports for convenience
pub use component::{ComponentData, ComponentDesc, ComponentKind, ComponentTypeId, PoolPolicy};
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use event::{EventDispatcher, QueryEvent};
pub use mask::TypeMask;
pub use observer::{LoggingSink, ObservabilitySink};
pub use pool::{ObjectPool, Recyclable};
pub use query::{not, Query, QueryId, QueryTerm};
pub use schedule::SystemManager;
pub use system::{
    Changed, Listen, QueryDef, System, SystemAttributes, SystemContext, SystemQueries, SystemQuery,
};
pub use types::{create_type, Value};
pub use world::{EntityRef, World, WorldOptions};

/// Core version reported to observability sinks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
