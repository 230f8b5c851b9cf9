//! Convenience re-exports for the common working set.

pub use crate::component::{ComponentDesc, ComponentKind, ComponentTypeId, PoolPolicy};
pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::query::{not, QueryTerm};
pub use crate::system::{QueryDef, System, SystemAttributes, SystemContext};
pub use crate::types::{self, Value};
pub use crate::world::{World, WorldOptions};
