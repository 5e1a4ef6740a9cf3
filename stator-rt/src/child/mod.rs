//! Parent/child actor tree: type-erased handles, spawners, and the
//! parent-owned registry.

pub mod handle;
pub mod registry;
pub mod spawner;

pub use handle::{AnyActor, DynEvent, ParentLink};
pub use spawner::ChildSpawner;

pub(crate) use registry::ChildRegistry;
pub(crate) use spawner::{SpawnContext, SpawnedChild};
