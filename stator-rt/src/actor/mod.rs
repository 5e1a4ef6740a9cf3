//! The actor supervisor: `interpret`, the `ActorRef` public contract, and
//! the per-actor event loop.

pub mod actor_ref;
pub mod error;
pub mod options;
pub mod supervisor;

pub use actor_ref::ActorRef;
pub use error::ActorError;
pub use options::InterpretOptions;
pub use supervisor::interpret;
