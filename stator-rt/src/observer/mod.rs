//! Observation and emission fan-out.
//!
//! Two independent channels out of an actor:
//! - [`ObserverSet`]: snapshot-change observers, notified after every
//!   successful transition and after snapshot sync
//! - [`Emitter`]: external emissions, dispatched by event tag
//!
//! Both return [`Subscription`] handles and are cleared on actor stop.

pub mod emitter;
pub mod observers;
pub mod subscription;

pub use emitter::Emitter;
pub use observers::ObserverSet;
pub use subscription::Subscription;
