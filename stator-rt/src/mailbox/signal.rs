//! The mailbox envelope: external events plus internal runtime signals.
//!
//! Internal signals (delayed-transition firings, invoke terminations,
//! snapshot sync, waiter registration, stop) flow through the same FIFO as
//! user events, so everything an actor does is serialized by arrival order
//! on its single consumer.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;

// Layer 2: Third-party crate imports
use tokio::sync::oneshot;

// Layer 3: Internal module imports
use crate::effect::InvokeError;
use crate::machine::{EventOf, Machine, Outcome};
use crate::persist::{PersistedSnapshot, Snapshot};

/// Everything that can travel through an actor's mailbox.
pub(crate) enum Signal<M: Machine> {
    /// An external event (from `send`, a child mapping, or a `run` stream).
    Event(EventOf<M>),

    /// A delay timer fired.
    After {
        /// Tag of the state whose config armed the timer.
        source: &'static str,
        /// Activation epoch the timer was armed under (ignored for
        /// persistent delays).
        epoch: u64,
        /// Persistent-delay id, if the timer survives state transitions.
        persistent: Option<String>,
    },

    /// A one-shot `run` effect terminated.
    InvokeDone {
        /// Activation epoch the invoke was forked under.
        epoch: u64,
        /// Success outcome or terminal classification.
        result: Result<Outcome<M>, InvokeError>,
    },

    /// Out-of-band snapshot replacement (cross-process/tab sync).
    Sync {
        /// The decoded replacement snapshot.
        snapshot: Snapshot<M>,
        /// Child snapshots to apply recursively, if any.
        children: Option<HashMap<String, PersistedSnapshot>>,
    },

    /// Register a snapshot waiter.
    WaitFor {
        /// Predicate the waiter is waiting on.
        predicate: Box<dyn Fn(&Snapshot<M>) -> bool + Send>,
        /// Reply channel resolved with the first matching snapshot.
        reply: oneshot::Sender<Snapshot<M>>,
    },

    /// Cancel a persistent delay by id.
    CancelDelay(String),

    /// Stop the actor.
    Stop,
}

impl<M: Machine> fmt::Debug for Signal<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Signal::After {
                source,
                epoch,
                persistent,
            } => f
                .debug_struct("After")
                .field("source", source)
                .field("epoch", epoch)
                .field("persistent", persistent)
                .finish(),
            Signal::InvokeDone { epoch, .. } => {
                f.debug_struct("InvokeDone").field("epoch", epoch).finish()
            }
            Signal::Sync { .. } => f.write_str("Sync"),
            Signal::WaitFor { .. } => f.write_str("WaitFor"),
            Signal::CancelDelay(id) => f.debug_tuple("CancelDelay").field(id).finish(),
            Signal::Stop => f.write_str("Stop"),
        }
    }
}
