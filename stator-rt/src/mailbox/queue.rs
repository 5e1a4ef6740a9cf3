//! The FIFO queue behind each actor.
//!
//! Built on tokio's unbounded mpsc channel with exactly one consumer (the
//! supervisor task), which makes per-actor serialization structural: no two
//! signals are ever processed concurrently, enqueueing from inside the
//! consumer appends without recursing, and there is no stack growth however
//! long the backlog gets. Enqueue after `stop()` is dropped silently.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;
use tracing::trace;

// Layer 3: Internal module imports
use super::signal::Signal;
use crate::machine::Machine;

/// Cloneable sender half of an actor's mailbox.
pub struct Mailbox<M: Machine> {
    sender: mpsc::UnboundedSender<Signal<M>>,
    stopped: Arc<AtomicBool>,
}

impl<M: Machine> Mailbox<M> {
    /// Create a mailbox and its single consumer.
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Signal<M>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mailbox = Self {
            sender,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        (mailbox, receiver)
    }

    /// Append a signal in arrival order. Silently dropped once the actor is
    /// stopped.
    pub(crate) fn enqueue(&self, signal: Signal<M>) {
        if self.stopped.load(Ordering::SeqCst) {
            trace!(?signal, "mailbox stopped; dropping signal");
            return;
        }
        // A closed channel means the consumer is gone; same contract as a
        // stopped actor.
        let _ = self.sender.send(signal);
    }

    /// Mark the mailbox stopped and deliver the final `Stop` signal.
    ///
    /// Idempotent: only the first call delivers `Stop`; everything enqueued
    /// afterwards is dropped by the flag check in [`Mailbox::enqueue`].
    pub(crate) fn close(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(Signal::Stop);
        }
    }

    /// Whether `close` has been called.
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Shared stop flag, also consulted by the fan-out paths.
    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

impl<M: Machine> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::machine::{MachineEvent, MachineState};

    #[derive(Debug, Clone, PartialEq)]
    enum TestState {
        Idle,
    }

    impl MachineState for TestState {
        const TAGS: &'static [&'static str] = &["Idle"];

        fn tag(&self) -> &'static str {
            "Idle"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Ping(u32),
    }

    impl MachineEvent for TestEvent {
        const TAGS: &'static [&'static str] = &["Ping"];

        fn tag(&self) -> &'static str {
            "Ping"
        }
    }

    struct TestMachine;

    impl Machine for TestMachine {
        type State = TestState;
        type Event = TestEvent;
        type Context = ();
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (mailbox, mut receiver) = Mailbox::<TestMachine>::channel();

        for i in 0..3 {
            mailbox.enqueue(Signal::Event(TestEvent::Ping(i)));
        }

        for i in 0..3 {
            match receiver.recv().await.unwrap() {
                Signal::Event(TestEvent::Ping(n)) => assert_eq!(n, i),
                other => panic!("unexpected signal {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_enqueue_after_close_is_dropped() {
        let (mailbox, mut receiver) = Mailbox::<TestMachine>::channel();

        mailbox.close();
        mailbox.enqueue(Signal::Event(TestEvent::Ping(7)));

        // The only delivered signal is the terminal Stop.
        assert!(matches!(receiver.recv().await, Some(Signal::Stop)));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mailbox, mut receiver) = Mailbox::<TestMachine>::channel();

        mailbox.close();
        mailbox.close();

        assert!(matches!(receiver.recv().await, Some(Signal::Stop)));
        assert!(receiver.try_recv().is_err());
        assert!(mailbox.is_stopped());
    }

    #[tokio::test]
    async fn test_clones_share_stop_flag() {
        let (mailbox, _receiver) = Mailbox::<TestMachine>::channel();
        let clone = mailbox.clone();

        clone.close();
        assert!(mailbox.is_stopped());
    }
}
