//! Snapshot-change observer fan-out.

// Layer 1: Standard library imports
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tracing::warn;

// Layer 3: Internal module imports
use super::subscription::Subscription;
use crate::machine::Machine;
use crate::persist::Snapshot;

type Observer<M> = Arc<dyn Fn(&Snapshot<M>) + Send + Sync>;

/// Registry of snapshot observers for one actor.
///
/// Notification iterates a copy of the set, so registrations made from
/// inside an observer callback take effect on the next notification and
/// never recurse into the live map. A panicking observer is caught, logged,
/// and isolated from the remaining observers.
///
/// The set shares the actor's stop flag and re-checks it before every
/// single invocation, so a `stop()` that lands while a notification pass is
/// already holding its copy of the set still suppresses the remaining
/// callbacks: once the flag is set, no new observer invocation starts.
pub struct ObserverSet<M: Machine> {
    inner: Arc<ObserverInner<M>>,
}

struct ObserverInner<M: Machine> {
    next_id: AtomicU64,
    observers: DashMap<u64, Observer<M>>,
    stopped: Arc<AtomicBool>,
}

impl<M: Machine> ObserverSet<M> {
    pub(crate) fn new(stopped: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                next_id: AtomicU64::new(0),
                observers: DashMap::new(),
                stopped,
            }),
        }
    }

    /// Register an observer; the returned handle removes it again.
    pub(crate) fn subscribe(
        &self,
        observer: impl Fn(&Snapshot<M>) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.insert(id, Arc::new(observer));

        let weak: Weak<ObserverInner<M>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.remove(&id);
            }
        })
    }

    /// Notify every currently-registered observer with `snapshot`.
    ///
    /// The stop flag is consulted before each call, not just once up front,
    /// so an actor stopped mid-pass fires no further observers.
    pub(crate) fn notify(&self, snapshot: &Snapshot<M>) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }

        let observers: Vec<Observer<M>> = self
            .inner
            .observers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for observer in observers {
            if self.inner.stopped.load(Ordering::SeqCst) {
                return;
            }
            if catch_unwind(AssertUnwindSafe(|| observer(snapshot))).is_err() {
                warn!(state = snapshot.state_tag(), "snapshot observer panicked; isolated");
            }
        }
    }

    /// Drop every registration (actor stop).
    pub(crate) fn clear(&self) {
        self.inner.observers.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.observers.len()
    }
}

impl<M: Machine> Clone for ObserverSet<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::machine::{MachineEvent, MachineState};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum TestState {
        Off,
        On,
    }

    impl MachineState for TestState {
        const TAGS: &'static [&'static str] = &["Off", "On"];

        fn tag(&self) -> &'static str {
            match self {
                TestState::Off => "Off",
                TestState::On => "On",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Toggle,
    }

    impl MachineEvent for TestEvent {
        const TAGS: &'static [&'static str] = &["Toggle"];

        fn tag(&self) -> &'static str {
            "Toggle"
        }
    }

    struct TestMachine;

    impl Machine for TestMachine {
        type State = TestState;
        type Event = TestEvent;
        type Context = u32;
    }

    fn snapshot(state: TestState) -> Snapshot<TestMachine> {
        Snapshot::new(state, 0)
    }

    fn observer_set() -> (ObserverSet<TestMachine>, Arc<AtomicBool>) {
        let stopped = Arc::new(AtomicBool::new(false));
        (ObserverSet::new(Arc::clone(&stopped)), stopped)
    }

    #[test]
    fn test_subscribe_and_notify() {
        let (set, _stopped) = observer_set();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = set.subscribe(move |snap| sink.lock().unwrap().push(snap.state_tag()));

        set.notify(&snapshot(TestState::On));
        set.notify(&snapshot(TestState::Off));

        assert_eq!(*seen.lock().unwrap(), vec!["On", "Off"]);
    }

    #[test]
    fn test_unsubscribe_removes_observer() {
        let (set, _stopped) = observer_set();
        let seen = Arc::new(Mutex::new(0u32));

        let sink = Arc::clone(&seen);
        let sub = set.subscribe(move |_| *sink.lock().unwrap() += 1);

        set.notify(&snapshot(TestState::On));
        sub.unsubscribe();
        set.notify(&snapshot(TestState::Off));

        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_panicking_observer_is_isolated() {
        let (set, _stopped) = observer_set();
        let seen = Arc::new(Mutex::new(0u32));

        let _bad = set.subscribe(|_| panic!("observer bug"));
        let sink = Arc::clone(&seen);
        let _good = set.subscribe(move |_| *sink.lock().unwrap() += 1);

        set.notify(&snapshot(TestState::On));

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_subscription_made_during_notify_takes_effect_next_time() {
        let (set, _stopped) = observer_set();
        let late_calls = Arc::new(Mutex::new(0u32));

        let set_handle = set.clone();
        let late = Arc::clone(&late_calls);
        let _outer = set.subscribe(move |_| {
            let inner_late = Arc::clone(&late);
            // Registering from inside a callback must not recurse or deadlock.
            let _ = set_handle.subscribe(move |_| *inner_late.lock().unwrap() += 1);
        });

        set.notify(&snapshot(TestState::On));
        assert_eq!(*late_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_clear_drops_all() {
        let (set, _stopped) = observer_set();
        let _a = set.subscribe(|_| {});
        let _b = set.subscribe(|_| {});

        set.clear();
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_stop_flag_suppresses_notification() {
        let (set, stopped) = observer_set();
        let calls = Arc::new(Mutex::new(0u32));

        let sink = Arc::clone(&calls);
        let _sub = set.subscribe(move |_| *sink.lock().unwrap() += 1);

        stopped.store(true, Ordering::SeqCst);
        set.notify(&snapshot(TestState::On));

        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_stop_flag_set_by_observer_halts_the_pass() {
        // An observer that stops the actor must suppress the callbacks the
        // pass has not reached yet, even though they were already copied.
        let (set, stopped) = observer_set();
        let late_calls = Arc::new(Mutex::new(0u32));

        for _ in 0..4 {
            let flag = Arc::clone(&stopped);
            let sink = Arc::clone(&late_calls);
            let _sub = set.subscribe(move |_| {
                if flag.swap(true, Ordering::SeqCst) {
                    // Runs only if it started before the flag was observed.
                    *sink.lock().unwrap() += 1;
                }
            });
        }

        set.notify(&snapshot(TestState::On));

        // The first observer to run sets the flag; every later one is gated
        // out before being invoked.
        assert_eq!(*late_calls.lock().unwrap(), 0);
    }
}
