//! Stream and delayed-transition integration tests.
//!
//! Runs on tokio's paused clock (virtual time), covering:
//!
//! 1. **Stream-driven animation** - a per-state tick stream drives context
//!    updates until saturation; leaving the state cancels the stream
//! 2. **Delayed transitions** - `after` fires in-state and is cancelled by
//!    an earlier exit
//! 3. **Persistent delays** - keyed timers survive transitions, fire in
//!    other states, replace on re-arm, and cancel by id

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::StreamExt;
use tokio::time::timeout;
use tokio_stream::wrappers::IntervalStream;

// Layer 3: Internal module imports
use stator_rt::prelude::*;

mod common;

// ============================================================================
// Animation machine: Opening runs a 16ms tick stream
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum AnimState {
    Opening,
    Open,
}

impl MachineState for AnimState {
    const TAGS: &'static [&'static str] = &["Opening", "Open"];

    fn tag(&self) -> &'static str {
        match self {
            AnimState::Opening => "Opening",
            AnimState::Open => "Open",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AnimEvent {
    Tick { delta: u32 },
    AnimationComplete,
}

impl MachineEvent for AnimEvent {
    const TAGS: &'static [&'static str] = &["Tick", "AnimationComplete"];

    fn tag(&self) -> &'static str {
        match self {
            AnimEvent::Tick { .. } => "Tick",
            AnimEvent::AnimationComplete => "AnimationComplete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AnimContext {
    position: u32,
}

struct Anim;

impl Machine for Anim {
    type State = AnimState;
    type Event = AnimEvent;
    type Context = AnimContext;
}

fn anim_definition() -> Arc<MachineDefinition<Anim>> {
    Arc::new(
        MachineDefinition::<Anim>::builder(AnimState::Opening, AnimContext { position: 0 })
            .state(
                StateConfig::new("Opening")
                    .run_stream(|_| {
                        IntervalStream::new(tokio::time::interval(Duration::from_millis(16)))
                            .map(|_| AnimEvent::Tick { delta: 10 })
                    })
                    .on("Tick", |_, event| {
                        let delta = match event {
                            AnimEvent::Tick { delta } => *delta,
                            _ => return None,
                        };
                        Some(Outcome::patch(move |ctx: &AnimContext| AnimContext {
                            position: (ctx.position + delta).min(100),
                        }))
                    })
                    .on("AnimationComplete", |_, _| Some(Outcome::goto(AnimState::Open))),
            )
            .state(StateConfig::new("Open"))
            .build()
            .expect("valid definition"),
    )
}

async fn settle<M: Machine>(
    actor: &ActorRef<M>,
    predicate: impl Fn(&Snapshot<M>) -> bool + Send + 'static,
) -> Snapshot<M> {
    timeout(Duration::from_secs(60), actor.wait_for(predicate))
        .await
        .expect("snapshot within deadline")
        .expect("actor running")
}

#[tokio::test(start_paused = true)]
async fn test_tick_stream_drives_position_to_saturation() {
    common::init_tracing();
    let actor = interpret(anim_definition(), Default::default());

    let snapshot = settle(&actor, |s| s.context.position == 100).await;
    assert_eq!(snapshot.state_tag(), "Opening");
    actor.stop();
}

#[tokio::test(start_paused = true)]
async fn test_leaving_state_cancels_tick_stream() {
    common::init_tracing();
    let actor = interpret(anim_definition(), Default::default());

    settle(&actor, |s| s.context.position == 100).await;
    actor.send(AnimEvent::AnimationComplete);
    settle(&actor, |s| s.state_tag() == "Open").await;

    let frozen = actor.snapshot().context.position;
    let updates = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&updates);
    let _sub = actor.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // Many ticks' worth of virtual time: a live stream would keep
    // producing, but the Opening scope was closed on exit.
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(actor.snapshot().context.position, frozen);
    assert_eq!(updates.load(Ordering::SeqCst), 0);
    actor.stop();
}

#[tokio::test(start_paused = true)]
async fn test_position_saturates_at_limit() {
    common::init_tracing();
    let actor = interpret(anim_definition(), Default::default());

    let snapshot = settle(&actor, |s| s.context.position == 100).await;
    assert_eq!(snapshot.context.position, 100);

    // Extra ticks must not push past the limit.
    tokio::time::sleep(Duration::from_millis(160)).await;
    assert_eq!(actor.snapshot().context.position, 100);
    actor.stop();
}

// ============================================================================
// Delay machine: `after` transitions, plain and persistent
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum DelayState {
    Stopping,
    Idle,
    Running,
}

impl MachineState for DelayState {
    const TAGS: &'static [&'static str] = &["Stopping", "Idle", "Running"];

    fn tag(&self) -> &'static str {
        match self {
            DelayState::Stopping => "Stopping",
            DelayState::Idle => "Idle",
            DelayState::Running => "Running",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum DelayEvent {
    Interrupt,
    Restart,
}

impl MachineEvent for DelayEvent {
    const TAGS: &'static [&'static str] = &["Interrupt", "Restart"];

    fn tag(&self) -> &'static str {
        match self {
            DelayEvent::Interrupt => "Interrupt",
            DelayEvent::Restart => "Restart",
        }
    }
}

struct Delay;

impl Machine for Delay {
    type State = DelayState;
    type Event = DelayEvent;
    type Context = ();
}

fn delay_definition() -> Arc<MachineDefinition<Delay>> {
    Arc::new(
        MachineDefinition::<Delay>::builder(DelayState::Stopping, ())
            .state(
                StateConfig::new("Stopping")
                    .after(Duration::from_secs(2), |_| Outcome::goto(DelayState::Idle))
                    .on("Interrupt", |_, _| Some(Outcome::goto(DelayState::Running))),
            )
            .state(
                StateConfig::new("Idle")
                    .on("Restart", |_, _| Some(Outcome::goto(DelayState::Stopping))),
            )
            .state(StateConfig::new("Running"))
            .build()
            .expect("valid definition"),
    )
}

#[tokio::test(start_paused = true)]
async fn test_after_fires_in_state() {
    common::init_tracing();
    let actor = interpret(delay_definition(), Default::default());

    let snapshot = settle(&actor, |s| s.state_tag() == "Idle").await;
    assert_eq!(snapshot.state_tag(), "Idle");
    actor.stop();
}

#[tokio::test(start_paused = true)]
async fn test_after_cancelled_by_earlier_exit() {
    common::init_tracing();
    let actor = interpret(delay_definition(), Default::default());
    let entered_idle = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&entered_idle);
    let _sub = actor.subscribe(move |snapshot| {
        if snapshot.state_tag() == "Idle" {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Leave Stopping before the 2s delay elapses.
    actor.send(DelayEvent::Interrupt);
    settle(&actor, |s| s.state_tag() == "Running").await;

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(actor.snapshot().state_tag(), "Running");
    assert_eq!(entered_idle.load(Ordering::SeqCst), 0);
    actor.stop();
}

// ============================================================================
// Persistent delays
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum GraceState {
    Armed,
    Working,
    Expired,
}

impl MachineState for GraceState {
    const TAGS: &'static [&'static str] = &["Armed", "Working", "Expired"];

    fn tag(&self) -> &'static str {
        match self {
            GraceState::Armed => "Armed",
            GraceState::Working => "Working",
            GraceState::Expired => "Expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GraceEvent {
    Hop,
    Disarm,
}

impl MachineEvent for GraceEvent {
    const TAGS: &'static [&'static str] = &["Hop", "Disarm"];

    fn tag(&self) -> &'static str {
        match self {
            GraceEvent::Hop => "Hop",
            GraceEvent::Disarm => "Disarm",
        }
    }
}

struct Grace;

impl Machine for Grace {
    type State = GraceState;
    type Event = GraceEvent;
    type Context = ();
}

fn grace_definition() -> Arc<MachineDefinition<Grace>> {
    Arc::new(
        MachineDefinition::<Grace>::builder(GraceState::Armed, ())
            .state(
                StateConfig::new("Armed")
                    .after_persistent("grace", Duration::from_secs(5), |_| {
                        Outcome::goto(GraceState::Expired)
                    })
                    .on("Hop", |_, _| Some(Outcome::goto(GraceState::Working))),
            )
            .state(
                StateConfig::new("Working")
                    .on("Hop", |_, _| Some(Outcome::goto(GraceState::Armed)))
                    .on("Disarm", |_, _| Some(Outcome::stay().cancel_delay("grace"))),
            )
            .state(StateConfig::new("Expired"))
            .build()
            .expect("valid definition"),
    )
}

#[tokio::test(start_paused = true)]
async fn test_persistent_delay_survives_state_exit() {
    common::init_tracing();
    let actor = interpret(grace_definition(), Default::default());

    // Leave the arming state; the keyed timer keeps running.
    actor.send(GraceEvent::Hop);
    settle(&actor, |s| s.state_tag() == "Working").await;

    // Fires from Working: persistent delays ignore the current state.
    let snapshot = settle(&actor, |s| s.state_tag() == "Expired").await;
    assert_eq!(snapshot.state_tag(), "Expired");
    actor.stop();
}

#[tokio::test(start_paused = true)]
async fn test_persistent_delay_cancelled_by_id() {
    common::init_tracing();
    let actor = interpret(grace_definition(), Default::default());

    actor.send(GraceEvent::Hop);
    settle(&actor, |s| s.state_tag() == "Working").await;
    actor.send(GraceEvent::Disarm);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(actor.snapshot().state_tag(), "Working");
    actor.stop();
}

#[tokio::test(start_paused = true)]
async fn test_rearmed_persistent_delay_fires_once() {
    common::init_tracing();
    let actor = interpret(grace_definition(), Default::default());
    let expirations = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&expirations);
    let _sub = actor.subscribe(move |snapshot| {
        if snapshot.state_tag() == "Expired" {
            sink.lock().unwrap().push(());
        }
    });

    // Armed -> Working -> Armed re-arms "grace", replacing the first timer.
    actor.send(GraceEvent::Hop);
    actor.send(GraceEvent::Hop);
    settle(&actor, |s| s.state_tag() == "Expired").await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(expirations.lock().unwrap().len(), 1);
    actor.stop();
}

#[tokio::test(start_paused = true)]
async fn test_imperative_cancel_via_handle() {
    common::init_tracing();
    let actor = interpret(grace_definition(), Default::default());

    actor.send(GraceEvent::Hop);
    settle(&actor, |s| s.state_tag() == "Working").await;
    actor.cancel_delay("grace");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(actor.snapshot().state_tag(), "Working");
    actor.stop();
}
