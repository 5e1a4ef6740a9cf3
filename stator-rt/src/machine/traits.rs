//! Core vocabulary traits for machine definitions.
//!
//! A machine's vocabulary is fixed at definition time: a closed finite set of
//! state tags, a closed finite set of event tags, and a context type whose
//! schema does not change while the actor runs. The traits here carry that
//! vocabulary as compile-time constants so that strict-state exhaustiveness
//! can be checked when a definition is built, without runtime reflection.

// Layer 1: Standard library imports
use std::fmt::Debug;

// Layer 2: Third-party crate imports
// (none for this module)

// Layer 3: Internal module imports
// (none)

/// A machine state: a tagged value drawn from a closed finite tag set.
///
/// Two states are *equal in identity* iff their tags are equal; the
/// per-variant payload may differ across transitions to the same tag.
/// `PartialEq` compares full values (tag and payload) and is what snapshot
/// equality uses; identity comparisons inside the runtime go through
/// [`MachineState::tag`].
///
/// # Example
/// ```rust
/// use stator_rt::machine::MachineState;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Light {
///     Red,
///     Green { remaining_ms: u32 },
/// }
///
/// impl MachineState for Light {
///     const TAGS: &'static [&'static str] = &["Red", "Green"];
///
///     fn tag(&self) -> &'static str {
///         match self {
///             Light::Red => "Red",
///             Light::Green { .. } => "Green",
///         }
///     }
/// }
///
/// assert_eq!(Light::Green { remaining_ms: 10 }.tag(), "Green");
/// ```
pub trait MachineState: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The machine's full state-tag vocabulary (compile-time constant).
    const TAGS: &'static [&'static str];

    /// The tag of this state value.
    fn tag(&self) -> &'static str;
}

/// A machine event: an immutable tagged value.
///
/// Internal runtime signals (stream ticks, invoke terminations, delayed
/// transitions, lifecycle markers) never appear as values of this type; they
/// travel through the mailbox as dedicated envelope variants.
///
/// # Example
/// ```rust
/// use stator_rt::machine::MachineEvent;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum LightEvent {
///     Advance,
///     Tick { delta: u32 },
/// }
///
/// impl MachineEvent for LightEvent {
///     const TAGS: &'static [&'static str] = &["Advance", "Tick"];
///
///     fn tag(&self) -> &'static str {
///         match self {
///             LightEvent::Advance => "Advance",
///             LightEvent::Tick { .. } => "Tick",
///         }
///     }
/// }
/// ```
pub trait MachineEvent: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The machine's full event-tag vocabulary (compile-time constant).
    ///
    /// Strict states are validated against this set at definition-build time.
    const TAGS: &'static [&'static str];

    /// The tag of this event value.
    fn tag(&self) -> &'static str;
}

/// Bundle of associated types describing one machine's vocabulary.
///
/// The runtime is generic over `M: Machine` everywhere, so a machine is
/// usually an empty marker type:
///
/// ```rust
/// use stator_rt::machine::{Machine, MachineState, MachineEvent};
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum ToggleState { Off, On }
///
/// impl MachineState for ToggleState {
///     const TAGS: &'static [&'static str] = &["Off", "On"];
///     fn tag(&self) -> &'static str {
///         match self {
///             ToggleState::Off => "Off",
///             ToggleState::On => "On",
///         }
///     }
/// }
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum ToggleEvent { Toggle }
///
/// impl MachineEvent for ToggleEvent {
///     const TAGS: &'static [&'static str] = &["Toggle"];
///     fn tag(&self) -> &'static str { "Toggle" }
/// }
///
/// struct Toggle;
///
/// impl Machine for Toggle {
///     type State = ToggleState;
///     type Event = ToggleEvent;
///     type Context = ();
/// }
/// ```
pub trait Machine: Send + Sync + Sized + 'static {
    /// The state vocabulary of this machine.
    type State: MachineState;

    /// The event vocabulary of this machine.
    type Event: MachineEvent;

    /// The per-actor context bag. Copy-on-write: every update produces a new
    /// value; no component mutates a held context reference.
    type Context: Clone + Debug + PartialEq + Send + Sync + 'static;
}

/// Shorthand for a machine's state type.
pub type StateOf<M> = <M as Machine>::State;

/// Shorthand for a machine's event type.
pub type EventOf<M> = <M as Machine>::Event;

/// Shorthand for a machine's context type.
pub type ContextOf<M> = <M as Machine>::Context;
