//! Pure transition resolution.
//!
//! `resolve` maps `(current state, current context, event)` to an
//! [`Outcome`] without touching the running actor. Precedence is fixed:
//! a global handler is consulted first and its non-`None` result is final;
//! a `None` result falls through to the current state's handler; an absent
//! handler resolves to `NoMatch`. A panicking handler is caught, logged,
//! and resolved as `NoMatch`.

// Layer 1: Standard library imports
use std::panic::{catch_unwind, AssertUnwindSafe};

// Layer 2: Third-party crate imports
use tracing::warn;

// Layer 3: Internal module imports
use super::definition::MachineDefinition;
use super::outcome::{Handler, Outcome};
use super::traits::{ContextOf, EventOf, Machine, MachineEvent, MachineState, StateOf};

/// Resolve one event against the definition.
pub fn resolve<M: Machine>(
    definition: &MachineDefinition<M>,
    state: &StateOf<M>,
    context: &ContextOf<M>,
    event: &EventOf<M>,
) -> Outcome<M> {
    if let Some(handler) = definition.global_handler(event.tag()) {
        match call_guarded(handler, context, event, "<global>") {
            Ok(Some(outcome)) => return outcome,
            Ok(None) => {} // falls through to the per-state handler
            Err(()) => return Outcome::NoMatch,
        }
    }

    let handler = definition
        .state(state.tag())
        .and_then(|config| config.handler(event.tag()));

    match handler {
        Some(handler) => match call_guarded(handler, context, event, state.tag()) {
            Ok(Some(outcome)) => outcome,
            // A handled event with a null result stays unchanged.
            Ok(None) => Outcome::stay(),
            Err(()) => Outcome::NoMatch,
        },
        None => Outcome::NoMatch,
    }
}

fn call_guarded<M: Machine>(
    handler: &Handler<M>,
    context: &ContextOf<M>,
    event: &EventOf<M>,
    site: &str,
) -> Result<Option<Outcome<M>>, ()> {
    catch_unwind(AssertUnwindSafe(|| handler(context, event))).map_err(|_| {
        warn!(
            state = site,
            event = event.tag(),
            "event handler panicked; resolving as NoMatch"
        );
    })
}
