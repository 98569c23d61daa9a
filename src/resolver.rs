//! Label resolution.
//!
//! The parser produces draft states whose jumps may still name a label. Once the program
//! form has closed, every label is known, and this module rebuilds the states with each
//! jump reduced to a plain state-index delta.

use crate::types::{Alternative, Command, Jump, Position, Program, State, TuringError};
use std::collections::BTreeMap;

/// An alternative as read from source, before its jump is resolved.
#[derive(Debug, Clone)]
pub(crate) struct DraftAlternative {
    pub position: Position,
    pub expected: char,
    pub replace: char,
    pub command: Command,
    pub jump: Jump,
}

/// A state as read from source.
#[derive(Debug, Clone)]
pub(crate) struct DraftState {
    pub position: Position,
    pub alternatives: Vec<DraftAlternative>,
}

/// Resolves every label jump to `target - source` and builds the final `Program`.
///
/// Fails with `TuringError::Resolution`, positioned at the end of the offending
/// alternative, when a jump names a label that was never declared.
pub(crate) fn resolve(
    position: Position,
    states: Vec<DraftState>,
    labels: BTreeMap<String, usize>,
) -> Result<Program, TuringError> {
    let states = states
        .into_iter()
        .enumerate()
        .map(|(index, state)| resolve_state(index, state, &labels))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Program::new(position, states, labels))
}

fn resolve_state(
    index: usize,
    state: DraftState,
    labels: &BTreeMap<String, usize>,
) -> Result<State, TuringError> {
    let alternatives = state
        .alternatives
        .into_iter()
        .map(|alternative| resolve_alternative(index, alternative, labels))
        .collect::<Result<Vec<_>, _>>()?;

    State::new(state.position, alternatives)
}

fn resolve_alternative(
    source: usize,
    draft: DraftAlternative,
    labels: &BTreeMap<String, usize>,
) -> Result<Alternative, TuringError> {
    let DraftAlternative {
        position,
        expected,
        replace,
        command,
        jump,
    } = draft;

    match jump {
        Jump::Literal(delta) => Alternative::new(position, expected, replace, command, delta),
        Jump::Named(label) => {
            let Some(&target) = labels.get(&label) else {
                return Err(TuringError::Resolution {
                    message: format!("unknown label \"{label}\""),
                    offset: position.end().unwrap_or(position.start()),
                });
            };
            let delta = target as i64 - source as i64;
            Ok(Alternative::new(position, expected, replace, command, delta)?.with_label(label))
        }
    }
}
