//! This module provides functions for analyzing resolved programs to detect likely
//! mistakes before execution: jumps that leave the program, states that can never be
//! reached, states with no alternatives, and programs that can never halt.
//!
//! Analysis never rejects a program. Every finding is a warning; the engine decides at
//! run time what actually fails.

use crate::types::{Command, Program};
use std::collections::VecDeque;
use thiserror::Error;

/// Represents the findings reported by `analyze`.
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum AnalysisWarning {
    /// An alternative jumps to an index outside the program.
    #[error("state {state}, alternative {alternative}: jump to state {target} is outside the program")]
    JumpOutOfRange {
        state: usize,
        alternative: usize,
        target: i64,
    },
    /// A state has no alternatives, so any run entering it fails.
    #[error("state {0} has no alternatives")]
    EmptyState(usize),
    /// States that no chain of jumps from state 0 can reach.
    #[error("unreachable states: {0:?}")]
    UnreachableStates(Vec<usize>),
    /// No alternative in the program halts.
    #[error("no alternative halts the machine")]
    NoHalt,
    /// A label declared after the last state; it names an address with no state.
    #[error("label \"{name}\" is bound to address {address}, past the last state")]
    DanglingLabel { name: String, address: usize },
}

/// Analyzes a resolved `Program` and returns every warning found.
///
/// The checks run in a fixed order and the result is deterministic for a given program.
///
/// # Arguments
///
/// * `program` - A reference to the `Program` to be analyzed.
///
/// # Returns
///
/// * `Vec<AnalysisWarning>` - Empty if nothing suspicious was found.
pub fn analyze(program: &Program) -> Vec<AnalysisWarning> {
    if program.is_empty() {
        return Vec::new();
    }

    [
        check_jumps,
        check_empty_states,
        check_unreachable_states,
        check_halt,
        check_labels,
    ]
    .iter()
    .flat_map(|f| f(program))
    .collect()
}

/// Computes the absolute target of a jump from `state`.
fn target(state: usize, jump: i64) -> Option<i64> {
    (state as i64).checked_add(jump)
}

/// Checks that every non-halting alternative lands on an existing state.
fn check_jumps(program: &Program) -> Vec<AnalysisWarning> {
    let count = program.state_count() as i64;
    let mut warnings = Vec::new();

    for (state_index, state) in program.states().iter().enumerate() {
        for (index, alternative) in state.alternatives().iter().enumerate() {
            // A halting alternative never jumps.
            if alternative.command() == Command::Halt {
                continue;
            }
            let target = target(state_index, alternative.jump()).unwrap_or(i64::MAX);
            if !(0..count).contains(&target) {
                warnings.push(AnalysisWarning::JumpOutOfRange {
                    state: state_index,
                    alternative: index,
                    target,
                });
            }
        }
    }

    warnings
}

/// Checks for states without alternatives.
fn check_empty_states(program: &Program) -> Vec<AnalysisWarning> {
    program
        .states()
        .iter()
        .enumerate()
        .filter(|(_, state)| state.is_empty())
        .map(|(index, _)| AnalysisWarning::EmptyState(index))
        .collect()
}

/// Checks which states are reachable from state 0 by following jumps.
///
/// The walk ignores which symbols can actually be on the tape, so a state reported
/// reachable may still never run; a state reported unreachable never will.
fn check_unreachable_states(program: &Program) -> Vec<AnalysisWarning> {
    let count = program.state_count();
    let mut reached = vec![false; count];
    let mut queue = VecDeque::from([0]);
    reached[0] = true;

    while let Some(index) = queue.pop_front() {
        for alternative in program.states()[index].alternatives() {
            if alternative.command() == Command::Halt {
                continue;
            }
            let Some(next) = target(index, alternative.jump())
                .and_then(|t| usize::try_from(t).ok())
                .filter(|&t| t < count)
            else {
                continue;
            };
            if !reached[next] {
                reached[next] = true;
                queue.push_back(next);
            }
        }
    }

    let unreachable: Vec<usize> = (0..count).filter(|&i| !reached[i]).collect();
    if unreachable.is_empty() {
        Vec::new()
    } else {
        vec![AnalysisWarning::UnreachableStates(unreachable)]
    }
}

/// Checks that at least one alternative halts.
fn check_halt(program: &Program) -> Vec<AnalysisWarning> {
    let halts = program
        .states()
        .iter()
        .flat_map(|state| state.alternatives())
        .any(|alternative| alternative.command() == Command::Halt);

    if halts {
        Vec::new()
    } else {
        vec![AnalysisWarning::NoHalt]
    }
}

/// Checks for labels bound past the last state.
fn check_labels(program: &Program) -> Vec<AnalysisWarning> {
    program
        .labels()
        .iter()
        .filter(|(_, &address)| address >= program.state_count())
        .map(|(name, &address)| AnalysisWarning::DanglingLabel {
            name: name.clone(),
            address,
        })
        .collect()
}
