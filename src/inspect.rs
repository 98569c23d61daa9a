//! Element inspection.
//!
//! Lets a front end walk a parsed program element by element (the program, then each
//! state followed by its alternatives) and map the current element back to its span in
//! the source text.

use crate::types::{Position, Program};
use std::fmt;

/// A program element addressed by state and alternative indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Element {
    /// The whole program.
    #[default]
    Program,
    /// A state, by index.
    State(usize),
    /// An alternative, by state index and alternative index.
    Alternative(usize, usize),
}

impl Element {
    /// Returns the element after `self` in source order, or `self` if it is the last one.
    pub fn next(self, program: &Program) -> Self {
        let last_state = program.state_count().checked_sub(1);
        let alternatives =
            |state: usize| program.state(state).map_or(0, |s| s.alternatives().len());

        match self {
            Element::Program => match last_state {
                Some(_) => Element::State(0),
                None => self,
            },
            Element::State(state) if alternatives(state) > 0 => Element::Alternative(state, 0),
            Element::Alternative(state, index) if index + 1 < alternatives(state) => {
                Element::Alternative(state, index + 1)
            }
            Element::State(state) | Element::Alternative(state, _) => {
                if last_state.is_some_and(|last| state < last) {
                    Element::State(state + 1)
                } else {
                    self
                }
            }
        }
    }

    /// Returns the element before `self` in source order; the program is the first one.
    pub fn prev(self, program: &Program) -> Self {
        match self {
            Element::Program | Element::State(0) => Element::Program,
            Element::Alternative(state, 0) => Element::State(state),
            Element::Alternative(state, index) => Element::Alternative(state, index - 1),
            Element::State(state) => {
                let previous = state - 1;
                match program
                    .state(previous)
                    .map_or(0, |s| s.alternatives().len())
                {
                    0 => Element::State(previous),
                    count => Element::Alternative(previous, count - 1),
                }
            }
        }
    }

    /// Returns the source span of the element, or `None` if it does not exist in `program`.
    pub fn position<'p>(&self, program: &'p Program) -> Option<&'p Position> {
        match *self {
            Element::Program => Some(program.position()),
            Element::State(state) => program.state(state).map(|s| s.position()),
            Element::Alternative(state, index) => program
                .state(state)
                .and_then(|s| s.alternative(index))
                .map(|a| a.position()),
        }
    }

    /// Returns the canonical text of the element.
    pub fn render(&self, program: &Program) -> Option<String> {
        match *self {
            Element::Program => Some(program.to_string()),
            Element::State(state) => program.state(state).map(ToString::to_string),
            Element::Alternative(state, index) => program
                .state(state)
                .and_then(|s| s.alternative(index))
                .map(ToString::to_string),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Program => write!(f, "Program"),
            Element::State(state) => write!(f, "State {state}"),
            Element::Alternative(state, index) => {
                write!(f, "State {state}, Alternative {index}")
            }
        }
    }
}

/// Translates a character offset into a 1-based `(line, column)` pair.
///
/// Offsets past the end of the text map to the position just after the last character.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for ch in source.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Returns the source text covered by `position`, or `None` if the span is open or out
/// of bounds.
pub fn slice<'a>(source: &'a str, position: &Position) -> Option<&'a str> {
    let end = position.end()?;
    let byte = |offset: usize| {
        source
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(source.len()))
            .nth(offset)
    };
    source.get(byte(position.start())?..byte(end)?)
}
