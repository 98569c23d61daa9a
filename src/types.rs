//! This module defines the core data structures shared by the parser, the resolver and the
//! execution engine: source positions, commands, alternatives, states, programs and the
//! error type every fallible operation returns.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::ops::Range;
use thiserror::Error;

/// The blank symbol as it is stored on the tape.
pub const BLANK: char = ' ';
/// The blank symbol as it is written in program source.
pub const SOURCE_BLANK: char = 'B';
/// The reserved symbol marking the left end of the tape.
pub const SENTINEL: char = '*';
/// Every symbol a tape cell may hold, in dispatch-table order.
pub const SYMBOLS: [char; 4] = ['0', '1', SENTINEL, BLANK];

/// Returns the dispatch slot of a tape symbol, or `None` if it is not part of the alphabet.
pub fn symbol_slot(symbol: char) -> Option<usize> {
    SYMBOLS.iter().position(|&s| s == symbol)
}

/// Returns the source spelling of a tape symbol (`B` for blank).
pub fn display_symbol(symbol: char) -> char {
    if symbol == BLANK {
        SOURCE_BLANK
    } else {
        symbol
    }
}

/// A half-open span `[start, end)` of character offsets into the program source.
///
/// The end is unknown while the construct is still being read and is set exactly once,
/// when its closing parenthesis has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    start: usize,
    end: Option<usize>,
}

impl Position {
    /// Opens a span at `start`.
    pub fn new(start: usize) -> Self {
        Self { start, end: None }
    }

    /// Creates a closed span.
    pub fn closed(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    /// Closes the span.
    ///
    /// # Panics
    ///
    /// Panics if the end has already been set.
    pub fn close(&mut self, end: usize) {
        if let Some(current) = self.end {
            panic!("end already set to {current}, not changing to {end}");
        }
        self.end = Some(end);
    }

    /// Returns the span as a range; an open span is empty.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end.unwrap_or(self.start)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{},{}", self.start, end),
            None => write!(f, "{},?", self.start),
        }
    }
}

/// The head movement (or halt) performed after a symbol has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Command {
    /// Move the head one cell to the left.
    Left,
    /// Move the head one cell to the right, growing the tape if needed.
    Right,
    /// Leave the head where it is.
    Nop,
    /// Stop the machine successfully.
    Halt,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Left, Command::Right, Command::Nop, Command::Halt];

    /// The single-character code used in program source.
    pub fn code(self) -> char {
        match self {
            Command::Left => 'L',
            Command::Right => 'R',
            Command::Nop => 'N',
            Command::Halt => 'H',
        }
    }

    /// Decodes a command from its source code, returning `None` for unknown codes.
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A jump target as written in source, before label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jump {
    /// A relative state-index delta.
    Literal(i64),
    /// A label to be resolved once the whole program has been read.
    Named(String),
}

/// One transition rule of a state.
///
/// When the machine is in the owning state and reads `expected`, it writes `replace`,
/// performs `command` and moves `jump` states forward (or backward when negative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternative {
    position: Position,
    expected: char,
    replace: char,
    command: Command,
    jump: i64,
    label: Option<String>,
}

impl Alternative {
    /// Creates a resolved alternative.
    ///
    /// Fails if either symbol is outside the tape alphabet, or if exactly one of
    /// `expected` and `replace` is the sentinel.
    pub fn new(
        position: Position,
        expected: char,
        replace: char,
        command: Command,
        jump: i64,
    ) -> Result<Self, TuringError> {
        for symbol in [expected, replace] {
            if symbol_slot(symbol).is_none() {
                return Err(TuringError::parse(
                    format!("invalid symbol '{symbol}'"),
                    position.start(),
                ));
            }
        }
        if (expected == SENTINEL) != (replace == SENTINEL) {
            return Err(TuringError::parse(
                format!("invalid replace '{}'", display_symbol(replace)),
                position.start(),
            ));
        }

        Ok(Self {
            position,
            expected,
            replace,
            command,
            jump,
            label: None,
        })
    }

    /// Records the label this alternative's jump was written with.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn expected(&self) -> char {
        self.expected
    }

    pub fn replace(&self) -> char {
        self.replace
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// The resolved state-index delta.
    pub fn jump(&self) -> i64 {
        self.jump
    }

    /// The label the jump was written with, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = display_symbol(self.expected);
        let replace = display_symbol(self.replace);
        match &self.label {
            Some(label) => write!(
                f,
                "({expected} {replace} {} \"{label}\"({}))",
                self.command, self.jump
            ),
            None => write!(f, "({expected} {replace} {} {})", self.command, self.jump),
        }
    }
}

/// A set of alternatives addressed by the state's index in its program.
///
/// No two alternatives share an expected symbol, so lookup goes through a table with
/// one slot per tape symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    position: Position,
    alternatives: Vec<Alternative>,
    #[serde(skip)]
    dispatch: [Option<usize>; SYMBOLS.len()],
}

impl State {
    /// Creates a state, rejecting a second alternative for the same expected symbol.
    pub fn new(position: Position, alternatives: Vec<Alternative>) -> Result<Self, TuringError> {
        let mut dispatch = [None; SYMBOLS.len()];
        for (index, alternative) in alternatives.iter().enumerate() {
            // Alternative::new guarantees the symbol is in the alphabet.
            let slot = symbol_slot(alternative.expected).unwrap_or_default();
            if dispatch[slot].is_some() {
                return Err(TuringError::parse(
                    format!(
                        "alternative duplicated for '{}'",
                        display_symbol(alternative.expected)
                    ),
                    alternative.position.start(),
                ));
            }
            dispatch[slot] = Some(index);
        }

        Ok(Self {
            position,
            alternatives,
            dispatch,
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn alternative(&self, index: usize) -> Option<&Alternative> {
        self.alternatives.get(index)
    }

    /// Returns the alternative matching `symbol`, if any.
    pub fn alternative_for(&self, symbol: char) -> Option<&Alternative> {
        let index = self.dispatch[symbol_slot(symbol)?]?;
        self.alternatives.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alternatives.is_empty() {
            return write!(f, "()");
        }
        write!(f, "(")?;
        for alternative in &self.alternatives {
            write!(f, "\n  {alternative}")?;
        }
        write!(f, "\n )")
    }
}

/// A resolved program: states addressed by index, plus the label table used to resolve it.
///
/// Programs are immutable once built and are shared read-only by the engine and by
/// inspection tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    position: Position,
    states: Vec<State>,
    labels: BTreeMap<String, usize>,
}

impl Program {
    pub fn new(position: Position, states: Vec<State>, labels: BTreeMap<String, usize>) -> Self {
        Self {
            position,
            states,
            labels,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, index: usize) -> Option<&State> {
        self.states.get(index)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn labels(&self) -> &BTreeMap<String, usize> {
        &self.labels
    }

    /// Returns the address a label is bound to.
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Total number of alternatives across all states.
    pub fn alternative_count(&self) -> usize {
        self.states.iter().map(|s| s.alternatives.len()).sum()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.states.is_empty() {
            return write!(f, "()");
        }
        write!(f, "(")?;
        for state in &self.states {
            write!(f, "\n {state}")?;
        }
        write!(f, "\n)")
    }
}

/// Represents the errors produced while parsing, resolving, loading or running a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TuringError {
    /// The source text does not follow the grammar.
    #[error("{message} at offset {offset}")]
    Parse {
        message: String,
        offset: usize,
        source: Option<ParseIntError>,
    },
    /// A jump names a label that is never declared.
    #[error("{message} at offset {offset}")]
    Resolution { message: String, offset: usize },
    /// The run could not start.
    #[error("{0}")]
    Precondition(String),
    /// The current state has no alternative for the symbol under the head.
    #[error("{message}")]
    State {
        state: usize,
        position: Position,
        message: String,
    },
    /// The applied alternative moved the head off the tape or jumped out of the program.
    #[error("{message}")]
    Alternative {
        alternative: Alternative,
        message: String,
    },
    /// Reading a program or tape from disk failed.
    #[error("File error: {0}")]
    File(String),
}

impl TuringError {
    pub(crate) fn parse(message: impl Into<String>, offset: usize) -> Self {
        TuringError::Parse {
            message: message.into(),
            offset,
            source: None,
        }
    }

    /// The source offset the error points at, if it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            TuringError::Parse { offset, .. } | TuringError::Resolution { offset, .. } => {
                Some(*offset)
            }
            TuringError::State { position, .. } => Some(position.start()),
            TuringError::Alternative { alternative, .. } => Some(alternative.position.start()),
            TuringError::Precondition(_) | TuringError::File(_) => None,
        }
    }

    /// The span of the program element at fault, for run-time errors.
    pub fn position(&self) -> Option<&Position> {
        match self {
            TuringError::State { position, .. } => Some(position),
            TuringError::Alternative { alternative, .. } => Some(&alternative.position),
            _ => None,
        }
    }

    /// The bare message without the offset suffix.
    pub fn message(&self) -> String {
        match self {
            TuringError::Parse { message, .. }
            | TuringError::Resolution { message, .. }
            | TuringError::State { message, .. }
            | TuringError::Alternative { message, .. } => message.clone(),
            TuringError::Precondition(message) | TuringError::File(message) => message.clone(),
        }
    }
}
