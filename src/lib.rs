//! This crate provides the core logic for a single-tape Turing machine written as
//! S-expressions. It includes modules for parsing programs, resolving label jumps,
//! executing programs against a tape, analyzing them for likely mistakes, inspecting
//! their elements, and loading them from files or the built-in samples.

pub mod analyzer;
pub mod inspect;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
mod resolver;
pub mod types;

/// Re-exports the `analyze` function and `AnalysisWarning` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisWarning};
/// Re-exports the inspection cursor and source helpers.
pub use inspect::{line_col, slice, Element};
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::ProgramLoader;
/// Re-exports the engine entry points from the machine module.
pub use machine::{
    run, spawn, CancelToken, Change, Halt, Outcome, Step, StepEvent, TuringMachine, Worker,
};
/// Re-exports the `parse` function from the parser module.
pub use parser::parse;
/// Re-exports `ProgramInfo`, `ProgramManager`, `Sample` and `PROGRAMS` from the programs module.
pub use programs::{ProgramInfo, ProgramManager, Sample, PROGRAMS};
/// Re-exports the program model and error type from the types module.
pub use types::{Alternative, Command, Jump, Position, Program, State, TuringError};
