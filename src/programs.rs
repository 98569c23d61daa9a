//! Built-in sample programs.
//!
//! Each sample is a `.turing` source embedded at compile time. Its header comments name
//! the program and give a suggested input tape:
//!
//! ```text
//! ; name: Parity
//! ; tape: *1101
//! ```

use crate::parser::parse;
use crate::types::{Program, TuringError};
use tracing::warn;

const PROGRAM_TEXTS: [&str; 4] = [
    include_str!("../demos/binary-increment.turing"),
    include_str!("../demos/parity.turing"),
    include_str!("../demos/invert.turing"),
    include_str!("../demos/unary-addition.turing"),
];

/// A parsed sample program with its source and suggested tape.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub tape: String,
    pub text: &'static str,
    pub program: Program,
}

impl Sample {
    fn from_text(text: &'static str) -> Result<Self, TuringError> {
        let program = parse(text)?;
        Ok(Self {
            name: header(text, "name").unwrap_or("Untitled").to_string(),
            tape: header(text, "tape").unwrap_or("*").to_string(),
            text,
            program,
        })
    }
}

lazy_static::lazy_static! {
    pub static ref PROGRAMS: Vec<Sample> = PROGRAM_TEXTS
        .iter()
        .filter_map(|text| match Sample::from_text(text) {
            Ok(sample) => Some(sample),
            Err(error) => {
                warn!(%error, "failed to parse sample program");
                None
            }
        })
        .collect();
}

/// Finds a `; key: value` header comment.
fn header<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix(';'))
        .find_map(|comment| comment.trim_start().strip_prefix(key)?.strip_prefix(':'))
        .map(str::trim)
}

pub struct ProgramManager;

impl ProgramManager {
    /// Get the number of available programs
    pub fn get_program_count() -> usize {
        PROGRAMS.len()
    }

    /// Get a program by its index
    pub fn get_program_by_index(index: usize) -> Option<&'static Sample> {
        PROGRAMS.get(index)
    }

    /// Get a program by its name, ignoring case
    pub fn get_program_by_name(name: &str) -> Option<&'static Sample> {
        PROGRAMS
            .iter()
            .find(|sample| sample.name.eq_ignore_ascii_case(name))
    }

    /// List all program names
    pub fn list_program_names() -> Vec<String> {
        PROGRAMS.iter().map(|sample| sample.name.clone()).collect()
    }

    /// Search for programs by name
    pub fn search_programs(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();
        PROGRAMS
            .iter()
            .enumerate()
            .filter(|(_, sample)| sample.name.to_lowercase().contains(&query))
            .map(|(index, _)| index)
            .collect()
    }

    /// Get information about a program by its index
    pub fn get_program_info(index: usize) -> Option<ProgramInfo> {
        let sample = Self::get_program_by_index(index)?;

        Some(ProgramInfo {
            index,
            name: sample.name.clone(),
            tape: sample.tape.clone(),
            state_count: sample.program.state_count(),
            alternative_count: sample.program.alternative_count(),
            label_count: sample.program.labels().len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub index: usize,
    pub name: String,
    pub tape: String,
    pub state_count: usize,
    pub alternative_count: usize,
    pub label_count: usize,
}
