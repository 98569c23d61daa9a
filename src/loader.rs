//! This module provides the `ProgramLoader` struct, responsible for loading programs and
//! tapes from files, strings and directories.

use crate::parser::parse;
use crate::types::{Program, TuringError};
use std::fs;
use std::path::{Path, PathBuf};

/// File extension of program sources.
pub const PROGRAM_EXTENSION: &str = "turing";

/// `ProgramLoader` is a utility struct for loading programs.
/// It provides methods to load programs from individual files, from string content,
/// and to discover and load all `.turing` files within a directory.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Loads a single program from the specified file path.
    ///
    /// # Arguments
    ///
    /// * `path` - A reference to the `Path` of the `.turing` file to load.
    ///
    /// # Returns
    ///
    /// * `Ok(Program)` if the file is successfully read and parsed.
    /// * `Err(TuringError::File)` if the file cannot be read.
    /// * `Err(TuringError::Parse)` or `Err(TuringError::Resolution)` if the content is not
    ///   a valid program.
    pub fn load_program(path: &Path) -> Result<Program, TuringError> {
        parse(&Self::read(path)?)
    }

    /// Loads a single program from the provided string content.
    pub fn load_program_from_string(content: &str) -> Result<Program, TuringError> {
        parse(content)
    }

    /// Loads all program files (`.turing` extension) from a given directory.
    ///
    /// Directories and files with other extensions are skipped. Results are sorted by
    /// path so the order does not depend on the file system.
    ///
    /// # Returns
    ///
    /// * `Vec<Result<(PathBuf, Program), TuringError>>` - one entry per `.turing` file,
    ///   either the parsed program or the error that prevented loading it.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Program), TuringError>> {
        if !directory.exists() {
            return vec![Err(TuringError::File(format!(
                "Directory {} does not exist",
                directory.display()
            )))];
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(TuringError::File(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => results.push(Err(TuringError::File(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }

        paths.retain(|path| {
            !path.is_dir() && path.extension().is_some_and(|ext| ext == PROGRAM_EXTENSION)
        });
        paths.sort();

        results.extend(
            paths
                .into_iter()
                .map(|path| Self::load_program(&path).map(|program| (path, program))),
        );
        results
    }

    /// Reads a tape from a file.
    ///
    /// A single trailing line break is removed, since editors add one; every other
    /// character, including spaces, is a tape cell.
    pub fn load_tape(path: &Path) -> Result<String, TuringError> {
        let content = Self::read(path)?;
        let tape = content
            .strip_suffix("\r\n")
            .or_else(|| content.strip_suffix('\n'))
            .unwrap_or(&content);
        Ok(tape.to_string())
    }

    fn read(path: &Path) -> Result<String, TuringError> {
        fs::read_to_string(path).map_err(|e| {
            TuringError::File(format!("Failed to read file {}: {}", path.display(), e))
        })
    }
}
