//! This module provides the recursive-descent parser for Turing machine programs.
//!
//! A program is a single parenthesized form holding states, each a parenthesized list of
//! alternatives, optionally preceded by quoted labels:
//!
//! ```text
//! (
//!   "scan"
//!   ((* * R 0) (0 0 R 0) (1 1 R 0) (B B H 0))
//! )
//! ```
//!
//! Parsing stops at the first error. Every error carries the character offset into the
//! source where it was detected.

use crate::resolver::{resolve, DraftAlternative, DraftState};
use crate::types::{
    display_symbol, Command, Jump, Position, Program, TuringError, BLANK, SENTINEL,
    SOURCE_BLANK,
};
use std::collections::BTreeMap;
use std::str::Chars;
use tracing::debug;

/// Parses program source into a resolved `Program`.
///
/// Exactly one program form must appear in the text; anything around it may only be
/// whitespace or comments. Label jumps are resolved once the program form closes.
///
/// # Returns
///
/// * `Ok(Program)` if the text is a valid program and every label is declared.
/// * `Err(TuringError::Parse)` on the first syntax error.
/// * `Err(TuringError::Resolution)` if a jump names an undeclared label.
pub fn parse(source: &str) -> Result<Program, TuringError> {
    let mut reader = Reader::new(source);
    let mut program = None;

    loop {
        reader.skip_trivia();
        let offset = reader.offset;
        match reader.bump() {
            None => break,
            Some('(') => {
                if program.is_some() {
                    return Err(TuringError::parse("program already defined", offset));
                }
                program = Some(reader.program(offset)?);
            }
            Some(ch) => return Err(unrecognized("expecting program", ch, offset)),
        }
    }

    let program = program
        .ok_or_else(|| TuringError::parse("end of text expecting program", reader.offset))?;

    debug!(
        states = program.state_count(),
        alternatives = program.alternative_count(),
        labels = program.labels().len(),
        "program parsed"
    );

    Ok(program)
}

/// Jump text collected while reading an alternative; literals are converted at the
/// closing parenthesis.
enum JumpText {
    Literal(String),
    Named(String),
}

/// Character cursor over the source, tracking the offset in characters.
struct Reader<'a> {
    chars: Chars<'a>,
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars(),
            offset: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.offset += 1;
        Some(ch)
    }

    /// Skips whitespace and comments. A comment runs up to the next newline, which is
    /// then skipped as whitespace.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\r' | '\n' => {
                    self.bump();
                }
                ';' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    /// Reads the body of a program form whose `(` sits at `start`.
    fn program(&mut self, start: usize) -> Result<Program, TuringError> {
        let mut position = Position::new(start);
        let mut states = Vec::new();
        let mut labels = BTreeMap::new();

        loop {
            self.skip_trivia();
            let offset = self.offset;
            match self.bump() {
                None => return Err(end_of_text("program", offset)),
                Some('"') => {
                    let name = self.quoted("program")?;
                    if labels.contains_key(&name) {
                        return Err(TuringError::parse(
                            format!("duplicated label \"{name}\""),
                            offset + 1,
                        ));
                    }
                    // A label names the address of the next state.
                    labels.insert(name, states.len());
                }
                Some('(') => states.push(self.state(offset)?),
                Some(')') => {
                    position.close(self.offset);
                    return resolve(position, states, labels);
                }
                Some(ch) => return Err(unrecognized("reading program", ch, offset)),
            }
        }
    }

    /// Reads the body of a state form whose `(` sits at `start`.
    fn state(&mut self, start: usize) -> Result<DraftState, TuringError> {
        let mut position = Position::new(start);
        let mut alternatives: Vec<DraftAlternative> = Vec::new();

        loop {
            self.skip_trivia();
            let offset = self.offset;
            match self.bump() {
                None => return Err(end_of_text("state", offset)),
                Some('(') => {
                    let alternative = self.alternative(offset)?;
                    if alternatives
                        .iter()
                        .any(|a| a.expected == alternative.expected)
                    {
                        return Err(TuringError::parse(
                            format!(
                                "alternative duplicated for '{}'",
                                display_symbol(alternative.expected)
                            ),
                            offset,
                        ));
                    }
                    alternatives.push(alternative);
                }
                Some(')') => {
                    position.close(self.offset);
                    return Ok(DraftState {
                        position,
                        alternatives,
                    });
                }
                Some(ch) => return Err(unrecognized("reading state", ch, offset)),
            }
        }
    }

    /// Reads the body of an alternative form whose `(` sits at `start`.
    ///
    /// Fields are taken in order: expected symbol, replace symbol, command, jump.
    fn alternative(&mut self, start: usize) -> Result<DraftAlternative, TuringError> {
        let mut expected: Option<char> = None;
        let mut replace: Option<char> = None;
        let mut command: Option<Command> = None;
        let mut jump: Option<JumpText> = None;

        loop {
            self.skip_trivia();
            let offset = self.offset;
            let Some(ch) = self.bump() else {
                return Err(end_of_text("alternative", offset));
            };

            match ch {
                ')' => {
                    let missing = |message: &str| TuringError::parse(message, offset);
                    let expected = expected.ok_or_else(|| missing("missing expected symbol"))?;
                    let replace = replace.ok_or_else(|| missing("missing replace symbol"))?;
                    let command = command.ok_or_else(|| missing("missing command"))?;
                    let jump = match jump.ok_or_else(|| missing("missing jump distance"))? {
                        JumpText::Named(label) => Jump::Named(label),
                        JumpText::Literal(text) => {
                            let delta =
                                text.parse::<i64>().map_err(|e| TuringError::Parse {
                                    message: format!("invalid jump {text}"),
                                    offset,
                                    source: Some(e),
                                })?;
                            Jump::Literal(delta)
                        }
                    };

                    return Ok(DraftAlternative {
                        position: Position::closed(start, self.offset),
                        expected,
                        replace,
                        command,
                        jump,
                    });
                }
                _ if expected.is_none() => {
                    let symbol = parse_symbol(ch)
                        .ok_or_else(|| unrecognized("reading alternative", ch, offset))?;
                    expected = Some(symbol);
                }
                _ if replace.is_none() => {
                    let symbol = parse_symbol(ch)
                        .ok_or_else(|| unrecognized("reading alternative", ch, offset))?;
                    // The sentinel can only be replaced by itself.
                    if (expected == Some(SENTINEL)) != (symbol == SENTINEL) {
                        return Err(TuringError::parse(
                            format!("invalid replace '{ch}'"),
                            offset,
                        ));
                    }
                    replace = Some(symbol);
                }
                _ if command.is_none() => {
                    let code = Command::from_code(ch).ok_or_else(|| {
                        TuringError::parse(format!("invalid command '{ch}'"), offset)
                    })?;
                    command = Some(code);
                }
                '"' if jump.is_none() => {
                    jump = Some(JumpText::Named(self.quoted("alternative")?));
                }
                '0'..='9' | '+' | '-' if jump.is_none() => {
                    let mut text = ch.to_string();
                    // One token: `1 2` is not read as 12.
                    while let Some(digit) = self.peek().filter(char::is_ascii_digit) {
                        self.bump();
                        text.push(digit);
                    }
                    jump = Some(JumpText::Literal(text));
                }
                _ => return Err(unrecognized("reading alternative", ch, offset)),
            }
        }
    }

    /// Reads a quoted name whose opening `"` has been consumed.
    fn quoted(&mut self, context: &str) -> Result<String, TuringError> {
        let start = self.offset;
        let mut name = String::new();

        loop {
            match self.bump() {
                None => return Err(end_of_text(context, self.offset)),
                Some('"') => return Ok(name),
                Some('\n' | '\r') => {
                    return Err(TuringError::parse(
                        "label not terminated at end of line",
                        start,
                    ))
                }
                Some(ch) => name.push(ch),
            }
        }
    }
}

/// Maps a source symbol to the tape symbol it denotes.
fn parse_symbol(ch: char) -> Option<char> {
    match ch {
        SOURCE_BLANK => Some(BLANK),
        '0' | '1' | SENTINEL => Some(ch),
        _ => None,
    }
}

fn unrecognized(context: &str, ch: char, offset: usize) -> TuringError {
    TuringError::parse(
        format!(
            "{context}, unrecognized character '{}' ({:#04x})",
            ch.escape_default(),
            ch as u32
        ),
        offset,
    )
}

fn end_of_text(context: &str, offset: usize) -> TuringError {
    TuringError::parse(format!("unexpected end of text reading {context}"), offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn parse_err(source: &str) -> (String, usize) {
        let error = parse(source).unwrap_err();
        (error.message(), error.offset().unwrap())
    }

    #[test]
    fn test_parse_simple_program() {
        let program = parse("(( (1 1 H 0) ))").unwrap();

        assert_eq!(program.state_count(), 1);
        assert_eq!(program.position().range(), 0..15);

        let state = program.state(0).unwrap();
        assert_eq!(state.position().range(), 1..14);

        let alternative = &state.alternatives()[0];
        assert_eq!(alternative.position().range(), 3..12);
        assert_eq!(alternative.expected(), '1');
        assert_eq!(alternative.replace(), '1');
        assert_eq!(alternative.command(), Command::Halt);
        assert_eq!(alternative.jump(), 0);
    }

    #[test]
    fn test_parse_blank_and_signed_jumps() {
        let program = parse("(((B 1 N -1) (0 0 L +3) (1 0 R 12)))").unwrap();
        let alternatives = program.state(0).unwrap().alternatives();

        assert_eq!(alternatives[0].expected(), BLANK);
        assert_eq!(alternatives[0].command(), Command::Nop);
        assert_eq!(alternatives[0].jump(), -1);
        assert_eq!(alternatives[1].jump(), 3);
        assert_eq!(alternatives[2].jump(), 12);
    }

    #[test]
    fn test_parse_fields_without_whitespace() {
        let program = parse("(((11H0)))").unwrap();
        let alternative = &program.state(0).unwrap().alternatives()[0];

        assert_eq!(alternative.command(), Command::Halt);
        assert_eq!(alternative.position().range(), 2..8);
    }

    #[test]
    fn test_parse_comments() {
        let source = r#"; leading comment
( ; program
  "start" ; label
  ( (* * R 0) ; skip the sentinel
    (1 0 R "start") )
) ; trailing comment"#;

        let program = parse(source).unwrap();

        assert_eq!(program.label("start"), Some(0));
        assert_eq!(program.state(0).unwrap().alternatives()[1].jump(), 0);
    }

    #[test]
    fn test_parse_labels_resolve_to_deltas() {
        let source = r#"(
 ((* * R "scan"))
 "scan"
 ((0 0 R 0) (1 1 R 0) (B B L "back"))
 "back"
 ((0 1 H 0) (1 0 L "back") (* * R "scan"))
)"#;

        let program = parse(source).unwrap();

        assert_eq!(program.label("scan"), Some(1));
        assert_eq!(program.label("back"), Some(2));
        assert_eq!(program.state(0).unwrap().alternatives()[0].jump(), 1);
        assert_eq!(program.state(1).unwrap().alternatives()[2].jump(), 1);
        assert_eq!(program.state(2).unwrap().alternatives()[1].jump(), 0);
        assert_eq!(program.state(2).unwrap().alternatives()[2].jump(), -1);
        assert_eq!(
            program.state(2).unwrap().alternatives()[2].to_string(),
            "(* * R \"scan\"(-1))"
        );
    }

    #[test]
    fn test_parse_label_after_last_state() {
        let program = parse(r#"(((1 1 R "end")) "end")"#).unwrap();

        assert_eq!(program.label("end"), Some(1));
        assert_eq!(program.state(0).unwrap().alternatives()[0].jump(), 1);
    }

    #[test]
    fn test_parse_empty_program_and_state() {
        let program = parse("( () )").unwrap();
        assert_eq!(program.state_count(), 1);
        assert!(program.state(0).unwrap().is_empty());

        assert!(parse("()").unwrap().is_empty());
    }

    #[test]
    fn test_parse_missing_fields() {
        assert_eq!(parse_err("((( )))"), ("missing expected symbol".into(), 4));
        assert_eq!(parse_err("(((1 )))"), ("missing replace symbol".into(), 5));
        assert_eq!(parse_err("(((1 1)))"), ("missing command".into(), 6));
        assert_eq!(parse_err("(((1 1 R)))"), ("missing jump distance".into(), 8));
    }

    #[test]
    fn test_parse_invalid_replace() {
        assert_eq!(parse_err("(((* 1 R 0)))"), ("invalid replace '1'".into(), 5));
        assert_eq!(parse_err("(((0 * R 0)))"), ("invalid replace '*'".into(), 5));
        assert_eq!(parse_err("(((* B R 0)))"), ("invalid replace 'B'".into(), 5));
    }

    #[test]
    fn test_parse_invalid_command() {
        assert_eq!(parse_err("(((1 1 X 0)))"), ("invalid command 'X'".into(), 7));
    }

    #[test]
    fn test_parse_invalid_jump() {
        let error = parse("(((1 1 R -)))").unwrap_err();
        assert_eq!(error.message(), "invalid jump -");
        assert_eq!(error.offset(), Some(10));
        assert!(error.source().is_some());

        let error = parse("(((1 1 R 99999999999999999999)))").unwrap_err();
        assert!(error.message().starts_with("invalid jump 9999"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_parse_jump_digits_must_be_contiguous() {
        assert_eq!(
            parse_err("(((1 1 R 1 2)))"),
            (
                "reading alternative, unrecognized character '2' (0x32)".into(),
                11
            )
        );
    }

    #[test]
    fn test_parse_unterminated_labels() {
        assert_eq!(
            parse_err("(((1 1 R \"abc\n)))"),
            ("label not terminated at end of line".into(), 10)
        );
        assert_eq!(
            parse_err("(\"abc\r\n())"),
            ("label not terminated at end of line".into(), 2)
        );
    }

    #[test]
    fn test_parse_unknown_label() {
        let error = parse("(((1 1 R \"nope\")))").unwrap_err();

        assert!(matches!(error, TuringError::Resolution { .. }));
        assert_eq!(error.message(), "unknown label \"nope\"");
        assert_eq!(error.offset(), Some(16));
    }

    #[test]
    fn test_parse_duplicated_label() {
        assert_eq!(
            parse_err("(\"a\" \"a\" ())"),
            ("duplicated label \"a\"".into(), 6)
        );
    }

    #[test]
    fn test_parse_duplicated_alternative() {
        assert_eq!(
            parse_err("(((0 0 R 0) (0 1 R 0)))"),
            ("alternative duplicated for '0'".into(), 12)
        );
    }

    #[test]
    fn test_parse_program_count() {
        assert_eq!(parse_err("(()) (())"), ("program already defined".into(), 5));

        let source = " ; only a comment\n";
        assert_eq!(
            parse_err(source),
            (
                "end of text expecting program".into(),
                source.chars().count()
            )
        );
    }

    #[test]
    fn test_parse_unrecognized_characters() {
        assert_eq!(
            parse_err("x(())"),
            ("expecting program, unrecognized character 'x' (0x78)".into(), 0)
        );
        assert_eq!(
            parse_err("(x)"),
            ("reading program, unrecognized character 'x' (0x78)".into(), 1)
        );
        assert_eq!(
            parse_err("((x))"),
            ("reading state, unrecognized character 'x' (0x78)".into(), 2)
        );
        assert_eq!(
            parse_err("((\t))"),
            ("reading state, unrecognized character '\\t' (0x09)".into(), 2)
        );
    }

    #[test]
    fn test_parse_unexpected_end() {
        assert_eq!(
            parse_err("(("),
            ("unexpected end of text reading state".into(), 2)
        );
        assert_eq!(
            parse_err("(((1"),
            ("unexpected end of text reading alternative".into(), 4)
        );
        assert_eq!(
            parse_err("( ()"),
            ("unexpected end of text reading program".into(), 4)
        );
    }

    #[test]
    fn test_parse_offsets_count_characters() {
        assert_eq!(
            parse_err("; é\n(x)"),
            ("reading program, unrecognized character 'x' (0x78)".into(), 5)
        );
    }

    #[test]
    fn test_parse_error_after_valid_state_returns_no_program() {
        let result = parse("(((1 1 H 0)) ((0 0 Q 0)))");

        assert!(matches!(result, Err(TuringError::Parse { .. })));
    }
}
