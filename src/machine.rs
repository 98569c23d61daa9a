//! This module defines the `TuringMachine` struct, which executes a resolved `Program`
//! against a single left-bounded tape. It handles the head, the current state index,
//! tape growth, cooperative cancellation and the delivery of step events.

use crate::types::{display_symbol, Alternative, Command, Program, TuringError, BLANK, SENTINEL};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// A shared flag used to stop a run between two steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. The run stops before its next step.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A rule application, reported after the symbol has been written and before the head
/// has moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent<'p> {
    /// Number of the step, starting at 1.
    pub step: u64,
    /// The tape offset that was read and written.
    pub head: usize,
    /// Index of the state the alternative belongs to.
    pub state: usize,
    /// The alternative that was applied.
    pub alternative: &'p Alternative,
}

/// An owned copy of a `StepEvent`, suitable for sending across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub step: u64,
    pub head: usize,
    pub state: usize,
    pub alternative: Alternative,
}

impl From<StepEvent<'_>> for Change {
    fn from(event: StepEvent<'_>) -> Self {
        Self {
            step: event.step,
            head: event.head,
            state: event.state,
            alternative: event.alternative.clone(),
        }
    }
}

/// The terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A `HALT` alternative was applied; holds the final tape.
    Halted(String),
    /// The run stopped on an error.
    Failed(TuringError),
    /// The cancel token was signalled between two steps.
    Cancelled,
}

/// Why the machine stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// A `HALT` alternative was applied.
    Ok,
    Err(TuringError),
}

/// Represents the outcome of a single `TuringMachine::step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'p> {
    /// An alternative was applied and the machine moved on to the next state.
    Continue(StepEvent<'p>),
    /// The machine stopped. `event` is set when an alternative was applied first.
    Halt {
        event: Option<StepEvent<'p>>,
        halt: Halt,
    },
}

/// A single-tape Turing machine running a resolved program.
///
/// The machine borrows the program read-only and exclusively owns the tape, the head and
/// the current state index for the duration of the run.
#[derive(Debug, Clone)]
pub struct TuringMachine<'p> {
    program: &'p Program,
    initial: Vec<char>,
    tape: Vec<char>,
    head: usize,
    state: usize,
    step_count: u64,
    halt: Option<Halt>,
}

impl<'p> TuringMachine<'p> {
    /// Creates a machine with the head on the sentinel and state 0 current.
    ///
    /// # Returns
    ///
    /// * `Err(TuringError::Precondition)` if the tape is empty, does not start with the
    ///   sentinel, or the program has no states.
    pub fn new(program: &'p Program, tape: &str) -> Result<Self, TuringError> {
        let initial: Vec<char> = tape.chars().collect();

        if initial.first() != Some(&SENTINEL) {
            return Err(TuringError::Precondition(format!(
                "tape must start with '{SENTINEL}'"
            )));
        }
        if program.is_empty() {
            return Err(TuringError::Precondition(
                "program has no states".to_string(),
            ));
        }

        Ok(Self {
            program,
            tape: initial.clone(),
            initial,
            head: 0,
            state: 0,
            step_count: 0,
            halt: None,
        })
    }

    /// Executes a single step: read, look up, write, report, move, jump.
    ///
    /// Once the machine has stopped, further calls return the same `Halt` without an event.
    pub fn step(&mut self) -> Step<'p> {
        if let Some(halt) = &self.halt {
            return Step::Halt {
                event: None,
                halt: halt.clone(),
            };
        }

        let program = self.program;
        let symbol = self.tape[self.head];

        // The state index is kept within range by the jump check below.
        let Some(state) = program.state(self.state) else {
            return self.stop(None, Halt::Err(self.no_state(self.state as i64, None)));
        };

        let Some(alternative) = state.alternative_for(symbol) else {
            let error = TuringError::State {
                state: self.state,
                position: state.position().clone(),
                message: format!(
                    "no alternative for '{}', position {}, state {}",
                    display_symbol(symbol),
                    self.head,
                    self.state
                ),
            };
            return self.stop(None, Halt::Err(error));
        };

        self.tape[self.head] = alternative.replace();
        self.step_count += 1;

        let event = StepEvent {
            step: self.step_count,
            head: self.head,
            state: self.state,
            alternative,
        };

        match alternative.command() {
            Command::Halt => return self.stop(Some(event), Halt::Ok),
            Command::Nop => {}
            Command::Left => {
                let Some(head) = self.head.checked_sub(1) else {
                    let error = TuringError::Alternative {
                        alternative: alternative.clone(),
                        message: format!("moved left of start in state {}", self.state),
                    };
                    return self.stop(Some(event), Halt::Err(error));
                };
                self.head = head;
            }
            Command::Right => {
                self.head += 1;
                if self.head == self.tape.len() {
                    self.tape.push(BLANK);
                }
            }
        }

        let target = (self.state as i64).checked_add(alternative.jump());
        match target.filter(|&t| t >= 0 && (t as usize) < program.state_count()) {
            Some(target) => {
                self.state = target as usize;
                Step::Continue(event)
            }
            None => {
                let target = target.unwrap_or(i64::MAX);
                let error = self.no_state(target, Some(alternative));
                self.stop(Some(event), Halt::Err(error))
            }
        }
    }

    /// Runs the machine until it halts, fails, or `cancel` is signalled.
    ///
    /// `on_step` receives every step event in order. Cancellation is checked before each
    /// step, so a cancelled run never applies a partial step.
    pub fn run<F>(&mut self, mut on_step: F, cancel: &CancelToken) -> Outcome
    where
        F: FnMut(StepEvent<'p>),
    {
        debug!(
            states = self.program.state_count(),
            tape = self.tape.len(),
            "run started"
        );

        loop {
            if cancel.is_cancelled() {
                debug!(steps = self.step_count, "run cancelled");
                return Outcome::Cancelled;
            }

            match self.step() {
                Step::Continue(event) => {
                    trace!(step = event.step, head = event.head, state = event.state, alternative = %event.alternative, "step");
                    on_step(event);
                }
                Step::Halt { event, halt } => {
                    if let Some(event) = event {
                        trace!(step = event.step, head = event.head, state = event.state, alternative = %event.alternative, "step");
                        on_step(event);
                    }
                    return match halt {
                        Halt::Ok => {
                            debug!(steps = self.step_count, "run halted");
                            Outcome::Halted(self.tape_string())
                        }
                        Halt::Err(error) => {
                            debug!(steps = self.step_count, %error, "run failed");
                            Outcome::Failed(error)
                        }
                    };
                }
            }
        }
    }

    /// Returns the program being executed.
    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Returns the index of the current state.
    pub fn state_index(&self) -> usize {
        self.state
    }

    /// Returns the current head offset.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Returns the tape cells.
    pub fn tape(&self) -> &[char] {
        &self.tape
    }

    /// Returns the tape as text, with blanks as spaces.
    pub fn tape_string(&self) -> String {
        self.tape.iter().collect()
    }

    /// Returns the number of alternatives applied so far.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Returns why the machine stopped, or `None` while it can still step.
    pub fn halted(&self) -> Option<&Halt> {
        self.halt.as_ref()
    }

    /// Restores the initial tape, head, state and step count.
    pub fn reset(&mut self) {
        self.tape = self.initial.clone();
        self.head = 0;
        self.state = 0;
        self.step_count = 0;
        self.halt = None;
    }

    fn stop(&mut self, event: Option<StepEvent<'p>>, halt: Halt) -> Step<'p> {
        self.halt = Some(halt.clone());
        Step::Halt { event, halt }
    }

    fn no_state(&self, target: i64, alternative: Option<&Alternative>) -> TuringError {
        let message = format!("no state at resolved index {target}");
        match alternative {
            Some(alternative) => TuringError::Alternative {
                alternative: alternative.clone(),
                message,
            },
            None => TuringError::Precondition(message),
        }
    }
}

/// Runs `program` on `tape` to completion.
///
/// A tape that fails the precondition check yields `Outcome::Failed` without any step.
pub fn run<F>(program: &Program, tape: &str, on_step: F, cancel: &CancelToken) -> Outcome
where
    F: FnMut(StepEvent<'_>),
{
    match TuringMachine::new(program, tape) {
        Ok(mut machine) => machine.run(on_step, cancel),
        Err(error) => {
            debug!(%error, "run rejected");
            Outcome::Failed(error)
        }
    }
}

/// A run executing on its own thread.
pub struct Worker {
    events: Receiver<Change>,
    cancel: CancelToken,
    handle: JoinHandle<Outcome>,
}

impl Worker {
    /// The step events, in the order they were produced.
    pub fn events(&self) -> &Receiver<Change> {
        &self.events
    }

    /// Requests cancellation of the run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to finish.
    pub fn join(self) -> Outcome {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Starts a run on a dedicated worker thread.
///
/// Events are sent over an unbounded channel so a slow or absent receiver never holds
/// back the run. With `max_steps` set, the worker cancels itself once that many steps
/// have been applied, so the run ends with exactly that many events unless it stops
/// sooner.
pub fn spawn(
    program: Arc<Program>,
    tape: String,
    cancel: CancelToken,
    max_steps: Option<u64>,
) -> Worker {
    let (sender, events) = mpsc::channel();
    let token = cancel.clone();

    let handle = thread::spawn(move || {
        run(
            &program,
            &tape,
            |event| {
                if max_steps == Some(event.step) {
                    debug!(steps = event.step, "step limit reached");
                    token.cancel();
                }
                // A dropped receiver only means nobody is watching.
                let _ = sender.send(Change::from(event));
            },
            &token,
        )
    });

    Worker {
        events,
        cancel,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run_collect(program: &Program, tape: &str) -> (Vec<(usize, String)>, Outcome) {
        let mut events = Vec::new();
        let outcome = run(
            program,
            tape,
            |event| events.push((event.head, event.alternative.to_string())),
            &CancelToken::new(),
        );
        (events, outcome)
    }

    #[test]
    fn test_machine_creation() {
        let program = parse("(((* * R 0)))").unwrap();
        let machine = TuringMachine::new(&program, "*01").unwrap();

        assert_eq!(machine.head(), 0);
        assert_eq!(machine.state_index(), 0);
        assert_eq!(machine.tape(), &['*', '0', '1']);
        assert_eq!(machine.step_count(), 0);
        assert!(machine.halted().is_none());
    }

    #[test]
    fn test_tape_precondition() {
        let program = parse("(((* * R 0)))").unwrap();

        for tape in ["", "0*", " *"] {
            let error = TuringMachine::new(&program, tape).unwrap_err();
            assert_eq!(
                error,
                TuringError::Precondition("tape must start with '*'".to_string())
            );
        }
    }

    #[test]
    fn test_empty_program_precondition() {
        let program = parse("()").unwrap();
        let (events, outcome) = run_collect(&program, "*");

        assert!(events.is_empty());
        assert_eq!(
            outcome,
            Outcome::Failed(TuringError::Precondition("program has no states".into()))
        );
    }

    #[test]
    fn test_single_step_moves_right() {
        let program = parse("(((* * R 1)) ((0 1 H 0)))").unwrap();
        let mut machine = TuringMachine::new(&program, "*0").unwrap();

        match machine.step() {
            Step::Continue(event) => {
                assert_eq!(event.step, 1);
                assert_eq!(event.head, 0);
                assert_eq!(event.state, 0);
                assert_eq!(event.alternative.expected(), '*');
            }
            other => panic!("Expected Continue, got {:?}", other),
        }

        assert_eq!(machine.head(), 1);
        assert_eq!(machine.state_index(), 1);

        match machine.step() {
            Step::Halt {
                event: Some(event),
                halt: Halt::Ok,
            } => assert_eq!(event.head, 1),
            other => panic!("Expected Halt, got {:?}", other),
        }
        assert_eq!(machine.tape_string(), "*1");

        // A stopped machine stays stopped.
        assert_eq!(
            machine.step(),
            Step::Halt {
                event: None,
                halt: Halt::Ok
            }
        );
        assert_eq!(machine.step_count(), 2);
    }

    #[test]
    fn test_right_extends_tape_by_one_blank() {
        let program = parse("(((* * R 0) (B B R 0)))").unwrap();
        let mut machine = TuringMachine::new(&program, "*").unwrap();

        machine.step();
        assert_eq!(machine.tape(), &['*', BLANK]);

        machine.step();
        assert_eq!(machine.tape(), &['*', BLANK, BLANK]);
        assert_eq!(machine.head(), 2);
    }

    #[test]
    fn test_right_within_tape_does_not_extend() {
        let program = parse("(((* * R 0) (0 0 R 0)))").unwrap();
        let mut machine = TuringMachine::new(&program, "*00").unwrap();

        machine.step();
        assert_eq!(machine.tape().len(), 3);
        machine.step();
        assert_eq!(machine.tape().len(), 3);
        machine.step();
        assert_eq!(machine.tape().len(), 4);
    }

    #[test]
    fn test_nop_keeps_head() {
        let program = parse("(((* * R 1)) ((0 1 N 0) (1 1 H 0)))").unwrap();
        let (events, outcome) = run_collect(&program, "*0");

        assert_eq!(
            events,
            vec![
                (0, "(* * R 1)".to_string()),
                (1, "(0 1 N 0)".to_string()),
                (1, "(1 1 H 0)".to_string()),
            ]
        );
        assert_eq!(outcome, Outcome::Halted("*1".to_string()));
    }

    #[test]
    fn test_left_of_start_fails() {
        let program = parse("(((* * L 0)))").unwrap();
        let (events, outcome) = run_collect(&program, "*");

        assert_eq!(events.len(), 1);
        match outcome {
            Outcome::Failed(TuringError::Alternative {
                alternative,
                message,
            }) => {
                assert_eq!(alternative.position().range(), 2..11);
                assert!(message.starts_with("moved left of start"));
            }
            other => panic!("Expected an alternative error, got {:?}", other),
        }
    }

    #[test]
    fn test_jump_out_of_range_fails() {
        for (source, index) in [("(((* * R 1)))", 1), ("(((* * R -1)))", -1)] {
            let program = parse(source).unwrap();
            let (events, outcome) = run_collect(&program, "*");

            assert_eq!(events.len(), 1);
            match outcome {
                Outcome::Failed(error @ TuringError::Alternative { .. }) => {
                    assert_eq!(
                        error.message(),
                        format!("no state at resolved index {index}")
                    );
                    assert_eq!(error.offset(), Some(2));
                }
                other => panic!("Expected an alternative error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_no_alternative_fails_with_state_position() {
        let program = parse("(((* * R 0) (1 1 R 0)))").unwrap();
        let (events, outcome) = run_collect(&program, "*10");

        assert_eq!(events.len(), 2);
        match outcome {
            Outcome::Failed(TuringError::State {
                state,
                position,
                message,
            }) => {
                assert_eq!(state, 0);
                assert_eq!(position.range(), 1..22);
                assert_eq!(message, "no alternative for '0', position 2, state 0");
            }
            other => panic!("Expected a state error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_lookup() {
        let program = parse("(((* * R 0) (B 1 H 0)))").unwrap();
        let (_, outcome) = run_collect(&program, "*");

        assert_eq!(outcome, Outcome::Halted("*1".to_string()));
    }

    #[test]
    fn test_cancel_before_first_step() {
        let program = parse("(((* * R 0) (B B R 0)))").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut count = 0;
        let outcome = run(&program, "*", |_| count += 1, &cancel);

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_cancel_from_observer_stops_at_step_boundary() {
        let program = parse("(((* * R 0) (B B R 0)))").unwrap();
        let cancel = CancelToken::new();
        let mut machine = TuringMachine::new(&program, "*").unwrap();

        let mut count = 0;
        let outcome = machine.run(
            |event| {
                count += 1;
                if event.step == 5 {
                    cancel.cancel();
                }
            },
            &cancel,
        );

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(count, 5);
        assert_eq!(machine.step_count(), 5);
        assert_eq!(machine.tape().len(), 6);
    }

    #[test]
    fn test_reset() {
        let program = parse("(((* * R 1)) ((0 1 H 0)))").unwrap();
        let mut machine = TuringMachine::new(&program, "*0").unwrap();

        machine.run(|_| {}, &CancelToken::new());
        assert_eq!(machine.tape_string(), "*1");

        machine.reset();
        assert_eq!(machine.tape_string(), "*0");
        assert_eq!(machine.head(), 0);
        assert_eq!(machine.state_index(), 0);
        assert_eq!(machine.step_count(), 0);
        assert!(machine.halted().is_none());
    }

    #[test]
    fn test_spawn_delivers_events_in_order() {
        let program = Arc::new(parse("(((* * R 0) (0 1 R 0) (B B H 0)))").unwrap());
        let worker = spawn(program, "*000".to_string(), CancelToken::new(), None);

        // The sender is dropped when the run ends, which ends the iteration.
        let changes: Vec<Change> = worker.events().iter().collect();
        let outcome = worker.join();

        assert_eq!(
            changes.iter().map(|c| c.step).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(
            changes.iter().map(|c| c.head).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(outcome, Outcome::Halted("*111 ".to_string()));
    }

    #[test]
    fn test_spawn_cancel() {
        let program = Arc::new(parse("(((* * R 0) (B B R 0)))").unwrap());
        let worker = spawn(program, "*".to_string(), CancelToken::new(), None);

        // Wait until the run is going before stopping it.
        worker.events().recv().unwrap();
        worker.cancel();

        assert_eq!(worker.join(), Outcome::Cancelled);
    }

    #[test]
    fn test_spawn_step_limit_is_exact() {
        let program = Arc::new(parse("(((* * R 0) (B B N 0)))").unwrap());

        for limit in [1, 2, 50] {
            let worker = spawn(program.clone(), "*".to_string(), CancelToken::new(), Some(limit));

            let steps: Vec<u64> = worker.events().iter().map(|c| c.step).collect();

            assert_eq!(steps, (1..=limit).collect::<Vec<_>>());
            assert_eq!(worker.join(), Outcome::Cancelled);
        }
    }

    #[test]
    fn test_spawn_step_limit_cancels_before_a_later_halt() {
        let program = Arc::new(parse("(((* * R 0) (B B H 0)))").unwrap());

        let limited = spawn(program.clone(), "*".to_string(), CancelToken::new(), Some(1));
        assert_eq!(limited.events().iter().count(), 1);
        assert_eq!(limited.join(), Outcome::Cancelled);

        let halting = spawn(program, "*".to_string(), CancelToken::new(), Some(2));
        assert_eq!(halting.events().iter().count(), 2);
        assert_eq!(halting.join(), Outcome::Halted("* ".to_string()));
    }
}
