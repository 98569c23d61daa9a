use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};
use tursx::{
    analyze, line_col, spawn, CancelToken, Outcome, ProgramLoader, ProgramManager, TuringError,
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
#[clap(after_help = "EXAMPLES:
  tursx-cli demos/parity.turing --tape '*1101'
  tursx-cli --sample parity --debug
  cat demos/invert.turing | tursx-cli - --tape '*0110'")]
struct Cli {
    /// The program file to execute, or `-` to read it from stdin
    program: Option<PathBuf>,

    /// Run a built-in sample program instead of a file
    #[clap(short, long, conflicts_with = "program")]
    sample: Option<String>,

    /// The initial tape; must start with '*'
    #[clap(short, long, conflicts_with = "tape_file")]
    tape: Option<String>,

    /// Read the initial tape from a file
    #[clap(long)]
    tape_file: Option<PathBuf>,

    /// Print each step of the execution
    #[clap(short = 'd', long)]
    debug: bool,

    /// Report analysis warnings instead of running
    #[clap(long)]
    check: bool,

    /// Print the parsed program as JSON instead of running
    #[clap(long)]
    dump: bool,

    /// Cancel the run after this many steps
    #[clap(long)]
    max_steps: Option<u64>,

    /// List the built-in sample programs
    #[clap(long)]
    list: bool,
}

/// Settings for one run, resolved from the command line.
struct RunConfig {
    tape: String,
    debug: bool,
    max_steps: Option<u64>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    if cli.list {
        for (index, name) in ProgramManager::list_program_names().iter().enumerate() {
            println!("{index}: {name}");
        }
        return ExitCode::SUCCESS;
    }

    let (source, sample_tape) = match load_source(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let program = match tursx::parse(&source) {
        Ok(program) => program,
        Err(e) => {
            report(&source, &e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check || cli.dump {
        if cli.check {
            for warning in analyze(&program) {
                println!("warning: {warning}");
            }
        }
        if cli.dump {
            match serde_json::to_string_pretty(&program) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        return ExitCode::SUCCESS;
    }

    let tape = match (&cli.tape, &cli.tape_file) {
        (Some(tape), _) => tape.clone(),
        (None, Some(path)) => match ProgramLoader::load_tape(path) {
            Ok(tape) => tape,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        (None, None) => sample_tape.unwrap_or_else(|| "*".to_string()),
    };

    let config = RunConfig {
        tape,
        debug: cli.debug,
        max_steps: cli.max_steps,
    };

    execute(program, &source, config)
}

/// Initialize logging; `RUST_LOG` overrides the default `warn` filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Loads the program source, from a sample, a file, or stdin.
///
/// Samples also return their suggested tape.
fn load_source(cli: &Cli) -> Result<(String, Option<String>), String> {
    if let Some(name) = &cli.sample {
        return ProgramManager::get_program_by_name(name)
            .map(|sample| (sample.text.to_string(), Some(sample.tape.clone())))
            .ok_or_else(|| format!("No sample program named '{}'", name));
    }

    match cli.program.as_deref() {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .map(|source| (source, None))
            .map_err(|e| format!("Failed to read file '{}': {}", path.display(), e)),
        Some(_) => read_stdin(),
        None if atty::isnt(atty::Stream::Stdin) => read_stdin(),
        None => Err("No program given".to_string()),
    }
}

fn read_stdin() -> Result<(String, Option<String>), String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| format!("Failed to read from stdin: {}", e))?;
    Ok((buffer, None))
}

/// Runs the program on a worker thread, printing step events as they arrive.
fn execute(program: tursx::Program, source: &str, config: RunConfig) -> ExitCode {
    let worker = spawn(
        Arc::new(program),
        config.tape,
        CancelToken::new(),
        config.max_steps,
    );
    let mut steps = 0;

    for change in worker.events() {
        steps += 1;
        if config.debug {
            println!("{:5}: {}", change.head, change.alternative);
        }
    }

    match worker.join() {
        Outcome::Halted(tape) => {
            if config.debug {
                println!("\nMachine halted after {} steps.", steps);
            }
            println!("{}", tape);
            ExitCode::SUCCESS
        }
        Outcome::Failed(e) => {
            report(source, &e);
            ExitCode::FAILURE
        }
        Outcome::Cancelled => {
            eprintln!("Cancelled after {} steps.", steps);
            ExitCode::from(2)
        }
    }
}

/// Prints an error with the source line and column it points at.
fn report(source: &str, error: &TuringError) {
    match error.offset() {
        Some(offset) => {
            let (line, col) = line_col(source, offset);
            eprintln!("Error: {} (line {}, column {})", error.message(), line, col);
        }
        None => eprintln!("Error: {}", error),
    }
}
