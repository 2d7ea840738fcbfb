use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use moviedb_core::dynamo::{DynamoDbService, ServiceConfig};
use moviedb_core::memory::MemoryService;
use moviedb_core::service::ItemService;
use moviedb_core::table::DEFAULT_TABLE_NAME;
use moviedb_core::{MovieTable, TableConfig};
use rustyline::DefaultEditor;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

mod commands;
mod demo;
mod display;
mod executor;
mod parser;

use display::OutputMode;

/// moviedb: a movie catalogue walkthrough and debug shell for DynamoDB.
#[derive(Parser, Debug)]
#[command(name = "moviedb", version)]
struct Cli {
    /// Which item service to talk to.
    #[arg(long, value_enum, default_value_t = Backend::Dynamodb, global = true)]
    backend: Backend,

    /// Table name.
    #[arg(long, env = "MOVIEDB_TABLE", default_value = DEFAULT_TABLE_NAME, global = true)]
    table: String,

    /// Service endpoint override (e.g. http://localhost:8000 for DynamoDB Local).
    #[arg(long, env = "MOVIEDB_ENDPOINT_URL", global = true)]
    endpoint_url: Option<String>,

    /// AWS region override.
    #[arg(long, global = true)]
    region: Option<String>,

    /// Output results as machine-parseable JSON.
    #[arg(short, long, global = true)]
    json: bool,

    /// Log at info level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Mode {
    /// Run the walkthrough: create, load, put, get, update, remove actor,
    /// conditional delete, query, scan.
    Demo {
        /// Movie fixture to load.
        #[arg(long, default_value = "data/moviedata.json")]
        fixture: PathBuf,

        /// Enter the debug shell when the walkthrough finishes.
        #[arg(long)]
        shell: bool,
    },
    /// Start the debug shell.
    Shell {
        /// Execute a command non-interactively (can be repeated).
        #[arg(short, long = "exec")]
        exec: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    /// Amazon DynamoDB (or anything speaking its API).
    Dynamodb,
    /// In-process emulation; data lives for the lifetime of the process.
    Memory,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn connect(cli: &Cli, rt: &Runtime) -> MovieTable {
    let service: Arc<dyn ItemService> = match cli.backend {
        Backend::Memory => Arc::new(MemoryService::new()),
        Backend::Dynamodb => {
            let config = ServiceConfig {
                region: cli.region.clone(),
                endpoint_url: cli.endpoint_url.clone(),
            };
            Arc::new(rt.block_on(DynamoDbService::connect(&config)))
        }
    };
    MovieTable::new(service, TableConfig::new(cli.table.as_str()))
}

fn history_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("moviedb").join("history.txt"))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {e}");
            process::exit(1);
        }
    };
    let table = connect(&cli, &runtime);
    let mode = OutputMode::from_flag(cli.json);

    match &cli.command {
        Mode::Demo { fixture, shell } => {
            if let Err(e) = demo::run_demo(&table, &runtime, fixture) {
                display::render_error(&e, &mode);
                process::exit(1);
            }
            if *shell {
                run_shell(&table, &runtime, &mode);
            }
        }
        Mode::Shell { exec } if !exec.is_empty() => {
            process::exit(run_exec_mode(&table, &runtime, exec, &mode));
        }
        Mode::Shell { .. } => run_shell(&table, &runtime, &mode),
    }
}

/// REPL on a terminal, pipe mode otherwise.
fn run_shell(table: &MovieTable, rt: &Runtime, mode: &OutputMode) {
    if std::io::stdin().is_terminal() {
        run_repl(table, rt);
    } else {
        process::exit(run_pipe_mode(table, rt, mode));
    }
}

/// Execute one or more commands non-interactively (--exec mode).
///
/// Returns exit code: 0 = all succeeded, 1 = first error stops execution.
fn run_exec_mode(table: &MovieTable, rt: &Runtime, commands: &[String], mode: &OutputMode) -> i32 {
    for cmd_str in commands {
        let cmd = match parser::parse(cmd_str) {
            Ok(cmd) => cmd,
            Err(e) => {
                display::render_error(&e, mode);
                return 1;
            }
        };

        match executor::execute(table, rt, cmd, mode) {
            Ok(result) => {
                if !display::render(&result, mode) {
                    return 0;
                }
            }
            Err(e) => {
                display::render_error(&e, mode);
                return 1;
            }
        }
    }

    0
}

/// Read commands from stdin (pipe mode).
///
/// Returns exit code: 0 = all succeeded, 1 = first error.
fn run_pipe_mode(table: &MovieTable, rt: &Runtime, mode: &OutputMode) -> i32 {
    let stdin = std::io::stdin();
    run_lines(table, rt, stdin.lock(), mode)
}

fn run_lines(table: &MovieTable, rt: &Runtime, input: impl BufRead, mode: &OutputMode) -> i32 {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                display::render_error(&e, mode);
                return 1;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let cmd = match parser::parse(trimmed) {
            Ok(cmd) => cmd,
            Err(e) => {
                display::render_error(&e, mode);
                return 1;
            }
        };

        match executor::execute(table, rt, cmd, mode) {
            Ok(result) => {
                if !display::render(&result, mode) {
                    return 0; // EXIT command
                }
            }
            Err(e) => {
                display::render_error(&e, mode);
                return 1;
            }
        }
    }

    0
}

/// Interactive REPL mode.
fn run_repl(table: &MovieTable, rt: &Runtime) {
    println!("moviedb console v{}", env!("CARGO_PKG_VERSION"));
    println!("Type HELP for available commands.\n");

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to initialize line editor: {e}");
            return;
        }
    };
    let history = history_path();
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    let prompt = format!("moviedb:{}> ", table.table_name());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let cmd = match parser::parse(trimmed) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        display::print_error(&e);
                        continue;
                    }
                };

                match executor::execute(table, rt, cmd, &OutputMode::Pretty) {
                    Ok(result) => {
                        if !display::render(&result, &OutputMode::Pretty) {
                            break; // EXIT command
                        }
                    }
                    Err(e) => display::print_error(&e),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!();
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("Bye!");
                break;
            }
            Err(e) => {
                eprintln!("Readline error: {e}");
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = rl.save_history(path) {
            tracing::debug!(path = %path.display(), error = %e, "could not save history");
        }
    }
}
