//! cmdgate: authorize shell commands proposed by an agent, and optionally run them.
//!
//! Usage:
//!   cmdgate [--config PATH] [--verbose] check <command...>
//!   cmdgate [--config PATH] [--verbose] run <command...>
//!   cmdgate [--config PATH] --dump-config
//!   echo '{"command":"ls -la"}' | cmdgate [--config PATH]
//!
//! `check` prints the decision as JSON. `run` evaluates, prompts on the
//! terminal for `ask`, executes, and exits with the command's exit code.

use std::io::Read;

use log::LevelFilter;
use serde::Deserialize;

use cmdgate::config::Config;
use cmdgate::exec::TerminalConfirm;
use cmdgate::logging;
use cmdgate::session::Session;

#[derive(Deserialize)]
struct StdinInput {
    command: Option<String>,
}

enum Mode {
    Check(String),
    Run(String),
    DumpConfig,
    Stdin,
}

struct Args {
    config: Option<String>,
    verbose: bool,
    mode: Mode,
}

fn usage() -> ! {
    eprintln!(
        "usage: cmdgate [--config PATH] [--verbose] (check <command...> | run <command...> | --dump-config)"
    );
    std::process::exit(2);
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    let mut verbose = false;
    let mut mode = Mode::Stdin;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => config = Some(path),
                None => usage(),
            },
            "-v" | "--verbose" => verbose = true,
            "--dump-config" => mode = Mode::DumpConfig,
            "-h" | "--help" => usage(),
            "check" | "run" => {
                let command = args.by_ref().collect::<Vec<_>>().join(" ");
                if command.trim().is_empty() {
                    usage();
                }
                mode = if arg == "check" {
                    Mode::Check(command)
                } else {
                    Mode::Run(command)
                };
            }
            _ => usage(),
        }
    }

    Args {
        config,
        verbose,
        mode,
    }
}

fn load_config(path: Option<&str>) -> Config {
    match path {
        Some(path) => match Config::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        None => Config::load(),
    }
}

fn read_stdin_command() -> String {
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("failed to read stdin");
        std::process::exit(1);
    }
    let parsed: StdinInput = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("JSON parse error: {e}");
            std::process::exit(1);
        }
    };
    parsed.command.unwrap_or_default()
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    if args.verbose {
        logging::init(LevelFilter::Debug, None);
    } else {
        logging::init(LevelFilter::Info, Some(logging::DEFAULT_LOG_PATH));
    }

    let config = load_config(args.config.as_deref());

    let command = match args.mode {
        Mode::DumpConfig => {
            match toml::to_string_pretty(&config) {
                Ok(text) => print!("{text}"),
                Err(e) => {
                    eprintln!("failed to serialize config: {e}");
                    std::process::exit(1);
                }
            }
            return;
        }
        Mode::Run(command) => {
            let session = Session::from_config(&config);
            let result = session.run(&command, &TerminalConfirm::new()).await;
            println!("{}", result.to_json());
            std::process::exit(result.exit_code);
        }
        Mode::Check(command) => command,
        Mode::Stdin => read_stdin_command(),
    };

    let session = Session::from_config(&config);
    let result = session.check(&command);
    let output = serde_json::json!({
        "command": command,
        "decision": result.decision,
        "reason": result.reason,
    });
    println!("{output}");
}
