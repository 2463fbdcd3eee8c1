//! Profiling Demos
//!
//! Runs one of the four profiling programs. Failures are logged and turn
//! into a non-zero exit code.

use clap::{value_parser, Arg, ArgMatches, Command};
use profiling_demos::core::logging;
use profiling_demos::profile::TraceRecorder;
use profiling_demos::{api, demos, AppState, Config, Error, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    // Logging is not up yet, so configuration problems go straight to stderr
    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let recorder = TraceRecorder::new(config.server.max_trace_events);
    if let Err(e) = logging::init(&config.logging, &recorder) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", profiling_demos::NAME, profiling_demos::VERSION);

    match run(&matches, config, recorder).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cli() -> Command {
    let output = Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Profile output path");
    let bound = Arg::new("bound")
        .long("bound")
        .value_name("N")
        .value_parser(value_parser!(u64))
        .help("Inclusive upper bound of the summed range");

    Command::new("profiling-demos")
        .version(profiling_demos::VERSION)
        .about("CPU, heap and trace profiling demos.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("cpu-loop")
                .about("Profile an inline summing loop into ./result.pb")
                .arg(output.clone())
                .arg(bound.clone()),
        )
        .subcommand(
            Command::new("cpu-sum")
                .about("Profile sum_numbers(1e9) into ./cpu.pprof")
                .arg(output.clone())
                .arg(bound),
        )
        .subcommand(
            Command::new("heap")
                .about("Write a heap snapshot to ./heap.prof")
                .arg(output),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve profiling endpoints under /debug/pprof/ on localhost:6060")
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .value_name("ADDR")
                        .help("Bind address"),
                ),
        )
}

/// Defaults, config file, environment, then command line
fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches.get_one::<PathBuf>("config");
    let mut config = Config::load(path.map(PathBuf::as_path))?;

    apply_cli_overrides(&mut config, matches);
    config.validate()?;

    Ok(config)
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    match matches.subcommand() {
        Some(("cpu-loop", sub)) => {
            if let Some(path) = sub.get_one::<PathBuf>("output") {
                config.output.cpu_loop_path = path.clone();
            }
            if let Some(bound) = sub.get_one::<u64>("bound") {
                config.workload.loop_bound = *bound;
            }
        }
        Some(("cpu-sum", sub)) => {
            if let Some(path) = sub.get_one::<PathBuf>("output") {
                config.output.cpu_sum_path = path.clone();
            }
            if let Some(bound) = sub.get_one::<u64>("bound") {
                config.workload.sum_bound = *bound;
            }
        }
        Some(("heap", sub)) => {
            if let Some(path) = sub.get_one::<PathBuf>("output") {
                config.output.heap_path = path.clone();
            }
        }
        Some(("serve", sub)) => {
            if let Some(addr) = sub.get_one::<String>("addr") {
                config.server.addr = addr.clone();
            }
        }
        _ => {}
    }
}

async fn run(matches: &ArgMatches, config: Config, recorder: TraceRecorder) -> Result<()> {
    match matches.subcommand_name() {
        Some("cpu-loop") => {
            tokio::task::spawn_blocking(move || demos::run_cpu_loop(&config)).await??;
        }
        Some("cpu-sum") => {
            tokio::task::spawn_blocking(move || demos::run_cpu_sum(&config)).await??;
        }
        Some("heap") => {
            demos::run_heap(&config).await?;
        }
        Some("serve") => {
            let state = AppState::new(&config, recorder);
            api::start_server(&config, state).await?;
        }
        other => {
            return Err(Error::config(format!("Unknown subcommand: {:?}", other)));
        }
    }

    Ok(())
}
