//! workshop-sim: runs the simulated workshop clock.
//!
//! Usage:
//!   workshop-sim [STATE_FILE] [--config sim.json] [--tick-ms 100]
//!                [--checkpoint-every 50] [--start 0] [--max-ticks N]
//!                [--log-file serwis.log]
//!
//! The binary re-executes itself with `--logger --channel-key K` to run the
//! logger worker; that mode is not meant to be started by hand.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use workshop_core::{
    channel::ChannelKey,
    config::SupervisorConfig,
    logger::{self, DEFAULT_LOG_FILE},
    supervisor::{self, CHANNEL_KEY_FLAG, LOGGER_FLAG, LOG_FILE_FLAG},
};

/// Flags that take a value; anything else that does not start with `--`
/// is the state file.
const VALUE_FLAGS: &[&str] = &[
    "--config",
    "--tick-ms",
    "--checkpoint-every",
    "--start",
    "--max-ticks",
    LOG_FILE_FLAG,
    CHANNEL_KEY_FLAG,
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == LOGGER_FLAG) {
        run_logger(&args)
    } else {
        run_supervisor(&args)
    }
}

fn run_logger(args: &[String]) -> Result<()> {
    let key: ChannelKey = flag_value(args, CHANNEL_KEY_FLAG)
        .context("logger mode needs --channel-key")?
        .parse::<ChannelKey>()
        .context("invalid --channel-key")?;
    let log_file = flag_value(args, LOG_FILE_FLAG).unwrap_or(DEFAULT_LOG_FILE);

    let report = logger::run_worker(key, Path::new(log_file))?;
    log::debug!("logger report: {report:?}");
    Ok(())
}

fn run_supervisor(args: &[String]) -> Result<()> {
    let config = build_config(args)?;
    println!("workshop-sim");
    println!("  state file:       {}", config.state_file.display());
    println!("  log file:         {}", config.log_file.display());
    println!("  tick:             {} ms", config.tick_interval_ms);
    println!("  checkpoint every: {} ticks", config.checkpoint_every);
    println!();

    let summary = supervisor::launch(config)?;

    println!();
    println!("=== RUN SUMMARY ===");
    println!("  resumed:       {}", summary.resumed);
    println!("  ticks run:     {}", summary.ticks);
    println!("  final minutes: {}", summary.final_minutes);
    Ok(())
}

fn build_config(args: &[String]) -> Result<SupervisorConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => SupervisorConfig::load(path)?,
        None => SupervisorConfig::default(),
    };

    if let Some(state_file) = positional(args) {
        config.state_file = PathBuf::from(state_file);
    }
    if let Some(log_file) = flag_value(args, LOG_FILE_FLAG) {
        config.log_file = PathBuf::from(log_file);
    }
    config.tick_interval_ms = parse_arg(args, "--tick-ms", config.tick_interval_ms)?;
    config.checkpoint_every = parse_arg(args, "--checkpoint-every", config.checkpoint_every)?;
    config.start_minutes = parse_arg(args, "--start", config.start_minutes)?;
    if flag_value(args, "--max-ticks").is_some() {
        config.max_ticks = Some(parse_arg(args, "--max-ticks", 0)?);
    }

    config.validate()?;
    Ok(config)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match flag_value(args, flag) {
        Some(raw) => raw.parse().with_context(|| format!("invalid {flag} value '{raw}'")),
        None => Ok(default),
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn state_file_defaults_to_clock_state() {
        let config = build_config(&args(&[])).unwrap();
        assert_eq!(config.state_file, PathBuf::from("clock.state"));
        assert_eq!(config.max_ticks, None);
    }

    #[test]
    fn positional_state_file_is_found_between_flags() {
        let a = args(&["--tick-ms", "5", "run.state", "--max-ticks", "10"]);
        let config = build_config(&a).unwrap();
        assert_eq!(config.state_file, PathBuf::from("run.state"));
        assert_eq!(config.tick_interval_ms, 5);
        assert_eq!(config.max_ticks, Some(10));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(build_config(&args(&["--tick-ms", "fast"])).is_err());
        assert!(build_config(&args(&["--checkpoint-every", "0"])).is_err());
    }
}
