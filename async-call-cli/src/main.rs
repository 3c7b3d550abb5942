//! Async Call Guard Demo CLI
//!
//! Exercises the callback lifetime guard against a simulated third-party
//! async library:
//! - The service registers a callback and stays alive past the delivery
//!   delay (`--hold-ms` > `--delay-ms`): the callback reaches it.
//! - The service is dropped before the delivery delay elapses
//!   (`--hold-ms` < `--delay-ms`): the late callback reports "no owner"
//!   instead of touching freed memory.

use anyhow::Result;
use async_call_guard::LockPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

mod config;
mod extlib;
mod service;

use config::{CallbackFlavor, DemoConfig};
use service::SafeService;

/// Async Call Guard - demo of lifetime-safe C callback delivery
#[derive(Parser, Debug)]
#[command(name = "async-call-cli")]
#[command(about = "Exercise the async callback lifetime guard", long_about = None)]
#[command(version)]
struct Args {
    /// Input parameter handed to the simulated async library
    #[arg(short, long, value_name = "N")]
    param: Option<i32>,

    /// Delay before the library fires its callback, in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// How long the service stays alive after registering, in milliseconds
    #[arg(long, value_name = "MS")]
    hold_ms: Option<u64>,

    /// Guard lock policy ("mutex" or "noop")
    #[arg(long)]
    policy: Option<LockPolicy>,

    /// Callback flavor the service registers
    #[arg(long, value_enum)]
    flavor: Option<CallbackFlavor>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("async-call-cli v{}", env!("CARGO_PKG_VERSION"));
    log::info!("using guard library v{}", async_call_guard::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => DemoConfig::default(),
    };

    // CLI arguments override the config file.
    if let Some(param) = args.param {
        config.in_param = param;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.delay_ms = delay_ms;
    }
    if let Some(hold_ms) = args.hold_ms {
        config.hold_ms = hold_ms;
    }
    if let Some(policy) = args.policy {
        config.lock_policy = policy;
    }
    if let Some(flavor) = args.flavor {
        config.flavor = flavor;
    }

    run_scenario(&config)
}

/// Create the service, register the callback, hold, drop, drain.
fn run_scenario(config: &DemoConfig) -> Result<()> {
    println!("═══════════════════════════════════════════════");
    println!("  Async Call Guard - Demo");
    println!("═══════════════════════════════════════════════\n");
    println!(
        "  param: {}   delay: {}ms   hold: {}ms",
        config.in_param, config.delay_ms, config.hold_ms
    );
    println!(
        "  lock policy: {}   flavor: {:?}\n",
        config.lock_policy, config.flavor
    );

    if config.lock_policy == LockPolicy::Noop && config.hold_ms <= config.delay_ms {
        log::warn!(
            "noop policy with threaded delivery: keep hold_ms above delay_ms \
             so destruction cannot race the callback"
        );
    }

    let service = SafeService::new(config.in_param, config.lock_policy);
    let pending = service.execute(config.flavor, Duration::from_millis(config.delay_ms));

    thread::sleep(Duration::from_millis(config.hold_ms));

    if config.hold_ms < config.delay_ms {
        println!("dropping service before the callback fires ...");
    } else {
        println!("dropping service after the callback fired ...");
    }
    drop(service);

    // Drain the in-flight callback so the outcome is visible before exit.
    pending
        .join()
        .map_err(|_| anyhow::anyhow!("async worker thread panicked"))?;

    println!("\n✓ scenario complete");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new().filter_level(level).format_timestamp(None).init();
}
