//! Configuration loading and parsing

use anyhow::{Context, Result};
use async_call_guard::LockPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Demo configuration (loaded from config.toml, overridden by CLI args)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoConfig {
    /// Input parameter handed to the simulated async library
    #[serde(default = "default_in_param")]
    pub in_param: i32,

    /// Delay before the library fires its callback, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// How long the service stays alive after registering, in milliseconds
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    /// Guard lock policy ("mutex" or "noop")
    #[serde(default)]
    pub lock_policy: LockPolicy,

    /// Which callback flavor the service registers
    #[serde(default)]
    pub flavor: CallbackFlavor,
}

fn default_in_param() -> i32 {
    5
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_hold_ms() -> u64 {
    3000
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            in_param: default_in_param(),
            delay_ms: default_delay_ms(),
            hold_ms: default_hold_ms(),
            lock_policy: LockPolicy::default(),
            flavor: CallbackFlavor::default(),
        }
    }
}

/// The three callable shapes the guard adapts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CallbackFlavor {
    /// Untyped context plus a hand-written `extern "C"` resolver
    Raw,
    /// Method handle through the typed trampoline
    #[default]
    Typed,
    /// Capturing closure through the typed trampoline
    Closure,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<DemoConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: DemoConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
