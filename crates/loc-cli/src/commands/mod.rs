//! Command handler modules for the `loc` binary.
//!
//! Shared helpers live here; command-specific logic lives in the submodules.

pub mod plan;
pub mod track;

use anyhow::{Context, Result};
use clap::Args;
use loc_config::{report_unused_keys, LoadedConfig, UnusedKeyPolicy};
use loc_runtime::RuntimeSettings;
use loc_schemas::Tier;
use tracing::{info, warn};

/// Inputs shared by every command that replays a recorded track.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// CSV track: kind,elapsed_ms,lat,lon,accuracy_m
    #[arg(long)]
    pub track: String,

    /// Multiplier on recorded spacing (0 to 1000); 0 replays without delay
    #[arg(long, default_value_t = 1.0, value_parser = parse_time_scale)]
    pub time_scale: f64,

    /// Start with no cached fixes
    #[arg(long, default_value_t = false)]
    pub cold: bool,

    /// Layered config paths in merge order (default: $LOC_CONFIG)
    #[arg(long = "config")]
    pub config_paths: Vec<String>,
}

/// Explicit paths win over `LOC_CONFIG`. Unused keys are logged, not fatal.
pub fn load_settings(config_paths: &[String]) -> Result<(LoadedConfig, RuntimeSettings)> {
    let loaded = if config_paths.is_empty() {
        loc_config::load_from_env()?
    } else {
        loc_config::load_layered_yaml(config_paths)?
    };

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for pointer in &report.unused_leaf_pointers {
        warn!(key = %pointer, "config key not used");
    }

    let settings = RuntimeSettings::from_config(&loaded).context("invalid runtime settings")?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    Ok((loaded, settings))
}

/// Tier names or numeric priority codes (`100`, `102`, ...).
pub fn parse_tier(raw: &str) -> Result<Tier> {
    let raw = raw.trim();
    let tier = match raw.parse::<i32>() {
        Ok(code) => Tier::from_code(code)?,
        Err(_) => Tier::parse(raw)?,
    };
    Ok(tier)
}

fn parse_time_scale(raw: &str) -> Result<f64, String> {
    let scale: f64 = raw.trim().parse().map_err(|e| format!("{e}"))?;
    loc_replay::check_time_scale(scale).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_from_name_or_code() {
        assert_eq!(parse_tier("high").unwrap(), Tier::HighAccuracy);
        assert_eq!(parse_tier(" 104 ").unwrap(), Tier::LowPower);
        assert!(parse_tier("101").is_err());
        assert!(parse_tier("turbo").is_err());
    }

    #[test]
    fn time_scale_is_bounded() {
        assert_eq!(parse_time_scale("0").unwrap(), 0.0);
        assert_eq!(parse_time_scale(" 2.5 ").unwrap(), 2.5);
        assert!(parse_time_scale("1e300").is_err());
        assert!(parse_time_scale("-1").is_err());
        assert!(parse_time_scale("NaN").is_err());
        assert!(parse_time_scale("fast").is_err());
    }
}
