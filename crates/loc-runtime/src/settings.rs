use std::time::Duration;

use anyhow::{Context, Result};
use loc_config::LoadedConfig;
use loc_policy::{ComparatorConfig, PolicyConfig};
use loc_schemas::Tier;
use serde::Deserialize;

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Everything the orchestrator and its callers read from config.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub comparator: ComparatorConfig,
    pub policy: PolicyConfig,
    /// Tier used when the caller does not name one.
    pub default_tier: Tier,
    /// Caller-side bound for one-shot requests. The orchestrator itself never
    /// times out.
    pub timeout_ms: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            comparator: ComparatorConfig::default(),
            policy: PolicyConfig::default(),
            default_tier: Tier::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuntimeSection {
    default_tier: Option<String>,
    timeout_ms: Option<u64>,
}

impl RuntimeSettings {
    /// Reads `/arbitration`, `/policy` and `/runtime`. Missing keys keep their
    /// defaults.
    pub fn from_config(cfg: &LoadedConfig) -> Result<Self> {
        let comparator: ComparatorConfig = cfg.section("/arbitration")?;
        let policy: PolicyConfig = cfg.section("/policy")?;
        let runtime: RuntimeSection = cfg.section("/runtime")?;

        let default_tier = match runtime.default_tier.as_deref() {
            Some(raw) => Tier::parse(raw).context("runtime.default_tier")?,
            None => Tier::default(),
        };

        Ok(Self {
            comparator,
            policy,
            default_tier,
            timeout_ms: runtime.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loc_config::load_layered_yaml_from_strings;

    #[test]
    fn empty_config_gives_defaults() {
        let s = RuntimeSettings::from_config(&LoadedConfig::empty()).unwrap();
        assert_eq!(s, RuntimeSettings::default());
        assert_eq!(s.default_tier, Tier::BalancedPowerAccuracy);
        assert_eq!(s.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn reads_every_documented_key() {
        let cfg = load_layered_yaml_from_strings(&[r#"
arbitration:
  freshness_threshold_ms: 10000
policy:
  precise_interval_floor_ms: 60000
  balanced_interval_multiplier: 4
  high_accuracy_ceiling_m: 25.0
runtime:
  default_tier: high
  timeout_ms: 750
"#])
        .unwrap();
        let s = RuntimeSettings::from_config(&cfg).unwrap();
        assert_eq!(s.comparator.freshness_threshold_ms, 10_000);
        assert_eq!(s.policy.precise_interval_floor_ms, 60_000);
        assert_eq!(s.policy.balanced_interval_multiplier, 4);
        assert_eq!(s.policy.high_accuracy_ceiling_m, Some(25.0));
        assert_eq!(s.policy.balanced_ceiling_m, None);
        assert_eq!(s.default_tier, Tier::HighAccuracy);
        assert_eq!(s.timeout_ms, 750);
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let cfg = load_layered_yaml_from_strings(&["runtime:\n  default_tier: turbo\n"]).unwrap();
        let err = RuntimeSettings::from_config(&cfg).unwrap_err();
        assert!(format!("{err:#}").contains("runtime.default_tier"));
    }
}
