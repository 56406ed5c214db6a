//! Layered YAML configuration.
//!
//! Documents are merged in order (later layers override earlier ones) into a
//! single JSON value, serialized canonically and hashed with SHA-256 so a run
//! can record exactly which settings it used. Sections are pulled out by JSON
//! pointer into typed structs owned by the consuming crate.

mod consumption;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub use consumption::{
    consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport,
};

/// Environment variable naming config layers, separated by `,`.
pub const CONFIG_ENV_VAR: &str = "LOC_CONFIG";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Empty config: every section falls back to its defaults.
    pub fn empty() -> Self {
        // an empty object always serializes
        let canonical_json = "{}".to_string();
        Self {
            config_hash: sha256_hex(canonical_json.as_bytes()),
            canonical_json,
            config_json: Value::Object(Default::default()),
        }
    }

    /// Deserialize the subtree at `pointer` (e.g. `/policy`). A missing or null
    /// subtree yields `T::default()`.
    pub fn section<T>(&self, pointer: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.config_json.pointer(pointer) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(v) => serde_json::from_value(v.clone())
                .with_context(|| format!("invalid config section {pointer}")),
        }
    }

    /// Leaf value at `pointer`, if present and not null.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.config_json.pointer(pointer).filter(|v| !v.is_null())
    }
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p)
            .with_context(|| format!("failed to read yaml path: {}", p.display()))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Layers named by [`CONFIG_ENV_VAR`], or an empty config when it is unset.
pub fn load_from_env() -> Result<LoadedConfig> {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(raw) if !raw.trim().is_empty() => {
            let paths: Vec<&str> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            load_layered_yaml(&paths).with_context(|| format!("{CONFIG_ENV_VAR}={raw}"))
        }
        _ => Ok(LoadedConfig::empty()),
    }
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // an empty document parses as null; treat it as an empty layer
        if v_json.is_null() {
            continue;
        }
        if !v_json.is_object() {
            bail!("config layer must be a mapping at the top level");
        }
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json's default Map is ordered by key, so this is stable across
    // layer and key ordering.
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Arb {
        freshness_threshold_ms: u64,
    }

    #[test]
    fn later_layers_override_earlier() {
        let cfg = load_layered_yaml_from_strings(&[
            "arbitration:\n  freshness_threshold_ms: 1000\npolicy:\n  balanced_interval_multiplier: 3\n",
            "arbitration:\n  freshness_threshold_ms: 5000\n",
        ])
        .unwrap();
        let arb: Arb = cfg.section("/arbitration").unwrap();
        assert_eq!(arb.freshness_threshold_ms, 5000);
        assert_eq!(
            cfg.get("/policy/balanced_interval_multiplier"),
            Some(&serde_json::json!(3))
        );
    }

    #[test]
    fn missing_section_is_default() {
        let cfg = load_layered_yaml_from_strings(&["runtime:\n  timeout_ms: 10\n"]).unwrap();
        let arb: Arb = cfg.section("/arbitration").unwrap();
        assert_eq!(arb, Arb::default());
    }

    #[test]
    fn mistyped_section_is_an_error() {
        let cfg =
            load_layered_yaml_from_strings(&["arbitration:\n  freshness_threshold_ms: soon\n"])
                .unwrap();
        let err = cfg.section::<Arb>("/arbitration").unwrap_err();
        assert!(format!("{err:#}").contains("/arbitration"));
    }

    #[test]
    fn empty_layers_hash_like_empty_config() {
        let cfg = load_layered_yaml_from_strings(&["", "{}"]).unwrap();
        assert_eq!(cfg.config_hash, LoadedConfig::empty().config_hash);
    }

    #[test]
    fn scalar_top_level_rejected() {
        assert!(load_layered_yaml_from_strings(&["42"]).is_err());
    }
}
