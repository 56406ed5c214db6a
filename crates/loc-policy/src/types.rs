use std::time::Duration;

use loc_schemas::{Reading, SourceKind, UpdateParameters};
use serde::{Deserialize, Serialize};

/// Freshness threshold used when nothing else is configured.
pub const DEFAULT_FRESHNESS_THRESHOLD_MS: u64 = 30_000;
/// Lower bound for the precise source interval under the balanced tier.
pub const DEFAULT_PRECISE_INTERVAL_FLOOR_MS: u64 = 30_000;
pub const DEFAULT_BALANCED_INTERVAL_MULTIPLIER: u64 = 2;

/// Knobs for [`crate::is_better`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// A candidate newer than the held reading by more than this wins on
    /// recency alone.
    pub freshness_threshold_ms: u64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            freshness_threshold_ms: DEFAULT_FRESHNESS_THRESHOLD_MS,
        }
    }
}

impl ComparatorConfig {
    pub fn freshness_threshold(&self) -> Duration {
        Duration::from_millis(self.freshness_threshold_ms)
    }
}

/// Knobs for [`crate::resolve`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Balanced tier: precise interval = max(floor, requested * multiplier).
    pub precise_interval_floor_ms: u64,
    pub balanced_interval_multiplier: u64,
    /// Drop precise readings less accurate than this under the high accuracy tier.
    pub high_accuracy_ceiling_m: Option<f32>,
    /// Same, for the balanced tier.
    pub balanced_ceiling_m: Option<f32>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            precise_interval_floor_ms: DEFAULT_PRECISE_INTERVAL_FLOOR_MS,
            balanced_interval_multiplier: DEFAULT_BALANCED_INTERVAL_MULTIPLIER,
            high_accuracy_ceiling_m: None,
            balanced_ceiling_m: None,
        }
    }
}

/// One source to activate, with the parameters it should be registered with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivationEntry {
    pub kind: SourceKind,
    pub params: UpdateParameters,
    /// Readings from this entry with a larger accuracy radius are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_ceiling_m: Option<f32>,
}

impl ActivationEntry {
    pub fn new(kind: SourceKind, params: UpdateParameters) -> Self {
        Self {
            kind,
            params,
            accuracy_ceiling_m: None,
        }
    }

    /// Sink-side filter. A reading without an accuracy value is never rejected
    /// by a ceiling.
    pub fn accepts(&self, reading: &Reading) -> bool {
        match (self.accuracy_ceiling_m, reading.accuracy_m) {
            (Some(ceiling), Some(acc)) => acc <= ceiling,
            _ => true,
        }
    }
}

/// Ordered set of sources a tier resolves to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivationPlan {
    pub entries: Vec<ActivationEntry>,
}

impl ActivationPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    pub fn entry(&self, kind: SourceKind) -> Option<&ActivationEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }
}
