//! loc-schemas
//!
//! Shared value types for the location workspace: readings, source kinds,
//! power tiers, update parameters and the error taxonomy every other crate
//! reports through.
//!
//! No I/O and no async here. Everything is a plain value that can be cloned
//! across callback threads.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// Identity of an underlying location source.
///
/// The derived `Ord` is the stable enumeration order used when every source is
/// queried (e.g. last-known lookups fold in this order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Satellite fix. Highest power, best accuracy.
    Precise,
    /// Cell / wifi derived fix. Medium power.
    Network,
    /// Piggybacks on fixes requested by others. Zero power.
    Passive,
    /// Connection-oriented fused service; needs a live session before data flows.
    Fused,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Precise,
        SourceKind::Network,
        SourceKind::Passive,
        SourceKind::Fused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Precise => "precise",
            SourceKind::Network => "network",
            SourceKind::Passive => "passive",
            SourceKind::Fused => "fused",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LocationError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "precise" | "gps" => Ok(SourceKind::Precise),
            "network" => Ok(SourceKind::Network),
            "passive" => Ok(SourceKind::Passive),
            "fused" => Ok(SourceKind::Fused),
            other => Err(LocationError::InvalidArgument(format!(
                "unknown source kind '{other}'. expected one of: precise | network | passive | fused"
            ))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One location fix.
///
/// `elapsed` is taken from a monotonic clock (time since an arbitrary boot
/// epoch). It is the only timestamp arbitration looks at; `recorded_at_utc` is
/// informational and may be skewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in metres. `None` means the source did not report one.
    pub accuracy_m: Option<f32>,
    /// Monotonic capture time.
    #[serde(with = "elapsed_millis")]
    pub elapsed: Duration,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing_deg: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at_utc: Option<DateTime<Utc>>,
}

impl Reading {
    /// Minimal reading: coordinate, monotonic capture time and source.
    pub fn new(source: SourceKind, latitude: f64, longitude: f64, elapsed: Duration) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
            elapsed,
            source,
            altitude_m: None,
            speed_mps: None,
            bearing_deg: None,
            recorded_at_utc: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f32) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn with_motion(mut self, speed_mps: f32, bearing_deg: f32) -> Self {
        self.speed_mps = Some(speed_mps);
        self.bearing_deg = Some(bearing_deg);
        self
    }

    pub fn with_recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at_utc = Some(at);
        self
    }

    pub fn has_accuracy(&self) -> bool {
        self.accuracy_m.is_some()
    }
}

mod elapsed_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Abstract power/accuracy preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    HighAccuracy,
    #[default]
    BalancedPowerAccuracy,
    LowPower,
    NoPower,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::HighAccuracy => "high_accuracy",
            Tier::BalancedPowerAccuracy => "balanced_power_accuracy",
            Tier::LowPower => "low_power",
            Tier::NoPower => "no_power",
        }
    }

    /// Numeric priority code used on the wire by fused location services.
    pub fn code(&self) -> i32 {
        match self {
            Tier::HighAccuracy => 100,
            Tier::BalancedPowerAccuracy => 102,
            Tier::LowPower => 104,
            Tier::NoPower => 105,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, LocationError> {
        match code {
            100 => Ok(Tier::HighAccuracy),
            102 => Ok(Tier::BalancedPowerAccuracy),
            104 => Ok(Tier::LowPower),
            105 => Ok(Tier::NoPower),
            other => Err(LocationError::InvalidArgument(format!(
                "unsupported priority - {other}"
            ))),
        }
    }

    pub fn parse(s: &str) -> Result<Self, LocationError> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "high" | "high_accuracy" => Ok(Tier::HighAccuracy),
            "balanced" | "balanced_power_accuracy" => Ok(Tier::BalancedPowerAccuracy),
            "low" | "low_power" => Ok(Tier::LowPower),
            "none" | "no_power" => Ok(Tier::NoPower),
            other => Err(LocationError::InvalidArgument(format!(
                "invalid tier '{other}'. expected one of: high | balanced | low | none"
            ))),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// UpdateParameters
// ---------------------------------------------------------------------------

/// Listener parameters handed to whichever sources a tier activates.
///
/// Adapters pass these through opaquely; the policy may widen the interval for
/// individual sources.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateParameters {
    pub min_interval_ms: u64,
    pub fastest_interval_ms: u64,
    pub max_wait_ms: u64,
    pub min_displacement_m: f32,
}

impl UpdateParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval_ms(mut self, ms: u64) -> Self {
        self.min_interval_ms = ms;
        self
    }

    pub fn fastest_interval_ms(mut self, ms: u64) -> Self {
        self.fastest_interval_ms = ms;
        self
    }

    pub fn max_wait_ms(mut self, ms: u64) -> Self {
        self.max_wait_ms = ms;
        self
    }

    pub fn min_displacement_m(mut self, m: f32) -> Self {
        self.min_displacement_m = m;
        self
    }

    /// Reject parameters no source could honour.
    pub fn validate(&self) -> Result<(), LocationError> {
        if !self.min_displacement_m.is_finite() || self.min_displacement_m < 0.0 {
            return Err(LocationError::InvalidArgument(format!(
                "min_displacement_m must be a finite non-negative number, got {}",
                self.min_displacement_m
            )));
        }
        if self.min_interval_ms > 0 && self.fastest_interval_ms > self.min_interval_ms {
            return Err(LocationError::InvalidArgument(format!(
                "fastest_interval_ms ({}) exceeds min_interval_ms ({})",
                self.fastest_interval_ms, self.min_interval_ms
            )));
        }
        Ok(())
    }
}

/// A tier plus the parameters requested for it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationRequest {
    pub tier: Tier,
    pub params: UpdateParameters,
}

impl LocationRequest {
    pub fn new(tier: Tier, params: UpdateParameters) -> Self {
        Self { tier, params }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Every failure a location operation can surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// No queried source had a last-known reading.
    NoLocationAvailable,
    /// Unknown tier or malformed parameters. Raised before anything is activated.
    InvalidArgument(String),
    /// A session-backed source could not establish its connection.
    ConnectionFailed(String),
    /// A session-backed source lost its connection.
    ConnectionSuspended(String),
    /// The requested source is missing or disabled on this platform.
    SourceUnavailable { kind: SourceKind, reason: String },
}

impl LocationError {
    /// `true` for errors a caller can sensibly recover from by trying another
    /// acquisition path (e.g. falling back to a fresh update).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LocationError::NoLocationAvailable)
    }

    pub fn unavailable(kind: SourceKind, reason: impl Into<String>) -> Self {
        LocationError::SourceUnavailable {
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::NoLocationAvailable => write!(f, "no last location available"),
            LocationError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            LocationError::ConnectionFailed(msg) => write!(f, "connection failed: {msg}"),
            LocationError::ConnectionSuspended(msg) => write!(f, "connection suspended: {msg}"),
            LocationError::SourceUnavailable { kind, reason } => {
                write!(f, "source {kind} unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for LocationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
