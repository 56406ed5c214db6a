//! Track CSV loader.
//!
//! Required columns: `kind`, `elapsed_ms`, `lat`, `lon`, `accuracy_m`
//! (accuracy may be empty).
//!
//! Optional columns:
//! - `altitude_m`
//! - `speed_mps` and `bearing_deg` (both or neither)
//! - `recorded_at` (RFC 3339, informational wall clock)
//!
//! Rows must be in non-decreasing `elapsed_ms` order. `#` starts a comment.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use loc_schemas::{Reading, SourceKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TrackRow {
    kind: String,
    elapsed_ms: u64,
    lat: f64,
    lon: f64,
    accuracy_m: Option<f32>,
    #[serde(default)]
    altitude_m: Option<f64>,
    #[serde(default)]
    speed_mps: Option<f32>,
    #[serde(default)]
    bearing_deg: Option<f32>,
    #[serde(default)]
    recorded_at: Option<DateTime<Utc>>,
}

pub fn load_readings_csv(path: impl AsRef<Path>) -> Result<Vec<Reading>> {
    let path = path.as_ref();
    let rdr = reader_builder()
        .from_path(path)
        .with_context(|| format!("open track csv: {}", path.display()))?;
    parse_rows(rdr).with_context(|| format!("track csv: {}", path.display()))
}

/// Same as [`load_readings_csv`], from in-memory text.
pub fn parse_readings_csv(text: &str) -> Result<Vec<Reading>> {
    parse_rows(reader_builder().from_reader(text.as_bytes()))
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut b = csv::ReaderBuilder::new();
    b.trim(csv::Trim::All).comment(Some(b'#'));
    b
}

fn parse_rows<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<Vec<Reading>> {
    let mut out: Vec<Reading> = Vec::new();
    for (i, row) in rdr.deserialize::<TrackRow>().enumerate() {
        // header is line 1
        let line = i + 2;
        let row = row.with_context(|| format!("line {line}"))?;
        out.push(to_reading(row).with_context(|| format!("line {line}"))?);
    }

    for w in out.windows(2) {
        if w[1].elapsed < w[0].elapsed {
            bail!(
                "track not in time order: {}ms after {}ms",
                w[1].elapsed.as_millis(),
                w[0].elapsed.as_millis()
            );
        }
    }
    Ok(out)
}

fn to_reading(row: TrackRow) -> Result<Reading> {
    let kind = SourceKind::parse(&row.kind)?;
    let mut r = Reading::new(kind, row.lat, row.lon, Duration::from_millis(row.elapsed_ms));
    if let Some(acc) = row.accuracy_m {
        r = r.with_accuracy(acc);
    }
    if let Some(alt) = row.altitude_m {
        r = r.with_altitude(alt);
    }
    match (row.speed_mps, row.bearing_deg) {
        (Some(speed), Some(bearing)) => r = r.with_motion(speed, bearing),
        (None, None) => {}
        _ => bail!("speed_mps and bearing_deg must be given together"),
    }
    if let Some(at) = row.recorded_at {
        r = r.with_recorded_at(at);
    }
    Ok(r)
}
