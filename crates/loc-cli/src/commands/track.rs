//! Commands that run the full stack over a recorded track.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use loc_replay::{load_readings_csv, ReplayPlatform};
use loc_runtime::LocationOrchestrator;
use loc_schemas::{LocationError, LocationRequest, Reading, Tier, UpdateParameters};
use serde_json::json;
use tracing::info;

use super::{load_settings, parse_tier, ReplayArgs};

fn orchestrator(args: &ReplayArgs) -> Result<LocationOrchestrator> {
    let (_, settings) = load_settings(&args.config_paths)?;
    let track = load_readings_csv(&args.track)?;
    info!(track = %args.track, readings = track.len(), "track loaded");

    let platform = if args.cold {
        ReplayPlatform::cold(track, args.time_scale)?
    } else {
        ReplayPlatform::with_time_scale(track, args.time_scale)?
    };
    Ok(LocationOrchestrator::from_platform(platform, settings))
}

fn print_reading(via: &str, reading: &Reading) -> Result<()> {
    let line = json!({ "via": via, "reading": reading });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

pub async fn last(args: &ReplayArgs) -> Result<()> {
    let o = orchestrator(args)?;
    let reading = o.get_last_location().await?;
    print_reading("last_known", &reading)
}

pub async fn watch(
    args: &ReplayArgs,
    tier: Option<&str>,
    interval_ms: u64,
    limit: Option<usize>,
) -> Result<()> {
    let o = orchestrator(args)?;
    let tier = match tier {
        Some(raw) => parse_tier(raw)?,
        None => o.settings().default_tier,
    };
    let request = LocationRequest::new(tier, UpdateParameters::new().interval_ms(interval_ms));
    let (mut stream, handle) = o.subscribe_request(&request)?;
    info!(subscription = %stream.id(), %tier, "watching");

    let mut seen = 0usize;
    while limit.map_or(true, |n| seen < n) {
        match stream.next().await {
            Some(Ok(reading)) => {
                print_reading("stream", &reading)?;
                seen += 1;
            }
            Some(Err(e)) => {
                handle.cancel();
                return Err(e).context("subscription ended");
            }
            None => break,
        }
    }
    handle.cancel();
    info!(readings = seen, "watch finished");
    Ok(())
}

/// Last known location; on a cold start, one high accuracy fix bounded by the
/// timeout.
pub async fn locate(args: &ReplayArgs, timeout_ms: Option<u64>) -> Result<()> {
    let o = orchestrator(args)?;
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| o.settings().timeout());

    match o.get_last_location().await {
        Ok(reading) => print_reading("last_known", &reading),
        Err(LocationError::NoLocationAvailable) => {
            info!(?timeout, "no last location, requesting a single fix");
            let reading = single_fix(&o, timeout).await?;
            print_reading("single_update", &reading)
        }
        Err(e) => Err(e.into()),
    }
}

async fn single_fix(o: &LocationOrchestrator, timeout: Duration) -> Result<Reading> {
    let fix = tokio::time::timeout(
        timeout,
        o.single_update(Tier::HighAccuracy, UpdateParameters::new()),
    )
    .await
    .map_err(|_| anyhow!("no fix within {} ms", timeout.as_millis()))??;
    Ok(fix)
}
