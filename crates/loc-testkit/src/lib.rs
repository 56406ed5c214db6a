//! Fakes and fixtures for exercising the location stack without a real
//! platform.

use std::time::Duration;

use anyhow::{bail, Result};
use loc_schemas::{Reading, SourceKind};

mod fake_platform;
mod fake_session;

pub use fake_platform::FakePlatform;
pub use fake_session::{FakeSessionClient, FakeSessionConnector, ScriptedOutcome};

/// Reading without accuracy. Coordinates are derived from `elapsed_ms` so
/// distinct fixes compare unequal.
pub fn reading(kind: SourceKind, elapsed_ms: u64) -> Reading {
    let step = elapsed_ms as f64 / 1_000_000.0;
    Reading::new(kind, 52.0 + step, 13.0 + step, Duration::from_millis(elapsed_ms))
}

pub fn reading_with_accuracy(kind: SourceKind, elapsed_ms: u64, accuracy_m: f32) -> Reading {
    reading(kind, elapsed_ms).with_accuracy(accuracy_m)
}

/// Poll `cond` until it holds, yielding to the runtime in between. Fails after
/// `limit` of runtime time.
pub async fn eventually<F>(limit: Duration, mut cond: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let waited = tokio::time::timeout(limit, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if waited.is_err() {
        bail!("condition not reached within {limit:?}");
    }
    Ok(())
}
