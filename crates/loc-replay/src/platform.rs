use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use loc_schemas::{Reading, SourceKind, UpdateParameters};
use loc_source::{ListenerToken, LocationPlatform, ReadingCallback};
use tracing::{debug, warn};

/// Largest accepted playback slowdown.
pub const MAX_TIME_SCALE: f64 = 1_000.0;

/// Accepts `0.0..=MAX_TIME_SCALE`; `0.0` plays back without delay.
pub fn check_time_scale(time_scale: f64) -> Result<f64> {
    if !time_scale.is_finite() || !(0.0..=MAX_TIME_SCALE).contains(&time_scale) {
        bail!("time scale must be within 0..={MAX_TIME_SCALE}, got {time_scale}");
    }
    Ok(time_scale)
}

/// Plays a recorded track into registered listeners.
///
/// Each listener gets the readings of its kind in recorded order, spaced by
/// the recorded `elapsed` gaps multiplied by the time scale.
///
/// `last_known(kind)` is the final reading of that kind in the track, as if
/// the recording had already happened. A cold platform instead only knows
/// what it has played so far, so it starts with no cached fix at all.
pub struct ReplayPlatform {
    track: Arc<Vec<Reading>>,
    time_scale: f64,
    cold: bool,
    next_token: AtomicU64,
    live: Arc<Mutex<HashSet<ListenerToken>>>,
    played: Arc<Mutex<BTreeMap<SourceKind, Reading>>>,
}

impl ReplayPlatform {
    pub fn new(track: Vec<Reading>) -> Arc<Self> {
        Self::build(track, 1.0, false)
    }

    pub fn with_time_scale(track: Vec<Reading>, time_scale: f64) -> Result<Arc<Self>> {
        Ok(Self::build(track, check_time_scale(time_scale)?, false))
    }

    /// No cached fixes until something has been played.
    pub fn cold(track: Vec<Reading>, time_scale: f64) -> Result<Arc<Self>> {
        Ok(Self::build(track, check_time_scale(time_scale)?, true))
    }

    fn build(track: Vec<Reading>, time_scale: f64, cold: bool) -> Arc<Self> {
        Arc::new(Self {
            track: Arc::new(track),
            time_scale,
            cold,
            next_token: AtomicU64::new(1),
            live: Arc::new(Mutex::new(HashSet::new())),
            played: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    pub fn track(&self) -> &[Reading] {
        &self.track
    }

    pub fn live_listeners(&self) -> usize {
        lock(&self.live).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `None` when the scaled gap is not representable.
fn scaled_gap(gap: Duration, scale: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(gap.as_secs_f64() * scale).ok()
}

#[async_trait::async_trait]
impl LocationPlatform for ReplayPlatform {
    fn available_kinds(&self) -> BTreeSet<SourceKind> {
        self.track.iter().map(|r| r.source).collect()
    }

    fn last_known(&self, kind: SourceKind) -> Result<Option<Reading>> {
        if self.cold {
            return Ok(lock(&self.played).get(&kind).cloned());
        }
        Ok(self.track.iter().rev().find(|r| r.source == kind).cloned())
    }

    async fn register_listener(
        &self,
        kind: SourceKind,
        _params: UpdateParameters,
        on_reading: ReadingCallback,
    ) -> Result<ListenerToken> {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        lock(&self.live).insert(token);

        let track = Arc::clone(&self.track);
        let live = Arc::clone(&self.live);
        let played = Arc::clone(&self.played);
        let scale = self.time_scale;
        tokio::spawn(async move {
            let mut prev: Option<Duration> = None;
            for r in track.iter().filter(|r| r.source == kind) {
                if let Some(prev) = prev {
                    let raw = r.elapsed.saturating_sub(prev);
                    let Some(gap) = scaled_gap(raw, scale) else {
                        warn!(%kind, token = token.0, ?raw, scale, "replay gap out of range, stopping");
                        lock(&live).remove(&token);
                        return;
                    };
                    if !gap.is_zero() {
                        tokio::time::sleep(gap).await;
                    }
                }
                prev = Some(r.elapsed);
                if !lock(&live).contains(&token) {
                    debug!(%kind, token = token.0, "replay stopped");
                    return;
                }
                lock(&played).insert(kind, r.clone());
                on_reading(r.clone());
            }
            debug!(%kind, token = token.0, "replay finished");
        });

        Ok(token)
    }

    fn unregister_listener(&self, token: ListenerToken) {
        lock(&self.live).remove(&token);
    }
}
