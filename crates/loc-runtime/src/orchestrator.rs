use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::StreamExt;
use loc_policy::{best_of, resolve};
use loc_schemas::{LocationError, LocationRequest, Reading, SourceKind, Tier, UpdateParameters};
use loc_source::{CancelHandle, Emitter, LocationPlatform, LocationSource, PlatformSource};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::settings::RuntimeSettings;
use crate::stream::LocationStream;

/// Registered sources, at most one per [`SourceKind`].
pub struct LocationOrchestrator {
    sources: BTreeMap<SourceKind, Arc<dyn LocationSource>>,
    settings: RuntimeSettings,
}

impl LocationOrchestrator {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            sources: BTreeMap::new(),
            settings,
        }
    }

    /// One [`PlatformSource`] per kind the platform reports available now.
    pub fn from_platform(platform: Arc<dyn LocationPlatform>, settings: RuntimeSettings) -> Self {
        let mut orchestrator = Self::new(settings);
        for source in PlatformSource::all_available(platform) {
            orchestrator.register(source);
        }
        orchestrator
    }

    /// Adds `source`, replacing any source of the same kind.
    pub fn register(&mut self, source: Arc<dyn LocationSource>) {
        let kind = source.kind();
        if self.sources.insert(kind, source).is_some() {
            info!(%kind, "source replaced");
        }
    }

    pub fn with_source(mut self, source: Arc<dyn LocationSource>) -> Self {
        self.register(source);
        self
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.keys().copied().collect()
    }

    /// Best cached fix across every registered source.
    ///
    /// Sources are queried concurrently and folded in `SourceKind` order. A
    /// failing source is logged and skipped; only when every source failed is
    /// the first failure returned.
    pub async fn get_last_location(&self) -> Result<Reading, LocationError> {
        let results = join_all(self.sources.values().map(|source| async move {
            (source.kind(), source.fetch_last().await)
        }))
        .await;

        let mut candidates = Vec::new();
        let mut answered = 0usize;
        let mut first_err = None;
        for (kind, result) in results {
            match result {
                Ok(found) => {
                    answered += 1;
                    debug!(%kind, found = found.is_some(), "last known");
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!(%kind, error = %e, "last known lookup failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        if let Some(best) = best_of(candidates, &self.settings.comparator) {
            return Ok(best);
        }
        match first_err {
            Some(err) if answered == 0 => Err(err),
            _ => Err(LocationError::NoLocationAvailable),
        }
    }

    /// Activate every source the tier resolves to and merge their readings.
    ///
    /// Plan errors (`InvalidArgument`) are returned before anything is
    /// activated. The returned handle cancels every activation exactly once;
    /// dropping the stream does the same.
    pub fn subscribe(
        &self,
        tier: Tier,
        params: UpdateParameters,
    ) -> Result<(LocationStream, CancelHandle), LocationError> {
        let plan = resolve(tier, &params, &self.settings.policy)?;
        let id = Uuid::new_v4();
        let handle = CancelHandle::new(format!("subscription {id}"));
        let (tx, rx) = mpsc::unbounded_channel();

        debug!(subscription = %id, %tier, kinds = ?plan.kinds(), "subscribe");
        for (slot, entry) in plan.entries.iter().enumerate() {
            let emitter = Emitter::new(slot, entry.kind, tx.clone());
            let child = match self.sources.get(&entry.kind) {
                Some(source) => source.subscribe(entry.params, emitter),
                None => {
                    let child = emitter.handle();
                    emitter.fail(LocationError::unavailable(
                        entry.kind,
                        "no source registered",
                    ));
                    child
                }
            };
            handle.attach(child);
        }
        {
            let handle_label = handle.label().to_string();
            handle.on_cancel(move || {
                debug!(handle = %handle_label, "subscription torn down");
                Ok(())
            });
        }

        let stream = LocationStream::new(id, plan, rx, handle.clone());
        Ok((stream, handle))
    }

    /// [`subscribe`](Self::subscribe) for a bundled request.
    pub fn subscribe_request(
        &self,
        request: &LocationRequest,
    ) -> Result<(LocationStream, CancelHandle), LocationError> {
        self.subscribe(request.tier, request.params)
    }

    /// First accepted reading for `tier`, then everything is torn down.
    ///
    /// Waits as long as it takes; bound it with `tokio::time::timeout`.
    pub async fn single_update(
        &self,
        tier: Tier,
        params: UpdateParameters,
    ) -> Result<Reading, LocationError> {
        let (mut stream, handle) = self.subscribe(tier, params)?;
        let first = stream.next().await;
        handle.cancel();
        first.unwrap_or(Err(LocationError::NoLocationAvailable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers `fetch_last` with a fixed result and keeps every emitter it is
    /// handed so tests can push into it.
    struct StubSource {
        kind: SourceKind,
        last: Result<Option<Reading>, LocationError>,
        emitters: Mutex<Vec<Emitter>>,
        teardowns: Arc<AtomicUsize>,
    }

    impl StubSource {
        fn new(kind: SourceKind, last: Result<Option<Reading>, LocationError>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                last,
                emitters: Mutex::new(Vec::new()),
                teardowns: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn emitter(&self) -> Emitter {
            self.emitters.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl LocationSource for StubSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn fetch_last(&self) -> Result<Option<Reading>, LocationError> {
            self.last.clone()
        }

        fn subscribe(&self, _params: UpdateParameters, emitter: Emitter) -> CancelHandle {
            let handle = emitter.handle();
            let teardowns = self.teardowns.clone();
            handle.on_cancel(move || {
                teardowns.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            self.emitters.lock().unwrap().push(emitter);
            handle
        }
    }

    fn fix(kind: SourceKind, secs: u64, acc: f32) -> Reading {
        Reading::new(kind, 1.0, 2.0, Duration::from_secs(secs)).with_accuracy(acc)
    }

    fn orchestrator(sources: &[Arc<StubSource>]) -> LocationOrchestrator {
        let mut o = LocationOrchestrator::new(RuntimeSettings::default());
        for s in sources {
            o.register(s.clone());
        }
        o
    }

    #[tokio::test]
    async fn last_location_skips_failures() {
        let network = StubSource::new(SourceKind::Network, Ok(Some(fix(SourceKind::Network, 10, 40.0))));
        let precise = StubSource::new(
            SourceKind::Precise,
            Err(LocationError::unavailable(SourceKind::Precise, "disabled")),
        );
        let got = orchestrator(&[network, precise]).get_last_location().await.unwrap();
        assert_eq!(got.source, SourceKind::Network);
    }

    #[tokio::test]
    async fn last_location_surfaces_error_only_when_all_failed() {
        let precise = StubSource::new(
            SourceKind::Precise,
            Err(LocationError::unavailable(SourceKind::Precise, "disabled")),
        );
        let passive = StubSource::new(SourceKind::Passive, Ok(None));

        let err = orchestrator(&[precise.clone()]).get_last_location().await.unwrap_err();
        assert_eq!(err, LocationError::unavailable(SourceKind::Precise, "disabled"));

        let err = orchestrator(&[precise, passive]).get_last_location().await.unwrap_err();
        assert_eq!(err, LocationError::NoLocationAvailable);
    }

    #[tokio::test]
    async fn no_sources_means_no_location() {
        let err = orchestrator(&[]).get_last_location().await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn invalid_params_fail_before_activation() {
        let precise = StubSource::new(SourceKind::Precise, Ok(None));
        let o = orchestrator(&[precise.clone()]);
        let bad = UpdateParameters::new().min_displacement_m(-1.0);
        assert!(matches!(
            o.subscribe(Tier::HighAccuracy, bad),
            Err(LocationError::InvalidArgument(_))
        ));
        assert!(precise.emitters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_resolves_like_tier_and_params() {
        let precise = StubSource::new(SourceKind::Precise, Ok(None));
        let network = StubSource::new(SourceKind::Network, Ok(None));
        let o = orchestrator(&[precise.clone(), network.clone()]);
        let request = LocationRequest::new(
            Tier::BalancedPowerAccuracy,
            UpdateParameters::new().interval_ms(10_000),
        );
        let (stream, handle) = o.subscribe_request(&request).unwrap();
        assert_eq!(
            stream.plan().kinds(),
            vec![SourceKind::Passive, SourceKind::Network, SourceKind::Precise]
        );
        let precise_params = stream.plan().entry(SourceKind::Precise).unwrap().params;
        assert_eq!(precise_params.min_interval_ms, 30_000);
        assert_eq!(precise.emitters.lock().unwrap().len(), 1);
        handle.cancel();

        let bad = LocationRequest::new(Tier::HighAccuracy, UpdateParameters::new().min_displacement_m(-1.0));
        assert!(matches!(
            o.subscribe_request(&bad),
            Err(LocationError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn missing_source_is_a_failed_slot() {
        let passive = StubSource::new(SourceKind::Passive, Ok(None));
        let o = orchestrator(&[passive.clone()]);
        let (mut stream, _handle) = o
            .subscribe(Tier::LowPower, UpdateParameters::new())
            .unwrap();

        // Network slot failed up front; passive still flows.
        passive.emitter().emit(fix(SourceKind::Passive, 1, 30.0));
        let got = stream.next().await.unwrap().unwrap();
        assert_eq!(got.source, SourceKind::Passive);
        assert_eq!(stream.active_sources(), 1);
    }

    #[tokio::test]
    async fn last_failure_ends_stream_with_error() {
        let precise = StubSource::new(SourceKind::Precise, Ok(None));
        let o = orchestrator(&[precise.clone()]);
        let (mut stream, handle) = o
            .subscribe(Tier::HighAccuracy, UpdateParameters::new())
            .unwrap();

        precise
            .emitter()
            .fail(LocationError::ConnectionFailed("gone".into()));
        assert_eq!(
            stream.next().await,
            Some(Err(LocationError::ConnectionFailed("gone".into())))
        );
        assert_eq!(stream.next().await, None);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_stops_stream_and_tears_down_each_source_once() {
        let passive = StubSource::new(SourceKind::Passive, Ok(None));
        let network = StubSource::new(SourceKind::Network, Ok(None));
        let o = orchestrator(&[passive.clone(), network.clone()]);
        let (mut stream, handle) = o
            .subscribe(Tier::LowPower, UpdateParameters::new())
            .unwrap();

        passive.emitter().emit(fix(SourceKind::Passive, 1, 30.0));
        handle.cancel();
        handle.cancel();

        assert!(!network.emitter().emit(fix(SourceKind::Network, 2, 30.0)));
        assert_eq!(stream.next().await, None);
        drop(stream);
        assert_eq!(passive.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(network.teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_stream_cancels() {
        let passive = StubSource::new(SourceKind::Passive, Ok(None));
        let o = orchestrator(&[passive.clone()]);
        let (stream, handle) = o.subscribe(Tier::NoPower, UpdateParameters::new()).unwrap();
        drop(stream);
        assert!(handle.is_cancelled());
        assert_eq!(passive.teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ceiling_filters_only_precise_entry() {
        let mut settings = RuntimeSettings::default();
        settings.policy.balanced_ceiling_m = Some(50.0);
        let passive = StubSource::new(SourceKind::Passive, Ok(None));
        let precise = StubSource::new(SourceKind::Precise, Ok(None));
        let network = StubSource::new(SourceKind::Network, Ok(None));
        let o = LocationOrchestrator::new(settings)
            .with_source(passive.clone())
            .with_source(network.clone())
            .with_source(precise.clone());
        let (mut stream, _handle) = o
            .subscribe(Tier::BalancedPowerAccuracy, UpdateParameters::new())
            .unwrap();

        precise.emitter().emit(fix(SourceKind::Precise, 1, 80.0));
        passive.emitter().emit(fix(SourceKind::Passive, 2, 500.0));
        precise.emitter().emit(fix(SourceKind::Precise, 3, 10.0));

        let a = stream.next().await.unwrap().unwrap();
        let b = stream.next().await.unwrap().unwrap();
        assert_eq!((a.source, a.accuracy_m), (SourceKind::Passive, Some(500.0)));
        assert_eq!((b.source, b.accuracy_m), (SourceKind::Precise, Some(10.0)));
    }

    #[tokio::test]
    async fn single_update_takes_first_and_tears_down() {
        let precise = StubSource::new(SourceKind::Precise, Ok(None));
        let o = orchestrator(&[precise.clone()]);
        let emitter_source = precise.clone();
        let pusher = tokio::spawn(async move {
            // wait until the subscription exists
            loop {
                if !emitter_source.emitters.lock().unwrap().is_empty() {
                    break;
                }
                tokio::task::yield_now().await;
            }
            let em = emitter_source.emitter();
            em.emit(fix(SourceKind::Precise, 1, 5.0));
            em.emit(fix(SourceKind::Precise, 2, 4.0));
        });

        let got = o
            .single_update(Tier::HighAccuracy, UpdateParameters::new())
            .await
            .unwrap();
        pusher.await.unwrap();
        assert_eq!(got.accuracy_m, Some(5.0));
        assert_eq!(precise.teardowns.load(Ordering::SeqCst), 1);
    }
}
