//! Uniform source contract.
//!
//! This module defines **only** the trait every adapter implements. Concrete
//! adapters live in `platform_source` (connectionless) and `session`
//! (connection-oriented).

use loc_schemas::{LocationError, Reading, SourceKind, UpdateParameters};

use crate::cancel::CancelHandle;
use crate::emitter::Emitter;

/// One underlying location source behind a uniform fetch/subscribe surface.
///
/// Object-safe so the orchestrator can hold `Arc<dyn LocationSource>` per
/// kind; `Send + Sync` because callbacks arrive on arbitrary threads.
#[async_trait::async_trait]
pub trait LocationSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Last fix this source knows about. `Ok(None)` if it never had one.
    /// Must not wait indefinitely.
    async fn fetch_last(&self) -> Result<Option<Reading>, LocationError>;

    /// Start pushing readings into `emitter` using `params`.
    ///
    /// Returns immediately. Failures, including ones detected before any
    /// listener exists, are reported through [`Emitter::fail`]. Each call gets
    /// its own registration; the returned handle releases exactly that one.
    fn subscribe(&self, params: UpdateParameters, emitter: Emitter) -> CancelHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::SourcePayload;
    use std::time::Duration;

    /// Minimal in-process source that replays a fixed list on subscribe.
    struct MockSource {
        last: Option<Reading>,
        burst: Vec<Reading>,
    }

    #[async_trait::async_trait]
    impl LocationSource for MockSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Network
        }

        async fn fetch_last(&self) -> Result<Option<Reading>, LocationError> {
            Ok(self.last.clone())
        }

        fn subscribe(&self, _params: UpdateParameters, emitter: Emitter) -> CancelHandle {
            for r in &self.burst {
                emitter.emit(r.clone());
            }
            emitter.handle()
        }
    }

    fn sample(secs: u64) -> Reading {
        Reading::new(SourceKind::Network, 48.85, 2.35, Duration::from_secs(secs)).with_accuracy(30.0)
    }

    #[tokio::test]
    async fn mock_source_fetch_last() {
        let src: Box<dyn LocationSource> = Box::new(MockSource {
            last: Some(sample(5)),
            burst: vec![],
        });
        assert_eq!(src.fetch_last().await.unwrap(), Some(sample(5)));
    }

    #[test]
    fn mock_source_subscribe_pushes_in_order() {
        let src: Box<dyn LocationSource> = Box::new(MockSource {
            last: None,
            burst: vec![sample(1), sample(2)],
        });
        let (em, mut rx) = Emitter::channel(src.kind());
        let handle = src.subscribe(UpdateParameters::new(), em);

        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let SourcePayload::Reading(r) = ev.payload {
                seen.push(r.elapsed.as_secs());
            }
        }
        assert_eq!(seen, vec![1, 2]);
        handle.cancel();
    }
}
