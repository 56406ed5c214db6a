//! Connectionless adapter over [`LocationPlatform`].

use std::sync::Arc;

use loc_schemas::{LocationError, Reading, SourceKind, UpdateParameters};
use tracing::{debug, warn};

use crate::cancel::CancelHandle;
use crate::emitter::Emitter;
use crate::platform::{LocationPlatform, ReadingCallback};
use crate::source::LocationSource;

/// One source kind of the platform service.
///
/// Registration is driven on the ambient tokio runtime. A cancel that lands
/// while registration is still pending is applied as soon as the platform
/// hands back its token.
pub struct PlatformSource {
    kind: SourceKind,
    platform: Arc<dyn LocationPlatform>,
}

impl PlatformSource {
    pub fn new(kind: SourceKind, platform: Arc<dyn LocationPlatform>) -> Self {
        Self { kind, platform }
    }

    /// One adapter per kind the platform currently reports.
    pub fn all_available(platform: Arc<dyn LocationPlatform>) -> Vec<Arc<dyn LocationSource>> {
        platform
            .available_kinds()
            .into_iter()
            .map(|kind| {
                Arc::new(PlatformSource::new(kind, Arc::clone(&platform))) as Arc<dyn LocationSource>
            })
            .collect()
    }

    fn ensure_available(&self) -> Result<(), LocationError> {
        if self.platform.available_kinds().contains(&self.kind) {
            Ok(())
        } else {
            Err(LocationError::unavailable(
                self.kind,
                "not present or disabled on this platform",
            ))
        }
    }
}

#[async_trait::async_trait]
impl LocationSource for PlatformSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_last(&self) -> Result<Option<Reading>, LocationError> {
        self.ensure_available()?;
        self.platform
            .last_known(self.kind)
            .map_err(|e| LocationError::unavailable(self.kind, format!("{e:#}")))
    }

    fn subscribe(&self, params: UpdateParameters, emitter: Emitter) -> CancelHandle {
        let handle = emitter.handle();

        if let Err(e) = self.ensure_available() {
            emitter.fail(e);
            return handle;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(_) => {
                emitter.fail(LocationError::unavailable(
                    self.kind,
                    "subscribe requires a tokio runtime",
                ));
                return handle;
            }
        };

        let kind = self.kind;
        let platform = Arc::clone(&self.platform);
        let guard = handle.clone();
        runtime.spawn(async move {
            let sink = emitter.clone();
            let on_reading: ReadingCallback = Arc::new(move |reading| {
                sink.emit(reading);
            });

            match platform.register_listener(kind, params, on_reading).await {
                Ok(token) => {
                    debug!(%kind, token = token.0, "listener registered");
                    // Runs right away if the caller already cancelled.
                    guard.on_cancel(move || {
                        platform.unregister_listener(token);
                        debug!(%kind, token = token.0, "listener removed");
                        Ok(())
                    });
                }
                Err(e) => {
                    warn!(%kind, error = %format!("{e:#}"), "listener registration failed");
                    emitter.fail(LocationError::unavailable(kind, format!("{e:#}")));
                }
            }
        });

        handle
    }
}
