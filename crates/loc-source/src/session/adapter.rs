use std::sync::{Arc, Mutex, Weak};

use loc_schemas::{LocationError, Reading, SourceKind, UpdateParameters};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::state::{SessionEvent, SessionState, TransitionError};
use super::{SessionCallbacks, SessionClient, SessionConnector};
use crate::cancel::CancelHandle;
use crate::emitter::Emitter;
use crate::platform::ReadingCallback;
use crate::source::LocationSource;

/// One connect attempt against the service, with its state.
pub struct Session {
    client: Arc<dyn SessionClient>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(client: Arc<dyn SessionClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            state: Mutex::new(SessionState::Idle),
        })
    }

    pub fn state(&self) -> SessionState {
        *self.lock()
    }

    pub fn client(&self) -> &Arc<dyn SessionClient> {
        &self.client
    }

    pub fn transition(&self, event: SessionEvent) -> Result<SessionState, TransitionError> {
        let mut state = self.lock();
        let next = state.apply(event)?;
        *state = next;
        Ok(next)
    }

    /// Idle → Connecting, then hand the callbacks to the service.
    pub fn connect(&self, callbacks: SessionCallbacks) -> Result<(), TransitionError> {
        self.transition(SessionEvent::Connect)?;
        // lock released: callbacks may fire inside connect()
        self.client.connect(callbacks);
        Ok(())
    }

    /// Disconnect if connected or connecting; otherwise nothing. Returns
    /// whether a disconnect was issued.
    pub fn teardown(&self) -> bool {
        let was_live = {
            let mut state = self.lock();
            let live = state.is_live();
            if let Ok(next) = state.apply(SessionEvent::Disconnect) {
                *state = next;
            }
            live
        };
        if was_live || self.client.is_connected() || self.client.is_connecting() {
            self.client.disconnect();
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct TeardownOnDrop(Arc<Session>);

impl Drop for TeardownOnDrop {
    fn drop(&mut self) {
        self.0.teardown();
    }
}

type Reply = Arc<Mutex<Option<oneshot::Sender<Result<Option<Reading>, LocationError>>>>>;

fn reply(slot: &Reply, value: Result<Option<Reading>, LocationError>) {
    let sender = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(tx) = sender {
        let _ = tx.send(value);
    }
}

/// Adapter for a connection-oriented service.
///
/// Every `fetch_last` / `subscribe` opens its own session; nothing is pooled.
/// There is no automatic reconnect: a failed or suspended session ends that
/// call with `ConnectionFailed` / `ConnectionSuspended`.
pub struct SessionSource {
    kind: SourceKind,
    connector: Arc<dyn SessionConnector>,
}

impl SessionSource {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self::with_kind(SourceKind::Fused, connector)
    }

    /// Serve a different kind slot (e.g. route `Precise` through the session
    /// service).
    pub fn with_kind(kind: SourceKind, connector: Arc<dyn SessionConnector>) -> Self {
        Self { kind, connector }
    }

    fn fetch_callbacks(&self, session: &Arc<Session>, slot: Reply) -> SessionCallbacks {
        let kind = self.kind;
        let weak: Weak<Session> = Arc::downgrade(session);

        let on_connected = {
            let (weak, slot) = (weak.clone(), Arc::clone(&slot));
            Box::new(move || {
                let Some(session) = weak.upgrade() else { return };
                if let Err(e) = session.transition(SessionEvent::Connected) {
                    debug!(%kind, error = %e, "connected callback ignored");
                    return;
                }
                let result = session
                    .client()
                    .last_location()
                    .map_err(|e| LocationError::unavailable(kind, format!("{e:#}")));
                reply(&slot, result);
            })
        };
        let on_failed = {
            let (weak, slot) = (weak.clone(), Arc::clone(&slot));
            Box::new(move |reason: String| {
                if let Some(session) = weak.upgrade() {
                    let _ = session.transition(SessionEvent::ConnectFailed);
                }
                reply(&slot, Err(LocationError::ConnectionFailed(reason)));
            })
        };
        let on_suspended = Box::new(move |cause: i32| {
            if let Some(session) = weak.upgrade() {
                let _ = session.transition(SessionEvent::Suspended);
            }
            reply(
                &slot,
                Err(LocationError::ConnectionSuspended(format!("cause {cause}"))),
            );
        });

        SessionCallbacks {
            on_connected,
            on_failed,
            on_suspended,
        }
    }

    fn stream_callbacks(
        &self,
        session: &Arc<Session>,
        params: UpdateParameters,
        emitter: &Emitter,
    ) -> SessionCallbacks {
        let kind = self.kind;
        let weak: Weak<Session> = Arc::downgrade(session);

        let on_connected = {
            let (weak, emitter) = (weak.clone(), emitter.clone());
            Box::new(move || {
                let Some(session) = weak.upgrade() else { return };
                let handle = emitter.handle();
                if handle.is_cancelled() {
                    // teardown already ran or is running; nothing to register
                    debug!(%kind, "connected after cancel");
                    return;
                }
                if let Err(e) = session.transition(SessionEvent::Connected) {
                    debug!(%kind, error = %e, "connected callback ignored");
                    return;
                }

                let sink = emitter.clone();
                let on_reading: ReadingCallback = Arc::new(move |reading| {
                    sink.emit(reading);
                });
                match session.client().request_updates(&params, on_reading) {
                    Ok(token) => {
                        let client = Arc::clone(session.client());
                        handle.on_cancel(move || {
                            client.remove_updates(token);
                            Ok(())
                        });
                    }
                    Err(e) => {
                        warn!(%kind, error = %format!("{e:#}"), "request_updates failed");
                        emitter.fail(LocationError::unavailable(kind, format!("{e:#}")));
                    }
                }
            })
        };
        let on_failed = {
            let (weak, emitter) = (weak.clone(), emitter.clone());
            Box::new(move |reason: String| {
                if let Some(session) = weak.upgrade() {
                    let _ = session.transition(SessionEvent::ConnectFailed);
                }
                emitter.fail(LocationError::ConnectionFailed(reason));
            })
        };
        let on_suspended = {
            let emitter = emitter.clone();
            Box::new(move |cause: i32| {
                if let Some(session) = weak.upgrade() {
                    let _ = session.transition(SessionEvent::Suspended);
                }
                emitter.fail(LocationError::ConnectionSuspended(format!("cause {cause}")));
            })
        };

        SessionCallbacks {
            on_connected,
            on_failed,
            on_suspended,
        }
    }
}

#[async_trait::async_trait]
impl LocationSource for SessionSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_last(&self) -> Result<Option<Reading>, LocationError> {
        let session = Session::new(self.connector.open());
        let (tx, rx) = oneshot::channel();
        let callbacks = self.fetch_callbacks(&session, Arc::new(Mutex::new(Some(tx))));

        // Disconnects on every exit, including the caller dropping this future.
        let _teardown = TeardownOnDrop(Arc::clone(&session));
        session
            .connect(callbacks)
            .map_err(|e| LocationError::ConnectionFailed(e.to_string()))?;

        rx.await.unwrap_or_else(|_| {
            Err(LocationError::ConnectionFailed(
                "session dropped its callbacks without answering".to_string(),
            ))
        })
    }

    fn subscribe(&self, params: UpdateParameters, emitter: Emitter) -> CancelHandle {
        let handle = emitter.handle();
        let session = Session::new(self.connector.open());

        // Registered first so it runs last: listener removal precedes disconnect.
        {
            let session = Arc::clone(&session);
            let kind = self.kind;
            handle.on_cancel(move || {
                if session.teardown() {
                    debug!(%kind, "session disconnected");
                }
                Ok(())
            });
        }

        let callbacks = self.stream_callbacks(&session, params, &emitter);
        if let Err(e) = session.connect(callbacks) {
            emitter.fail(LocationError::ConnectionFailed(e.to_string()));
        }
        handle
    }
}
