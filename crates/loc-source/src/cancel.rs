//! Idempotent teardown token.
//!
//! A [`CancelHandle`] collects teardown actions (unregister a listener,
//! disconnect a session, cancel a child handle) and runs each of them exactly
//! once on the first [`CancelHandle::cancel`] call. Actions registered after
//! cancellation run immediately, so a registration that completes late is
//! still released.
//!
//! Actions run in reverse registration order: a listener registered on a live
//! session is removed before the session is disconnected.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, error, warn};

type Teardown = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

#[derive(Default)]
struct Actions {
    fired: bool,
    pending: Vec<Teardown>,
}

struct Inner {
    label: String,
    token: CancellationToken,
    actions: Mutex<Actions>,
}

/// Cloneable cancel token shared between the caller and the adapters it
/// activated.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("label", &self.inner.label)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelHandle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                token: CancellationToken::new(),
                actions: Mutex::new(Actions::default()),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Owned form of [`cancelled`](Self::cancelled), for holding inside a
    /// stream or other long-lived struct.
    pub fn cancelled_owned(&self) -> WaitForCancellationFutureOwned {
        self.inner.token.clone().cancelled_owned()
    }

    /// Register a teardown action. Runs now if the handle is already cancelled.
    pub fn on_cancel<F>(&self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        {
            let mut actions = self.lock();
            if !actions.fired {
                actions.pending.push(Box::new(action));
                return;
            }
        }
        debug!(handle = %self.inner.label, "late registration torn down immediately");
        self.run_one(Box::new(action));
    }

    /// Cancel `child` whenever this handle is cancelled.
    pub fn attach(&self, child: CancelHandle) {
        self.on_cancel(move || {
            child.cancel();
            Ok(())
        });
    }

    /// Run every teardown action once. Later calls are no-ops.
    ///
    /// A failing action is logged and does not stop the remaining ones.
    pub fn cancel(&self) {
        let pending = {
            let mut actions = self.lock();
            if actions.fired {
                return;
            }
            actions.fired = true;
            // token and flag flip together under the lock. Emitters read the
            // token without it, so a racing reading can still be queued; the
            // stream checks the token before draining and drops it.
            self.inner.token.cancel();
            std::mem::take(&mut actions.pending)
        };

        debug!(handle = %self.inner.label, actions = pending.len(), "cancel");
        for action in pending.into_iter().rev() {
            self.run_one(action);
        }
    }

    fn run_one(&self, action: Teardown) {
        match catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(handle = %self.inner.label, error = %format!("{e:#}"), "teardown action failed");
            }
            Err(_) => {
                error!(handle = %self.inner.label, "teardown action panicked");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Actions> {
        self.inner
            .actions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
