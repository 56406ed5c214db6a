//! Connection-oriented sources.
//!
//! A session-backed service yields nothing until a connection is established,
//! and must be disconnected explicitly afterwards. This module bridges that
//! into the plain fetch/subscribe contract:
//!
//! - `state`: the per-session state machine as data.
//! - `adapter`: [`SessionSource`], which opens a fresh session per call and
//!   sequences connect → request → teardown.
//!
//! The service itself is reached through [`SessionConnector`] /
//! [`SessionClient`]. Connection outcomes arrive through a
//! [`SessionCallbacks`] capability set injected per call.

mod adapter;
mod state;

use std::sync::Arc;

use loc_schemas::{Reading, UpdateParameters};

use crate::platform::{ListenerToken, ReadingCallback};

pub use adapter::{Session, SessionSource};
pub use state::{SessionEvent, SessionState, TransitionError};

/// Handlers for the three connection outcomes. Any of them may be invoked from
/// any thread, including synchronously from inside [`SessionClient::connect`].
pub struct SessionCallbacks {
    pub on_connected: Box<dyn Fn() + Send + Sync>,
    /// Argument is a human-readable reason.
    pub on_failed: Box<dyn Fn(String) + Send + Sync>,
    /// Argument is the service's suspension cause code.
    pub on_suspended: Box<dyn Fn(i32) + Send + Sync>,
}

/// One client session of the connection-oriented service.
pub trait SessionClient: Send + Sync {
    fn connect(&self, callbacks: SessionCallbacks);
    fn disconnect(&self);
    fn is_connected(&self) -> bool;
    fn is_connecting(&self) -> bool;

    /// Only meaningful while connected.
    fn last_location(&self) -> anyhow::Result<Option<Reading>>;

    /// Only meaningful while connected.
    fn request_updates(
        &self,
        params: &UpdateParameters,
        on_reading: ReadingCallback,
    ) -> anyhow::Result<ListenerToken>;

    fn remove_updates(&self, token: ListenerToken);
}

/// Factory for fresh, unconnected sessions. Sessions are never reused across
/// calls.
pub trait SessionConnector: Send + Sync {
    fn open(&self) -> Arc<dyn SessionClient>;
}
