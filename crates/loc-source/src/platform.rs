//! Collaborator boundary: the platform's connectionless location service.
//!
//! Only the operations the adapters need. Errors are `anyhow` here and are
//! converted to `LocationError` by [`crate::PlatformSource`].

use std::collections::BTreeSet;
use std::sync::Arc;

use loc_schemas::{Reading, SourceKind, UpdateParameters};

/// Callback invoked by the platform for every native fix.
pub type ReadingCallback = Arc<dyn Fn(Reading) + Send + Sync>;

/// Opaque id of one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(pub u64);

#[async_trait::async_trait]
pub trait LocationPlatform: Send + Sync {
    /// Source kinds present and enabled right now.
    fn available_kinds(&self) -> BTreeSet<SourceKind>;

    /// Last fix the platform cached for `kind`, if it ever had one.
    fn last_known(&self, kind: SourceKind) -> anyhow::Result<Option<Reading>>;

    /// Register a push listener. Completes once the platform has accepted the
    /// registration; `on_reading` may fire from any thread afterwards.
    async fn register_listener(
        &self,
        kind: SourceKind,
        params: UpdateParameters,
        on_reading: ReadingCallback,
    ) -> anyhow::Result<ListenerToken>;

    /// Remove a listener. Must tolerate tokens that are unknown or already
    /// removed.
    fn unregister_listener(&self, token: ListenerToken);
}
