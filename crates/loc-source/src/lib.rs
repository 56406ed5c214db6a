//! loc-source
//!
//! Adapter boundary between platform location services and the stream
//! orchestrator.
//!
//! Every underlying source, connectionless or session-backed, is exposed
//! through the same [`LocationSource`] contract: a last-known query and a push
//! subscription that returns a [`CancelHandle`]. Readings and adapter-local
//! failures travel through an [`Emitter`] into whatever sink the caller owns.
//!
//! Platform errors (`anyhow`) are converted into [`loc_schemas::LocationError`]
//! here; nothing above this crate sees a raw platform failure.

pub mod cancel;
pub mod emitter;
pub mod platform;
pub mod platform_source;
pub mod session;
pub mod source;

pub use cancel::CancelHandle;
pub use emitter::{Emitter, SourceEvent, SourcePayload};
pub use platform::{ListenerToken, LocationPlatform, ReadingCallback};
pub use platform_source::PlatformSource;
pub use session::{
    Session, SessionCallbacks, SessionClient, SessionConnector, SessionEvent, SessionSource,
    SessionState, TransitionError,
};
pub use source::LocationSource;
