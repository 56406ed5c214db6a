//! Application-facing location API.
//!
//! [`LocationOrchestrator`] owns the registered sources and turns a tier into
//! a merged [`LocationStream`] plus the [`CancelHandle`](loc_source::CancelHandle)
//! that tears every activated source down.

mod orchestrator;
mod settings;
mod stream;

pub use orchestrator::LocationOrchestrator;
pub use settings::RuntimeSettings;
pub use stream::LocationStream;
