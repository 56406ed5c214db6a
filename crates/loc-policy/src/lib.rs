//! loc-policy
//!
//! Arbitration and source selection.
//!
//! - Reading comparator: decides whether a candidate fix supersedes the held one
//!   (freshness first, then accuracy).
//! - Priority policy: maps a power/accuracy tier onto the concrete set of
//!   sources to activate, with per-source parameters and an optional accuracy
//!   ceiling applied at the sink.
//!
//! Pure deterministic logic. No IO, no clocks, no async. Thresholds arrive
//! through `ComparatorConfig` / `PolicyConfig` so callers and tests can override
//! them.

mod comparator;
mod plan;
mod types;

pub use comparator::{best_of, is_better};
pub use plan::{resolve, resolve_code};
pub use types::*;
