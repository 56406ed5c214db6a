//! loc-replay
//!
//! Recorded tracks: a CSV loader and a [`LocationPlatform`] that plays a
//! track back into registered listeners with the recorded spacing.
//!
//! [`LocationPlatform`]: loc_source::LocationPlatform

mod loader;
mod platform;

pub use loader::{load_readings_csv, parse_readings_csv};
pub use platform::{check_time_scale, ReplayPlatform, MAX_TIME_SCALE};
