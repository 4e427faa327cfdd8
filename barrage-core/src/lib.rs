//! Shared data types of the barrage load generator.
//!
//! This crate holds the leaf types every other barrage crate agrees on: call results,
//! schedules, stats, labels and the [`Sink`] trait. The engine itself lives in `barrage`.
mod constants;
mod error;
mod labels;
mod result;
mod schedule;
mod sink;
mod stats;

pub use constants::*;
pub use error::*;
pub use labels::*;
pub use result::*;
pub use schedule::*;
pub use sink::*;
pub use stats::*;
