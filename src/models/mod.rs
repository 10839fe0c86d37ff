//! Data models for the status board.
//!
//! Notices, catalog entries and the monitoring snapshot, plus the closed set of
//! service states they resolve to.

mod notice;
mod service;
mod snapshot;

pub use notice::*;
pub use service::*;
pub use snapshot::*;
