//! Service catalog: declarative definition, monitoring snapshot, and the TTL
//! cache holding both.

mod cache;
mod loader;

pub use cache::*;
pub use loader::*;
