//! Notice records: parsing from disk and the TTL cache that holds them.

mod cache;
mod reader;

pub use cache::*;
pub use reader::*;
