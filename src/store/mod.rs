//! The log-structured versioned page store: on-disk index/lookup blocks,
//! the active delta-page cache, and the LSVPS orchestrator.

pub mod delta_cache;
pub mod index_file;
pub mod lsvps;

pub use delta_cache::ActiveDeltaPageCache;
pub use index_file::{IndexBlock, IndexFile, LookupBlock};
pub use lsvps::{LsvpsConfig, StoredPage, LSVPS};
