//! DMM-Trie/LSVPS core — a versioned page store backed by a Merkle-Patricia
//! -like trie with delta-checkpointing.
//!
//! Values are appended to an external value log; trie pages are periodically
//! checkpointed as `BasePage`s, and updates between checkpoints are recorded
//! as `DeltaPage`s. `LSVPS`, the log-structured versioned page store,
//! persists both kinds of pages in append-only index files with two-level
//! on-disk indexes, and reconstructs any page at any requested version by
//! replaying deltas on top of the nearest prior checkpoint.

pub mod config;
pub mod cursor;
pub mod errors;
pub mod node;
pub mod page;
pub mod page_key;
pub mod serialization;
pub mod store;
pub mod trie;
pub mod utils;
pub mod value_store;

pub use config::TrieConfig;
pub use errors::{IndexerError, IndexerResult};
pub use node::{ChildSlot, IndexNode, LeafNode, Node, ValueLocation, DMM_NODE_FANOUT};
pub use page::{BasePage, DeltaItem, DeltaPage, PAGE_SIZE};
pub use page_key::{PageKey, PageType};
pub use store::{ActiveDeltaPageCache, IndexBlock, IndexFile, LookupBlock, LsvpsConfig, StoredPage, LSVPS};
pub use trie::DMMTrie;
pub use utils::Hash;
pub use value_store::{FileValueStore, ValueStore};
