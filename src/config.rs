use std::path::PathBuf;

use crate::serialization::SerializationOptions;
use crate::store::LsvpsConfig;

/// Top-level configuration for a `DMMTrie` instance: the delta/checkpoint
/// thresholds, the page store's buffering and cache sizes, and the ambient
/// serialization/debug knobs.
#[derive(Debug)]
pub struct TrieConfig {
    /// Number of updates an active delta page absorbs before it is frozen
    /// and a fresh active delta page is started.
    pub delta_freeze_threshold: u32,
    /// Number of frozen delta pages a base page accumulates before it is
    /// checkpointed into a new base page.
    pub checkpoint_threshold: u32,
    /// Capacity of the in-memory base-page LRU cache.
    pub base_cache_size: usize,
    /// Page store configuration: root directory, flush buffer size, and the
    /// active delta page cache's capacity.
    pub storage: LsvpsConfig,
    /// Serialization options for snapshot/export tooling.
    pub serialization: SerializationOptions,
    /// Whether to enable debug logging.
    pub debug: bool,
}

impl TrieConfig {
    /// Create a new configuration rooted at `data_dir`.
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            delta_freeze_threshold: 64,
            checkpoint_threshold: 16,
            base_cache_size: 10_000,
            storage: LsvpsConfig {
                root_dir: data_dir.into(),
                ..LsvpsConfig::default()
            },
            serialization: SerializationOptions::default(),
            debug: false,
        }
    }

    /// Configuration tuned for development: small thresholds so checkpoint
    /// and freeze behavior is easy to observe, debug logging on.
    pub fn development<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            delta_freeze_threshold: 4,
            checkpoint_threshold: 2,
            base_cache_size: 256,
            storage: LsvpsConfig {
                root_dir: data_dir.into(),
                max_buffer_size: 256,
                delta_cache_capacity: 1024,
            },
            serialization: SerializationOptions::fastest(),
            debug: true,
        }
    }

    /// Configuration tuned for production-sized workloads.
    pub fn production<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            delta_freeze_threshold: 256,
            checkpoint_threshold: 32,
            base_cache_size: 100_000,
            storage: LsvpsConfig {
                root_dir: data_dir.into(),
                max_buffer_size: 50_000,
                delta_cache_capacity: 1_000_000,
            },
            serialization: SerializationOptions::balanced(),
            debug: false,
        }
    }

    pub fn with_delta_freeze_threshold(mut self, threshold: u32) -> Self {
        self.delta_freeze_threshold = threshold;
        self
    }

    pub fn with_checkpoint_threshold(mut self, threshold: u32) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    pub fn with_base_cache_size(mut self, size: usize) -> Self {
        self.base_cache_size = size;
        self
    }

    pub fn with_storage(mut self, storage: LsvpsConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_serialization(mut self, serialization: SerializationOptions) -> Self {
        self.serialization = serialization;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self::new("./dmmtrie_data")
    }
}
