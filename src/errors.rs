use std::fmt;

/// Error types for the trie and page store.
#[derive(Debug)]
pub enum IndexerError {
    /// `Put` was called with a version older than the trie's current version.
    OutdatedVersion { requested: u64, current: u64 },
    /// `Get` (or an internal page lookup) found no value for the key/version.
    KeyNotFound,
    /// A delta page's serialized form would exceed `PAGE_SIZE`.
    PageOverflow,
    /// An index/lookup block exceeded its declared size, held more mappings
    /// than its capacity allows, or a page failed to deserialize.
    CorruptedBlock(String),
    /// A delta chain bottomed out at a non-sentinel `PageKey` LSVPS could not
    /// find on disk.
    MissingBasePage,
    /// `AddChild`/`SetChild` called with an index outside `0..DMM_NODE_FANOUT`.
    ChildOutOfRange(usize),
    /// `GetChild` called on a bitmap slot that was never populated.
    ChildAbsent(usize),
    /// Serialization failed.
    SerializationError(String),
    /// IO operation failed.
    IoError(std::io::Error),
    /// Checksum verification failed.
    ChecksumError,
    /// Invalid data format.
    InvalidData(String),
    /// Storage operation failed.
    StorageError(String),
    /// Feature not yet implemented.
    NotImplemented(String),
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexerError::OutdatedVersion { requested, current } => write!(
                f,
                "put version {requested} is older than current version {current}"
            ),
            IndexerError::KeyNotFound => write!(f, "key not found"),
            IndexerError::PageOverflow => write!(f, "delta page exceeds PAGE_SIZE"),
            IndexerError::CorruptedBlock(msg) => write!(f, "corrupted block: {msg}"),
            IndexerError::MissingBasePage => {
                write!(f, "delta chain bottomed out without a base page")
            }
            IndexerError::ChildOutOfRange(i) => write!(f, "child index {i} out of range"),
            IndexerError::ChildAbsent(i) => write!(f, "child slot {i} has no child"),
            IndexerError::SerializationError(msg) => write!(f, "serialization error: {msg}"),
            IndexerError::IoError(err) => write!(f, "IO error: {err}"),
            IndexerError::ChecksumError => write!(f, "checksum verification failed"),
            IndexerError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            IndexerError::StorageError(msg) => write!(f, "storage error: {msg}"),
            IndexerError::NotImplemented(msg) => write!(f, "not implemented: {msg}"),
        }
    }
}

impl std::error::Error for IndexerError {}

impl From<std::io::Error> for IndexerError {
    fn from(err: std::io::Error) -> Self {
        IndexerError::IoError(err)
    }
}

impl From<bincode::Error> for IndexerError {
    fn from(err: bincode::Error) -> Self {
        IndexerError::SerializationError(err.to_string())
    }
}

/// Result type alias for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;
