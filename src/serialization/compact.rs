use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::errors::{IndexerError, IndexerResult};
use crate::serialization::{SerializationFormat, SerializationOptions};

/// A portable export of a trie's per-pid bookkeeping. This is deliberately
/// not a byte-for-byte dump of pages — those remain owned by the hand-rolled
/// page/block codecs in `page.rs` and `store/index_file.rs`, which must stay
/// bit-compatible with what LSVPS writes to disk. `StoreSnapshot` exists for
/// operational tooling: inspecting or migrating `page_versions` without
/// standing up the full on-disk store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub current_version: u64,
    /// `(pid, current_version, latest_basepage_version)` per tracked pid.
    pub page_versions: Vec<(String, u64, u64)>,
}

/// Serializes a snapshot using the most compact representation requested.
pub fn serialize_snapshot(
    snapshot: &StoreSnapshot,
    options: &SerializationOptions,
) -> IndexerResult<Vec<u8>> {
    let serialized = match options.format {
        SerializationFormat::Bincode => bincode::serialize(snapshot)
            .map_err(|e| IndexerError::SerializationError(e.to_string()))?,
        SerializationFormat::MessagePack => rmp_serde::to_vec(snapshot)
            .map_err(|e| IndexerError::SerializationError(e.to_string()))?,
        SerializationFormat::Postcard => postcard::to_allocvec(snapshot)
            .map_err(|e| IndexerError::SerializationError(e.to_string()))?,
    };

    if options.compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(options.compression_level));
        encoder.write_all(&serialized)?;
        Ok(encoder.finish()?)
    } else {
        Ok(serialized)
    }
}

/// Deserializes a snapshot previously produced by `serialize_snapshot`.
pub fn deserialize_snapshot(
    data: &[u8],
    options: &SerializationOptions,
) -> IndexerResult<StoreSnapshot> {
    let decompressed = if options.compress {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        decompressed
    } else {
        data.to_vec()
    };

    match options.format {
        SerializationFormat::Bincode => bincode::deserialize(&decompressed)
            .map_err(|e| IndexerError::SerializationError(e.to_string())),
        SerializationFormat::MessagePack => rmp_serde::from_slice(&decompressed)
            .map_err(|e| IndexerError::SerializationError(e.to_string())),
        SerializationFormat::Postcard => postcard::from_bytes(&decompressed)
            .map_err(|e| IndexerError::SerializationError(e.to_string())),
    }
}
