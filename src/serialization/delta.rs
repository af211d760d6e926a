use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::errors::{IndexerError, IndexerResult};
use crate::page::{DeltaItem, DeltaPage};
use crate::serialization::{SerializationFormat, SerializationOptions};
use crate::utils::Hash;

/// A portable, serde-friendly mirror of one `DeltaItem`, for export tooling
/// only — the hand-rolled wire format in `page.rs` is what LSVPS actually
/// persists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeltaItemSnapshot {
    Leaf {
        location_in_page: u8,
        version: u64,
        hash: Hash,
        file_id: u64,
        offset: u64,
        size: u64,
    },
    Index {
        location_in_page: u8,
        version: u64,
        hash: Hash,
        child_index: u8,
        child_hash: Hash,
    },
}

impl From<&DeltaItem> for DeltaItemSnapshot {
    fn from(item: &DeltaItem) -> Self {
        match item {
            DeltaItem::Leaf {
                location_in_page,
                version,
                hash,
                location,
            } => DeltaItemSnapshot::Leaf {
                location_in_page: *location_in_page,
                version: *version,
                hash: *hash,
                file_id: location.file_id,
                offset: location.offset,
                size: location.size,
            },
            DeltaItem::Index {
                location_in_page,
                version,
                hash,
                child_index,
                child_hash,
            } => DeltaItemSnapshot::Index {
                location_in_page: *location_in_page,
                version: *version,
                hash: *hash,
                child_index: *child_index,
                child_hash: *child_hash,
            },
        }
    }
}

/// A portable export of one pid's active delta page — its chain link and
/// item log — for inspection tooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaPageSnapshot {
    pub pid: String,
    pub last_pagekey_pid: String,
    pub last_pagekey_version: u64,
    pub items: Vec<DeltaItemSnapshot>,
}

impl From<&DeltaPage> for DeltaPageSnapshot {
    fn from(page: &DeltaPage) -> Self {
        Self {
            pid: page.pagekey.pid.clone(),
            last_pagekey_pid: page.last_pagekey.pid.clone(),
            last_pagekey_version: page.last_pagekey.version,
            items: page.items.iter().map(DeltaItemSnapshot::from).collect(),
        }
    }
}

pub fn serialize_delta_snapshot(
    snapshot: &DeltaPageSnapshot,
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

pub fn deserialize_delta_snapshot(
    data: &[u8],
    options: &SerializationOptions,
) -> IndexerResult<DeltaPageSnapshot> {
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
