//! `ValueStore` — the external value log collaborator. The trie treats it
//! as opaque; this module supplies the trait and one concrete, file-backed
//! implementation grounded in the write-ahead log's length-prefixed record
//! framing.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::IndexerResult;
use crate::node::ValueLocation;

/// Append-only value log: `WriteValue` returns an opaque location,
/// `ReadValue` dereferences one.
pub trait ValueStore: Send + Sync {
    fn write_value(&self, version: u64, key: &[u8], value: &[u8]) -> IndexerResult<ValueLocation>;
    fn read_value(&self, location: ValueLocation) -> IndexerResult<Vec<u8>>;
}

/// Values are appended as `key_len(4) key value_len(4) value` records; a
/// location's `size` covers the whole record so `read_value` can recover
/// both fields without a separate index.
pub struct FileValueStore {
    file: Arc<Mutex<File>>,
    file_id: u64,
}

impl FileValueStore {
    pub fn open(path: impl AsRef<Path>, file_id: u64) -> IndexerResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            file_id,
        })
    }

    pub fn file_id(&self) -> u64 {
        self.file_id
    }
}

impl ValueStore for FileValueStore {
    fn write_value(&self, _version: u64, key: &[u8], value: &[u8]) -> IndexerResult<ValueLocation> {
        let mut file = self.file.lock();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(&(key.len() as u32).to_le_bytes())?;
        file.write_all(key)?;
        file.write_all(&(value.len() as u32).to_le_bytes())?;
        file.write_all(value)?;
        file.flush()?;
        let size = 4 + key.len() as u64 + 4 + value.len() as u64;
        Ok(ValueLocation {
            file_id: self.file_id,
            offset,
            size,
        })
    }

    fn read_value(&self, location: ValueLocation) -> IndexerResult<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(location.offset))?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let key_len = u32::from_le_bytes(len_buf) as usize;
        let mut key_buf = vec![0u8; key_len];
        file.read_exact(&mut key_buf)?;

        file.read_exact(&mut len_buf)?;
        let value_len = u32::from_le_bytes(len_buf) as usize;
        let mut value_buf = vec![0u8; value_len];
        file.read_exact(&mut value_buf)?;

        Ok(value_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileValueStore::open(dir.path().join("values.log"), 0).unwrap();

        let loc1 = store.write_value(1, b"ab", b"hello").unwrap();
        let loc2 = store.write_value(2, b"ac", b"world").unwrap();

        assert_eq!(store.read_value(loc1).unwrap(), b"hello");
        assert_eq!(store.read_value(loc2).unwrap(), b"world");
    }

    #[test]
    fn locations_do_not_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileValueStore::open(dir.path().join("values.log"), 0).unwrap();

        let loc1 = store.write_value(1, b"k1", b"v1").unwrap();
        let loc2 = store.write_value(2, b"k2", b"v2").unwrap();
        assert!(loc1.offset + loc1.size <= loc2.offset);
    }
}
