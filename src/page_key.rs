//! `PageKey` — the address of a page: `(version, tid, type, pid)`.

use std::cmp::Ordering;

use crate::cursor::{ReadCursor, WriteCursor};
use crate::errors::IndexerResult;

/// Whether a `PageKey` addresses a checkpoint or a delta log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Base,
    Delta,
}

impl PageType {
    fn as_byte(self) -> u8 {
        match self {
            PageType::Base => 0,
            PageType::Delta => 1,
        }
    }

    fn from_byte(b: u8) -> PageType {
        if b == 0 {
            PageType::Base
        } else {
            PageType::Delta
        }
    }
}

/// `(version, tid, type, pid)` uniquely identifying a page.
///
/// `tid` is serialized as `u32` both in the standalone wire format (used
/// inside IndexBlock/LookupBlock mappings) and in the BasePage/DeltaPage
/// headers, kept at one consistent width everywhere rather than varying by
/// call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub version: u64,
    pub tid: u32,
    pub page_type: PageType,
    pub pid: String,
}

impl PageKey {
    pub fn new(version: u64, tid: u32, page_type: PageType, pid: impl Into<String>) -> Self {
        Self {
            version,
            tid,
            page_type,
            pid: pid.into(),
        }
    }

    /// Sentinel key meaning "this pid's delta chain never had a base page".
    pub fn sentinel(pid: impl Into<String>) -> Self {
        Self::new(0, 0, PageType::Base, pid)
    }

    pub fn is_sentinel(&self) -> bool {
        self.version == 0
    }

    pub fn serialize_to(&self, cursor: &mut WriteCursor<'_>) -> IndexerResult<()> {
        cursor.write_u64(self.version)?;
        cursor.write_u32(self.tid)?;
        cursor.write_u8(self.page_type.as_byte())?;
        cursor.write_sized_bytes(self.pid.as_bytes())?;
        Ok(())
    }

    pub fn deserialize_from(cursor: &mut ReadCursor<'_>) -> IndexerResult<Self> {
        let version = cursor.read_u64()?;
        let tid = cursor.read_u32()?;
        let page_type = PageType::from_byte(cursor.read_u8()?);
        let pid_bytes = cursor.read_sized_bytes()?;
        let pid = String::from_utf8(pid_bytes)
            .map_err(|e| crate::errors::IndexerError::CorruptedBlock(e.to_string()))?;
        Ok(Self {
            version,
            tid,
            page_type,
            pid,
        })
    }

    /// Encoded size in bytes of this key (varies with `pid` length).
    pub fn encoded_len(&self) -> usize {
        8 + 4 + 1 + 8 + self.pid.len()
    }
}

/// Total order: lexicographic by `(pid, version, type, tid)`.
impl Ord for PageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pid
            .cmp(&other.pid)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.page_type.as_byte().cmp(&other.page_type.as_byte()))
            .then_with(|| self.tid.cmp(&other.tid))
    }
}

impl PartialOrd for PageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_pid_then_version_then_type_then_tid() {
        let a = PageKey::new(1, 0, PageType::Base, "aa");
        let b = PageKey::new(1, 0, PageType::Base, "ab");
        assert!(a < b);

        let c = PageKey::new(1, 0, PageType::Base, "aa");
        let d = PageKey::new(2, 0, PageType::Base, "aa");
        assert!(c < d);

        let e = PageKey::new(1, 0, PageType::Base, "aa");
        let f = PageKey::new(1, 0, PageType::Delta, "aa");
        assert!(e < f);

        let g = PageKey::new(1, 0, PageType::Base, "aa");
        let h = PageKey::new(1, 1, PageType::Base, "aa");
        assert!(g < h);
    }

    #[test]
    fn round_trips_through_wire_format() {
        let key = PageKey::new(7, 3, PageType::Delta, "abcd");
        let mut buf = vec![0u8; key.encoded_len()];
        key.serialize_to(&mut WriteCursor::new(&mut buf)).unwrap();
        let decoded = PageKey::deserialize_from(&mut ReadCursor::new(&buf)).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn sentinel_has_version_zero() {
        let s = PageKey::sentinel("ab");
        assert!(s.is_sentinel());
        assert_eq!(s.page_type, PageType::Base);
    }
}
