//! `BasePage`, `DeltaPage` and `DeltaItem` — the 4 KiB page containers and
//! the node-update rules applied to them.

use crate::cursor::{ReadCursor, WriteCursor};
use crate::errors::{IndexerError, IndexerResult};
use crate::node::{IndexNode, LeafNode, Node, ValueLocation};
use crate::page_key::{PageKey, PageType};
use crate::utils::Hash;

pub const PAGE_SIZE: usize = 4096;

/// One record in a `DeltaPage`: a leaf update or an index-node update.
/// `location_in_page = 0` is the page's root; `1..=16` are the root's
/// children at slot `location_in_page - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaItem {
    Leaf {
        location_in_page: u8,
        version: u64,
        hash: Hash,
        location: ValueLocation,
    },
    Index {
        location_in_page: u8,
        version: u64,
        hash: Hash,
        child_index: u8,
        child_hash: Hash,
    },
}

impl DeltaItem {
    pub fn version(&self) -> u64 {
        match self {
            DeltaItem::Leaf { version, .. } => *version,
            DeltaItem::Index { version, .. } => *version,
        }
    }

    fn serialize_to(&self, cursor: &mut WriteCursor<'_>) -> IndexerResult<()> {
        match self {
            DeltaItem::Leaf {
                location_in_page,
                version,
                hash,
                location,
            } => {
                cursor.write_u8(*location_in_page)?;
                cursor.write_u8(1)?; // is_leaf
                cursor.write_u64(*version)?;
                cursor.write_hash(hash)?;
                cursor.write_u64(location.file_id)?;
                cursor.write_u64(location.offset)?;
                cursor.write_u64(location.size)?;
            }
            DeltaItem::Index {
                location_in_page,
                version,
                hash,
                child_index,
                child_hash,
            } => {
                cursor.write_u8(*location_in_page)?;
                cursor.write_u8(0)?; // is_leaf
                cursor.write_u64(*version)?;
                cursor.write_hash(hash)?;
                cursor.write_u8(*child_index)?;
                cursor.write_hash(child_hash)?;
            }
        }
        Ok(())
    }

    fn deserialize_from(cursor: &mut ReadCursor<'_>) -> IndexerResult<Self> {
        let location_in_page = cursor.read_u8()?;
        let is_leaf = cursor.read_u8()? != 0;
        let version = cursor.read_u64()?;
        let hash = cursor.read_hash()?;
        if is_leaf {
            let file_id = cursor.read_u64()?;
            let offset = cursor.read_u64()?;
            let size = cursor.read_u64()?;
            Ok(DeltaItem::Leaf {
                location_in_page,
                version,
                hash,
                location: ValueLocation {
                    file_id,
                    offset,
                    size,
                },
            })
        } else {
            let child_index = cursor.read_u8()?;
            let child_hash = cursor.read_hash()?;
            Ok(DeltaItem::Index {
                location_in_page,
                version,
                hash,
                child_index,
                child_hash,
            })
        }
    }
}

/// A log of per-node updates since the last checkpoint, chained to the prior
/// delta/base page via `last_pagekey`.
///
/// `pagekey` is this page's own identity, assigned by the owning trie only
/// once the page is frozen and handed to LSVPS for storage; it is not part
/// of the wire format — the loader tags a page with its key after reading
/// it, rather than storing the key redundantly inside the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaPage {
    pub pagekey: PageKey,
    pub last_pagekey: PageKey,
    pub items: Vec<DeltaItem>,
}

impl DeltaPage {
    pub fn new(pid: impl Into<String>) -> Self {
        let pid = pid.into();
        Self {
            pagekey: PageKey::new(0, 0, PageType::Delta, pid.clone()),
            last_pagekey: PageKey::sentinel(pid),
            items: Vec::new(),
        }
    }

    pub fn update_count(&self) -> u16 {
        self.items.len() as u16
    }

    pub fn push(&mut self, item: DeltaItem) {
        // Replay correctness depends on items being non-decreasing in
        // version; catch a misordered writer in debug builds.
        debug_assert!(
            self.items.last().map_or(true, |prev| item.version() >= prev.version()),
            "delta items must be non-decreasing in version"
        );
        self.items.push(item);
    }

    pub fn clear(&mut self, new_last_pagekey: PageKey) {
        self.items.clear();
        let pid = self.pagekey.pid.clone();
        self.pagekey = PageKey::new(0, 0, PageType::Delta, pid);
        self.last_pagekey = new_last_pagekey;
    }

    pub fn serialize(&self) -> IndexerResult<[u8; PAGE_SIZE]> {
        let mut buf = [0u8; PAGE_SIZE];
        {
            let mut cursor = WriteCursor::new(&mut buf);
            self.last_pagekey.serialize_to(&mut cursor)?;
            cursor.write_u16(self.update_count())?;
            for item in &self.items {
                item.serialize_to(&mut cursor)?;
            }
            cursor.pad_to_end();
        }
        Ok(buf)
    }

    /// Deserializes the wire body. The returned page's `pagekey` is a
    /// placeholder sentinel for `last_pagekey.pid`; the caller (LSVPS) must
    /// overwrite it with the key it looked up the page under.
    pub fn deserialize(buf: &[u8]) -> IndexerResult<Self> {
        let mut cursor = ReadCursor::new(buf);
        let last_pagekey = PageKey::deserialize_from(&mut cursor)?;
        let count = cursor.read_u16()?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(DeltaItem::deserialize_from(&mut cursor)?);
        }
        let pagekey = PageKey::new(0, 0, PageType::Delta, last_pagekey.pid.clone());
        Ok(Self {
            pagekey,
            last_pagekey,
            items,
        })
    }
}

/// A checkpoint of a trie page: the root node (leaf or index) plus its one
/// inline level of children when the root is an index node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePage {
    pub pagekey: PageKey,
    pub d_update_count: u16,
    pub b_update_count: u16,
    pub root: Node,
}

impl BasePage {
    /// Synthesizes a fresh, never-before-seen page for `pid`, shaped by the
    /// length of `nibbles`.
    pub fn new_empty(pid: impl Into<String>, key: &[u8], nibbles: &[u8]) -> IndexerResult<Self> {
        let pid = pid.into();
        let root = match nibbles.len() {
            0 => Node::Leaf(LeafNode::new(0, key.to_vec())),
            1 => {
                let mut root = IndexNode::new(0);
                root.add_child(
                    nibbles[0] as usize,
                    Node::Leaf(LeafNode::new(0, key.to_vec())),
                    0,
                    [0u8; 32],
                )?;
                Node::Index(root)
            }
            2 => {
                let child = IndexNode::new_routed(0, nibbles[1] as usize);
                let mut root = IndexNode::new(0);
                root.add_child(nibbles[0] as usize, Node::Index(child), 0, [0u8; 32])?;
                Node::Index(root)
            }
            n => {
                return Err(IndexerError::CorruptedBlock(format!(
                    "nibbles slice must have length 0, 1 or 2, got {n}"
                )))
            }
        };
        Ok(Self {
            pagekey: PageKey::new(0, 0, PageType::Base, pid),
            d_update_count: 0,
            b_update_count: 0,
            root,
        })
    }

    /// A bare placeholder used when a delta chain bottoms out at the
    /// sentinel key with no base page behind it.
    /// Unlike `new_empty`, this does not know the key's nibble shape — that
    /// context belongs to `Put`, not to page loading — so it starts as a
    /// version-0 empty leaf and is filled in entirely by delta replay.
    pub fn empty_placeholder(pid: impl Into<String>) -> Self {
        Self {
            pagekey: PageKey::new(0, 0, PageType::Base, pid),
            d_update_count: 0,
            b_update_count: 0,
            root: Node::Leaf(LeafNode::new(0, Vec::new())),
        }
    }

    /// Applies one update to this page following the three cases of spec
    /// §4.2, appending the corresponding delta item(s) to `active_delta`, and
    /// returns the page's new root hash (to propagate to the parent page).
    ///
    /// `key` is the full key being written; it is only consulted when a
    /// fresh leaf must be attached mid-page (case 1).
    pub fn apply_update(
        &mut self,
        version: u64,
        location: ValueLocation,
        value: &[u8],
        key: &[u8],
        nibbles: &[u8],
        propagated_child_hash: Hash,
        active_delta: &mut DeltaPage,
    ) -> IndexerResult<Hash> {
        match nibbles.len() {
            0 => self.apply_leaf_root_update(version, location, value, active_delta),
            1 => self.apply_single_index_update(
                version,
                location,
                value,
                key,
                nibbles[0] as usize,
                active_delta,
            ),
            2 => self.apply_double_index_update(
                version,
                nibbles[0] as usize,
                nibbles[1] as usize,
                propagated_child_hash,
                active_delta,
            ),
            n => Err(IndexerError::CorruptedBlock(format!(
                "nibbles slice must have length 0, 1 or 2, got {n}"
            ))),
        }
    }

    fn apply_leaf_root_update(
        &mut self,
        version: u64,
        location: ValueLocation,
        value: &[u8],
        active_delta: &mut DeltaPage,
    ) -> IndexerResult<Hash> {
        let leaf = match &mut self.root {
            Node::Leaf(l) => l,
            Node::Index(_) => {
                return Err(IndexerError::CorruptedBlock(
                    "expected leaf root for a zero-nibble update".into(),
                ))
            }
        };
        leaf.version = version;
        leaf.location = location;
        leaf.hash = crate::utils::hash_leaf(&leaf.key, value);
        let hash = leaf.hash;
        active_delta.push(DeltaItem::Leaf {
            location_in_page: 0,
            version,
            hash,
            location,
        });
        Ok(hash)
    }

    fn apply_single_index_update(
        &mut self,
        version: u64,
        location: ValueLocation,
        value: &[u8],
        key: &[u8],
        i: usize,
        active_delta: &mut DeltaPage,
    ) -> IndexerResult<Hash> {
        let root = self.root.as_index_mut()?;
        if !root.has_child(i) {
            root.add_child(i, Node::Leaf(LeafNode::new(0, key.to_vec())), 0, [0u8; 32])?;
        }
        let leaf_hash = {
            let leaf = match root.get_child_mut(i)? {
                Node::Leaf(l) => l,
                Node::Index(_) => {
                    return Err(IndexerError::CorruptedBlock(format!(
                        "child {i} expected to be a leaf node"
                    )))
                }
            };
            leaf.version = version;
            leaf.location = location;
            leaf.hash = crate::utils::hash_leaf(&leaf.key, value);
            leaf.hash
        };
        active_delta.push(DeltaItem::Leaf {
            location_in_page: (i + 1) as u8,
            version,
            hash: leaf_hash,
            location,
        });

        root.set_child_meta(i, version, leaf_hash)?;
        root.version = version;
        root.recompute_hash();
        active_delta.push(DeltaItem::Index {
            location_in_page: 0,
            version,
            hash: root.hash,
            child_index: i as u8,
            child_hash: leaf_hash,
        });
        Ok(root.hash)
    }

    fn apply_double_index_update(
        &mut self,
        version: u64,
        i: usize,
        j: usize,
        propagated_child_hash: Hash,
        active_delta: &mut DeltaPage,
    ) -> IndexerResult<Hash> {
        let root = self.root.as_index_mut()?;
        if !root.has_child(i) {
            root.add_child(i, Node::Index(IndexNode::new_routed(0, i)), 0, [0u8; 32])?;
        }
        let child_hash = {
            let child = root.get_child_mut(i)?.as_index_mut()?;
            child.set_child_meta(j, version, propagated_child_hash)?;
            child.version = version;
            child.recompute_hash();
            active_delta.push(DeltaItem::Index {
                location_in_page: (i + 1) as u8,
                version,
                hash: child.hash,
                child_index: j as u8,
                child_hash: propagated_child_hash,
            });
            child.hash
        };

        root.set_child_meta(i, version, child_hash)?;
        root.version = version;
        root.recompute_hash();
        active_delta.push(DeltaItem::Index {
            location_in_page: 0,
            version,
            hash: root.hash,
            child_index: i as u8,
            child_hash,
        });
        Ok(root.hash)
    }

    /// Replays one `DeltaItem` onto this page.
    ///
    /// For index items, the child slot written is `item`'s own carried
    /// `child_index`, not `location_in_page - 1` — see DESIGN.md for why
    /// those two fields are kept distinct here.
    pub fn update_delta_item(&mut self, item: &DeltaItem) -> IndexerResult<()> {
        match item {
            DeltaItem::Leaf {
                location_in_page,
                version,
                hash,
                location,
            } => {
                let node = self.node_at_location_mut(*location_in_page, false)?;
                node.set_version(*version);
                node.set_hash(*hash);
                node.set_location(*location);
            }
            DeltaItem::Index {
                location_in_page,
                version,
                hash,
                child_index,
                child_hash,
            } => {
                let node = self.node_at_location_mut(*location_in_page, true)?;
                node.set_version(*version);
                node.set_hash(*hash);
                let index_node = node.as_index_mut()?;
                index_node.set_child_meta(*child_index as usize, *version, *child_hash)?;
            }
        }
        // Track the latest applied version on the page's own identity so
        // LSVPS's loader can tell whether replay reached the requested
        // version. Items are replayed in non-decreasing version order, so
        // the last applied item carries the high-water mark.
        self.pagekey.version = item.version();
        Ok(())
    }

    fn node_at_location_mut(
        &mut self,
        location_in_page: u8,
        is_index: bool,
    ) -> IndexerResult<&mut Node> {
        if location_in_page == 0 {
            return Ok(&mut self.root);
        }
        let slot = (location_in_page - 1) as usize;
        let root = self.root.as_index_mut()?;
        if !root.has_child(slot) {
            let fresh = if is_index {
                Node::Index(IndexNode::new(0))
            } else {
                Node::Leaf(LeafNode::new(0, Vec::new()))
            };
            root.add_child(slot, fresh, 0, [0u8; 32])?;
        }
        root.get_child_mut(slot)
    }

    pub fn serialize(&self) -> IndexerResult<[u8; PAGE_SIZE]> {
        let mut buf = [0u8; PAGE_SIZE];
        {
            let mut cursor = WriteCursor::new(&mut buf);
            cursor.write_u64(self.pagekey.version)?;
            cursor.write_u32(self.pagekey.tid)?;
            cursor.write_u8(0)?; // page_type = Base
            cursor.write_sized_bytes(self.pagekey.pid.as_bytes())?;
            cursor.write_u16(self.d_update_count)?;
            cursor.write_u16(self.b_update_count)?;
            self.root.serialize_to(&mut cursor, true)?;
            cursor.pad_to_end();
        }
        Ok(buf)
    }

    pub fn deserialize(buf: &[u8]) -> IndexerResult<Self> {
        let mut cursor = ReadCursor::new(buf);
        let version = cursor.read_u64()?;
        let tid = cursor.read_u32()?;
        let page_type = cursor.read_u8()?;
        if page_type != 0 {
            return Err(IndexerError::CorruptedBlock(format!(
                "expected base page tag 0, found {page_type}"
            )));
        }
        let pid_bytes = cursor.read_sized_bytes()?;
        let pid = String::from_utf8(pid_bytes)
            .map_err(|e| IndexerError::CorruptedBlock(e.to_string()))?;
        let d_update_count = cursor.read_u16()?;
        let b_update_count = cursor.read_u16()?;
        let root = Node::deserialize_from(&mut cursor, true)?;
        Ok(Self {
            pagekey: PageKey::new(version, tid, PageType::Base, pid),
            d_update_count,
            b_update_count,
            root,
        })
    }
}
