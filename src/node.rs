//! `Node` — the in-memory trie node: `LeafNode` or `IndexNode`, a tagged sum
//! type with branches on node kind expressed as explicit match statements.

use crate::cursor::{ReadCursor, WriteCursor};
use crate::errors::{IndexerError, IndexerResult};
use crate::utils::{hash_children, Hash};

pub const DMM_NODE_FANOUT: usize = 16;

/// `(file_id, offset, size)` — an opaque location in the external value log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueLocation {
    pub file_id: u64,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub version: u64,
    pub key: Vec<u8>,
    pub location: ValueLocation,
    pub hash: Hash,
}

impl LeafNode {
    pub fn new(version: u64, key: Vec<u8>) -> Self {
        Self {
            version,
            key,
            location: ValueLocation::default(),
            hash: [0u8; 32],
        }
    }

    fn serialize_to(&self, cursor: &mut WriteCursor<'_>) -> IndexerResult<()> {
        cursor.write_u8(1)?; // is_leaf_node = true
        cursor.write_u64(self.version)?;
        cursor.write_sized_bytes(&self.key)?;
        cursor.write_u64(self.location.file_id)?;
        cursor.write_u64(self.location.offset)?;
        cursor.write_u64(self.location.size)?;
        cursor.write_hash(&self.hash)?;
        Ok(())
    }

    fn deserialize_body(cursor: &mut ReadCursor<'_>) -> IndexerResult<Self> {
        let version = cursor.read_u64()?;
        let key = cursor.read_sized_bytes()?;
        let file_id = cursor.read_u64()?;
        let offset = cursor.read_u64()?;
        let size = cursor.read_u64()?;
        let hash = cursor.read_hash()?;
        Ok(Self {
            version,
            key,
            location: ValueLocation {
                file_id,
                offset,
                size,
            },
            hash,
        })
    }
}

/// One of an `IndexNode`'s 16 child slots: the routing metadata plus,
/// optionally, the in-memory child node itself. Non-root index nodes never
/// carry the pointer — only `(child_version, child_hash)` persist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChildSlot {
    pub version: u64,
    pub hash: Hash,
    pub node: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNode {
    pub version: u64,
    pub hash: Hash,
    pub bitmap: u16,
    pub children: [ChildSlot; DMM_NODE_FANOUT],
}

impl IndexNode {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            hash: [0u8; 32],
            bitmap: 0,
            children: Default::default(),
        }
    }

    /// A fresh second-level index node routing through a single bit.
    pub fn new_routed(version: u64, routed_bit: usize) -> Self {
        let mut node = Self::new(version);
        node.bitmap = 1 << routed_bit;
        node
    }

    pub fn has_child(&self, index: usize) -> bool {
        index < DMM_NODE_FANOUT && (self.bitmap & (1 << index)) != 0
    }

    pub fn get_child(&self, index: usize) -> IndexerResult<&Node> {
        if index >= DMM_NODE_FANOUT {
            return Err(IndexerError::ChildOutOfRange(index));
        }
        if !self.has_child(index) {
            return Err(IndexerError::ChildAbsent(index));
        }
        self.children[index]
            .node
            .as_deref()
            .ok_or(IndexerError::ChildAbsent(index))
    }

    pub fn get_child_mut(&mut self, index: usize) -> IndexerResult<&mut Node> {
        if index >= DMM_NODE_FANOUT {
            return Err(IndexerError::ChildOutOfRange(index));
        }
        if !self.has_child(index) {
            return Err(IndexerError::ChildAbsent(index));
        }
        self.children[index]
            .node
            .as_deref_mut()
            .ok_or(IndexerError::ChildAbsent(index))
    }

    /// Attaches a freshly-created child node at `index`, setting its initial
    /// `(version, hash)` routing metadata and marking the bitmap bit.
    pub fn add_child(
        &mut self,
        index: usize,
        child: Node,
        version: u64,
        hash: Hash,
    ) -> IndexerResult<()> {
        if index >= DMM_NODE_FANOUT {
            return Err(IndexerError::ChildOutOfRange(index));
        }
        self.children[index] = ChildSlot {
            version,
            hash,
            node: Some(Box::new(child)),
        };
        self.bitmap |= 1 << index;
        Ok(())
    }

    /// Overwrites only the routing metadata for slot `index` — used when a
    /// parent node records a child's new root hash without touching whatever
    /// in-memory pointer (if any) lives in that slot.
    pub fn set_child_meta(&mut self, index: usize, version: u64, hash: Hash) -> IndexerResult<()> {
        if index >= DMM_NODE_FANOUT {
            return Err(IndexerError::ChildOutOfRange(index));
        }
        self.children[index].version = version;
        self.children[index].hash = hash;
        self.bitmap |= 1 << index;
        Ok(())
    }

    pub fn recompute_hash(&mut self) {
        let mut hashes = [[0u8; 32]; DMM_NODE_FANOUT];
        for i in 0..DMM_NODE_FANOUT {
            hashes[i] = self.children[i].hash;
        }
        self.hash = hash_children(&hashes);
    }

    fn serialize_to(&self, cursor: &mut WriteCursor<'_>, is_root: bool) -> IndexerResult<()> {
        cursor.write_u8(0)?; // is_leaf_node = false
        cursor.write_u64(self.version)?;
        cursor.write_hash(&self.hash)?;
        cursor.write_u16(self.bitmap)?;
        for i in 0..DMM_NODE_FANOUT {
            cursor.write_u64(self.children[i].version)?;
            cursor.write_hash(&self.children[i].hash)?;
        }
        if is_root {
            for i in 0..DMM_NODE_FANOUT {
                if self.bitmap & (1 << i) != 0 {
                    let child = self.children[i]
                        .node
                        .as_deref()
                        .ok_or(IndexerError::MissingBasePage)?;
                    child.serialize_to(cursor, false)?;
                }
            }
        }
        Ok(())
    }

    fn deserialize_body(cursor: &mut ReadCursor<'_>, is_root: bool) -> IndexerResult<Self> {
        let version = cursor.read_u64()?;
        let hash = cursor.read_hash()?;
        let bitmap = cursor.read_u16()?;
        let mut children: [ChildSlot; DMM_NODE_FANOUT] = Default::default();
        for i in 0..DMM_NODE_FANOUT {
            children[i].version = cursor.read_u64()?;
            children[i].hash = cursor.read_hash()?;
        }
        if is_root {
            for i in 0..DMM_NODE_FANOUT {
                if bitmap & (1 << i) != 0 {
                    let child = Node::deserialize_from(cursor, false)?;
                    children[i].node = Some(Box::new(child));
                }
            }
        }
        Ok(Self {
            version,
            hash,
            bitmap,
            children,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Index(IndexNode),
}

impl Node {
    pub fn version(&self) -> u64 {
        match self {
            Node::Leaf(l) => l.version,
            Node::Index(i) => i.version,
        }
    }

    pub fn set_version(&mut self, version: u64) {
        match self {
            Node::Leaf(l) => l.version = version,
            Node::Index(i) => i.version = version,
        }
    }

    pub fn hash(&self) -> Hash {
        match self {
            Node::Leaf(l) => l.hash,
            Node::Index(i) => i.hash,
        }
    }

    pub fn set_hash(&mut self, hash: Hash) {
        match self {
            Node::Leaf(l) => l.hash = hash,
            Node::Index(i) => i.hash = hash,
        }
    }

    pub fn set_location(&mut self, location: ValueLocation) {
        match self {
            Node::Leaf(l) => l.location = location,
            Node::Index(_) => {}
        }
    }

    pub fn as_leaf(&self) -> IndexerResult<&LeafNode> {
        match self {
            Node::Leaf(l) => Ok(l),
            Node::Index(_) => Err(IndexerError::CorruptedBlock(
                "expected leaf node, found index node".into(),
            )),
        }
    }

    pub fn as_index(&self) -> IndexerResult<&IndexNode> {
        match self {
            Node::Index(i) => Ok(i),
            Node::Leaf(_) => Err(IndexerError::CorruptedBlock(
                "expected index node, found leaf node".into(),
            )),
        }
    }

    pub fn as_index_mut(&mut self) -> IndexerResult<&mut IndexNode> {
        match self {
            Node::Index(i) => Ok(i),
            Node::Leaf(_) => Err(IndexerError::CorruptedBlock(
                "expected index node, found leaf node".into(),
            )),
        }
    }

    pub fn has_child(&self, index: usize) -> bool {
        match self {
            Node::Index(i) => i.has_child(index),
            Node::Leaf(_) => false,
        }
    }

    pub fn serialize_to(&self, cursor: &mut WriteCursor<'_>, is_root: bool) -> IndexerResult<()> {
        match self {
            Node::Leaf(l) => l.serialize_to(cursor),
            Node::Index(i) => i.serialize_to(cursor, is_root),
        }
    }

    pub fn deserialize_from(cursor: &mut ReadCursor<'_>, is_root: bool) -> IndexerResult<Self> {
        let is_leaf = cursor.read_u8()? != 0;
        if is_leaf {
            Ok(Node::Leaf(LeafNode::deserialize_body(cursor)?))
        } else {
            Ok(Node::Index(IndexNode::deserialize_body(cursor, is_root)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips() {
        let mut leaf = LeafNode::new(3, b"abcd".to_vec());
        leaf.location = ValueLocation {
            file_id: 1,
            offset: 2,
            size: 3,
        };
        leaf.hash = [7u8; 32];
        let node = Node::Leaf(leaf.clone());

        let mut buf = vec![0u8; 4096];
        node.serialize_to(&mut WriteCursor::new(&mut buf), true)
            .unwrap();
        let decoded = Node::deserialize_from(&mut ReadCursor::new(&buf), true).unwrap();
        assert_eq!(decoded.as_leaf().unwrap(), &leaf);
    }

    #[test]
    fn index_node_inlines_children_only_at_root() {
        let mut root = IndexNode::new(5);
        root.add_child(
            3,
            Node::Leaf(LeafNode::new(5, b"abcd".to_vec())),
            5,
            [1u8; 32],
        )
        .unwrap();
        root.recompute_hash();
        let node = Node::Index(root.clone());

        let mut buf = vec![0u8; 4096];
        node.serialize_to(&mut WriteCursor::new(&mut buf), true)
            .unwrap();
        let decoded = Node::deserialize_from(&mut ReadCursor::new(&buf), true).unwrap();
        let decoded_index = decoded.as_index().unwrap();
        assert!(decoded_index.has_child(3));
        assert!(decoded_index.children[3].node.is_some());

        // Non-root serialization must not attempt to inline children.
        let mut buf2 = vec![0u8; 4096];
        node.serialize_to(&mut WriteCursor::new(&mut buf2), false)
            .unwrap();
        let decoded2 = Node::deserialize_from(&mut ReadCursor::new(&buf2), false).unwrap();
        let decoded2_index = decoded2.as_index().unwrap();
        assert!(decoded2_index.has_child(3));
        assert!(decoded2_index.children[3].node.is_none());
    }

    #[test]
    fn get_child_absent_is_an_error() {
        let node = IndexNode::new(0);
        assert!(matches!(
            node.get_child(2),
            Err(IndexerError::ChildAbsent(2))
        ));
    }

    #[test]
    fn get_child_out_of_range_is_an_error() {
        let node = IndexNode::new(0);
        assert!(matches!(
            node.get_child(99),
            Err(IndexerError::ChildOutOfRange(99))
        ));
    }
}
