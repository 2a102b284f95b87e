//! # B-tree index engine
//!
//! [`BTreeIndex`] maps fixed-width keys to fixed-width values over any
//! [`BlockStore`], keeping every piece of state in fixed-size blocks so the
//! index survives process restarts. Operations are `O(log n)` block reads:
//! lookup, insert (with node splitting), and point update. Deletion is
//! recognized but unimplemented, so the structure never shrinks.
//!
//! ## On-disk layout
//!
//! ```text
//! Block 0   Superblock: geometry, root block number, free-list head
//! Block 1   Root node, which never moves for the life of the index
//! Block 2+  Pool: interior nodes, leaves, and the free chain
//! ```
//!
//! The root's block number is load-bearing: when the root overflows, its
//! contents move into two freshly allocated children and the root block is
//! rewritten in place with a single separator. External references to
//! block 1 stay valid forever.
//!
//! ## Ordering
//!
//! Keys order lexicographically by byte. An interior node with keys
//! k₀ < … < kₙ₋₁ and children c₀ … cₙ routes a probe to the first child
//! whose separator is ≥ the probe; subtree(cᵢ) holds keys ≤ kᵢ and the last
//! child holds everything greater. Keys are unique; inserting a duplicate
//! reports `Conflict` and changes nothing.
//!
//! ## Lifecycle
//!
//! ```ignore
//! let mut store = MemoryStore::new(256, 16);
//! let mut index = BTreeIndex::new(2, 2, &mut store)?;
//! index.attach(0, true)?;          // lay out superblock, root, free chain
//! index.insert(b"aa", b"AA")?;
//! assert_eq!(index.lookup(b"aa")?, b"AA");
//! index.detach()?;                 // write the superblock back
//! ```
//!
//! Re-opening is `attach(0, false)`: the superblock is read from block 0
//! and its geometry adopted, whatever sizes the constructor was given.
//!
//! ## Write ordering
//!
//! The engine is not transactional; it guarantees an ordering compatible
//! with a journaling or copy-on-write store underneath:
//!
//! - a freshly allocated block is serialized before any existing block
//!   that points at it,
//! - a deallocated block's new contents land before the superblock head
//!   moves to it,
//! - the superblock is re-serialized on every free-list mutation.
//!
//! A crash between a child's split and the parent's update can leak an
//! allocated block but never corrupt the tree.
//!
//! ## Concurrency
//!
//! Single-threaded by construction: the engine exclusively borrows its
//! store, runs every call to completion, and holds nodes only as private
//! copies. Wrap the whole index in a lock if you need sharing.

mod alloc;
mod display;
mod insert;
mod sanity;

pub use display::DisplayMode;

use tracing::debug;

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind, NODE_HEADER_SIZE, PTR_SIZE};
use crate::store::BlockStore;

/// Block number of the superblock.
pub const SUPERBLOCK: u32 = 0;

/// Block number of the root node.
pub const ROOT_BLOCK: u32 = 1;

#[derive(Debug)]
pub struct BTreeIndex<'s, S: BlockStore> {
    store: &'s mut S,
    superblock: Node,
    superblock_block: u32,
}

impl<'s, S: BlockStore> BTreeIndex<'s, S> {
    /// Creates an engine over `store` with the given key/value widths.
    ///
    /// Nothing is read or written until [`attach`](Self::attach). The
    /// geometry must leave room for at least one pair per leaf and two
    /// separators per interior node, and the store needs at least a
    /// superblock and a root.
    pub fn new(key_size: u32, value_size: u32, store: &'s mut S) -> Result<Self> {
        let block_size = store.block_size();

        if key_size == 0 || value_size == 0 {
            return Err(Error::BadConfig(format!(
                "key and value sizes must be non-zero (got {}/{})",
                key_size, value_size
            )));
        }
        let leaf_floor = NODE_HEADER_SIZE + (key_size + value_size) as usize;
        let interior_floor = NODE_HEADER_SIZE + PTR_SIZE + 2 * (key_size as usize + PTR_SIZE);
        if block_size < leaf_floor || block_size < interior_floor {
            return Err(Error::BadConfig(format!(
                "block size {} too small for geometry {}/{} (need at least {})",
                block_size,
                key_size,
                value_size,
                leaf_floor.max(interior_floor)
            )));
        }
        if store.num_blocks() < 2 {
            return Err(Error::BadConfig(format!(
                "store has {} blocks; a superblock and a root are required",
                store.num_blocks()
            )));
        }

        let superblock = Node::alloc(NodeKind::Superblock, key_size, value_size, block_size as u32);
        Ok(Self {
            store,
            superblock,
            superblock_block: SUPERBLOCK,
        })
    }

    /// Key width in bytes.
    pub fn key_size(&self) -> u32 {
        self.superblock.key_size()
    }

    /// Value width in bytes.
    pub fn value_size(&self) -> u32 {
        self.superblock.value_size()
    }

    /// Mounts the index. With `create`, first lays out a fresh superblock
    /// at block 0, an empty root at block 1, and threads every remaining
    /// block into the free chain in ascending order. Either way the
    /// superblock is then read back from the store and its geometry
    /// adopted.
    pub fn attach(&mut self, init_block: u32, create: bool) -> Result<()> {
        if init_block != SUPERBLOCK {
            return Err(Error::BadConfig(format!(
                "superblock must live at block {}, not {}",
                SUPERBLOCK, init_block
            )));
        }
        self.superblock_block = init_block;

        if create {
            self.format_store()?;
        }

        let superblock = Node::read_from(&*self.store, self.superblock_block)?;
        if superblock.kind() != NodeKind::Superblock {
            return Err(Error::Insane(format!(
                "block {} holds a {:?} node, not a superblock",
                self.superblock_block,
                superblock.kind()
            )));
        }
        self.validate_geometry(&superblock)?;
        self.superblock = superblock;

        debug!(
            create,
            root = self.superblock.header().root_block(),
            free_head = self.superblock.header().free_list_head(),
            key_size = self.key_size(),
            value_size = self.value_size(),
            "attached index"
        );
        Ok(())
    }

    /// Serializes the superblock back to its block. The tree itself is
    /// already durable because every mutation writes through.
    pub fn detach(&mut self) -> Result<()> {
        self.superblock
            .write_to(&mut *self.store, self.superblock_block)?;
        debug!("detached index");
        Ok(())
    }

    /// Retrieves the value stored under `key`.
    pub fn lookup(&self, key: &[u8]) -> Result<Vec<u8>> {
        let root = self.root_block()?;
        self.lookup_in(root, key)
    }

    /// Overwrites the value stored under `key` in place.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.len() != self.value_size() as usize {
            return Err(Error::Size(format!(
                "value width {} != {}",
                value.len(),
                self.value_size()
            )));
        }
        let root = self.root_block()?;
        self.update_in(root, key, value)
    }

    /// Deletion is not implemented; blocks are never returned to the free
    /// list by the tree.
    pub fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(Error::Unimplemented)
    }

    fn format_store(&mut self) -> Result<()> {
        let num_blocks = self.store.num_blocks();
        let (key_size, value_size, block_size) = self.geometry();

        let free_head = if num_blocks > 2 { 2 } else { 0 };
        let header = self.superblock.header_mut();
        header.set_root_block(ROOT_BLOCK);
        header.set_free_list_head(free_head);
        header.set_num_keys(0);

        self.store.notify_allocate(SUPERBLOCK);
        self.superblock
            .write_to(&mut *self.store, self.superblock_block)?;

        let mut root = Node::alloc(NodeKind::Root, key_size, value_size, block_size);
        root.header_mut().set_root_block(ROOT_BLOCK);
        self.store.notify_allocate(ROOT_BLOCK);
        root.write_to(&mut *self.store, ROOT_BLOCK)?;

        for block in 2..num_blocks {
            let mut free = Node::alloc(NodeKind::Unallocated, key_size, value_size, block_size);
            free.header_mut().set_root_block(ROOT_BLOCK);
            let next = if block + 1 == num_blocks { 0 } else { block + 1 };
            free.header_mut().set_free_list_head(next);
            free.write_to(&mut *self.store, block)?;
        }

        debug!(num_blocks, free_head, "formatted store");
        Ok(())
    }

    fn validate_geometry(&self, superblock: &Node) -> Result<()> {
        let key_size = superblock.key_size();
        let value_size = superblock.value_size();
        let block_size = superblock.block_size() as usize;

        if key_size == 0 || value_size == 0 {
            return Err(Error::BadConfig(format!(
                "superblock records zero-width geometry ({}/{})",
                key_size, value_size
            )));
        }
        let leaf_floor = NODE_HEADER_SIZE + (key_size + value_size) as usize;
        let interior_floor = NODE_HEADER_SIZE + PTR_SIZE + 2 * (key_size as usize + PTR_SIZE);
        if block_size < leaf_floor || block_size < interior_floor {
            return Err(Error::BadConfig(format!(
                "superblock geometry {}/{} does not fit block size {}",
                key_size, value_size, block_size
            )));
        }
        Ok(())
    }

    pub(crate) fn geometry(&self) -> (u32, u32, u32) {
        (
            self.superblock.key_size(),
            self.superblock.value_size(),
            self.superblock.block_size(),
        )
    }

    pub(crate) fn root_block(&self) -> Result<u32> {
        let root = self.superblock.header().root_block();
        if root == 0 {
            return Err(Error::BadConfig("index is not attached".into()));
        }
        Ok(root)
    }

    /// Builds an empty in-memory node carrying the index geometry.
    pub(crate) fn blank_node(&self, kind: NodeKind) -> Node {
        let (key_size, value_size, block_size) = self.geometry();
        let mut node = Node::alloc(kind, key_size, value_size, block_size);
        node.header_mut()
            .set_root_block(self.superblock.header().root_block());
        node
    }

    /// Index of the child to descend into for `key`: the first separator
    /// that is ≥ the probe, or the last child when none is.
    pub(crate) fn child_index(node: &Node, key: &[u8]) -> Result<u32> {
        let count = node.num_keys();
        for i in 0..count {
            if key <= node.key_at(i)? {
                return Ok(i);
            }
        }
        Ok(count)
    }

    fn lookup_in(&self, block: u32, key: &[u8]) -> Result<Vec<u8>> {
        let node = Node::read_from(&*self.store, block)?;
        match node.kind() {
            NodeKind::Root | NodeKind::Interior => {
                if node.num_keys() == 0 {
                    // Freshly created tree: nowhere to descend.
                    return Err(Error::NonExistent);
                }
                let idx = Self::child_index(&node, key)?;
                self.lookup_in(node.ptr_at(idx)?, key)
            }
            NodeKind::Leaf => {
                for i in 0..node.num_keys() {
                    if node.key_at(i)? == key {
                        return Ok(node.value_at(i)?.to_vec());
                    }
                }
                Err(Error::NonExistent)
            }
            kind => Err(Error::Insane(format!(
                "lookup descended into a {:?} node at block {}",
                kind, block
            ))),
        }
    }

    fn update_in(&mut self, block: u32, key: &[u8], value: &[u8]) -> Result<()> {
        let mut node = Node::read_from(&*self.store, block)?;
        match node.kind() {
            NodeKind::Root | NodeKind::Interior => {
                if node.num_keys() == 0 {
                    return Err(Error::NonExistent);
                }
                let idx = Self::child_index(&node, key)?;
                let child = node.ptr_at(idx)?;
                self.update_in(child, key, value)
            }
            NodeKind::Leaf => {
                for i in 0..node.num_keys() {
                    if node.key_at(i)? == key {
                        node.set_value(i, value)?;
                        return node.write_to(&mut *self.store, block);
                    }
                }
                Err(Error::NonExistent)
            }
            kind => Err(Error::Insane(format!(
                "update descended into a {:?} node at block {}",
                kind, block
            ))),
        }
    }
}
