//! # Insertion and node splitting
//!
//! Insertion descends recursively from the root. A child that had room
//! absorbs the pair and the recursion unwinds with [`InsertOutcome::Done`];
//! a child that split hands its parent an [`InsertOutcome::Split`] carrying
//! the promoted separator and the two blocks that now replace it. The
//! parent splices the pair in, splitting itself in turn if full.
//!
//! ## Split mechanics
//!
//! All three split sites share one shape: gather the node's live entries
//! plus the incoming one into scratch vectors (in sorted order, with the
//! descended child pointer replaced by the left/right pair), then cut at
//! the midpoint of the pre-insertion count:
//!
//! ```text
//! leaf:      left = merged[..=mid]      right = merged[mid+1..]
//!            separator = merged[mid].key          (stays in the leaf)
//!
//! interior:  left = merged[..mid]       right = merged[mid+1..]
//!            separator = merged[mid]        (moves up, leaves the node)
//! ```
//!
//! The promoted separator is always the largest key of the post-insertion
//! left half, which keeps the ≤-routing invariant intact; in particular,
//! when the incoming separator itself ends up largest-in-left, the merge
//! order already placed its left block as the left half's trailing child
//! and its right block as the right half's first child, with no special case.
//!
//! ## Root splits
//!
//! The root never moves. When it overflows, both halves go into freshly
//! allocated children and the root block is rewritten in place with the
//! single promoted separator between them. Depth grows by one and every
//! leaf stays at the same distance from the root.
//!
//! ## Write ordering
//!
//! Freshly allocated right/child blocks are serialized before the existing
//! block that will point at them, and parents only update after their
//! child's blocks are on the store. A crash mid-split leaks at most an
//! unreferenced block.

use smallvec::SmallVec;
use tracing::debug;

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};
use crate::store::BlockStore;

use super::BTreeIndex;

/// Owned scratch copy of a key or value; inline for the small fixed widths
/// an index typically carries.
pub(crate) type ByteBuf = SmallVec<[u8; 16]>;

/// What a recursive insertion step tells its parent.
pub(crate) enum InsertOutcome {
    /// The subtree absorbed the pair; nothing changes above.
    Done,
    /// The child was replaced by `left` and `right` with `separator`
    /// promoted between them.
    Split {
        separator: ByteBuf,
        left: u32,
        right: u32,
    },
}

impl<'s, S: BlockStore> BTreeIndex<'s, S> {
    /// Inserts a new pair. Fails with `Size` on width mismatch, `Conflict`
    /// if the key is already present, and `NoSpace` when a needed block
    /// cannot be allocated.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() != self.key_size() as usize {
            return Err(Error::Size(format!(
                "key width {} != {}",
                key.len(),
                self.key_size()
            )));
        }
        if value.len() != self.value_size() as usize {
            return Err(Error::Size(format!(
                "value width {} != {}",
                value.len(),
                self.value_size()
            )));
        }

        let root_block = self.root_block()?;

        // Keys are unique; only a clean miss may proceed.
        match self.lookup(key) {
            Err(Error::NonExistent) => {}
            Ok(_) => return Err(Error::Conflict),
            Err(e) => return Err(e),
        }

        let root = Node::read_from(&*self.store, root_block)?;
        if root.kind() != NodeKind::Root {
            return Err(Error::Insane(format!(
                "block {} holds a {:?} node, not the root",
                root_block,
                root.kind()
            )));
        }

        if root.num_keys() == 0 {
            return self.insert_first(root, root_block, key, value);
        }

        match self.insert_descend(root_block, key, value)? {
            InsertOutcome::Done => Ok(()),
            InsertOutcome::Split { .. } => Err(Error::Insane(
                "a split escaped past the root".into(),
            )),
        }
    }

    /// First insertion into an empty tree: one leaf for the pair, one
    /// empty leaf for everything greater, and a single separator in the
    /// root.
    fn insert_first(
        &mut self,
        mut root: Node,
        root_block: u32,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let left = self.allocate_block()?;
        let right = self.allocate_block()?;

        let mut leaf = self.blank_node(NodeKind::Leaf);
        leaf.write_to(&mut *self.store, right)?;

        leaf.insert_pair(0, key, value)?;
        leaf.write_to(&mut *self.store, left)?;

        root.header_mut().set_num_keys(1);
        root.set_key(0, key)?;
        root.set_ptr(0, left)?;
        root.set_ptr(1, right)?;
        root.write_to(&mut *self.store, root_block)?;

        debug!(left, right, "seeded empty tree");
        Ok(())
    }

    fn insert_descend(&mut self, block: u32, key: &[u8], value: &[u8]) -> Result<InsertOutcome> {
        let node = Node::read_from(&*self.store, block)?;
        match node.kind() {
            NodeKind::Leaf => self.insert_into_leaf(block, node, key, value),
            NodeKind::Root | NodeKind::Interior => {
                if node.num_keys() == 0 {
                    return Err(Error::Insane(format!(
                        "interior node at block {} has no keys",
                        block
                    )));
                }
                let idx = Self::child_index(&node, key)?;
                let child = node.ptr_at(idx)?;
                match self.insert_descend(child, key, value)? {
                    InsertOutcome::Done => Ok(InsertOutcome::Done),
                    InsertOutcome::Split {
                        separator,
                        left,
                        right,
                    } => self.absorb_split(block, node, idx, separator, left, right),
                }
            }
            kind => Err(Error::Insane(format!(
                "insert descended into a {:?} node at block {}",
                kind, block
            ))),
        }
    }

    fn insert_into_leaf(
        &mut self,
        block: u32,
        mut node: Node,
        key: &[u8],
        value: &[u8],
    ) -> Result<InsertOutcome> {
        let count = node.num_keys();

        if count < node.leaf_slots() {
            let mut idx = count;
            for i in 0..count {
                if key < node.key_at(i)? {
                    idx = i;
                    break;
                }
            }
            node.insert_pair(idx, key, value)?;
            node.write_to(&mut *self.store, block)?;
            return Ok(InsertOutcome::Done);
        }

        self.split_leaf(block, node, key, value)
    }

    fn split_leaf(
        &mut self,
        block: u32,
        node: Node,
        key: &[u8],
        value: &[u8],
    ) -> Result<InsertOutcome> {
        let right_block = self.allocate_block()?;

        let count = node.num_keys() as usize;
        let mut keys: Vec<ByteBuf> = Vec::with_capacity(count + 1);
        let mut values: Vec<ByteBuf> = Vec::with_capacity(count + 1);
        for i in 0..count as u32 {
            keys.push(ByteBuf::from_slice(node.key_at(i)?));
            values.push(ByteBuf::from_slice(node.value_at(i)?));
        }
        let pos = keys
            .iter()
            .position(|k| key < k.as_slice())
            .unwrap_or(count);
        keys.insert(pos, ByteBuf::from_slice(key));
        values.insert(pos, ByteBuf::from_slice(value));

        let mid = count / 2;

        // Right sibling first: nothing points at it yet.
        let right = self.leaf_from_pairs(&keys[mid + 1..], &values[mid + 1..])?;
        right.write_to(&mut *self.store, right_block)?;

        let left = self.leaf_from_pairs(&keys[..=mid], &values[..=mid])?;
        left.write_to(&mut *self.store, block)?;

        debug!(
            left = block,
            right = right_block,
            left_pairs = mid + 1,
            right_pairs = keys.len() - mid - 1,
            "split leaf"
        );

        Ok(InsertOutcome::Split {
            separator: keys[mid].clone(),
            left: block,
            right: right_block,
        })
    }

    /// Splices a child's split into this interior/root node, splitting it
    /// in turn when full.
    fn absorb_split(
        &mut self,
        block: u32,
        mut node: Node,
        idx: u32,
        separator: ByteBuf,
        left: u32,
        right: u32,
    ) -> Result<InsertOutcome> {
        if node.num_keys() < node.interior_slots() {
            node.insert_separator(idx, &separator, left, right)?;
            node.write_to(&mut *self.store, block)?;
            return Ok(InsertOutcome::Done);
        }

        let (keys, ptrs) = Self::merge_split(&node, idx, &separator, left, right)?;
        let mid = node.num_keys() as usize / 2;

        if node.kind() == NodeKind::Root {
            self.split_root(block, &keys, &ptrs, mid)?;
            Ok(InsertOutcome::Done)
        } else {
            self.split_interior(block, &keys, &ptrs, mid)
        }
    }

    /// Node contents with the incoming separator and child pair spliced in
    /// at the descent position.
    fn merge_split(
        node: &Node,
        idx: u32,
        separator: &[u8],
        left: u32,
        right: u32,
    ) -> Result<(Vec<ByteBuf>, Vec<u32>)> {
        let count = node.num_keys();
        let mut keys: Vec<ByteBuf> = Vec::with_capacity(count as usize + 1);
        let mut ptrs: Vec<u32> = Vec::with_capacity(count as usize + 2);
        for i in 0..count {
            keys.push(ByteBuf::from_slice(node.key_at(i)?));
        }
        for i in 0..=count {
            ptrs.push(node.ptr_at(i)?);
        }

        keys.insert(idx as usize, ByteBuf::from_slice(separator));
        ptrs[idx as usize] = left;
        ptrs.insert(idx as usize + 1, right);

        Ok((keys, ptrs))
    }

    fn split_interior(
        &mut self,
        block: u32,
        keys: &[ByteBuf],
        ptrs: &[u32],
        mid: usize,
    ) -> Result<InsertOutcome> {
        let right_block = self.allocate_block()?;

        let right = self.interior_from_parts(NodeKind::Interior, &keys[mid + 1..], &ptrs[mid + 1..])?;
        right.write_to(&mut *self.store, right_block)?;

        let left = self.interior_from_parts(NodeKind::Interior, &keys[..mid], &ptrs[..=mid])?;
        left.write_to(&mut *self.store, block)?;

        debug!(
            left = block,
            right = right_block,
            "split interior node"
        );

        Ok(InsertOutcome::Split {
            separator: keys[mid].clone(),
            left: block,
            right: right_block,
        })
    }

    /// The root overflowed: move both halves into fresh children and
    /// rewrite the root in place with the single promoted separator, so
    /// the root's block number survives.
    fn split_root(&mut self, root_block: u32, keys: &[ByteBuf], ptrs: &[u32], mid: usize) -> Result<()> {
        let new_left = self.allocate_block()?;
        let new_right = self.allocate_block()?;

        let right = self.interior_from_parts(NodeKind::Interior, &keys[mid + 1..], &ptrs[mid + 1..])?;
        right.write_to(&mut *self.store, new_right)?;

        let left = self.interior_from_parts(NodeKind::Interior, &keys[..mid], &ptrs[..=mid])?;
        left.write_to(&mut *self.store, new_left)?;

        let mut root = self.blank_node(NodeKind::Root);
        root.header_mut().set_num_keys(1);
        root.set_key(0, &keys[mid])?;
        root.set_ptr(0, new_left)?;
        root.set_ptr(1, new_right)?;
        root.write_to(&mut *self.store, root_block)?;

        debug!(new_left, new_right, "split root in place");
        Ok(())
    }

    fn leaf_from_pairs(&self, keys: &[ByteBuf], values: &[ByteBuf]) -> Result<Node> {
        let mut node = self.blank_node(NodeKind::Leaf);
        node.header_mut().set_num_keys(keys.len() as u32);
        for (i, (key, value)) in keys.iter().zip(values).enumerate() {
            node.set_key(i as u32, key)?;
            node.set_value(i as u32, value)?;
        }
        Ok(node)
    }

    fn interior_from_parts(&self, kind: NodeKind, keys: &[ByteBuf], ptrs: &[u32]) -> Result<Node> {
        let mut node = self.blank_node(kind);
        node.header_mut().set_num_keys(keys.len() as u32);
        for (i, key) in keys.iter().enumerate() {
            node.set_key(i as u32, key)?;
        }
        for (i, ptr) in ptrs.iter().enumerate() {
            node.set_ptr(i as u32, *ptr)?;
        }
        Ok(node)
    }
}
