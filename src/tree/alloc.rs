//! Free-list block allocation.
//!
//! Unallocated blocks form a LIFO chain: the superblock holds the head,
//! each free block's `free_list_head` field points at the next, and zero
//! terminates. Allocation pops the head; release pushes. The chain is laid
//! out in ascending block order at format time and mutates from there.
//!
//! The kind assertions here are corruption detectors, not error paths: a
//! free list that hands out a live block (or swallows one) means the
//! on-disk structure is already lost, so they abort.

use tracing::debug;

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};
use crate::store::BlockStore;

use super::BTreeIndex;

impl<'s, S: BlockStore> BTreeIndex<'s, S> {
    /// Pops a block off the free list. Fails with `NoSpace` when the pool
    /// is exhausted. The superblock is re-serialized before the block is
    /// reported allocated.
    pub fn allocate_block(&mut self) -> Result<u32> {
        let head = self.superblock.header().free_list_head();
        if head == 0 {
            return Err(Error::NoSpace);
        }

        let node = Node::read_from(&*self.store, head)?;
        assert!(
            node.kind() == NodeKind::Unallocated,
            "free-list head {} is a {:?} node; the free list is corrupt",
            head,
            node.kind()
        );

        let next = node.header().free_list_head();
        self.superblock.header_mut().set_free_list_head(next);
        self.superblock
            .write_to(&mut *self.store, self.superblock_block)?;
        self.store.notify_allocate(head);

        debug!(block = head, next_head = next, "allocated block");
        Ok(head)
    }

    /// Pushes `block` onto the free list. The block's new contents are
    /// written before the superblock head moves, so a crash in between
    /// never leaves the chain pointing at a live node.
    pub fn deallocate_block(&mut self, block: u32) -> Result<()> {
        let mut node = Node::read_from(&*self.store, block)?;
        assert!(
            node.kind() != NodeKind::Unallocated,
            "double free of block {}",
            block
        );

        let old_head = self.superblock.header().free_list_head();
        let header = node.header_mut();
        header.set_kind(NodeKind::Unallocated);
        header.set_num_keys(0);
        header.set_free_list_head(old_head);
        node.write_to(&mut *self.store, block)?;

        self.superblock.header_mut().set_free_list_head(block);
        self.superblock
            .write_to(&mut *self.store, self.superblock_block)?;
        self.store.notify_deallocate(block);

        debug!(block, old_head, "deallocated block");
        Ok(())
    }
}
