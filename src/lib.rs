//! # blocktree: persistent block-backed B-tree index
//!
//! `blocktree` maps fixed-width keys to fixed-width values with ordered,
//! `O(log n)` lookup, insertion, and point update. All state lives in
//! fixed-size blocks behind the [`BlockStore`] trait, so an index survives
//! process restarts and runs over anything that can read and write blocks
//! at random offsets: a heap buffer, a memory-mapped file, a buffer cache
//! over a raw device.
//!
//! ## Quick start
//!
//! ```ignore
//! use blocktree::{BTreeIndex, MemoryStore};
//!
//! let mut store = MemoryStore::new(256, 16);
//! let mut index = BTreeIndex::new(2, 2, &mut store)?;
//! index.attach(0, true)?;
//!
//! index.insert(b"aa", b"AA")?;
//! index.update(b"aa", b"A2")?;
//! assert_eq!(index.lookup(b"aa")?, b"A2");
//!
//! index.detach()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Index engine (BTreeIndex)      │  attach, lookup, insert, update,
//! ├─────────────────────────────────────┤  display, sanity check
//! │      Free-list block allocator      │  LIFO chain, head in superblock
//! ├─────────────────────────────────────┤
//! │         Node codec (Node)           │  32-byte header + packed body
//! ├─────────────────────────────────────┤
//! │      Block store (BlockStore)       │  MemoryStore | MmapStore | yours
//! └─────────────────────────────────────┘
//! ```
//!
//! Block 0 holds the superblock (geometry, root block number, free-list
//! head), block 1 holds the root node, and neither ever moves. Everything
//! else is a pool threaded through a singly linked free list.
//!
//! ## Guarantees
//!
//! - Keys are unique; inserting a duplicate reports
//!   [`Error::Conflict`] and changes nothing.
//! - The root's block number is stable for the life of the index; root
//!   overflow splits downward into fresh children instead of moving.
//! - Writes are whole-block and ordered so that new blocks land before
//!   anything that references them, compatible with a journaling or
//!   copy-on-write store underneath.
//! - [`BTreeIndex::sanity_check`] verifies key order, subtree separation,
//!   uniform leaf depth, and free-list integrity in one pass.
//!
//! Deletion is recognized but unimplemented
//! ([`Error::Unimplemented`]); an index only grows.
//!
//! ## Module overview
//!
//! - [`store`]: the block substrate seam and the bundled backends
//! - [`node`]: on-disk node layout and codec
//! - [`tree`]: the index engine itself
//! - [`error`]: the operation error taxonomy

mod macros;

pub mod error;
pub mod node;
pub mod store;
pub mod tree;

pub use error::{Error, Result};
pub use node::{Node, NodeHeader, NodeKind, NODE_HEADER_SIZE, NODE_MAGIC, PTR_SIZE};
pub use store::{BlockStore, MemoryStore, MmapStore};
pub use tree::{BTreeIndex, DisplayMode, ROOT_BLOCK, SUPERBLOCK};
