//! # Block store abstraction
//!
//! The index never touches files or memory directly; all persistent state
//! flows through the [`BlockStore`] trait, an array of fixed-size blocks
//! addressed by number. Anything that can read and write whole blocks at
//! random offsets can host an index: a heap buffer, a memory-mapped file, a
//! buffer cache in front of a raw device.
//!
//! ## Addressing
//!
//! Blocks are numbered `0..num_blocks`. Block 0 is reserved for the index
//! superblock and block 1 for the root node; the rest form an allocation
//! pool managed by the index's free list. Block number 0 doubles as the
//! null pointer inside the free-list chain, which works because the
//! superblock itself is never a chain member.
//!
//! ## Transfer semantics
//!
//! `read` and `write` copy whole blocks between the store and a caller
//! buffer of exactly `block_size` bytes. Partial transfers do not exist at
//! this seam; a buffer of the wrong length is rejected with
//! [`Error::Size`](crate::Error::Size) before any I/O happens, and
//! addressing or media failures surface as
//! [`Error::Disk`](crate::Error::Disk).
//!
//! ## Allocation notifications
//!
//! `notify_allocate`/`notify_deallocate` are advisory callbacks issued by
//! the index on every successful block allocation and release. A caching
//! store can use them to manage pinning or prefetch; the bundled stores log
//! the traffic. They carry no failure channel; allocation
//! bookkeeping lives in the free list, not in the store.
//!
//! ## Bundled stores
//!
//! - [`MemoryStore`]: heap-backed, the default substrate for tests and
//!   throwaway indexes.
//! - [`MmapStore`]: a single memory-mapped file, for indexes that persist.

mod memory;
mod mmap;

pub use memory::MemoryStore;
pub use mmap::MmapStore;

use crate::error::Result;

pub trait BlockStore {
    /// Size of every block in bytes.
    fn block_size(&self) -> usize;

    /// Total number of addressable blocks.
    fn num_blocks(&self) -> u32;

    /// Copies block `block` into `buf`. `buf` must be exactly one block long.
    fn read(&self, block: u32, buf: &mut [u8]) -> Result<()>;

    /// Overwrites block `block` with `buf`. `buf` must be exactly one block long.
    fn write(&mut self, block: u32, buf: &[u8]) -> Result<()>;

    /// Advisory: the index took `block` off the free list.
    fn notify_allocate(&mut self, block: u32);

    /// Advisory: the index returned `block` to the free list.
    fn notify_deallocate(&mut self, block: u32);
}
