//! # Memory-mapped file store
//!
//! [`MmapStore`] backs a block store with a single file mapped into the
//! process address space. Reads and writes are plain memory copies against
//! the mapping; the OS page cache absorbs the I/O and `sync` forces dirty
//! pages to the medium.
//!
//! ## File format
//!
//! The file is exactly `num_blocks * block_size` bytes of concatenated
//! blocks, nothing else:
//!
//! ```text
//! Offset 0:               Block 0 (superblock)
//! Offset block_size:      Block 1 (root)
//! Offset 2 * block_size:  Block 2
//! ...
//! ```
//!
//! The block size is not recorded in the file (the index superblock inside
//! block 0 carries the geometry), so `open` takes it as a parameter and
//! validates that the file length divides evenly.
//!
//! ## Capacity
//!
//! The block count is fixed at creation. An index manages reuse through its
//! free list and reports `NoSpace` when the pool is exhausted; growing the
//! file under a live mapping is deliberately unsupported.
//!
//! ## Durability
//!
//! `write` only updates the mapping. Callers that need bytes on the medium
//! call [`MmapStore::sync`] after detaching the index.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::MmapMut;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::BlockStore;

#[derive(Debug)]
pub struct MmapStore {
    mmap: MmapMut,
    block_size: usize,
    num_blocks: u32,
}

impl MmapStore {
    /// Creates (or truncates) `path` sized for `num_blocks` blocks and maps it.
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize, num_blocks: u32) -> Result<Self> {
        let path = path.as_ref();

        if block_size == 0 || num_blocks == 0 {
            return Err(Error::BadConfig(format!(
                "unusable store geometry: block_size={}, num_blocks={}",
                block_size, num_blocks
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.set_len(block_size as u64 * num_blocks as u64)?;

        // SAFETY: map_mut is unsafe because the file could be modified
        // externally while mapped. This is sound here because:
        // 1. The file was just created with truncate, so no other mapping
        //    of prior contents exists.
        // 2. Index files are single-owner by contract (§ single-threaded
        //    engine); nothing else writes them while the store is live.
        // 3. The mapping's lifetime is tied to MmapStore, and all access
        //    goes through read/write which bounds-check the block number.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        debug!(path = %path.display(), block_size, num_blocks, "created mmap store");

        Ok(Self {
            mmap,
            block_size,
            num_blocks,
        })
    }

    /// Maps an existing store file. The file length must be a non-zero
    /// multiple of `block_size`.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_size = file.metadata()?.len();

        if file_size == 0 || block_size == 0 || file_size % block_size as u64 != 0 {
            return Err(Error::BadConfig(format!(
                "file '{}' length {} is not a non-zero multiple of block size {}",
                path.display(),
                file_size,
                block_size
            )));
        }

        // SAFETY: same reasoning as in `create`: single-owner file, mapping
        // lifetime tied to the store, bounds-checked access.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let num_blocks = (file_size / block_size as u64) as u32;
        debug!(path = %path.display(), block_size, num_blocks, "opened mmap store");

        Ok(Self {
            mmap,
            block_size,
            num_blocks,
        })
    }

    /// Flushes dirty pages of the mapping to the medium.
    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().map_err(Error::Disk)
    }

    fn check_access(&self, block: u32, buf_len: usize) -> Result<usize> {
        if block >= self.num_blocks {
            return Err(Error::Disk(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block {} out of range (num_blocks={})", block, self.num_blocks),
            )));
        }
        if buf_len != self.block_size {
            return Err(Error::Size(format!(
                "buffer length {} != block size {}",
                buf_len, self.block_size
            )));
        }
        Ok(block as usize * self.block_size)
    }
}

impl BlockStore for MmapStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn read(&self, block: u32, buf: &mut [u8]) -> Result<()> {
        let offset = self.check_access(block, buf.len())?;
        buf.copy_from_slice(&self.mmap[offset..offset + self.block_size]);
        Ok(())
    }

    fn write(&mut self, block: u32, buf: &[u8]) -> Result<()> {
        let offset = self.check_access(block, buf.len())?;
        self.mmap[offset..offset + self.block_size].copy_from_slice(buf);
        Ok(())
    }

    fn notify_allocate(&mut self, _block: u32) {}

    fn notify_deallocate(&mut self, _block: u32) {}
}
