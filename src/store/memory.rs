//! Heap-backed block store.

use std::io;

use tracing::trace;

use crate::error::{Error, Result};
use crate::store::BlockStore;

/// A [`BlockStore`] over one contiguous heap allocation.
///
/// Blocks start zero-filled. The store keeps a log of the allocation
/// notifications it receives, so callers can verify the advisory contract
/// is honored; the log grows with index activity and is never trimmed.
#[derive(Debug)]
pub struct MemoryStore {
    block_size: usize,
    data: Vec<u8>,
    notified_allocs: Vec<u32>,
    notified_deallocs: Vec<u32>,
}

impl MemoryStore {
    pub fn new(block_size: usize, num_blocks: u32) -> Self {
        Self {
            block_size,
            data: vec![0u8; block_size * num_blocks as usize],
            notified_allocs: Vec::new(),
            notified_deallocs: Vec::new(),
        }
    }

    /// Blocks the index has reported as allocated, in call order.
    pub fn notified_allocs(&self) -> &[u32] {
        &self.notified_allocs
    }

    /// Blocks the index has reported as released, in call order.
    pub fn notified_deallocs(&self) -> &[u32] {
        &self.notified_deallocs
    }

    fn check_access(&self, block: u32, buf_len: usize) -> Result<usize> {
        if block as u64 * self.block_size as u64 >= self.data.len() as u64 {
            return Err(Error::Disk(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block {} out of range", block),
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

impl BlockStore for MemoryStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn num_blocks(&self) -> u32 {
        (self.data.len() / self.block_size) as u32
    }

    fn read(&self, block: u32, buf: &mut [u8]) -> Result<()> {
        let offset = self.check_access(block, buf.len())?;
        buf.copy_from_slice(&self.data[offset..offset + self.block_size]);
        Ok(())
    }

    fn write(&mut self, block: u32, buf: &[u8]) -> Result<()> {
        let offset = self.check_access(block, buf.len())?;
        self.data[offset..offset + self.block_size].copy_from_slice(buf);
        Ok(())
    }

    fn notify_allocate(&mut self, block: u32) {
        trace!(block, "allocate notification");
        self.notified_allocs.push(block);
    }

    fn notify_deallocate(&mut self, block: u32) {
        trace!(block, "deallocate notification");
        self.notified_deallocs.push(block);
    }
}
