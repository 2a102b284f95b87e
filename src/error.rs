//! Error types for index operations.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! form a closed taxonomy so callers can match on the outcome of an
//! operation: input problems (`Size`, `NonExistent`, `Conflict`), resource
//! exhaustion (`NoSpace`, `Disk`), and structural damage (`BadConfig`,
//! `Insane`). Corruption detected by the allocator's kind assertions is not
//! represented here; those abort, because a tree that hands out allocated
//! blocks as free is beyond recovery.

use thiserror::Error;

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A key, value, or buffer length disagrees with the configured
    /// geometry, or a node accessor index is out of bounds.
    #[error("size mismatch: {0}")]
    Size(String),

    /// The requested key is not present in the index.
    #[error("key not present in index")]
    NonExistent,

    /// An insert collided with a key that is already present.
    #[error("key already present in index")]
    Conflict,

    /// The free list is empty; no block is left to allocate.
    #[error("no free blocks available")]
    NoSpace,

    /// A structural invariant does not hold, or the index was configured
    /// with unusable geometry.
    #[error("bad configuration or structure: {0}")]
    BadConfig(String),

    /// A block decoded to an unknown node kind, or descent reached a state
    /// the tree invariants rule out. Indicates corruption or a bug.
    #[error("corrupt node structure: {0}")]
    Insane(String),

    /// The operation is recognized but not implemented.
    #[error("operation not implemented")]
    Unimplemented,

    /// The block substrate reported an I/O failure.
    #[error("block store i/o failure")]
    Disk(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_wraps_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::from(io);

        assert!(matches!(err, Error::Disk(_)));
        assert_eq!(err.to_string(), "block store i/o failure");
    }

    #[test]
    fn size_carries_context() {
        let err = Error::Size("key width 3 != 2".into());

        assert!(err.to_string().contains("key width 3"));
    }
}
