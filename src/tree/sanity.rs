//! Structural checking.
//!
//! [`BTreeIndex::sanity_check`] walks the whole structure and verifies the
//! invariants every operation is supposed to preserve:
//!
//! - keys strictly ascend within every node,
//! - every separator and leaf key falls inside the bounds its ancestors
//!   impose (child *i* covers the half-open range above key *i−1* up to
//!   and including key *i*),
//! - all leaves sit at the same depth,
//! - reached blocks are root/interior/leaf nodes and none is reached
//!   twice,
//! - every block on the free chain is unallocated, the chain is acyclic,
//!   and it never aliases a live block.
//!
//! Violations surface as `BadConfig` naming the offending block. Blocks
//! that fail to decode at all (foreign magic, unknown kind byte) surface
//! as the codec's `Insane` instead; by the time the bytes are garbage,
//! structural diagnostics have nothing to say.

use hashbrown::HashSet;

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};
use crate::store::BlockStore;

use super::BTreeIndex;

impl<'s, S: BlockStore> BTreeIndex<'s, S> {
    /// Verifies the tree and the free list; `Ok(())` means every invariant
    /// holds.
    pub fn sanity_check(&self) -> Result<()> {
        let root = self.root_block()?;

        let mut seen = HashSet::new();
        seen.insert(self.superblock_block);

        let mut leaf_depth = None;
        self.check_block(root, 0, None, None, &mut seen, &mut leaf_depth)?;
        self.check_free_chain(&seen)
    }

    fn check_block(
        &self,
        block: u32,
        depth: u32,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        seen: &mut HashSet<u32>,
        leaf_depth: &mut Option<u32>,
    ) -> Result<()> {
        if !seen.insert(block) {
            return Err(Error::BadConfig(format!(
                "block {} is reachable through two paths",
                block
            )));
        }

        let node = Node::read_from(&*self.store, block)?;
        let is_root = depth == 0;

        match node.kind() {
            NodeKind::Root if is_root => {}
            NodeKind::Interior | NodeKind::Leaf if !is_root => {}
            kind => {
                return Err(Error::BadConfig(format!(
                    "block {} at depth {} has kind {:?}",
                    block, depth, kind
                )))
            }
        }

        let count = node.num_keys();
        for i in 0..count {
            let key = node.key_at(i)?;
            if i > 0 && node.key_at(i - 1)? >= key {
                return Err(Error::BadConfig(format!(
                    "keys out of order at block {} index {}",
                    block, i
                )));
            }
            if let Some(lower) = lower {
                if key <= lower {
                    return Err(Error::BadConfig(format!(
                        "key at block {} index {} escapes its lower bound",
                        block, i
                    )));
                }
            }
            if let Some(upper) = upper {
                if key > upper {
                    return Err(Error::BadConfig(format!(
                        "key at block {} index {} escapes its upper bound",
                        block, i
                    )));
                }
            }
        }

        match node.kind() {
            NodeKind::Leaf => {
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(Error::BadConfig(format!(
                            "leaf at block {} sits at depth {} instead of {}",
                            block, depth, expected
                        )))
                    }
                    Some(_) => {}
                }
                Ok(())
            }
            _ => {
                if count == 0 {
                    if is_root {
                        // Freshly created tree: a bare root is fine.
                        return Ok(());
                    }
                    return Err(Error::BadConfig(format!(
                        "interior node at block {} has no keys",
                        block
                    )));
                }
                for i in 0..=count {
                    let child_lower = if i == 0 {
                        lower.map(|b| b.to_vec())
                    } else {
                        Some(node.key_at(i - 1)?.to_vec())
                    };
                    let child_upper = if i < count {
                        Some(node.key_at(i)?.to_vec())
                    } else {
                        upper.map(|b| b.to_vec())
                    };
                    self.check_block(
                        node.ptr_at(i)?,
                        depth + 1,
                        child_lower.as_deref(),
                        child_upper.as_deref(),
                        seen,
                        leaf_depth,
                    )?;
                }
                Ok(())
            }
        }
    }

    fn check_free_chain(&self, live: &HashSet<u32>) -> Result<()> {
        let mut chained = HashSet::new();
        let mut current = self.superblock.header().free_list_head();

        while current != 0 {
            if live.contains(&current) {
                return Err(Error::BadConfig(format!(
                    "free block {} aliases a live block",
                    current
                )));
            }
            if !chained.insert(current) {
                return Err(Error::BadConfig(format!(
                    "free chain cycles back to block {}",
                    current
                )));
            }
            let node = Node::read_from(&*self.store, current)?;
            if node.kind() != NodeKind::Unallocated {
                return Err(Error::BadConfig(format!(
                    "free chain holds a {:?} node at block {}",
                    node.kind(),
                    current
                )));
            }
            current = node.header().free_list_head();
        }
        Ok(())
    }
}
