//! Tree rendering.
//!
//! Three depth-first renderings of the same traversal:
//!
//! - [`DisplayMode::Depth`]: one line per node,
//!   `block: Interior: *2 aa *3 bb *4` / `block: Leaf: aa=AA ab=AB`.
//! - [`DisplayMode::DepthDot`]: a Graphviz digraph, one labeled vertex
//!   per node and one edge per child pointer.
//! - [`DisplayMode::SortedKeyval`]: the in-order scan, one raw
//!   `(key,value)` line per pair.
//!
//! Key and value bytes are rendered lossy-UTF-8 in the first two modes
//! (labels are for humans) and verbatim in the third (output is for
//! machines).

use std::io::Write;

use crate::error::{Error, Result};
use crate::node::{Node, NodeKind};
use crate::store::BlockStore;

use super::BTreeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// One descriptive line per node.
    Depth,
    /// Graphviz dot output.
    DepthDot,
    /// In-order `(key,value)` lines from the leaves.
    SortedKeyval,
}

impl<'s, S: BlockStore> BTreeIndex<'s, S> {
    /// Renders the tree depth-first from the root into `out`.
    pub fn display<W: Write>(&self, out: &mut W, mode: DisplayMode) -> Result<()> {
        let root = self.root_block()?;
        if mode == DisplayMode::DepthDot {
            writeln!(out, "digraph btree {{")?;
        }
        self.display_block(root, out, mode)?;
        if mode == DisplayMode::DepthDot {
            writeln!(out, "}}")?;
        }
        Ok(())
    }

    /// Convenience: dot rendering, the format most tools want.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<()> {
        self.display(out, DisplayMode::DepthDot)
    }

    fn display_block<W: Write>(&self, block: u32, out: &mut W, mode: DisplayMode) -> Result<()> {
        let node = Node::read_from(&*self.store, block)?;

        match node.kind() {
            NodeKind::Root | NodeKind::Interior => {
                match mode {
                    DisplayMode::Depth => {
                        writeln!(out, "{}: Interior: {}", block, self.interior_contents(&node)?)?;
                    }
                    DisplayMode::DepthDot => {
                        writeln!(
                            out,
                            "  n{} [ label=\"{}: {}\" ];",
                            block,
                            block,
                            self.interior_contents(&node)?
                        )?;
                    }
                    DisplayMode::SortedKeyval => {}
                }
                if node.num_keys() > 0 {
                    for i in 0..=node.num_keys() {
                        let child = node.ptr_at(i)?;
                        if mode == DisplayMode::DepthDot {
                            writeln!(out, "  n{} -> n{};", block, child)?;
                        }
                        self.display_block(child, out, mode)?;
                    }
                }
                Ok(())
            }
            NodeKind::Leaf => {
                match mode {
                    DisplayMode::Depth => {
                        writeln!(out, "{}: Leaf: {}", block, self.leaf_contents(&node)?)?;
                    }
                    DisplayMode::DepthDot => {
                        writeln!(
                            out,
                            "  n{} [ label=\"{}: {}\" ];",
                            block,
                            block,
                            self.leaf_contents(&node)?
                        )?;
                    }
                    DisplayMode::SortedKeyval => {
                        for i in 0..node.num_keys() {
                            out.write_all(b"(")?;
                            out.write_all(node.key_at(i)?)?;
                            out.write_all(b",")?;
                            out.write_all(node.value_at(i)?)?;
                            out.write_all(b")\n")?;
                        }
                    }
                }
                Ok(())
            }
            kind => Err(Error::Insane(format!(
                "display reached a {:?} node at block {}",
                kind, block
            ))),
        }
    }

    fn interior_contents(&self, node: &Node) -> Result<String> {
        let mut parts = Vec::with_capacity(2 * node.num_keys() as usize + 1);
        for i in 0..node.num_keys() {
            parts.push(format!("*{}", node.ptr_at(i)?));
            parts.push(printable(node.key_at(i)?));
        }
        parts.push(format!("*{}", node.ptr_at(node.num_keys())?));
        Ok(parts.join(" "))
    }

    fn leaf_contents(&self, node: &Node) -> Result<String> {
        let mut parts = Vec::with_capacity(node.num_keys() as usize);
        for i in 0..node.num_keys() {
            parts.push(format!(
                "{}={}",
                printable(node.key_at(i)?),
                printable(node.value_at(i)?)
            ));
        }
        Ok(parts.join(" "))
    }
}

fn printable(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn populated_index(store: &mut MemoryStore) -> BTreeIndex<'_, MemoryStore> {
        let mut index = BTreeIndex::new(2, 2, store).unwrap();
        index.attach(0, true).unwrap();
        for (k, v) in [(b"bb", b"B1"), (b"aa", b"A1"), (b"cc", b"C1")] {
            index.insert(k, v).unwrap();
        }
        index
    }

    #[test]
    fn sorted_keyval_is_in_order() {
        let mut store = MemoryStore::new(128, 8);
        let index = populated_index(&mut store);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::SortedKeyval).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "(aa,A1)\n(bb,B1)\n(cc,C1)\n"
        );
    }

    #[test]
    fn depth_mode_names_every_node() {
        let mut store = MemoryStore::new(128, 8);
        let index = populated_index(&mut store);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Depth).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("1: Interior:"));
        assert!(text.lines().any(|l| l.contains("Leaf:")));
        assert!(text.contains("bb=B1"));
    }

    #[test]
    fn dot_mode_emits_digraph_with_edges() {
        let mut store = MemoryStore::new(128, 8);
        let index = populated_index(&mut store);

        let mut out = Vec::new();
        index.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("digraph btree {\n"));
        assert!(text.ends_with("}\n"));
        assert!(text.contains("n1 -> n"));
        assert!(text.contains("[ label=\"1:"));
    }

    #[test]
    fn empty_tree_renders_bare_root() {
        let mut store = MemoryStore::new(128, 4);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::SortedKeyval).unwrap();
        assert!(out.is_empty());

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Depth).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1: Interior: *0\n");
    }
}
