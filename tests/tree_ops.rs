//! # Index operation scenarios
//!
//! End-to-end coverage of the public engine surface over the in-memory
//! store: first insert, duplicate rejection, leaf and root splits, point
//! updates, in-order scans, block exhaustion, and the structural checker
//! after every step. Geometry is chosen per test; small blocks make
//! splits arrive within a handful of inserts.

use blocktree::{BTreeIndex, DisplayMode, Error, MemoryStore};

// 2-byte keys and values over 56-byte blocks: 6 pairs per leaf and 3
// separators per interior node.
const BLOCK_SIZE: usize = 56;

fn scan(index: &BTreeIndex<'_, MemoryStore>) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    index.display(&mut out, DisplayMode::SortedKeyval).unwrap();

    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| {
            let body = line
                .strip_prefix('(')
                .and_then(|l| l.strip_suffix(')'))
                .unwrap();
            let (k, v) = body.split_once(',').unwrap();
            (k.as_bytes().to_vec(), v.as_bytes().to_vec())
        })
        .collect()
}

mod basic_operations {
    use super::*;

    #[test]
    fn insert_then_lookup() {
        let mut store = MemoryStore::new(256, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        index.insert(b"aa", b"AA").unwrap();

        assert_eq!(index.lookup(b"aa").unwrap(), b"AA");
        index.sanity_check().unwrap();
    }

    #[test]
    fn duplicate_insert_conflicts_and_leaves_tree_unchanged() {
        let mut store = MemoryStore::new(256, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();
        index.insert(b"aa", b"AA").unwrap();

        assert!(matches!(index.insert(b"aa", b"BB"), Err(Error::Conflict)));

        assert_eq!(index.lookup(b"aa").unwrap(), b"AA");
        index.sanity_check().unwrap();
        assert_eq!(scan(&index), vec![(b"aa".to_vec(), b"AA".to_vec())]);
    }

    #[test]
    fn update_then_lookup_sees_new_value() {
        let mut store = MemoryStore::new(256, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        index.insert(b"ab", b"v1").unwrap();
        index.update(b"ab", b"v2").unwrap();

        assert_eq!(index.lookup(b"ab").unwrap(), b"v2");
        assert!(matches!(index.update(b"zz", b"v3"), Err(Error::NonExistent)));
        index.sanity_check().unwrap();
    }

    #[test]
    fn lookup_of_absent_key_misses() {
        let mut store = MemoryStore::new(256, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();
        index.insert(b"aa", b"AA").unwrap();

        assert!(matches!(index.lookup(b"ab"), Err(Error::NonExistent)));
    }
}

mod splitting {
    use super::*;

    #[test]
    fn leaf_split_keeps_scan_sorted() {
        let mut store = MemoryStore::new(BLOCK_SIZE, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        let keys: [&[u8; 2]; 8] = [b"ab", b"ac", b"ad", b"ae", b"af", b"ag", b"ah", b"ai"];
        for k in keys {
            index.insert(k, b"vv").unwrap();
            index.sanity_check().unwrap();
        }

        let scanned: Vec<Vec<u8>> = scan(&index).into_iter().map(|(k, _)| k).collect();
        let expected: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn chained_splits_reach_three_levels_and_stay_sorted() {
        let mut store = MemoryStore::new(BLOCK_SIZE, 64);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        // Printable key bytes keep the scan output line-parseable.
        for i in 0..32u8 {
            index.insert(&[b'a', b'0' + i], &[b'v', b'0' + i]).unwrap();
            index.sanity_check().unwrap();
        }

        let scanned = scan(&index);
        assert_eq!(scanned.len(), 32);
        for (i, (key, value)) in scanned.iter().enumerate() {
            assert_eq!(key, &[b'a', b'0' + i as u8]);
            assert_eq!(value, &[b'v', b'0' + i as u8]);
        }
        for i in 0..32u8 {
            assert_eq!(index.lookup(&[b'a', b'0' + i]).unwrap(), &[b'v', b'0' + i]);
        }
    }

    #[test]
    fn interleaved_insert_order_converges_to_the_same_scan() {
        let mut store = MemoryStore::new(BLOCK_SIZE, 64);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        // A fixed shuffle: middle-out with alternating ends.
        let order = [
            15u8, 3, 28, 9, 22, 0, 31, 17, 6, 25, 12, 1, 30, 19, 8, 27, 14, 4, 23, 10, 2, 29, 16,
            7, 24, 13, 5, 21, 11, 26, 18, 20,
        ];
        for &i in &order {
            index.insert(&[b'a', b'0' + i], &[b'v', b'0' + i]).unwrap();
        }
        index.sanity_check().unwrap();

        let scanned: Vec<Vec<u8>> = scan(&index).into_iter().map(|(k, _)| k).collect();
        let expected: Vec<Vec<u8>> = (0..32u8).map(|i| vec![b'a', b'0' + i]).collect();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn scan_is_strictly_ascending_after_heavy_growth() {
        let mut store = MemoryStore::new(BLOCK_SIZE, 128);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        for i in (0..60u8).rev() {
            index.insert(&[b'q', b'0' + i], b"vv").unwrap();
        }
        index.sanity_check().unwrap();

        let keys: Vec<Vec<u8>> = scan(&index).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 60);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}

mod resources {
    use super::*;

    #[test]
    fn exhaustion_surfaces_no_space_and_the_tree_survives() {
        let mut store = MemoryStore::new(BLOCK_SIZE, 6);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        let mut stored = Vec::new();
        let mut exhausted = false;
        for i in 0..128u8 {
            match index.insert(&[b'k', i], b"vv") {
                Ok(()) => stored.push(i),
                Err(Error::NoSpace) => {
                    exhausted = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert!(exhausted);
        index.sanity_check().unwrap();
        for i in stored {
            assert_eq!(index.lookup(&[b'k', i]).unwrap(), b"vv");
        }
    }

    #[test]
    fn allocate_then_deallocate_restores_the_head() {
        let mut store = MemoryStore::new(256, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();

        let first = index.allocate_block().unwrap();
        let second = index.allocate_block().unwrap();

        // The pool hands blocks back most-recently-freed first.
        index.deallocate_block(first).unwrap();
        assert_eq!(index.allocate_block().unwrap(), first);

        index.deallocate_block(second).unwrap();
        index.deallocate_block(first).unwrap();
        assert_eq!(index.allocate_block().unwrap(), first);
        assert_eq!(index.allocate_block().unwrap(), second);
    }

    #[test]
    fn delete_reports_unimplemented() {
        let mut store = MemoryStore::new(256, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();
        index.insert(b"aa", b"AA").unwrap();

        assert!(matches!(index.delete(b"aa"), Err(Error::Unimplemented)));
        assert_eq!(index.lookup(b"aa").unwrap(), b"AA");
    }
}

mod rendering {
    use super::*;

    #[test]
    fn dot_output_is_well_formed_after_splits() {
        let mut store = MemoryStore::new(BLOCK_SIZE, 64);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();
        for i in 0..20u8 {
            index.insert(&[b'a', b'0' + i], b"vv").unwrap();
        }

        let mut out = Vec::new();
        index.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("digraph btree {\n"));
        assert!(text.ends_with("}\n"));
        // Every edge references a declared vertex.
        for line in text.lines().filter(|l| l.contains("->")) {
            let target = line.trim().split("-> ").nth(1).unwrap().trim_end_matches(';');
            assert!(
                text.contains(&format!("{} [ label=", target)),
                "edge to undeclared vertex {target}"
            );
        }
    }

    #[test]
    fn depth_output_lists_interior_and_leaf_lines() {
        let mut store = MemoryStore::new(BLOCK_SIZE, 16);
        let mut index = BTreeIndex::new(2, 2, &mut store).unwrap();
        index.attach(0, true).unwrap();
        for k in [b"ba", b"bb", b"bc"] {
            index.insert(k, b"vv").unwrap();
        }

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Depth).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.lines().next().unwrap().starts_with("1: Interior:"));
        assert!(text.lines().filter(|l| l.contains("Leaf:")).count() >= 2);
    }
}
