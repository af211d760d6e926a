use std::sync::Arc;

use dmmtrie::{DMMTrie, FileValueStore, LsvpsConfig, TrieConfig};
use proptest::prelude::*;
use tempfile::TempDir;

fn new_trie(dir: &TempDir, td: u32, tb: u32) -> DMMTrie {
    let mut config = TrieConfig::new(dir.path());
    config.delta_freeze_threshold = td;
    config.checkpoint_threshold = tb;
    config.storage = LsvpsConfig {
        root_dir: dir.path().to_path_buf(),
        max_buffer_size: 64,
        delta_cache_capacity: 64,
    };
    let value_store = Arc::new(FileValueStore::open(dir.path().join("values.log"), 0).unwrap());
    DMMTrie::new(config, value_store).unwrap()
}

// A single put with no freeze yet.
#[test]
fn scenario_single_put_no_freeze() {
    let dir = TempDir::new().unwrap();
    let mut trie = new_trie(&dir, 2, 4);
    assert!(trie.put(0, 1, b"ab", b"v1").unwrap());
    assert_eq!(trie.get(0, 1, b"ab").unwrap(), Some(b"v1".to_vec()));
}

// Two puts trigger one delta freeze (Td=2); historical reads still work.
#[test]
fn scenario_delta_freeze_preserves_history() {
    let dir = TempDir::new().unwrap();
    let mut trie = new_trie(&dir, 2, 4);
    trie.put(0, 1, b"ab", b"v1").unwrap();
    trie.put(0, 2, b"ab", b"v2").unwrap();
    assert_eq!(trie.get(0, 1, b"ab").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(trie.get(0, 2, b"ab").unwrap(), Some(b"v2".to_vec()));
}

// A checkpoint occurs at Tb=4; a historical read before the checkpoint
// still requires delta replay across the checkpoint boundary.
#[test]
fn scenario_checkpoint_boundary_replay() {
    let dir = TempDir::new().unwrap();
    let mut trie = new_trie(&dir, 2, 4);
    trie.put(0, 1, b"ab", b"A").unwrap();
    trie.put(0, 2, b"ac", b"B").unwrap();
    trie.put(0, 3, b"ad", b"C").unwrap();
    trie.put(0, 4, b"ae", b"D").unwrap();
    trie.put(0, 5, b"af", b"E").unwrap();
    assert_eq!(trie.get(0, 3, b"ad").unwrap(), Some(b"C".to_vec()));
    assert_eq!(trie.get(0, 1, b"ab").unwrap(), Some(b"A".to_vec()));
    assert_eq!(trie.get(0, 5, b"af").unwrap(), Some(b"E".to_vec()));
}

// A 4-character key builds an index-node page above its leaf page.
#[test]
fn scenario_four_char_key_routes_through_index_page() {
    let dir = TempDir::new().unwrap();
    let mut trie = new_trie(&dir, 2, 4);
    assert!(trie.put(0, 1, b"abcd", b"X").unwrap());
    assert_eq!(trie.get(0, 1, b"abcd").unwrap(), Some(b"X".to_vec()));
}

// A 6-character key builds a multi-page chain with parent->child hash
// linkage ("", "ab", "abcd", "abcdef").
#[test]
fn scenario_six_char_key_builds_multi_page_chain() {
    let dir = TempDir::new().unwrap();
    let mut trie = new_trie(&dir, 2, 4);
    assert!(trie.put(0, 1, b"abcdef", b"Y").unwrap());
    assert_eq!(trie.get(0, 1, b"abcdef").unwrap(), Some(b"Y".to_vec()));
}

// Persistence across a reopen against the same directory.
#[test]
fn scenario_persistence_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut trie = new_trie(&dir, 2, 4);
        for v in 1..=10u64 {
            let key = format!("a{:x}", v % 16);
            trie.put(0, v, key.as_bytes(), format!("val{v}").as_bytes())
                .unwrap();
        }
        trie.flush().unwrap();
    }
    {
        let mut trie = new_trie(&dir, 2, 4);
        for v in 1..=10u64 {
            let key = format!("a{:x}", v % 16);
            assert_eq!(
                trie.get(0, v, key.as_bytes()).unwrap(),
                Some(format!("val{v}").as_bytes().to_vec())
            );
        }
    }
}

// Put with a version older than current_version is rejected and leaves
// state unchanged.
#[test]
fn stale_put_leaves_state_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut trie = new_trie(&dir, 2, 4);
    trie.put(0, 5, b"ab", b"v5").unwrap();
    assert!(!trie.put(0, 3, b"ab", b"stale").unwrap());
    assert_eq!(trie.get(0, 5, b"ab").unwrap(), Some(b"v5".to_vec()));
}

fn hex_key(len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(prop::sample::select(vec![
        b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'a', b'b', b'c', b'd', b'e',
        b'f',
    ]), len)
    .prop_map(|bytes| String::from_utf8(bytes).unwrap())
}

proptest! {
    // Put(ver, k, v) followed by Get(ver, k) returns v.
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_put_then_get_round_trips(
        key in hex_key(2),
        value in "[a-z]{1,8}",
        version in 1u64..50,
    ) {
        let dir = TempDir::new().unwrap();
        let mut trie = new_trie(&dir, 8, 16);
        trie.put(0, version, key.as_bytes(), value.as_bytes()).unwrap();
        prop_assert_eq!(
            trie.get(0, version, key.as_bytes()).unwrap(),
            Some(value.as_bytes().to_vec())
        );
    }

    // Historical reads see the value written at that version.
    #[test]
    fn prop_historical_reads_are_stable(
        key in hex_key(2),
        v1 in 1u64..20,
        gap in 1u64..20,
        va in "[a-z]{1,6}",
        vb in "[a-z]{1,6}",
    ) {
        let v2 = v1 + gap;
        let dir = TempDir::new().unwrap();
        let mut trie = new_trie(&dir, 8, 16);
        trie.put(0, v1, key.as_bytes(), va.as_bytes()).unwrap();
        trie.put(0, v2, key.as_bytes(), vb.as_bytes()).unwrap();
        prop_assert_eq!(trie.get(0, v1, key.as_bytes()).unwrap(), Some(va.into_bytes()));
        prop_assert_eq!(trie.get(0, v2, key.as_bytes()).unwrap(), Some(vb.into_bytes()));
    }

    // A stale Put always returns false.
    #[test]
    fn prop_stale_put_always_rejected(
        key in hex_key(2),
        v1 in 10u64..50,
        back in 1u64..9,
        value in "[a-z]{1,6}",
    ) {
        let dir = TempDir::new().unwrap();
        let mut trie = new_trie(&dir, 8, 16);
        trie.put(0, v1, key.as_bytes(), value.as_bytes()).unwrap();
        prop_assert!(!trie.put(0, v1 - back, key.as_bytes(), value.as_bytes()).unwrap());
    }

    // Two tries fed the same sequence of Puts produce identical values for
    // every write (hash determinism is implied: if the root hashes diverged,
    // the value obtained via delta replay on one store would differ after a
    // checkpoint/freeze boundary, which this also exercises).
    #[test]
    fn prop_hash_determinism_via_identical_replay(
        keys in proptest::collection::vec(hex_key(2), 1..6),
        values in proptest::collection::vec("[a-z]{1,6}", 1..6),
    ) {
        let n = keys.len().min(values.len());
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let mut trie_a = new_trie(&dir_a, 2, 3);
        let mut trie_b = new_trie(&dir_b, 2, 3);
        for i in 0..n {
            let version = (i + 1) as u64;
            trie_a.put(0, version, keys[i].as_bytes(), values[i].as_bytes()).unwrap();
            trie_b.put(0, version, keys[i].as_bytes(), values[i].as_bytes()).unwrap();
        }
        for i in 0..n {
            let version = (i + 1) as u64;
            prop_assert_eq!(
                trie_a.get(0, version, keys[i].as_bytes()).unwrap(),
                trie_b.get(0, version, keys[i].as_bytes()).unwrap()
            );
        }
    }
}
