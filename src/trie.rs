//! `DMMTrie` — the trie operator: `Put`/`Get`, the base-page LRU, and
//! delta-freeze/checkpoint scheduling.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::config::TrieConfig;
use crate::errors::{IndexerError, IndexerResult};
use crate::node::Node;
use crate::page::{BasePage, DeltaPage};
use crate::page_key::{PageKey, PageType};
use crate::store::{LsvpsConfig, StoredPage, LSVPS};
use crate::value_store::ValueStore;

/// Converts one ASCII hex-digit byte (`'0'..='9'`, `'a'..='f'`) into its
/// numeric nibble value. Keys are expected to already be lowercase hex
/// digit strings.
fn nibble_value(byte: u8) -> IndexerResult<u8> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        other => Err(IndexerError::InvalidData(format!(
            "key byte {other:#x} is not a hex digit"
        ))),
    }
}

fn nibbles_of(bytes: &[u8]) -> IndexerResult<Vec<u8>> {
    bytes.iter().map(|&b| nibble_value(b)).collect()
}

/// Smallest delta-freeze version that is still at or past `target`.
fn version_upperbound(freeze_versions: Option<&[u64]>, target: u64) -> Option<u64> {
    let versions = freeze_versions?;
    match versions.binary_search(&target) {
        Ok(idx) => Some(versions[idx]),
        Err(idx) if idx < versions.len() => Some(versions[idx]),
        Err(_) => None,
    }
}

/// The trie operator over an `LSVPS` page store and an external value log.
///
/// Per-pid bookkeeping (`current_versions`, `latest_basepage_versions`,
/// `freeze_versions`) is an in-memory optimization index, not a durability
/// requirement: after a restart these maps start empty, and `LoadPage` still
/// reconstructs any page correctly by walking the on-disk delta chain from
/// scratch, just without the binary-search shortcut to the nearest
/// checkpoint.
pub struct DMMTrie {
    value_store: Arc<dyn ValueStore>,
    lsvps: LSVPS,
    base_cache: LruCache<String, BasePage>,
    delta_freeze_threshold: u32,
    checkpoint_threshold: u32,
    current_version: u64,
    current_versions: HashMap<String, u64>,
    latest_basepage_versions: HashMap<String, u64>,
    freeze_versions: HashMap<String, Vec<u64>>,
}

impl DMMTrie {
    pub fn new(config: TrieConfig, value_store: Arc<dyn ValueStore>) -> IndexerResult<Self> {
        let base_cache_size = NonZeroUsize::new(config.base_cache_size.max(1)).unwrap();
        Ok(Self {
            value_store,
            lsvps: LSVPS::new(config.storage)?,
            base_cache: LruCache::new(base_cache_size),
            delta_freeze_threshold: config.delta_freeze_threshold,
            checkpoint_threshold: config.checkpoint_threshold,
            current_version: 0,
            current_versions: HashMap::new(),
            latest_basepage_versions: HashMap::new(),
            freeze_versions: HashMap::new(),
        })
    }

    pub fn current_version(&self) -> u64 {
        self.current_version
    }

    /// Writes `(version, key, value)`, walking from the deepest page
    /// (longest even prefix of `key`) up to the root page, two nibbles at a
    /// time.
    pub fn put(&mut self, tid: u32, version: u64, key: &[u8], value: &[u8]) -> IndexerResult<bool> {
        if version < self.current_version {
            return Ok(false);
        }

        let location = self.value_store.write_value(version, key, value)?;

        let len = key.len();
        let floor_even = len - (len % 2);
        let mut propagated_child_hash = [0u8; 32];
        let mut i = floor_even;
        loop {
            let pid = String::from_utf8(key[0..i].to_vec())
                .map_err(|e| IndexerError::InvalidData(e.to_string()))?;
            let end = (i + 2).min(len);
            let nibbles = nibbles_of(&key[i..end])?;

            let mut page = self.load_or_create_base_page(tid, &pid, key, &nibbles)?;
            let mut active_delta = self.lsvps.active_delta_page(&pid)?;

            let new_hash = page.apply_update(
                version,
                location,
                value,
                key,
                &nibbles,
                propagated_child_hash,
                &mut active_delta,
            )?;

            self.after_update(tid, version, &pid, &mut page, active_delta)?;

            page.pagekey = PageKey::new(version, tid, PageType::Base, pid.clone());
            self.base_cache.put(pid.clone(), page);
            self.current_versions.insert(pid, version);

            propagated_child_hash = new_hash;
            if i == 0 {
                break;
            }
            i -= 2;
        }

        self.current_version = version;
        Ok(true)
    }

    /// Freezes the active delta page and/or checkpoints the base page
    /// once their respective update counters cross their thresholds.
    fn after_update(
        &mut self,
        tid: u32,
        version: u64,
        pid: &str,
        page: &mut BasePage,
        mut active_delta: DeltaPage,
    ) -> IndexerResult<()> {
        page.d_update_count += 1;
        if page.d_update_count as u32 >= self.delta_freeze_threshold {
            let freeze_key = PageKey::new(version, tid, PageType::Delta, pid.to_string());
            active_delta.pagekey = freeze_key.clone();
            self.lsvps.store_page(StoredPage::Delta(active_delta))?;

            let mut fresh = DeltaPage::new(pid.to_string());
            fresh.last_pagekey = freeze_key;
            self.lsvps.store_active_delta_page(fresh)?;

            page.d_update_count = 0;
            self.freeze_versions
                .entry(pid.to_string())
                .or_default()
                .push(version);
        } else {
            self.lsvps.store_active_delta_page(active_delta)?;
        }

        page.b_update_count += 1;
        if page.b_update_count as u32 >= self.checkpoint_threshold {
            // Reset before cloning: the stored checkpoint represents zero
            // updates since itself, by definition.
            page.b_update_count = 0;
            let mut checkpoint = page.clone();
            checkpoint.pagekey = PageKey::new(version, tid, PageType::Base, pid.to_string());
            self.lsvps.store_page(StoredPage::Base(checkpoint))?;
            self.latest_basepage_versions
                .insert(pid.to_string(), version);
        }

        Ok(())
    }

    fn load_or_create_base_page(
        &mut self,
        tid: u32,
        pid: &str,
        key: &[u8],
        nibbles: &[u8],
    ) -> IndexerResult<BasePage> {
        if let Some(page) = self.base_cache.get(pid) {
            return Ok(page.clone());
        }

        let old_version = self.current_versions.get(pid).copied().unwrap_or(0);
        if old_version == 0 {
            return BasePage::new_empty(pid, key, nibbles);
        }

        let latest_basepage_version = self.latest_basepage_versions.get(pid).copied().unwrap_or(0);
        let old_key = PageKey::new(old_version, tid, PageType::Base, pid.to_string());
        let freeze_versions_for_pid = self.freeze_versions.get(pid).cloned();

        let loaded = self.lsvps.load_page(&old_key, latest_basepage_version, move || {
            version_upperbound(freeze_versions_for_pid.as_deref(), old_version)
        })?;

        match loaded {
            Some(page) => Ok(page),
            None => BasePage::new_empty(pid, key, nibbles),
        }
    }

    /// Reads the value stored for `key` at `version`, or `None` if no such
    /// write is visible at that version.
    pub fn get(&mut self, tid: u32, version: u64, key: &[u8]) -> IndexerResult<Option<Vec<u8>>> {
        let len = key.len();
        let floor_even = len - (len % 2);
        let pid = String::from_utf8(key[0..floor_even].to_vec())
            .map_err(|e| IndexerError::InvalidData(e.to_string()))?;

        let latest_basepage_version = self.latest_basepage_versions.get(&pid).copied().unwrap_or(0);
        let freeze_versions_for_pid = self.freeze_versions.get(&pid).cloned();
        let pagekey = PageKey::new(version, tid, PageType::Base, pid.clone());

        let page = self.lsvps.load_page(&pagekey, latest_basepage_version, move || {
            version_upperbound(freeze_versions_for_pid.as_deref(), version)
        })?;
        let page = match page {
            Some(p) => p,
            None => return Ok(None),
        };

        let leaf = match &page.root {
            Node::Leaf(l) => l,
            Node::Index(index) => {
                if floor_even == len {
                    return Err(IndexerError::CorruptedBlock(
                        "index root page with no remaining nibble to route on".into(),
                    ));
                }
                let slot = nibble_value(key[len - 1])? as usize;
                index.get_child(slot)?.as_leaf()?
            }
        };

        Ok(Some(self.value_store.read_value(leaf.location)?))
    }

    /// Flushes the page buffer and the active delta cache to disk.
    pub fn flush(&mut self) -> IndexerResult<()> {
        self.lsvps.flush()
    }

    /// Declared but unimplemented: querying all pages live at a given
    /// version without already knowing their pids.
    pub fn page_query(&self, version: u64) -> IndexerResult<Vec<PageKey>> {
        self.lsvps.page_query(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrieConfig;
    use crate::value_store::FileValueStore;

    fn trie(dir: &std::path::Path, td: u32, tb: u32) -> DMMTrie {
        let mut config = TrieConfig::new(dir);
        config.delta_freeze_threshold = td;
        config.checkpoint_threshold = tb;
        config.storage = LsvpsConfig {
            root_dir: dir.to_path_buf(),
            max_buffer_size: 64,
            delta_cache_capacity: 64,
        };
        let value_store = Arc::new(FileValueStore::open(dir.join("values.log"), 0).unwrap());
        DMMTrie::new(config, value_store).unwrap()
    }

    #[test]
    fn put_then_get_returns_the_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = trie(dir.path(), 2, 4);
        assert!(trie.put(0, 1, b"ab", b"v1").unwrap());
        assert_eq!(trie.get(0, 1, b"ab").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn historical_reads_see_the_version_written_at_that_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = trie(dir.path(), 2, 4);
        trie.put(0, 1, b"ab", b"va").unwrap();
        trie.put(0, 2, b"ab", b"vb").unwrap();
        assert_eq!(trie.get(0, 1, b"ab").unwrap(), Some(b"va".to_vec()));
        assert_eq!(trie.get(0, 2, b"ab").unwrap(), Some(b"vb".to_vec()));
    }

    #[test]
    fn put_with_stale_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = trie(dir.path(), 2, 4);
        trie.put(0, 5, b"ab", b"v5").unwrap();
        assert!(!trie.put(0, 3, b"ab", b"v3").unwrap());
        assert_eq!(trie.get(0, 5, b"ab").unwrap(), Some(b"v5".to_vec()));
    }

    #[test]
    fn deep_key_builds_a_multi_page_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = trie(dir.path(), 2, 4);
        assert!(trie.put(0, 1, b"abcdef", b"Y").unwrap());
        assert_eq!(trie.get(0, 1, b"abcdef").unwrap(), Some(b"Y".to_vec()));
    }

    #[test]
    fn survives_checkpoint_boundary_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut trie = trie(dir.path(), 2, 4);
        trie.put(0, 1, b"ab", b"A").unwrap();
        trie.put(0, 2, b"ac", b"B").unwrap();
        trie.put(0, 3, b"ad", b"C").unwrap();
        trie.put(0, 4, b"ae", b"D").unwrap();
        trie.put(0, 5, b"af", b"E").unwrap();
        assert_eq!(trie.get(0, 3, b"ad").unwrap(), Some(b"C".to_vec()));
        assert_eq!(trie.get(0, 5, b"af").unwrap(), Some(b"E".to_vec()));
    }

    #[test]
    fn reopening_against_the_same_directory_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut trie = trie(dir.path(), 2, 4);
            for v in 1..=10u64 {
                let key = format!("a{:x}", v % 16);
                trie.put(0, v, key.as_bytes(), format!("v{v}").as_bytes())
                    .unwrap();
            }
            trie.flush().unwrap();
        }
        {
            let mut trie = trie(dir.path(), 2, 4);
            for v in 1..=10u64 {
                let key = format!("a{:x}", v % 16);
                assert_eq!(
                    trie.get(0, v, key.as_bytes()).unwrap(),
                    Some(format!("v{v}").as_bytes().to_vec())
                );
            }
        }
    }
}
