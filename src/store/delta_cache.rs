//! `ActiveDeltaPageCache` — an LRU of active delta pages with disk spill.

use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use lru::LruCache;

use crate::errors::IndexerResult;
use crate::page::DeltaPage;

pub struct ActiveDeltaPageCache {
    cache: LruCache<String, DeltaPage>,
    cache_dir: PathBuf,
}

impl ActiveDeltaPageCache {
    pub fn new(capacity: usize, cache_dir: impl Into<PathBuf>) -> IndexerResult<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            cache_dir,
        })
    }

    fn disk_path(&self, pid: &str) -> PathBuf {
        self.cache_dir.join(format!("{pid}.delta"))
    }

    /// Returns the cached page for `pid`, touching it as MRU; falls back to
    /// disk if it was previously evicted, repopulating the cache, per spec
    /// §4.5 `Get`.
    pub fn get(&mut self, pid: &str) -> IndexerResult<Option<DeltaPage>> {
        if let Some(page) = self.cache.get(pid) {
            return Ok(Some(page.clone()));
        }
        match self.read_from_disk(pid)? {
            Some(page) => {
                self.store(pid, page.clone())?;
                Ok(Some(page))
            }
            None => Ok(None),
        }
    }

    /// Stores/updates the page for `pid`. If inserting displaces a
    /// *different* pid's page off the LRU tail, that page is spilled to disk.
    pub fn store(&mut self, pid: &str, page: DeltaPage) -> IndexerResult<()> {
        if let Some((evicted_pid, evicted_page)) = self.cache.push(pid.to_string(), page) {
            if evicted_pid != pid {
                self.write_to_disk(&evicted_pid, &evicted_page)?;
            }
        }
        Ok(())
    }

    fn read_from_disk(&self, pid: &str) -> IndexerResult<Option<DeltaPage>> {
        let path = self.disk_path(pid);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(DeltaPage::deserialize(&bytes)?))
    }

    fn write_to_disk(&self, pid: &str, page: &DeltaPage) -> IndexerResult<()> {
        let bytes = page.serialize()?;
        fs::write(self.disk_path(pid), bytes)?;
        Ok(())
    }

    /// Writes every currently-cached delta page to disk, keyed by pid (spec
    /// §4.3's `FlushToDisk` and §4.5's destructor behavior).
    pub fn flush_to_disk(&mut self) -> IndexerResult<()> {
        let snapshot: Vec<(String, DeltaPage)> = self
            .cache
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (pid, page) in snapshot {
            self.write_to_disk(&pid, &page)?;
        }
        Ok(())
    }
}

impl Drop for ActiveDeltaPageCache {
    fn drop(&mut self) {
        if let Err(e) = self.flush_to_disk() {
            log::error!("failed to flush active delta page cache on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_key::PageKey;

    #[test]
    fn store_then_get_round_trips_through_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ActiveDeltaPageCache::new(4, dir.path()).unwrap();
        let page = DeltaPage::new("ab");
        cache.store("ab", page.clone()).unwrap();
        let fetched = cache.get("ab").unwrap().unwrap();
        assert_eq!(fetched, page);
    }

    #[test]
    fn eviction_spills_to_disk_and_get_recovers_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ActiveDeltaPageCache::new(1, dir.path()).unwrap();
        let mut page_a = DeltaPage::new("aa");
        page_a.last_pagekey = PageKey::sentinel("aa");
        cache.store("aa", page_a.clone()).unwrap();

        let page_b = DeltaPage::new("bb");
        cache.store("bb", page_b.clone()).unwrap();

        // "aa" was evicted to make room for "bb"; it must still be reachable.
        let fetched = cache.get("aa").unwrap().unwrap();
        assert_eq!(fetched, page_a);
    }

    #[test]
    fn get_on_unknown_pid_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ActiveDeltaPageCache::new(4, dir.path()).unwrap();
        assert!(cache.get("zz").unwrap().is_none());
    }
}
