//! `LSVPS` — the log-structured versioned page store.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::{IndexerError, IndexerResult};
use crate::page::{BasePage, DeltaPage, PAGE_SIZE};
use crate::page_key::{PageKey, PageType};

use super::delta_cache::ActiveDeltaPageCache;
use super::index_file::{IndexBlock, IndexFile, LookupBlock, BLOCK_SIZE};

/// A page as it sits in LSVPS's in-memory buffer — either kind, tagged by
/// its own `PageKey` rather than through virtual dispatch.
#[derive(Debug, Clone)]
pub enum StoredPage {
    Base(BasePage),
    Delta(DeltaPage),
}

impl StoredPage {
    pub fn pagekey(&self) -> &PageKey {
        match self {
            StoredPage::Base(p) => &p.pagekey,
            StoredPage::Delta(p) => &p.pagekey,
        }
    }

    pub fn serialize(&self) -> IndexerResult<[u8; PAGE_SIZE]> {
        match self {
            StoredPage::Base(p) => p.serialize(),
            StoredPage::Delta(p) => p.serialize(),
        }
    }
}

#[derive(Debug)]
pub struct LsvpsConfig {
    pub root_dir: PathBuf,
    pub max_buffer_size: usize,
    pub delta_cache_capacity: usize,
}

impl Default for LsvpsConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            max_buffer_size: 20_000,
            delta_cache_capacity: 300_000,
        }
    }
}

pub struct LSVPS {
    root_dir: PathBuf,
    max_buffer_size: usize,
    buffer: Vec<StoredPage>,
    index_files: Vec<IndexFile>,
    active_delta_cache: ActiveDeltaPageCache,
}

impl LSVPS {
    /// Opens (or creates) a store rooted at `config.root_dir`, recovering the
    /// `IndexFile` registry from whatever `IndexFile/index_*.dat` files
    /// already exist on disk so a reopened trie's `pageLookup` can still find
    /// pages flushed by a prior process.
    pub fn new(config: LsvpsConfig) -> IndexerResult<Self> {
        let delta_cache_dir = config.root_dir.join("delta_cache");
        let index_files = Self::recover_index_files(&config.root_dir)?;
        Ok(Self {
            active_delta_cache: ActiveDeltaPageCache::new(
                config.delta_cache_capacity,
                delta_cache_dir,
            )?,
            root_dir: config.root_dir,
            max_buffer_size: config.max_buffer_size,
            buffer: Vec::new(),
            index_files,
        })
    }

    fn recover_index_files(root_dir: &Path) -> IndexerResult<Vec<IndexFile>> {
        let dir = root_dir.join("IndexFile");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut numbered = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let found = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|name| name.strip_prefix("index_"))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(n) = found {
                numbered.push((n, path));
            }
        }
        numbered.sort_by_key(|(n, _)| *n);

        let mut files = Vec::with_capacity(numbered.len());
        for (_, path) in numbered {
            if let Some(index_file) = Self::recover_one_index_file(&path)? {
                files.push(index_file);
            }
        }
        Ok(files)
    }

    /// Reconstructs one `IndexFile`'s `min_pagekey`/`max_pagekey` from its
    /// own `LookupBlock` and last `IndexBlock` — both self-describing, since
    /// their entries carry full `PageKey`s (unlike a bare page, whose bytes
    /// don't reveal Base-vs-Delta on their own).
    fn recover_one_index_file(path: &Path) -> IndexerResult<Option<IndexFile>> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < BLOCK_SIZE as u64 {
            return Ok(None);
        }
        file.seek(SeekFrom::End(-(BLOCK_SIZE as i64)))?;
        let mut lookup_buf = [0u8; BLOCK_SIZE];
        file.read_exact(&mut lookup_buf)?;
        let lookup_block = LookupBlock::deserialize(&lookup_buf)?;

        let (min_pagekey, last_offset) = match lookup_block.entries.first() {
            Some((k, _)) => (k.clone(), lookup_block.entries.last().unwrap().1),
            None => return Ok(None),
        };

        file.seek(SeekFrom::Start(last_offset))?;
        let mut index_buf = [0u8; BLOCK_SIZE];
        file.read_exact(&mut index_buf)?;
        let last_index_block = IndexBlock::deserialize(&index_buf)?;
        let max_pagekey = match last_index_block.entries.last() {
            Some((k, _)) => k.clone(),
            None => return Ok(None),
        };

        Ok(Some(IndexFile {
            min_pagekey,
            max_pagekey,
            path: path.to_path_buf(),
        }))
    }

    pub fn num_index_files(&self) -> usize {
        self.index_files.len()
    }

    /// Declared but unimplemented: querying all pages live at a given
    /// version without already knowing their pids. Left as a stub, matching
    /// the store's own unimplemented `PageQuery`.
    pub fn page_query(&self, _version: u64) -> IndexerResult<Vec<PageKey>> {
        Err(IndexerError::NotImplemented("PageQuery".into()))
    }

    pub fn active_delta_page(&mut self, pid: &str) -> IndexerResult<DeltaPage> {
        match self.active_delta_cache.get(pid)? {
            Some(page) => Ok(page),
            None => {
                let page = DeltaPage::new(pid.to_string());
                self.active_delta_cache.store(pid, page.clone())?;
                Ok(page)
            }
        }
    }

    pub fn store_active_delta_page(&mut self, page: DeltaPage) -> IndexerResult<()> {
        let pid = page.pagekey.pid.clone();
        self.active_delta_cache.store(&pid, page)
    }

    /// Deep-copies `page` into the in-memory buffer, flushing to disk when
    /// the buffer fills.
    pub fn store_page(&mut self, page: StoredPage) -> IndexerResult<()> {
        self.buffer.push(page);
        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes both the page buffer (to a new index file) and the active
    /// delta cache (to disk).
    pub fn flush(&mut self) -> IndexerResult<()> {
        self.flush_buffer()?;
        self.active_delta_cache.flush_to_disk()
    }

    fn flush_buffer(&mut self) -> IndexerResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut index_blocks: Vec<IndexBlock> = Vec::new();
        let mut current_block = IndexBlock::new();
        let mut current_location: u64 = 0;
        for page in &self.buffer {
            let key = page.pagekey().clone();
            if !current_block.fits(&key) {
                index_blocks.push(std::mem::take(&mut current_block));
            }
            current_block.push(key, current_location)?;
            current_location += PAGE_SIZE as u64;
        }
        if !current_block.entries.is_empty() {
            index_blocks.push(current_block);
        }

        let mut lookup_block = LookupBlock::new();
        let mut index_block_offset = current_location;
        for block in &index_blocks {
            if let Some(first) = block.first_key() {
                lookup_block.push(first.clone(), index_block_offset)?;
                index_block_offset += BLOCK_SIZE as u64;
            }
        }

        let dir = self.root_dir.join("IndexFile");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("index_{}.dat", self.index_files.len()));

        let mut file = File::create(&path)?;
        for page in &self.buffer {
            file.write_all(&page.serialize()?)?;
        }
        for block in &index_blocks {
            file.write_all(&block.serialize()?)?;
        }
        file.write_all(&lookup_block.serialize()?)?;
        file.flush()?;

        self.index_files.push(IndexFile {
            min_pagekey: self.buffer.first().unwrap().pagekey().clone(),
            max_pagekey: self.buffer.last().unwrap().pagekey().clone(),
            path,
        });
        self.buffer.clear();
        Ok(())
    }

    /// Searches the in-memory buffer, then the registered index files, for
    /// the page exactly matching `pagekey`.
    pub fn page_lookup(&self, pagekey: &PageKey) -> IndexerResult<Option<StoredPage>> {
        if pagekey.version == 0 {
            return Ok(None);
        }
        if let Some(page) = self.buffer.iter().find(|p| p.pagekey() == pagekey) {
            return Ok(Some(page.clone()));
        }
        let file = match self.index_files.iter().find(|f| f.covers(pagekey)) {
            Some(f) => f,
            None => return Ok(None),
        };
        Self::read_page_from_index_file(&file.path, pagekey)
    }

    fn read_page_from_index_file(
        path: &Path,
        pagekey: &PageKey,
    ) -> IndexerResult<Option<StoredPage>> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < BLOCK_SIZE as u64 {
            return Err(IndexerError::CorruptedBlock(
                "index file smaller than one lookup block".into(),
            ));
        }

        file.seek(SeekFrom::End(-(BLOCK_SIZE as i64)))?;
        let mut lookup_buf = [0u8; BLOCK_SIZE];
        file.read_exact(&mut lookup_buf)?;
        let lookup_block = LookupBlock::deserialize(&lookup_buf)?;

        let index_block_offset = match lookup_block.floor(pagekey) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        file.seek(SeekFrom::Start(index_block_offset))?;
        let mut index_buf = [0u8; BLOCK_SIZE];
        file.read_exact(&mut index_buf)?;
        let index_block = IndexBlock::deserialize(&index_buf)?;

        let page_offset = match index_block.find(pagekey) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        file.seek(SeekFrom::Start(page_offset))?;
        let mut page_buf = [0u8; PAGE_SIZE];
        file.read_exact(&mut page_buf)?;

        let page = match pagekey.page_type {
            PageType::Base => {
                let mut p = BasePage::deserialize(&page_buf)?;
                p.pagekey = pagekey.clone();
                StoredPage::Base(p)
            }
            PageType::Delta => {
                let mut p = DeltaPage::deserialize(&page_buf)?;
                p.pagekey = pagekey.clone();
                StoredPage::Delta(p)
            }
        };
        Ok(Some(page))
    }

    /// Reconstructs the base-page state for `pagekey.pid` at
    /// `pagekey.version`, replaying delta pages on top of the nearest prior
    /// checkpoint.
    ///
    /// `latest_basepage_version` and `version_upperbound` are supplied by the
    /// trie, which owns the per-pid version index `LoadPage` consults.
    pub fn load_page(
        &mut self,
        pagekey: &PageKey,
        latest_basepage_version: u64,
        version_upperbound: impl FnOnce() -> Option<u64>,
    ) -> IndexerResult<Option<BasePage>> {
        // `deltas` is a LIFO stack, bottom to top: active delta, optionally a
        // replay sentinel, then the chain walked by the loop below. Popping
        // therefore replays oldest-to-newest, ending with `active` last.
        let mut deltas: Vec<DeltaPage> = Vec::new();

        let active = self.active_delta_page(&pagekey.pid)?;
        let active_last_pagekey = active.last_pagekey.clone();
        deltas.push(active);

        let mut current_pagekey = if pagekey.version >= latest_basepage_version {
            active_last_pagekey.clone()
        } else {
            match version_upperbound() {
                Some(replay_version) => {
                    let replay_key = PageKey::new(
                        replay_version,
                        pagekey.tid,
                        PageType::Delta,
                        pagekey.pid.clone(),
                    );
                    match self.page_lookup(&replay_key)? {
                        Some(StoredPage::Delta(replay_sentinel)) => {
                            let last = replay_sentinel.last_pagekey.clone();
                            deltas.push(replay_sentinel);
                            last
                        }
                        _ => active_last_pagekey,
                    }
                }
                None => active_last_pagekey,
            }
        };

        while current_pagekey.page_type == PageType::Delta {
            match self.page_lookup(&current_pagekey)? {
                Some(StoredPage::Delta(delta)) => {
                    current_pagekey = delta.last_pagekey.clone();
                    deltas.push(delta);
                }
                _ => break,
            }
        }

        let mut base = if current_pagekey.version == 0 {
            BasePage::empty_placeholder(pagekey.pid.clone())
        } else {
            match self.page_lookup(&current_pagekey)? {
                Some(StoredPage::Base(b)) => b,
                _ => return Err(IndexerError::MissingBasePage),
            }
        };

        // Deltas were pushed oldest-last; pop them off in LIFO order so the
        // earliest-recorded chain link replays first.
        while let Some(delta) = deltas.pop() {
            apply_delta(&mut base, &delta, pagekey.version)?;
        }

        if base.pagekey.version < pagekey.version {
            return Ok(None);
        }
        Ok(Some(base))
    }
}

/// Replays `deltapage`'s items onto `basepage` up to (and excluding) the
/// first item whose version exceeds `target_version`.
fn apply_delta(basepage: &mut BasePage, deltapage: &DeltaPage, target_version: u64) -> IndexerResult<()> {
    for item in &deltapage.items {
        if item.version() > target_version {
            break;
        }
        basepage.update_delta_item(item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ValueLocation;
    use crate::page::DeltaItem;

    fn config(dir: &Path) -> LsvpsConfig {
        LsvpsConfig {
            root_dir: dir.to_path_buf(),
            max_buffer_size: 4,
            delta_cache_capacity: 16,
        }
    }

    #[test]
    fn store_and_lookup_in_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut lsvps = LSVPS::new(config(dir.path())).unwrap();
        let page = BasePage::new_empty("ab", b"ab", &[]).unwrap();
        let key = PageKey::new(1, 0, PageType::Base, "ab");
        let mut stored = page.clone();
        stored.pagekey = key.clone();
        lsvps.store_page(StoredPage::Base(stored)).unwrap();

        let found = lsvps.page_lookup(&key).unwrap().unwrap();
        assert_eq!(found.pagekey(), &key);
    }

    #[test]
    fn flush_then_lookup_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut lsvps = LSVPS::new(config(dir.path())).unwrap();
        for v in 1..=3u64 {
            let mut page = BasePage::new_empty("ab", b"ab", &[]).unwrap();
            page.pagekey = PageKey::new(v, 0, PageType::Base, "ab");
            lsvps.store_page(StoredPage::Base(page)).unwrap();
        }
        lsvps.flush().unwrap();
        assert_eq!(lsvps.num_index_files(), 1);
        assert!(lsvps.buffer.is_empty());

        let key = PageKey::new(2, 0, PageType::Base, "ab");
        let found = lsvps.page_lookup(&key).unwrap().unwrap();
        assert_eq!(found.pagekey(), &key);
    }

    #[test]
    fn load_page_replays_delta_onto_flushed_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut lsvps = LSVPS::new(config(dir.path())).unwrap();

        let mut base = BasePage::new_empty("", b"ab", &[]).unwrap();
        base.pagekey = PageKey::new(1, 0, PageType::Base, "");
        lsvps.store_page(StoredPage::Base(base)).unwrap();
        lsvps.flush_buffer().unwrap();

        let mut delta = DeltaPage::new("");
        delta.last_pagekey = PageKey::new(1, 0, PageType::Base, "");
        delta.push(DeltaItem::Leaf {
            location_in_page: 0,
            version: 2,
            hash: [9u8; 32],
            location: ValueLocation {
                file_id: 0,
                offset: 0,
                size: 2,
            },
        });
        delta.pagekey = PageKey::new(2, 0, PageType::Delta, "");
        lsvps.store_active_delta_page(delta).unwrap();

        let target = PageKey::new(2, 0, PageType::Base, "");
        let loaded = lsvps.load_page(&target, 1, || None).unwrap().unwrap();
        assert_eq!(loaded.pagekey.version, 2);
        assert_eq!(loaded.root.hash(), [9u8; 32]);
    }
}
