use crate::buffer::page_cache::{PageCache, PageRef, Permissions};
use crate::catalog::TableId;
use crate::error::{DbError, Result};
use crate::storage::disk_manager::DiskManager;
use crate::storage::page::{slots_per_page, HeapPage, PageId};
use crate::storage::tuple::{Tuple, TupleDesc};
use crate::transaction::TransactionId;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An unordered collection of tuples stored as a sequence of heap pages in one file.
///
/// Reads and writes of whole pages go straight to disk. Tuple level changes go
/// through a [`PageCache`] which owns the in-memory copies of the pages.
pub struct HeapFile {
    id: TableId,
    path: PathBuf,
    schema: Arc<TupleDesc>,
    page_size: usize,
    /// Serializes disk access, including the appends of new pages.
    disk: Mutex<DiskManager>,
    /// Pages appended by an insert that has not claimed them through the cache yet.
    reserved: Mutex<HashSet<usize>>,
}

/// Derives a table id from the absolute path of its file so the same file always gets the same id.
fn table_id_for(path: &Path) -> TableId {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    TableId(hasher.finish())
}

impl HeapFile {
    /// Opens the heap file at `path`, creating it if it does not exist.
    pub fn open<P: AsRef<Path>>(
        path: P,
        schema: Arc<TupleDesc>,
        page_size: usize,
    ) -> Result<HeapFile> {
        if slots_per_page(page_size, schema.size()) == 0 {
            return Err(DbError::InvalidArgument(format!(
                "a tuple of {} bytes does not fit in a page of {} bytes",
                schema.size(),
                page_size
            )));
        }

        let disk = DiskManager::new(&path, page_size)?;
        let path = path.as_ref().canonicalize()?;

        Ok(HeapFile {
            id: table_id_for(&path),
            path,
            schema,
            page_size,
            disk: Mutex::new(disk),
            reserved: Mutex::new(HashSet::new()),
        })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn schema(&self) -> &Arc<TupleDesc> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages in the file.
    pub fn num_pages(&self) -> Result<usize> {
        Ok(self.disk.lock().num_pages()?)
    }

    /// Reads the page from disk, bypassing any cache.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        self.check_owned(page_id)?;

        let mut disk = self.disk.lock();
        let num_pages = disk.num_pages()?;
        if page_id.page_no >= num_pages {
            return Err(DbError::PageOutOfRange { page_id, num_pages });
        }

        let bytes = disk.read_page(page_id.page_no)?;
        HeapPage::from_bytes(page_id, self.schema.clone(), self.page_size, &bytes)
    }

    /// Writes the page over its region of the file.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        self.check_owned(page.id())?;

        let bytes = page.to_bytes()?;
        self.disk.lock().write_page(page.id().page_no, &bytes)?;
        Ok(())
    }

    /// Inserts the tuple into the first page with a free slot, appending a new
    /// page to the file if every page is full.
    ///
    /// Pages another transaction holds, or has just appended, are passed over.
    /// Returns the pages that were modified.
    pub fn insert_tuple(
        &self,
        cache: &dyn PageCache,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<PageRef>> {
        if **tuple.schema() != *self.schema {
            return Err(DbError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }

        let num_pages = self.num_pages()?;
        for page_no in 0..num_pages {
            if self.reserved.lock().contains(&page_no) {
                continue;
            }
            let page =
                match cache.fetch_page(tid, PageId::new(self.id, page_no), Permissions::ReadWrite) {
                    Ok(page) => page,
                    Err(DbError::LockConflict { .. }) => continue,
                    Err(e) => return Err(e),
                };
            let mut guard = page.write();
            if guard.num_empty_slots() == 0 {
                continue;
            }
            guard.insert_tuple(tuple)?;
            drop(guard);
            return Ok(vec![page]);
        }

        // Every page is full. Reserve a new page on disk while holding the disk lock
        // so concurrent appenders each get their own page, then fill it through the cache.
        let page_no = {
            let mut disk = self.disk.lock();
            let page_no = disk.append_page(&HeapPage::empty_page_data(self.page_size))?;
            self.reserved.lock().insert(page_no);
            page_no
        };
        log::debug!("appended page {} to table {:?}", page_no, self.id);

        let fetched = cache.fetch_page(tid, PageId::new(self.id, page_no), Permissions::ReadWrite);
        let page = match fetched {
            Ok(page) => {
                self.reserved.lock().remove(&page_no);
                page
            }
            // A scan holds the page, so it is in use and stays.
            Err(e @ DbError::LockConflict { .. }) => {
                self.reserved.lock().remove(&page_no);
                return Err(e);
            }
            Err(e) => {
                // The page stays reserved until it is gone so no other insert claims it.
                let truncated = self.disk.lock().truncate_last_page(page_no);
                self.reserved.lock().remove(&page_no);
                if truncated? {
                    log::debug!("gave back page {} of table {:?}: {}", page_no, self.id, e);
                }
                return Err(e);
            }
        };
        page.write().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Removes the tuple from the page its record id points to.
    /// Returns the pages that were modified.
    pub fn delete_tuple(
        &self,
        cache: &dyn PageCache,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        if rid.page_id.table_id != self.id {
            return Err(DbError::TupleNotOnPage(Some(rid)));
        }

        let page = cache.fetch_page(tid, rid.page_id, Permissions::ReadWrite)?;
        page.write().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Returns a lazy scan over every tuple in the file, reading pages through the cache.
    pub fn iter(
        self: &Arc<Self>,
        cache: Arc<dyn PageCache>,
        tid: TransactionId,
    ) -> HeapFileIterator {
        HeapFileIterator {
            file: self.clone(),
            cache,
            tid,
            num_pages: None,
            next_page: 0,
            tuples: Vec::new().into_iter(),
        }
    }

    fn check_owned(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id != self.id {
            return Err(DbError::InvalidArgument(format!(
                "page {:?} does not belong to table {:?}",
                page_id, self.id
            )));
        }
        Ok(())
    }
}

/// Scans a heap file page by page. Only the tuples of the current page are held in memory.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    cache: Arc<dyn PageCache>,
    tid: TransactionId,
    /// Page count, taken when the scan (re)starts.
    num_pages: Option<usize>,
    next_page: usize,
    tuples: std::vec::IntoIter<Tuple>,
}

impl HeapFileIterator {
    /// Positions the scan before the first page again.
    pub fn rewind(&mut self) {
        self.num_pages = None;
        self.next_page = 0;
        self.tuples = Vec::new().into_iter();
    }

    pub fn schema(&self) -> &Arc<TupleDesc> {
        self.file.schema()
    }

    /// Returns the next tuple, or `None` once every page has been read.
    pub fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        loop {
            if let Some(tuple) = self.tuples.next() {
                return Ok(Some(tuple));
            }

            let num_pages = match self.num_pages {
                Some(num_pages) => num_pages,
                None => {
                    let num_pages = self.file.num_pages()?;
                    self.num_pages = Some(num_pages);
                    num_pages
                }
            };
            if self.next_page >= num_pages {
                return Ok(None);
            }

            let page_id = PageId::new(self.file.id(), self.next_page);
            let page = self
                .cache
                .fetch_page(self.tid, page_id, Permissions::ReadOnly)?;
            let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
            self.tuples = tuples.into_iter();
            self.next_page += 1;
        }
    }
}

impl Iterator for HeapFileIterator {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::HeapFile;
    use crate::buffer::page_cache::{PageCache, PageRef, Permissions};
    use crate::catalog::TableId;
    use crate::error::{DbError, Result};
    use crate::storage::page::{HeapPage, PageId};
    use crate::storage::tuple::{Tuple, TupleDesc};
    use crate::storage::types::{Field, Type};
    use crate::transaction::TransactionId;
    use parking_lot::{Mutex, RwLock};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    // 64 byte pages hold 15 single integer tuples.
    const PAGE_SIZE: usize = 64;
    const SLOTS: usize = 15;

    /// Caches every page it reads, forever.
    struct MockPageCache {
        file: Arc<HeapFile>,
        pages: Mutex<HashMap<PageId, PageRef>>,
    }

    impl MockPageCache {
        fn new(file: Arc<HeapFile>) -> Self {
            MockPageCache {
                file,
                pages: Mutex::new(HashMap::new()),
            }
        }
    }

    impl PageCache for MockPageCache {
        fn fetch_page(
            &self,
            _tid: TransactionId,
            page_id: PageId,
            _perm: Permissions,
        ) -> Result<PageRef> {
            let mut pages = self.pages.lock();
            if let Some(page) = pages.get(&page_id) {
                return Ok(page.clone());
            }
            let page = Arc::new(RwLock::new(self.file.read_page(page_id)?));
            pages.insert(page_id, page.clone());
            Ok(page)
        }

        fn insert_tuple(&self, tid: TransactionId, _table_id: TableId, tuple: Tuple) -> Result<()> {
            self.file.insert_tuple(self, tid, tuple).map(|_| ())
        }

        fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
            self.file.delete_tuple(self, tid, tuple).map(|_| ())
        }
    }

    fn setup() -> (TempDir, Arc<HeapFile>, Arc<MockPageCache>) {
        let dir = tempdir().unwrap();
        let schema = Arc::new(TupleDesc::from_types(&[Type::Int]).unwrap());
        let file = Arc::new(HeapFile::open(dir.path().join("table"), schema, PAGE_SIZE).unwrap());
        let cache = Arc::new(MockPageCache::new(file.clone()));
        (dir, file, cache)
    }

    fn int_tuple(file: &HeapFile, v: i32) -> Tuple {
        Tuple::with_fields(file.schema().clone(), vec![Field::Int(v)]).unwrap()
    }

    fn scan_values(file: &Arc<HeapFile>, cache: &Arc<MockPageCache>) -> Vec<i32> {
        file.iter(cache.clone(), TransactionId::new())
            .map(|t| t.unwrap().field(0).and_then(Field::as_int).unwrap())
            .collect()
    }

    #[test]
    fn id_is_stable_for_a_file() {
        let (dir, file, _) = setup();
        let again = HeapFile::open(dir.path().join("table"), file.schema().clone(), PAGE_SIZE)
            .unwrap();
        let other = HeapFile::open(dir.path().join("other"), file.schema().clone(), PAGE_SIZE)
            .unwrap();

        assert_eq!(file.id(), again.id());
        assert_ne!(file.id(), other.id());
    }

    #[test]
    fn rejects_tuples_larger_than_a_page() {
        let dir = tempdir().unwrap();
        let schema = Arc::new(TupleDesc::from_types(&[Type::Str(100)]).unwrap());
        assert!(HeapFile::open(dir.path().join("table"), schema, PAGE_SIZE).is_err());
    }

    #[test]
    fn insert_grows_file_when_pages_are_full() -> Result<()> {
        let (_dir, file, cache) = setup();
        let tid = TransactionId::new();
        assert_eq!(file.num_pages()?, 0);

        for v in 0..SLOTS as i32 {
            file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, v))?;
        }
        assert_eq!(file.num_pages()?, 1);

        let pages = file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, 100))?;
        assert_eq!(file.num_pages()?, 2);
        assert_eq!(pages.len(), 1);

        let page = pages[0].read();
        assert_eq!(page.id(), PageId::new(file.id(), 1));
        let tuple = page.tuple(0).unwrap();
        assert_eq!(tuple.field(0), Some(&Field::Int(100)));
        assert_eq!(tuple.record_id().unwrap().page_id.page_no, 1);
        Ok(())
    }

    #[test]
    fn mismatched_tuple_leaves_the_file_alone() -> Result<()> {
        let (_dir, file, cache) = setup();
        let tid = TransactionId::new();
        let pair = Arc::new(TupleDesc::from_types(&[Type::Int, Type::Int])?);
        let stranger = Tuple::new(pair);

        assert!(file.insert_tuple(cache.as_ref(), tid, stranger.clone()).is_err());
        assert_eq!(file.num_pages()?, 0);

        for v in 0..SLOTS as i32 {
            file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, v))?;
        }
        match file.insert_tuple(cache.as_ref(), tid, stranger) {
            Err(DbError::SchemaMismatch { .. }) => {}
            other => panic!("expected a schema mismatch, got {:?}", other.map(|_| ())),
        }
        assert_eq!(file.num_pages()?, 1);
        Ok(())
    }

    #[test]
    fn insert_reuses_freed_slots() -> Result<()> {
        let (_dir, file, cache) = setup();
        let tid = TransactionId::new();
        for v in 0..(SLOTS + 1) as i32 {
            file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, v))?;
        }

        let mut victim = cache
            .fetch_page(tid, PageId::new(file.id(), 0), Permissions::ReadOnly)?
            .read()
            .tuple(3)
            .cloned()
            .unwrap();
        file.delete_tuple(cache.as_ref(), tid, &mut victim)?;
        assert!(victim.record_id().is_none());

        let pages = file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, 42))?;
        assert_eq!(pages[0].read().id().page_no, 0);
        assert_eq!(file.num_pages()?, 2);
        Ok(())
    }

    #[test]
    fn delete_requires_a_location() -> Result<()> {
        let (_dir, file, cache) = setup();
        let tid = TransactionId::new();
        let mut transient = int_tuple(&file, 1);

        match file.delete_tuple(cache.as_ref(), tid, &mut transient) {
            Err(DbError::MissingRecordId) => {}
            other => panic!("expected a missing record id, got {:?}", other.map(|_| ())),
        }

        file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, 1))?;
        let mut t = file.iter(cache.clone(), tid).next().unwrap()?;
        let mut copy = t.clone();
        file.delete_tuple(cache.as_ref(), tid, &mut t)?;
        assert!(file.delete_tuple(cache.as_ref(), tid, &mut copy).is_err());
        Ok(())
    }

    #[test]
    fn read_and_write_pages() -> Result<()> {
        let (_dir, file, cache) = setup();
        let tid = TransactionId::new();
        for v in 0..20 {
            file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, v))?;
        }

        // Inserted tuples only live in the cache until the pages are written.
        assert_eq!(file.read_page(PageId::new(file.id(), 0))?.iter().count(), 0);

        let page = cache.fetch_page(tid, PageId::new(file.id(), 0), Permissions::ReadOnly)?;
        file.write_page(&page.read())?;
        assert_eq!(file.num_pages()?, 2);

        let on_disk = file.read_page(PageId::new(file.id(), 0))?;
        assert_eq!(on_disk.to_bytes()?, page.read().to_bytes()?);
        assert_eq!(on_disk.iter().count(), SLOTS);

        match file.read_page(PageId::new(file.id(), 2)) {
            Err(DbError::PageOutOfRange { num_pages, .. }) => assert_eq!(num_pages, 2),
            other => panic!("expected an out of range page, got {:?}", other.map(|_| ())),
        }
        assert!(file.read_page(PageId::new(TableId(file.id().0 ^ 1), 0)).is_err());
        Ok(())
    }

    #[test]
    fn scan_yields_every_resident_tuple_once() -> Result<()> {
        let (_dir, file, cache) = setup();
        let tid = TransactionId::new();
        for v in 0..40 {
            file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, v))?;
        }
        assert_eq!(file.num_pages()?, 3);

        // Empty out a few slots on the first two pages.
        let doomed: Vec<Tuple> = file
            .iter(cache.clone(), tid)
            .map(|t| t.unwrap())
            .filter(|t| [2, 7, 16, 29].contains(&t.field(0).and_then(Field::as_int).unwrap()))
            .collect();
        for mut t in doomed {
            file.delete_tuple(cache.as_ref(), tid, &mut t)?;
        }

        let expected: Vec<i32> = (0..40).filter(|v| ![2, 7, 16, 29].contains(v)).collect();
        assert_eq!(scan_values(&file, &cache), expected);

        let mut iter = file.iter(cache.clone(), tid);
        let first: Vec<i32> = iter
            .by_ref()
            .map(|t| t.unwrap().field(0).and_then(Field::as_int).unwrap())
            .collect();
        iter.rewind();
        let second: Vec<i32> = iter
            .map(|t| t.unwrap().field(0).and_then(Field::as_int).unwrap())
            .collect();
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn scan_skips_empty_pages() -> Result<()> {
        let (_dir, file, cache) = setup();
        let tid = TransactionId::new();
        for v in 0..(2 * SLOTS + 1) as i32 {
            file.insert_tuple(cache.as_ref(), tid, int_tuple(&file, v))?;
        }

        // Empty the middle page entirely.
        let page = cache.fetch_page(tid, PageId::new(file.id(), 1), Permissions::ReadWrite)?;
        let mut residents: Vec<Tuple> = page.read().iter().cloned().collect();
        for t in residents.iter_mut() {
            page.write().delete_tuple(t)?;
        }

        let values = scan_values(&file, &cache);
        assert_eq!(values.len(), SLOTS + 1);
        assert_eq!(values.last(), Some(&(2 * SLOTS as i32)));
        Ok(())
    }

    #[test]
    fn empty_file_scans_nothing() {
        let (_dir, file, cache) = setup();
        assert!(scan_values(&file, &cache).is_empty());
        assert_eq!(HeapPage::empty_page_data(PAGE_SIZE).len(), PAGE_SIZE);
    }
}
