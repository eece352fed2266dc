use super::insert::count_row;
use super::{single_child, Cursor, OpIterator, Operator};
use crate::buffer::page_cache::PageCache;
use crate::error::{DbError, Result};
use crate::storage::tuple::{Tuple, TupleDesc};
use crate::storage::types::Type;
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Deletes every tuple its child yields from the table the tuple lives in,
/// then yields one row with the number of tuples deleted.
///
/// Like [`Insert`](super::Insert), the child is drained once and failures are
/// recorded rather than returned.
pub struct Delete {
    cache: Arc<dyn PageCache>,
    tid: TransactionId,
    child: Box<Operator>,
    schema: Arc<TupleDesc>,
    done: bool,
    errors: Vec<DbError>,
    cursor: Cursor,
}

impl Delete {
    pub fn new(cache: Arc<dyn PageCache>, tid: TransactionId, child: Operator) -> Result<Delete> {
        Ok(Delete {
            cache,
            tid,
            child: Box::new(child),
            schema: Arc::new(TupleDesc::with_names(&[Type::Int], &["numDeletedTuples"])?),
            done: false,
            errors: Vec::new(),
            cursor: Cursor::default(),
        })
    }

    pub fn errors(&self) -> &[DbError] {
        &self.errors
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> Result<()> {
        if self.cursor.is_open() {
            return Ok(());
        }
        self.child.open()?;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.cursor.close();
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.ensure_open()?;
        self.child.rewind()?;
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &Arc<TupleDesc> {
        &self.schema
    }

    fn children(&self) -> Vec<&Operator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Operator>) -> Result<()> {
        self.child = Box::new(single_child(children)?);
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }

        let mut deleted = 0;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            match self.cache.delete_tuple(self.tid, &mut tuple) {
                Ok(()) => deleted += 1,
                Err(error) => {
                    log::warn!("{:?} failed to delete {}: {}", self.tid, tuple, error);
                    self.errors.push(error);
                }
            }
        }
        self.done = true;
        log::debug!("{:?} deleted {} tuples", self.tid, deleted);

        count_row(&self.schema, deleted).map(Some)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
