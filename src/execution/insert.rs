use super::{single_child, Cursor, OpIterator, Operator};
use crate::buffer::page_cache::PageCache;
use crate::catalog::{Catalog, TableId};
use crate::error::{DbError, Result};
use crate::storage::tuple::{Tuple, TupleDesc};
use crate::storage::types::{Field, Type};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Builds the single row reporting how many tuples were affected.
pub(crate) fn count_row(schema: &Arc<TupleDesc>, count: usize) -> Result<Tuple> {
    let count = i32::try_from(count)
        .map_err(|_| DbError::Overflow(format!("{} tuples do not fit in an integer", count)))?;
    Tuple::with_fields(schema.clone(), vec![Field::Int(count)])
}

/// Inserts every tuple of its child into a table, then yields one row with
/// the number of tuples inserted.
///
/// The child is drained once over the lifetime of the operator. A tuple that
/// fails to insert is recorded in [`Insert::errors`] and is not counted.
pub struct Insert {
    cache: Arc<dyn PageCache>,
    tid: TransactionId,
    table_id: TableId,
    table_schema: Arc<TupleDesc>,
    child: Box<Operator>,
    schema: Arc<TupleDesc>,
    done: bool,
    errors: Vec<DbError>,
    cursor: Cursor,
}

impl Insert {
    /// Fails if the child does not produce tuples of the table's schema.
    pub fn new(
        catalog: &Catalog,
        cache: Arc<dyn PageCache>,
        tid: TransactionId,
        child: Operator,
        table_id: TableId,
    ) -> Result<Insert> {
        let table_schema = catalog.table_id_to_schema(table_id)?;
        check_schema(&table_schema, &child)?;

        Ok(Insert {
            cache,
            tid,
            table_id,
            table_schema,
            child: Box::new(child),
            schema: Arc::new(TupleDesc::with_names(&[Type::Int], &["numInsertedTuples"])?),
            done: false,
            errors: Vec::new(),
            cursor: Cursor::default(),
        })
    }

    /// The failures swallowed while inserting.
    pub fn errors(&self) -> &[DbError] {
        &self.errors
    }
}

fn check_schema(table_schema: &TupleDesc, child: &Operator) -> Result<()> {
    if **child.schema() != *table_schema {
        return Err(DbError::SchemaMismatch {
            expected: table_schema.to_string(),
            actual: child.schema().to_string(),
        });
    }
    Ok(())
}

impl OpIterator for Insert {
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
        let child = single_child(children)?;
        check_schema(&self.table_schema, &child)?;
        self.child = Box::new(child);
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }

        let mut inserted = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            match self.cache.insert_tuple(self.tid, self.table_id, tuple) {
                Ok(()) => inserted += 1,
                Err(error) => {
                    log::warn!(
                        "{:?} failed to insert a tuple into {:?}: {}",
                        self.tid,
                        self.table_id,
                        error
                    );
                    self.errors.push(error);
                }
            }
        }
        self.done = true;
        log::debug!("{:?} inserted {} tuples into {:?}", self.tid, inserted, self.table_id);

        count_row(&self.schema, inserted).map(Some)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
