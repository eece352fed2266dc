use super::{Cursor, OpIterator, Operator};
use crate::buffer::page_cache::PageCache;
use crate::catalog::{Catalog, TableId};
use crate::error::{DbError, Result};
use crate::storage::heap_file::HeapFileIterator;
use crate::storage::tuple::{TdItem, Tuple, TupleDesc};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Reads every tuple of a table, in page then slot order.
///
/// Field names are prefixed with the table alias, `alias.name`.
pub struct SeqScan {
    schema: Arc<TupleDesc>,
    tuples: HeapFileIterator,
    cursor: Cursor,
}

impl SeqScan {
    /// Scans the table under its catalog name.
    pub fn new(
        catalog: &Catalog,
        cache: Arc<dyn PageCache>,
        tid: TransactionId,
        table_id: TableId,
    ) -> Result<SeqScan> {
        let alias = catalog.table_name(table_id)?;
        SeqScan::with_alias(catalog, cache, tid, table_id, &alias)
    }

    pub fn with_alias(
        catalog: &Catalog,
        cache: Arc<dyn PageCache>,
        tid: TransactionId,
        table_id: TableId,
        alias: &str,
    ) -> Result<SeqScan> {
        let file = catalog.table_id_to_file(table_id)?;
        let items = file
            .schema()
            .items()
            .iter()
            .map(|item| TdItem {
                field_type: item.field_type,
                name: item.name.as_ref().map(|name| format!("{}.{}", alias, name)),
            })
            .collect();

        Ok(SeqScan {
            schema: Arc::new(TupleDesc::new(items)?),
            tuples: file.iter(cache, tid),
            cursor: Cursor::default(),
        })
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> Result<()> {
        if self.cursor.is_open() {
            return Ok(());
        }
        self.tuples.rewind();
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.tuples.rewind();
        self.cursor.close();
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.ensure_open()?;
        self.tuples.rewind();
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &Arc<TupleDesc> {
        &self.schema
    }

    fn children(&self) -> Vec<&Operator> {
        Vec::new()
    }

    fn set_children(&mut self, children: Vec<Operator>) -> Result<()> {
        if !children.is_empty() {
            return Err(DbError::InvalidArgument(
                "a table scan has no children".to_string(),
            ));
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let mut tuple = match self.tuples.fetch_next()? {
            Some(tuple) => tuple,
            None => return Ok(None),
        };
        // Hand out the tuple under the aliased schema, keeping its values and location.
        let record_id = tuple.record_id();
        let fields: Vec<_> = tuple.fields().cloned().collect();
        tuple = Tuple::with_fields(self.schema.clone(), fields)?;
        tuple.set_record_id(record_id);
        Ok(Some(tuple))
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
