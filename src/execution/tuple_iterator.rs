use super::{Cursor, OpIterator, Operator};
use crate::error::{DbError, Result};
use crate::storage::tuple::{Tuple, TupleDesc};
use std::sync::Arc;

/// Yields a list of tuples held in memory.
pub struct TupleIterator {
    schema: Arc<TupleDesc>,
    tuples: Vec<Tuple>,
    position: usize,
    cursor: Cursor,
}

impl TupleIterator {
    /// Every tuple must have the given schema.
    pub fn new(schema: Arc<TupleDesc>, tuples: Vec<Tuple>) -> Result<TupleIterator> {
        if let Some(tuple) = tuples.iter().find(|t| **t.schema() != *schema) {
            return Err(DbError::SchemaMismatch {
                expected: schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }
        Ok(TupleIterator {
            schema,
            tuples,
            position: 0,
            cursor: Cursor::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> Result<()> {
        if self.cursor.is_open() {
            return Ok(());
        }
        self.position = 0;
        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.cursor.close();
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.ensure_open()?;
        self.position = 0;
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
                "a tuple list has no children".to_string(),
            ));
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let next = self.tuples.get(self.position).cloned();
        if next.is_some() {
            self.position += 1;
        }
        Ok(next)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
