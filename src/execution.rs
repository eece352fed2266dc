//! Pull based query operators.
//!
//! Every operator implements [`OpIterator`]: it is opened, pulled with
//! `has_next` / `next` until exhausted, optionally rewound, then closed.
//! Operators are composed into trees of [`Operator`] values where each parent
//! pulls tuples from its children.
//!
//! ```text
//! Insert / Delete / Aggregate
//!       └── Filter
//!             └── SeqScan (one page of tuples buffered at a time)
//! ```

mod aggregate;
mod delete;
mod filter;
mod insert;
mod seq_scan;
mod tuple_iterator;

pub use aggregate::{Aggregate, AggregateOp, Aggregator};
pub use delete::Delete;
pub use filter::{Filter, Predicate};
pub use insert::Insert;
pub use seq_scan::SeqScan;
pub use tuple_iterator::TupleIterator;

use crate::error::{DbError, Result};
use crate::storage::tuple::{Tuple, TupleDesc};
use std::sync::Arc;

/// Open state and one tuple of lookahead, shared by every operator.
#[derive(Debug, Default)]
pub struct Cursor {
    open: bool,
    lookahead: Option<Tuple>,
}

impl Cursor {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn open(&mut self) {
        self.open = true;
        self.lookahead = None;
    }

    pub(crate) fn close(&mut self) {
        self.open = false;
        self.lookahead = None;
    }

    /// Drops the buffered tuple so the next pull starts over.
    pub(crate) fn reset(&mut self) {
        self.lookahead = None;
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if !self.open {
            return Err(DbError::IllegalState("operator is not open"));
        }
        Ok(())
    }
}

/// The protocol every operator follows.
///
/// An operator starts closed. `open` opens its children, then does its own setup,
/// and is a no-op on an open operator. `has_next`, `next` and `rewind` fail unless
/// the operator is open. `close` may be called any number of times.
pub trait OpIterator {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    /// Restarts the output from the beginning.
    fn rewind(&mut self) -> Result<()>;

    fn schema(&self) -> &Arc<TupleDesc>;

    fn children(&self) -> Vec<&Operator>;

    fn set_children(&mut self, children: Vec<Operator>) -> Result<()>;

    /// Produces the next tuple, or `None` once the operator is exhausted.
    /// Only called while open.
    fn fetch_next(&mut self) -> Result<Option<Tuple>>;

    fn cursor(&mut self) -> &mut Cursor;

    fn has_next(&mut self) -> Result<bool> {
        self.cursor().ensure_open()?;
        if self.cursor().lookahead.is_none() {
            let next = self.fetch_next()?;
            self.cursor().lookahead = next;
        }
        Ok(self.cursor().lookahead.is_some())
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement);
        }
        self.cursor().lookahead.take().ok_or(DbError::NoSuchElement)
    }
}

/// The closed set of operators a query tree is built from.
pub enum Operator {
    SeqScan(SeqScan),
    Filter(Filter),
    Insert(Insert),
    Delete(Delete),
    Aggregate(Aggregate),
    Tuples(TupleIterator),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Operator::SeqScan($op) => $body,
            Operator::Filter($op) => $body,
            Operator::Insert($op) => $body,
            Operator::Delete($op) => $body,
            Operator::Aggregate($op) => $body,
            Operator::Tuples($op) => $body,
        }
    };
}

impl OpIterator for Operator {
    fn open(&mut self) -> Result<()> {
        dispatch!(self, op => op.open())
    }

    fn close(&mut self) {
        dispatch!(self, op => op.close())
    }

    fn rewind(&mut self) -> Result<()> {
        dispatch!(self, op => op.rewind())
    }

    fn schema(&self) -> &Arc<TupleDesc> {
        dispatch!(self, op => op.schema())
    }

    fn children(&self) -> Vec<&Operator> {
        dispatch!(self, op => op.children())
    }

    fn set_children(&mut self, children: Vec<Operator>) -> Result<()> {
        dispatch!(self, op => op.set_children(children))
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        dispatch!(self, op => op.fetch_next())
    }

    fn cursor(&mut self) -> &mut Cursor {
        dispatch!(self, op => op.cursor())
    }

    fn has_next(&mut self) -> Result<bool> {
        dispatch!(self, op => op.has_next())
    }

    fn next(&mut self) -> Result<Tuple> {
        dispatch!(self, op => op.next())
    }
}

impl Operator {
    /// Pulls every remaining tuple out of an open operator.
    pub fn collect_tuples(&mut self) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();
        while self.has_next()? {
            tuples.push(self.next()?);
        }
        Ok(tuples)
    }
}

macro_rules! impl_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Operator {
                fn from(op: $variant) -> Self {
                    Operator::$variant(op)
                }
            }
        )*
    };
}

impl_from!(SeqScan, Filter, Insert, Delete, Aggregate);

impl From<TupleIterator> for Operator {
    fn from(op: TupleIterator) -> Self {
        Operator::Tuples(op)
    }
}

/// Takes the only child out of `children`.
pub(crate) fn single_child(children: Vec<Operator>) -> Result<Operator> {
    if children.len() != 1 {
        return Err(DbError::InvalidArgument(format!(
            "expected exactly one child, got {}",
            children.len()
        )));
    }
    children
        .into_iter()
        .next()
        .ok_or_else(|| DbError::InvalidArgument("expected exactly one child".to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{OpIterator, Operator, TupleIterator};
    use crate::error::DbError;
    use crate::storage::tuple::{Tuple, TupleDesc};
    use crate::storage::types::{Field, Type};
    use std::sync::Arc;

    /// Builds a list operator over single column integer tuples.
    pub fn int_rows(values: &[i32]) -> Operator {
        let schema = Arc::new(TupleDesc::with_names(&[Type::Int], &["v"]).unwrap());
        let tuples = values
            .iter()
            .map(|&v| Tuple::with_fields(schema.clone(), vec![Field::Int(v)]).unwrap())
            .collect();
        TupleIterator::new(schema, tuples).unwrap().into()
    }

    pub fn ints(tuples: &[Tuple]) -> Vec<i32> {
        tuples
            .iter()
            .map(|t| t.field(0).and_then(Field::as_int).unwrap())
            .collect()
    }

    #[test]
    fn closed_operator_refuses_pulls() {
        let mut op = int_rows(&[1]);
        assert!(matches!(op.has_next(), Err(DbError::IllegalState(_))));
        assert!(matches!(op.next(), Err(DbError::IllegalState(_))));
        assert!(matches!(op.rewind(), Err(DbError::IllegalState(_))));

        op.open().unwrap();
        op.close();
        op.close();
        assert!(matches!(op.next(), Err(DbError::IllegalState(_))));
    }

    #[test]
    fn lookahead_is_idempotent() {
        let mut op = int_rows(&[1, 2]);
        op.open().unwrap();

        assert!(op.has_next().unwrap());
        assert!(op.has_next().unwrap());
        assert_eq!(op.next().unwrap().field(0), Some(&Field::Int(1)));
        assert_eq!(op.next().unwrap().field(0), Some(&Field::Int(2)));
        assert!(!op.has_next().unwrap());
        assert!(matches!(op.next(), Err(DbError::NoSuchElement)));
    }

    #[test]
    fn open_twice_keeps_position() {
        let mut op = int_rows(&[1, 2, 3]);
        op.open().unwrap();
        op.next().unwrap();
        op.open().unwrap();
        assert_eq!(ints(&op.collect_tuples().unwrap()), vec![2, 3]);

        op.rewind().unwrap();
        assert_eq!(ints(&op.collect_tuples().unwrap()), vec![1, 2, 3]);
    }
}
