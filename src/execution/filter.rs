use super::{single_child, Cursor, OpIterator, Operator};
use crate::error::Result;
use crate::storage::tuple::{Tuple, TupleDesc};
use crate::storage::types::{CmpOp, Field};
use std::fmt;
use std::sync::Arc;

/// A condition a tuple either passes or fails.
#[derive(Clone)]
pub enum Predicate {
    /// Compares one field of the tuple against a constant.
    Compare {
        field: usize,
        op: CmpOp,
        operand: Field,
    },
    Custom(Arc<dyn Fn(&Tuple) -> bool + Send + Sync>),
}

impl Predicate {
    pub fn new(field: usize, op: CmpOp, operand: Field) -> Predicate {
        Predicate::Compare { field, op, operand }
    }

    pub fn from_fn<F>(f: F) -> Predicate
    where
        F: Fn(&Tuple) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom(Arc::new(f))
    }

    /// A tuple without the compared field never matches.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        match self {
            Predicate::Compare { field, op, operand } => tuple
                .field(*field)
                .map_or(false, |value| value.compare(*op, operand)),
            Predicate::Custom(f) => f(tuple),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Predicate::Compare { field, op, operand } => {
                write!(f, "field {} {} {}", field, op, operand)
            }
            Predicate::Custom(_) => write!(f, "<custom predicate>"),
        }
    }
}

/// Passes through the child's tuples that satisfy the predicate, in order.
pub struct Filter {
    predicate: Predicate,
    child: Box<Operator>,
    cursor: Cursor,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Operator) -> Filter {
        Filter {
            predicate,
            child: Box::new(child),
            cursor: Cursor::default(),
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl OpIterator for Filter {
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
        self.child.schema()
    }

    fn children(&self) -> Vec<&Operator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Operator>) -> Result<()> {
        self.child = Box::new(single_child(children)?);
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.matches(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, Predicate};
    use crate::execution::tests::{int_rows, ints};
    use crate::execution::{OpIterator, Operator};
    use crate::storage::types::{CmpOp, Field};

    #[test]
    fn keeps_matching_tuples_in_order() {
        let even = Predicate::from_fn(|t| t.field(0).and_then(Field::as_int).unwrap() % 2 == 0);
        let mut filter: Operator = Filter::new(even, int_rows(&[1, 2, 3, 4])).into();

        filter.open().unwrap();
        assert_eq!(ints(&filter.collect_tuples().unwrap()), vec![2, 4]);
        assert!(!filter.has_next().unwrap());

        filter.rewind().unwrap();
        assert_eq!(ints(&filter.collect_tuples().unwrap()), vec![2, 4]);
        filter.close();
    }

    #[test]
    fn compares_against_a_constant() {
        let predicate = Predicate::new(0, CmpOp::GreaterThanOrEq, Field::Int(3));
        let mut filter = Filter::new(predicate, int_rows(&[5, 1, 3, 2]));

        assert_eq!(filter.schema().field_name(0).unwrap(), Some("v"));
        filter.open().unwrap();
        let mut values = Vec::new();
        while filter.has_next().unwrap() {
            values.push(filter.next().unwrap());
        }
        assert_eq!(ints(&values), vec![5, 3]);
    }

    #[test]
    fn nothing_passes() {
        let predicate = Predicate::new(0, CmpOp::Equals, Field::Int(42));
        let mut filter = Filter::new(predicate, int_rows(&[1, 2]));
        filter.open().unwrap();
        assert!(!filter.has_next().unwrap());
    }

    #[test]
    fn replaces_its_child() {
        let predicate = Predicate::new(0, CmpOp::LessThan, Field::Int(10));
        let mut filter = Filter::new(predicate, int_rows(&[1]));
        assert_eq!(filter.children().len(), 1);

        assert!(filter.set_children(vec![]).is_err());
        filter.set_children(vec![int_rows(&[20, 5])]).unwrap();
        filter.open().unwrap();
        assert_eq!(ints(&[filter.next().unwrap()]), vec![5]);
    }
}
