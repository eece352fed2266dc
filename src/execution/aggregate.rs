use super::{single_child, Cursor, OpIterator, Operator, TupleIterator};
use crate::error::{DbError, Result};
use crate::storage::tuple::{Tuple, TupleDesc};
use crate::storage::types::{Field, Type};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    /// Integer average, truncated toward zero.
    Avg,
    /// Counts tuples, ignoring the aggregated value.
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateOp::Min => write!(f, "MIN"),
            AggregateOp::Max => write!(f, "MAX"),
            AggregateOp::Sum => write!(f, "SUM"),
            AggregateOp::Avg => write!(f, "AVG"),
            AggregateOp::Count => write!(f, "COUNT"),
        }
    }
}

/// Running state of one group.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    value: i64,
    /// Number of values summed, only used by AVG.
    count: i64,
}

/// Computes an aggregate over a stream of tuples, optionally grouped by one field.
///
/// Integer fields support every [`AggregateOp`], string fields only `Count`.
#[derive(Debug, Clone)]
pub struct Aggregator {
    group_by: Option<(usize, Type)>,
    field: usize,
    op: AggregateOp,
    schema: Arc<TupleDesc>,
    groups: HashMap<Option<Field>, Accumulator>,
    /// Group keys in the order they were first seen.
    keys: Vec<Option<Field>>,
}

impl Aggregator {
    /// `group_by` is the index and type of the grouping field, `None` to
    /// aggregate every tuple into one group. `field_type` is the type of the
    /// aggregated field.
    pub fn new(
        group_by: Option<(usize, Type)>,
        field: usize,
        field_type: Type,
        op: AggregateOp,
    ) -> Result<Aggregator> {
        if matches!(field_type, Type::Str(_)) && op != AggregateOp::Count {
            return Err(DbError::InvalidArgument(format!(
                "{} is not supported over strings, only COUNT is",
                op
            )));
        }

        let schema = match group_by {
            Some((_, group_type)) => {
                TupleDesc::with_names(&[group_type, Type::Int], &["groupValue", "aggregateValue"])?
            }
            None => TupleDesc::with_names(&[Type::Int], &["aggregateValue"])?,
        };

        Ok(Aggregator {
            group_by,
            field,
            op,
            schema: Arc::new(schema),
            groups: HashMap::new(),
            keys: Vec::new(),
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    /// The schema of the result rows.
    pub fn schema(&self) -> &Arc<TupleDesc> {
        &self.schema
    }

    /// Forgets every group merged so far.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.keys.clear();
    }

    /// Folds the tuple into the running value of its group.
    pub fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> Result<()> {
        let key = match self.group_by {
            Some((index, _)) => Some(
                tuple
                    .field(index)
                    .cloned()
                    .ok_or_else(|| DbError::NoSuchField(format!("group by field {}", index)))?,
            ),
            None => None,
        };

        let value = match self.op {
            AggregateOp::Count => 0,
            _ => tuple
                .field(self.field)
                .and_then(Field::as_int)
                .ok_or_else(|| {
                    DbError::InvalidArgument(format!("field {} is not an integer", self.field))
                })?,
        };

        let op = self.op;
        let keys = &mut self.keys;
        let acc = self.groups.entry(key).or_insert_with_key(|key| {
            keys.push(key.clone());
            let value = match op {
                AggregateOp::Min => i64::from(i32::MAX),
                AggregateOp::Max => i64::from(i32::MIN),
                AggregateOp::Sum | AggregateOp::Avg | AggregateOp::Count => 0,
            };
            Accumulator { value, count: 0 }
        });

        let value = i64::from(value);
        match op {
            AggregateOp::Min => acc.value = acc.value.min(value),
            AggregateOp::Max => acc.value = acc.value.max(value),
            AggregateOp::Sum | AggregateOp::Avg => {
                acc.value += value;
                acc.count += 1;
            }
            AggregateOp::Count => acc.value += 1,
        }
        Ok(())
    }

    /// Materializes one row per group, `(groupValue, aggregateValue)` or just
    /// `(aggregateValue)` without grouping, in the order groups were first seen.
    pub fn iterator(&self) -> Result<TupleIterator> {
        let mut rows = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let acc = match self.groups.get(key) {
                Some(acc) => acc,
                None => continue,
            };
            let value = match self.op {
                AggregateOp::Avg if acc.count > 0 => acc.value / acc.count,
                _ => acc.value,
            };
            let value = i32::try_from(value).map_err(|_| {
                DbError::Overflow(format!("{} of {} does not fit in an integer", self.op, value))
            })?;

            let mut fields = Vec::with_capacity(2);
            if let Some(key) = key {
                fields.push(key.clone());
            }
            fields.push(Field::Int(value));
            rows.push(Tuple::with_fields(self.schema.clone(), fields)?);
        }
        TupleIterator::new(self.schema.clone(), rows)
    }
}

/// Aggregates its child's tuples.
///
/// Opening drains the child into an [`Aggregator`], then the result rows are
/// yielded. Rewinding replays the rows without reading the child again.
pub struct Aggregate {
    child: Box<Operator>,
    aggregator: Aggregator,
    results: Option<TupleIterator>,
    cursor: Cursor,
}

impl Aggregate {
    /// Aggregates field `field` of the child, grouped by field `group_by` if given.
    pub fn new(
        child: Operator,
        field: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Aggregate> {
        let schema = child.schema();
        let group_by = match group_by {
            Some(index) => Some((index, schema.field_type(index)?)),
            None => None,
        };
        let aggregator = Aggregator::new(group_by, field, schema.field_type(field)?, op)?;

        Ok(Aggregate {
            child: Box::new(child),
            aggregator,
            results: None,
            cursor: Cursor::default(),
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.aggregator.op()
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> Result<()> {
        if self.cursor.is_open() {
            return Ok(());
        }
        self.child.open()?;

        self.aggregator.clear();
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.aggregator.merge_tuple_into_group(&tuple)?;
        }
        let mut results = self.aggregator.iterator()?;
        results.open()?;
        self.results = Some(results);

        self.cursor.open();
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results = None;
        self.cursor.close();
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor.ensure_open()?;
        if let Some(results) = self.results.as_mut() {
            results.rewind()?;
        }
        self.cursor.reset();
        Ok(())
    }

    fn schema(&self) -> &Arc<TupleDesc> {
        self.aggregator.schema()
    }

    fn children(&self) -> Vec<&Operator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Operator>) -> Result<()> {
        let child = single_child(children)?;
        let schema = child.schema();
        let field_type = schema.field_type(self.aggregator.field)?;
        let group_by = match self.aggregator.group_by {
            Some((index, _)) => Some((index, schema.field_type(index)?)),
            None => None,
        };
        self.aggregator = Aggregator::new(group_by, self.aggregator.field, field_type, self.op())?;
        self.child = Box::new(child);
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let results = match self.results.as_mut() {
            Some(results) => results,
            None => return Ok(None),
        };
        if !results.has_next()? {
            return Ok(None);
        }
        results.next().map(Some)
    }

    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }
}
