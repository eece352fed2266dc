use heapdb::buffer::page_cache::PageCache;
use heapdb::config::DbConfig;
use heapdb::db::Database;
use heapdb::error::DbError;
use heapdb::execution::{
    Aggregate, AggregateOp, Filter, Insert, OpIterator, Operator, Predicate, SeqScan,
};
use heapdb::storage::types::{CmpOp, Field};
use std::collections::HashSet;
use std::error::Error;

mod common;

/// Counts the operators of a tree by walking it through `children`.
fn count_nodes(op: &Operator) -> usize {
    1 + op.children().into_iter().map(count_nodes).sum::<usize>()
}

#[test]
fn insert_filtered_rows_into_another_table() -> Result<(), Box<dyn Error>> {
    let _ = simple_logger::init();

    common::with_page_file("source", |source_path| {
        let schema = common::int_schema(&["id", "group"]);
        let db = Database::new(DbConfig::default().with_page_size(256))?;
        let source = db.open_table(source_path, schema.clone(), "source")?;
        let target_path = source_path.with_file_name("target");
        let target = db.open_table(&target_path, schema.clone(), "target")?;

        let tid = db.new_transaction();
        for i in 0..100 {
            db.buffer_pool().insert_tuple(tid, source, common::int_tuple(&schema, &[i, i % 3]))?;
        }
        db.commit(tid)?;

        let tid = db.new_transaction();
        let scan = SeqScan::new(db.catalog(), db.page_cache(), tid, source)?;
        let filter = Filter::new(
            Predicate::new(0, CmpOp::GreaterThanOrEq, Field::Int(50)),
            scan.into(),
        );
        let mut insert: Operator =
            Insert::new(db.catalog(), db.page_cache(), tid, filter.into(), target)?.into();
        assert_eq!(count_nodes(&insert), 3);

        insert.open()?;
        assert_eq!(common::int_values(&insert.next()?), vec![50]);
        assert!(!insert.has_next()?);
        insert.close();
        db.commit(tid)?;

        // Sum the copied ids of each group.
        let tid = db.new_transaction();
        let scan = SeqScan::new(db.catalog(), db.page_cache(), tid, target)?;
        let mut sums: Operator = Aggregate::new(scan.into(), 0, Some(1), AggregateOp::Sum)?.into();
        sums.open()?;
        let rows: HashSet<Vec<i32>> = sums
            .collect_tuples()?
            .iter()
            .map(common::int_values)
            .collect();
        let expected: HashSet<Vec<i32>> = (0..3)
            .map(|g| vec![g, (50..100).filter(|i| i % 3 == g).sum()])
            .collect();
        assert_eq!(rows, expected);
        db.commit(tid)?;
        Ok(())
    })
}

#[test]
fn conflicting_transaction_fails_then_succeeds() -> Result<(), Box<dyn Error>> {
    let _ = simple_logger::init();

    common::with_page_file("conflict", |page_file_path| {
        let schema = common::int_schema(&["id"]);
        let db = Database::new(DbConfig::default())?;
        let table_id = db.open_table(page_file_path, schema.clone(), "t")?;

        let writer = db.new_transaction();
        db.buffer_pool().insert_tuple(writer, table_id, common::int_tuple(&schema, &[1]))?;

        let reader = db.new_transaction();
        let mut scan: Operator =
            SeqScan::new(db.catalog(), db.page_cache(), reader, table_id)?.into();
        scan.open()?;
        match scan.has_next() {
            Err(DbError::LockConflict { tid, .. }) => assert_eq!(tid, reader),
            other => panic!("expected a lock conflict, got {:?}", other),
        }

        db.commit(writer)?;
        scan.rewind()?;
        assert_eq!(scan.collect_tuples()?.len(), 1);
        db.commit(reader)?;
        Ok(())
    })
}

#[test]
fn count_every_row() -> Result<(), Box<dyn Error>> {
    let _ = simple_logger::init();

    common::with_page_file("count", |page_file_path| {
        let schema = common::int_schema(&["id"]);
        let db = Database::new(DbConfig::default().with_page_size(64))?;
        let table_id = db.open_table(page_file_path, schema.clone(), "t")?;

        let tid = db.new_transaction();
        for i in 0..37 {
            db.buffer_pool().insert_tuple(tid, table_id, common::int_tuple(&schema, &[i]))?;
        }

        let scan = SeqScan::new(db.catalog(), db.page_cache(), tid, table_id)?;
        let mut count: Operator = Aggregate::new(scan.into(), 0, None, AggregateOp::Count)?.into();
        count.open()?;
        assert_eq!(common::int_values(&count.next()?), vec![37]);
        assert!(matches!(count.next(), Err(DbError::NoSuchElement)));
        db.commit(tid)?;
        Ok(())
    })
}
