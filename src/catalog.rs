use crate::error::{DbError, Result};
use crate::storage::heap_file::HeapFile;
use crate::storage::tuple::TupleDesc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies a table, and the heap file storing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u64);

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<TableId, TableEntry>,
    by_name: HashMap<String, TableId>,
}

/// Tracks the tables of a database: their heap files, schemas and names.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<Tables>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Registers the heap file under `name`. A table already registered
    /// under the same name or id is replaced.
    pub fn add_table(&self, file: HeapFile, name: &str) -> TableId {
        let table_id = file.id();
        let mut tables = self.tables.write();

        if let Some(old_id) = tables.by_name.remove(name) {
            tables.by_id.remove(&old_id);
        }
        if let Some(old) = tables.by_id.remove(&table_id) {
            tables.by_name.remove(&old.name);
        }

        log::debug!("adding table {:?} as {:?}", name, table_id);
        tables.by_name.insert(name.to_string(), table_id);
        tables.by_id.insert(
            table_id,
            TableEntry {
                file: Arc::new(file),
                name: name.to_string(),
            },
        );
        table_id
    }

    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.tables
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| DbError::InvalidArgument(format!("no table named {:?}", name)))
    }

    pub fn table_id_to_file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| entry.file.clone())
            .ok_or(DbError::NoSuchTable(table_id))
    }

    pub fn table_id_to_schema(&self, table_id: TableId) -> Result<Arc<TupleDesc>> {
        self.table_id_to_file(table_id)
            .map(|file| file.schema().clone())
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or(DbError::NoSuchTable(table_id))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().by_id.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Catalog, TableId};
    use crate::storage::heap_file::HeapFile;
    use crate::storage::tuple::TupleDesc;
    use crate::storage::types::Type;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn lookup_by_id_and_name() {
        let dir = tempdir().unwrap();
        let schema = Arc::new(TupleDesc::from_types(&[Type::Int, Type::Int]).unwrap());
        let file = HeapFile::open(dir.path().join("t1"), schema.clone(), 64).unwrap();

        let catalog = Catalog::new();
        let table_id = catalog.add_table(file, "t1");

        assert_eq!(catalog.table_id("t1").unwrap(), table_id);
        assert_eq!(*catalog.table_id_to_schema(table_id).unwrap(), *schema);
        assert_eq!(catalog.table_id_to_file(table_id).unwrap().id(), table_id);
        assert_eq!(catalog.table_name(table_id).unwrap(), "t1");
        assert_eq!(catalog.table_ids(), vec![table_id]);

        assert!(catalog.table_id("t2").is_err());
        assert!(catalog.table_id_to_file(TableId(table_id.0 ^ 1)).is_err());
    }

    #[test]
    fn same_name_replaces_table() {
        let dir = tempdir().unwrap();
        let schema = Arc::new(TupleDesc::from_types(&[Type::Int]).unwrap());
        let catalog = Catalog::new();

        let first = catalog.add_table(
            HeapFile::open(dir.path().join("a"), schema.clone(), 64).unwrap(),
            "t",
        );
        let second = catalog.add_table(
            HeapFile::open(dir.path().join("b"), schema, 64).unwrap(),
            "t",
        );

        assert_ne!(first, second);
        assert_eq!(catalog.table_id("t").unwrap(), second);
        assert!(catalog.table_id_to_file(first).is_err());
        assert_eq!(catalog.table_ids().len(), 1);
    }
}
