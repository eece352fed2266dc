use heapdb::storage::tuple::{Tuple, TupleDesc};
use heapdb::storage::types::{Field, Type};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Runs `test` against a fresh page file path, removing it afterwards.
pub fn with_page_file<P, F, U>(file_name: P, test: F) -> Result<U, Box<dyn Error>>
where
    F: FnOnce(&Path) -> Result<U, Box<dyn Error>>,
    P: AsRef<Path>,
{
    let dir = TempDir::new()?;
    let file_path = dir.path().join(file_name.as_ref());

    let res = test(&file_path);
    dir.close()?;

    res
}

#[allow(dead_code)]
pub fn int_schema(names: &[&str]) -> Arc<TupleDesc> {
    let types = vec![Type::Int; names.len()];
    Arc::new(TupleDesc::with_names(&types, names).unwrap())
}

#[allow(dead_code)]
pub fn int_tuple(schema: &Arc<TupleDesc>, values: &[i32]) -> Tuple {
    let fields = values.iter().map(|&v| Field::Int(v)).collect();
    Tuple::with_fields(schema.clone(), fields).unwrap()
}

#[allow(dead_code)]
pub fn int_values(tuple: &Tuple) -> Vec<i32> {
    tuple.fields().map(|f| f.as_int().unwrap()).collect()
}
