use crate::error::{DbError, Result};
use crate::storage::page::PageId;
use crate::storage::types::{Field, Type};
use std::fmt;
use std::sync::Arc;

/// The location of a tuple resident on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_index: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_index: usize) -> Self {
        RecordId {
            page_id,
            slot_index,
        }
    }
}

/// A single column of a schema.
#[derive(Debug, Clone)]
pub struct TdItem {
    pub field_type: Type,
    pub name: Option<String>,
}

/// The schema of a tuple: an ordered, non-empty list of typed and optionally named fields.
///
/// Two schemas are equal when they have the same field types in the same order,
/// field names are not compared.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    pub fn new(items: Vec<TdItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(DbError::InvalidArgument(
                "a schema must have at least one field".to_string(),
            ));
        }
        Ok(TupleDesc { items })
    }

    /// Creates a schema with anonymous fields.
    pub fn from_types(types: &[Type]) -> Result<Self> {
        TupleDesc::new(
            types
                .iter()
                .map(|&field_type| TdItem {
                    field_type,
                    name: None,
                })
                .collect(),
        )
    }

    /// Creates a schema with named fields, `types` and `names` must be of the same length.
    pub fn with_names(types: &[Type], names: &[&str]) -> Result<Self> {
        if types.len() != names.len() {
            return Err(DbError::InvalidArgument(format!(
                "{} types were given for {} names",
                types.len(),
                names.len()
            )));
        }
        TupleDesc::new(
            types
                .iter()
                .zip(names)
                .map(|(&field_type, name)| TdItem {
                    field_type,
                    name: Some(name.to_string()),
                })
                .collect(),
        )
    }

    /// Concatenates two schemas, the fields of `first` come first.
    pub fn merge(first: &TupleDesc, second: &TupleDesc) -> TupleDesc {
        TupleDesc {
            items: first.items.iter().chain(&second.items).cloned().collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> Result<Type> {
        self.items
            .get(i)
            .map(|item| item.field_type)
            .ok_or_else(|| self.out_of_range(i))
    }

    pub fn field_name(&self, i: usize) -> Result<Option<&str>> {
        self.items
            .get(i)
            .map(|item| item.name.as_deref())
            .ok_or_else(|| self.out_of_range(i))
    }

    /// Returns the index of the first field with the given name.
    pub fn field_name_to_index(&self, name: &str) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.name.as_deref() == Some(name))
            .ok_or_else(|| DbError::NoSuchField(name.to_string()))
    }

    /// Returns the size in bytes of a tuple with this schema.
    pub fn size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.len()).sum()
    }

    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.items.iter().map(|item| item.field_type)
    }

    pub fn items(&self) -> &[TdItem] {
        &self.items
    }

    fn out_of_range(&self, i: usize) -> DbError {
        DbError::NoSuchField(format!(
            "index {} is out of range for {} fields",
            i,
            self.items.len()
        ))
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len() && self.types().eq(other.types())
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}({})",
                item.field_type,
                item.name.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}

/// A row of field values bound to a schema.
///
/// The record id is set while the tuple is stored on a page and cleared once it is deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple whose fields hold their type's default value.
    pub fn new(schema: Arc<TupleDesc>) -> Self {
        let fields = schema.types().map(|ty| ty.default_field()).collect();
        Tuple {
            schema,
            fields,
            record_id: None,
        }
    }

    /// Creates a tuple from the given values, which must match the schema.
    pub fn with_fields(schema: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != schema.num_fields() {
            return Err(DbError::InvalidArgument(format!(
                "{} fields were given for a schema of {} fields",
                fields.len(),
                schema.num_fields()
            )));
        }
        for (ty, field) in schema.types().zip(&fields) {
            ty.check(field)?;
        }
        Ok(Tuple {
            schema,
            fields,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &Arc<TupleDesc> {
        &self.schema
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn set_field(&mut self, i: usize, field: Field) -> Result<()> {
        self.schema.field_type(i)?.check(&field)?;
        self.fields[i] = field;
        Ok(())
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
