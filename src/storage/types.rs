use crate::error::{DbError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};

/// The maximum string length used by `Type::string()`.
pub const DEFAULT_STRING_LEN: usize = 30;

/// Size in bytes of an integer field and of a string's length prefix.
const INT_SIZE: usize = 4;

/// The type of a tuple field. Every type has a fixed serialized size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 32bit signed integer, big endian on disk.
    Int,
    /// String of at most the given number of bytes.
    Str(usize),
}

impl Type {
    pub fn string() -> Type {
        Type::Str(DEFAULT_STRING_LEN)
    }

    /// Returns the number of bytes a field of this type takes up on disk.
    pub fn len(&self) -> usize {
        match self {
            Type::Int => INT_SIZE,
            // Length prefix followed by the padded string bytes.
            Type::Str(max_len) => INT_SIZE + max_len,
        }
    }

    /// The value a field of this type holds when a tuple is created from its schema alone.
    pub fn default_field(&self) -> Field {
        match self {
            Type::Int => Field::Int(0),
            Type::Str(_) => Field::Str(String::new()),
        }
    }

    /// Reads a field of this type from the reader.
    pub fn parse<R: Read>(&self, reader: &mut R) -> Result<Field> {
        match *self {
            Type::Int => Ok(Field::Int(reader.read_i32::<BigEndian>()?)),
            Type::Str(max_len) => {
                let len = reader.read_u32::<BigEndian>()? as usize;
                if len > max_len {
                    return Err(DbError::Parse(format!(
                        "string of {} bytes exceeds its declared length of {} bytes",
                        len, max_len
                    )));
                }

                let mut bytes = vec![0; max_len];
                reader.read_exact(&mut bytes[..])?;
                bytes.truncate(len);
                String::from_utf8(bytes)
                    .map(Field::Str)
                    .map_err(|e| DbError::Parse(format!("invalid string field: {}", e)))
            }
        }
    }

    /// Checks that the field can be stored as this type.
    pub fn check(&self, field: &Field) -> Result<()> {
        match (self, field) {
            (Type::Int, Field::Int(_)) => Ok(()),
            (Type::Str(max_len), Field::Str(s)) if s.len() <= *max_len => Ok(()),
            (Type::Str(max_len), Field::Str(s)) => Err(DbError::InvalidArgument(format!(
                "string of {} bytes exceeds the maximum of {} bytes",
                s.len(),
                max_len
            ))),
            (ty, field) => Err(DbError::InvalidArgument(format!(
                "field {:?} is not of type {}",
                field, ty
            ))),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Int => write!(f, "INT"),
            Type::Str(max_len) => write!(f, "STRING({})", max_len),
        }
    }
}

/// Comparison applied by predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    /// Substring containment for strings, equality for integers.
    Like,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = match self {
            CmpOp::Equals => "=",
            CmpOp::NotEquals => "<>",
            CmpOp::LessThan => "<",
            CmpOp::LessThanOrEq => "<=",
            CmpOp::GreaterThan => ">",
            CmpOp::GreaterThanOrEq => ">=",
            CmpOp::Like => "LIKE",
        };
        write!(f, "{}", op)
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Int(_) => None,
            Field::Str(s) => Some(s.as_str()),
        }
    }

    /// Writes the field as the given type.
    pub fn serialize<W: Write>(&self, ty: Type, writer: &mut W) -> Result<()> {
        ty.check(self)?;
        match (self, ty) {
            (Field::Int(v), _) => writer.write_i32::<BigEndian>(*v)?,
            (Field::Str(s), Type::Str(max_len)) => {
                writer.write_u32::<BigEndian>(s.len() as u32)?;
                writer.write_all(s.as_bytes())?;
                let padding = vec![0; max_len - s.len()];
                writer.write_all(&padding[..])?;
            }
            (Field::Str(_), Type::Int) => {
                return Err(DbError::InvalidArgument(
                    "a string cannot be written as an integer".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Compares this field against `operand`. Fields of different kinds never match.
    pub fn compare(&self, op: CmpOp, operand: &Field) -> bool {
        let ordering = match (self, operand) {
            (Field::Int(a), Field::Int(b)) => a.cmp(b),
            (Field::Str(a), Field::Str(b)) => {
                if op == CmpOp::Like {
                    return a.contains(b.as_str());
                }
                a.cmp(b)
            }
            _ => return false,
        };

        match op {
            CmpOp::Equals | CmpOp::Like => ordering == Ordering::Equal,
            CmpOp::NotEquals => ordering != Ordering::Equal,
            CmpOp::LessThan => ordering == Ordering::Less,
            CmpOp::LessThanOrEq => ordering != Ordering::Greater,
            CmpOp::GreaterThan => ordering == Ordering::Greater,
            CmpOp::GreaterThanOrEq => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}
