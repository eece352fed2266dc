use crate::catalog::TableId;
use crate::storage::page::PageId;
use crate::storage::tuple::RecordId;
use crate::transaction::TransactionId;
use std::error::Error;
use std::io::Error as IOError;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// Malformed page bytes or field encoding.
    Parse(String),
    /// No empty slot left on the page.
    PageFull(PageId),
    SchemaMismatch { expected: String, actual: String },
    /// The tuple is not stored on the page it was handed to, or its slot is already free.
    TupleNotOnPage(Option<RecordId>),
    /// The tuple carries no record id so it cannot be located.
    MissingRecordId,
    PageOutOfRange { page_id: PageId, num_pages: usize },
    NoSuchTable(TableId),
    NoSuchField(String),
    InvalidArgument(String),
    /// The iterator was used outside of its open state.
    IllegalState(&'static str),
    /// The iterator has been advanced past its last tuple.
    NoSuchElement,
    /// The page is held under a conflicting permission by another transaction.
    LockConflict { page_id: PageId, tid: TransactionId },
    /// Every cached page is dirty so none can be evicted.
    NoSpaceInPool,
    Overflow(String),
    IOError(IOError),
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IOError(error) => Some(error),
            _ => None,
        }
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::PageFull(page_id) => write!(f, "page {:?} is full", page_id),
            Self::SchemaMismatch { expected, actual } => write!(
                f,
                "schema mismatch: expected [{}] but got [{}]",
                expected, actual
            ),
            Self::TupleNotOnPage(Some(rid)) => write!(
                f,
                "tuple {:?} is not on this page or is already deleted",
                rid
            ),
            Self::TupleNotOnPage(None) => write!(f, "tuple is not on this page"),
            Self::MissingRecordId => write!(f, "tuple has no record id"),
            Self::PageOutOfRange { page_id, num_pages } => write!(
                f,
                "page {:?} is out of range, file has {} pages",
                page_id, num_pages
            ),
            Self::NoSuchTable(table_id) => write!(f, "table {:?} does not exist", table_id),
            Self::NoSuchField(name) => write!(f, "no field named {:?}", name),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::IllegalState(msg) => write!(f, "illegal state: {}", msg),
            Self::NoSuchElement => write!(f, "no more tuples"),
            Self::LockConflict { page_id, tid } => write!(
                f,
                "transaction {:?} cannot acquire page {:?}: held by another transaction",
                tid, page_id
            ),
            Self::NoSpaceInPool => write!(f, "buffer pool is full of dirty pages"),
            Self::Overflow(msg) => write!(f, "overflow: {}", msg),
            Self::IOError(error) => write!(f, "{}", error),
        }
    }
}

impl From<IOError> for DbError {
    fn from(error: IOError) -> Self {
        Self::IOError(error)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use std::error::Error;
    use std::io;

    #[test]
    fn io_error_is_source() {
        let error: DbError = io::Error::new(io::ErrorKind::UnexpectedEof, "short read").into();
        assert_eq!(error.to_string(), "short read");
        assert!(error.source().is_some());
        assert!(DbError::NoSuchElement.source().is_none());
    }
}
