use std::fs::{File, OpenOptions};
use std::io::{Error as IOError, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Back pages with underlying storage using a single file on disk.
/// Page `n` lives at byte offset `n * page_size`.
pub struct DiskManager {
    page_file: File,
    page_size: usize,
}

impl DiskManager {
    pub fn new<P: AsRef<Path>>(page_file_path: P, page_size: usize) -> Result<Self, IOError> {
        let path = page_file_path.as_ref();
        if path.exists() && !path.is_file() {
            return Err(IOError::new(
                ErrorKind::Other,
                format!("page file {:?} is not a regular file", path),
            ));
        }

        let page_file_size_bytes = if path.exists() {
            path.metadata()?.len()
        } else {
            0
        };

        if page_file_size_bytes == 0 {
            log::trace!("Creating new page file {:?}", path);
        } else {
            log::trace!(
                "Page file found {:?} ({} bytes) containing {} pages",
                path,
                page_file_size_bytes,
                page_file_size_bytes / page_size as u64
            );
        }

        let page_file = OpenOptions::new()
            .write(true)
            .create(true)
            .read(true)
            .open(path)?;

        Ok(DiskManager {
            page_file,
            page_size,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of whole pages in the file. A trailing partial page is ignored.
    pub fn num_pages(&self) -> Result<usize, IOError> {
        let len = self.page_file.metadata()?.len();
        Ok((len / self.page_size as u64) as usize)
    }

    /// Overwrites the page-sized region of page `page_no` in place.
    pub fn write_page(&mut self, page_no: usize, page: &[u8]) -> Result<(), IOError> {
        if page.len() != self.page_size {
            return Err(IOError::new(
                ErrorKind::InvalidInput,
                format!(
                    "invalid page of {} bytes, page size is {} bytes",
                    page.len(),
                    self.page_size
                ),
            ));
        }

        let offset = (page_no * self.page_size) as u64;
        log::trace!("writing page {} at offset {}", page_no, offset);

        self.page_file.seek(SeekFrom::Start(offset))?;
        self.page_file.write_all(page)?;
        self.page_file.flush()?;

        Ok(())
    }

    /// Writes the page past the current end of the file and returns its page number.
    pub fn append_page(&mut self, page: &[u8]) -> Result<usize, IOError> {
        let page_no = self.num_pages()?;
        log::trace!("appending page {}", page_no);
        self.write_page(page_no, page)?;
        Ok(page_no)
    }

    /// Cuts page `page_no` off the file if it is still the last page.
    /// Returns whether the file was shortened.
    pub fn truncate_last_page(&mut self, page_no: usize) -> Result<bool, IOError> {
        if self.num_pages()? != page_no + 1 {
            return Ok(false);
        }
        log::trace!("truncating page {}", page_no);
        self.page_file.set_len((page_no * self.page_size) as u64)?;
        Ok(true)
    }

    pub fn read_page(&mut self, page_no: usize) -> Result<Vec<u8>, IOError> {
        let offset = (page_no * self.page_size) as u64;
        log::trace!("reading page {} at offset {}", page_no, offset);

        let mut page_buffer = vec![0; self.page_size];

        // Seek to the page's offset
        self.page_file.seek(SeekFrom::Start(offset))?;

        // Read the next page.
        match self.page_file.read_exact(&mut page_buffer[..]) {
            Ok(()) => Ok(page_buffer),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(IOError::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "page {} at offset {} lies past the end of the page file",
                    page_no, offset
                ),
            )),
            Err(e) => Err(e),
        }
    }
}
