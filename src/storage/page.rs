use crate::catalog::TableId;
use crate::error::{DbError, Result};
use crate::storage::tuple::{RecordId, Tuple, TupleDesc};
use crate::transaction::TransactionId;
use std::sync::Arc;

/**!
 *! Heap page format (size in bytes):
 *!  ------------------------------------------------------------------------
 *!  | header (ceil(slots/8)) | slot 0 | slot 1 | ... | slot n-1 | padding |
 *!  ------------------------------------------------------------------------
 *!
 *!  Bit i of the header (byte i/8, least significant bit first) is set when
 *!  slot i holds a tuple. Every slot is exactly one tuple wide, its fields
 *!  serialized in schema order. Empty slots and the padding are all zeros.
 *!
 *!  The number of slots is floor(page_bits / (tuple_bits + 1)), each slot
 *!  costing its tuple's bits plus one header bit.
 */

/// Returns how many tuples of `tuple_size` bytes fit in a page along with their header bits.
pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Returns the number of header bytes needed to track `num_slots` slots.
pub fn header_size(num_slots: usize) -> usize {
    (num_slots + 7) / 8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: usize) -> Self {
        PageId { table_id, page_no }
    }
}

#[derive(Debug)]
pub struct HeapPage {
    id: PageId,
    schema: Arc<TupleDesc>,
    page_size: usize,
    /// Occupancy bitmap, one bit per slot.
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    /// The transaction that last dirtied this page.
    dirtier: Option<TransactionId>,
    /// Page contents as of the last time the snapshot was taken.
    before_image: Vec<u8>,
}

pub struct PageIterator<'a> {
    page: &'a HeapPage,
    curr_slot: usize,
}

impl<'a> Iterator for PageIterator<'a> {
    type Item = &'a Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr_slot < self.page.slots.len() {
            let slot = self.curr_slot;
            self.curr_slot += 1;

            if let Some(tuple) = self.page.tuple(slot) {
                return Some(tuple);
            }
        }
        None
    }
}

impl HeapPage {
    /// Creates a page with every slot empty.
    pub fn new(id: PageId, schema: Arc<TupleDesc>, page_size: usize) -> Self {
        let num_slots = slots_per_page(page_size, schema.size());
        HeapPage {
            id,
            schema,
            page_size,
            header: vec![0; header_size(num_slots)],
            slots: vec![None; num_slots],
            dirtier: None,
            before_image: HeapPage::empty_page_data(page_size),
        }
    }

    /// Parses a page from its on-disk bytes. The bytes also become the page's before image.
    pub fn from_bytes(
        id: PageId,
        schema: Arc<TupleDesc>,
        page_size: usize,
        bytes: &[u8],
    ) -> Result<Self> {
        if bytes.len() != page_size {
            return Err(DbError::Parse(format!(
                "Invalid page in bytes: bytes size is {}bytes while page size is {}bytes",
                bytes.len(),
                page_size
            )));
        }

        let tuple_size = schema.size();
        let num_slots = slots_per_page(page_size, tuple_size);
        let header_len = header_size(num_slots);

        let mut page = HeapPage {
            id,
            schema: schema.clone(),
            page_size,
            header: bytes[..header_len].to_vec(),
            slots: vec![None; num_slots],
            dirtier: None,
            before_image: bytes.to_vec(),
        };

        let mut reader = &bytes[header_len..];
        for slot in 0..num_slots {
            if !page.is_slot_used(slot) {
                // Skip over the empty slot.
                reader = &reader[tuple_size..];
                continue;
            }

            let mut tuple = Tuple::new(schema.clone());
            for (i, ty) in schema.types().enumerate() {
                tuple.set_field(i, ty.parse(&mut reader)?)?;
            }
            tuple.set_record_id(Some(RecordId::new(id, slot)));
            page.slots[slot] = Some(tuple);
        }

        Ok(page)
    }

    /// Returns the bytes of an empty page. Parsing them yields a page without tuples.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0; page_size]
    }

    /// Serializes the page. `from_bytes` on the result yields an identical page.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![0; self.page_size];
        let header_len = self.header.len();
        bytes[..header_len].copy_from_slice(&self.header);

        let tuple_size = self.schema.size();
        for slot in 0..self.slots.len() {
            if let Some(tuple) = self.tuple(slot) {
                let begin = header_len + slot * tuple_size;
                let mut writer = &mut bytes[begin..begin + tuple_size];
                for (ty, field) in self.schema.types().zip(tuple.fields()) {
                    field.serialize(ty, &mut writer)?;
                }
            }
        }

        Ok(bytes)
    }

    /// Returns the id of this page
    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn schema(&self) -> &Arc<TupleDesc> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    /// Inserts a tuple into the lowest numbered free slot and tags it with its new location.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId> {
        let slot = match (0..self.slots.len()).find(|&slot| !self.is_slot_used(slot)) {
            Some(slot) => slot,
            None => return Err(DbError::PageFull(self.id)),
        };

        if **tuple.schema() != *self.schema {
            return Err(DbError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }

        let record_id = RecordId::new(self.id, slot);
        tuple.set_record_id(Some(record_id));
        self.slots[slot] = Some(tuple);
        self.mark_slot_used(slot, true);

        Ok(record_id)
    }

    /// Removes the tuple from its slot and clears its location.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        match tuple.record_id() {
            Some(rid) if rid.page_id == self.id && self.is_slot_used(rid.slot_index) => {
                self.mark_slot_used(rid.slot_index, false);
                self.slots[rid.slot_index] = None;
                tuple.set_record_id(None);
                Ok(())
            }
            rid => Err(DbError::TupleNotOnPage(rid)),
        }
    }

    /// Returns the tuple stored in the slot, if any.
    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        if !self.is_slot_used(slot) {
            return None;
        }
        self.slots[slot].as_ref()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.slots.len() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.slots.len())
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let bit = 1 << (slot % 8);
        if used {
            self.header[slot / 8] |= bit;
        } else {
            self.header[slot / 8] &= !bit;
        }
    }

    /// Records (or clears) the transaction that dirtied the page. The last writer wins.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtier = if dirty { Some(tid) } else { None };
    }

    /// Returns the transaction that dirtied this page, or `None` if the page is clean.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Reconstructs the page as it was when the before image was last taken.
    pub fn before_image(&self) -> Result<HeapPage> {
        HeapPage::from_bytes(
            self.id,
            self.schema.clone(),
            self.page_size,
            &self.before_image,
        )
    }

    pub fn before_image_data(&self) -> &[u8] {
        &self.before_image
    }

    /// Takes a snapshot of the current contents as the new before image.
    pub fn set_before_image(&mut self) -> Result<()> {
        self.before_image = self.to_bytes()?;
        Ok(())
    }

    /// Iterate through all tuples in the page, in slot order.
    pub fn iter(&self) -> PageIterator {
        PageIterator {
            page: self,
            curr_slot: 0,
        }
    }
}
