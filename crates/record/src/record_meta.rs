//! Stable field layout: value offsets and nullity-bitmap bit positions
//! computed once from a field list, then reused for every row of that
//! shape.

use crate::field_info::FieldInfo;
use types::FieldType;

fn align_up(v: usize, align: usize) -> usize {
    (v + align - 1) / align * align
}

#[derive(Debug, Clone)]
pub struct RecordMeta {
    fields: Vec<FieldInfo>,
    value_offsets: Vec<usize>,
    nullity_bits: Vec<Option<usize>>,
    nullity_bitmap_bytes: usize,
    record_size: usize,
}

impl RecordMeta {
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        let mut nullity_bits = Vec::with_capacity(fields.len());
        let mut nullable_count = 0usize;
        for f in &fields {
            if f.nullable {
                nullity_bits.push(Some(nullable_count));
                nullable_count += 1;
            } else {
                nullity_bits.push(None);
            }
        }
        let nullity_bitmap_bytes = nullable_count.div_ceil(8);
        let mut offset = nullity_bitmap_bytes;
        let mut value_offsets = Vec::with_capacity(fields.len());
        let mut max_align = 1;
        for f in &fields {
            let align = f.ty.runtime_alignment();
            max_align = max_align.max(align);
            offset = align_up(offset, align);
            value_offsets.push(offset);
            offset += f.ty.runtime_size();
        }
        let record_size = align_up(offset, max_align);
        Self {
            fields,
            value_offsets,
            nullity_bits,
            nullity_bitmap_bytes,
            record_size,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, field: usize) -> &FieldType {
        &self.fields[field].ty
    }

    pub fn nullable(&self, field: usize) -> bool {
        self.fields[field].nullable
    }

    pub fn value_offset(&self, field: usize) -> usize {
        self.value_offsets[field]
    }

    /// Bit position within the leading nullity bitmap, if this field is
    /// nullable.
    pub fn nullity_bit(&self, field: usize) -> Option<usize> {
        self.nullity_bits[field]
    }

    pub fn nullity_bitmap_bytes(&self) -> usize {
        self.nullity_bitmap_bytes
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }
}
