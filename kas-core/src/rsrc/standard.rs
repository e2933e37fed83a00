//! Classic resource fork layout. All integers big-endian.
//!
//! ```text
//! 0     header: data_offset u32 (256), map_offset u32, data_len u32, map_len u32
//! 16    zero padding to 256
//! 256   data: per resource, length u32 + bytes
//! map   header copy (16), reserved (6), attributes u16, type_list_offset u16 (28),
//!       name_list_offset u16
//! +28   type list: count-1 u16, then per type code[4], count-1 u16, list offset u16
//!       resource lists: per resource id s16, name offset u16, attributes u8,
//!       data offset u24, reserved u32, reserved (8)
//!       name list: per named resource length u8 + bytes
//! ```
//!
//! Resource list offsets are relative to the type list, data offsets to the
//! data section and name offsets to the name list.

use crate::buffer::{BinaryBuffer, ByteOrder};
use crate::error::CompileError;

use super::{ContainerFile, fit, type_code_bytes};

pub const DATA_OFFSET: usize = 256;
pub const MAP_PREAMBLE: usize = 28;
pub const TYPE_ENTRY: usize = 8;
pub const RESOURCE_ENTRY: usize = 20;

const UNNAMED: u16 = 0xFFFF;

pub fn encode(file: &ContainerFile) -> Result<Vec<u8>, CompileError> {
    let mut out = BinaryBuffer::new(ByteOrder::Big);
    out.pad_to(DATA_OFFSET);

    // Data section.
    let mut data_offsets = Vec::with_capacity(file.resource_count());
    for (_, resource) in file.resources() {
        data_offsets.push(out.size() - DATA_OFFSET);
        out.write_u32(fit(resource.data.len() as u128, "resource data length")?);
        out.write_raw(&resource.data)?;
    }
    let data_len = out.size() - DATA_OFFSET;
    let map_offset = out.size();

    // Name list, laid out up front so entries can point into it.
    let mut names = BinaryBuffer::new(ByteOrder::Big);
    let mut name_offsets = Vec::with_capacity(file.resource_count());
    for (_, resource) in file.resources() {
        if resource.name.is_empty() {
            name_offsets.push(UNNAMED);
        } else {
            name_offsets.push(fit(names.size() as u128, "name list offset")?);
            names.write_pstr(&resource.name);
        }
    }

    let type_count = file.types().len();
    let type_list_len = 2 + TYPE_ENTRY * type_count + RESOURCE_ENTRY * file.resource_count();
    let name_list_offset = MAP_PREAMBLE + type_list_len;
    let map_len = name_list_offset + names.size();

    let header = Header {
        map_offset: fit(map_offset as u128, "map offset")?,
        data_len: fit(data_len as u128, "data length")?,
        map_len: fit(map_len as u128, "map length")?,
    };
    header.write_at(&mut out, 0);

    // Map preamble.
    header.write_at(&mut out, map_offset);
    out.pad_to(map_offset + 16 + 6);
    out.write_u16(0);
    out.write_u16(MAP_PREAMBLE as u16);
    out.write_u16(fit(name_list_offset as u128, "name list offset")?);

    // Type list.
    let type_count_field: u16 = fit(type_count as u128, "type count")?;
    out.write_u16(type_count_field.wrapping_sub(1));
    let mut preceding = 0usize;
    for container in file.types() {
        out.write_raw(&type_code_bytes(&container.code)?)?;
        let count: u16 = fit(container.resources.len() as u128, "resource count")?;
        out.write_u16(count.wrapping_sub(1));
        let list_offset = 2 + TYPE_ENTRY * type_count + RESOURCE_ENTRY * preceding;
        out.write_u16(fit(list_offset as u128, "resource list offset")?);
        preceding += container.resources.len();
    }

    // Resource lists.
    for (index, (_, resource)) in file.resources().enumerate() {
        let id: i16 = i16::try_from(resource.id).map_err(|_| {
            CompileError::layout(format!("resource id {} does not fit a 16-bit id", resource.id))
        })?;
        out.write_i16(id);
        out.write_u16(name_offsets[index]);
        out.write_u8(0);
        let data_offset = data_offsets[index];
        if data_offset > 0x00FF_FFFF {
            return Err(CompileError::layout(format!(
                "data offset {data_offset} does not fit 24 bits"
            )));
        }
        out.write_u24(data_offset as u32);
        out.write_u32(0);
        out.write_u64(0);
    }

    out.write_raw(names.bytes())?;
    Ok(out.into_bytes())
}

struct Header {
    map_offset: u32,
    data_len: u32,
    map_len: u32,
}

impl Header {
    fn write_at(&self, out: &mut BinaryBuffer, at: usize) {
        out.seek(at);
        out.write_u32(DATA_OFFSET as u32);
        out.write_u32(self.map_offset);
        out.write_u32(self.data_len);
        out.write_u32(self.map_len);
    }
}
