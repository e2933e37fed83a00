//! 64-bit variant of the classic layout. All integers big-endian.
//!
//! ```text
//! 0     header: magic u64 (1), data_offset u64 (256), map_offset u64,
//!       data_len u64, map_len u64
//! 40    zero padding to 256
//! 256   data: per resource, length u64 + bytes
//! map   header copy (40), reserved (6), attributes u16,
//!       type_list_offset u64 (64), name_list_offset u64
//! +64   type list: count-1 u64, then per type code[4], count-1 u64, list offset u64
//!       resource lists: per resource id s64, name offset u64, attributes u8,
//!       data offset u64, reserved u32
//!       name list: per named resource length u8 + bytes
//! ```

use crate::buffer::{BinaryBuffer, ByteOrder};
use crate::error::CompileError;

use super::{ContainerFile, type_code_bytes};

pub const MAGIC: u64 = 1;
pub const DATA_OFFSET: usize = 256;
pub const HEADER_LEN: usize = 40;
pub const MAP_PREAMBLE: usize = 64;
pub const TYPE_ENTRY: usize = 20;
pub const RESOURCE_ENTRY: usize = 29;

const UNNAMED: u64 = u64::MAX;

pub fn encode(file: &ContainerFile) -> Result<Vec<u8>, CompileError> {
    let mut out = BinaryBuffer::new(ByteOrder::Big);
    out.pad_to(DATA_OFFSET);

    let mut data_offsets = Vec::with_capacity(file.resource_count());
    for (_, resource) in file.resources() {
        data_offsets.push((out.size() - DATA_OFFSET) as u64);
        out.write_u64(resource.data.len() as u64);
        out.write_raw(&resource.data)?;
    }
    let data_len = out.size() - DATA_OFFSET;
    let map_offset = out.size();

    let mut names = BinaryBuffer::new(ByteOrder::Big);
    let mut name_offsets = Vec::with_capacity(file.resource_count());
    for (_, resource) in file.resources() {
        if resource.name.is_empty() {
            name_offsets.push(UNNAMED);
        } else {
            name_offsets.push(names.size() as u64);
            names.write_pstr(&resource.name);
        }
    }

    let type_count = file.types().len();
    let type_list_len = 8 + TYPE_ENTRY * type_count + RESOURCE_ENTRY * file.resource_count();
    let name_list_offset = MAP_PREAMBLE + type_list_len;
    let map_len = name_list_offset + names.size();

    let header = Header {
        map_offset: map_offset as u64,
        data_len: data_len as u64,
        map_len: map_len as u64,
    };
    header.write_at(&mut out, 0);

    header.write_at(&mut out, map_offset);
    out.pad_to(map_offset + HEADER_LEN + 6);
    out.write_u16(0);
    out.write_u64(MAP_PREAMBLE as u64);
    out.write_u64(name_list_offset as u64);

    out.write_u64((type_count as u64).wrapping_sub(1));
    let mut preceding = 0usize;
    for container in file.types() {
        out.write_raw(&type_code_bytes(&container.code)?)?;
        out.write_u64((container.resources.len() as u64).wrapping_sub(1));
        let list_offset = 8 + TYPE_ENTRY * type_count + RESOURCE_ENTRY * preceding;
        out.write_u64(list_offset as u64);
        preceding += container.resources.len();
    }

    for (index, (_, resource)) in file.resources().enumerate() {
        out.write_i64(resource.id);
        out.write_u64(name_offsets[index]);
        out.write_u8(0);
        out.write_u64(data_offsets[index]);
        out.write_u32(0);
    }

    out.write_raw(names.bytes())?;
    Ok(out.into_bytes())
}

struct Header {
    map_offset: u64,
    data_len: u64,
    map_len: u64,
}

impl Header {
    fn write_at(&self, out: &mut BinaryBuffer, at: usize) {
        out.seek(at);
        out.write_u64(MAGIC);
        out.write_u64(DATA_OFFSET as u64);
        out.write_u64(self.map_offset);
        out.write_u64(self.data_len);
        out.write_u64(self.map_len);
    }
}
