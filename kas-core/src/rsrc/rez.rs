//! Rez container: a little-endian index followed by the raw resource data
//! and a big-endian resource map.
//!
//! ```text
//! 0     "BRGR", version u32 (1), header_length u32
//! 12    per resource then once for the map: offset u32, length u32, reserved u32
//!       "resource.map\0"
//!       resource data, back to back
//! map   8 u32, type_count u32
//!       per type: code[4], offset u32 (from map start), count u32
//!       per resource: index u32 (1-based), code[4], id s16, name[256]
//! ```

use crate::buffer::{BinaryBuffer, ByteOrder};
use crate::charset;
use crate::error::CompileError;

use super::{ContainerFile, fit, type_code_bytes};

pub const SIGNATURE: &[u8; 4] = b"BRGR";
pub const VERSION: u32 = 1;
pub const MAP_NAME: &str = "resource.map";
pub const TYPE_ENTRY: usize = 12;
pub const RESOURCE_ENTRY: usize = 266;
const NAME_FIELD: usize = 256;

pub fn encode(file: &ContainerFile) -> Result<Vec<u8>, CompileError> {
    let count = file.resource_count();
    let header_len = 12 + 12 * (count + 1) + MAP_NAME.len() + 1;

    let mut out = BinaryBuffer::new(ByteOrder::Little);
    out.write_raw(SIGNATURE)?;
    out.write_u32(VERSION);
    out.write_u32(fit(header_len as u128, "header length")?);

    let mut offset = header_len;
    for (_, resource) in file.resources() {
        out.write_u32(fit(offset as u128, "resource offset")?);
        out.write_u32(fit(resource.data.len() as u128, "resource length")?);
        out.write_u32(0);
        offset += resource.data.len();
    }
    let type_count = file.types().len();
    let map_len = 8 + TYPE_ENTRY * type_count + RESOURCE_ENTRY * count;
    out.write_u32(fit(offset as u128, "map offset")?);
    out.write_u32(fit(map_len as u128, "map length")?);
    out.write_u32(0);
    out.write_cstr(MAP_NAME, 0);

    for (_, resource) in file.resources() {
        out.write_raw(&resource.data)?;
    }

    out.set_byte_order(ByteOrder::Big);
    out.write_u32(8);
    out.write_u32(fit(type_count as u128, "type count")?);
    let mut preceding = 0usize;
    for container in file.types() {
        out.write_raw(&type_code_bytes(&container.code)?)?;
        let entries = 8 + TYPE_ENTRY * type_count + RESOURCE_ENTRY * preceding;
        out.write_u32(fit(entries as u128, "type list offset")?);
        out.write_u32(fit(container.resources.len() as u128, "resource count")?);
        preceding += container.resources.len();
    }

    for (index, (code, resource)) in file.resources().enumerate() {
        out.write_u32(fit((index + 1) as u128, "resource index")?);
        out.write_raw(&type_code_bytes(code)?)?;
        let id = i16::try_from(resource.id).map_err(|_| {
            CompileError::layout(format!("resource id {} does not fit a 16-bit id", resource.id))
        })?;
        out.write_i16(id);
        let mut name = charset::encode(&resource.name);
        name.truncate(NAME_FIELD - 1);
        name.resize(NAME_FIELD, 0);
        out.write_raw(&name)?;
    }

    Ok(out.into_bytes())
}
