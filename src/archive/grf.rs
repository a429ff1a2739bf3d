//! GRF 0x200 container reader.
//!
//! # Layout
//! ```text
//! header (46 bytes)
//!     signature   [u8; 16]  "Master of Magic\0"
//!     key         [u8; 14]
//!     table_off   u32       relative to the end of the header
//!     seed        u32
//!     raw_count   u32       entries = raw_count - seed - 7
//!     version     u32       0x200
//! file table (at 46 + table_off)
//!     packed_len  u32
//!     real_len    u32
//!     zlib(entries)
//! entry
//!     name        NUL-terminated, EUC-KR
//!     packed_len  u32
//!     aligned_len u32
//!     real_len    u32
//!     flags       u8        0x01 file, 0x02 mixed crypt, 0x04 header crypt
//!     offset      u32       relative to the end of the header
//! ```

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use encoding_rs::EUC_KR;
use flate2::read::ZlibDecoder;

use super::ArchiveError;

const SIGNATURE: &[u8] = b"Master of Magic";
const HEADER_LEN: u64 = 46;
const VERSION_200: u32 = 0x200;

const FLAG_FILE: u8 = 0x01;
const FLAG_MIXED_CRYPT: u8 = 0x02;
const FLAG_HEADER_CRYPT: u8 = 0x04;

/// Upper bound for a single inflated entry or table.
const MAX_INFLATED: u32 = 512 * 1024 * 1024;

/// Location of one entry inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrfEntry {
    pub packed_len: u32,
    pub aligned_len: u32,
    pub real_len: u32,
    pub flags: u8,
    pub offset: u32,
}

impl GrfEntry {
    pub fn is_file(&self) -> bool {
        self.flags & FLAG_FILE != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & (FLAG_MIXED_CRYPT | FLAG_HEADER_CRYPT) != 0
    }
}

/// Parsed entry table of a container.
#[derive(Debug, Default, Clone)]
pub struct GrfTable {
    entries: HashMap<String, GrfEntry>,
}

impl GrfTable {
    /// Find an entry by name. Separators and ASCII case are ignored.
    pub fn get(&self, name: &str) -> Option<&GrfEntry> {
        self.entries.get(&entry_key(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lookup key form of an entry name.
pub fn entry_key(name: &str) -> String {
    name.replace('/', "\\").to_ascii_lowercase()
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32, ArchiveError> {
    buf.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ArchiveError::Corrupt("truncated field"))
}

/// Read the header and entry table.
pub fn read_table<R: Read + Seek>(reader: &mut R) -> Result<GrfTable, ArchiveError> {
    let mut header = [0u8; HEADER_LEN as usize];
    reader.seek(SeekFrom::Start(0))?;
    reader.read_exact(&mut header)?;

    if !header.starts_with(SIGNATURE) {
        return Err(ArchiveError::BadSignature);
    }
    let table_offset = read_u32(&header, 30)?;
    let seed = read_u32(&header, 34)?;
    let raw_count = read_u32(&header, 38)?;
    let version = read_u32(&header, 42)?;
    if version != VERSION_200 {
        return Err(ArchiveError::UnsupportedVersion(version));
    }
    let count = raw_count
        .checked_sub(seed)
        .and_then(|n| n.checked_sub(7))
        .ok_or(ArchiveError::Corrupt("negative entry count"))?;

    reader.seek(SeekFrom::Start(HEADER_LEN + u64::from(table_offset)))?;
    let mut sizes = [0u8; 8];
    reader.read_exact(&mut sizes)?;
    let packed_len = read_u32(&sizes, 0)?;
    let real_len = read_u32(&sizes, 4)?;

    let packed = read_packed(reader, packed_len)?;
    let table = inflate(&packed, real_len)?;

    let mut entries = HashMap::with_capacity(count.min(1 << 20) as usize);
    let mut pos = 0usize;
    for _ in 0..count {
        let name_len = table[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(ArchiveError::Corrupt("unterminated entry name"))?;
        let (name, _) = EUC_KR.decode_without_bom_handling(&table[pos..pos + name_len]);
        pos += name_len + 1;

        let entry = GrfEntry {
            packed_len: read_u32(&table, pos)?,
            aligned_len: read_u32(&table, pos + 4)?,
            real_len: read_u32(&table, pos + 8)?,
            flags: *table
                .get(pos + 12)
                .ok_or(ArchiveError::Corrupt("truncated entry"))?,
            offset: read_u32(&table, pos + 13)?,
        };
        pos += 17;

        entries.insert(entry_key(&name), entry);
    }

    Ok(GrfTable { entries })
}

/// Read and inflate one entry.
pub fn read_entry<R: Read + Seek>(
    reader: &mut R,
    name: &str,
    entry: &GrfEntry,
) -> Result<Vec<u8>, ArchiveError> {
    if entry.is_encrypted() {
        return Err(ArchiveError::Encrypted(name.to_string()));
    }

    reader.seek(SeekFrom::Start(HEADER_LEN + u64::from(entry.offset)))?;
    let packed = read_packed(reader, entry.packed_len)?;

    if entry.packed_len == entry.real_len {
        return Ok(packed);
    }
    inflate(&packed, entry.real_len)
}

/// Read `len` stored bytes at the current position.
fn read_packed<R: Read>(reader: &mut R, len: u32) -> Result<Vec<u8>, ArchiveError> {
    if len > MAX_INFLATED {
        return Err(ArchiveError::Corrupt("stored size too large"));
    }
    let mut packed = vec![0u8; len as usize];
    reader.read_exact(&mut packed)?;
    Ok(packed)
}

fn inflate(packed: &[u8], real_len: u32) -> Result<Vec<u8>, ArchiveError> {
    if real_len > MAX_INFLATED {
        return Err(ArchiveError::Corrupt("entry too large"));
    }
    let mut out = Vec::with_capacity(real_len as usize);
    ZlibDecoder::new(packed)
        .take(u64::from(real_len))
        .read_to_end(&mut out)?;
    if out.len() != real_len as usize {
        return Err(ArchiveError::Corrupt("inflated size mismatch"));
    }
    Ok(out)
}

/// Build an in-memory GRF 0x200 container. Entries are `(name, content, flags)`.
#[cfg(test)]
pub(crate) fn build_container(entries: &[(&str, &[u8], u8)]) -> Vec<u8> {
    let raw: Vec<(&[u8], &[u8], u8)> = entries
        .iter()
        .map(|(name, content, flags)| (name.as_bytes(), *content, *flags))
        .collect();
    build_container_raw(&raw)
}

/// Same as [`build_container`] with names given as stored bytes.
#[cfg(test)]
pub(crate) fn build_container_raw(entries: &[(&[u8], &[u8], u8)]) -> Vec<u8> {
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    let mut body = Vec::new();
    let mut table = Vec::new();
    for (name, content, flags) in entries {
        let packed = deflate(content);
        let offset = body.len() as u32;
        body.extend_from_slice(&packed);
        let aligned = packed.len().next_multiple_of(8);
        body.resize(offset as usize + aligned, 0);

        table.extend_from_slice(name);
        table.push(0);
        table.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        table.extend_from_slice(&(aligned as u32).to_le_bytes());
        table.extend_from_slice(&(content.len() as u32).to_le_bytes());
        table.push(*flags);
        table.extend_from_slice(&offset.to_le_bytes());
    }

    let seed = 3u32;
    let mut out = Vec::new();
    out.extend_from_slice(b"Master of Magic\0");
    out.extend_from_slice(&[0u8; 14]);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&seed.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u32 + seed + 7).to_le_bytes());
    out.extend_from_slice(&VERSION_200.to_le_bytes());
    out.extend_from_slice(&body);

    let packed_table = deflate(&table);
    out.extend_from_slice(&(packed_table.len() as u32).to_le_bytes());
    out.extend_from_slice(&(table.len() as u32).to_le_bytes());
    out.extend_from_slice(&packed_table);
    out
}
