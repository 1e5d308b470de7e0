use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const MAGIC: &[u8; 8] = b"CTENFDAM";
/// Covers larger than this are treated as a corrupt header.
pub const MAX_COVER_BYTES: u32 = 20 * 1024 * 1024;

fn read_u32(r: &mut impl Read) -> Option<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).ok()?;
    Some(u32::from_le_bytes(buf))
}

fn skip(r: &mut impl Seek, n: u32) -> Option<()> {
    r.seek(SeekFrom::Current(i64::from(n))).ok().map(drop)
}

/// Cover image stored in an encrypted container header.
///
/// Layout: magic, 2 bytes, key block, metadata block (each a little-endian
/// `u32` length plus data), CRC and gap (9 bytes), then the image length and
/// the image.
pub fn read_cover(mut r: impl Read + Seek) -> Option<Vec<u8>> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic).ok()?;
    if &magic != MAGIC {
        return None;
    }
    skip(&mut r, 2)?;
    let key_len = read_u32(&mut r)?;
    skip(&mut r, key_len)?;
    let meta_len = read_u32(&mut r)?;
    skip(&mut r, meta_len)?;
    skip(&mut r, 9)?;

    let size = read_u32(&mut r)?;
    if size == 0 || size > MAX_COVER_BYTES {
        return None;
    }
    let mut image = vec![0u8; size as usize];
    r.read_exact(&mut image).ok()?;
    Some(image)
}

pub fn read_cover_file(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    read_cover(BufReader::new(file))
}

#[cfg(test)]
pub(crate) fn container(key: &[u8], meta: &[u8], image: &[u8]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(&(meta.len() as u32).to_le_bytes());
    out.extend_from_slice(meta);
    out.extend_from_slice(&[0u8; 9]);
    out.extend_from_slice(&(image.len() as u32).to_le_bytes());
    out.extend_from_slice(image);
    out.extend_from_slice(b"encrypted audio");
    out
}
