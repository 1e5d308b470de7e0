//! Content identity for duplicate detection.
//!
//! Fingerprints sample the head and tail of a file instead of hashing it
//! whole. For MP3 and FLAC the metadata region is excluded, so rewriting tags
//! or embedded art leaves the fingerprint unchanged while any change to the
//! audio payload changes it. This is duplicate detection, not integrity
//! protection.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Size of each sampled window.
pub const SAMPLE_WINDOW: u64 = 64 * 1024;

const ID3V1_LEN: u64 = 128;

/// Digest of a file's identifying bytes.
///
/// Failures are represented by the absence of a fingerprint
/// (`Option<Fingerprint>`), and [`same_content`] never matches an absent one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True only when both fingerprints exist and are equal.
pub fn same_content(a: Option<&Fingerprint>, b: Option<&Fingerprint>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Mp3,
    Flac,
    Opaque,
}

impl Container {
    fn of(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp3") => Container::Mp3,
            Some("flac") => Container::Flac,
            _ => Container::Opaque,
        }
    }
}

/// Fingerprint a file. Returns `None` on any I/O or parse failure.
pub fn fingerprint(path: &Path) -> Option<Fingerprint> {
    fingerprint_inner(path).ok()
}

fn fingerprint_inner(path: &Path) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let (start, end) = match Container::of(path) {
        Container::Mp3 => mp3_payload_range(&mut file, len)?,
        Container::Flac => flac_payload_range(&mut file, len)?,
        Container::Opaque => (0, len),
    };
    // A tag header that claims the whole file is not trusted.
    let (start, end) = if start >= end { (0, len) } else { (start, end) };

    sample_digest(&mut file, start, end)
}

fn sample_digest(file: &mut File, start: u64, end: u64) -> io::Result<Fingerprint> {
    let payload = end - start;
    let mut hasher = blake3::Hasher::new();
    hasher.update(payload.to_string().as_bytes());

    let head_len = payload.min(SAMPLE_WINDOW);
    hasher.update(&read_window(file, start, head_len)?);

    if payload > SAMPLE_WINDOW {
        let tail_start = start.max(end - SAMPLE_WINDOW);
        hasher.update(&read_window(file, tail_start, end - tail_start)?);
    }

    Ok(Fingerprint(hasher.finalize().to_hex().to_string()))
}

fn read_window(file: &mut File, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len as usize);
    file.by_ref().take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Decode a 28-bit syncsafe integer (ID3v2 sizes).
pub fn syncsafe(bytes: [u8; 4]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7F))
}

/// Audio payload range of an MP3: after the ID3v2 tag, before an ID3v1 trailer.
fn mp3_payload_range(file: &mut File, len: u64) -> io::Result<(u64, u64)> {
    let mut start = 0;
    if len >= 10 {
        let header = read_window(file, 0, 10)?;
        if &header[..3] == b"ID3" {
            let size = syncsafe([header[6], header[7], header[8], header[9]]);
            let footer = if header[5] & 0x10 != 0 { 10 } else { 0 };
            start = 10 + size + footer;
        }
    }

    let mut end = len;
    if len >= ID3V1_LEN {
        let trailer = read_window(file, len - ID3V1_LEN, 3)?;
        if trailer == b"TAG" {
            end -= ID3V1_LEN;
        }
    }
    Ok((start, end))
}

/// Audio payload range of a FLAC stream: everything after the metadata blocks.
fn flac_payload_range(file: &mut File, len: u64) -> io::Result<(u64, u64)> {
    if len < 4 || read_window(file, 0, 4)? != b"fLaC" {
        return Ok((0, len));
    }
    let mut offset = 4u64;
    loop {
        let header = read_window(file, offset, 4)?;
        if header.len() < 4 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated FLAC metadata block header",
            ));
        }
        let last = header[0] & 0x80 != 0;
        let block_len =
            (u64::from(header[1]) << 16) | (u64::from(header[2]) << 8) | u64::from(header[3]);
        offset += 4 + block_len;
        if last || offset >= len {
            break;
        }
    }
    Ok((offset, len))
}

/// Per-run memo of fingerprints, keyed by path and invalidated when the
/// file's size or modification time changes.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    entries: HashMap<PathBuf, CachedFingerprint>,
}

#[derive(Debug)]
struct CachedFingerprint {
    size: u64,
    modified: Option<SystemTime>,
    value: Option<Fingerprint>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &Path) -> Option<Fingerprint> {
        let meta = std::fs::metadata(path).ok()?;
        let size = meta.len();
        let modified = meta.modified().ok();

        if let Some(cached) = self.entries.get(path) {
            if cached.size == size && cached.modified == modified {
                return cached.value.clone();
            }
        }

        let value = fingerprint(path);
        self.entries.insert(
            path.to_path_buf(),
            CachedFingerprint {
                size,
                modified,
                value: value.clone(),
            },
        );
        value
    }

    pub fn forget(&mut self, path: &Path) {
        self.entries.remove(path);
    }
}

#[cfg(test)]
pub(crate) mod samples {
    //! Synthetic audio files for tests.

    /// ID3v2.3 tag with a single `TIT2` frame of `title`, padded by `padding` bytes.
    pub fn id3v2_tag(title: &str, padding: usize) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(b"TIT2");
        let body_len = (title.len() + 1) as u32;
        frame.extend_from_slice(&body_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0]);
        frame.extend_from_slice(title.as_bytes());
        frame.extend(std::iter::repeat_n(0u8, padding));

        let size = frame.len() as u32;
        let syncsafe = [
            ((size >> 21) & 0x7F) as u8,
            ((size >> 14) & 0x7F) as u8,
            ((size >> 7) & 0x7F) as u8,
            (size & 0x7F) as u8,
        ];
        let mut tag = b"ID3\x03\x00\x00".to_vec();
        tag.extend_from_slice(&syncsafe);
        tag.extend(frame);
        tag
    }

    pub fn id3v1_trailer(title: &str) -> Vec<u8> {
        let mut t = b"TAG".to_vec();
        let mut field = title.as_bytes().to_vec();
        field.resize(125, 0);
        t.extend(field);
        t
    }

    /// Deterministic pseudo-audio payload.
    pub fn payload(seed: u8, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    pub fn mp3(title: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = id3v2_tag(title, 16);
        bytes.extend_from_slice(payload);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::samples::*;
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn syncsafe_decodes_seven_bit_groups() {
        assert_eq!(syncsafe([0, 0, 0x02, 0x01]), 257);
        assert_eq!(syncsafe([0x7F, 0x7F, 0x7F, 0x7F]), (1 << 28) - 1);
    }

    #[test]
    fn mp3_fingerprint_ignores_tag_rewrites() {
        let dir = tempdir().unwrap();
        let audio = payload(7, 200_000);

        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        fs::write(&a, mp3("Original", &audio)).unwrap();

        let mut rewritten = id3v2_tag("A much longer replacement title", 4096);
        rewritten.extend_from_slice(&audio);
        rewritten.extend(id3v1_trailer("v1 title"));
        fs::write(&b, rewritten).unwrap();

        let fa = fingerprint(&a);
        assert!(fa.is_some());
        assert_eq!(fa, fingerprint(&b));
    }

    #[test]
    fn mp3_fingerprint_changes_with_payload() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        let audio = payload(1, 150_000);
        let mut changed = audio.clone();
        *changed.last_mut().unwrap() ^= 0xFF;

        fs::write(&a, mp3("Same", &audio)).unwrap();
        fs::write(&b, mp3("Same", &changed)).unwrap();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn payload_length_is_part_of_the_digest() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        // Same head and tail windows, different middle length.
        let mut long = vec![1u8; SAMPLE_WINDOW as usize * 3];
        let mut short = vec![1u8; SAMPLE_WINDOW as usize * 2 + 10];
        long[0] = 9;
        short[0] = 9;
        fs::write(&a, long).unwrap();
        fs::write(&b, short).unwrap();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn flac_fingerprint_skips_metadata_blocks() {
        let dir = tempdir().unwrap();
        let frames = payload(3, 90_000);

        let flac = |comment: &[u8]| {
            let mut bytes = b"fLaC".to_vec();
            // STREAMINFO (not last), 34 bytes.
            bytes.extend_from_slice(&[0x00, 0x00, 0x00, 34]);
            bytes.extend(std::iter::repeat_n(0xAB, 34));
            // VORBIS_COMMENT (last).
            let len = comment.len() as u32;
            bytes.extend_from_slice(&[0x84, (len >> 16) as u8, (len >> 8) as u8, len as u8]);
            bytes.extend_from_slice(comment);
            bytes.extend_from_slice(&frames);
            bytes
        };

        let a = dir.path().join("a.flac");
        let b = dir.path().join("b.flac");
        fs::write(&a, flac(b"TITLE=one")).unwrap();
        fs::write(&b, flac(b"TITLE=a different and longer title")).unwrap();
        assert!(fingerprint(&a).is_some());
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn missing_files_never_match() {
        let dir = tempdir().unwrap();
        let missing_a = fingerprint(&dir.path().join("nope.mp3"));
        let missing_b = fingerprint(&dir.path().join("nada.mp3"));
        assert!(missing_a.is_none());
        assert!(!same_content(missing_a.as_ref(), missing_b.as_ref()));
    }

    #[test]
    fn oversized_tag_header_falls_back_to_whole_file() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("odd.mp3");
        let mut bytes = b"ID3\x03\x00\x00\x7F\x7F\x7F\x7F".to_vec();
        bytes.extend(payload(5, 100));
        fs::write(&p, bytes).unwrap();
        assert!(fingerprint(&p).is_some());
    }

    #[test]
    fn cache_recomputes_after_content_change() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("track.bin");
        fs::write(&p, b"first").unwrap();

        let mut cache = FingerprintCache::new();
        let first = cache.get(&p);
        assert_eq!(first, cache.get(&p));

        fs::write(&p, b"second, longer content").unwrap();
        assert_ne!(first, cache.get(&p));
    }
}
