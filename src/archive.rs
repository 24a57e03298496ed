//! Manages the zip component part of the epub doc.
//!
//! The central directory is parsed once at construction; entry contents
//! are decompressed on demand. Entries hold only offsets and lengths
//! into the backing buffer, so reads are pure functions of the
//! immutable data and safe to run from several callers at once.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::path;

const EOCD_SIG: u32 = 0x0605_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;

/// Minimum EOCD record length; the backward scan starts here.
const EOCD_LEN: usize = 22;
/// A trailing zip comment is at most 64 KiB, which bounds the scan.
const MAX_COMMENT: usize = 0x10000;
const CENTRAL_HEADER_LEN: usize = 46;
const LOCAL_HEADER_LEN: usize = 30;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive structure invalid: {0}")]
    Structure(&'static str),
    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),
    #[error("no entry named {0} in the archive")]
    EntryNotFound(String),
    #[error("entry is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

/// One central directory record, keyed by normalized path.
#[derive(Debug, Clone, Copy)]
struct EntryRecord {
    method: u16,
    compressed_size: usize,
    uncompressed_size: usize,
    local_header_offset: usize,
}

/// Epub archive struct. Owns the raw bytes and the parsed central
/// directory; file contents are read lazily.
#[derive(Debug)]
pub struct EpubArchive {
    data: Vec<u8>,
    pub path: PathBuf,
    /// Entry paths in central directory order.
    pub files: Vec<String>,
    entries: HashMap<String, EntryRecord>,
}

impl EpubArchive {
    /// Opens the epub file in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or isn't a valid zip.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut archive = Self::from_bytes(data)?;
        archive.path = path.to_path_buf();
        Ok(archive)
    }

    /// Parses the central directory of the zip data in `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Structure`] if no EOCD record lies within
    /// the trailing 64 KiB or a central directory record is malformed.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ArchiveError> {
        let eocd = find_eocd(&data)?;
        let total = read_u16(&data, eocd + 10)
            .ok_or(ArchiveError::Structure("eocd-not-found"))? as usize;
        let offset = read_u32(&data, eocd + 16)
            .ok_or(ArchiveError::Structure("eocd-not-found"))? as usize;

        let mut files = Vec::with_capacity(total);
        let mut entries = HashMap::with_capacity(total);
        let mut cursor = offset;

        const INVALID: ArchiveError = ArchiveError::Structure("central-directory-invalid");

        for _ in 0..total {
            if read_u32(&data, cursor) != Some(CENTRAL_SIG) {
                return Err(INVALID);
            }

            let method = read_u16(&data, cursor + 10).ok_or(INVALID)?;
            let compressed_size = read_u32(&data, cursor + 20).ok_or(INVALID)? as usize;
            let uncompressed_size = read_u32(&data, cursor + 24).ok_or(INVALID)? as usize;
            let name_len = read_u16(&data, cursor + 28).ok_or(INVALID)? as usize;
            let extra_len = read_u16(&data, cursor + 30).ok_or(INVALID)? as usize;
            let comment_len = read_u16(&data, cursor + 32).ok_or(INVALID)? as usize;
            let local_header_offset = read_u32(&data, cursor + 42).ok_or(INVALID)? as usize;
            let name_bytes = data
                .get(cursor + CENTRAL_HEADER_LEN..cursor + CENTRAL_HEADER_LEN + name_len)
                .ok_or(INVALID)?;

            let name = path::normalize(&String::from_utf8_lossy(name_bytes));
            files.push(name.clone());
            // zip allows appended entries to reuse a path; the last wins
            entries.insert(
                name,
                EntryRecord {
                    method,
                    compressed_size,
                    uncompressed_size,
                    local_header_offset,
                },
            );

            cursor += CENTRAL_HEADER_LEN + name_len + extra_len + comment_len;
        }

        log::debug!("parsed central directory: {} entries", files.len());

        Ok(Self {
            data,
            path: PathBuf::new(),
            files,
            entries,
        })
    }

    /// Returns the content of the file by the `name` as `Vec<u8>`.
    ///
    /// The lookup normalizes `name` the way entry paths were keyed, and
    /// retries with the percent-decoded form on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the name doesn't exist in the zip archive or
    /// the entry data is malformed.
    pub fn get_entry(&self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let name = path::normalize(name);
        let record = match self.entries.get(&name) {
            Some(record) => *record,
            None => {
                let decoded = percent_decode_str(&name).decode_utf8_lossy().to_string();
                *self
                    .entries
                    .get(&decoded)
                    .ok_or_else(|| ArchiveError::EntryNotFound(name.clone()))?
            }
        };
        self.read_record(&name, record)
    }

    /// Returns the content of the file by the `name` as `String`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name doesn't exist in the zip archive or
    /// the content is not valid UTF-8.
    pub fn get_entry_as_str(&self, name: &str) -> Result<String, ArchiveError> {
        Ok(String::from_utf8(self.get_entry(name)?)?)
    }

    /// Returns the content of container file "META-INF/container.xml".
    ///
    /// # Errors
    ///
    /// Returns an error if the epub doesn't have the container file.
    pub fn get_container_file(&self) -> Result<Vec<u8>, ArchiveError> {
        self.get_entry("META-INF/container.xml")
    }

    fn read_record(&self, name: &str, record: EntryRecord) -> Result<Vec<u8>, ArchiveError> {
        let offset = record.local_header_offset;
        if read_u32(&self.data, offset) != Some(LOCAL_SIG) {
            return Err(ArchiveError::Structure("local-header-invalid"));
        }

        // the local header's name/extra lengths may differ from the
        // central record's, so the payload start uses the local ones
        let name_len = read_u16(&self.data, offset + 26)
            .ok_or(ArchiveError::Structure("local-header-invalid"))? as usize;
        let extra_len = read_u16(&self.data, offset + 28)
            .ok_or(ArchiveError::Structure("local-header-invalid"))? as usize;

        let start = offset + LOCAL_HEADER_LEN + name_len + extra_len;
        let raw = self
            .data
            .get(start..start + record.compressed_size)
            .ok_or(ArchiveError::Structure("local-header-invalid"))?;

        match record.method {
            METHOD_STORED => Ok(raw.to_vec()),
            METHOD_DEFLATE => {
                let inflated = miniz_oxide::inflate::decompress_to_vec(raw)
                    .map_err(|_| ArchiveError::Structure("deflate-stream-invalid"))?;
                if inflated.len() != record.uncompressed_size {
                    log::warn!(
                        "entry {name}: inflated to {} bytes, directory declared {}",
                        inflated.len(),
                        record.uncompressed_size,
                    );
                }
                Ok(inflated)
            }
            method => Err(ArchiveError::UnsupportedCompression(method)),
        }
    }
}

/// Scans backward from `len - 22` for the EOCD signature, at most 64 KiB.
fn find_eocd(data: &[u8]) -> Result<usize, ArchiveError> {
    if data.len() < EOCD_LEN {
        return Err(ArchiveError::Structure("eocd-not-found"));
    }

    let floor = data.len().saturating_sub(MAX_COMMENT);
    let mut at = data.len() - EOCD_LEN;
    loop {
        if read_u32(data, at) == Some(EOCD_SIG) {
            return Ok(at);
        }
        if at == floor {
            return Err(ArchiveError::Structure("eocd-not-found"));
        }
        at -= 1;
    }
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
