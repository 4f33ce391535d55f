//! Box archive reader
//!
//! A [`BoxArchive`] is either file-backed (production: one open handle to a
//! `.box` file plus its resident header table) or config-backed (design
//! time: staged entries parsed from a JSON manifest, with payload bytes
//! synthesized on demand through the builder's encoders). Never both.
//!
//! Opening validates the magic, gates on the format version before any entry
//! data is read, and fails closed on a nonzero IV (encrypted archives are
//! recognized but unsupported). Any short read is a hard failure and leaves
//! the archive unusable.

use crate::builder::{stage_from_manifest, StagedEntry};
use crate::compression::inflate;
use crate::error::{BoxError, Result};
use crate::format::{
    read_u32, read_u64, read_u8, EntryHeader, ResourceType, HEADER_SEPARATOR, IV_LEN, MAGIC,
    SUPPORTED_VERSION,
};
use crate::manifest::ArchiveManifest;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, error};

enum Backing {
    /// Open read handle plus resident header table.
    File {
        file: Mutex<File>,
        headers: Vec<EntryHeader>,
    },
    /// Staged entries synthesized from a manifest, no file involved.
    Config { entries: Vec<StagedEntry> },
}

/// An opened Box archive.
pub struct BoxArchive {
    backing: Backing,
}

impl BoxArchive {
    /// Open a `.box` file and read its header table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).inspect_err(|e| {
            error!(path = %path.display(), "cannot open archive: {e}");
        })?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|_| BoxError::Truncated("magic"))?;
        if magic != MAGIC {
            error!(path = %path.display(), "bad magic in archive");
            return Err(BoxError::InvalidMagic);
        }

        let version = read_u8(&mut file, "version")?;
        if version > SUPPORTED_VERSION {
            error!(path = %path.display(), version, "unsupported archive version");
            return Err(BoxError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSION,
            });
        }

        let mut iv = [0u8; IV_LEN];
        file.read_exact(&mut iv)
            .map_err(|_| BoxError::Truncated("IV"))?;
        if iv.iter().any(|&b| b != 0) {
            error!(path = %path.display(), "archive is encrypted; refusing to load");
            return Err(BoxError::Encrypted);
        }

        let entry_count = read_u32(&mut file, "entry count")?;
        let mut headers = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            headers.push(EntryHeader::read_from(&mut file)?);
        }
        let separator = read_u8(&mut file, "header separator")?;
        if separator != HEADER_SEPARATOR {
            return Err(BoxError::Truncated("header separator"));
        }

        debug!(path = %path.display(), entries = headers.len(), "archive opened");
        Ok(BoxArchive {
            backing: Backing::File {
                file: Mutex::new(file),
                headers,
            },
        })
    }

    /// Open a config-backed archive from a JSON manifest.
    ///
    /// Entry bytes are synthesized on demand through the same per-type
    /// encoders the builder uses, so the data observed here is identical to
    /// what a built `.box` file would yield.
    pub fn load_from_config(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let manifest = ArchiveManifest::load(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let entries = stage_from_manifest(&manifest, base)?;
        debug!(path = %path.display(), entries = entries.len(), "config-backed archive opened");
        Ok(BoxArchive {
            backing: Backing::Config { entries },
        })
    }

    /// Whether the archive is config-backed rather than file-backed.
    pub fn is_config_backed(&self) -> bool {
        matches!(self.backing, Backing::Config { .. })
    }

    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::File { headers, .. } => headers.len(),
            Backing::Config { entries } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over `(name, type)` for every entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, ResourceType)> {
        let items: Vec<(&str, ResourceType)> = match &self.backing {
            Backing::File { headers, .. } => headers
                .iter()
                .map(|h| (h.name.as_str(), h.resource_type))
                .collect(),
            Backing::Config { entries } => entries
                .iter()
                .map(|e| (e.name.as_str(), e.source.resource_type()))
                .collect(),
        };
        items.into_iter()
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.entries().any(|(n, _)| n == name)
    }

    /// Resource type by name; `Unknown` if absent.
    pub fn resource_type(&self, name: &str) -> ResourceType {
        self.entries()
            .find(|(n, _)| *n == name)
            .map(|(_, ty)| ty)
            .unwrap_or(ResourceType::Unknown)
    }

    /// Read and (if needed) decompress an entry's payload.
    pub fn resource_data(&self, name: &str) -> Result<Vec<u8>> {
        match &self.backing {
            Backing::File { file, headers } => {
                let header = headers
                    .iter()
                    .find(|h| h.name == name)
                    .ok_or_else(|| BoxError::MissingResource(name.to_string()))?;

                let mut file = file.lock();
                file.seek(SeekFrom::Start(header.offset))?;
                let uncompressed_size = read_u64(&mut *file, "uncompressed size")?;
                let compressed_size = read_u64(&mut *file, "compressed size")?;

                // Size fields are untrusted input; a corrupt entry must not
                // drive an allocation larger than the file can actually hold.
                let stored_size = if compressed_size > 0 {
                    compressed_size
                } else {
                    uncompressed_size
                };
                let payload_start = header.offset.saturating_add(16);
                let available = file.metadata()?.len().saturating_sub(payload_start);
                if stored_size > available {
                    return Err(BoxError::Truncated("payload size exceeds archive"));
                }

                let mut stored = vec![0u8; stored_size as usize];
                file.read_exact(&mut stored)
                    .map_err(|_| BoxError::Truncated("payload"))?;
                if compressed_size > 0 {
                    inflate(&stored, uncompressed_size)
                } else {
                    Ok(stored)
                }
            }
            Backing::Config { entries } => {
                let entry = entries
                    .iter()
                    .find(|e| e.name == name)
                    .ok_or_else(|| BoxError::MissingResource(name.to_string()))?;
                entry.encode_payload()
            }
        }
    }

    /// Peek an entry's stored (compressed) size; 0 if absent or stored raw.
    pub fn compressed_size(&self, name: &str) -> u64 {
        self.peek_sizes(name).map(|(_, c)| c).unwrap_or(0)
    }

    /// Peek an entry's uncompressed size; 0 if absent.
    pub fn uncompressed_size(&self, name: &str) -> u64 {
        self.peek_sizes(name).map(|(u, _)| u).unwrap_or(0)
    }

    fn peek_sizes(&self, name: &str) -> Option<(u64, u64)> {
        match &self.backing {
            Backing::File { file, headers } => {
                let header = headers.iter().find(|h| h.name == name)?;
                let mut file = file.lock();
                file.seek(SeekFrom::Start(header.offset)).ok()?;
                let uncompressed = read_u64(&mut *file, "uncompressed size").ok()?;
                let compressed = read_u64(&mut *file, "compressed size").ok()?;
                Some((uncompressed, compressed))
            }
            Backing::Config { entries } => {
                // Config mode never compresses; synthesize to measure.
                let entry = entries.iter().find(|e| e.name == name)?;
                let payload = entry.encode_payload().ok()?;
                Some((payload.len() as u64, 0))
            }
        }
    }
}
