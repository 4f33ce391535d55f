//! Box archive wire format
//!
//! The Box format is a little-endian container for named, typed, optionally
//! DEFLATE-compressed resource payloads:
//!
//! ```text
//! [4]  magic "BOX\n"
//! [1]  version (load fails if > SUPPORTED_VERSION)
//! [16] IV (all-zero = unencrypted; nonzero = encrypted, load fails)
//! [4]  entry_count (u32)
//! entry_count times:
//!   [1] type  [2] name_len  [name_len] name  [1] 0x00  [8] data_offset
//! [1]  '\n' separator
//! payloads, each at its data_offset:
//!   [8] uncompressed_size  [8] compressed_size (0 = stored raw)
//!   [compressed_size or uncompressed_size] bytes
//! ```
//!
//! The header table is read once on open and kept resident; name lookup is a
//! linear scan (archives are small).

use crate::error::{BoxError, Result};
use std::io::{Read, Write};

pub const MAGIC: [u8; 4] = *b"BOX\n";
pub const SUPPORTED_VERSION: u8 = 1;
pub const IV_LEN: usize = 16;

/// Separator byte between the header table and the payload region.
pub const HEADER_SEPARATOR: u8 = b'\n';

/// Resource type tag stored in each archive entry.
///
/// Drives loader dispatch in the catalog and selects the payload encoding.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Unknown = 0,
    Texture = 1,
    Shader = 2,
    Mesh = 3,
    Binary = 4,
    Font = 5,
    Audio = 6,
}

impl ResourceType {
    /// Parse a type tag from a byte value.
    ///
    /// Unknown values map to `Unknown`; absent resources report `Unknown` too.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Texture,
            2 => Self::Shader,
            3 => Self::Mesh,
            4 => Self::Binary,
            5 => Self::Font,
            6 => Self::Audio,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Texture => "Texture",
            Self::Shader => "Shader",
            Self::Mesh => "Mesh",
            Self::Binary => "Binary",
            Self::Font => "Font",
            Self::Audio => "Audio",
        }
    }
}

/// Texture sampling filter, stored as the first byte of a texture payload.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFiltering {
    Point = 0,
    Bilinear = 1,
    Trilinear = 2,
    Anisotropic = 3,
}

impl TextureFiltering {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Point),
            1 => Some(Self::Bilinear),
            2 => Some(Self::Trilinear),
            3 => Some(Self::Anisotropic),
            _ => None,
        }
    }
}

/// Texture coordinate wrapping mode, stored as the second byte of a texture
/// payload.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrapping {
    Clamp = 0,
    Repeat = 1,
}

impl TextureWrapping {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Clamp),
            1 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// Video backend a shader stage pair was authored for.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderBackend {
    OpenGl = 0,
    DirectX = 1,
}

impl ShaderBackend {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::OpenGl),
            1 => Some(Self::DirectX),
            _ => None,
        }
    }
}

/// One entry of the in-memory header table.
///
/// Immutable once read; `offset` is the absolute byte position of the entry's
/// payload (its two size fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub name: String,
    pub resource_type: ResourceType,
    pub offset: u64,
}

impl EntryHeader {
    /// Serialized size of this entry in the header table.
    ///
    /// Type byte + name length + name bytes + nul terminator + offset.
    pub fn encoded_len(&self) -> u64 {
        1 + 2 + self.name.len() as u64 + 1 + 8
    }

    /// Write this entry into the header table.
    ///
    /// The name length excludes the explicit nul terminator appended after
    /// the name bytes.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&[self.resource_type as u8])?;
        w.write_all(&(self.name.len() as u16).to_le_bytes())?;
        w.write_all(self.name.as_bytes())?;
        w.write_all(&[0u8])?;
        w.write_all(&self.offset.to_le_bytes())?;
        Ok(())
    }

    /// Read one entry from the header table.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let ty = read_u8(r, "entry type")?;
        let name_len = read_u16(r, "entry name length")? as usize;
        let mut name_bytes = vec![0u8; name_len];
        r.read_exact(&mut name_bytes)
            .map_err(|_| BoxError::Truncated("entry name"))?;
        // Skip the explicit nul terminator the builder appends.
        read_u8(r, "entry name terminator")?;
        let offset = read_u64(r, "entry data offset")?;
        let name = String::from_utf8(name_bytes)
            .map_err(|_| BoxError::Truncated("entry name is not valid UTF-8"))?;
        Ok(EntryHeader {
            name,
            resource_type: ResourceType::from_u8(ty),
            offset,
        })
    }
}

pub(crate) fn read_u8<R: Read>(r: &mut R, what: &'static str) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|_| BoxError::Truncated(what))?;
    Ok(buf[0])
}

pub(crate) fn read_u16<R: Read>(r: &mut R, what: &'static str) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf).map_err(|_| BoxError::Truncated(what))?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(r: &mut R, what: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| BoxError::Truncated(what))?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(r: &mut R, what: &'static str) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| BoxError::Truncated(what))?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_round_trip() {
        for ty in [
            ResourceType::Unknown,
            ResourceType::Texture,
            ResourceType::Shader,
            ResourceType::Mesh,
            ResourceType::Binary,
            ResourceType::Font,
            ResourceType::Audio,
        ] {
            assert_eq!(ResourceType::from_u8(ty as u8), ty);
        }
    }

    #[test]
    fn test_unknown_type_fallback() {
        assert_eq!(ResourceType::from_u8(99), ResourceType::Unknown);
        assert_eq!(ResourceType::from_u8(255), ResourceType::Unknown);
    }

    #[test]
    fn test_filtering_and_wrapping_values() {
        // Byte values are part of the texture payload encoding.
        assert_eq!(TextureFiltering::Bilinear as u8, 1);
        assert_eq!(TextureWrapping::Repeat as u8, 1);
        assert_eq!(TextureFiltering::from_u8(4), None);
        assert_eq!(TextureWrapping::from_u8(2), None);
    }

    #[test]
    fn test_entry_header_round_trip() {
        let entry = EntryHeader {
            name: "Tiles".to_string(),
            resource_type: ResourceType::Texture,
            offset: 0xDEAD_BEEF,
        };

        let mut bytes = Vec::new();
        entry.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len() as u64, entry.encoded_len());
        // Nul terminator sits between the name bytes and the offset.
        assert_eq!(bytes[3 + entry.name.len()], 0);

        let decoded = EntryHeader::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_entry_header_truncated() {
        let entry = EntryHeader {
            name: "Tiles".to_string(),
            resource_type: ResourceType::Texture,
            offset: 0,
        };
        let mut bytes = Vec::new();
        entry.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 1);

        assert!(matches!(
            EntryHeader::read_from(&mut bytes.as_slice()),
            Err(BoxError::Truncated(_))
        ));
    }
}
