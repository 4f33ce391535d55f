//! Archive builder JSON manifest
//!
//! Design-time description of a Box archive's contents. A manifest either
//! feeds [`crate::builder::BoxBuilder::add_from_config`] to build a `.box`
//! file, or backs a config-mode [`crate::archive::BoxArchive`] that
//! synthesizes entry bytes on demand without ever writing the file.
//!
//! Validation is strict: an unrecognized field, a missing required field, or
//! a bad enum string aborts the whole manifest load with a descriptive
//! error. No partial archive is ever built from a bad manifest.

use crate::error::{BoxError, Result};
use crate::format::{ResourceType, ShaderBackend, TextureFiltering, TextureWrapping};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveManifest {
    /// Default compression flag for all items (per-item override below).
    #[serde(default = "default_compressed")]
    pub compressed: bool,

    pub items: Vec<ManifestItem>,
}

fn default_compressed() -> bool {
    true
}

/// One archive entry described by the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestItem {
    pub name: String,

    /// Resource type: "Texture", "Shader", "Mesh", "Binary", "Font", "Audio".
    #[serde(rename = "type")]
    pub type_name: String,

    /// Per-item compression override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,

    /// Source file path (all types except Shader).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Texture filtering: "Point", "Bilinear", "Trilinear", "Anisotropic".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtering: Option<String>,

    /// Texture wrapping: "Clamp", "Repeat".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapping: Option<String>,

    /// Shader sources, one vertex/pixel pair per backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<ShaderSourceEntry>>,
}

/// One per-backend vertex/pixel source pair for a Shader item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShaderSourceEntry {
    /// "OpenGL" or "DirectX".
    pub backend: String,
    pub vertex: String,
    pub pixel: String,
}

impl ArchiveManifest {
    /// Load and validate a manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BoxError::Manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        let manifest: ArchiveManifest = serde_json::from_str(&text)
            .map_err(|e| BoxError::Manifest(format!("{}: {}", path.display(), e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate every item against the schema rules for its type.
    pub fn validate(&self) -> Result<()> {
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }
}

impl ManifestItem {
    /// Effective compression flag, falling back to the manifest default.
    pub fn compressed_or(&self, default: bool) -> bool {
        self.compressed.unwrap_or(default)
    }

    pub fn resource_type(&self) -> Result<ResourceType> {
        match self.type_name.as_str() {
            "Texture" => Ok(ResourceType::Texture),
            "Shader" => Ok(ResourceType::Shader),
            "Mesh" => Ok(ResourceType::Mesh),
            "Binary" => Ok(ResourceType::Binary),
            "Font" => Ok(ResourceType::Font),
            "Audio" => Ok(ResourceType::Audio),
            other => Err(BoxError::Manifest(format!(
                "item \"{}\": unknown type \"{}\"",
                self.name, other
            ))),
        }
    }

    pub fn filtering(&self) -> Result<TextureFiltering> {
        match self.filtering.as_deref() {
            Some("Point") => Ok(TextureFiltering::Point),
            Some("Bilinear") => Ok(TextureFiltering::Bilinear),
            Some("Trilinear") => Ok(TextureFiltering::Trilinear),
            Some("Anisotropic") => Ok(TextureFiltering::Anisotropic),
            Some(other) => Err(BoxError::Manifest(format!(
                "item \"{}\": unknown filtering \"{}\"",
                self.name, other
            ))),
            None => Err(BoxError::Manifest(format!(
                "item \"{}\": Texture items require \"filtering\"",
                self.name
            ))),
        }
    }

    pub fn wrapping(&self) -> Result<TextureWrapping> {
        match self.wrapping.as_deref() {
            Some("Clamp") => Ok(TextureWrapping::Clamp),
            Some("Repeat") => Ok(TextureWrapping::Repeat),
            Some(other) => Err(BoxError::Manifest(format!(
                "item \"{}\": unknown wrapping \"{}\"",
                self.name, other
            ))),
            None => Err(BoxError::Manifest(format!(
                "item \"{}\": Texture items require \"wrapping\"",
                self.name
            ))),
        }
    }

    /// Required `source` path, resolved against the manifest's directory.
    pub fn source_path(&self, base: &Path) -> Result<PathBuf> {
        match &self.source {
            Some(source) => Ok(base.join(source)),
            None => Err(BoxError::Manifest(format!(
                "item \"{}\": {} items require \"source\"",
                self.name, self.type_name
            ))),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BoxError::Manifest("item with empty name".to_string()));
        }
        let ty = self.resource_type()?;
        match ty {
            ResourceType::Shader => {
                if self.source.is_some() {
                    return Err(BoxError::Manifest(format!(
                        "item \"{}\": Shader items use \"sources\", not \"source\"",
                        self.name
                    )));
                }
                let sources = self.sources.as_ref().ok_or_else(|| {
                    BoxError::Manifest(format!(
                        "item \"{}\": Shader items require \"sources\"",
                        self.name
                    ))
                })?;
                if sources.is_empty() {
                    return Err(BoxError::Manifest(format!(
                        "item \"{}\": \"sources\" must not be empty",
                        self.name
                    )));
                }
                for entry in sources {
                    entry.backend_id().map_err(|_| {
                        BoxError::Manifest(format!(
                            "item \"{}\": unknown backend \"{}\"",
                            self.name, entry.backend
                        ))
                    })?;
                }
            }
            ResourceType::Texture => {
                if self.source.is_none() {
                    return Err(BoxError::Manifest(format!(
                        "item \"{}\": Texture items require \"source\"",
                        self.name
                    )));
                }
                self.filtering()?;
                self.wrapping()?;
            }
            _ => {
                if self.source.is_none() {
                    return Err(BoxError::Manifest(format!(
                        "item \"{}\": {} items require \"source\"",
                        self.name, self.type_name
                    )));
                }
                if self.sources.is_some() {
                    return Err(BoxError::Manifest(format!(
                        "item \"{}\": only Shader items accept \"sources\"",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ShaderSourceEntry {
    pub fn backend_id(&self) -> Result<ShaderBackend> {
        match self.backend.as_str() {
            "OpenGL" => Ok(ShaderBackend::OpenGl),
            "DirectX" => Ok(ShaderBackend::DirectX),
            other => Err(BoxError::Manifest(format!(
                "unknown backend \"{}\"",
                other
            ))),
        }
    }
}
