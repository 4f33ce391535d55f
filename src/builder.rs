//! Box archive builder
//!
//! Design-time tool that assembles a `.box` file from staged source assets.
//! Each stage call records a name, source path(s), and type-specific options;
//! [`BoxBuilder::build`] then encodes every source through the per-type
//! encoders in [`crate::codec`] and writes the archive in two passes: the
//! header table is written with reserved offset slots, payloads follow, and
//! the real offsets are backpatched afterwards.

use crate::codec::{
    AudioData, AudioSamples, MeshData, MeshVertex, ShaderData, ShaderStage, TextureData,
};
use crate::compression::compress_entry;
use crate::error::{BoxError, Result};
use crate::format::{
    ResourceType, ShaderBackend, TextureFiltering, TextureWrapping, HEADER_SEPARATOR, IV_LEN,
    MAGIC, SUPPORTED_VERSION,
};
use crate::manifest::ArchiveManifest;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One vertex/pixel source file pair for a staged shader.
#[derive(Debug, Clone)]
pub struct ShaderSourcePair {
    pub backend: ShaderBackend,
    pub vertex: PathBuf,
    pub pixel: PathBuf,
}

/// Type-specific source description of a staged entry.
#[derive(Debug, Clone)]
pub enum StagedSource {
    Texture {
        path: PathBuf,
        filtering: TextureFiltering,
        wrapping: TextureWrapping,
    },
    Shader {
        sources: Vec<ShaderSourcePair>,
    },
    Mesh {
        path: PathBuf,
    },
    Audio {
        path: PathBuf,
    },
    Font {
        path: PathBuf,
    },
    Binary {
        path: PathBuf,
    },
}

impl StagedSource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Texture { .. } => ResourceType::Texture,
            Self::Shader { .. } => ResourceType::Shader,
            Self::Mesh { .. } => ResourceType::Mesh,
            Self::Audio { .. } => ResourceType::Audio,
            Self::Font { .. } => ResourceType::Font,
            Self::Binary { .. } => ResourceType::Binary,
        }
    }
}

/// A pending archive entry: name, source, and compression flag.
#[derive(Debug, Clone)]
pub struct StagedEntry {
    pub name: String,
    pub source: StagedSource,
    pub compress: bool,
}

impl StagedEntry {
    /// Encode this entry's payload through its type-specific encoder.
    ///
    /// This is the pre-compression byte image of the entry; the builder's
    /// file pass and a config-backed archive both go through here, so the
    /// two modes produce identical bytes for the same sources.
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        match &self.source {
            StagedSource::Texture {
                path,
                filtering,
                wrapping,
            } => Ok(encode_texture(path, *filtering, *wrapping)?.encode()),
            StagedSource::Shader { sources } => Ok(encode_shader(sources)?.encode()),
            StagedSource::Mesh { path } => Ok(encode_mesh(path)?.encode()),
            StagedSource::Audio { path } => encode_audio(path)?.encode(),
            StagedSource::Font { path } | StagedSource::Binary { path } => {
                std::fs::read(path).map_err(|e| source_err(path, e))
            }
        }
    }
}

fn source_err(path: &Path, e: impl std::fmt::Display) -> BoxError {
    BoxError::AssetSource {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// A placeholder offset slot in the header table, to be filled once the
/// entry's payload position is known.
#[derive(Debug)]
struct OffsetReservation {
    position: u64,
}

impl OffsetReservation {
    /// Write an 8-byte placeholder at the current position.
    fn reserve<W: Write + Seek>(w: &mut W) -> Result<Self> {
        let position = w.stream_position()?;
        w.write_all(&0u64.to_le_bytes())?;
        Ok(OffsetReservation { position })
    }

    /// Backpatch the placeholder, restoring the write cursor afterwards.
    fn fill<W: Write + Seek>(self, w: &mut W, value: u64) -> Result<()> {
        let end = w.stream_position()?;
        w.seek(SeekFrom::Start(self.position))?;
        w.write_all(&value.to_le_bytes())?;
        w.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

/// Assembles a Box archive from staged source assets.
#[derive(Debug, Default)]
pub struct BoxBuilder {
    entries: Vec<StagedEntry>,
}

impl BoxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staged(&self) -> &[StagedEntry] {
        &self.entries
    }

    fn stage(&mut self, name: impl Into<String>, source: StagedSource, compress: bool) -> Result<()> {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(BoxError::DuplicateResource(name));
        }
        self.entries.push(StagedEntry {
            name,
            source,
            compress,
        });
        Ok(())
    }

    pub fn stage_texture(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        filtering: TextureFiltering,
        wrapping: TextureWrapping,
        compress: bool,
    ) -> Result<()> {
        self.stage(
            name,
            StagedSource::Texture {
                path: path.into(),
                filtering,
                wrapping,
            },
            compress,
        )
    }

    pub fn stage_shader(
        &mut self,
        name: impl Into<String>,
        sources: Vec<ShaderSourcePair>,
        compress: bool,
    ) -> Result<()> {
        self.stage(name, StagedSource::Shader { sources }, compress)
    }

    pub fn stage_mesh(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        compress: bool,
    ) -> Result<()> {
        self.stage(name, StagedSource::Mesh { path: path.into() }, compress)
    }

    pub fn stage_audio(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        compress: bool,
    ) -> Result<()> {
        self.stage(name, StagedSource::Audio { path: path.into() }, compress)
    }

    pub fn stage_font(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        compress: bool,
    ) -> Result<()> {
        self.stage(name, StagedSource::Font { path: path.into() }, compress)
    }

    pub fn stage_binary(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        compress: bool,
    ) -> Result<()> {
        self.stage(name, StagedSource::Binary { path: path.into() }, compress)
    }

    /// Stage every item of a JSON manifest.
    ///
    /// Validation is all-or-nothing: a schema violation anywhere in the
    /// manifest leaves the builder's staged set untouched.
    pub fn add_from_config(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let manifest = ArchiveManifest::load(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let staged = stage_from_manifest(&manifest, base)?;
        for (i, entry) in staged.iter().enumerate() {
            let dup_in_batch = staged[..i].iter().any(|e| e.name == entry.name);
            if dup_in_batch || self.entries.iter().any(|e| e.name == entry.name) {
                return Err(BoxError::DuplicateResource(entry.name.clone()));
            }
        }
        // Whole manifest validated; commit.
        self.entries.extend(staged);
        Ok(())
    }

    /// Write the archive to disk.
    pub fn build(&self, path: impl AsRef<Path>) -> Result<()> {
        self.build_with_iv(path, [0u8; IV_LEN])
    }

    /// Write the archive with a nonzero IV in the header.
    ///
    /// Entry payloads are NOT encrypted; only the header IV slot is
    /// populated, and readers refuse such archives. Kept as a recognized
    /// format feature pending real encryption support.
    pub fn build_encrypted(&self, path: impl AsRef<Path>, iv: [u8; IV_LEN]) -> Result<()> {
        warn!("build_encrypted populates the IV only; entry payloads are not encrypted");
        self.build_with_iv(path, iv)
    }

    fn build_with_iv(&self, path: impl AsRef<Path>, iv: [u8; IV_LEN]) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);

        w.write_all(&MAGIC)?;
        w.write_all(&[SUPPORTED_VERSION])?;
        w.write_all(&iv)?;
        w.write_all(&(self.entries.len() as u32).to_le_bytes())?;

        // Pass 1: header table with reserved offset slots.
        let mut reservations = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            w.write_all(&[entry.source.resource_type() as u8])?;
            w.write_all(&(entry.name.len() as u16).to_le_bytes())?;
            w.write_all(entry.name.as_bytes())?;
            w.write_all(&[0u8])?;
            reservations.push(OffsetReservation::reserve(&mut w)?);
        }
        w.write_all(&[HEADER_SEPARATOR])?;

        // Pass 2: payloads, backpatching each entry's offset.
        for (entry, reservation) in self.entries.iter().zip(reservations) {
            let payload = entry.encode_payload()?;
            let (stored, compressed_size) = compress_entry(&payload, entry.compress)?;

            let offset = w.stream_position()?;
            w.write_all(&(payload.len() as u64).to_le_bytes())?;
            w.write_all(&compressed_size.to_le_bytes())?;
            w.write_all(&stored)?;
            reservation.fill(&mut w, offset)?;

            debug!(
                name = %entry.name,
                ty = entry.source.resource_type().as_str(),
                uncompressed = payload.len(),
                stored = stored.len(),
                "staged entry written"
            );
        }

        w.flush()?;
        Ok(())
    }
}

/// Convert a validated manifest into staged entries.
///
/// Shared by [`BoxBuilder::add_from_config`] and config-mode
/// [`crate::archive::BoxArchive`].
pub(crate) fn stage_from_manifest(
    manifest: &ArchiveManifest,
    base: &Path,
) -> Result<Vec<StagedEntry>> {
    let mut entries = Vec::with_capacity(manifest.items.len());
    for item in &manifest.items {
        let compress = item.compressed_or(manifest.compressed);
        let source = match item.resource_type()? {
            ResourceType::Texture => StagedSource::Texture {
                path: item.source_path(base)?,
                filtering: item.filtering()?,
                wrapping: item.wrapping()?,
            },
            ResourceType::Shader => {
                let mut sources = Vec::new();
                for entry in item.sources.as_ref().into_iter().flatten() {
                    sources.push(ShaderSourcePair {
                        backend: entry.backend_id()?,
                        vertex: base.join(&entry.vertex),
                        pixel: base.join(&entry.pixel),
                    });
                }
                StagedSource::Shader { sources }
            }
            ResourceType::Mesh => StagedSource::Mesh {
                path: item.source_path(base)?,
            },
            ResourceType::Audio => StagedSource::Audio {
                path: item.source_path(base)?,
            },
            ResourceType::Font => StagedSource::Font {
                path: item.source_path(base)?,
            },
            ResourceType::Binary => StagedSource::Binary {
                path: item.source_path(base)?,
            },
            ResourceType::Unknown => unreachable!("manifest validation rejects unknown types"),
        };
        entries.push(StagedEntry {
            name: item.name.clone(),
            source,
            compress,
        });
    }
    Ok(entries)
}

/// Decode an image source into packed RGBA8, bottom-up row order.
fn encode_texture(
    path: &Path,
    filtering: TextureFiltering,
    wrapping: TextureWrapping,
) -> Result<TextureData> {
    let img = image::open(path).map_err(|e| source_err(path, e))?;
    let rgba = image::imageops::flip_vertical(&img.to_rgba8());
    let (width, height) = rgba.dimensions();
    Ok(TextureData {
        filtering,
        wrapping,
        width: width as i32,
        height: height as i32,
        pixels: rgba.into_raw(),
    })
}

fn encode_shader(sources: &[ShaderSourcePair]) -> Result<ShaderData> {
    let mut stages = Vec::with_capacity(sources.len());
    for pair in sources {
        stages.push(ShaderStage {
            backend: pair.backend,
            vertex: std::fs::read(&pair.vertex).map_err(|e| source_err(&pair.vertex, e))?,
            pixel: std::fs::read(&pair.pixel).map_err(|e| source_err(&pair.pixel, e))?,
        });
    }
    Ok(ShaderData { stages })
}

/// Import an OBJ source into the archive's interleaved vertex layout.
///
/// Tangents are accumulated per triangle from the UV gradients and
/// normalized; degenerate triangles fall back to +X.
fn encode_mesh(path: &Path) -> Result<MeshData> {
    let (models, _) =
        tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|e| source_err(path, e))?;

    let mut vertices: Vec<MeshVertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    for model in &models {
        let mesh = &model.mesh;
        let base = vertices.len() as u32;
        let vertex_count = mesh.positions.len() / 3;
        for i in 0..vertex_count {
            let uv = if mesh.texcoords.len() >= (i + 1) * 2 {
                [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            };
            let normal = if mesh.normals.len() >= (i + 1) * 3 {
                [
                    mesh.normals[i * 3],
                    mesh.normals[i * 3 + 1],
                    mesh.normals[i * 3 + 2],
                ]
            } else {
                [0.0, 0.0, 0.0]
            };
            vertices.push(MeshVertex {
                position: [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                normal,
                uv,
                tangent: [0.0, 0.0, 0.0],
            });
        }
        indices.extend(mesh.indices.iter().map(|&i| base + i));
    }

    compute_tangents(&mut vertices, &indices);
    Ok(MeshData { vertices, indices })
}

fn compute_tangents(vertices: &mut [MeshVertex], indices: &[u32]) {
    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

        let e1 = sub3(v1.position, v0.position);
        let e2 = sub3(v2.position, v0.position);
        let du1 = v1.uv[0] - v0.uv[0];
        let dv1 = v1.uv[1] - v0.uv[1];
        let du2 = v2.uv[0] - v0.uv[0];
        let dv2 = v2.uv[1] - v0.uv[1];

        let det = du1 * dv2 - du2 * dv1;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = [
            (e1[0] * dv2 - e2[0] * dv1) * r,
            (e1[1] * dv2 - e2[1] * dv1) * r,
            (e1[2] * dv2 - e2[2] * dv1) * r,
        ];
        for &i in &[i0, i1, i2] {
            vertices[i].tangent = add3(vertices[i].tangent, tangent);
        }
    }
    for vertex in vertices.iter_mut() {
        let t = vertex.tangent;
        let len = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        vertex.tangent = if len > f32::EPSILON {
            [t[0] / len, t[1] / len, t[2] / len]
        } else {
            [1.0, 0.0, 0.0]
        };
    }
}

fn sub3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Decode a WAV source into interleaved 16-bit PCM.
fn encode_audio(path: &Path) -> Result<AudioData> {
    let mut reader = hound::WavReader::open(path).map_err(|e| source_err(path, e))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample as i32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if bits > 16 {
                            (v >> (bits - 16)) as i16
                        } else if bits < 16 {
                            (v << (16 - bits)) as i16
                        } else {
                            v as i16
                        }
                    })
                })
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| source_err(path, e))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| source_err(path, e))?,
    };

    let frame_count = samples.len() / spec.channels.max(1) as usize;
    Ok(AudioData {
        length_seconds: frame_count as f64 / spec.sample_rate as f64,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples: AudioSamples::Memory(samples),
    })
}
