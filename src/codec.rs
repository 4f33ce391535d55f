//! Per-type payload encodings and decoded resource types
//!
//! Every archive entry's payload (after the size fields) follows one of the
//! layouts below. The same encoders serve the builder's file pass and the
//! reader's config mode, so a config-backed archive synthesizes bytes that
//! are identical to what a built file would contain.
//!
//! Layouts (little-endian):
//! - Binary / Font: raw file bytes, verbatim.
//! - Texture: `[1] filtering, [1] wrapping, [4] width i32, [4] height i32,
//!   [w*h*4] RGBA8 pixels (bottom-up)`.
//! - Shader: `[1] backend_count`, then per backend `[1] backend_id,
//!   [4] vertex_size, vertex bytes, [4] pixel_size, pixel bytes`.
//! - Mesh: `[4] vertex_count, [4] index_count, vertices (44 bytes each),
//!   u32 indices`.
//! - Audio: `[8] length_seconds f64, [4] sample_rate u32, [2] channels u16,
//!   [4] sample_count u32, interleaved i16 PCM (sample_count * channels)`.

use crate::error::{BoxError, Result};
use crate::format::{
    read_u16, read_u32, read_u64, read_u8, ShaderBackend, TextureFiltering, TextureWrapping,
};
use crate::hash::{content_hash, content_hash_parts};
use bytemuck::{Pod, Zeroable};
use std::path::PathBuf;

fn decode_err(name: &str, reason: impl Into<String>) -> BoxError {
    BoxError::Decode {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Decoded texture: packed RGBA8 pixels, bottom-up row order, plus the
/// sampling state baked into the archive entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub filtering: TextureFiltering,
    pub wrapping: TextureWrapping,
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.pixels.len());
        out.push(self.filtering as u8);
        out.push(self.wrapping as u8);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.pixels);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = bytes;
        let filtering = TextureFiltering::from_u8(read_u8(&mut r, "texture filtering")?)
            .ok_or_else(|| decode_err("texture", "invalid filtering byte"))?;
        let wrapping = TextureWrapping::from_u8(read_u8(&mut r, "texture wrapping")?)
            .ok_or_else(|| decode_err("texture", "invalid wrapping byte"))?;
        let width = read_u32(&mut r, "texture width")? as i32;
        let height = read_u32(&mut r, "texture height")? as i32;
        if width < 0 || height < 0 {
            return Err(decode_err("texture", "negative dimensions"));
        }
        let expected = width as usize * height as usize * 4;
        if r.len() != expected {
            return Err(decode_err(
                "texture",
                format!("expected {} pixel bytes, got {}", expected, r.len()),
            ));
        }
        Ok(TextureData {
            filtering,
            wrapping,
            width,
            height,
            pixels: r.to_vec(),
        })
    }

    pub fn content_hash(&self) -> u64 {
        content_hash(&self.pixels)
    }
}

/// One per-backend stage pair of a shader program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStage {
    pub backend: ShaderBackend,
    pub vertex: Vec<u8>,
    pub pixel: Vec<u8>,
}

/// Decoded shader: vertex + pixel sources (or bytecode) per video backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderData {
    pub stages: Vec<ShaderStage>,
}

impl ShaderData {
    /// Find the stage pair for a backend, if the archive carried one.
    pub fn stage_for(&self, backend: ShaderBackend) -> Option<&ShaderStage> {
        self.stages.iter().find(|s| s.backend == backend)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.stages.len() as u8);
        for stage in &self.stages {
            out.push(stage.backend as u8);
            out.extend_from_slice(&(stage.vertex.len() as u32).to_le_bytes());
            out.extend_from_slice(&stage.vertex);
            out.extend_from_slice(&(stage.pixel.len() as u32).to_le_bytes());
            out.extend_from_slice(&stage.pixel);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = bytes;
        let count = read_u8(&mut r, "shader backend count")?;
        let mut stages = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let backend = ShaderBackend::from_u8(read_u8(&mut r, "shader backend id")?)
                .ok_or_else(|| decode_err("shader", "invalid backend id"))?;
            let vertex = read_sized(&mut r, "shader vertex stage")?;
            let pixel = read_sized(&mut r, "shader pixel stage")?;
            stages.push(ShaderStage {
                backend,
                vertex,
                pixel,
            });
        }
        Ok(ShaderData { stages })
    }

    pub fn content_hash(&self) -> u64 {
        let parts: Vec<&[u8]> = self
            .stages
            .iter()
            .flat_map(|s| [s.vertex.as_slice(), s.pixel.as_slice()])
            .collect();
        content_hash_parts(&parts)
    }
}

fn read_sized(r: &mut &[u8], what: &'static str) -> Result<Vec<u8>> {
    let len = read_u32(r, what)? as usize;
    if r.len() < len {
        return Err(BoxError::Truncated(what));
    }
    let (head, tail) = r.split_at(len);
    *r = tail;
    Ok(head.to_vec())
}

/// Interleaved vertex layout shared by the archive format and the mesh
/// loaders. 44 bytes, no padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
}

/// Decoded mesh: vertex and index buffers ready for GPU upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn encode(&self) -> Vec<u8> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);
        let mut out = Vec::with_capacity(8 + vertex_bytes.len() + index_bytes.len());
        out.extend_from_slice(&(self.vertices.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.indices.len() as u32).to_le_bytes());
        out.extend_from_slice(vertex_bytes);
        out.extend_from_slice(index_bytes);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = bytes;
        let vertex_count = read_u32(&mut r, "mesh vertex count")? as usize;
        let index_count = read_u32(&mut r, "mesh index count")? as usize;

        let vertex_len = vertex_count * std::mem::size_of::<MeshVertex>();
        let index_len = index_count * 4;
        if r.len() != vertex_len + index_len {
            return Err(decode_err(
                "mesh",
                format!(
                    "expected {} payload bytes, got {}",
                    vertex_len + index_len,
                    r.len()
                ),
            ));
        }

        let (vertex_bytes, index_bytes) = r.split_at(vertex_len);
        let vertices = vertex_bytes
            .chunks_exact(std::mem::size_of::<MeshVertex>())
            .map(bytemuck::pod_read_unaligned::<MeshVertex>)
            .collect();
        let indices = index_bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(MeshData { vertices, indices })
    }

    pub fn content_hash(&self) -> u64 {
        content_hash_parts(&[
            bytemuck::cast_slice(&self.vertices),
            bytemuck::cast_slice(&self.indices),
        ])
    }
}

/// Where an audio clip's PCM lives after loading.
///
/// Short clips decode fully into memory; long clips are materialized into
/// the on-disk cache store and streamed from there.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSamples {
    /// Interleaved i16 PCM, fully resident.
    Memory(Vec<i16>),
    /// Raw interleaved i16 PCM materialized in the cache store.
    ///
    /// `hash` is the content hash of the PCM payload, kept so the resource
    /// still reports an identity without re-reading the file.
    Streamed { path: PathBuf, hash: u64 },
}

/// Decoded audio clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub length_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: AudioSamples,
}

impl AudioData {
    /// Interleaved samples, if resident in memory.
    pub fn samples_in_memory(&self) -> Option<&[i16]> {
        match &self.samples {
            AudioSamples::Memory(s) => Some(s),
            AudioSamples::Streamed { .. } => None,
        }
    }

    /// Frames per channel.
    pub fn frame_count(&self) -> u32 {
        (self.length_seconds * self.sample_rate as f64).round() as u32
    }

    /// Split interleaved samples into planar per-channel buffers.
    ///
    /// Some audio backends want planar left/right instead of the archive's
    /// interleaved layout. Returns `None` for streamed clips.
    pub fn deinterleave(&self) -> Option<Vec<Vec<i16>>> {
        let samples = self.samples_in_memory()?;
        let channels = self.channels.max(1) as usize;
        let mut planes = vec![Vec::with_capacity(samples.len() / channels); channels];
        for frame in samples.chunks_exact(channels) {
            for (plane, &sample) in planes.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }
        Some(planes)
    }

    /// Encode into the archive payload layout.
    ///
    /// Only in-memory clips can be encoded; a streamed clip's PCM lives in
    /// the cache store, which is never a source of truth.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let samples = self
            .samples_in_memory()
            .ok_or(BoxError::Unsupported("cannot encode streamed audio"))?;
        let frame_count = samples.len() / self.channels.max(1) as usize;
        let mut out = Vec::with_capacity(18 + samples.len() * 2);
        out.extend_from_slice(&self.length_seconds.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&(frame_count as u32).to_le_bytes());
        out.extend_from_slice(bytemuck::cast_slice(samples));
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = bytes;
        let length_seconds = f64::from_bits(read_u64(&mut r, "audio length")?);
        let sample_rate = read_u32(&mut r, "audio sample rate")?;
        let channels = read_u16(&mut r, "audio channels")?;
        let frame_count = read_u32(&mut r, "audio sample count")? as usize;

        let expected = frame_count * channels as usize * 2;
        if r.len() != expected {
            return Err(decode_err(
                "audio",
                format!("expected {} sample bytes, got {}", expected, r.len()),
            ));
        }
        let samples = r
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(AudioData {
            length_seconds,
            sample_rate,
            channels,
            samples: AudioSamples::Memory(samples),
        })
    }

    pub fn content_hash(&self) -> u64 {
        match &self.samples {
            AudioSamples::Memory(s) => content_hash(bytemuck::cast_slice(s)),
            AudioSamples::Streamed { hash, .. } => *hash,
        }
    }
}

/// Font face bytes, stored verbatim (rasterization is the renderer's job).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontData {
    pub bytes: Vec<u8>,
}

impl FontData {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(FontData {
            bytes: bytes.to_vec(),
        })
    }

    pub fn content_hash(&self) -> u64 {
        content_hash(&self.bytes)
    }
}

/// Raw binary blob, stored verbatim; consumers self-decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryData {
    pub bytes: Vec<u8>,
}

impl BinaryData {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(BinaryData {
            bytes: bytes.to_vec(),
        })
    }

    pub fn content_hash(&self) -> u64 {
        content_hash(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_tile() -> TextureData {
        TextureData {
            filtering: TextureFiltering::Bilinear,
            wrapping: TextureWrapping::Repeat,
            width: 4,
            height: 4,
            pixels: [255u8, 0, 0, 255].repeat(16),
        }
    }

    #[test]
    fn test_texture_encode_layout() {
        let encoded = red_tile().encode();
        // filtering, wrapping, width, height, then 64 pixel bytes
        assert_eq!(&encoded[..10], &[1, 1, 4, 0, 0, 0, 4, 0, 0, 0]);
        assert_eq!(encoded.len(), 10 + 64);
        assert!(encoded[10..].chunks(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn test_texture_round_trip() {
        let tex = red_tile();
        let decoded = TextureData::decode(&tex.encode()).unwrap();
        assert_eq!(decoded, tex);
    }

    #[test]
    fn test_texture_bad_pixel_length() {
        let mut encoded = red_tile().encode();
        encoded.pop();
        assert!(matches!(
            TextureData::decode(&encoded),
            Err(BoxError::Decode { .. })
        ));
    }

    #[test]
    fn test_texture_invalid_filtering() {
        let mut encoded = red_tile().encode();
        encoded[0] = 9;
        assert!(TextureData::decode(&encoded).is_err());
    }

    #[test]
    fn test_shader_round_trip() {
        let shader = ShaderData {
            stages: vec![
                ShaderStage {
                    backend: ShaderBackend::OpenGl,
                    vertex: b"#version 330 core\nvoid main() {}".to_vec(),
                    pixel: b"#version 330 core\nout vec4 c;".to_vec(),
                },
                ShaderStage {
                    backend: ShaderBackend::DirectX,
                    vertex: b"float4 VSMain()".to_vec(),
                    pixel: b"float4 PSMain()".to_vec(),
                },
            ],
        };
        let decoded = ShaderData::decode(&shader.encode()).unwrap();
        assert_eq!(decoded, shader);
        assert!(decoded.stage_for(ShaderBackend::DirectX).is_some());
    }

    #[test]
    fn test_mesh_round_trip() {
        let mesh = MeshData {
            vertices: vec![
                MeshVertex {
                    position: [0.0, 0.0, 0.0],
                    normal: [0.0, 1.0, 0.0],
                    uv: [0.0, 0.0],
                    tangent: [1.0, 0.0, 0.0],
                },
                MeshVertex {
                    position: [1.0, 0.0, 0.0],
                    normal: [0.0, 1.0, 0.0],
                    uv: [1.0, 0.0],
                    tangent: [1.0, 0.0, 0.0],
                },
                MeshVertex {
                    position: [0.0, 0.0, 1.0],
                    normal: [0.0, 1.0, 0.0],
                    uv: [0.0, 1.0],
                    tangent: [1.0, 0.0, 0.0],
                },
            ],
            indices: vec![0, 1, 2],
        };
        let encoded = mesh.encode();
        assert_eq!(encoded.len(), 8 + 3 * 44 + 3 * 4);
        let decoded = MeshData::decode(&encoded).unwrap();
        assert_eq!(decoded, mesh);
    }

    #[test]
    fn test_mesh_vertex_size() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 44);
    }

    #[test]
    fn test_audio_round_trip() {
        let audio = AudioData {
            length_seconds: 0.5,
            sample_rate: 8,
            channels: 2,
            samples: AudioSamples::Memory(vec![1, -1, 2, -2, 3, -3, 4, -4]),
        };
        let encoded = audio.encode().unwrap();
        // 4 frames of 2 channels
        assert_eq!(encoded.len(), 18 + 8 * 2);
        let decoded = AudioData::decode(&encoded).unwrap();
        assert_eq!(decoded, audio);
    }

    #[test]
    fn test_audio_deinterleave() {
        let audio = AudioData {
            length_seconds: 0.0,
            sample_rate: 44100,
            channels: 2,
            samples: AudioSamples::Memory(vec![1, 10, 2, 20, 3, 30]),
        };
        let planes = audio.deinterleave().unwrap();
        assert_eq!(planes, vec![vec![1, 2, 3], vec![10, 20, 30]]);
    }

    #[test]
    fn test_streamed_audio_cannot_encode() {
        let audio = AudioData {
            length_seconds: 60.0,
            sample_rate: 44100,
            channels: 2,
            samples: AudioSamples::Streamed {
                path: PathBuf::from("/tmp/clip"),
                hash: 42,
            },
        };
        assert!(matches!(
            audio.encode(),
            Err(BoxError::Unsupported(_))
        ));
        assert_eq!(audio.content_hash(), 42);
    }

    #[test]
    fn test_idempotent_decode() {
        let encoded = red_tile().encode();
        let first = TextureData::decode(&encoded).unwrap();
        let second = TextureData::decode(&encoded).unwrap();
        assert_eq!(first, second);
    }
}
