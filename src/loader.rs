//! Archive-backed typed resource loaders
//!
//! One decode path per resource type: check the entry exists, accept the
//! exact type or a generic Binary payload (raw bytes the type self-decodes),
//! fetch the entry data, decode through [`crate::codec`]. Failures are
//! recoverable; the catalog turns them into an absent resource, never a
//! crash.
//!
//! Registration mirrors the subsystem split of the engine: the video
//! backend registers texture/shader/mesh/font, the audio backend registers
//! audio (with its cache store), and the catalog registers binary itself.

use crate::archive::BoxArchive;
use crate::cache::CacheStore;
use crate::catalog::{AnyResource, RequestHandler, ResourceCatalog};
use crate::codec::{
    AudioData, AudioSamples, BinaryData, FontData, MeshData, ShaderData, TextureData,
};
use crate::error::{BoxError, Result};
use crate::format::ResourceType;
use crate::hash::content_hash;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Clips longer than this are materialized into the cache store and
/// streamed instead of held in memory.
pub const AUDIO_STREAM_THRESHOLD_SECS: f64 = 10.0;

fn entry_data(archive: &BoxArchive, name: &str, expected: ResourceType) -> Result<Vec<u8>> {
    if !archive.has_resource(name) {
        return Err(BoxError::MissingResource(name.to_string()));
    }
    let found = archive.resource_type(name);
    // A Binary entry is raw bytes; any loader may self-decode it.
    if found != expected && found != ResourceType::Binary {
        return Err(BoxError::TypeMismatch {
            name: name.to_string(),
            expected,
            found,
        });
    }
    archive.resource_data(name)
}

pub fn load_texture(archive: &BoxArchive, name: &str) -> Result<TextureData> {
    TextureData::decode(&entry_data(archive, name, ResourceType::Texture)?)
}

pub fn load_shader(archive: &BoxArchive, name: &str) -> Result<ShaderData> {
    ShaderData::decode(&entry_data(archive, name, ResourceType::Shader)?)
}

pub fn load_mesh(archive: &BoxArchive, name: &str) -> Result<MeshData> {
    MeshData::decode(&entry_data(archive, name, ResourceType::Mesh)?)
}

pub fn load_font(archive: &BoxArchive, name: &str) -> Result<FontData> {
    FontData::decode(&entry_data(archive, name, ResourceType::Font)?)
}

pub fn load_binary(archive: &BoxArchive, name: &str) -> Result<BinaryData> {
    BinaryData::decode(&entry_data(archive, name, ResourceType::Binary)?)
}

/// Load an audio clip, applying the streaming policy.
///
/// Short clips decode fully into memory. Long clips are materialized into
/// the cache store (validated by the content hash of their PCM payload) and
/// returned as [`AudioSamples::Streamed`]; a valid cache entry from a
/// previous run skips the PCM re-materialization entirely. Without a cache
/// store every clip stays in memory.
pub fn load_audio(
    archive: &BoxArchive,
    name: &str,
    store: Option<&CacheStore>,
) -> Result<AudioData> {
    let bytes = entry_data(archive, name, ResourceType::Audio)?;
    let audio = AudioData::decode(&bytes)?;

    let Some(store) = store else {
        return Ok(audio);
    };
    if audio.length_seconds <= AUDIO_STREAM_THRESHOLD_SECS {
        return Ok(audio);
    }

    // Freshly decoded audio is always in memory.
    let AudioSamples::Memory(samples) = &audio.samples else {
        return Ok(audio);
    };
    let pcm: &[u8] = bytemuck::cast_slice(samples);
    let hash = content_hash(pcm);

    if !store.contains(name, hash) {
        if let Err(e) = materialize(store, name, hash, pcm) {
            // The cache is an optimization layer; a clip it cannot hold
            // (unwritable dir, path-shaped name) stays in memory.
            warn!(name, "cache materialization failed, keeping clip in memory: {e}");
            return Ok(audio);
        }
        debug!(name, bytes = pcm.len(), "audio materialized into cache store");
    }
    match store.payload_path_if_valid(name, hash) {
        Some(path) => Ok(AudioData {
            samples: AudioSamples::Streamed { path, hash },
            ..audio
        }),
        None => {
            // Cache write failed under us; keep the clip in memory rather
            // than fail the load.
            warn!(name, "cache entry invalid after materialization; keeping in memory");
            Ok(audio)
        }
    }
}

fn materialize(store: &CacheStore, name: &str, hash: u64, pcm: &[u8]) -> Result<()> {
    let mut file = store.create(name, hash)?;
    file.write_all(pcm)?;
    file.sync_all()?;
    Ok(())
}

fn handler<T, F>(load: F) -> RequestHandler
where
    T: crate::catalog::Resource,
    F: Fn(&BoxArchive, &str) -> Result<T> + 'static,
{
    Box::new(move |archive, name| match load(archive, name) {
        Ok(data) => Some(Arc::new(data) as Arc<AnyResource>),
        Err(e) => {
            error!(target: "resource", name, "load failed: {e}");
            None
        }
    })
}

/// Register the handlers a video backend owns: texture, shader, mesh, font.
pub fn register_video_handlers(catalog: &mut ResourceCatalog) {
    catalog.set_request_handler(ResourceType::Texture, handler(load_texture));
    catalog.set_request_handler(ResourceType::Shader, handler(load_shader));
    catalog.set_request_handler(ResourceType::Mesh, handler(load_mesh));
    catalog.set_request_handler(ResourceType::Font, handler(load_font));
}

/// Register the audio handler with its cache store.
pub fn register_audio_handler(catalog: &mut ResourceCatalog, store: CacheStore) {
    catalog.set_request_handler(
        ResourceType::Audio,
        handler(move |archive, name| load_audio(archive, name, Some(&store))),
    );
}

/// Register every handler at once; convenience for tools and tests that do
/// not split registration across subsystems.
pub fn register_default_handlers(catalog: &mut ResourceCatalog, store: CacheStore) {
    register_video_handlers(catalog);
    register_audio_handler(catalog, store);
}
