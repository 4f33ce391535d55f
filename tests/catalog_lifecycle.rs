//! End-to-end catalog behavior over a real built archive: loader dispatch,
//! reference lifecycle, sweep eviction, and the audio streaming policy.

use pandora_box::{
    loader, AudioData, AudioSamples, BinaryData, BoxBuilder, CacheStore, MeshData,
    ResourceCatalog, ResourceType, ShaderBackend, ShaderData, ShaderSourcePair, TextureData,
    TextureFiltering, TextureWrapping, NO_HASH,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct World {
    dir: TempDir,
}

impl World {
    fn new() -> Self {
        World {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cache_store(&self) -> CacheStore {
        CacheStore::new(self.path("cache"))
    }

    /// Build a small archive with one resource of each renderer-facing type
    /// plus a long and a short audio clip.
    fn build_archive(&self) -> PathBuf {
        let png = self.path("tiles.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]))
            .save(&png)
            .unwrap();

        let obj = self.path("quad.obj");
        fs::write(
            &obj,
            b"v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1/1 2/2/1 3/3/1\n",
        )
        .unwrap();

        let vert = self.path("s.vert");
        let frag = self.path("s.frag");
        fs::write(&vert, b"void main() {}").unwrap();
        fs::write(&frag, b"void main() {}").unwrap();

        let blob = self.path("data.bin");
        fs::write(&blob, b"opaque blob").unwrap();

        // 1 second at 8 kHz stays in memory; 12 seconds streams.
        let short_wav = self.write_wav("short.wav", 8000);
        let long_wav = self.write_wav("long.wav", 8000 * 12);

        let out = self.path("game.box");
        let mut builder = BoxBuilder::new();
        builder
            .stage_texture("Tiles", &png, TextureFiltering::Point, TextureWrapping::Clamp, true)
            .unwrap();
        builder
            .stage_shader(
                "Flat",
                vec![ShaderSourcePair {
                    backend: ShaderBackend::OpenGl,
                    vertex: vert,
                    pixel: frag,
                }],
                true,
            )
            .unwrap();
        builder.stage_mesh("Quad", &obj, true).unwrap();
        builder.stage_binary("Save", &blob, true).unwrap();
        builder.stage_audio("Blip", &short_wav, true).unwrap();
        builder.stage_audio("Music", &long_wav, true).unwrap();
        builder.build(&out).unwrap();
        out
    }

    fn write_wav(&self, name: &str, frames: u32) -> PathBuf {
        let path = self.path(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample((i % 128) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn open_catalog(&self) -> ResourceCatalog {
        let mut catalog = ResourceCatalog::new();
        loader::register_default_handlers(&mut catalog, self.cache_store());
        catalog.load(self.build_archive()).unwrap();
        catalog
    }
}

#[test]
fn every_type_loads_through_dispatch() {
    let world = World::new();
    let mut catalog = world.open_catalog();

    assert!(catalog.get::<TextureData>("Tiles").is_some());
    assert!(catalog.get::<ShaderData>("Flat").is_some());
    assert!(catalog.get::<MeshData>("Quad").is_some());
    assert!(catalog.get::<BinaryData>("Save").is_some());
    assert!(catalog.get::<AudioData>("Blip").is_some());
    assert_eq!(catalog.pooled(), 5);
}

#[test]
fn repeated_get_returns_same_object() {
    let world = World::new();
    let mut catalog = world.open_catalog();

    let first = catalog.get::<TextureData>("Tiles").unwrap();
    let second = catalog.get::<TextureData>("Tiles").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.content_hash(), second.content_hash());
}

#[test]
fn wrong_type_for_name_is_recoverable() {
    let world = World::new();
    let mut catalog = world.open_catalog();

    // "Tiles" is a Texture; asking for a mesh logs and returns None.
    assert!(catalog.get::<MeshData>("Tiles").is_none());
    // The catalog stays usable.
    assert!(catalog.get::<TextureData>("Tiles").is_some());
}

#[test]
fn sweep_only_evicts_unreferenced() {
    let world = World::new();
    let mut catalog = world.open_catalog();

    let held = catalog.get::<TextureData>("Tiles").unwrap();
    let _mesh = catalog.get::<MeshData>("Quad"); // dropped immediately
    drop(_mesh);

    assert_eq!(catalog.sweep(), 1);
    assert_eq!(catalog.pooled(), 1);

    drop(held);
    assert_eq!(catalog.sweep(), 1);
    assert_eq!(catalog.pooled(), 0);

    // Evicted resources reload on demand.
    assert!(catalog.get::<TextureData>("Tiles").is_some());
}

#[test]
fn delete_then_external_release_then_sweep() {
    let world = World::new();
    let mut catalog = world.open_catalog();

    let held = catalog.get::<BinaryData>("Save").unwrap();
    catalog.delete_resource(ResourceType::Binary, "Save", false);

    // Still alive through the external handle; resurrection hands back the
    // same object.
    let revived = catalog.get::<BinaryData>("Save").unwrap();
    assert!(Arc::ptr_eq(&held, &revived));

    drop(held);
    drop(revived);
    assert_eq!(catalog.sweep(), 1);
}

#[test]
fn short_audio_stays_in_memory() {
    let world = World::new();
    let mut catalog = world.open_catalog();

    let blip = catalog.get::<AudioData>("Blip").unwrap();
    assert!(matches!(blip.samples, AudioSamples::Memory(_)));
    assert!(blip.length_seconds < 2.0);
}

#[test]
fn long_audio_streams_through_cache_store() {
    let world = World::new();
    let mut catalog = world.open_catalog();

    let music = catalog.get::<AudioData>("Music").unwrap();
    let AudioSamples::Streamed { path, hash } = &music.samples else {
        panic!("long clip should stream");
    };
    assert!(path.is_file());
    assert_ne!(*hash, NO_HASH);

    // The cache pair validates against the clip's content hash.
    let store = world.cache_store();
    assert!(store.contains("Music", *hash));
    assert!(store.contains("Music", NO_HASH));
    assert!(!store.contains("Music", hash.wrapping_add(1)));

    // The materialized payload is the raw PCM: frames * 2 bytes.
    assert_eq!(
        fs::metadata(path).unwrap().len(),
        (8000 * 12) as u64 * 2
    );
}

#[test]
fn cached_stream_survives_catalog_restart() {
    let world = World::new();
    let archive_path = {
        let mut catalog = world.open_catalog();
        let music = catalog.get::<AudioData>("Music").unwrap();
        assert!(matches!(music.samples, AudioSamples::Streamed { .. }));
        world.path("game.box")
    };

    // A second catalog over the same archive and cache dir reuses the entry
    // instead of re-materializing it.
    let mtime_before = fs::metadata(world.path("cache/Music")).unwrap().modified().unwrap();
    let mut catalog = ResourceCatalog::new();
    loader::register_default_handlers(&mut catalog, world.cache_store());
    catalog.load(&archive_path).unwrap();
    let music = catalog.get::<AudioData>("Music").unwrap();
    assert!(matches!(music.samples, AudioSamples::Streamed { .. }));
    let mtime_after = fs::metadata(world.path("cache/Music")).unwrap().modified().unwrap();
    assert_eq!(mtime_before, mtime_after);
}
