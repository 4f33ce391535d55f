//! Box Asset Archive & Resource Catalog
//!
//! The asset subsystem of the Pandora engine: a content-addressable,
//! lazily-loaded, reference-counted resource cache backed by the Box binary
//! archive format, with on-demand DEFLATE decompression, cache invalidation
//! via content hashing, and type-specific loader dispatch.
//!
//! ## Components
//!
//! - [`format`] - Box wire format: magic, version, header table, type tags
//! - [`archive`] - [`BoxArchive`]: file-backed or config-backed reader
//! - [`builder`] - [`BoxBuilder`]: design-time archive assembly from source
//!   assets, two-pass write with offset backpatching
//! - [`manifest`] - JSON manifest for the builder's config mode
//! - [`codec`] - per-type payload encodings and the decoded resource types
//! - [`compression`] - raw DEFLATE entry compression
//! - [`cache`] - [`CacheStore`]: on-disk side cache for streamed resources
//! - [`hash`] - 64-bit xxh3 content hashing
//! - [`catalog`] - [`ResourceCatalog`]: the `(type, name)` registry of live,
//!   reference-counted resources
//! - [`loader`] - archive-backed typed loaders and handler registration
//!
//! ## Example
//!
//! ```rust,no_run
//! use pandora_box::{
//!     loader, BoxBuilder, CacheStore, ResourceCatalog, TextureData,
//!     TextureFiltering, TextureWrapping,
//! };
//!
//! // Design time: build an archive.
//! let mut builder = BoxBuilder::new();
//! builder.stage_texture(
//!     "Tiles", "assets/tiles.png",
//!     TextureFiltering::Bilinear, TextureWrapping::Repeat,
//!     true,
//! )?;
//! builder.build("game.box")?;
//!
//! // Runtime: open the archive behind a catalog and fetch resources.
//! let mut catalog = ResourceCatalog::new();
//! loader::register_default_handlers(&mut catalog, CacheStore::new("cache"));
//! catalog.load("game.box")?;
//!
//! if let Some(tiles) = catalog.get::<TextureData>("Tiles") {
//!     println!("{}x{}", tiles.width, tiles.height);
//! }
//!
//! // Periodically reclaim resources nothing references anymore.
//! let evicted = catalog.sweep();
//! println!("evicted {evicted}");
//! # Ok::<(), pandora_box::BoxError>(())
//! ```
//!
//! ## Failure model
//!
//! Bad input is never fatal: corrupt archives, unsupported versions,
//! encrypted archives (recognized but unimplemented - loading fails
//! closed), missing entries, and decode failures all surface as
//! [`BoxError`] values or logged `None` results from the catalog. The
//! render and audio loops are expected to tolerate absent resources.

pub mod archive;
pub mod builder;
pub mod cache;
pub mod catalog;
pub mod codec;
pub mod compression;
pub mod error;
pub mod format;
pub mod hash;
pub mod loader;
pub mod manifest;

// Re-export commonly used types
pub use archive::BoxArchive;
pub use builder::{BoxBuilder, ShaderSourcePair, StagedEntry, StagedSource};
pub use cache::CacheStore;
pub use catalog::{AnyResource, RequestHandler, Resource, ResourceCatalog};
pub use codec::{
    AudioData, AudioSamples, BinaryData, FontData, MeshData, MeshVertex, ShaderData, ShaderStage,
    TextureData,
};
pub use error::{BoxError, Result};
pub use format::{
    ResourceType, ShaderBackend, TextureFiltering, TextureWrapping, MAGIC, SUPPORTED_VERSION,
};
pub use hash::{content_hash, NO_HASH};
pub use manifest::{ArchiveManifest, ManifestItem, ShaderSourceEntry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
