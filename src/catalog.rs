//! Resource catalog
//!
//! The central registry mapping `(type, name)` to live decoded resources.
//! The catalog owns one archive (file-backed or config-backed), a pool of
//! reference-counted resource slots, and a dispatch table of per-type
//! request handlers registered by the owning subsystems.
//!
//! Lookup semantics: a pool hit hands out another strong reference to the
//! existing object (a slot the catalog only holds weakly is promoted back
//! to strong, "resurrection"); a miss invokes the registered handler and
//! memoizes the result before returning. Handler failures are recoverable
//! and memoized too: the caller gets `None`, a failed slot is recorded so
//! repeated requests do not re-decode, and the render/audio loop carries on
//! with the resource absent. `sweep` collects failed slots, so a failure
//! can be retried after the next sweep.
//!
//! The catalog is an explicitly constructed object, threaded by reference
//! into whatever needs it; "one per process" is the owning application's
//! choice, not a hidden global.
//!
//! Single-threaded contract: `get` guarantees at-most-once decode per miss
//! only under single-threaded use. Resource loads are expected to happen in
//! controlled loading phases, not concurrently.

use crate::archive::BoxArchive;
use crate::codec::{AudioData, BinaryData, FontData, MeshData, ShaderData, TextureData};
use crate::error::Result;
use crate::format::ResourceType;
use ahash::AHashMap;
use std::any::Any;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// A decoded in-memory asset that the catalog can pool.
pub trait Resource: Send + Sync + 'static {
    /// The archive type tag this resource decodes from.
    const TYPE: ResourceType;

    /// Content hash of the decoded payload; identity for caching purposes.
    fn content_hash(&self) -> u64;
}

impl Resource for TextureData {
    const TYPE: ResourceType = ResourceType::Texture;
    fn content_hash(&self) -> u64 {
        TextureData::content_hash(self)
    }
}

impl Resource for ShaderData {
    const TYPE: ResourceType = ResourceType::Shader;
    fn content_hash(&self) -> u64 {
        ShaderData::content_hash(self)
    }
}

impl Resource for MeshData {
    const TYPE: ResourceType = ResourceType::Mesh;
    fn content_hash(&self) -> u64 {
        MeshData::content_hash(self)
    }
}

impl Resource for AudioData {
    const TYPE: ResourceType = ResourceType::Audio;
    fn content_hash(&self) -> u64 {
        AudioData::content_hash(self)
    }
}

impl Resource for FontData {
    const TYPE: ResourceType = ResourceType::Font;
    fn content_hash(&self) -> u64 {
        FontData::content_hash(self)
    }
}

impl Resource for BinaryData {
    const TYPE: ResourceType = ResourceType::Binary;
    fn content_hash(&self) -> u64 {
        BinaryData::content_hash(self)
    }
}

/// Type-erased pooled resource object.
pub type AnyResource = dyn Any + Send + Sync;

/// Decode callback for one resource type.
///
/// Returns `None` on failure (missing entry, corrupt payload); the catalog
/// logs and passes the miss through without crashing.
pub type RequestHandler = Box<dyn Fn(&BoxArchive, &str) -> Option<Arc<AnyResource>>>;

enum PoolSlot {
    Live {
        /// The catalog's own hold. `None` after a non-forced delete demoted
        /// the slot to weak-only.
        strong: Option<Arc<AnyResource>>,
        weak: Weak<AnyResource>,
    },
    /// The handler returned nothing for this name; kept so repeated
    /// requests answer from the pool instead of re-dispatching the loader.
    Failed,
}

/// Central registry of live, reference-counted decoded resources.
pub struct ResourceCatalog {
    archive: Option<BoxArchive>,
    pool: AHashMap<(ResourceType, String), PoolSlot>,
    handlers: AHashMap<ResourceType, RequestHandler>,
}

impl ResourceCatalog {
    /// Create an unopened catalog.
    ///
    /// The catalog registers the Binary handler itself; texture/shader/
    /// mesh/font and audio handlers are registered by the video and audio
    /// subsystems (see [`crate::loader`]).
    pub fn new() -> Self {
        let mut catalog = ResourceCatalog {
            archive: None,
            pool: AHashMap::new(),
            handlers: AHashMap::new(),
        };
        catalog.set_request_handler(
            ResourceType::Binary,
            Box::new(|archive, name| {
                match crate::loader::load_binary(archive, name) {
                    Ok(data) => Some(Arc::new(data) as Arc<AnyResource>),
                    Err(e) => {
                        error!(target: "resource", name, "binary load failed: {e}");
                        None
                    }
                }
            }),
        );
        catalog
    }

    /// Bind a file-backed archive.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.archive = Some(BoxArchive::load(path)?);
        Ok(())
    }

    /// Bind a config-backed archive (design time).
    pub fn load_from_config(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.archive = Some(BoxArchive::load_from_config(path)?);
        Ok(())
    }

    /// Bind an already-open archive.
    ///
    /// Rebinding while resources from a previous archive are still live is
    /// the caller's responsibility; existing pool entries are not touched.
    pub fn bind(&mut self, archive: BoxArchive) {
        self.archive = Some(archive);
    }

    pub fn archive(&self) -> Option<&BoxArchive> {
        self.archive.as_ref()
    }

    /// Register the decode callback for a resource type, replacing any
    /// previous registration.
    pub fn set_request_handler(&mut self, ty: ResourceType, handler: RequestHandler) {
        self.handlers.insert(ty, handler);
    }

    /// Number of live pool entries (any reference state).
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Fetch a resource by name, loading it on first request.
    ///
    /// Returns `None` when the archive is unbound, no handler is registered
    /// for the type, or the handler fails to decode; all are logged,
    /// recoverable conditions. A handler failure is memoized as a failed
    /// slot, so polling a broken resource does not re-decode it every frame;
    /// the slot clears on the next [`sweep`](Self::sweep).
    pub fn get<T: Resource>(&mut self, name: &str) -> Option<Arc<T>> {
        let key = (T::TYPE, name.to_string());

        match self.pool.get_mut(&key) {
            Some(PoolSlot::Failed) => return None,
            Some(PoolSlot::Live { strong, weak }) => {
                if let Some(strong) = strong {
                    return downcast::<T>(strong.clone(), name);
                }
                // Weak-only slot: resurrect if the object is still alive.
                if let Some(revived) = weak.upgrade() {
                    *strong = Some(revived.clone());
                    debug!(target: "resource", name, ty = T::TYPE.as_str(), "resurrected");
                    return downcast::<T>(revived, name);
                }
                // Object died while only weakly held; treat as a miss.
                self.pool.remove(&key);
            }
            None => {}
        }

        let Some(archive) = &self.archive else {
            error!(target: "resource", name, "catalog has no archive bound");
            return None;
        };
        let Some(handler) = self.handlers.get(&T::TYPE) else {
            error!(
                target: "resource",
                name,
                ty = T::TYPE.as_str(),
                "no request handler registered"
            );
            return None;
        };

        match handler(archive, name) {
            Some(loaded) => {
                self.pool.insert(
                    key,
                    PoolSlot::Live {
                        strong: Some(loaded.clone()),
                        weak: Arc::downgrade(&loaded),
                    },
                );
                downcast::<T>(loaded, name)
            }
            None => {
                self.pool.insert(key, PoolSlot::Failed);
                None
            }
        }
    }

    /// Drop the catalog's own hold on a resource.
    ///
    /// With `force` the slot is removed outright, destroying the object even
    /// if external references remain (caller asserts safety). Otherwise the
    /// hold is demoted to weak: the object survives exactly as long as
    /// external strong references do, and can be resurrected by a later
    /// `get`.
    pub fn delete_resource(&mut self, ty: ResourceType, name: &str, force: bool) {
        let key = (ty, name.to_string());
        if force {
            self.pool.remove(&key);
            return;
        }
        if let Some(PoolSlot::Live { strong, .. }) = self.pool.get_mut(&key) {
            *strong = None;
        }
    }

    /// Evict every pool entry no external system references anymore.
    ///
    /// An entry is evictable when the catalog's own hold is its only strong
    /// reference; weak-only slots whose object has died and failed slots are
    /// collected too. Returns the number of entries removed. Intended to run
    /// periodically (per frame or on a timer).
    pub fn sweep(&mut self) -> usize {
        let before = self.pool.len();
        self.pool.retain(|(ty, name), slot| match slot {
            PoolSlot::Live {
                strong: Some(strong),
                ..
            } => {
                if Arc::strong_count(strong) == 1 {
                    debug!(target: "resource", name = %name, ty = ty.as_str(), "swept");
                    false
                } else {
                    true
                }
            }
            PoolSlot::Live { strong: None, weak } => weak.strong_count() > 0,
            PoolSlot::Failed => false,
        });
        before - self.pool.len()
    }
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResourceCatalog {
    fn drop(&mut self) {
        self.sweep();
        #[cfg(debug_assertions)]
        for ((ty, name), slot) in &self.pool {
            if let PoolSlot::Live {
                strong: Some(strong),
                ..
            } = slot
            {
                tracing::warn!(
                    target: "resource",
                    name = %name,
                    ty = ty.as_str(),
                    refs = Arc::strong_count(strong) - 1,
                    "resource leaked: external strong references at catalog teardown"
                );
            }
        }
    }
}

fn downcast<T: Resource>(arc: Arc<AnyResource>, name: &str) -> Option<Arc<T>> {
    match arc.downcast::<T>() {
        Ok(typed) => Some(typed),
        Err(_) => {
            // A handler returned an object of the wrong concrete type; this
            // is a registration bug, not bad data.
            debug_assert!(false, "request handler returned wrong type for {name}");
            error!(target: "resource", name, "request handler returned wrong type");
            None
        }
    }
}
