//! Decoded geometry caching.

use crate::types::FeatureId;
use geo_types::Geometry;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Capability interface for caching decoded geometries by feature id.
///
/// Implementations must tolerate concurrent `set` calls for the same id.
/// The engine only stores geometries decoded from the same blob, so a
/// last-write-wins race is harmless. Entries are never evicted by the engine.
pub trait GeometryCache: Send + Sync {
    fn get(&self, fid: FeatureId) -> Option<Arc<Geometry<f64>>>;
    fn set(&self, fid: FeatureId, geometry: Arc<Geometry<f64>>);
}

/// Unbounded in-memory cache.
///
/// Memory grows with the number of distinct features resolved; wrap or
/// replace it if the process is long-lived and the dataset is large.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<FxHashMap<FeatureId, Arc<Geometry<f64>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl GeometryCache for MemoryCache {
    fn get(&self, fid: FeatureId) -> Option<Arc<Geometry<f64>>> {
        self.entries.read().get(&fid).cloned()
    }

    fn set(&self, fid: FeatureId, geometry: Arc<Geometry<f64>>) {
        self.entries.write().insert(fid, geometry);
    }
}
