//! Long-lived derived resources keyed by their parameters.
//!
//! Every container is mark-and-sweep: a lookup marks its entry needed, and
//! [`CacheManager::reset`] at the start of each evaluation evicts what the previous
//! evaluation did not touch before clearing the marks of the survivors.

use crate::foundation::error::CompositorResult;
use crate::gpu::{GpuDevice, TextureId};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::hash::Hash;

pub(crate) mod smaa;
pub(crate) mod weights;

pub use smaa::SmaaPrecomputedTextures;
pub use weights::{
    DistanceFalloffs, FalloffType, FilterType, MorphologicalDistanceFeatherWeights,
    SymmetricBlurWeights,
};

/// A cached resource owning device textures.
pub(crate) trait CachedResource {
    fn textures(&self) -> SmallVec<[TextureId; 2]>;
}

impl CachedResource for SymmetricBlurWeights {
    fn textures(&self) -> SmallVec<[TextureId; 2]> {
        smallvec::smallvec![self.texture()]
    }
}

impl CachedResource for MorphologicalDistanceFeatherWeights {
    fn textures(&self) -> SmallVec<[TextureId; 2]> {
        smallvec::smallvec![self.texture()]
    }
}

impl CachedResource for DistanceFalloffs {
    fn textures(&self) -> SmallVec<[TextureId; 2]> {
        smallvec::smallvec![self.texture()]
    }
}

impl CachedResource for SmaaPrecomputedTextures {
    fn textures(&self) -> SmallVec<[TextureId; 2]> {
        smallvec::smallvec![self.area_texture(), self.search_texture()]
    }
}

struct CacheEntry<R> {
    resource: R,
    needed: bool,
}

pub(crate) struct CachedResourceContainer<K, R> {
    entries: HashMap<K, CacheEntry<R>>,
}

impl<K, R> Default for CachedResourceContainer<K, R> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy + std::fmt::Debug, R: CachedResource> CachedResourceContainer<K, R> {
    /// Evict entries not needed since the last reset, then clear the marks of the rest.
    pub(crate) fn reset(&mut self, gpu: &mut dyn GpuDevice) -> usize {
        let mut evicted = 0usize;
        self.entries.retain(|key, entry| {
            if entry.needed {
                entry.needed = false;
                return true;
            }
            for texture in entry.resource.textures() {
                gpu.free_texture(texture);
            }
            tracing::debug!(key = ?key, "cached resource evicted");
            evicted += 1;
            false
        });
        evicted
    }

    pub(crate) fn get_or_try_insert_with(
        &mut self,
        key: K,
        create: impl FnOnce() -> CompositorResult<R>,
    ) -> CompositorResult<&R> {
        use std::collections::hash_map::Entry;
        let entry = match self.entries.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let resource = create()?;
                tracing::debug!(key = ?key, "cached resource created");
                v.insert(CacheEntry {
                    resource,
                    needed: true,
                })
            }
        };
        entry.needed = true;
        Ok(&entry.resource)
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn free_all(&mut self, gpu: &mut dyn GpuDevice) {
        for (_, entry) in self.entries.drain() {
            for texture in entry.resource.textures() {
                gpu.free_texture(texture);
            }
        }
    }
}

/// Key of [`SymmetricBlurWeights`]. The radius is compared bitwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymmetricBlurWeightsKey {
    /// Filter shape.
    pub filter: FilterType,
    radius_bits: u32,
}

impl SymmetricBlurWeightsKey {
    /// Key for `filter` at `radius`.
    pub fn new(filter: FilterType, radius: f32) -> Self {
        Self {
            filter,
            radius_bits: radius.max(0.0).to_bits(),
        }
    }

    /// Radius the weights were computed for.
    pub fn radius(&self) -> f32 {
        f32::from_bits(self.radius_bits)
    }
}

/// Key of [`MorphologicalDistanceFeatherWeights`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MorphologicalDistanceFeatherWeightsKey {
    /// Kernel radius in pixels.
    pub radius: i32,
}

/// Key of [`DistanceFalloffs`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DistanceFalloffsKey {
    /// Falloff curve.
    pub falloff: FalloffType,
    /// Radius in pixels.
    pub radius: i32,
}

/// Owner of every cached resource of a [`crate::Context`].
#[derive(Default)]
pub struct CacheManager {
    symmetric_blur_weights: CachedResourceContainer<SymmetricBlurWeightsKey, SymmetricBlurWeights>,
    morphological_distance_feather_weights: CachedResourceContainer<
        MorphologicalDistanceFeatherWeightsKey,
        MorphologicalDistanceFeatherWeights,
    >,
    distance_falloffs: CachedResourceContainer<DistanceFalloffsKey, DistanceFalloffs>,
    smaa_precomputed_textures: CachedResourceContainer<(), SmaaPrecomputedTextures>,
}

impl CacheManager {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep resources the previous evaluation did not use. Called once per evaluation,
    /// before any lookup.
    pub fn reset(&mut self, gpu: &mut dyn GpuDevice) {
        let evicted = self.symmetric_blur_weights.reset(gpu)
            + self.morphological_distance_feather_weights.reset(gpu)
            + self.distance_falloffs.reset(gpu)
            + self.smaa_precomputed_textures.reset(gpu);
        if evicted > 0 {
            tracing::debug!(evicted, "cache manager swept");
        }
    }

    /// Normalized half-kernel for a symmetric separable blur.
    pub fn symmetric_blur_weights(
        &mut self,
        gpu: &mut dyn GpuDevice,
        filter: FilterType,
        radius: f32,
    ) -> CompositorResult<&SymmetricBlurWeights> {
        let key = SymmetricBlurWeightsKey::new(filter, radius);
        self.symmetric_blur_weights
            .get_or_try_insert_with(key, || SymmetricBlurWeights::new(gpu, filter, key.radius()))
    }

    /// Gaussian half-kernel for the feather morphological mode.
    pub fn morphological_distance_feather_weights(
        &mut self,
        gpu: &mut dyn GpuDevice,
        radius: i32,
    ) -> CompositorResult<&MorphologicalDistanceFeatherWeights> {
        let key = MorphologicalDistanceFeatherWeightsKey { radius };
        self.morphological_distance_feather_weights
            .get_or_try_insert_with(key, || MorphologicalDistanceFeatherWeights::new(gpu, radius))
    }

    /// Falloff curve sampled at `0..=radius`.
    pub fn distance_falloffs(
        &mut self,
        gpu: &mut dyn GpuDevice,
        falloff: FalloffType,
        radius: i32,
    ) -> CompositorResult<&DistanceFalloffs> {
        let key = DistanceFalloffsKey { falloff, radius };
        self.distance_falloffs
            .get_or_try_insert_with(key, || DistanceFalloffs::new(gpu, falloff, radius))
    }

    /// SMAA area and search textures.
    pub fn smaa_precomputed_textures(
        &mut self,
        gpu: &mut dyn GpuDevice,
    ) -> CompositorResult<&SmaaPrecomputedTextures> {
        self.smaa_precomputed_textures
            .get_or_try_insert_with((), || SmaaPrecomputedTextures::new(gpu))
    }

    /// Number of cached entries across all kinds.
    pub fn len(&self) -> usize {
        self.symmetric_blur_weights.len()
            + self.morphological_distance_feather_weights.len()
            + self.distance_falloffs.len()
            + self.smaa_precomputed_textures.len()
    }

    /// Return `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `true` when weights for `key` are cached.
    pub fn contains_symmetric_blur_weights(&self, key: &SymmetricBlurWeightsKey) -> bool {
        self.symmetric_blur_weights.contains(key)
    }

    /// Free every cached texture.
    pub fn free_all(&mut self, gpu: &mut dyn GpuDevice) {
        self.symmetric_blur_weights.free_all(gpu);
        self.morphological_distance_feather_weights.free_all(gpu);
        self.distance_falloffs.free_all(gpu);
        self.smaa_precomputed_textures.free_all(gpu);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache.rs"]
mod tests;
