use crate::foundation::core::Int2;
use crate::foundation::error::CompositorResult;
use crate::gpu::{GpuDevice, TextureFormat, TextureId};
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

/// Retention limits for released textures.
#[derive(Debug, Clone, Copy)]
pub struct TexturePoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained textures per `(size, format)` bucket.
    pub max_textures_per_bucket: usize,
}

impl Default for TexturePoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 512 * 1024 * 1024,
            max_textures_per_bucket: 16,
        }
    }
}

/// Pool counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TexturePoolStats {
    /// Textures currently waiting in buckets for reuse.
    pub retained_textures: usize,
    /// Bytes held by retained textures.
    pub retained_bytes: usize,
    /// Device allocations performed by `acquire`.
    pub allocated_textures: u64,
    /// Acquires served from a bucket.
    pub reused_textures: u64,
    /// Releases that exceeded the retention limits; those textures are freed on the next sweep.
    pub dropped_on_release: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    size: Int2,
    format: TextureFormat,
}

impl TextureKey {
    fn byte_len(self) -> usize {
        self.format.byte_len(self.size)
    }
}

#[derive(Debug, Default)]
struct PoolState {
    opts: TexturePoolOpts,
    stats: TexturePoolStats,
    buckets: HashMap<TextureKey, Vec<TextureId>>,
    pending_free: Vec<TextureId>,
}

impl PoolState {
    fn take(&mut self, key: TextureKey) -> Option<TextureId> {
        let id = self.buckets.get_mut(&key)?.pop()?;
        self.stats.retained_textures = self.stats.retained_textures.saturating_sub(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
        Some(id)
    }

    fn put_back(&mut self, id: TextureId, key: TextureKey) {
        let bytes = key.byte_len();
        let over_bytes = self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes;
        let bucket = self.buckets.entry(key).or_default();
        if over_bytes || bucket.len() >= self.opts.max_textures_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            self.pending_free.push(id);
            return;
        }
        bucket.push(id);
        self.stats.retained_textures = self.stats.retained_textures.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}

#[derive(Debug, Default)]
struct PoolShared {
    state: RefCell<PoolState>,
    /// Handles dropped while `state` was borrowed; merged back on the next pool call.
    deferred: RefCell<Vec<(TextureId, TextureKey)>>,
}

impl PoolShared {
    fn state(&self) -> RefMut<'_, PoolState> {
        let mut st = self.state.borrow_mut();
        for (id, key) in self.deferred.take() {
            st.put_back(id, key);
        }
        st
    }
}

/// Recycles device textures by `(size, format)` across operations of one evaluation and across
/// evaluations.
///
/// Releasing never frees device memory by itself: textures beyond the retention limits are
/// queued and freed by the next call that holds the device, and [`TexturePool::free_unused`] is
/// the frame-boundary sweep. Single-threaded by construction.
#[derive(Clone, Default)]
pub struct TexturePool {
    shared: Rc<PoolShared>,
}

impl TexturePool {
    /// Create an empty pool.
    pub fn new(opts: TexturePoolOpts) -> Self {
        Self {
            shared: Rc::new(PoolShared {
                state: RefCell::new(PoolState {
                    opts,
                    ..PoolState::default()
                }),
                deferred: RefCell::default(),
            }),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> TexturePoolStats {
        self.shared.state().stats
    }

    /// Reuse a released texture of the same size and format, or allocate one.
    ///
    /// The returned handle gives the texture back to this pool when dropped.
    pub fn acquire(
        &self,
        gpu: &mut dyn GpuDevice,
        size: Int2,
        format: TextureFormat,
    ) -> CompositorResult<PooledTexture> {
        self.flush_pending(gpu);
        let key = TextureKey { size, format };
        let reused = self.shared.state().take(key);
        let id = match reused {
            Some(id) => {
                let mut st = self.shared.state();
                st.stats.reused_textures = st.stats.reused_textures.saturating_add(1);
                id
            }
            None => {
                let id = gpu.create_texture(size, format)?;
                let mut st = self.shared.state();
                st.stats.allocated_textures = st.stats.allocated_textures.saturating_add(1);
                tracing::debug!(
                    texture = id.0,
                    w = size.x,
                    h = size.y,
                    format = ?format,
                    "texture pool allocation"
                );
                id
            }
        };
        Ok(PooledTexture {
            id,
            key,
            pool: Rc::clone(&self.shared),
        })
    }

    /// Give a texture back. Equivalent to dropping the handle.
    pub fn release(&self, texture: PooledTexture) {
        drop(texture);
    }

    /// Free every retained texture and every queued over-limit texture.
    pub fn free_unused(&self, gpu: &mut dyn GpuDevice) {
        self.flush_pending(gpu);
        let mut st = self.shared.state();
        let mut freed = 0usize;
        for (_, ids) in st.buckets.drain() {
            for id in ids {
                gpu.free_texture(id);
                freed += 1;
            }
        }
        st.stats.retained_textures = 0;
        st.stats.retained_bytes = 0;
        if freed > 0 {
            tracing::debug!(freed, "texture pool swept");
        }
    }

    fn flush_pending(&self, gpu: &mut dyn GpuDevice) {
        let pending = std::mem::take(&mut self.shared.state().pending_free);
        for id in pending {
            gpu.free_texture(id);
        }
    }
}

/// Move-only handle to a pooled texture. Dropping it returns the texture to its pool.
#[derive(Debug)]
pub struct PooledTexture {
    id: TextureId,
    key: TextureKey,
    pool: Rc<PoolShared>,
}

impl PooledTexture {
    /// Device texture id.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Texture size.
    pub fn size(&self) -> Int2 {
        self.key.size
    }

    /// Texture format.
    pub fn format(&self) -> TextureFormat {
        self.key.format
    }
}

impl Drop for PooledTexture {
    fn drop(&mut self) {
        match self.pool.state.try_borrow_mut() {
            Ok(mut st) => st.put_back(self.id, self.key),
            Err(_) => match self.pool.deferred.try_borrow_mut() {
                Ok(mut deferred) => {
                    tracing::debug!(texture = self.id.0, "pool busy, deferring texture return");
                    deferred.push((self.id, self.key));
                }
                Err(_) => tracing::warn!(texture = self.id.0, "pool busy, texture leaked"),
            },
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/texture_pool.rs"]
mod tests;
