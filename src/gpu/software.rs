use crate::foundation::core::{Affine, Float4, Int2};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::{
    Barrier, DeviceStats, Extend, Filter, GpuDevice, SamplerState, ShaderBindings, ShaderId,
    TextureFormat, TextureId, TextureSource, Uniform,
};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

const PENDING_FETCH: u8 = 1;
const PENDING_IMAGE: u8 = 2;
const PENDING_UPDATE: u8 = 4;
const PENDING_ALL: u8 = PENDING_FETCH | PENDING_IMAGE | PENDING_UPDATE;

/// Options for [`SoftwareDevice`].
#[derive(Clone, Debug)]
pub struct SoftwareDeviceOpts {
    /// Run texel-local kernels across rows in parallel (rayon).
    pub parallel: bool,
    /// Dedicated worker count. `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for SoftwareDeviceOpts {
    fn default() -> Self {
        let threads = std::env::var("COMPOSITOR_SOFTWARE_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0);
        Self {
            parallel: true,
            threads,
        }
    }
}

/// A compute kernel executed by [`SoftwareDevice`], one call per invocation.
pub trait ComputeKernel: Send + Sync {
    /// Work-group size.
    fn local_size(&self) -> Int2 {
        Int2::new(16, 16)
    }

    /// Kernels whose invocations read their own earlier image stores within a dispatch (in-place
    /// row or column sweeps) must run sequentially with immediately visible stores.
    fn sequential(&self) -> bool {
        false
    }

    /// Run one invocation.
    fn invoke(&self, inv: &mut Invocation<'_>);
}

#[derive(Clone, Debug)]
pub(crate) struct TextureStore {
    size: Int2,
    format: TextureFormat,
    texels: Vec<Float4>,
}

impl TextureStore {
    fn new(size: Int2, format: TextureFormat) -> Self {
        Self {
            size,
            format,
            texels: vec![format.normalize(Float4::ZERO); size.area()],
        }
    }

    fn index(&self, texel: Int2) -> Option<usize> {
        self.size
            .contains(texel)
            .then(|| texel.y as usize * self.size.x as usize + texel.x as usize)
    }

    fn load_clamped(&self, texel: Int2) -> Float4 {
        let clamped = Int2::new(
            texel.x.clamp(0, (self.size.x - 1).max(0)),
            texel.y.clamp(0, (self.size.y - 1).max(0)),
        );
        self.load_zero(clamped)
    }

    fn load_zero(&self, texel: Int2) -> Float4 {
        match self.index(texel) {
            Some(i) => self.texels[i],
            None => Float4::ZERO,
        }
    }

    fn store(&mut self, texel: Int2, value: Float4) {
        if let Some(i) = self.index(texel) {
            self.texels[i] = self.format.normalize(value);
        }
    }

    fn fetch(&self, texel: Int2, sampler: SamplerState) -> Float4 {
        match (
            resolve_coord(texel.x, self.size.x, sampler.extend_x),
            resolve_coord(texel.y, self.size.y, sampler.extend_y),
        ) {
            (Some(x), Some(y)) => self.load_zero(Int2::new(x, y)),
            _ => Float4::ZERO,
        }
    }

    fn sample(&self, uv: [f32; 2], sampler: SamplerState) -> Float4 {
        if self.size.is_empty() {
            return Float4::ZERO;
        }
        let px = uv[0] * self.size.x as f32;
        let py = uv[1] * self.size.y as f32;
        match sampler.filter {
            Filter::Nearest => self.fetch(
                Int2::new(px.floor() as i32, py.floor() as i32),
                sampler,
            ),
            Filter::Bilinear => {
                let fx = px - 0.5;
                let fy = py - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let (tx, ty) = (fx - x0, fy - y0);
                let (x0, y0) = (x0 as i32, y0 as i32);

                let a = self.fetch(Int2::new(x0, y0), sampler);
                let b = self.fetch(Int2::new(x0 + 1, y0), sampler);
                let c = self.fetch(Int2::new(x0, y0 + 1), sampler);
                let d = self.fetch(Int2::new(x0 + 1, y0 + 1), sampler);
                a.lerp(b, tx).lerp(c.lerp(d, tx), ty)
            }
        }
    }
}

fn resolve_coord(coord: i32, size: i32, extend: Extend) -> Option<i32> {
    if size <= 0 {
        return None;
    }
    match extend {
        Extend::ClampToEdge => Some(coord.clamp(0, size - 1)),
        Extend::ClampToBorder => (0..size).contains(&coord).then_some(coord),
        Extend::Repeat => Some(coord.rem_euclid(size)),
    }
}

struct BoundImage {
    name: &'static str,
    id: TextureId,
    store: TextureStore,
}

struct PendingStore {
    image: usize,
    texel: Int2,
    value: Float4,
}

enum Images<'a> {
    Direct(&'a mut [BoundImage]),
    Buffered {
        images: &'a [BoundImage],
        stores: &'a mut Vec<PendingStore>,
    },
}

impl Images<'_> {
    fn find(&self, name: &str) -> Option<&BoundImage> {
        let list: &[BoundImage] = match self {
            Images::Direct(list) => list,
            Images::Buffered { images, .. } => images,
        };
        list.iter().find(|img| img.name == name)
    }
}

enum TextureView<'a> {
    Store(&'a TextureStore, SamplerState),
    Constant(Float4),
    Unbound,
}

/// The state a kernel sees for one invocation: its id, uniforms, textures and images.
pub struct Invocation<'a> {
    global_id: Int2,
    bindings: &'a ShaderBindings,
    textures: &'a HashMap<TextureId, TextureStore>,
    images: Images<'a>,
}

impl<'a> Invocation<'a> {
    /// Global invocation id.
    pub fn global_id(&self) -> Int2 {
        self.global_id
    }

    /// Raw uniform by name.
    pub fn uniform(&self, name: &str) -> Option<Uniform> {
        self.bindings.uniform(name)
    }

    /// Float uniform, zero when unset.
    pub fn uniform_f32(&self, name: &str) -> f32 {
        match self.uniform(name) {
            Some(Uniform::Float(v)) => v,
            Some(Uniform::Int(v)) => v as f32,
            _ => 0.0,
        }
    }

    /// Integer uniform, zero when unset.
    pub fn uniform_i32(&self, name: &str) -> i32 {
        match self.uniform(name) {
            Some(Uniform::Int(v)) => v,
            Some(Uniform::Bool(v)) => i32::from(v),
            _ => 0,
        }
    }

    /// Boolean uniform, false when unset.
    pub fn uniform_bool(&self, name: &str) -> bool {
        match self.uniform(name) {
            Some(Uniform::Bool(v)) => v,
            Some(Uniform::Int(v)) => v != 0,
            _ => false,
        }
    }

    /// Integer vector uniform, zero when unset.
    pub fn uniform_int2(&self, name: &str) -> Int2 {
        match self.uniform(name) {
            Some(Uniform::Int2(v)) => v,
            _ => Int2::ZERO,
        }
    }

    /// `vec3` uniform, zero when unset.
    pub fn uniform_float3(&self, name: &str) -> [f32; 3] {
        match self.uniform(name) {
            Some(Uniform::Float3(v)) => v,
            Some(Uniform::Float4(v)) => v.xyz(),
            _ => [0.0; 3],
        }
    }

    /// `vec4` uniform, zero when unset.
    pub fn uniform_float4(&self, name: &str) -> Float4 {
        match self.uniform(name) {
            Some(Uniform::Float4(v)) => v,
            _ => Float4::ZERO,
        }
    }

    /// Affine uniform, identity when unset.
    pub fn uniform_affine(&self, name: &str) -> Affine {
        match self.uniform(name) {
            Some(Uniform::Affine(v)) => v,
            _ => Affine::IDENTITY,
        }
    }

    fn texture(&self, name: &str) -> TextureView<'a> {
        let Some(binding) = self.bindings.texture(name) else {
            return TextureView::Unbound;
        };
        match binding.source {
            TextureSource::Constant(v) => TextureView::Constant(v),
            TextureSource::Texture(id) => match self.textures.get(&id) {
                Some(store) => TextureView::Store(store, binding.sampler),
                None => TextureView::Unbound,
            },
        }
    }

    /// Size of a sampled texture; constants are 1x1.
    pub fn texture_size(&self, name: &str) -> Int2 {
        match self.texture(name) {
            TextureView::Store(store, _) => store.size,
            TextureView::Constant(_) => Int2::ONE,
            TextureView::Unbound => Int2::ZERO,
        }
    }

    /// Integer texel fetch clamped to the edge.
    pub fn texture_load(&self, name: &str, texel: Int2) -> Float4 {
        match self.texture(name) {
            TextureView::Store(store, _) => store.load_clamped(texel),
            TextureView::Constant(v) => v,
            TextureView::Unbound => Float4::ZERO,
        }
    }

    /// Integer texel fetch reading zero outside the texture.
    pub fn texture_load_zero(&self, name: &str, texel: Int2) -> Float4 {
        match self.texture(name) {
            TextureView::Store(store, _) => store.load_zero(texel),
            TextureView::Constant(v) => v,
            TextureView::Unbound => Float4::ZERO,
        }
    }

    /// Sample with normalized coordinates through the binding's sampler state.
    pub fn texture_sample(&self, name: &str, uv: [f32; 2]) -> Float4 {
        match self.texture(name) {
            TextureView::Store(store, sampler) => store.sample(uv, sampler),
            TextureView::Constant(v) => v,
            TextureView::Unbound => Float4::ZERO,
        }
    }

    /// Size of a bound image.
    pub fn image_size(&self, name: &str) -> Int2 {
        self.images
            .find(name)
            .map(|img| img.store.size)
            .unwrap_or(Int2::ZERO)
    }

    /// Image load; zero outside the image.
    pub fn image_load(&self, name: &str, texel: Int2) -> Float4 {
        self.images
            .find(name)
            .map(|img| img.store.load_zero(texel))
            .unwrap_or(Float4::ZERO)
    }

    /// Image store; stores outside the image are dropped.
    pub fn image_store(&mut self, name: &str, texel: Int2, value: Float4) {
        match &mut self.images {
            Images::Direct(list) => {
                if let Some(img) = list.iter_mut().find(|img| img.name == name) {
                    img.store.store(texel, value);
                }
            }
            Images::Buffered { images, stores } => {
                if let Some(image) = images.iter().position(|img| img.name == name)
                    && images[image].store.size.contains(texel)
                {
                    stores.push(PendingStore {
                        image,
                        texel,
                        value,
                    });
                }
            }
        }
    }
}

struct KernelEntry {
    name: &'static str,
    kernel: Box<dyn ComputeKernel>,
}

/// [`GpuDevice`] executing compute kernels on the CPU with GPU dispatch semantics.
///
/// Image stores of a dispatch are tracked until a matching [`Barrier`]; fetching, copying or
/// reading them back earlier is counted in [`DeviceStats::hazards`]. Image bindings are treated
/// as write targets and are not checked.
pub struct SoftwareDevice {
    opts: SoftwareDeviceOpts,
    textures: HashMap<TextureId, TextureStore>,
    next_texture: u32,
    kernels: Vec<KernelEntry>,
    kernel_ids: HashMap<&'static str, ShaderId>,
    pending: HashMap<TextureId, u8>,
    stats: DeviceStats,
    thread_pool: Option<rayon::ThreadPool>,
}

impl SoftwareDevice {
    /// Device with the built-in compositor kernels registered.
    pub fn new(opts: SoftwareDeviceOpts) -> CompositorResult<Self> {
        let mut device = Self::without_kernels(opts)?;
        crate::shaders::register_builtin_kernels(&mut device);
        Ok(device)
    }

    /// Device with no kernels; every shader lookup fails until kernels are registered.
    pub fn without_kernels(opts: SoftwareDeviceOpts) -> CompositorResult<Self> {
        let thread_pool = match (opts.parallel, opts.threads) {
            (true, Some(n)) => Some(build_thread_pool(n)?),
            _ => None,
        };
        Ok(Self {
            opts,
            textures: HashMap::new(),
            next_texture: 1,
            kernels: Vec::new(),
            kernel_ids: HashMap::new(),
            pending: HashMap::new(),
            stats: DeviceStats::default(),
            thread_pool,
        })
    }

    /// Register (or replace) a kernel under `name`.
    pub fn register_kernel(
        &mut self,
        name: &'static str,
        kernel: impl ComputeKernel + 'static,
    ) -> ShaderId {
        if let Some(&id) = self.kernel_ids.get(name) {
            self.kernels[id.0 as usize].kernel = Box::new(kernel);
            return id;
        }
        let id = ShaderId(self.kernels.len() as u32);
        self.kernels.push(KernelEntry {
            name,
            kernel: Box::new(kernel),
        });
        self.kernel_ids.insert(name, id);
        id
    }

    /// Names of all registered kernels.
    pub fn kernel_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kernels.iter().map(|k| k.name)
    }

    fn store(&self, texture: TextureId) -> CompositorResult<&TextureStore> {
        self.textures
            .get(&texture)
            .ok_or_else(|| CompositorError::gpu(format!("unknown texture {}", texture.0)))
    }

    fn store_mut(&mut self, texture: TextureId) -> CompositorResult<&mut TextureStore> {
        self.textures
            .get_mut(&texture)
            .ok_or_else(|| CompositorError::gpu(format!("unknown texture {}", texture.0)))
    }

    fn note_read(&mut self, texture: TextureId, required: u8, what: &'static str) {
        let pending = self.pending.get(&texture).copied().unwrap_or(0);
        if pending & required != 0 {
            self.stats.hazards = self.stats.hazards.saturating_add(1);
            tracing::warn!(
                texture = texture.0,
                access = what,
                "texture read before a memory barrier"
            );
        }
    }

    fn validate_bindings(&self, bindings: &ShaderBindings) -> CompositorResult<()> {
        for image in &bindings.images {
            self.store(image.texture)?;
        }
        bindings.check_aliasing()?;
        for binding in &bindings.textures {
            if let TextureSource::Texture(id) = binding.source {
                self.store(id)?;
            }
        }
        Ok(())
    }
}

fn build_thread_pool(threads: usize) -> CompositorResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| CompositorError::gpu(format!("failed to build rayon thread pool: {e}")))
}

impl GpuDevice for SoftwareDevice {
    fn create_texture(&mut self, size: Int2, format: TextureFormat) -> CompositorResult<TextureId> {
        if size.is_empty() {
            return Err(CompositorError::gpu(format!(
                "cannot create an empty {}x{} texture",
                size.x, size.y
            )));
        }
        let id = TextureId(self.next_texture);
        self.next_texture = self.next_texture.saturating_add(1);
        self.textures.insert(id, TextureStore::new(size, format));
        self.stats.textures_created = self.stats.textures_created.saturating_add(1);
        Ok(id)
    }

    fn free_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.pending.remove(&texture);
            self.stats.textures_freed = self.stats.textures_freed.saturating_add(1);
        }
    }

    fn texture_size(&self, texture: TextureId) -> Option<Int2> {
        self.textures.get(&texture).map(|s| s.size)
    }

    fn texture_format(&self, texture: TextureId) -> Option<TextureFormat> {
        self.textures.get(&texture).map(|s| s.format)
    }

    fn clear_texture(&mut self, texture: TextureId, value: Float4) -> CompositorResult<()> {
        let store = self.store_mut(texture)?;
        let value = store.format.normalize(value);
        store.texels.fill(value);
        Ok(())
    }

    fn copy_texture(&mut self, dst: TextureId, src: TextureId) -> CompositorResult<()> {
        self.note_read(src, PENDING_UPDATE, "copy");
        let texels = {
            let src_store = self.store(src)?;
            let dst_store = self.store(dst)?;
            if src_store.size != dst_store.size {
                return Err(CompositorError::gpu("copy between textures of different sizes"));
            }
            src_store.texels.clone()
        };
        let dst_store = self.store_mut(dst)?;
        let format = dst_store.format;
        dst_store.texels = texels.into_iter().map(|v| format.normalize(v)).collect();
        Ok(())
    }

    fn write_texture(&mut self, texture: TextureId, data: &[Float4]) -> CompositorResult<()> {
        let store = self.store_mut(texture)?;
        if data.len() != store.texels.len() {
            return Err(CompositorError::gpu(format!(
                "texture upload of {} texels into a texture of {}",
                data.len(),
                store.texels.len()
            )));
        }
        let format = store.format;
        for (dst, src) in store.texels.iter_mut().zip(data) {
            *dst = format.normalize(*src);
        }
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureId) -> CompositorResult<Vec<Float4>> {
        self.note_read(texture, PENDING_UPDATE, "readback");
        Ok(self.store(texture)?.texels.clone())
    }

    fn shader(&self, name: &str) -> Option<ShaderId> {
        self.kernel_ids.get(name).copied()
    }

    fn shader_local_size(&self, shader: ShaderId) -> Int2 {
        self.kernels
            .get(shader.0 as usize)
            .map(|k| k.kernel.local_size())
            .unwrap_or(Int2::ONE)
    }

    fn dispatch(
        &mut self,
        shader: ShaderId,
        bindings: &ShaderBindings,
        groups: Int2,
    ) -> CompositorResult<()> {
        let index = shader.0 as usize;
        let Some(entry) = self.kernels.get(index) else {
            return Err(CompositorError::gpu(format!("unknown shader {}", shader.0)));
        };
        let local = entry.kernel.local_size();
        let extent = Int2::new(groups.x.max(0) * local.x, groups.y.max(0) * local.y);

        self.validate_bindings(bindings)?;
        self.stats.dispatches = self.stats.dispatches.saturating_add(1);
        for binding in &bindings.textures {
            if let TextureSource::Texture(id) = binding.source {
                self.note_read(id, PENDING_FETCH, "texture fetch");
            }
        }
        if extent.is_empty() {
            return Ok(());
        }

        let mut images: SmallVec<[BoundImage; 2]> = SmallVec::new();
        for binding in &bindings.images {
            if let Some(store) = self.textures.remove(&binding.texture) {
                images.push(BoundImage {
                    name: binding.name,
                    id: binding.texture,
                    store,
                });
            }
        }

        let kernel = self.kernels[index].kernel.as_ref();
        let textures = &self.textures;
        if kernel.sequential() || !self.opts.parallel {
            for y in 0..extent.y {
                for x in 0..extent.x {
                    let mut inv = Invocation {
                        global_id: Int2::new(x, y),
                        bindings,
                        textures,
                        images: Images::Direct(&mut images[..]),
                    };
                    kernel.invoke(&mut inv);
                }
            }
        } else {
            let bound = &images[..];
            let run = || {
                (0..extent.y)
                    .into_par_iter()
                    .map(|y| {
                        let mut stores = Vec::new();
                        for x in 0..extent.x {
                            let mut inv = Invocation {
                                global_id: Int2::new(x, y),
                                bindings,
                                textures,
                                images: Images::Buffered {
                                    images: bound,
                                    stores: &mut stores,
                                },
                            };
                            kernel.invoke(&mut inv);
                        }
                        stores
                    })
                    .collect::<Vec<_>>()
            };
            let rows = match &self.thread_pool {
                Some(pool) => pool.install(run),
                None => run(),
            };
            for pending in rows.into_iter().flatten() {
                images[pending.image]
                    .store
                    .store(pending.texel, pending.value);
            }
        }

        for image in images {
            self.pending.insert(image.id, PENDING_ALL);
            self.textures.insert(image.id, image.store);
        }
        Ok(())
    }

    fn memory_barrier(&mut self, barrier: Barrier) {
        let cleared = match barrier {
            Barrier::TextureFetch => PENDING_FETCH,
            Barrier::ShaderImageAccess => PENDING_IMAGE,
            Barrier::TextureUpdate => PENDING_UPDATE,
            Barrier::All => PENDING_ALL,
        };
        self.pending.retain(|_, bits| {
            *bits &= !cleared;
            *bits != 0
        });
        self.stats.barriers = self.stats.barriers.saturating_add(1);
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            live_textures: self.textures.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/software.rs"]
mod tests;
