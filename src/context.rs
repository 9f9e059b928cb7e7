use crate::cache::{CacheManager, FalloffType, FilterType};
use crate::foundation::core::{Float4, Int2, IntRect};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::{
    Barrier, GpuDevice, ImageBinding, SamplerState, ShaderBindings, ShaderId, TextureBinding,
    TextureFormat, TextureId, TextureSource, Uniform,
};
use crate::host::CompositorHost;
use crate::result::{OpResult, ResultPrecision, ResultType};
use crate::texture_pool::{PooledTexture, TexturePool, TexturePoolOpts};

/// Context configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextOpts {
    /// Precision of results created through [`Context::create_result`].
    pub precision: ResultPrecision,
    /// Retention limits of the texture pool.
    pub texture_pool: TexturePoolOpts,
}

/// A shader with its bindings for one or more dispatches. Bindings live as long as the pass.
#[derive(Debug)]
pub struct ShaderPass {
    name: &'static str,
    shader: ShaderId,
    bindings: ShaderBindings,
}

impl ShaderPass {
    /// Shader name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Set a uniform.
    pub fn uniform(&mut self, name: &'static str, value: impl Into<Uniform>) -> &mut Self {
        self.bindings.set_uniform(name, value.into());
        self
    }

    /// Bind a sampled texture or constant.
    pub fn bind_texture(
        &mut self,
        name: &'static str,
        source: TextureSource,
        sampler: SamplerState,
    ) -> &mut Self {
        self.bindings.set_texture(TextureBinding {
            name,
            source,
            sampler,
        });
        self
    }

    /// Bind a device texture for nearest texel fetches.
    pub fn bind_texture_id(&mut self, name: &'static str, texture: TextureId) -> &mut Self {
        self.bind_texture(name, TextureSource::Texture(texture), SamplerState::nearest())
    }

    /// Bind a storage image.
    pub fn bind_image(&mut self, name: &'static str, texture: TextureId) -> &mut Self {
        self.bindings.set_image(ImageBinding { name, texture });
        self
    }

    /// Remove a sampled texture binding.
    pub fn unbind_texture(&mut self, name: &str) -> &mut Self {
        self.bindings.remove_texture(name);
        self
    }

    /// Remove an image binding.
    pub fn unbind_image(&mut self, name: &str) -> &mut Self {
        self.bindings.remove_image(name);
        self
    }

    /// Current bindings.
    pub fn bindings(&self) -> &ShaderBindings {
        &self.bindings
    }
}

/// Everything an operation reaches while executing: the device, the texture pool, the cache
/// manager and the host.
pub struct Context {
    gpu: Box<dyn GpuDevice>,
    host: Box<dyn CompositorHost>,
    texture_pool: TexturePool,
    cache_manager: CacheManager,
    opts: ContextOpts,
    info_message: Option<String>,
}

impl Context {
    /// Context over `gpu` and `host`.
    pub fn new(gpu: Box<dyn GpuDevice>, host: Box<dyn CompositorHost>, opts: ContextOpts) -> Self {
        Self {
            gpu,
            host,
            texture_pool: TexturePool::new(opts.texture_pool),
            cache_manager: CacheManager::new(),
            opts,
            info_message: None,
        }
    }

    /// The device.
    pub fn gpu(&self) -> &dyn GpuDevice {
        self.gpu.as_ref()
    }

    /// The device, mutably.
    pub fn gpu_mut(&mut self) -> &mut dyn GpuDevice {
        self.gpu.as_mut()
    }

    /// The host.
    pub fn host(&self) -> &dyn CompositorHost {
        self.host.as_ref()
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut dyn CompositorHost {
        self.host.as_mut()
    }

    /// The texture pool.
    pub fn texture_pool(&self) -> &TexturePool {
        &self.texture_pool
    }

    /// The cache manager.
    pub fn cache_manager(&self) -> &CacheManager {
        &self.cache_manager
    }

    /// Result precision.
    pub fn precision(&self) -> ResultPrecision {
        self.opts.precision
    }

    /// Unallocated result of `ty` at the context precision.
    pub fn create_result(&self, ty: ResultType) -> OpResult {
        OpResult::new(ty, self.opts.precision)
    }

    /// Pooled texture for a temporary.
    pub fn acquire_texture(
        &mut self,
        size: Int2,
        format: TextureFormat,
    ) -> CompositorResult<PooledTexture> {
        self.texture_pool.acquire(self.gpu.as_mut(), size, format)
    }

    /// Free textures the pool holds for reuse.
    pub fn free_unused_textures(&mut self) {
        self.texture_pool.free_unused(self.gpu.as_mut());
    }

    /// Look a shader up by name.
    pub fn get_shader(&self, name: &'static str) -> CompositorResult<ShaderPass> {
        let shader = self
            .gpu
            .shader(name)
            .ok_or_else(|| CompositorError::missing_shader(name))?;
        Ok(ShaderPass {
            name,
            shader,
            bindings: ShaderBindings::default(),
        })
    }

    /// Dispatch enough work groups of `pass` to cover `threads` invocations.
    pub fn dispatch_threads_at_least(
        &mut self,
        pass: &ShaderPass,
        threads: Int2,
    ) -> CompositorResult<()> {
        let local = self.gpu.shader_local_size(pass.shader);
        self.dispatch_groups(pass, threads.div_ceil(local))
    }

    /// Dispatch exactly `groups` work groups of `pass`.
    pub fn dispatch_groups(&mut self, pass: &ShaderPass, groups: Int2) -> CompositorResult<()> {
        if groups.is_empty() {
            return Ok(());
        }
        self.gpu.dispatch(pass.shader, &pass.bindings, groups)
    }

    /// Issue a memory barrier.
    pub fn memory_barrier(&mut self, barrier: Barrier) {
        self.gpu.memory_barrier(barrier);
    }

    /// Read texels back after making earlier image stores visible to readback.
    pub fn read_texture(&mut self, texture: TextureId) -> CompositorResult<Vec<Float4>> {
        self.gpu.memory_barrier(Barrier::TextureUpdate);
        self.gpu.read_texture(texture)
    }

    /// Read the host output texture back.
    pub fn read_output(&mut self) -> CompositorResult<Vec<Float4>> {
        let texture = self.host.output_texture();
        self.read_texture(texture)
    }

    /// Area of the output texture composited into.
    pub fn compositing_region(&self) -> IntRect {
        self.host.compositing_region()
    }

    /// Size of [`Context::compositing_region`].
    pub fn compositing_region_size(&self) -> Int2 {
        self.host.compositing_region().size()
    }

    /// Render resolution.
    pub fn render_size(&self) -> Int2 {
        self.host.render_size()
    }

    /// Host output texture.
    pub fn output_texture(&self) -> TextureId {
        self.host.output_texture()
    }

    /// Host render pass texture.
    pub fn input_texture(&self, view_layer: &str, pass_name: &str) -> Option<TextureId> {
        self.host.input_texture(view_layer, pass_name)
    }

    /// Active view.
    pub fn view_name(&self) -> &str {
        self.host.view_name()
    }

    /// Evaluated scene.
    pub fn scene_name(&self) -> &str {
        self.host.scene_name()
    }

    /// Current frame.
    pub fn frame_number(&self) -> i32 {
        self.host.frame_number()
    }

    /// Luminance weights of the working color space.
    pub fn luminance_coefficients(&self) -> [f32; 3] {
        self.host.luminance_coefficients()
    }

    /// Report a message to the host and remember it until the next evaluation.
    pub fn set_info_message(&mut self, message: &str) {
        tracing::warn!(message, "compositor info message");
        self.host.set_info_message(message);
        self.info_message = Some(message.to_owned());
    }

    /// Message set during the last evaluation.
    pub fn info_message(&self) -> Option<&str> {
        self.info_message.as_deref()
    }

    pub(crate) fn clear_info_message(&mut self) {
        self.info_message = None;
    }

    /// Sweep cached resources the previous evaluation did not use.
    pub fn reset_cache(&mut self) {
        self.cache_manager.reset(self.gpu.as_mut());
    }

    /// Weights texture of a symmetric separable blur.
    pub fn symmetric_blur_weights(
        &mut self,
        filter: FilterType,
        radius: f32,
    ) -> CompositorResult<TextureId> {
        Ok(self
            .cache_manager
            .symmetric_blur_weights(self.gpu.as_mut(), filter, radius)?
            .texture())
    }

    /// Weights texture of the feather morphological mode.
    pub fn morphological_distance_feather_weights(
        &mut self,
        radius: i32,
    ) -> CompositorResult<TextureId> {
        Ok(self
            .cache_manager
            .morphological_distance_feather_weights(self.gpu.as_mut(), radius)?
            .texture())
    }

    /// Falloffs texture of the feather morphological mode.
    pub fn distance_falloffs(
        &mut self,
        falloff: FalloffType,
        radius: i32,
    ) -> CompositorResult<TextureId> {
        Ok(self
            .cache_manager
            .distance_falloffs(self.gpu.as_mut(), falloff, radius)?
            .texture())
    }

    /// `(area, search)` textures of SMAA.
    pub fn smaa_precomputed_textures(&mut self) -> CompositorResult<(TextureId, TextureId)> {
        let textures = self
            .cache_manager
            .smaa_precomputed_textures(self.gpu.as_mut())?;
        Ok((textures.area_texture(), textures.search_texture()))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.cache_manager.free_all(self.gpu.as_mut());
        self.texture_pool.free_unused(self.gpu.as_mut());
    }
}
