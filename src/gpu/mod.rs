//! The GPU collaborator seam.
//!
//! Everything the compositor needs from a GPU goes through [`GpuDevice`]: texture storage,
//! named compute shaders, dispatch and memory barriers. [`software::SoftwareDevice`] executes
//! the built-in kernels headless; with the `gpu` feature, `hardware::WgpuDevice` runs the same
//! kernels as WGSL compute shaders.

use crate::foundation::core::{Affine, Float4, Int2};
use crate::foundation::error::{CompositorError, CompositorResult};
use smallvec::SmallVec;

/// Software implementation of [`GpuDevice`].
pub mod software;

/// `wgpu` implementation of [`GpuDevice`].
#[cfg(feature = "gpu")]
pub mod hardware;

/// Opaque handle to a device texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

/// Opaque handle to a compiled compute shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(pub(crate) u32);

/// Texel formats used by compositor results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// One half-float channel.
    R16F,
    /// One float channel.
    R32F,
    /// Four half-float channels.
    Rgba16F,
    /// Four float channels.
    Rgba32F,
}

impl TextureFormat {
    /// Number of channels stored per texel.
    pub fn channels(self) -> usize {
        match self {
            Self::R16F | Self::R32F => 1,
            Self::Rgba16F | Self::Rgba32F => 4,
        }
    }

    /// Bytes occupied by one texel.
    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::R16F => 2,
            Self::R32F => 4,
            Self::Rgba16F => 8,
            Self::Rgba32F => 16,
        }
    }

    /// Bytes occupied by a texture of this format.
    pub fn byte_len(self, size: Int2) -> usize {
        size.area().saturating_mul(self.bytes_per_texel())
    }

    /// What a texel written as `value` reads back as.
    pub fn normalize(self, value: Float4) -> Float4 {
        match self.channels() {
            1 => Float4::new(value[0], 0.0, 0.0, 1.0),
            _ => value,
        }
    }
}

/// Texture filtering used when sampling with normalized coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Bilinear blend of the four nearest texels.
    Bilinear,
}

/// Addressing of texels outside the texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Extend {
    /// Repeat the edge texel.
    #[default]
    ClampToEdge,
    /// Read transparent zero.
    ClampToBorder,
    /// Wrap around.
    Repeat,
}

/// Sampler state attached to a texture binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplerState {
    /// Filtering mode.
    pub filter: Filter,
    /// Horizontal addressing.
    pub extend_x: Extend,
    /// Vertical addressing.
    pub extend_y: Extend,
}

impl SamplerState {
    /// Nearest filtering, clamped to the edge.
    pub const fn nearest() -> Self {
        Self {
            filter: Filter::Nearest,
            extend_x: Extend::ClampToEdge,
            extend_y: Extend::ClampToEdge,
        }
    }

    /// Bilinear filtering, clamped to the edge.
    pub const fn bilinear() -> Self {
        Self {
            filter: Filter::Bilinear,
            extend_x: Extend::ClampToEdge,
            extend_y: Extend::ClampToEdge,
        }
    }

    /// Same filter, new addressing on both axes.
    pub const fn with_extend(self, extend_x: Extend, extend_y: Extend) -> Self {
        Self {
            filter: self.filter,
            extend_x,
            extend_y,
        }
    }
}

/// Memory barrier kinds, mirroring what a compute API distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Barrier {
    /// Image stores become visible to texture fetches.
    TextureFetch,
    /// Image stores become visible to image loads.
    ShaderImageAccess,
    /// Image stores become visible to copies and readbacks.
    TextureUpdate,
    /// All of the above.
    All,
}

/// Shader uniform values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uniform {
    /// `float`
    Float(f32),
    /// `int`
    Int(i32),
    /// `bool`
    Bool(bool),
    /// `ivec2`
    Int2(Int2),
    /// `vec3`
    Float3([f32; 3]),
    /// `vec4`
    Float4(Float4),
    /// 2D affine transform (`mat3` on real hardware).
    Affine(Affine),
}

impl From<f32> for Uniform {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for Uniform {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Uniform {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Int2> for Uniform {
    fn from(v: Int2) -> Self {
        Self::Int2(v)
    }
}

impl From<[f32; 3]> for Uniform {
    fn from(v: [f32; 3]) -> Self {
        Self::Float3(v)
    }
}

impl From<Float4> for Uniform {
    fn from(v: Float4) -> Self {
        Self::Float4(v)
    }
}

impl From<Affine> for Uniform {
    fn from(v: Affine) -> Self {
        Self::Affine(v)
    }
}

/// What a sampled-texture binding reads from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureSource {
    /// A device texture.
    Texture(TextureId),
    /// A broadcast constant with a 1x1 extent; how single-value results are bound.
    Constant(Float4),
}

/// A named sampled-texture binding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureBinding {
    /// Binding name in the shader.
    pub name: &'static str,
    /// Bound source.
    pub source: TextureSource,
    /// Sampler state.
    pub sampler: SamplerState,
}

/// A named storage-image binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageBinding {
    /// Binding name in the shader.
    pub name: &'static str,
    /// Bound texture.
    pub texture: TextureId,
}

/// Everything bound to a shader for one dispatch.
#[derive(Clone, Debug, Default)]
pub struct ShaderBindings {
    /// Uniform values by name.
    pub uniforms: SmallVec<[(&'static str, Uniform); 8]>,
    /// Sampled textures.
    pub textures: SmallVec<[TextureBinding; 4]>,
    /// Storage images.
    pub images: SmallVec<[ImageBinding; 2]>,
}

impl ShaderBindings {
    /// Set or replace a uniform.
    pub fn set_uniform(&mut self, name: &'static str, value: Uniform) {
        match self.uniforms.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.uniforms.push((name, value)),
        }
    }

    /// Uniform by name.
    pub fn uniform(&self, name: &str) -> Option<Uniform> {
        self.uniforms
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Set or replace a sampled texture binding.
    pub fn set_texture(&mut self, binding: TextureBinding) {
        self.textures.retain(|b| b.name != binding.name);
        self.textures.push(binding);
    }

    /// Sampled texture binding by name.
    pub fn texture(&self, name: &str) -> Option<&TextureBinding> {
        self.textures.iter().find(|b| b.name == name)
    }

    /// Remove a sampled texture binding.
    pub fn remove_texture(&mut self, name: &str) {
        self.textures.retain(|b| b.name != name);
    }

    /// Set or replace an image binding.
    pub fn set_image(&mut self, binding: ImageBinding) {
        self.images.retain(|b| b.name != binding.name);
        self.images.push(binding);
    }

    /// Remove an image binding.
    pub fn remove_image(&mut self, name: &str) {
        self.images.retain(|b| b.name != name);
    }

    /// Image binding by name.
    pub fn image(&self, name: &str) -> Option<&ImageBinding> {
        self.images.iter().find(|b| b.name == name)
    }

    /// A texture may back one image and must not be sampled in the same dispatch.
    pub(crate) fn check_aliasing(&self) -> CompositorResult<()> {
        for (i, image) in self.images.iter().enumerate() {
            if self.images[..i]
                .iter()
                .any(|other| other.texture == image.texture)
            {
                return Err(CompositorError::gpu(format!(
                    "texture {} bound to two images",
                    image.texture.0
                )));
            }
            let sampled = self
                .textures
                .iter()
                .any(|t| t.source == TextureSource::Texture(image.texture));
            if sampled {
                return Err(CompositorError::gpu(format!(
                    "texture {} bound as both image and sampled texture",
                    image.texture.0
                )));
            }
        }
        Ok(())
    }
}

/// Device counters, mostly useful in tests and diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Textures currently alive.
    pub live_textures: usize,
    /// Textures created over the device lifetime.
    pub textures_created: u64,
    /// Textures freed over the device lifetime.
    pub textures_freed: u64,
    /// Compute dispatches issued.
    pub dispatches: u64,
    /// Memory barriers issued.
    pub barriers: u64,
    /// Reads of image-stored data that were not preceded by the matching barrier.
    pub hazards: u64,
}

/// GPU operations consumed by the compositor.
///
/// Shader source management is the device's business: the compositor only looks shaders up
/// by name.
pub trait GpuDevice {
    /// Allocate a texture. Contents are zero.
    fn create_texture(&mut self, size: Int2, format: TextureFormat) -> CompositorResult<TextureId>;

    /// Free a texture. Unknown ids are ignored.
    fn free_texture(&mut self, texture: TextureId);

    /// Size of a live texture.
    fn texture_size(&self, texture: TextureId) -> Option<Int2>;

    /// Format of a live texture.
    fn texture_format(&self, texture: TextureId) -> Option<TextureFormat>;

    /// Fill every texel with `value`.
    fn clear_texture(&mut self, texture: TextureId, value: Float4) -> CompositorResult<()>;

    /// Copy `src` into `dst`; both must have the same size.
    fn copy_texture(&mut self, dst: TextureId, src: TextureId) -> CompositorResult<()>;

    /// Upload row-major texel data.
    fn write_texture(&mut self, texture: TextureId, data: &[Float4]) -> CompositorResult<()>;

    /// Read back row-major texel data.
    fn read_texture(&mut self, texture: TextureId) -> CompositorResult<Vec<Float4>>;

    /// Look up a compiled shader by name.
    fn shader(&self, name: &str) -> Option<ShaderId>;

    /// Work-group size of a shader.
    fn shader_local_size(&self, shader: ShaderId) -> Int2;

    /// Dispatch `groups` work groups of `shader` with `bindings`.
    fn dispatch(
        &mut self,
        shader: ShaderId,
        bindings: &ShaderBindings,
        groups: Int2,
    ) -> CompositorResult<()>;

    /// Order earlier image stores before later reads of the given kind.
    fn memory_barrier(&mut self, barrier: Barrier);

    /// Device counters.
    fn stats(&self) -> DeviceStats;
}
