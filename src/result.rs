use crate::context::{Context, ShaderPass};
use crate::foundation::core::{Affine, Float4, Int2};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::{SamplerState, TextureFormat, TextureId, TextureSource};
use crate::texture_pool::PooledTexture;
use std::rc::Rc;

/// What the channels of a result mean.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// One channel.
    Float,
    /// Three channels plus padding.
    Vector,
    /// RGBA.
    Color,
}

impl ResultType {
    /// Texture format backing a result of this type.
    pub fn texture_format(self, precision: ResultPrecision) -> TextureFormat {
        match (self, precision) {
            (Self::Float, ResultPrecision::Half) => TextureFormat::R16F,
            (Self::Float, ResultPrecision::Full) => TextureFormat::R32F,
            (_, ResultPrecision::Half) => TextureFormat::Rgba16F,
            (_, ResultPrecision::Full) => TextureFormat::Rgba32F,
        }
    }
}

/// Storage precision of results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResultPrecision {
    /// 16-bit float channels.
    #[default]
    Half,
    /// 32-bit float channels.
    Full,
}

/// Interpolation used when a result is resampled onto another domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Bilinear.
    Bilinear,
    /// Cubic B-spline.
    Bicubic,
}

/// How a result is realized on a domain other than its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RealizationOptions {
    /// Resampling filter.
    pub interpolation: Interpolation,
    /// Tile along x instead of reading zero outside the result.
    pub repeat_x: bool,
    /// Tile along y instead of reading zero outside the result.
    pub repeat_y: bool,
}

/// Pixel extent of a result and where it sits in the compositing space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Domain {
    /// Size in pixels.
    pub size: Int2,
    /// Placement transform, applied about the domain center.
    pub transformation: Affine,
}

impl Domain {
    /// Domain of `size` with the identity transform.
    pub fn new(size: Int2) -> Self {
        Self {
            size,
            transformation: Affine::IDENTITY,
        }
    }

    /// 1x1 identity domain, the domain of single values.
    pub fn identity() -> Self {
        Self::new(Int2::ONE)
    }

    /// Pre-multiply `transformation` into the domain transform.
    pub fn transform(&mut self, transformation: Affine) {
        self.transformation = transformation * self.transformation;
    }
}

#[derive(Clone, Debug, Default)]
enum Storage {
    #[default]
    Unallocated,
    SingleValue(Float4),
    Pooled(Rc<PooledTexture>),
    External(TextureId),
}

/// A value flowing between operations: a single broadcast value or a texture on a domain.
///
/// Cloning shares the backing texture; the texture goes back to the pool once every clone
/// has been released.
#[derive(Clone, Debug)]
pub struct OpResult {
    ty: ResultType,
    precision: ResultPrecision,
    storage: Storage,
    domain: Domain,
    realization: RealizationOptions,
    reference_count: u32,
}

impl OpResult {
    /// Unallocated result of `ty`.
    pub fn new(ty: ResultType, precision: ResultPrecision) -> Self {
        Self {
            ty,
            precision,
            storage: Storage::Unallocated,
            domain: Domain::identity(),
            realization: RealizationOptions::default(),
            reference_count: 1,
        }
    }

    /// Result type.
    pub fn ty(&self) -> ResultType {
        self.ty
    }

    /// Result precision.
    pub fn precision(&self) -> ResultPrecision {
        self.precision
    }

    /// Format a texture of this result uses.
    pub fn texture_format(&self) -> TextureFormat {
        self.ty.texture_format(self.precision)
    }

    /// Back the result with a pooled texture covering `domain`. An empty domain yields an
    /// invalid result instead.
    pub fn allocate_texture(&mut self, ctx: &mut Context, domain: Domain) -> CompositorResult<()> {
        if domain.size.is_empty() {
            self.allocate_invalid();
            return Ok(());
        }
        let texture = ctx.acquire_texture(domain.size, self.texture_format())?;
        self.storage = Storage::Pooled(Rc::new(texture));
        self.domain = domain;
        Ok(())
    }

    /// Turn the result into a single value of zero.
    pub fn allocate_single_value(&mut self) {
        self.storage = Storage::SingleValue(self.normalize(Float4::ZERO));
        self.domain = Domain::identity();
    }

    /// Single value broadcast over any domain.
    pub fn set_single_value(&mut self, value: Float4) {
        self.storage = Storage::SingleValue(self.normalize(value));
        self.domain = Domain::identity();
    }

    /// A zero single value, readable as transparent black.
    pub fn allocate_invalid(&mut self) {
        self.allocate_single_value();
    }

    /// Back the result with a texture owned by the host.
    pub fn wrap_external(&mut self, texture: TextureId, domain: Domain) {
        self.storage = Storage::External(texture);
        self.domain = domain;
    }

    /// Move the data and domain of `other` into this result, leaving `other` unallocated.
    pub fn steal_data(&mut self, other: &mut OpResult) {
        self.storage = std::mem::take(&mut other.storage);
        self.domain = other.domain;
        other.domain = Domain::identity();
    }

    /// Share the data and domain of `other`.
    pub fn share_data(&mut self, other: &OpResult) {
        self.storage = other.storage.clone();
        self.domain = other.domain;
    }

    /// Give the backing texture back. Consumes the result.
    pub fn release(self) {}

    /// Return `true` unless the result is unallocated.
    pub fn is_allocated(&self) -> bool {
        !matches!(self.storage, Storage::Unallocated)
    }

    /// Return `true` for single-value results.
    pub fn is_single_value(&self) -> bool {
        matches!(self.storage, Storage::SingleValue(_))
    }

    /// The single value, zero for texture results.
    pub fn single_value(&self) -> Float4 {
        self.single_value_or(Float4::ZERO)
    }

    /// The single value, or `default` for texture results.
    pub fn single_value_or(&self, default: Float4) -> Float4 {
        match self.storage {
            Storage::SingleValue(v) => v,
            _ => default,
        }
    }

    /// First channel of the single value, or `default`.
    pub fn single_float_or(&self, default: f32) -> f32 {
        match self.storage {
            Storage::SingleValue(v) => v[0],
            _ => default,
        }
    }

    /// Domain of the result; single values have the identity domain.
    pub fn domain(&self) -> Domain {
        match self.storage {
            Storage::SingleValue(_) | Storage::Unallocated => Domain::identity(),
            _ => self.domain,
        }
    }

    /// Backing texture, if any.
    pub fn texture(&self) -> Option<TextureId> {
        match &self.storage {
            Storage::Pooled(t) => Some(t.id()),
            Storage::External(id) => Some(*id),
            _ => None,
        }
    }

    /// Bind for integer texel fetches; single values bind as a broadcast constant.
    pub fn bind_as_texture(&self, pass: &mut ShaderPass, name: &'static str) {
        self.bind_as_sampled_texture(pass, name, SamplerState::nearest());
    }

    /// Bind for sampling through `sampler`.
    pub fn bind_as_sampled_texture(
        &self,
        pass: &mut ShaderPass,
        name: &'static str,
        sampler: SamplerState,
    ) {
        let source = match self.texture() {
            Some(texture) => TextureSource::Texture(texture),
            None => TextureSource::Constant(self.single_value()),
        };
        pass.bind_texture(name, source, sampler);
    }

    /// Bind as a storage image. Only texture results can be written.
    pub fn bind_as_image(&self, pass: &mut ShaderPass, name: &'static str) -> CompositorResult<()> {
        let texture = self.texture().ok_or_else(|| {
            CompositorError::evaluation(format!("image binding {name} needs a texture result"))
        })?;
        pass.bind_image(name, texture);
        Ok(())
    }

    /// Remove a texture binding.
    pub fn unbind_as_texture(&self, pass: &mut ShaderPass, name: &'static str) {
        pass.unbind_texture(name);
    }

    /// Remove an image binding.
    pub fn unbind_as_image(&self, pass: &mut ShaderPass, name: &'static str) {
        pass.unbind_image(name);
    }

    /// Pre-multiply `transformation` into the domain transform.
    pub fn transform(&mut self, transformation: Affine) {
        self.domain.transform(transformation);
    }

    /// How this result is resampled onto other domains.
    pub fn realization_options(&self) -> RealizationOptions {
        self.realization
    }

    /// Mutable realization options.
    pub fn realization_options_mut(&mut self) -> &mut RealizationOptions {
        &mut self.realization
    }

    /// Replace the realization options.
    pub fn set_realization_options(&mut self, options: RealizationOptions) {
        self.realization = options;
    }

    /// Number of consumers that still need this result.
    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    /// Set the consumer count.
    pub fn set_reference_count(&mut self, count: u32) {
        self.reference_count = count;
    }

    /// Return `false` when nothing consumes the result, so computing it can be skipped.
    pub fn should_compute(&self) -> bool {
        self.reference_count > 0
    }

    fn normalize(&self, value: Float4) -> Float4 {
        match self.ty {
            ResultType::Float => Float4::new(value[0], 0.0, 0.0, 1.0),
            _ => value,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/result.rs"]
mod tests;
