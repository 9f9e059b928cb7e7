//! Glare: highlights are extracted at a quality dependent resolution, spread by a star, fog
//! glow or bloom filter and mixed back onto the image.

use super::{parse_params, require_finite};
use crate::context::{Context, ShaderPass};
use crate::cache::FilterType;
use crate::foundation::core::{Float4, Int2};
use crate::foundation::error::CompositorResult;
use crate::gpu::{Barrier, SamplerState, TextureFormat, TextureSource};
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::{OpResult, ResultType};
use crate::shaders::glare::number_of_diagonals;
use crate::texture_pool::PooledTexture;
use crate::tree::NodeDef;

/// Resolution the glare is computed at, relative to the input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlareQuality {
    /// Full resolution.
    #[default]
    High,
    /// Half resolution.
    Medium,
    /// Quarter resolution.
    Low,
}

impl GlareQuality {
    /// Downsampling factor.
    pub fn factor(self) -> i32 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 4,
        }
    }
}

/// Filter spreading the highlights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlareType {
    /// Iterated causal and non-causal line filters along two axes.
    #[default]
    SimpleStar,
    /// Wide gaussian halo.
    FogGlow,
    /// Downsample chain added back while upsampling.
    Bloom,
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GlareParams {
    glare_type: GlareType,
    quality: GlareQuality,
    threshold: f32,
    smoothness: f32,
    maximum: f32,
    strength: f32,
    saturation: f32,
    tint: [f32; 3],
    iterations: i32,
    fade: f32,
    diagonal: bool,
    size: f32,
}

impl Default for GlareParams {
    fn default() -> Self {
        Self {
            glare_type: GlareType::SimpleStar,
            quality: GlareQuality::High,
            threshold: 1.0,
            smoothness: 0.1,
            maximum: 0.0,
            strength: 1.0,
            saturation: 1.0,
            tint: [1.0; 3],
            iterations: 3,
            fade: 0.9,
            diagonal: false,
            size: 0.5,
        }
    }
}

/// Glare with `Image`, `Glare` and `Highlights` outputs.
///
/// The simple star runs along rows and columns, or along both diagonals with `diagonal`.
/// `size` is relative to the glare resolution: the larger dimension for fog glow, the smaller
/// one for bloom.
#[derive(Clone, Copy, Debug)]
pub struct GlareOperation {
    glare_type: GlareType,
    quality: GlareQuality,
    threshold: f32,
    smoothness: f32,
    /// Brightness highlights are clamped to; unbounded when `maximum` is zero.
    max_brightness: f32,
    strength: f32,
    saturation: f32,
    tint: [f32; 3],
    iterations: i32,
    fade: f32,
    diagonal: bool,
    size: f32,
}

impl GlareOperation {
    /// Build from a `glare` node. Iterations are clamped to `[2, 5]`, fade to `[0.75, 1]`
    /// and size to `[0, 1]`.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let p: GlareParams = parse_params(node)?;
        let threshold = require_finite(node, "threshold", p.threshold)?.max(0.0);
        let maximum = require_finite(node, "maximum", p.maximum)?.max(0.0);
        for v in p.tint {
            require_finite(node, "tint", v)?;
        }
        Ok(Self {
            glare_type: p.glare_type,
            quality: p.quality,
            threshold,
            smoothness: require_finite(node, "smoothness", p.smoothness)?.clamp(0.0, 1.0),
            max_brightness: if maximum == 0.0 {
                f32::MAX
            } else {
                threshold + maximum
            },
            strength: require_finite(node, "strength", p.strength)?.max(0.0),
            saturation: require_finite(node, "saturation", p.saturation)?.max(0.0),
            tint: p.tint,
            iterations: p.iterations.clamp(2, 5),
            fade: require_finite(node, "fade", p.fade)?.clamp(0.75, 1.0),
            diagonal: p.diagonal,
            size: require_finite(node, "size", p.size)?.clamp(0.0, 1.0),
        })
    }

    /// Filter in use.
    pub fn glare_type(&self) -> GlareType {
        self.glare_type
    }

    fn glare_size(&self, input_size: Int2) -> Int2 {
        (input_size / self.quality.factor()).max(Int2::ONE)
    }

    fn compute_highlights(
        &self,
        ctx: &mut Context,
        input: &OpResult,
    ) -> CompositorResult<PooledTexture> {
        let size = self.glare_size(input.domain().size);
        let mut pass = ctx.get_shader("compositor_glare_highlights")?;
        pass.uniform("threshold", self.threshold)
            .uniform("max_brightness", self.max_brightness)
            .uniform("highlights_smoothness", self.smoothness);
        input.bind_as_sampled_texture(&mut pass, "input_tx", SamplerState::bilinear());
        let highlights = ctx.acquire_texture(size, TextureFormat::Rgba32F)?;
        pass.bind_image("output_img", highlights.id());
        ctx.dispatch_threads_at_least(&pass, size)?;
        ctx.memory_barrier(Barrier::TextureFetch);
        Ok(highlights)
    }

    /// Copy of `source` in a new pooled texture.
    fn pooled_copy(ctx: &mut Context, source: &PooledTexture) -> CompositorResult<PooledTexture> {
        let copy = ctx.acquire_texture(source.size(), source.format())?;
        ctx.memory_barrier(Barrier::TextureUpdate);
        ctx.gpu_mut().copy_texture(copy.id(), source.id())?;
        Ok(copy)
    }

    fn star_pass(&self, ctx: &mut Context, name: &'static str) -> CompositorResult<ShaderPass> {
        let mut pass = ctx.get_shader(name)?;
        pass.uniform("iterations", self.iterations)
            .uniform("fade_factor", self.fade);
        Ok(pass)
    }

    /// Extent of the fog glow kernel in glare texels: odd and at least 3.
    fn fog_glow_kernel_size(&self, glare_size: Int2) -> i32 {
        let size = ((glare_size.x.max(glare_size.y) as f32 * self.size) as i32).max(3);
        size | 1
    }

    /// Number of textures in the bloom chain, the highlights included.
    pub(crate) fn bloom_chain_length(&self, glare_size: Int2) -> i32 {
        let scaled = glare_size.x.min(glare_size.y) as f32 * self.size;
        scaled.max(1.0).log2() as i32
    }

    /// Glare energy is divided by this when mixed. Every bloom level carries the full
    /// highlights, so a constant input would otherwise be scaled by the chain length.
    fn normalization_scale(&self, glare_size: Int2) -> f32 {
        match self.glare_type {
            GlareType::Bloom => self.bloom_chain_length(glare_size).max(1) as f32,
            GlareType::SimpleStar | GlareType::FogGlow => 1.0,
        }
    }

    fn compute_glare(
        &self,
        ctx: &mut Context,
        highlights: &PooledTexture,
    ) -> CompositorResult<PooledTexture> {
        match self.glare_type {
            GlareType::SimpleStar if self.diagonal => self.simple_star_diagonal(ctx, highlights),
            GlareType::SimpleStar => self.simple_star(ctx, highlights),
            GlareType::FogGlow => self.fog_glow(ctx, highlights),
            GlareType::Bloom => self.bloom(ctx, highlights),
        }
    }

    /// Both diagonals, each line filtered back and forth; the sum of both passes.
    fn simple_star_diagonal(
        &self,
        ctx: &mut Context,
        highlights: &PooledTexture,
    ) -> CompositorResult<PooledTexture> {
        let diagonals = number_of_diagonals(highlights.size());

        let diagonal = Self::pooled_copy(ctx, highlights)?;
        let mut pass = self.star_pass(ctx, "compositor_glare_simple_star_diagonal_pass")?;
        pass.bind_image("diagonal_img", diagonal.id());
        ctx.dispatch_threads_at_least(&pass, Int2::new(diagonals, 1))?;
        ctx.memory_barrier(Barrier::TextureFetch);

        let anti_diagonal = Self::pooled_copy(ctx, highlights)?;
        let mut pass = self.star_pass(ctx, "compositor_glare_simple_star_anti_diagonal_pass")?;
        pass.bind_texture_id("diagonal_tx", diagonal.id())
            .bind_image("anti_diagonal_img", anti_diagonal.id());
        ctx.dispatch_threads_at_least(&pass, Int2::new(diagonals, 1))?;
        ctx.memory_barrier(Barrier::TextureFetch);
        Ok(anti_diagonal)
    }

    /// Separable gaussian over the highlights with the cached symmetric blur weights.
    fn fog_glow(
        &self,
        ctx: &mut Context,
        highlights: &PooledTexture,
    ) -> CompositorResult<PooledTexture> {
        let size = highlights.size();
        let radius = (self.fog_glow_kernel_size(size) / 2) as f32;
        let weights = ctx.symmetric_blur_weights(FilterType::Gaussian, radius)?;

        let transposed = ctx.acquire_texture(size.transposed(), highlights.format())?;
        let mut pass = ctx.get_shader("compositor_symmetric_separable_blur")?;
        pass.bind_texture_id("input_tx", highlights.id())
            .bind_texture_id("weights_tx", weights)
            .bind_image("output_img", transposed.id());
        ctx.dispatch_threads_at_least(&pass, size)?;
        ctx.memory_barrier(Barrier::TextureFetch);

        let glow = ctx.acquire_texture(size, highlights.format())?;
        pass.bind_texture_id("input_tx", transposed.id())
            .bind_image("output_img", glow.id());
        ctx.dispatch_threads_at_least(&pass, size.transposed())?;
        ctx.memory_barrier(Barrier::TextureFetch);
        Ok(glow)
    }

    /// Halve the highlights down the chain, then double back up adding each level.
    fn bloom(
        &self,
        ctx: &mut Context,
        highlights: &PooledTexture,
    ) -> CompositorResult<PooledTexture> {
        let chain_length = self.bloom_chain_length(highlights.size());
        let mut chain = vec![Self::pooled_copy(ctx, highlights)?];
        if chain_length < 2 {
            return Ok(chain.remove(0));
        }

        for level in 1..chain_length {
            let shader = if level == 1 {
                "compositor_glare_bloom_downsample_karis_average"
            } else {
                "compositor_glare_bloom_downsample_simple_average"
            };
            let Some(input) = chain.last() else { break };
            let input_id = input.id();
            let size = (input.size() / 2).max(Int2::ONE);
            let output = ctx.acquire_texture(size, highlights.format())?;
            let mut pass = ctx.get_shader(shader)?;
            pass.bind_texture(
                "input_tx",
                TextureSource::Texture(input_id),
                SamplerState::bilinear(),
            )
            .bind_image("output_img", output.id());
            ctx.dispatch_threads_at_least(&pass, size)?;
            ctx.memory_barrier(Barrier::TextureFetch);
            chain.push(output);
        }

        while chain.len() > 1 {
            let Some(input) = chain.pop() else { break };
            let Some(output) = chain.last() else { break };
            let mut pass = ctx.get_shader("compositor_glare_bloom_upsample")?;
            pass.bind_texture(
                "input_tx",
                TextureSource::Texture(input.id()),
                SamplerState::bilinear(),
            )
            .bind_image("output_img", output.id());
            ctx.dispatch_threads_at_least(&pass, output.size())?;
            ctx.memory_barrier(Barrier::TextureFetch);
        }
        Ok(chain.remove(0))
    }

    /// Rows then columns, each line filtered back and forth; the sum of both passes.
    fn simple_star(
        &self,
        ctx: &mut Context,
        highlights: &PooledTexture,
    ) -> CompositorResult<PooledTexture> {
        let size = highlights.size();

        let horizontal = Self::pooled_copy(ctx, highlights)?;
        let mut pass = self.star_pass(ctx, "compositor_glare_simple_star_horizontal_pass")?;
        pass.bind_image("horizontal_img", horizontal.id());
        ctx.dispatch_threads_at_least(&pass, Int2::new(size.y, 1))?;
        ctx.memory_barrier(Barrier::TextureFetch);

        let vertical = Self::pooled_copy(ctx, highlights)?;
        let mut pass = self.star_pass(ctx, "compositor_glare_simple_star_vertical_pass")?;
        pass.bind_texture_id("horizontal_tx", horizontal.id())
            .bind_image("vertical_img", vertical.id());
        ctx.dispatch_threads_at_least(&pass, Int2::new(size.x, 1))?;
        ctx.memory_barrier(Barrier::TextureFetch);
        Ok(vertical)
    }

    fn adjust(&self, pass: &mut ShaderPass, glare_size: Int2) {
        pass.uniform("strength", self.strength / self.normalization_scale(glare_size))
            .uniform("saturation", self.saturation)
            .uniform("tint", self.tint);
    }

    fn write_image(
        &self,
        ctx: &mut Context,
        input: &OpResult,
        glare: &PooledTexture,
        output: &mut OpResult,
    ) -> CompositorResult<()> {
        let domain = input.domain();
        let mut pass = ctx.get_shader("compositor_glare_mix")?;
        self.adjust(&mut pass, glare.size());
        input.bind_as_texture(&mut pass, "input_tx");
        pass.bind_texture(
            "glare_tx",
            TextureSource::Texture(glare.id()),
            SamplerState::bilinear(),
        );
        output.allocate_texture(ctx, domain)?;
        output.bind_as_image(&mut pass, "output_img")?;
        ctx.dispatch_threads_at_least(&pass, domain.size)
    }

    /// Upsample `source` bilinearly into `output` over `input`'s domain with `shader`.
    fn write_upsampled(
        &self,
        ctx: &mut Context,
        shader: &'static str,
        input: &OpResult,
        source: &PooledTexture,
        output: &mut OpResult,
    ) -> CompositorResult<()> {
        let domain = input.domain();
        let mut pass = ctx.get_shader(shader)?;
        self.adjust(&mut pass, source.size());
        pass.bind_texture(
            "input_tx",
            TextureSource::Texture(source.id()),
            SamplerState::bilinear(),
        );
        output.allocate_texture(ctx, domain)?;
        output.bind_as_image(&mut pass, "output_img")?;
        ctx.dispatch_threads_at_least(&pass, domain.size)
    }
}

impl Operation for GlareOperation {
    fn name(&self) -> &str {
        "glare"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![InputDescriptor::new("Image", ResultType::Color).with_default(Float4::ONE)]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![
            OutputDescriptor::new("Image", ResultType::Color),
            OutputDescriptor::new("Glare", ResultType::Color),
            OutputDescriptor::new("Highlights", ResultType::Color),
        ]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let input = io.input("Image")?.clone();
        if input.is_single_value() {
            io.output_mut("Image")?.share_data(&input);
            io.output_mut("Glare")?.allocate_invalid();
            io.output_mut("Highlights")?.allocate_invalid();
            return Ok(());
        }

        let compute_image = io.output("Image")?.should_compute();
        let compute_glare = io.output("Glare")?.should_compute();
        let compute_highlights = io.output("Highlights")?.should_compute();

        let highlights = self.compute_highlights(ctx, &input)?;
        if compute_highlights {
            let output = io.output_mut("Highlights")?;
            self.write_upsampled(
                ctx,
                "compositor_glare_write_highlights_output",
                &input,
                &highlights,
                output,
            )?;
        }
        if !compute_image && !compute_glare {
            return Ok(());
        }

        let glare = self.compute_glare(ctx, &highlights)?;
        drop(highlights);
        if compute_image {
            let output = io.output_mut("Image")?;
            self.write_image(ctx, &input, &glare, output)?;
        }
        if compute_glare {
            let output = io.output_mut("Glare")?;
            self.write_upsampled(
                ctx,
                "compositor_glare_write_glare_output",
                &input,
                &glare,
                output,
            )?;
        }
        Ok(())
    }
}
