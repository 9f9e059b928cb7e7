//! Dilation and erosion of float results. Positive distances dilate, negative ones erode.

use crate::cache::FalloffType;
use crate::context::{Context, ShaderPass};
use crate::foundation::error::CompositorResult;
use crate::gpu::Barrier;
use crate::result::OpResult;

/// Largest dilation or erosion distance, in pixels. Longer distances are clamped to it.
pub const MAX_MORPHOLOGICAL_DISTANCE: i32 = 5000;

fn radius(distance: i32) -> i32 {
    distance.clamp(-MAX_MORPHOLOGICAL_DISTANCE, MAX_MORPHOLOGICAL_DISTANCE).abs()
}

/// Runs `pass` over `input` into a transposed temporary, then over the temporary into
/// `output`; the kernel behind `pass` stores transposed.
fn transposed_passes(
    ctx: &mut Context,
    pass: &mut ShaderPass,
    input: &OpResult,
    output: &mut OpResult,
) -> CompositorResult<()> {
    let domain = input.domain();
    let transposed = ctx.acquire_texture(domain.size.transposed(), input.texture_format())?;

    input.bind_as_texture(pass, "input_tx");
    pass.bind_image("output_img", transposed.id());
    ctx.dispatch_threads_at_least(pass, domain.size)?;
    ctx.memory_barrier(Barrier::TextureFetch);
    input.unbind_as_texture(pass, "input_tx");
    pass.unbind_image("output_img");

    output.allocate_texture(ctx, domain)?;
    pass.bind_texture_id("input_tx", transposed.id());
    output.bind_as_image(pass, "output_img")?;
    ctx.dispatch_threads_at_least(pass, domain.size.transposed())
}

/// Square structuring element: a running max or min within `|distance|` along rows, then
/// columns.
pub fn morphological_step(
    ctx: &mut Context,
    input: &OpResult,
    output: &mut OpResult,
    distance: i32,
) -> CompositorResult<()> {
    let mut pass = ctx.get_shader("compositor_morphological_step")?;
    pass.uniform("radius", radius(distance))
        .uniform("is_dilate", distance > 0);
    transposed_passes(ctx, &mut pass, input, output)
}

/// Circular structuring element of radius `|distance|`.
pub fn morphological_distance(
    ctx: &mut Context,
    input: &OpResult,
    output: &mut OpResult,
    distance: i32,
) -> CompositorResult<()> {
    let mut pass = ctx.get_shader("compositor_morphological_distance")?;
    pass.uniform("radius", radius(distance))
        .uniform("is_dilate", distance > 0);
    input.bind_as_texture(&mut pass, "input_tx");
    let domain = input.domain();
    output.allocate_texture(ctx, domain)?;
    output.bind_as_image(&mut pass, "output_img")?;
    ctx.dispatch_threads_at_least(&pass, domain.size)
}

/// Soft dilation or erosion: gaussian weighting mixed with a distance falloff.
pub fn morphological_distance_feather(
    ctx: &mut Context,
    input: &OpResult,
    output: &mut OpResult,
    distance: i32,
    falloff: FalloffType,
) -> CompositorResult<()> {
    let radius = radius(distance);
    let weights = ctx.morphological_distance_feather_weights(radius)?;
    let falloffs = ctx.distance_falloffs(falloff, radius)?;
    let mut pass = ctx.get_shader("compositor_morphological_distance_feather")?;
    pass.uniform("is_dilate", distance > 0)
        .bind_texture_id("weights_tx", weights)
        .bind_texture_id("falloffs_tx", falloffs);
    transposed_passes(ctx, &mut pass, input, output)
}
