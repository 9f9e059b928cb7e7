use crate::context::Context;
use crate::foundation::error::CompositorResult;
use crate::gpu::{Barrier, SamplerState};
use crate::result::{OpResult, ResultType};
use crate::texture_pool::PooledTexture;

/// Weights of luminance used for edge detection on a result of type `ty`.
fn luminance_coefficients(ctx: &Context, ty: ResultType) -> [f32; 3] {
    match ty {
        ResultType::Color => ctx.luminance_coefficients(),
        ResultType::Vector => [1.0 / 3.0; 3],
        ResultType::Float => [1.0, 0.0, 0.0],
    }
}

fn detect_edges(
    ctx: &mut Context,
    input: &OpResult,
    threshold: f32,
    local_contrast_adaptation_factor: f32,
) -> CompositorResult<PooledTexture> {
    let mut pass = ctx.get_shader("compositor_smaa_edge_detection")?;
    pass.uniform(
        "luminance_coefficients",
        luminance_coefficients(ctx, input.ty()),
    )
    .uniform("threshold", threshold)
    .uniform(
        "local_contrast_adaptation_factor",
        local_contrast_adaptation_factor,
    );
    input.bind_as_texture(&mut pass, "input_tx");

    let size = input.domain().size;
    let edges = ctx.acquire_texture(size, ResultType::Vector.texture_format(ctx.precision()))?;
    pass.bind_image("edges_img", edges.id());
    ctx.dispatch_threads_at_least(&pass, size)?;
    ctx.memory_barrier(Barrier::TextureFetch);
    Ok(edges)
}

fn calculate_blending_weights(
    ctx: &mut Context,
    edges: &PooledTexture,
    corner_rounding: f32,
) -> CompositorResult<PooledTexture> {
    let (area, search) = ctx.smaa_precomputed_textures()?;
    let mut pass = ctx.get_shader("compositor_smaa_blending_weights")?;
    pass.uniform("corner_rounding", corner_rounding)
        .bind_texture_id("edges_tx", edges.id())
        .bind_texture_id("area_tx", area)
        .bind_texture_id("search_tx", search);

    let weights = ctx.acquire_texture(
        edges.size(),
        ResultType::Color.texture_format(ctx.precision()),
    )?;
    pass.bind_image("weights_img", weights.id());
    ctx.dispatch_threads_at_least(&pass, edges.size())?;
    ctx.memory_barrier(Barrier::TextureFetch);
    Ok(weights)
}

fn blend_neighborhood(
    ctx: &mut Context,
    input: &OpResult,
    weights: &PooledTexture,
    output: &mut OpResult,
) -> CompositorResult<()> {
    let shader = match input.ty() {
        ResultType::Float => "compositor_smaa_neighborhood_blending_float",
        ResultType::Vector | ResultType::Color => "compositor_smaa_neighborhood_blending_float4",
    };
    let mut pass = ctx.get_shader(shader)?;
    input.bind_as_sampled_texture(&mut pass, "input_tx", SamplerState::nearest());
    pass.bind_texture_id("weights_tx", weights.id());

    let domain = input.domain();
    output.allocate_texture(ctx, domain)?;
    output.bind_as_image(&mut pass, "output_img")?;
    ctx.dispatch_threads_at_least(&pass, domain.size)
}

/// Anti-alias `input` into `output` on the input domain.
///
/// Edges are pixels whose luminance differs from their left or top neighbour by at least
/// `threshold`, unless a neighbouring contrast is more than
/// `local_contrast_adaptation_factor` times larger. Edge runs ending in a sharp corner are
/// blended less as `corner_rounding` goes from 1 to 0. Single-value inputs are copied.
pub fn smaa(
    ctx: &mut Context,
    input: &OpResult,
    output: &mut OpResult,
    threshold: f32,
    local_contrast_adaptation_factor: f32,
    corner_rounding: f32,
) -> CompositorResult<()> {
    if input.is_single_value() {
        output.set_single_value(input.single_value());
        return Ok(());
    }
    let edges = detect_edges(ctx, input, threshold, local_contrast_adaptation_factor)?;
    let weights = calculate_blending_weights(ctx, &edges, corner_rounding.clamp(0.0, 1.0))?;
    drop(edges);
    blend_neighborhood(ctx, input, &weights, output)
}
