use crate::cache::FilterType;
use crate::context::Context;
use crate::foundation::core::Int2;
use crate::foundation::error::CompositorResult;
use crate::gpu::{Barrier, TextureId};
use crate::result::OpResult;

const SHADER: &str = "compositor_symmetric_separable_blur";

/// Blur `input` into `output` on the input domain with a separable symmetric filter of
/// `radius` pixels per axis.
///
/// The horizontal pass writes a transposed intermediate so the vertical pass is another
/// horizontal pass of the same kernel, whose transposed store restores the orientation.
pub fn symmetric_separable_blur(
    ctx: &mut Context,
    input: &OpResult,
    output: &mut OpResult,
    radius: [f32; 2],
    filter: FilterType,
) -> CompositorResult<()> {
    let domain = input.domain();

    let horizontal_weights = ctx.symmetric_blur_weights(filter, radius[0])?;
    let mut pass = ctx.get_shader(SHADER)?;
    input.bind_as_texture(&mut pass, "input_tx");
    pass.bind_texture_id("weights_tx", horizontal_weights);
    let transposed = ctx.acquire_texture(domain.size.transposed(), input.texture_format())?;
    pass.bind_image("output_img", transposed.id());
    ctx.dispatch_threads_at_least(&pass, domain.size)?;
    ctx.memory_barrier(Barrier::TextureFetch);

    let vertical_weights = ctx.symmetric_blur_weights(filter, radius[1])?;
    output.allocate_texture(ctx, domain)?;
    vertical_pass(ctx, transposed.id(), domain.size.transposed(), vertical_weights, output)
}

fn vertical_pass(
    ctx: &mut Context,
    transposed: TextureId,
    transposed_size: Int2,
    weights: TextureId,
    output: &OpResult,
) -> CompositorResult<()> {
    let mut pass = ctx.get_shader(SHADER)?;
    pass.bind_texture_id("input_tx", transposed)
        .bind_texture_id("weights_tx", weights);
    output.bind_as_image(&mut pass, "output_img")?;
    ctx.dispatch_threads_at_least(&pass, transposed_size)
}
