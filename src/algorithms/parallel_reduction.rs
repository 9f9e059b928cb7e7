//! Reductions of whole textures to one value by repeated tile reduction.

use crate::context::{Context, ShaderPass};
use crate::foundation::core::{Float4, Int2};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::{Barrier, TextureFormat, TextureId};
use crate::result::OpResult;
use crate::shaders::reduction::REDUCTION_TILE;
use crate::texture_pool::PooledTexture;

/// Reduce `texture` of `size` to a single texel with `shader_name` and read it back.
///
/// Each pass maps every tile of the current texture to one texel of a pooled intermediate of
/// `format`, until one texel remains; at least one pass always runs so the initial transform
/// is applied. The source texture itself is never released.
pub(crate) fn parallel_reduction(
    ctx: &mut Context,
    texture: TextureId,
    size: Int2,
    shader_name: &'static str,
    format: TextureFormat,
    configure: impl FnOnce(&mut ShaderPass),
) -> CompositorResult<Float4> {
    if size.is_empty() {
        return Err(CompositorError::evaluation(format!(
            "{shader_name} over an empty texture"
        )));
    }
    let mut pass = ctx.get_shader(shader_name)?;
    configure(&mut pass);

    let mut source = texture;
    let mut source_size = size;
    let mut intermediate: Option<PooledTexture> = None;
    let mut is_initial = true;
    loop {
        let reduced_size = source_size.div_ceil(Int2::splat(REDUCTION_TILE));
        let reduced = ctx.acquire_texture(reduced_size, format)?;

        pass.uniform("is_initial_reduction", is_initial);
        pass.bind_texture_id("input_tx", source);
        pass.bind_image("reduced_img", reduced.id());
        ctx.dispatch_threads_at_least(&pass, reduced_size)?;
        ctx.memory_barrier(Barrier::TextureFetch);
        pass.unbind_texture("input_tx").unbind_image("reduced_img");

        source = reduced.id();
        source_size = reduced_size;
        intermediate.replace(reduced);
        is_initial = false;
        if source_size == Int2::ONE {
            break;
        }
    }

    let texels = ctx.read_texture(source)?;
    drop(intermediate);
    texels
        .first()
        .copied()
        .ok_or_else(|| CompositorError::gpu("empty reduction readback"))
}

fn texture_of(result: &OpResult) -> CompositorResult<(TextureId, Int2)> {
    let texture = result
        .texture()
        .ok_or_else(|| CompositorError::evaluation("reductions need a texture result"))?;
    Ok((texture, result.domain().size))
}

fn reduce_scalar(
    ctx: &mut Context,
    result: &OpResult,
    shader_name: &'static str,
    configure: impl FnOnce(&mut ShaderPass),
) -> CompositorResult<f32> {
    let (texture, size) = texture_of(result)?;
    let value = parallel_reduction(
        ctx,
        texture,
        size,
        shader_name,
        TextureFormat::R32F,
        configure,
    )?;
    Ok(value[0])
}

/// Sum of the red channel.
pub fn sum_red(ctx: &mut Context, result: &OpResult) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_sum_red", |_| {})
}

/// Sum of the green channel.
pub fn sum_green(ctx: &mut Context, result: &OpResult) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_sum_green", |_| {})
}

/// Sum of the blue channel.
pub fn sum_blue(ctx: &mut Context, result: &OpResult) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_sum_blue", |_| {})
}

/// Sum of luminance under `coefficients`.
pub fn sum_luminance(
    ctx: &mut Context,
    result: &OpResult,
    coefficients: [f32; 3],
) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_sum_luminance", |pass| {
        pass.uniform("luminance_coefficients", coefficients);
    })
}

/// Component-wise sum of all four channels.
pub fn sum_color(ctx: &mut Context, result: &OpResult) -> CompositorResult<Float4> {
    let (texture, size) = texture_of(result)?;
    parallel_reduction(
        ctx,
        texture,
        size,
        "compositor_sum_color",
        TextureFormat::Rgba32F,
        |_| {},
    )
}

/// Sum of `(red - subtrahend)^2`.
pub fn sum_red_squared_difference(
    ctx: &mut Context,
    result: &OpResult,
    subtrahend: f32,
) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_sum_red_squared_difference", |pass| {
        pass.uniform("subtrahend", subtrahend);
    })
}

/// Sum of `(green - subtrahend)^2`.
pub fn sum_green_squared_difference(
    ctx: &mut Context,
    result: &OpResult,
    subtrahend: f32,
) -> CompositorResult<f32> {
    reduce_scalar(
        ctx,
        result,
        "compositor_sum_green_squared_difference",
        |pass| {
            pass.uniform("subtrahend", subtrahend);
        },
    )
}

/// Sum of `(blue - subtrahend)^2`.
pub fn sum_blue_squared_difference(
    ctx: &mut Context,
    result: &OpResult,
    subtrahend: f32,
) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_sum_blue_squared_difference", |pass| {
        pass.uniform("subtrahend", subtrahend);
    })
}

/// Sum of `(luminance - subtrahend)^2`.
pub fn sum_luminance_squared_difference(
    ctx: &mut Context,
    result: &OpResult,
    coefficients: [f32; 3],
    subtrahend: f32,
) -> CompositorResult<f32> {
    reduce_scalar(
        ctx,
        result,
        "compositor_sum_luminance_squared_difference",
        |pass| {
            pass.uniform("luminance_coefficients", coefficients)
                .uniform("subtrahend", subtrahend);
        },
    )
}

/// Largest luminance.
pub fn maximum_luminance(
    ctx: &mut Context,
    result: &OpResult,
    coefficients: [f32; 3],
) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_maximum_luminance", |pass| {
        pass.uniform("luminance_coefficients", coefficients);
    })
}

/// Smallest luminance.
pub fn minimum_luminance(
    ctx: &mut Context,
    result: &OpResult,
    coefficients: [f32; 3],
) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_minimum_luminance", |pass| {
        pass.uniform("luminance_coefficients", coefficients);
    })
}

/// Largest value of a float result.
pub fn maximum_float(ctx: &mut Context, result: &OpResult) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_maximum_float", |_| {})
}

/// Smallest value of a float result.
pub fn minimum_float(ctx: &mut Context, result: &OpResult) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_minimum_float", |_| {})
}

/// Largest value within `[lower_bound, upper_bound]`; `lower_bound` when none is.
pub fn maximum_float_in_range(
    ctx: &mut Context,
    result: &OpResult,
    lower_bound: f32,
    upper_bound: f32,
) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_maximum_float_in_range", |pass| {
        pass.uniform("lower_bound", lower_bound)
            .uniform("upper_bound", upper_bound);
    })
}

/// Smallest value within `[lower_bound, upper_bound]`; `upper_bound` when none is.
pub fn minimum_float_in_range(
    ctx: &mut Context,
    result: &OpResult,
    lower_bound: f32,
    upper_bound: f32,
) -> CompositorResult<f32> {
    reduce_scalar(ctx, result, "compositor_minimum_float_in_range", |pass| {
        pass.uniform("lower_bound", lower_bound)
            .uniform("upper_bound", upper_bound);
    })
}
