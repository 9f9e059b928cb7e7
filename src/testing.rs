//! Helpers shared by the unit tests.

use crate::context::{Context, ContextOpts};
use crate::foundation::core::{Float4, Int2};
use crate::gpu::GpuDevice;
use crate::gpu::software::{SoftwareDevice, SoftwareDeviceOpts};
use crate::host::ViewportHost;
use crate::result::{Domain, OpResult, ResultPrecision, ResultType};

pub(crate) fn software_device() -> SoftwareDevice {
    SoftwareDevice::new(SoftwareDeviceOpts {
        parallel: false,
        threads: None,
    })
    .unwrap()
}

/// Full-precision context over a software device and a viewport of `viewport`.
pub(crate) fn context(viewport: Int2) -> Context {
    let mut gpu = software_device();
    let host = ViewportHost::new(&mut gpu, viewport).unwrap();
    Context::new(
        Box::new(gpu),
        Box::new(host),
        ContextOpts {
            precision: ResultPrecision::Full,
            ..ContextOpts::default()
        },
    )
}

/// Like [`context`], with a `ViewLayer`/`Combined` pass of `size` filled with `f(x, y)`.
pub(crate) fn context_with_pass(
    viewport: Int2,
    size: Int2,
    f: impl Fn(i32, i32) -> Float4,
) -> Context {
    let mut gpu = software_device();
    let mut host = ViewportHost::new(&mut gpu, viewport).unwrap();
    host.upload_input_pass(&mut gpu, "ViewLayer", "Combined", size, &texels_from_fn(size, f))
        .unwrap();
    Context::new(
        Box::new(gpu),
        Box::new(host),
        ContextOpts {
            precision: ResultPrecision::Full,
            ..ContextOpts::default()
        },
    )
}

pub(crate) fn texels_from_fn(size: Int2, f: impl Fn(i32, i32) -> Float4) -> Vec<Float4> {
    (0..size.y)
        .flat_map(|y| (0..size.x).map(move |x| (x, y)))
        .map(|(x, y)| f(x, y))
        .collect()
}

/// Single-value result of `ty`.
pub(crate) fn single_value(ctx: &Context, ty: ResultType, value: Float4) -> OpResult {
    let mut result = ctx.create_result(ty);
    result.set_single_value(value);
    result
}

/// Texture result of `ty` holding `texels` on an identity domain of `size`.
pub(crate) fn texture_result(
    ctx: &mut Context,
    ty: ResultType,
    size: Int2,
    texels: &[Float4],
) -> OpResult {
    let mut result = ctx.create_result(ty);
    result.allocate_texture(ctx, Domain::new(size)).unwrap();
    let texture = result.texture().unwrap();
    ctx.gpu_mut().write_texture(texture, texels).unwrap();
    result
}

/// Texture result filled with `f(x, y)`.
pub(crate) fn texture_from_fn(
    ctx: &mut Context,
    ty: ResultType,
    size: Int2,
    f: impl Fn(i32, i32) -> Float4,
) -> OpResult {
    let texels = texels_from_fn(size, f);
    texture_result(ctx, ty, size, &texels)
}

pub(crate) fn read(ctx: &mut Context, result: &OpResult) -> Vec<Float4> {
    ctx.read_texture(result.texture().unwrap()).unwrap()
}

pub(crate) fn assert_close(a: Float4, b: Float4, tolerance: f32) {
    assert!(
        a.max_abs_diff(b) <= tolerance,
        "{a:?} differs from {b:?} by more than {tolerance}"
    );
}

pub(crate) fn live_textures(ctx: &Context) -> usize {
    ctx.gpu().stats().live_textures
}
