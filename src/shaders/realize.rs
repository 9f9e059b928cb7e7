use crate::foundation::core::{Float4, Int2, Point};
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};
use crate::result::Interpolation;

struct RealizeOnDomain {
    interpolation: Interpolation,
}

/// Cubic B-spline weights of the four taps around a sample with fractional offset `t`.
fn cubic_bspline_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        (1.0 - t).powi(3) / 6.0,
        (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
        (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
        t3 / 6.0,
    ]
}

/// Bicubic B-spline filtering with four bilinear taps, each placed between a pair of texels so
/// its hardware lerp reproduces the ratio of their cubic weights.
fn sample_bicubic(inv: &Invocation<'_>, name: &str, uv: [f32; 2]) -> Float4 {
    let size = inv.texture_size(name);
    if size.is_empty() {
        return Float4::ZERO;
    }
    let (w, h) = (size.x as f32, size.y as f32);
    let px = uv[0] * w - 0.5;
    let py = uv[1] * h - 0.5;
    let (fx, fy) = (px - px.floor(), py - py.floor());
    let (ix, iy) = (px.floor(), py.floor());

    let wx = cubic_bspline_weights(fx);
    let wy = cubic_bspline_weights(fy);
    let sx = [wx[0] + wx[1], wx[2] + wx[3]];
    let sy = [wy[0] + wy[1], wy[2] + wy[3]];

    let x0 = (ix - 0.5 + wx[1] / sx[0]) / w;
    let x1 = (ix + 1.5 + wx[3] / sx[1]) / w;
    let y0 = (iy - 0.5 + wy[1] / sy[0]) / h;
    let y1 = (iy + 1.5 + wy[3] / sy[1]) / h;

    let top_left = inv.texture_sample(name, [x0, y0]);
    let top_right = inv.texture_sample(name, [x1, y0]);
    let bottom_left = inv.texture_sample(name, [x0, y1]);
    let bottom_right = inv.texture_sample(name, [x1, y1]);

    let left_weight = sx[0] / (sx[0] + sx[1]);
    let top_weight = sy[0] / (sy[0] + sy[1]);
    let bottom = bottom_right.lerp(bottom_left, left_weight);
    let top = top_right.lerp(top_left, left_weight);
    bottom.lerp(top, top_weight)
}

impl ComputeKernel for RealizeOnDomain {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.image_size("domain_img").contains(texel) {
            return;
        }
        let inverse = inv.uniform_affine("inverse_transformation");
        let p = inverse * Point::new(f64::from(texel.x) + 0.5, f64::from(texel.y) + 0.5);
        let input_size = inv.texture_size("input_tx").max(Int2::ONE);
        let uv = [
            (p.x / f64::from(input_size.x)) as f32,
            (p.y / f64::from(input_size.y)) as f32,
        ];
        let value = match self.interpolation {
            Interpolation::Bicubic => sample_bicubic(inv, "input_tx", uv),
            Interpolation::Nearest | Interpolation::Bilinear => inv.texture_sample("input_tx", uv),
        };
        inv.image_store("domain_img", texel, value);
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    for (name, interpolation) in [
        ("compositor_realize_on_domain_nearest", Interpolation::Nearest),
        ("compositor_realize_on_domain_bilinear", Interpolation::Bilinear),
        ("compositor_realize_on_domain_bicubic", Interpolation::Bicubic),
    ] {
        device.register_kernel(name, RealizeOnDomain { interpolation });
    }
}
