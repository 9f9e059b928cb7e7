use crate::foundation::core::{Float4, Int2};
use crate::foundation::math::dot3;
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};

/// Edge of the square tile of input texels each reduction invocation folds into one texel.
pub(crate) const REDUCTION_TILE: i32 = 16;

#[derive(Clone, Copy)]
enum Reduce {
    Sum,
    Maximum,
    Minimum,
}

impl Reduce {
    fn apply(self, a: Float4, b: Float4) -> Float4 {
        match self {
            Self::Sum => a + b,
            Self::Maximum => a.max(b),
            Self::Minimum => a.min(b),
        }
    }
}

/// Maps an input texel to the value being reduced; only applied in the first pass.
type Initialize = fn(&Invocation<'_>, Float4) -> Float4;
type Identity = fn(&Invocation<'_>) -> Float4;

/// One level of a parallel reduction: every invocation reduces a tile of `input_tx` into one
/// texel of `reduced_img`. Texels outside the input are skipped.
struct Reduction {
    initialize: Initialize,
    reduce: Reduce,
    identity: Identity,
}

impl ComputeKernel for Reduction {
    fn local_size(&self) -> Int2 {
        Int2::ONE
    }

    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.image_size("reduced_img").contains(texel) {
            return;
        }
        let input_size = inv.texture_size("input_tx");
        let is_initial = inv.uniform_bool("is_initial_reduction");

        let origin = texel * REDUCTION_TILE;
        let mut acc = (self.identity)(inv);
        for y in 0..REDUCTION_TILE {
            for x in 0..REDUCTION_TILE {
                let p = origin + Int2::new(x, y);
                if !input_size.contains(p) {
                    continue;
                }
                let value = inv.texture_load_zero("input_tx", p);
                let value = if is_initial {
                    (self.initialize)(inv, value)
                } else {
                    value
                };
                acc = self.reduce.apply(acc, value);
            }
        }
        inv.image_store("reduced_img", texel, acc);
    }
}

fn scalar(v: f32) -> Float4 {
    Float4::new(v, 0.0, 0.0, 0.0)
}

fn luminance_of(inv: &Invocation<'_>, color: Float4) -> f32 {
    dot3(color.xyz(), inv.uniform_float3("luminance_coefficients"))
}

fn squared_difference(inv: &Invocation<'_>, v: f32) -> Float4 {
    let d = v - inv.uniform_f32("subtrahend");
    scalar(d * d)
}

fn in_range(inv: &Invocation<'_>, v: f32, outside: f32) -> Float4 {
    let lower = inv.uniform_f32("lower_bound");
    let upper = inv.uniform_f32("upper_bound");
    scalar(if v >= lower && v <= upper { v } else { outside })
}

fn zero(_: &Invocation<'_>) -> Float4 {
    Float4::ZERO
}

fn lowest(_: &Invocation<'_>) -> Float4 {
    scalar(f32::MIN)
}

fn highest(_: &Invocation<'_>) -> Float4 {
    scalar(f32::MAX)
}

fn lower_bound(inv: &Invocation<'_>) -> Float4 {
    scalar(inv.uniform_f32("lower_bound"))
}

fn upper_bound(inv: &Invocation<'_>) -> Float4 {
    scalar(inv.uniform_f32("upper_bound"))
}

const REDUCTIONS: &[(&str, Initialize, Reduce, Identity)] = &[
    ("compositor_sum_red", |_, c| scalar(c[0]), Reduce::Sum, zero),
    ("compositor_sum_green", |_, c| scalar(c[1]), Reduce::Sum, zero),
    ("compositor_sum_blue", |_, c| scalar(c[2]), Reduce::Sum, zero),
    (
        "compositor_sum_luminance",
        |inv, c| scalar(luminance_of(inv, c)),
        Reduce::Sum,
        zero,
    ),
    ("compositor_sum_color", |_, c| c, Reduce::Sum, zero),
    (
        "compositor_sum_red_squared_difference",
        |inv, c| squared_difference(inv, c[0]),
        Reduce::Sum,
        zero,
    ),
    (
        "compositor_sum_green_squared_difference",
        |inv, c| squared_difference(inv, c[1]),
        Reduce::Sum,
        zero,
    ),
    (
        "compositor_sum_blue_squared_difference",
        |inv, c| squared_difference(inv, c[2]),
        Reduce::Sum,
        zero,
    ),
    (
        "compositor_sum_luminance_squared_difference",
        |inv, c| squared_difference(inv, luminance_of(inv, c)),
        Reduce::Sum,
        zero,
    ),
    (
        "compositor_maximum_luminance",
        |inv, c| scalar(luminance_of(inv, c)),
        Reduce::Maximum,
        lowest,
    ),
    (
        "compositor_minimum_luminance",
        |inv, c| scalar(luminance_of(inv, c)),
        Reduce::Minimum,
        highest,
    ),
    (
        "compositor_maximum_float",
        |_, c| scalar(c[0]),
        Reduce::Maximum,
        lowest,
    ),
    (
        "compositor_minimum_float",
        |_, c| scalar(c[0]),
        Reduce::Minimum,
        highest,
    ),
    (
        "compositor_maximum_float_in_range",
        |inv, c| in_range(inv, c[0], inv.uniform_f32("lower_bound")),
        Reduce::Maximum,
        lower_bound,
    ),
    (
        "compositor_minimum_float_in_range",
        |inv, c| in_range(inv, c[0], inv.uniform_f32("upper_bound")),
        Reduce::Minimum,
        upper_bound,
    ),
];

pub(super) fn register(device: &mut SoftwareDevice) {
    for &(name, initialize, reduce, identity) in REDUCTIONS {
        device.register_kernel(
            name,
            Reduction {
                initialize,
                reduce,
                identity,
            },
        );
    }
}
