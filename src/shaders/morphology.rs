use crate::foundation::core::{Float4, Int2};
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};

fn morph(is_dilate: bool, a: f32, b: f32) -> f32 {
    if is_dilate { a.max(b) } else { a.min(b) }
}

fn identity(is_dilate: bool) -> f32 {
    if is_dilate { f32::MIN } else { f32::MAX }
}

/// Inclusive range of `center ± radius` clipped to `0..extent`.
fn window(center: i32, radius: i32, extent: i32) -> (i32, i32) {
    (
        center.saturating_sub(radius).max(0),
        center.saturating_add(radius).min(extent - 1),
    )
}

/// Running max or min along a row within `radius`, stored transposed.
struct MorphologicalStep;

impl ComputeKernel for MorphologicalStep {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.texture_size("input_tx");
        if !size.contains(texel) {
            return;
        }
        let radius = inv.uniform_i32("radius");
        let is_dilate = inv.uniform_bool("is_dilate");

        let mut value = identity(is_dilate);
        let (start, end) = window(texel.x, radius, size.x);
        for x in start..=end {
            value = morph(is_dilate, value, inv.texture_load("input_tx", Int2::new(x, texel.y))[0]);
        }
        inv.image_store("output_img", texel.transposed(), Float4::from(value));
    }
}

/// Max or min over a disk of `radius`.
struct MorphologicalDistance;

impl ComputeKernel for MorphologicalDistance {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.texture_size("input_tx");
        if !size.contains(texel) {
            return;
        }
        let radius = inv.uniform_i32("radius");
        let is_dilate = inv.uniform_bool("is_dilate");
        let radius_squared = i64::from(radius) * i64::from(radius);

        let mut value = identity(is_dilate);
        let (start_y, end_y) = window(texel.y, radius, size.y);
        let (start_x, end_x) = window(texel.x, radius, size.x);
        for y in start_y..=end_y {
            let dy = i64::from(y - texel.y);
            for x in start_x..=end_x {
                let dx = i64::from(x - texel.x);
                if dx * dx + dy * dy <= radius_squared {
                    value = morph(is_dilate, value, inv.texture_load("input_tx", Int2::new(x, y))[0]);
                }
            }
        }
        inv.image_store("output_img", texel, Float4::from(value));
    }
}

/// One transposed pass of the feather mode: a gaussian-weighted sum mixed with the strongest
/// falloff-attenuated neighbour by that neighbour's falloff. Erosion runs on inverted values.
struct MorphologicalDistanceFeather;

impl ComputeKernel for MorphologicalDistanceFeather {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.texture_size("input_tx").contains(texel) {
            return;
        }
        let is_dilate = inv.uniform_bool("is_dilate");
        let read = |v: f32| if is_dilate { v } else { 1.0 - v };

        let center = read(inv.texture_load("input_tx", texel)[0]);
        let mut weighted = center * inv.texture_load("weights_tx", Int2::ZERO)[0];
        let mut limit_distance = center;
        let mut limit_falloff = inv.texture_load("falloffs_tx", Int2::ZERO)[0];

        let taps = inv.texture_size("weights_tx").x;
        for i in 1..taps {
            let weight = inv.texture_load("weights_tx", Int2::new(i, 0))[0];
            let right = read(inv.texture_load("input_tx", texel + Int2::new(i, 0))[0]);
            let left = read(inv.texture_load("input_tx", texel - Int2::new(i, 0))[0]);
            weighted += weight * (right + left);

            let falloff = inv.texture_load("falloffs_tx", Int2::new(i, 0))[0];
            for candidate in [right * falloff, left * falloff] {
                if candidate > limit_distance {
                    limit_distance = candidate;
                    limit_falloff = falloff;
                }
            }
        }

        let value = weighted + (limit_distance - weighted) * limit_falloff;
        inv.image_store("output_img", texel.transposed(), Float4::from(read(value)));
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    device.register_kernel("compositor_morphological_step", MorphologicalStep);
    device.register_kernel("compositor_morphological_distance", MorphologicalDistance);
    device.register_kernel(
        "compositor_morphological_distance_feather",
        MorphologicalDistanceFeather,
    );
}
