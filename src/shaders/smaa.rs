//! Subpixel morphological anti-aliasing in three passes: luminance edge detection, blending
//! weights from edge runs and crossing patterns, and neighborhood blending.
//!
//! Diagonal lines are resolved as runs of one-pixel orthogonal edges; there is no diagonal
//! search. Runs ending in a sharp corner have their weights reduced by the corner rounding.
//!
//! Edges of a pixel are stored on the pixel itself: `r` for its left edge, `g` for its top
//! edge. Weights are stored per edge the same way: `(r, g)` for the top edge, `(b, a)` for
//! the left edge, where the first of each pair is how much this pixel takes from its
//! neighbour across the edge and the second how much the neighbour takes from it.

use crate::cache::smaa::{SMAA_AREA_DISTANCES, SMAA_MAX_SEARCH_DISTANCE};
use crate::foundation::core::{Float4, Int2};
use crate::foundation::math::dot3;
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};

fn luminance_at(inv: &Invocation<'_>, texel: Int2, coefficients: [f32; 3]) -> f32 {
    dot3(inv.texture_load("input_tx", texel).xyz(), coefficients)
}

struct EdgeDetection;

impl ComputeKernel for EdgeDetection {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.texture_size("input_tx").contains(texel) {
            return;
        }
        let coefficients = inv.uniform_float3("luminance_coefficients");
        let threshold = inv.uniform_f32("threshold");
        let adaptation = inv.uniform_f32("local_contrast_adaptation_factor");
        let luma = |offset: Int2| luminance_at(inv, texel + offset, coefficients);

        let center = luma(Int2::ZERO);
        let left = luma(Int2::new(-1, 0));
        let top = luma(Int2::new(0, -1));
        let delta_left_left = (left - luma(Int2::new(-2, 0))).abs();
        let delta_top_top = (top - luma(Int2::new(0, -2))).abs();
        let delta_right = (center - luma(Int2::new(1, 0))).abs();
        let delta_bottom = (center - luma(Int2::new(0, 1))).abs();
        let delta_left = (center - left).abs();
        let delta_top = (center - top).abs();

        let mut edge_left = delta_left >= threshold;
        let mut edge_top = delta_top >= threshold;
        if !edge_left && !edge_top {
            inv.image_store("edges_img", texel, Float4::ZERO);
            return;
        }

        let max_delta = [
            delta_left,
            delta_top,
            delta_right,
            delta_bottom,
            delta_left_left,
            delta_top_top,
        ]
        .into_iter()
        .fold(0.0f32, f32::max);

        edge_left &= adaptation * delta_left >= max_delta;
        edge_top &= adaptation * delta_top >= max_delta;
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        inv.image_store(
            "edges_img",
            texel,
            Float4::new(flag(edge_left), flag(edge_top), 0.0, 0.0),
        );
    }
}

fn has_edge(inv: &Invocation<'_>, texel: Int2, channel: usize) -> bool {
    inv.texture_load_zero("edges_tx", texel)[channel] > 0.5
}

/// Pixels the edge in `channel` continues from `texel` along `direction`, two pixels per step.
fn search_edge(inv: &Invocation<'_>, texel: Int2, direction: Int2, channel: usize) -> i32 {
    let mut distance = 0;
    while distance < SMAA_MAX_SEARCH_DISTANCE {
        let near = has_edge(inv, texel + direction * (distance + 1), channel);
        let far = has_edge(inv, texel + direction * (distance + 2), channel);
        let code = i32::from(near) + 2 * i32::from(far);
        let advance = inv.texture_load("search_tx", Int2::new(code, 0))[0] as i32;
        distance += advance;
        if advance < 2 {
            break;
        }
    }
    distance.min(SMAA_MAX_SEARCH_DISTANCE)
}

fn crossing_code(near_side: bool, far_side: bool) -> i32 {
    i32::from(near_side) + 2 * i32::from(far_side)
}

/// Weight multipliers `(negative, positive)` of an edge run whose crossing edges continue
/// into a sharp corner. Only the end nearer to the pixel counts, both on a tie. `across` steps
/// from the run to its negative side; `crossing` is the channel of the crossing edges.
fn corner_factors(
    inv: &Invocation<'_>,
    corner_rounding: f32,
    start: Int2,
    end: Int2,
    distances: [i32; 2],
    across: Int2,
    crossing: usize,
) -> [f32; 2] {
    let near_start = f32::from(u8::from(distances[0] <= distances[1]));
    let near_end = f32::from(u8::from(distances[1] <= distances[0]));
    let sharpness = (1.0 - corner_rounding) / (near_start + near_end);
    let edge = |texel: Int2| f32::from(u8::from(has_edge(inv, texel, crossing)));

    let negative = 1.0
        - sharpness * near_start * edge(start + across)
        - sharpness * near_end * edge(end + across);
    let positive = 1.0
        - sharpness * near_start * edge(start - across * 2)
        - sharpness * near_end * edge(end - across * 2);
    [negative.clamp(0.0, 1.0), positive.clamp(0.0, 1.0)]
}

fn area(inv: &Invocation<'_>, left_code: i32, right_code: i32, left: i32, right: i32) -> [f32; 2] {
    let texel = Int2::new(
        left_code * SMAA_AREA_DISTANCES + left,
        right_code * SMAA_AREA_DISTANCES + right,
    );
    let v = inv.texture_load("area_tx", texel);
    [v[0], v[1]]
}

struct BlendingWeights;

impl ComputeKernel for BlendingWeights {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.texture_size("edges_tx").contains(texel) {
            return;
        }
        let edges = inv.texture_load("edges_tx", texel);
        let corner_rounding = inv.uniform_f32("corner_rounding");
        let mut weights = Float4::ZERO;

        if edges[1] > 0.5 {
            let left = search_edge(inv, texel, Int2::new(-1, 0), 1);
            let right = search_edge(inv, texel, Int2::new(1, 0), 1);
            let start = texel - Int2::new(left, 0);
            let end = texel + Int2::new(right + 1, 0);
            let left_code = crossing_code(
                has_edge(inv, start, 0),
                has_edge(inv, start - Int2::new(0, 1), 0),
            );
            let right_code = crossing_code(
                has_edge(inv, end, 0),
                has_edge(inv, end - Int2::new(0, 1), 0),
            );
            let [neg, pos] = area(inv, left_code, right_code, left, right);
            let [neg_factor, pos_factor] = corner_factors(
                inv,
                corner_rounding,
                start,
                end,
                [left, right],
                Int2::new(0, 1),
                0,
            );
            weights[0] = neg * neg_factor;
            weights[1] = pos * pos_factor;
        }

        if edges[0] > 0.5 {
            let up = search_edge(inv, texel, Int2::new(0, -1), 0);
            let down = search_edge(inv, texel, Int2::new(0, 1), 0);
            let start = texel - Int2::new(0, up);
            let end = texel + Int2::new(0, down + 1);
            let top_code = crossing_code(
                has_edge(inv, start, 1),
                has_edge(inv, start - Int2::new(1, 0), 1),
            );
            let bottom_code = crossing_code(
                has_edge(inv, end, 1),
                has_edge(inv, end - Int2::new(1, 0), 1),
            );
            let [neg, pos] = area(inv, top_code, bottom_code, up, down);
            let [neg_factor, pos_factor] = corner_factors(
                inv,
                corner_rounding,
                start,
                end,
                [up, down],
                Int2::new(1, 0),
                1,
            );
            weights[2] = neg * neg_factor;
            weights[3] = pos * pos_factor;
        }

        inv.image_store("weights_img", texel, weights);
    }
}

struct NeighborhoodBlending {
    single_channel: bool,
}

impl ComputeKernel for NeighborhoodBlending {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.texture_size("input_tx").contains(texel) {
            return;
        }
        let own = inv.texture_load("weights_tx", texel);
        let top = own[0];
        let bottom = inv.texture_load_zero("weights_tx", texel + Int2::new(0, 1))[1];
        let left = own[2];
        let right = inv.texture_load_zero("weights_tx", texel + Int2::new(1, 0))[3];

        let center = inv.texture_load("input_tx", texel);
        let value = if top + bottom + left + right < 1e-5 {
            center
        } else if top.max(bottom) > left.max(right) {
            center * (1.0 - top - bottom)
                + inv.texture_load("input_tx", texel - Int2::new(0, 1)) * top
                + inv.texture_load("input_tx", texel + Int2::new(0, 1)) * bottom
        } else {
            center * (1.0 - left - right)
                + inv.texture_load("input_tx", texel - Int2::new(1, 0)) * left
                + inv.texture_load("input_tx", texel + Int2::new(1, 0)) * right
        };
        let value = if self.single_channel {
            Float4::from(value[0])
        } else {
            value
        };
        inv.image_store("output_img", texel, value);
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    device.register_kernel("compositor_smaa_edge_detection", EdgeDetection);
    device.register_kernel("compositor_smaa_blending_weights", BlendingWeights);
    device.register_kernel(
        "compositor_smaa_neighborhood_blending_float4",
        NeighborhoodBlending {
            single_channel: false,
        },
    );
    device.register_kernel(
        "compositor_smaa_neighborhood_blending_float",
        NeighborhoodBlending {
            single_channel: true,
        },
    );
}
