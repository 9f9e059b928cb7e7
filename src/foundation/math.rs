use crate::foundation::core::Float4;

/// Rec. 709 luminance weights, the default when the host does not provide its own.
pub(crate) const REC709_LUMINANCE: [f32; 3] = [0.2126, 0.7152, 0.0722];

pub(crate) fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn luminance(color: Float4, coefficients: [f32; 3]) -> f32 {
    dot3(color.xyz(), coefficients)
}

/// RGB to HSV with hue in `[0, 1)`. Values above one are kept as-is in `v`.
pub(crate) fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;

    let h = if chroma <= 0.0 {
        0.0
    } else if max == r {
        ((g - b) / chroma).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / chroma + 2.0) / 6.0
    } else {
        ((r - g) / chroma + 4.0) / 6.0
    };
    let s = if max > 0.0 { chroma / max } else { 0.0 };
    [h, s, max]
}

pub(crate) fn hsv_to_rgb(hsv: [f32; 3]) -> [f32; 3] {
    let [h, s, v] = hsv;
    let channel = |offset: f32| {
        let k = (offset + h * 6.0).rem_euclid(6.0);
        let ramp = (k.min(4.0 - k)).clamp(0.0, 1.0);
        v - v * s * ramp
    };
    [channel(5.0), channel(3.0), channel(1.0)]
}

/// Quadratic polynomial smooth minimum, intentionally left unnormalized so the transition
/// width equals `smoothness`.
pub(crate) fn smooth_min(a: f32, b: f32, smoothness: f32) -> f32 {
    if smoothness == 0.0 {
        return a.min(b);
    }
    let h = (smoothness - (a - b).abs()).max(0.0) / smoothness;
    a.min(b) - h * h * smoothness * 0.25
}

pub(crate) fn smooth_max(a: f32, b: f32, smoothness: f32) -> f32 {
    -smooth_min(-a, -b, smoothness)
}

pub(crate) fn smooth_clamp(
    x: f32,
    min_value: f32,
    max_value: f32,
    min_smoothness: f32,
    max_smoothness: f32,
) -> f32 {
    smooth_min(
        max_value,
        smooth_max(min_value, x, min_smoothness),
        max_smoothness,
    )
}

/// Smooth clamp whose smoothness is limited so that, for `0 <= min <= max` and `x >= 0`, inputs
/// at or below `min` still evaluate to exactly `min`.
pub(crate) fn adaptive_smooth_clamp(x: f32, min_value: f32, max_value: f32, smoothness: f32) -> f32 {
    let range_distance = (max_value - min_value).abs();
    let min_to_zero = min_value.abs();
    let max_to_zero = max_value.abs();

    let min_smoothness = smoothness.min(min_to_zero.min(range_distance));
    let max_smoothness = smoothness.min(max_to_zero.min(range_distance));
    smooth_clamp(x, min_value, max_value, min_smoothness, max_smoothness)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
