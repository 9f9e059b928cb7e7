use crate::foundation::core::Float4;
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};

/// Brightness and contrast adjustment; `brightness` and `contrast` are in percent.
pub(crate) fn bright_contrast(color: Float4, brightness: f32, contrast: f32) -> Float4 {
    let brightness = brightness / 100.0;
    let mut delta = contrast / 200.0;
    let (multiplier, offset) = if contrast > 0.0 {
        let multiplier = 1.0 / (1.0 - delta * 2.0).max(f32::EPSILON);
        (multiplier, multiplier * (brightness - delta))
    } else {
        delta = -delta;
        let multiplier = (1.0 - delta * 2.0).max(0.0);
        (multiplier, multiplier * brightness + delta)
    };
    Float4::new(
        color[0] * multiplier + offset,
        color[1] * multiplier + offset,
        color[2] * multiplier + offset,
        color[3],
    )
}

/// Blend modes of the mix operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendType {
    /// Replace.
    #[default]
    Mix,
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `1 - (1 - a)(1 - b)`
    Screen,
    /// `|a - b|`
    Difference,
    /// `min(a, b)`
    Darken,
    /// `max(a, b)`
    Lighten,
}

impl BlendType {
    pub(crate) fn to_uniform(self) -> i32 {
        match self {
            Self::Mix => 0,
            Self::Add => 1,
            Self::Subtract => 2,
            Self::Multiply => 3,
            Self::Screen => 4,
            Self::Difference => 5,
            Self::Darken => 6,
            Self::Lighten => 7,
        }
    }

    fn from_uniform(v: i32) -> Self {
        match v {
            1 => Self::Add,
            2 => Self::Subtract,
            3 => Self::Multiply,
            4 => Self::Screen,
            5 => Self::Difference,
            6 => Self::Darken,
            7 => Self::Lighten,
            _ => Self::Mix,
        }
    }

    fn blend(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Mix => b,
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Screen => 1.0 - (1.0 - a) * (1.0 - b),
            Self::Difference => (a - b).abs(),
            Self::Darken => a.min(b),
            Self::Lighten => a.max(b),
        }
    }
}

/// Blend `b` over `a` by `factor`. The alpha of `a` is kept.
pub(crate) fn mix_colors(
    blend_type: BlendType,
    factor: f32,
    a: Float4,
    b: Float4,
    use_alpha: bool,
    clamp: bool,
) -> Float4 {
    let factor = if use_alpha { factor * b[3] } else { factor };
    let mut out = a;
    for c in 0..3 {
        let blended = blend_type.blend(a[c], b[c]);
        let v = a[c] + (blended - a[c]) * factor;
        out[c] = if clamp { v.clamp(0.0, 1.0) } else { v };
    }
    out
}

/// Linear remap of `[minimum, minimum + 1 / scale]` onto `[0, 1]`.
pub(crate) fn normalize_value(value: f32, minimum: f32, scale: f32) -> f32 {
    (value - minimum) * scale
}

struct BrightContrast;

impl ComputeKernel for BrightContrast {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.image_size("output_img").contains(texel) {
            return;
        }
        let color = inv.texture_load("input_tx", texel);
        let brightness = inv.uniform_f32("brightness");
        let contrast = inv.uniform_f32("contrast");
        inv.image_store("output_img", texel, bright_contrast(color, brightness, contrast));
    }
}

struct Mix;

impl ComputeKernel for Mix {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.image_size("output_img").contains(texel) {
            return;
        }
        let factor = inv.texture_load("factor_tx", texel)[0];
        let a = inv.texture_load("first_tx", texel);
        let b = inv.texture_load("second_tx", texel);
        let value = mix_colors(
            BlendType::from_uniform(inv.uniform_i32("blend_type")),
            factor,
            a,
            b,
            inv.uniform_bool("use_alpha"),
            inv.uniform_bool("clamp"),
        );
        inv.image_store("output_img", texel, value);
    }
}

struct Normalize;

impl ComputeKernel for Normalize {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.image_size("output_img").contains(texel) {
            return;
        }
        let value = inv.texture_load("input_tx", texel)[0];
        let normalized = normalize_value(
            value,
            inv.uniform_f32("minimum"),
            inv.uniform_f32("scale"),
        );
        inv.image_store("output_img", texel, Float4::from(normalized));
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    device.register_kernel("compositor_bright_contrast", BrightContrast);
    device.register_kernel("compositor_mix", Mix);
    device.register_kernel("compositor_normalize", Normalize);
}
