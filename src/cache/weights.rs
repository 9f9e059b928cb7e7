use crate::foundation::core::{Float4, Int2};
use crate::foundation::error::CompositorResult;
use crate::gpu::{GpuDevice, TextureFormat, TextureId};

/// Reconstruction filters for symmetric blur weights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Constant over the radius.
    Box,
    /// Linear falloff.
    Tent,
    /// Quadratic B-spline.
    Quadratic,
    /// Cubic B-spline.
    Cubic,
    /// Gaussian.
    #[default]
    Gaussian,
    /// Treated as [`FilterType::Gaussian`].
    FastGaussian,
    /// Catmull-Rom spline.
    CatmullRom,
    /// Mitchell-Netravali with `B = C = 1/3`.
    Mitchell,
}

/// Shapes of morphological distance falloffs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FalloffType {
    /// `3x^2 - 2x^3`
    #[default]
    Smooth,
    /// `sqrt(2x - x^2)`
    Sphere,
    /// `sqrt(x)`
    Root,
    /// `x^2`
    Sharp,
    /// `x(2 - x)`
    InverseSquare,
    /// `x`
    Linear,
}

const GAUSSIAN_FACTOR: f32 = 1.6;

/// Filter value at normalized distance `x`, where `|x| = 1` is the filter radius.
pub(crate) fn filter_value(filter: FilterType, x: f32) -> f32 {
    let x = x.abs();
    match filter {
        FilterType::Box => {
            if x > 1.0 {
                0.0
            } else {
                1.0
            }
        }
        FilterType::Tent => {
            if x > 1.0 {
                0.0
            } else {
                1.0 - x
            }
        }
        FilterType::Gaussian | FilterType::FastGaussian => {
            let two_sigma2 = 2.0 * GAUSSIAN_FACTOR * GAUSSIAN_FACTOR;
            let x = x * 3.0 * GAUSSIAN_FACTOR;
            (-x * x / two_sigma2).exp() / (std::f32::consts::PI * two_sigma2).sqrt()
        }
        FilterType::Quadratic => quadratic(x * GAUSSIAN_FACTOR),
        FilterType::Cubic => cubic(x * GAUSSIAN_FACTOR),
        FilterType::CatmullRom => catmull_rom(x * GAUSSIAN_FACTOR),
        FilterType::Mitchell => mitchell(x * GAUSSIAN_FACTOR),
    }
}

fn quadratic(x: f32) -> f32 {
    if x < 0.5 {
        0.75 - x * x
    } else if x < 1.5 {
        0.5 * (x - 1.5) * (x - 1.5)
    } else {
        0.0
    }
}

fn cubic(x: f32) -> f32 {
    let x2 = x * x;
    if x < 1.0 {
        0.5 * x * x2 - x2 + 2.0 / 3.0
    } else if x < 2.0 {
        (2.0 - x).powi(3) / 6.0
    } else {
        0.0
    }
}

fn catmull_rom(x: f32) -> f32 {
    let x2 = x * x;
    if x < 1.0 {
        1.5 * x2 * x - 2.5 * x2 + 1.0
    } else if x < 2.0 {
        -0.5 * x2 * x + 2.5 * x2 - 4.0 * x + 2.0
    } else {
        0.0
    }
}

fn mitchell(x: f32) -> f32 {
    const B: f32 = 1.0 / 3.0;
    const C: f32 = 1.0 / 3.0;
    if x < 1.0 {
        ((12.0 - 9.0 * B - 6.0 * C) * x * x * x
            + (-18.0 + 12.0 * B + 6.0 * C) * x * x
            + (6.0 - 2.0 * B))
            / 6.0
    } else if x < 2.0 {
        ((-B - 6.0 * C) * x * x * x
            + (6.0 * B + 30.0 * C) * x * x
            + (-12.0 * B - 48.0 * C) * x
            + (8.0 * B + 24.0 * C))
            / 6.0
    } else {
        0.0
    }
}

/// Non-negative half of a normalized symmetric kernel: `ceil(radius) + 1` taps, center first.
///
/// Every non-center tap stands for itself and its mirror, so it counts twice in the sum.
pub(crate) fn symmetric_weights(filter: FilterType, radius: f32) -> Vec<f32> {
    let radius = radius.max(0.0);
    let size = radius.ceil() as usize + 1;
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let x = if radius > 0.0 { i as f32 / radius } else { 0.0 };
            filter_value(filter, x)
        })
        .collect();

    let sum = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    if sum > 0.0 {
        for w in &mut weights {
            *w /= sum;
        }
    }
    weights
}

pub(crate) fn falloff_value(falloff: FalloffType, distance: f32) -> f32 {
    let x = 1.0 - distance;
    match falloff {
        FalloffType::Smooth => 3.0 * x * x - 2.0 * x * x * x,
        FalloffType::Sphere => (2.0 * x - x * x).max(0.0).sqrt(),
        FalloffType::Root => x.max(0.0).sqrt(),
        FalloffType::Sharp => x * x,
        FalloffType::InverseSquare => x * (2.0 - x),
        FalloffType::Linear => x,
    }
}

/// `radius + 1` unnormalized falloff taps: one at distance zero, zero at the radius.
pub(crate) fn distance_falloffs(falloff: FalloffType, radius: i32) -> Vec<f32> {
    let radius = radius.max(0);
    (0..=radius)
        .map(|i| {
            let d = if radius > 0 {
                i as f32 / radius as f32
            } else {
                0.0
            };
            falloff_value(falloff, d)
        })
        .collect()
}

pub(crate) fn upload_1d(gpu: &mut dyn GpuDevice, values: &[f32]) -> CompositorResult<TextureId> {
    let texture = gpu.create_texture(Int2::new(values.len() as i32, 1), TextureFormat::R32F)?;
    let texels: Vec<Float4> = values.iter().map(|&v| Float4::new(v, 0.0, 0.0, 1.0)).collect();
    if let Err(e) = gpu.write_texture(texture, &texels) {
        gpu.free_texture(texture);
        return Err(e);
    }
    Ok(texture)
}

/// Normalized half-kernel of a symmetric separable blur.
#[derive(Debug)]
pub struct SymmetricBlurWeights {
    texture: TextureId,
    weights: Vec<f32>,
}

impl SymmetricBlurWeights {
    pub(crate) fn new(
        gpu: &mut dyn GpuDevice,
        filter: FilterType,
        radius: f32,
    ) -> CompositorResult<Self> {
        let weights = symmetric_weights(filter, radius);
        let texture = upload_1d(gpu, &weights)?;
        Ok(Self { texture, weights })
    }

    /// 1D `R32F` texture holding [`Self::weights`].
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Center tap first.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Gaussian half-kernel used by the feather morphological mode.
#[derive(Debug)]
pub struct MorphologicalDistanceFeatherWeights {
    texture: TextureId,
    weights: Vec<f32>,
}

impl MorphologicalDistanceFeatherWeights {
    pub(crate) fn new(gpu: &mut dyn GpuDevice, radius: i32) -> CompositorResult<Self> {
        let weights = symmetric_weights(FilterType::Gaussian, radius.max(0) as f32);
        let texture = upload_1d(gpu, &weights)?;
        Ok(Self { texture, weights })
    }

    /// 1D `R32F` texture holding [`Self::weights`].
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Center tap first.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Falloff curve sampled at integer distances.
#[derive(Debug)]
pub struct DistanceFalloffs {
    texture: TextureId,
    falloffs: Vec<f32>,
}

impl DistanceFalloffs {
    pub(crate) fn new(
        gpu: &mut dyn GpuDevice,
        falloff: FalloffType,
        radius: i32,
    ) -> CompositorResult<Self> {
        let falloffs = distance_falloffs(falloff, radius);
        let texture = upload_1d(gpu, &falloffs)?;
        Ok(Self { texture, falloffs })
    }

    /// 1D `R32F` texture holding [`Self::falloffs`].
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Falloff at distance `0..=radius`.
    pub fn falloffs(&self) -> &[f32] {
        &self.falloffs
    }
}
