use crate::foundation::core::{Float4, Int2};
use crate::foundation::error::CompositorResult;
use crate::gpu::{GpuDevice, TextureFormat, TextureId};

/// Longest edge run, in pixels on either side, the blending-weights stage resolves.
pub(crate) const SMAA_MAX_SEARCH_DISTANCE: i32 = 15;

/// Distances per crossing code in the area texture.
pub(crate) const SMAA_AREA_DISTANCES: i32 = 16;

/// Crossing codes per end of an edge run: none, p-side, far side, both.
pub(crate) const SMAA_CROSSING_CODES: i32 = 4;

pub(crate) const SMAA_AREA_TEXTURE_SIZE: Int2 = Int2::new(
    SMAA_CROSSING_CODES * SMAA_AREA_DISTANCES,
    SMAA_CROSSING_CODES * SMAA_AREA_DISTANCES,
);

pub(crate) const SMAA_SEARCH_TEXTURE_SIZE: Int2 = Int2::new(4, 1);

/// Pixels an edge continues over a pair of consecutive pixels, indexed by
/// `near_has_edge + 2 * far_has_edge`.
pub(crate) const SMAA_SEARCH_TABLE: [f32; 4] = [0.0, 1.0, 0.0, 2.0];

/// Height of the reconstructed silhouette at an end of an edge run.
///
/// A crossing edge on the p side bends the silhouette into p; one on the far side bends it
/// away; none or both leave the end on the edge itself.
pub(crate) fn crossing_offset(code: i32) -> f32 {
    match code {
        1 => -0.5,
        2 => 0.5,
        _ => 0.0,
    }
}

/// Integrate a line segment over `[a, b]`, split into the area below zero and above zero.
fn segment_area(p0: [f32; 2], p1: [f32; 2], a: f32, b: f32) -> [f32; 2] {
    let lo = a.max(p0[0]);
    let hi = b.min(p1[0]);
    if hi <= lo || p1[0] <= p0[0] {
        return [0.0, 0.0];
    }
    let height = |x: f32| p0[1] + (p1[1] - p0[1]) * (x - p0[0]) / (p1[0] - p0[0]);
    let (h0, h1) = (height(lo), height(hi));

    let mut area = [0.0f32, 0.0f32];
    let mut add = |h0: f32, h1: f32, width: f32| {
        let mean = 0.5 * (h0 + h1);
        if mean < 0.0 {
            area[0] += -mean * width;
        } else {
            area[1] += mean * width;
        }
    };
    if h0 * h1 < 0.0 {
        let t = h0 / (h0 - h1);
        let split = lo + (hi - lo) * t;
        add(h0, 0.0, split - lo);
        add(0.0, h1, hi - split);
    } else {
        add(h0, h1, hi - lo);
    }
    area
}

/// Coverage `(negative, positive)` of the pixel `left` pixels from the start of an edge run
/// that continues `right` pixels past it, with the given crossing codes at both ends.
pub(crate) fn crossing_area(left_code: i32, right_code: i32, left: i32, right: i32) -> [f32; 2] {
    let length = (left + right + 1) as f32;
    let a = left as f32;
    let b = a + 1.0;
    let h_left = crossing_offset(left_code);
    let h_right = crossing_offset(right_code);
    let middle = 0.5 * length;

    let add = |x: [f32; 2], y: [f32; 2]| [x[0] + y[0], x[1] + y[1]];
    if h_left * h_right < 0.0 {
        return segment_area([0.0, h_left], [length, h_right], a, b);
    }
    let mut area = [0.0, 0.0];
    if h_left != 0.0 {
        area = add(area, segment_area([0.0, h_left], [middle, 0.0], a, b));
    }
    if h_right != 0.0 {
        area = add(area, segment_area([middle, 0.0], [length, h_right], a, b));
    }
    area
}

fn area_texels() -> Vec<Float4> {
    let size = SMAA_AREA_TEXTURE_SIZE;
    let mut texels = vec![Float4::ZERO; size.area()];
    for right_code in 0..SMAA_CROSSING_CODES {
        for right in 0..SMAA_AREA_DISTANCES {
            for left_code in 0..SMAA_CROSSING_CODES {
                for left in 0..SMAA_AREA_DISTANCES {
                    let [neg, pos] = crossing_area(left_code, right_code, left, right);
                    let x = left_code * SMAA_AREA_DISTANCES + left;
                    let y = right_code * SMAA_AREA_DISTANCES + right;
                    texels[(y * size.x + x) as usize] = Float4::new(neg, pos, 0.0, 0.0);
                }
            }
        }
    }
    texels
}

fn search_texels() -> Vec<Float4> {
    SMAA_SEARCH_TABLE
        .iter()
        .map(|&v| Float4::new(v, 0.0, 0.0, 1.0))
        .collect()
}

fn upload(
    gpu: &mut dyn GpuDevice,
    size: Int2,
    format: TextureFormat,
    texels: &[Float4],
) -> CompositorResult<TextureId> {
    let texture = gpu.create_texture(size, format)?;
    if let Err(e) = gpu.write_texture(texture, texels) {
        gpu.free_texture(texture);
        return Err(e);
    }
    Ok(texture)
}

/// Lookup tables of the blending-weights stage of SMAA.
#[derive(Debug)]
pub struct SmaaPrecomputedTextures {
    area_texture: TextureId,
    search_texture: TextureId,
}

impl SmaaPrecomputedTextures {
    pub(crate) fn new(gpu: &mut dyn GpuDevice) -> CompositorResult<Self> {
        let area_texture = upload(
            gpu,
            SMAA_AREA_TEXTURE_SIZE,
            TextureFormat::Rgba32F,
            &area_texels(),
        )?;
        let search_texture = match upload(
            gpu,
            SMAA_SEARCH_TEXTURE_SIZE,
            TextureFormat::R32F,
            &search_texels(),
        ) {
            Ok(t) => t,
            Err(e) => {
                gpu.free_texture(area_texture);
                return Err(e);
            }
        };
        Ok(Self {
            area_texture,
            search_texture,
        })
    }

    /// Coverage by `(left crossing, left distance)` along x and `(right crossing, right
    /// distance)` along y.
    pub fn area_texture(&self) -> TextureId {
        self.area_texture
    }

    /// Edge continuation by two-pixel edge code.
    pub fn search_texture(&self) -> TextureId {
        self.search_texture
    }
}
