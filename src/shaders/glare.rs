use crate::foundation::core::{Float4, Int2};
use crate::foundation::math::{adaptive_smooth_clamp, hsv_to_rgb, rgb_to_hsv};
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};

/// Highlights of `color`: HSV value clamped between `threshold` and `max_brightness`, made
/// relative to the threshold.
pub(crate) fn extract_highlights(
    color: Float4,
    threshold: f32,
    max_brightness: f32,
    smoothness: f32,
) -> Float4 {
    let mut hsv = rgb_to_hsv(color.xyz());
    hsv[2] = adaptive_smooth_clamp(hsv[2], threshold, max_brightness, smoothness) - threshold;
    let [r, g, b] = hsv_to_rgb(hsv);
    Float4::rgb(r, g, b)
}

/// Glare with its saturation scaled and `tint` applied.
pub(crate) fn adjust_glare(glare: Float4, saturation: f32, tint: [f32; 3]) -> [f32; 3] {
    let mut hsv = rgb_to_hsv(glare.xyz());
    hsv[1] = (hsv[1] * saturation).clamp(0.0, 1.0);
    let rgb = hsv_to_rgb(hsv);
    [rgb[0] * tint[0], rgb[1] * tint[1], rgb[2] * tint[2]]
}

fn normalized_center(texel: Int2, size: Int2) -> [f32; 2] {
    [
        (texel.x as f32 + 0.5) / size.x.max(1) as f32,
        (texel.y as f32 + 0.5) / size.y.max(1) as f32,
    ]
}

struct Highlights;

impl ComputeKernel for Highlights {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.image_size("output_img");
        if !size.contains(texel) {
            return;
        }
        let color = inv.texture_sample("input_tx", normalized_center(texel, size));
        let highlights = extract_highlights(
            color,
            inv.uniform_f32("threshold"),
            inv.uniform_f32("max_brightness"),
            inv.uniform_f32("highlights_smoothness"),
        );
        inv.image_store("output_img", texel, highlights);
    }
}

/// Iterated causal and non-causal filtering of one line of `img`, in place.
fn simple_star_line(
    inv: &mut Invocation<'_>,
    img: &str,
    origin: Int2,
    step: Int2,
    length: i32,
    iterations: i32,
    fade: f32,
) {
    let at = |i: i32| origin + step * i;
    for iteration in 0..iterations {
        for i in 0..length {
            let previous_output = inv.image_load(img, at(i - iteration));
            let current = inv.image_load(img, at(i));
            let next_input = inv.image_load(img, at(i + iteration));
            let average = (previous_output + next_input) / 2.0;
            inv.image_store(img, at(i), current.lerp(average, fade));
        }
        for i in (0..length).rev() {
            let previous_output = inv.image_load(img, at(i + iteration));
            let current = inv.image_load(img, at(i));
            let next_input = inv.image_load(img, at(i - iteration));
            let average = (previous_output + next_input) / 2.0;
            inv.image_store(img, at(i), current.lerp(average, fade));
        }
    }
}

/// Diagonals run along `(1, 1)`: the first `size.x` start on the top row, the rest down the
/// left column. Anti-diagonals run along `(-1, 1)` and start down the right column instead.
pub(crate) fn number_of_diagonals(size: Int2) -> i32 {
    (size.x + size.y - 1).max(0)
}

fn diagonal_start(size: Int2, index: i32) -> Int2 {
    if index < size.x {
        Int2::new(index, 0)
    } else {
        Int2::new(0, index - size.x + 1)
    }
}

fn anti_diagonal_start(size: Int2, index: i32) -> Int2 {
    if index < size.x {
        Int2::new(index, 0)
    } else {
        Int2::new(size.x - 1, index - size.x + 1)
    }
}

/// One invocation per diagonal.
struct SimpleStarDiagonalPass;

impl ComputeKernel for SimpleStarDiagonalPass {
    fn local_size(&self) -> Int2 {
        Int2::new(16, 1)
    }

    fn sequential(&self) -> bool {
        true
    }

    fn invoke(&self, inv: &mut Invocation<'_>) {
        let index = inv.global_id().x;
        let size = inv.image_size("diagonal_img");
        if inv.global_id().y != 0 || index >= number_of_diagonals(size) {
            return;
        }
        let start = diagonal_start(size, index);
        let length = (size.x - start.x).min(size.y - start.y);
        let iterations = inv.uniform_i32("iterations");
        let fade = inv.uniform_f32("fade_factor");
        simple_star_line(inv, "diagonal_img", start, Int2::new(1, 1), length, iterations, fade);
    }
}

/// One invocation per anti-diagonal; adds the diagonal pass at the end.
struct SimpleStarAntiDiagonalPass;

impl ComputeKernel for SimpleStarAntiDiagonalPass {
    fn local_size(&self) -> Int2 {
        Int2::new(16, 1)
    }

    fn sequential(&self) -> bool {
        true
    }

    fn invoke(&self, inv: &mut Invocation<'_>) {
        let index = inv.global_id().x;
        let size = inv.image_size("anti_diagonal_img");
        if inv.global_id().y != 0 || index >= number_of_diagonals(size) {
            return;
        }
        let start = anti_diagonal_start(size, index);
        let direction = Int2::new(-1, 1);
        let length = (start.x + 1).min(size.y - start.y);
        let iterations = inv.uniform_i32("iterations");
        let fade = inv.uniform_f32("fade_factor");
        simple_star_line(inv, "anti_diagonal_img", start, direction, length, iterations, fade);
        for i in 0..length {
            let texel = start + direction * i;
            let combined =
                inv.texture_load("diagonal_tx", texel) + inv.image_load("anti_diagonal_img", texel);
            inv.image_store("anti_diagonal_img", texel, combined.with_w(1.0));
        }
    }
}

/// Brightness weighted average of four neighbours; damps isolated very bright texels.
pub(crate) fn karis_average(colors: [Float4; 4]) -> Float4 {
    let mut sum = Float4::ZERO;
    let mut total = 0.0;
    for color in colors {
        let brightness = color[0].max(color[1]).max(color[2]);
        let weight = 1.0 / (brightness + 1.0);
        sum += color * weight;
        total += weight;
    }
    if total > 0.0 { sum / total } else { Float4::ZERO }
}

/// Half-size downsampling from 13 bilinear taps over a 6x6 footprint.
struct BloomDownsample {
    karis: bool,
}

impl ComputeKernel for BloomDownsample {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.image_size("output_img");
        if !size.contains(texel) {
            return;
        }
        let center_uv = normalized_center(texel, size);
        let input_size = inv.texture_size("input_tx").max(Int2::ONE);
        let pixel = [1.0 / input_size.x as f32, 1.0 / input_size.y as f32];
        let tap = |dx: f32, dy: f32| {
            inv.texture_sample(
                "input_tx",
                [center_uv[0] + pixel[0] * dx, center_uv[1] + pixel[1] * dy],
            )
        };

        let center = tap(0.0, 0.0);
        let upper_left_near = tap(-1.0, 1.0);
        let upper_right_near = tap(1.0, 1.0);
        let lower_left_near = tap(-1.0, -1.0);
        let lower_right_near = tap(1.0, -1.0);
        let left_far = tap(-2.0, 0.0);
        let right_far = tap(2.0, 0.0);
        let upper_far = tap(0.0, 2.0);
        let lower_far = tap(0.0, -2.0);
        let upper_left_far = tap(-2.0, 2.0);
        let upper_right_far = tap(2.0, 2.0);
        let lower_left_far = tap(-2.0, -2.0);
        let lower_right_far = tap(2.0, -2.0);

        let result = if self.karis {
            let near = karis_average([upper_left_near, upper_right_near, lower_right_near, lower_left_near]);
            let upper_left = karis_average([upper_left_far, upper_far, center, left_far]);
            let upper_right = karis_average([upper_far, upper_right_far, right_far, center]);
            let lower_right = karis_average([center, right_far, lower_right_far, lower_far]);
            let lower_left = karis_average([left_far, center, lower_far, lower_left_far]);
            near * (4.0 / 8.0) + (upper_left + upper_right + lower_left + lower_right) * (1.0 / 8.0)
        } else {
            center * (4.0 / 32.0)
                + (upper_left_near + upper_right_near + lower_left_near + lower_right_near)
                    * (4.0 / 32.0)
                + (left_far + right_far + upper_far + lower_far) * (2.0 / 32.0)
                + (upper_left_far + upper_right_far + lower_left_far + lower_right_far)
                    * (1.0 / 32.0)
        };
        inv.image_store("output_img", texel, result);
    }
}

/// Doubles the input with a 3x3 tent of bilinear taps and adds it to the image in place.
struct BloomUpsample;

impl ComputeKernel for BloomUpsample {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.image_size("output_img");
        if !size.contains(texel) {
            return;
        }
        let center_uv = normalized_center(texel, size);
        let pixel = [1.0 / size.x as f32, 1.0 / size.y as f32];
        let mut upsampled = Float4::ZERO;
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let weight = ((2 - dx.abs()) * (2 - dy.abs())) as f32 / 16.0;
                let uv = [
                    center_uv[0] + pixel[0] * dx as f32,
                    center_uv[1] + pixel[1] * dy as f32,
                ];
                upsampled += inv.texture_sample("input_tx", uv) * weight;
            }
        }
        let combined = inv.image_load("output_img", texel) + upsampled;
        inv.image_store("output_img", texel, combined.with_w(1.0));
    }
}

/// One invocation per row.
struct SimpleStarHorizontalPass;

impl ComputeKernel for SimpleStarHorizontalPass {
    fn local_size(&self) -> Int2 {
        Int2::new(16, 1)
    }

    fn sequential(&self) -> bool {
        true
    }

    fn invoke(&self, inv: &mut Invocation<'_>) {
        let y = inv.global_id().x;
        let size = inv.image_size("horizontal_img");
        if inv.global_id().y != 0 || y >= size.y {
            return;
        }
        let iterations = inv.uniform_i32("iterations");
        let fade = inv.uniform_f32("fade_factor");
        simple_star_line(
            inv,
            "horizontal_img",
            Int2::new(0, y),
            Int2::new(1, 0),
            size.x,
            iterations,
            fade,
        );
    }
}

/// One invocation per column; adds the horizontal pass at the end.
struct SimpleStarVerticalPass;

impl ComputeKernel for SimpleStarVerticalPass {
    fn local_size(&self) -> Int2 {
        Int2::new(16, 1)
    }

    fn sequential(&self) -> bool {
        true
    }

    fn invoke(&self, inv: &mut Invocation<'_>) {
        let x = inv.global_id().x;
        let size = inv.image_size("vertical_img");
        if inv.global_id().y != 0 || x >= size.x {
            return;
        }
        let iterations = inv.uniform_i32("iterations");
        let fade = inv.uniform_f32("fade_factor");
        simple_star_line(
            inv,
            "vertical_img",
            Int2::new(x, 0),
            Int2::new(0, 1),
            size.y,
            iterations,
            fade,
        );
        for y in 0..size.y {
            let texel = Int2::new(x, y);
            let combined = inv.texture_load("horizontal_tx", texel) + inv.image_load("vertical_img", texel);
            inv.image_store("vertical_img", texel, combined.with_w(1.0));
        }
    }
}

/// Input plus adjusted glare scaled by `strength`; the input alpha is kept.
struct Mix;

impl ComputeKernel for Mix {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.image_size("output_img");
        if !size.contains(texel) {
            return;
        }
        let input = inv.texture_load("input_tx", texel).max(Float4::ZERO);
        let glare = inv.texture_sample("glare_tx", normalized_center(texel, size));
        let strength = inv.uniform_f32("strength");
        let [r, g, b] = adjust_glare(
            glare,
            inv.uniform_f32("saturation"),
            inv.uniform_float3("tint"),
        );
        let out = Float4::new(
            input[0] + r * strength,
            input[1] + g * strength,
            input[2] + b * strength,
            input[3],
        );
        inv.image_store("output_img", texel, out);
    }
}

struct WriteGlareOutput;

impl ComputeKernel for WriteGlareOutput {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.image_size("output_img");
        if !size.contains(texel) {
            return;
        }
        let glare = inv.texture_sample("input_tx", normalized_center(texel, size));
        let strength = inv.uniform_f32("strength");
        let [r, g, b] = adjust_glare(
            glare,
            inv.uniform_f32("saturation"),
            inv.uniform_float3("tint"),
        );
        inv.image_store(
            "output_img",
            texel,
            Float4::rgb(r * strength, g * strength, b * strength),
        );
    }
}

/// Bilinear upsampling of the highlights to the input size.
struct WriteHighlightsOutput;

impl ComputeKernel for WriteHighlightsOutput {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        let size = inv.image_size("output_img");
        if !size.contains(texel) {
            return;
        }
        let value = inv.texture_sample("input_tx", normalized_center(texel, size));
        inv.image_store("output_img", texel, value);
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    device.register_kernel("compositor_glare_highlights", Highlights);
    device.register_kernel(
        "compositor_glare_simple_star_horizontal_pass",
        SimpleStarHorizontalPass,
    );
    device.register_kernel(
        "compositor_glare_simple_star_vertical_pass",
        SimpleStarVerticalPass,
    );
    device.register_kernel(
        "compositor_glare_simple_star_diagonal_pass",
        SimpleStarDiagonalPass,
    );
    device.register_kernel(
        "compositor_glare_simple_star_anti_diagonal_pass",
        SimpleStarAntiDiagonalPass,
    );
    device.register_kernel(
        "compositor_glare_bloom_downsample_karis_average",
        BloomDownsample { karis: true },
    );
    device.register_kernel(
        "compositor_glare_bloom_downsample_simple_average",
        BloomDownsample { karis: false },
    );
    device.register_kernel("compositor_glare_bloom_upsample", BloomUpsample);
    device.register_kernel("compositor_glare_mix", Mix);
    device.register_kernel("compositor_glare_write_glare_output", WriteGlareOutput);
    device.register_kernel(
        "compositor_glare_write_highlights_output",
        WriteHighlightsOutput,
    );
}
