use super::*;
use crate::cache::weights::symmetric_weights;
use crate::cache::{FalloffType, FilterType};
use crate::context::Context;
use crate::foundation::core::{Float4, Int2};
use crate::result::{OpResult, ResultType};
use crate::testing::{assert_close, context, live_textures, read, texture_from_fn};

fn pattern(x: i32, y: i32) -> f32 {
    ((x * 7 + y * 13) % 17) as f32 / 16.0
}

fn float_texture(ctx: &mut Context, size: Int2, f: impl Fn(i32, i32) -> f32) -> OpResult {
    texture_from_fn(ctx, ResultType::Float, size, |x, y| Float4::from(f(x, y)))
}

#[test]
fn reductions_match_host_folds() {
    let mut ctx = context(Int2::new(8, 8));
    let size = Int2::new(41, 23);
    let color = texture_from_fn(&mut ctx, ResultType::Color, size, |x, y| {
        Float4::new(pattern(x, y), pattern(y, x), 0.5, 1.0)
    });
    let texels = read(&mut ctx, &color);
    let red: f32 = texels.iter().map(|t| t[0]).sum();
    let green: f32 = texels.iter().map(|t| t[1]).sum();

    assert!((sum_red(&mut ctx, &color).unwrap() - red).abs() < 1e-2);
    assert!((sum_green(&mut ctx, &color).unwrap() - green).abs() < 1e-2);
    assert!((sum_blue(&mut ctx, &color).unwrap() - 0.5 * size.area() as f32).abs() < 1e-2);
    let total = sum_color(&mut ctx, &color).unwrap();
    assert!((total[3] - size.area() as f32).abs() < 1e-2);

    let mean = red / size.area() as f32;
    let squared: f32 = texels.iter().map(|t| (t[0] - mean) * (t[0] - mean)).sum();
    let reduced = sum_red_squared_difference(&mut ctx, &color, mean).unwrap();
    assert!((reduced - squared).abs() < 1e-2);

    let coefficients = [0.25, 0.5, 0.25];
    let luminance: f32 = texels
        .iter()
        .map(|t| 0.25 * t[0] + 0.5 * t[1] + 0.25 * t[2])
        .sum();
    assert!((sum_luminance(&mut ctx, &color, coefficients).unwrap() - luminance).abs() < 1e-2);
}

#[test]
fn extremes_and_ranged_extremes() {
    let mut ctx = context(Int2::new(8, 8));
    let values = float_texture(&mut ctx, Int2::new(33, 17), |x, y| (x - y) as f32);

    assert_eq!(maximum_float(&mut ctx, &values).unwrap(), 32.0);
    assert_eq!(minimum_float(&mut ctx, &values).unwrap(), -16.0);
    assert_eq!(
        maximum_float_in_range(&mut ctx, &values, -5.0, 5.0).unwrap(),
        5.0
    );
    assert_eq!(
        minimum_float_in_range(&mut ctx, &values, -5.0, 5.0).unwrap(),
        -5.0
    );
    assert_eq!(
        maximum_float_in_range(&mut ctx, &values, 100.0, 200.0).unwrap(),
        100.0
    );
}

#[test]
fn reduction_of_a_single_texel_still_applies_the_initial_transform() {
    let mut ctx = context(Int2::new(8, 8));
    let color = texture_from_fn(&mut ctx, ResultType::Color, Int2::ONE, |_, _| {
        Float4::new(0.2, 0.4, 0.6, 1.0)
    });
    let luminance = maximum_luminance(&mut ctx, &color, [1.0, 0.0, 0.0]).unwrap();
    assert!((luminance - 0.2).abs() < 1e-6);
    let luminance = minimum_luminance(&mut ctx, &color, [0.0, 0.0, 1.0]).unwrap();
    assert!((luminance - 0.6).abs() < 1e-6);
}

#[test]
fn reductions_release_their_intermediates_and_keep_the_source() {
    let mut ctx = context(Int2::new(8, 8));
    let values = float_texture(&mut ctx, Int2::new(300, 40), pattern);
    sum_red(&mut ctx, &values).unwrap();

    assert_eq!(ctx.texture_pool().stats().retained_textures, 3);
    assert!(read(&mut ctx, &values).len() == 300 * 40);
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

fn blur_reference(texels: &[Float4], size: Int2, weights: &[f32]) -> Vec<Float4> {
    let at = |t: &[Float4], w: i32, h: i32, x: i32, y: i32| {
        t[(y.clamp(0, h - 1) * w + x.clamp(0, w - 1)) as usize]
    };
    let pass = |t: &[Float4], w: i32, h: i32| -> Vec<Float4> {
        let mut out = vec![Float4::ZERO; t.len()];
        for y in 0..h {
            for x in 0..w {
                let mut acc = at(t, w, h, x, y) * weights[0];
                for (i, &weight) in weights.iter().enumerate().skip(1) {
                    let i = i as i32;
                    acc += (at(t, w, h, x + i, y) + at(t, w, h, x - i, y)) * weight;
                }
                // transposed store
                out[(x * h + y) as usize] = acc;
            }
        }
        out
    };
    let transposed = pass(texels, size.x, size.y);
    pass(&transposed, size.y, size.x)
}

#[test]
fn separable_blur_matches_the_two_pass_reference() {
    let mut ctx = context(Int2::new(8, 8));
    let size = Int2::new(19, 11);
    let input = texture_from_fn(&mut ctx, ResultType::Color, size, |x, y| {
        Float4::new(pattern(x, y), pattern(x + 3, y), 1.0, 1.0)
    });
    let mut output = ctx.create_result(ResultType::Color);
    symmetric_separable_blur(&mut ctx, &input, &mut output, [3.0, 3.0], FilterType::Gaussian)
        .unwrap();

    assert_eq!(output.domain(), input.domain());
    let expected = blur_reference(
        &read(&mut ctx, &input),
        size,
        &symmetric_weights(FilterType::Gaussian, 3.0),
    );
    for (got, want) in read(&mut ctx, &output).into_iter().zip(expected) {
        assert_close(got, want, 1e-5);
    }
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

#[test]
fn blurring_a_constant_keeps_it_constant() {
    let mut ctx = context(Int2::new(8, 8));
    let input = float_texture(&mut ctx, Int2::new(9, 6), |_, _| 0.75);
    let mut output = ctx.create_result(ResultType::Float);
    symmetric_separable_blur(&mut ctx, &input, &mut output, [4.0, 1.5], FilterType::Tent).unwrap();
    for texel in read(&mut ctx, &output) {
        assert!((texel[0] - 0.75).abs() < 1e-5);
    }
}

fn dot(x: i32, y: i32) -> f32 {
    if x == 5 && y == 5 { 1.0 } else { 0.0 }
}

#[test]
fn step_dilation_grows_a_square() {
    let mut ctx = context(Int2::new(8, 8));
    let input = float_texture(&mut ctx, Int2::new(11, 11), dot);
    let mut output = ctx.create_result(ResultType::Float);
    morphological_step(&mut ctx, &input, &mut output, 2).unwrap();

    let texels = read(&mut ctx, &output);
    for y in 0..11 {
        for x in 0..11 {
            let inside = (x - 5i32).abs() <= 2 && (y - 5i32).abs() <= 2;
            assert_eq!(texels[(y * 11 + x) as usize][0], f32::from(u8::from(inside)));
        }
    }
}

#[test]
fn distance_dilation_grows_a_disk_and_erosion_removes_the_dot() {
    let mut ctx = context(Int2::new(8, 8));
    let input = float_texture(&mut ctx, Int2::new(11, 11), dot);

    let mut dilated = ctx.create_result(ResultType::Float);
    morphological_distance(&mut ctx, &input, &mut dilated, 3).unwrap();
    let texels = read(&mut ctx, &dilated);
    assert_eq!(texels[5 * 11 + 8][0], 1.0);
    assert_eq!(texels[8 * 11 + 8][0], 0.0);

    let mut eroded = ctx.create_result(ResultType::Float);
    morphological_distance(&mut ctx, &input, &mut eroded, -1).unwrap();
    assert!(read(&mut ctx, &eroded).iter().all(|t| t[0] == 0.0));
}

#[test]
fn feather_dilation_stays_between_input_and_step_dilation() {
    let mut ctx = context(Int2::new(8, 8));
    let input = float_texture(&mut ctx, Int2::new(15, 15), |x, y| {
        if (5..10).contains(&x) && (5..10).contains(&y) { 1.0 } else { 0.0 }
    });
    let mut feathered = ctx.create_result(ResultType::Float);
    morphological_distance_feather(&mut ctx, &input, &mut feathered, 3, FalloffType::Smooth)
        .unwrap();

    let texels = read(&mut ctx, &feathered);
    assert!((texels[7 * 15 + 7][0] - 1.0).abs() < 1e-4);
    assert!(texels[7 * 15 + 11][0] > 0.0);
    assert!(texels.iter().all(|t| (-1e-4..=1.0 + 1e-4).contains(&t[0])));
    assert_eq!(texels[0][0], 0.0);
}

#[test]
fn smaa_leaves_uniform_images_untouched() {
    let mut ctx = context(Int2::new(8, 8));
    let gray = Float4::new(0.5, 0.5, 0.5, 1.0);
    let input = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(64, 48), |_, _| gray);
    let mut output = ctx.create_result(ResultType::Color);
    smaa(&mut ctx, &input, &mut output, 0.1, 2.0, 0.25).unwrap();
    assert!(read(&mut ctx, &output).iter().all(|&t| t == gray));
}

#[test]
fn smaa_softens_a_diagonal_staircase() {
    let mut ctx = context(Int2::new(8, 8));
    let size = Int2::new(32, 32);
    let input = float_texture(&mut ctx, size, |x, y| if x / 4 > y / 2 { 1.0 } else { 0.0 });
    let before = read(&mut ctx, &input);
    let mut output = ctx.create_result(ResultType::Float);
    smaa(&mut ctx, &input, &mut output, 0.1, 2.0, 0.25).unwrap();

    let after = read(&mut ctx, &output);
    assert!(after.iter().all(|t| (0.0..=1.0).contains(&t[0])));
    let changed = before.iter().zip(&after).filter(|(a, b)| a != b).count();
    assert!(changed > 0);
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

#[test]
fn smaa_blends_a_hard_diagonal_by_its_step_coverage() {
    let mut ctx = context(Int2::new(8, 8));
    let size = Int2::new(24, 24);
    let input = float_texture(&mut ctx, size, |x, y| if x > y { 1.0 } else { 0.0 });
    let mut output = ctx.create_result(ResultType::Float);
    smaa(&mut ctx, &input, &mut output, 0.1, 2.0, 0.25).unwrap();

    // A line through the midpoints of one-pixel steps covers an eighth of each step pixel.
    let texels = read(&mut ctx, &output);
    let at = |x: i32, y: i32| texels[(y * size.x + x) as usize][0];
    for k in 3..20 {
        assert!((at(k, k) - 0.125).abs() < 1e-5, "below the line at {k}: {}", at(k, k));
        assert!((at(k + 1, k) - 0.875).abs() < 1e-5, "above the line at {k}: {}", at(k + 1, k));
        assert_eq!(at(k - 1, k), 0.0);
        assert_eq!(at(k + 2, k), 1.0);
    }
}

#[test]
fn corner_rounding_controls_blending_at_square_corners() {
    let mut ctx = context(Int2::new(8, 8));
    let size = Int2::new(24, 24);
    let square = |x: i32, y: i32| {
        if (8..16).contains(&x) && (8..16).contains(&y) { 1.0 } else { 0.0 }
    };
    let input = float_texture(&mut ctx, size, square);

    let corner = |ctx: &mut Context, rounding: f32| {
        let mut output = ctx.create_result(ResultType::Float);
        smaa(ctx, &input, &mut output, 0.1, 2.0, rounding).unwrap();
        read(ctx, &output)[(8 * size.x + 8) as usize][0]
    };
    assert_eq!(corner(&mut ctx, 0.0), 1.0);
    assert!((corner(&mut ctx, 0.25) - 0.890_625).abs() < 1e-5);
    assert!((corner(&mut ctx, 1.0) - 0.5625).abs() < 1e-5);
}

#[test]
fn smaa_copies_single_values() {
    let mut ctx = context(Int2::new(8, 8));
    let before = live_textures(&ctx);
    let mut input = ctx.create_result(ResultType::Color);
    input.set_single_value(Float4::new(0.1, 0.2, 0.3, 1.0));
    let mut output = ctx.create_result(ResultType::Color);
    smaa(&mut ctx, &input, &mut output, 0.1, 2.0, 0.25).unwrap();
    assert_eq!(output.single_value(), Float4::new(0.1, 0.2, 0.3, 1.0));
    assert_eq!(live_textures(&ctx), before);
}

#[test]
fn extreme_distances_are_clamped_and_cover_the_texture() {
    let mut ctx = context(Int2::new(8, 8));
    let input = float_texture(&mut ctx, Int2::new(11, 11), dot);
    let hole = float_texture(&mut ctx, Int2::new(11, 11), |x, y| 1.0 - dot(x, y));

    for distance in [MAX_MORPHOLOGICAL_DISTANCE, 50_000, i32::MAX] {
        let mut stepped = ctx.create_result(ResultType::Float);
        morphological_step(&mut ctx, &input, &mut stepped, distance).unwrap();
        assert!(read(&mut ctx, &stepped).iter().all(|t| t[0] == 1.0));

        let mut disk = ctx.create_result(ResultType::Float);
        morphological_distance(&mut ctx, &input, &mut disk, distance).unwrap();
        assert!(read(&mut ctx, &disk).iter().all(|t| t[0] == 1.0));
    }

    for distance in [-MAX_MORPHOLOGICAL_DISTANCE, i32::MIN] {
        let mut stepped = ctx.create_result(ResultType::Float);
        morphological_step(&mut ctx, &hole, &mut stepped, distance).unwrap();
        assert!(read(&mut ctx, &stepped).iter().all(|t| t[0] == 0.0));

        let mut disk = ctx.create_result(ResultType::Float);
        morphological_distance(&mut ctx, &hole, &mut disk, distance).unwrap();
        assert!(read(&mut ctx, &disk).iter().all(|t| t[0] == 0.0));

        let mut feathered = ctx.create_result(ResultType::Float);
        morphological_distance_feather(&mut ctx, &hole, &mut feathered, distance, FalloffType::Smooth)
            .unwrap();
        let texels = read(&mut ctx, &feathered);
        assert!(texels.iter().all(|t| t[0].is_finite() && (-1e-4..=1.0 + 1e-4).contains(&t[0])));
        assert!(texels[5 * 11 + 5][0].abs() < 1e-4);
    }
    assert_eq!(ctx.gpu().stats().hazards, 0);
}
