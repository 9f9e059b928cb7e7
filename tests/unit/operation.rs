use super::*;
use crate::foundation::core::Int2;
use crate::testing::{assert_close, context, read, texture_from_fn};

struct TwoInputs;

impl Operation for TwoInputs {
    fn name(&self) -> &str {
        "two_inputs"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![
            InputDescriptor::new("A", ResultType::Color).with_priority(1),
            InputDescriptor::new("B", ResultType::Color),
            InputDescriptor::new("Factor", ResultType::Float).single_value(),
        ]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Result", ResultType::Color)]
    }

    fn execute(&mut self, _ctx: &mut Context, _io: &mut OperationIo) -> CompositorResult<()> {
        Ok(())
    }
}

fn gradient(ctx: &mut Context, size: Int2) -> OpResult {
    texture_from_fn(ctx, ResultType::Color, size, |x, y| {
        Float4::new(x as f32, y as f32, (x + y) as f32, 1.0)
    })
}

#[test]
fn operation_domain_follows_the_highest_priority_texture_input() {
    let mut ctx = context(Int2::new(16, 16));
    let op = TwoInputs;
    let mut io = OperationIo::new();
    io.set_input("A", gradient(&mut ctx, Int2::new(4, 4)));
    io.set_input("B", gradient(&mut ctx, Int2::new(6, 2)));
    let mut factor = ctx.create_result(ResultType::Float);
    factor.set_single_value(Float4::from(0.5));
    io.set_input("Factor", factor);
    assert_eq!(op.compute_domain(&ctx, &io).size, Int2::new(6, 2));

    let mut single = ctx.create_result(ResultType::Color);
    single.set_single_value(Float4::ONE);
    io.set_input("B", single);
    assert_eq!(op.compute_domain(&ctx, &io).size, Int2::new(4, 4));
}

#[test]
fn operation_domain_of_single_values_is_the_identity() {
    let ctx = context(Int2::new(16, 16));
    let mut io = OperationIo::new();
    let mut single = ctx.create_result(ResultType::Color);
    single.set_single_value(Float4::ONE);
    io.set_input("A", single);
    assert_eq!(TwoInputs.compute_domain(&ctx, &io), Domain::identity());
}

#[test]
fn realization_is_skipped_when_not_needed() {
    let mut ctx = context(Int2::new(16, 16));
    let input = gradient(&mut ctx, Int2::new(4, 4));
    let descriptor = InputDescriptor::new("A", ResultType::Color);

    assert!(
        RealizeOnDomainOperation::construct_if_needed(&input, &descriptor, input.domain())
            .is_none()
    );
    let other = Domain::new(Int2::new(8, 8));
    assert!(
        RealizeOnDomainOperation::construct_if_needed(
            &input,
            &descriptor.clone().without_realization(),
            other
        )
        .is_none()
    );
    assert!(
        RealizeOnDomainOperation::construct_if_needed(
            &input,
            &descriptor.clone().single_value(),
            other
        )
        .is_none()
    );
    let mut single = ctx.create_result(ResultType::Color);
    single.set_single_value(Float4::ONE);
    assert!(RealizeOnDomainOperation::construct_if_needed(&single, &descriptor, other).is_none());
    assert!(RealizeOnDomainOperation::construct_if_needed(&input, &descriptor, other).is_some());
}

#[test]
fn realizing_onto_a_larger_domain_centers_the_input() {
    let mut ctx = context(Int2::new(16, 16));
    let input = gradient(&mut ctx, Int2::new(2, 2));
    let target = Domain::new(Int2::new(4, 4));
    let descriptor = InputDescriptor::new("A", ResultType::Color);
    let mut realize =
        RealizeOnDomainOperation::construct_if_needed(&input, &descriptor, target).unwrap();
    let output = run_processor(&mut realize, &mut ctx, input).unwrap();

    assert_eq!(output.domain(), target);
    let texels = read(&mut ctx, &output);
    assert_eq!(texels[0], Float4::ZERO);
    assert_eq!(texels[4 + 1], Float4::new(0.0, 0.0, 0.0, 1.0));
    assert_eq!(texels[2 * 4 + 2], Float4::new(1.0, 1.0, 2.0, 1.0));
    assert_eq!(texels[3 * 4 + 3], Float4::ZERO);
}

#[test]
fn nearest_scaling_duplicates_texels() {
    let mut ctx = context(Int2::new(16, 16));
    let mut input = gradient(&mut ctx, Int2::new(2, 2));
    input.transform(Affine::scale(2.0));
    let target = Domain::new(Int2::new(4, 4));
    let mut realize = RealizeOnDomainOperation::construct_if_needed(
        &input,
        &InputDescriptor::new("A", ResultType::Color),
        target,
    )
    .unwrap();
    let output = run_processor(&mut realize, &mut ctx, input).unwrap();

    let texels = read(&mut ctx, &output);
    for y in 0..4 {
        for x in 0..4 {
            let expected = Float4::new((x / 2) as f32, (y / 2) as f32, (x / 2 + y / 2) as f32, 1.0);
            assert_eq!(texels[(y * 4 + x) as usize], expected, "texel {x},{y}");
        }
    }
}

#[test]
fn repeat_tiles_the_input_along_the_axis() {
    let mut ctx = context(Int2::new(16, 16));
    let mut input = gradient(&mut ctx, Int2::new(2, 2));
    input.realization_options_mut().repeat_x = true;
    let target = Domain::new(Int2::new(6, 2));
    let mut realize = RealizeOnDomainOperation::construct_if_needed(
        &input,
        &InputDescriptor::new("A", ResultType::Color),
        target,
    )
    .unwrap();
    let output = run_processor(&mut realize, &mut ctx, input).unwrap();

    let texels = read(&mut ctx, &output);
    let row: Vec<f32> = texels[..6].iter().map(|t| t[0]).collect();
    assert_eq!(row, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
}

#[test]
fn bilinear_realization_of_a_constant_texture_is_constant_inside() {
    let mut ctx = context(Int2::new(16, 16));
    let mut input = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(8, 8), |_, _| {
        Float4::new(0.5, 0.25, 0.125, 1.0)
    });
    input.realization_options_mut().interpolation = Interpolation::Bicubic;
    input.transform(Affine::rotate(0.3));
    let target = Domain::new(Int2::new(8, 8));
    let mut realize = RealizeOnDomainOperation::construct_if_needed(
        &input,
        &InputDescriptor::new("A", ResultType::Color),
        target,
    )
    .unwrap();
    let output = run_processor(&mut realize, &mut ctx, input).unwrap();

    let texels = read(&mut ctx, &output);
    assert_close(texels[4 * 8 + 4], Float4::new(0.5, 0.25, 0.125, 1.0), 1e-5);
}

/// Cubic B-spline kernel evaluated at a signed texel distance.
fn bspline(d: f64) -> f64 {
    let d = d.abs();
    if d < 1.0 {
        (4.0 - 6.0 * d * d + 3.0 * d * d * d) / 6.0
    } else if d < 2.0 {
        (2.0 - d).powi(3) / 6.0
    } else {
        0.0
    }
}

#[test]
fn bicubic_realization_of_a_pattern_matches_the_bspline_filter() {
    let mut ctx = context(Int2::new(16, 16));
    let value = |x: i32, y: i32| ((x * 5 + y * 3) % 7) as f64 / 6.0 + f64::from(y) * 0.05;
    let mut input = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(8, 8), |x, y| {
        let v = value(x, y) as f32;
        Float4::new(v, 1.0 - v, 0.5 * v, 1.0)
    });
    input.realization_options_mut().interpolation = Interpolation::Bicubic;
    let (tx, ty) = (0.3, -0.45);
    input.transform(Affine::translate((tx, ty)));
    let target = Domain::new(Int2::new(8, 8));
    let mut realize = RealizeOnDomainOperation::construct_if_needed(
        &input,
        &InputDescriptor::new("A", ResultType::Color),
        target,
    )
    .unwrap();
    let output = run_processor(&mut realize, &mut ctx, input).unwrap();
    let texels = read(&mut ctx, &output);

    for y in 2..6 {
        for x in 2..6 {
            let (px, py) = (f64::from(x) - tx, f64::from(y) - ty);
            let mut expected = 0.0;
            for j in (py.floor() as i32 - 1)..=(py.floor() as i32 + 2) {
                for i in (px.floor() as i32 - 1)..=(px.floor() as i32 + 2) {
                    let weight = bspline(px - f64::from(i)) * bspline(py - f64::from(j));
                    expected += weight * value(i, j);
                }
            }
            let expected = expected as f32;
            let texel = texels[(y * 8 + x) as usize];
            assert_close(
                texel,
                Float4::new(expected, 1.0 - expected, 0.5 * expected, 1.0),
                1e-4,
            );
        }
    }
    let nearest_center = value(4, 4) as f32;
    assert!((texels[4 * 8 + 4][0] - nearest_center).abs() > 1e-3);
}

#[test]
fn degenerate_transforms_realize_to_invalid_results() {
    let mut ctx = context(Int2::new(16, 16));
    let mut input = gradient(&mut ctx, Int2::new(2, 2));
    input.transform(Affine::scale_non_uniform(0.0, 1.0));
    let mut realize = RealizeOnDomainOperation::construct_if_needed(
        &input,
        &InputDescriptor::new("A", ResultType::Color),
        Domain::new(Int2::new(4, 4)),
    )
    .unwrap();
    let output = run_processor(&mut realize, &mut ctx, input).unwrap();
    assert!(output.is_single_value());
    assert_eq!(output.single_value(), Float4::ZERO);
}

#[test]
fn single_values_are_converted_on_the_host() {
    let mut ctx = context(Int2::new(16, 16));
    let mut mask = ctx.create_result(ResultType::Float);
    mask.set_single_value(Float4::from(0.5));
    let descriptor = InputDescriptor::new("Image", ResultType::Color);
    let mut conversion = ConversionOperation::construct_if_needed(&mask, &descriptor).unwrap();
    let output = run_processor(&mut conversion, &mut ctx, mask).unwrap();
    assert_eq!(output.ty(), ResultType::Color);
    assert_eq!(output.single_value(), Float4::new(0.5, 0.5, 0.5, 1.0));
}

#[test]
fn texture_conversion_averages_color_channels() {
    let mut ctx = context(Int2::new(16, 16));
    let color = gradient(&mut ctx, Int2::new(3, 1));
    let descriptor = InputDescriptor::new("Fac", ResultType::Float);
    assert!(
        ConversionOperation::construct_if_needed(&color, &InputDescriptor::new("C", ResultType::Color))
            .is_none()
    );
    let mut conversion = ConversionOperation::construct_if_needed(&color, &descriptor).unwrap();
    let output = run_processor(&mut conversion, &mut ctx, color).unwrap();

    assert_eq!(output.ty(), ResultType::Float);
    let texels = read(&mut ctx, &output);
    let values: Vec<f32> = texels.iter().map(|t| t[0]).collect();
    assert_eq!(values, vec![0.0, 2.0 / 3.0, 4.0 / 3.0]);
}

#[test]
fn realizing_onto_an_empty_domain_dispatches_nothing() {
    let mut ctx = context(Int2::new(16, 16));
    let input = gradient(&mut ctx, Int2::new(4, 4));
    let mut realize = RealizeOnDomainOperation::construct_if_needed(
        &input,
        &InputDescriptor::new("A", ResultType::Color),
        Domain::new(Int2::new(0, 5)),
    )
    .unwrap();
    let dispatches = ctx.gpu().stats().dispatches;
    let output = run_processor(&mut realize, &mut ctx, input).unwrap();

    assert!(output.is_single_value());
    assert_eq!(output.single_value(), Float4::ZERO);
    assert_eq!(ctx.gpu().stats().dispatches, dispatches);
}
