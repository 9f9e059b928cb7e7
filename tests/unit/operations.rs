use super::*;
use crate::context::Context;
use crate::foundation::core::{Affine, Float4, Int2};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::operation::OperationIo;
use crate::result::{Interpolation, OpResult, ResultType};
use crate::shaders::color::BlendType;
use crate::testing::{
    assert_close, context, context_with_pass, live_textures, read, single_value,
    texture_from_fn,
};
use crate::tree::NodeDef;

fn run(op: &mut dyn Operation, ctx: &mut Context, inputs: Vec<(&'static str, OpResult)>) -> OperationIo {
    let mut io = OperationIo::new();
    for input in op.input_descriptors() {
        io.set_input(input.name, single_value(ctx, input.ty, input.default));
    }
    for (name, result) in inputs {
        io.set_input(name, result);
    }
    for output in op.output_descriptors() {
        io.set_output(output.name, ctx.create_result(output.ty));
    }
    let domain = op.compute_domain(ctx, &io);
    io.set_domain(domain);
    op.execute(ctx, &mut io).unwrap();
    io
}

fn float(ctx: &Context, v: f32) -> OpResult {
    single_value(ctx, ResultType::Float, Float4::from(v))
}

fn color(ctx: &Context, v: Float4) -> OpResult {
    single_value(ctx, ResultType::Color, v)
}

fn build(node: NodeDef) -> Box<dyn Operation> {
    OperationRegistry::default().create(&node).unwrap()
}

#[test]
fn registry_knows_every_builtin_node_type() {
    let registry = OperationRegistry::with_builtin_operations();
    assert_eq!(
        registry.node_types(),
        vec![
            "anti_alias",
            "blur",
            "bright_contrast",
            "composite",
            "dilate_erode",
            "glare",
            "image",
            "levels",
            "mix",
            "normalize",
            "rgb",
            "transform",
            "value",
        ]
    );
    assert!(registry.contains(" Blur "));
    assert!(registry.create(&NodeDef::new("n", "Glare")).is_ok());
}

#[test]
fn registry_rejects_unknown_types_and_bad_params() {
    let registry = OperationRegistry::default();
    let err = registry.create(&NodeDef::new("n", "lens_distortion")).err().unwrap();
    assert!(matches!(err, CompositorError::Validation(_)));

    let bad = NodeDef::new("b", "blur").with_params(serde_json::json!({ "size": "large" }));
    assert!(matches!(registry.create(&bad).err().unwrap(), CompositorError::Validation(_)));

    let unknown = NodeDef::new("b", "blur").with_params(serde_json::json!({ "sigma": 2 }));
    assert!(registry.create(&unknown).is_err());

    let negative = NodeDef::new("b", "blur").with_params(serde_json::json!({ "size": [-1, 2] }));
    assert!(registry.create(&negative).is_err());
}

#[test]
fn registry_accepts_external_operations() {
    let mut registry = OperationRegistry::new();
    registry.register(
        "gray",
        Box::new(|_: &NodeDef| -> CompositorResult<Box<dyn Operation>> {
            Ok(Box::new(RgbOperation::new(Float4::new(0.5, 0.5, 0.5, 1.0))))
        }),
    );
    assert!(registry.contains("gray"));
    assert!(!registry.contains("rgb"));
    assert_eq!(registry.create(&NodeDef::new("g", "gray")).unwrap().name(), "rgb");
}

#[test]
fn constants_output_single_values() {
    let mut ctx = context(Int2::new(4, 4));
    let mut rgb = build(
        NodeDef::new("c", "rgb").with_params(serde_json::json!({ "color": [1, 0, 0, 1] })),
    );
    let io = run(rgb.as_mut(), &mut ctx, Vec::new());
    assert_eq!(io.output("RGBA").unwrap().single_value(), Float4::new(1.0, 0.0, 0.0, 1.0));

    let mut value = build(NodeDef::new("v", "value"));
    let io = run(value.as_mut(), &mut ctx, Vec::new());
    let out = io.output("Value").unwrap();
    assert!(out.is_single_value());
    assert_eq!(out.single_value()[0], 0.5);
}

#[test]
fn image_wraps_the_host_pass_and_reports_missing_ones() {
    let mut ctx = context_with_pass(Int2::new(8, 8), Int2::new(5, 3), |x, _| Float4::from(x as f32));
    let mut image = build(NodeDef::new("i", "image"));
    let io = run(image.as_mut(), &mut ctx, Vec::new());
    let out = io.output("Image").unwrap();
    assert_eq!(out.domain().size, Int2::new(5, 3));
    assert_eq!(out.texture(), ctx.input_texture("ViewLayer", "Combined"));

    let mut missing = build(
        NodeDef::new("i", "image").with_params(serde_json::json!({ "pass": "Depth" })),
    );
    let io = run(missing.as_mut(), &mut ctx, Vec::new());
    assert!(io.output("Image").unwrap().is_single_value());
    assert_eq!(ctx.info_message(), Some("Pass not rendered yet"));
}

#[test]
fn transform_edits_the_domain_without_touching_texels() {
    let mut ctx = context(Int2::new(8, 8));
    let input = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(32, 32), |_, _| Float4::ONE);
    let textures = live_textures(&ctx);
    let mut op = build(
        NodeDef::new("t", "transform").with_params(serde_json::json!({ "interpolation": "bilinear" })),
    );
    let scale = float(&ctx, 2.0);
    let io = run(op.as_mut(), &mut ctx, vec![("Image", input.clone()), ("Scale", scale)]);

    let out = io.output("Image").unwrap();
    assert_eq!(out.texture(), input.texture());
    assert_eq!(out.domain().size, Int2::new(32, 32));
    assert_eq!(out.domain().transformation, Affine::scale(2.0));
    assert_eq!(out.realization_options().interpolation, Interpolation::Bilinear);
    assert_eq!(live_textures(&ctx), textures);
}

#[test]
fn bright_contrast_fold_matches_the_kernel() {
    let mut ctx = context(Int2::new(4, 4));
    let value = Float4::new(0.2, 0.5, 0.9, 0.7);
    let mut op = BrightContrastOperation;

    let folded = {
        let inputs = vec![
            ("Image", color(&ctx, value)),
            ("Bright", float(&ctx, 10.0)),
            ("Contrast", float(&ctx, 20.0)),
        ];
        run(&mut op, &mut ctx, inputs).output("Image").unwrap().single_value()
    };
    let texture = texture_from_fn(&mut ctx, ResultType::Color, Int2::ONE, |_, _| value);
    let inputs = vec![
        ("Image", texture),
        ("Bright", float(&ctx, 10.0)),
        ("Contrast", float(&ctx, 20.0)),
    ];
    let io = run(&mut op, &mut ctx, inputs);
    let dispatched = read(&mut ctx, io.output("Image").unwrap())[0];
    assert_close(folded, dispatched, 1e-6);
}

#[test]
fn mix_fold_matches_the_kernel() {
    let mut ctx = context(Int2::new(4, 4));
    let a = Float4::new(0.2, 0.4, 0.6, 1.0);
    let b = Float4::new(0.9, 0.1, 0.5, 0.5);
    let mut op = MixOperation::new(BlendType::Multiply, true, false);

    let inputs = vec![("Fac", float(&ctx, 0.3)), ("A", color(&ctx, a)), ("B", color(&ctx, b))];
    let folded = run(&mut op, &mut ctx, inputs)
        .output("Image")
        .unwrap()
        .single_value();

    let texture = texture_from_fn(&mut ctx, ResultType::Color, Int2::ONE, |_, _| a);
    let inputs = vec![("Fac", float(&ctx, 0.3)), ("A", texture), ("B", color(&ctx, b))];
    let io = run(&mut op, &mut ctx, inputs);
    assert_eq!(io.domain().size, Int2::ONE);
    let dispatched = read(&mut ctx, io.output("Image").unwrap())[0];
    assert_close(folded, dispatched, 1e-6);
}

#[test]
fn mix_runs_on_the_domain_of_a_then_b() {
    let mut ctx = context(Int2::new(4, 4));
    let b = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(3, 2), |_, _| Float4::ONE);
    let op = MixOperation::default();
    let mut io = OperationIo::new();
    io.set_input("Fac", float(&ctx, 0.5));
    io.set_input("A", color(&ctx, Float4::ZERO));
    io.set_input("B", b);
    assert_eq!(op.compute_domain(&ctx, &io).size, Int2::new(3, 2));
}

#[test]
fn blur_and_dilate_with_zero_extent_pass_through() {
    let mut ctx = context(Int2::new(4, 4));
    let image = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(6, 6), |x, _| Float4::from(x as f32));
    let mut blur = build(NodeDef::new("b", "blur"));
    let inputs = vec![("Image", image.clone()), ("Size", float(&ctx, 1.0))];
    let io = run(blur.as_mut(), &mut ctx, inputs);
    assert_eq!(io.output("Image").unwrap().texture(), image.texture());

    let mask = texture_from_fn(&mut ctx, ResultType::Float, Int2::new(6, 6), |x, y| Float4::from((x + y) as f32));
    for mode in ["step", "distance", "feather"] {
        let mut op = build(
            NodeDef::new("d", "dilate_erode")
                .with_params(serde_json::json!({ "mode": mode, "distance": 0 })),
        );
        let io = run(op.as_mut(), &mut ctx, vec![("Mask", mask.clone())]);
        let out = io.output("Mask").unwrap();
        assert_eq!(out.texture(), mask.texture());
        assert_eq!(read(&mut ctx, out), read(&mut ctx, &mask));
    }
}

#[test]
fn blur_spreads_a_bright_texel() {
    let mut ctx = context(Int2::new(4, 4));
    let image = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(9, 9), |x, y| {
        if x == 4 && y == 4 { Float4::ONE } else { Float4::ZERO }
    });
    let mut op = BlurOperation::new([2.0, 2.0], crate::cache::FilterType::Gaussian);
    let inputs = vec![("Image", image), ("Size", float(&ctx, 1.0))];
    let io = run(&mut op, &mut ctx, inputs);
    let texels = read(&mut ctx, io.output("Image").unwrap());
    assert!(texels[4 * 9 + 4][0] < 1.0);
    assert!(texels[4 * 9 + 5][0] > 0.0);
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

#[test]
fn glare_adds_streaks_around_highlights() {
    let mut ctx = context(Int2::new(4, 4));
    let image = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(16, 16), |x, y| {
        if x == 8 && y == 8 {
            Float4::new(4.0, 4.0, 4.0, 1.0)
        } else {
            Float4::new(0.0, 0.0, 0.0, 1.0)
        }
    });
    let mut op = build(NodeDef::new("g", "glare"));
    let io = run(op.as_mut(), &mut ctx, vec![("Image", image)]);

    let out = read(&mut ctx, io.output("Image").unwrap());
    assert!(out[8 * 16 + 10][0] > 0.0);
    assert!(out[10 * 16 + 8][0] > 0.0);
    assert_eq!(out[8 * 16 + 10][3], 1.0);
    assert_eq!(out[0][0], 0.0);

    let glare = read(&mut ctx, io.output("Glare").unwrap());
    assert!(glare[8 * 16 + 9][0] > 0.0);
    let highlights = read(&mut ctx, io.output("Highlights").unwrap());
    assert!(highlights[8 * 16 + 8][0] > 0.0);
    assert_eq!(highlights[0][0], 0.0);
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

fn bright_dot(ctx: &mut Context) -> OpResult {
    texture_from_fn(ctx, ResultType::Color, Int2::new(16, 16), |x, y| {
        if x == 8 && y == 8 {
            Float4::new(4.0, 4.0, 4.0, 1.0)
        } else {
            Float4::new(0.0, 0.0, 0.0, 1.0)
        }
    })
}

fn glare_of(ctx: &mut Context, params: serde_json::Value, image: OpResult) -> (Vec<Float4>, Vec<Float4>) {
    let mut op = build(NodeDef::new("g", "glare").with_params(params));
    let io = run(op.as_mut(), ctx, vec![("Image", image)]);
    let glare = read(ctx, io.output("Glare").unwrap());
    let highlights = read(ctx, io.output("Highlights").unwrap());
    (glare, highlights)
}

#[test]
fn diagonal_star_spreads_along_both_diagonals_only() {
    let mut ctx = context(Int2::new(4, 4));
    let image = bright_dot(&mut ctx);
    let (glare, _) = glare_of(&mut ctx, serde_json::json!({ "diagonal": true }), image);
    let at = |x: usize, y: usize| glare[y * 16 + x][0];

    assert!(at(10, 10) > 0.0);
    assert!(at(6, 6) > 0.0);
    assert!(at(10, 6) > 0.0);
    assert!(at(6, 10) > 0.0);
    assert_eq!(at(8, 10), 0.0);
    assert_eq!(at(10, 8), 0.0);

    let image = bright_dot(&mut ctx);
    let (axis, _) = glare_of(&mut ctx, serde_json::json!({}), image);
    assert!(axis[8 * 16 + 10][0] > 0.0);
    assert_eq!(axis[10 * 16 + 10][0], 0.0);
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

#[test]
fn fog_glow_is_a_normalized_isotropic_halo() {
    let mut ctx = context(Int2::new(4, 4));
    let image = bright_dot(&mut ctx);
    let (glare, highlights) =
        glare_of(&mut ctx, serde_json::json!({ "glare_type": "fog_glow" }), image);

    assert!(glare[8 * 16 + 11][0] > 0.0);
    assert!(glare[11 * 16 + 11][0] > 0.0);
    assert!((glare[8 * 16 + 11][0] - glare[11 * 16 + 8][0]).abs() < 1e-5);
    assert!(glare[8 * 16 + 8][0] < highlights[8 * 16 + 8][0]);
    let total: f32 = glare.iter().map(|t| t[0]).sum();
    let source: f32 = highlights.iter().map(|t| t[0]).sum();
    assert!((total - source).abs() < 1e-2 * source, "{total} vs {source}");
}

#[test]
fn bloom_of_a_uniform_image_is_normalized_by_the_chain_length() {
    let mut ctx = context(Int2::new(4, 4));
    let bright = Float4::new(3.0, 2.0, 2.5, 1.0);
    let image = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(16, 16), |_, _| bright);
    let (glare, highlights) = glare_of(
        &mut ctx,
        serde_json::json!({ "glare_type": "bloom", "size": 0.5 }),
        image,
    );
    for (g, h) in glare.iter().zip(&highlights) {
        assert_close(g.with_w(1.0), h.with_w(1.0), 1e-3);
    }

    let image = bright_dot(&mut ctx);
    let (glare, _) = glare_of(&mut ctx, serde_json::json!({ "glare_type": "bloom", "size": 1.0 }), image);
    assert!(glare[8 * 16 + 14][0] > 0.0);
    assert!(glare[2 * 16 + 2][0] > 0.0);
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

#[test]
fn bloom_chain_length_follows_size() {
    let glare = |size: f32| {
        GlareOperation::from_node(
            &NodeDef::new("g", "glare")
                .with_params(serde_json::json!({ "glare_type": "bloom", "size": size })),
        )
        .unwrap()
    };
    assert_eq!(glare(0.5).glare_type(), GlareType::Bloom);
    assert_eq!(glare(0.5).bloom_chain_length(Int2::new(16, 32)), 3);
    assert_eq!(glare(1.0).bloom_chain_length(Int2::new(16, 32)), 4);
    assert_eq!(glare(0.0).bloom_chain_length(Int2::new(16, 32)), 0);
    assert_eq!(glare(7.0).bloom_chain_length(Int2::new(16, 32)), 4);

    let mut ctx = context(Int2::new(4, 4));
    let image = bright_dot(&mut ctx);
    let (glare, highlights) =
        glare_of(&mut ctx, serde_json::json!({ "glare_type": "bloom", "size": 0.0 }), image);
    for (g, h) in glare.iter().zip(&highlights) {
        assert_close(g.with_w(1.0), h.with_w(1.0), 1e-5);
    }
}

#[test]
fn glare_passes_single_values_through() {
    let mut ctx = context(Int2::new(4, 4));
    let mut op = build(NodeDef::new("g", "glare"));
    let value = Float4::new(3.0, 3.0, 3.0, 1.0);
    let inputs = vec![("Image", color(&ctx, value))];
    let io = run(op.as_mut(), &mut ctx, inputs);
    assert_eq!(io.output("Image").unwrap().single_value(), value);
    assert_eq!(io.output("Glare").unwrap().single_value(), Float4::ZERO);
}

#[test]
fn anti_alias_keeps_uniform_images() {
    let mut ctx = context(Int2::new(4, 4));
    let gray = Float4::new(0.5, 0.5, 0.5, 1.0);
    let image = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(20, 12), |_, _| gray);
    let mut op = build(NodeDef::new("a", "anti_alias"));
    let io = run(op.as_mut(), &mut ctx, vec![("Image", image)]);
    assert!(read(&mut ctx, io.output("Image").unwrap()).iter().all(|&t| t == gray));
}

fn ramp(ctx: &mut Context) -> OpResult {
    texture_from_fn(ctx, ResultType::Color, Int2::new(2, 2), |x, y| {
        Float4::new((y * 2 + x) as f32, 0.0, 0.0, 1.0)
    })
}

#[test]
fn levels_computes_mean_and_population_deviation() {
    let mut ctx = context(Int2::new(4, 4));
    let image = ramp(&mut ctx);
    let mut op = LevelsOperation::new(LevelsChannel::Red);
    let io = run(&mut op, &mut ctx, vec![("Image", image.clone())]);
    assert!((io.output("Mean").unwrap().single_value()[0] - 1.5).abs() < 1e-5);
    assert!((io.output("Std Dev").unwrap().single_value()[0] - 1.25f32.sqrt()).abs() < 1e-5);

    let mut op = LevelsOperation::new(LevelsChannel::Combined);
    let io = run(&mut op, &mut ctx, vec![("Image", image)]);
    assert!((io.output("Mean").unwrap().single_value()[0] - 0.5).abs() < 1e-5);
    let expected = ((0.25 + 1.0 / 36.0) * 2.0 / 4.0f32).sqrt();
    assert!((io.output("Std Dev").unwrap().single_value()[0] - expected).abs() < 1e-5);
}

#[test]
fn levels_of_a_single_value_has_no_deviation() {
    let mut ctx = context(Int2::new(4, 4));
    let mut op = LevelsOperation::new(LevelsChannel::Green);
    let inputs = vec![("Image", color(&ctx, Float4::new(0.1, 0.6, 0.3, 1.0)))];
    let io = run(&mut op, &mut ctx, inputs);
    assert_eq!(io.output("Mean").unwrap().single_value()[0], 0.6);
    assert_eq!(io.output("Std Dev").unwrap().single_value()[0], 0.0);
}

#[test]
fn normalize_maps_the_range_onto_unit_interval() {
    let mut ctx = context(Int2::new(4, 4));
    let values = texture_from_fn(&mut ctx, ResultType::Float, Int2::new(5, 1), |x, _| {
        Float4::from(2.0 + x as f32)
    });
    let mut op = NormalizeOperation;
    let io = run(&mut op, &mut ctx, vec![("Value", values)]);
    let out: Vec<f32> = read(&mut ctx, io.output("Value").unwrap()).iter().map(|t| t[0]).collect();
    for (got, want) in out.iter().zip([0.0, 0.25, 0.5, 0.75, 1.0]) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[test]
fn composite_writes_the_region_and_clears_for_single_values() {
    let mut ctx = context(Int2::new(8, 8));
    let mut op = CompositeOperation::new(false);
    assert_eq!(op.compute_domain(&ctx, &OperationIo::new()).size, Int2::new(8, 8));

    let image = texture_from_fn(&mut ctx, ResultType::Color, Int2::new(8, 8), |x, y| {
        Float4::new(x as f32 / 8.0, y as f32 / 8.0, 0.0, 0.5)
    });
    let expected = read(&mut ctx, &image);
    run(&mut op, &mut ctx, vec![("Image", image)]);
    let written = ctx.read_output().unwrap();
    for (got, want) in written.iter().zip(&expected) {
        assert_close(*got, want.with_w(1.0), 1e-6);
    }

    let mut op = CompositeOperation::new(true);
    let red = Float4::new(1.0, 0.0, 0.0, 0.25);
    let inputs = vec![("Image", color(&ctx, red))];
    run(&mut op, &mut ctx, inputs);
    assert!(ctx.read_output().unwrap().iter().all(|&t| t == red));
}

#[test]
fn dilate_erode_distance_is_clamped() {
    use crate::cache::FalloffType;

    for (distance, clamped) in [
        (5000, 5000),
        (-5000, -5000),
        (50_000, 5000),
        (i32::MAX, 5000),
        (i32::MIN, -5000),
        (-7, -7),
    ] {
        let op = DilateErodeOperation::new(DilateErodeMode::Distance, distance, FalloffType::Smooth);
        assert_eq!(op.distance(), clamped, "distance {distance}");
    }
    let node = NodeDef::new("d", "dilate_erode")
        .with_params(serde_json::json!({ "mode": "step", "distance": i32::MIN }));
    assert_eq!(DilateErodeOperation::from_node(&node).unwrap().distance(), -5000);
}
