use super::*;
use crate::foundation::core::Float4;
use crate::operations::RgbOperation;
use crate::testing::{assert_close, context, context_with_pass};
use crate::tree::{InputValue, NodeDef, NodeTree};
use std::cell::Cell;
use std::rc::Rc;

fn constant_tree(color: [f32; 4]) -> NodeTree {
    let mut tree = NodeTree::new();
    tree.add_node(
        NodeDef::new("color", "rgb").with_params(serde_json::json!({ "color": color })),
    )
    .add_node(NodeDef::new("out", "composite"))
    .link("color", "RGBA", "out", "Image");
    tree
}

fn evaluator_with(tree: NodeTree) -> Evaluator {
    let mut evaluator = Evaluator::default();
    evaluator.set_node_tree(tree);
    evaluator
}

fn all_pooled_textures_returned(ctx: &Context) -> bool {
    let stats = ctx.texture_pool().stats();
    stats.allocated_textures as usize == stats.retained_textures + stats.dropped_on_release as usize
}

#[test]
fn red_constant_fills_the_output() {
    let mut ctx = context(Int2::new(64, 64));
    let mut evaluator = evaluator_with(constant_tree([1.0, 0.0, 0.0, 1.0]));
    evaluator.evaluate(&mut ctx).unwrap();

    assert_eq!(evaluator.state(), EvaluatorState::Compiled);
    assert_eq!(evaluator.compiled_len(), 2);
    let output = ctx.read_output().unwrap();
    assert_eq!(output.len(), 64 * 64);
    assert!(output.iter().all(|&t| t == Float4::new(1.0, 0.0, 0.0, 1.0)));
}

#[test]
fn nodes_the_output_does_not_depend_on_are_skipped() {
    let mut tree = constant_tree([0.0, 1.0, 0.0, 1.0]);
    tree.add_node(NodeDef::new("unused", "blur"))
        .add_node(NodeDef::new("unused_value", "value"))
        .link("unused_value", "Value", "unused", "Size");
    let mut ctx = context(Int2::new(8, 8));
    let mut evaluator = evaluator_with(tree);
    evaluator.evaluate(&mut ctx).unwrap();
    assert_eq!(evaluator.compiled_len(), 2);
}

#[test]
fn unknown_node_types_report_and_evaluate_nothing() {
    let mut tree = constant_tree([1.0, 1.0, 1.0, 1.0]);
    tree.add_node(NodeDef::new("lens", "lens_distortion"));
    tree.links.clear();
    tree.link("color", "RGBA", "lens", "Image")
        .link("lens", "Image", "out", "Image");

    let mut ctx = context(Int2::new(8, 8));
    let before = ctx.read_output().unwrap();
    let mut evaluator = evaluator_with(tree);
    for _ in 0..2 {
        evaluator.evaluate(&mut ctx).unwrap();
        assert_eq!(ctx.info_message(), Some(UNSUPPORTED_SETUP_MESSAGE));
        assert_eq!(evaluator.compiled_len(), 0);
    }
    assert_eq!(ctx.read_output().unwrap(), before);
}

#[test]
fn trees_without_output_evaluate_nothing() {
    let mut tree = NodeTree::new();
    tree.add_node(NodeDef::new("v", "value"));
    let mut ctx = context(Int2::new(8, 8));
    let mut evaluator = evaluator_with(tree);
    evaluator.evaluate(&mut ctx).unwrap();
    assert_eq!(evaluator.compiled_len(), 0);
    assert_eq!(ctx.info_message(), None);

    let mut empty = Evaluator::default();
    empty.evaluate(&mut ctx).unwrap();
    assert_eq!(empty.compiled_len(), 0);
}

#[test]
fn cycles_are_rejected_and_leave_the_evaluator_idle() {
    let mut tree = NodeTree::new();
    tree.add_node(NodeDef::new("a", "blur"))
        .add_node(NodeDef::new("b", "blur"))
        .add_node(NodeDef::new("out", "composite"))
        .link("a", "Image", "b", "Image")
        .link("b", "Image", "a", "Image")
        .link("b", "Image", "out", "Image");
    let mut ctx = context(Int2::new(8, 8));
    let mut evaluator = evaluator_with(tree);
    let err = evaluator.evaluate(&mut ctx).unwrap_err();
    assert!(matches!(err, CompositorError::Validation(_)));
    assert_eq!(evaluator.state(), EvaluatorState::Idle);
}

#[test]
fn unknown_sockets_are_rejected() {
    let mut tree = constant_tree([1.0; 4]);
    tree.links[0].from_socket = "Color".to_owned();
    let mut ctx = context(Int2::new(8, 8));
    assert!(evaluator_with(tree).evaluate(&mut ctx).is_err());

    let mut tree = constant_tree([1.0; 4]);
    tree.nodes[1] = NodeDef::new("out", "composite").with_input("Alpha", InputValue::Float(1.0));
    assert!(evaluator_with(tree).evaluate(&mut ctx).is_err());
}

#[test]
fn compiled_sequence_is_kept_until_the_tree_changes() {
    let builds = Rc::new(Cell::new(0));
    let mut evaluator = Evaluator::default();
    let counter = Rc::clone(&builds);
    evaluator.registry_mut().register(
        "rgb",
        Box::new(move |node: &NodeDef| -> CompositorResult<Box<dyn Operation>> {
            counter.set(counter.get() + 1);
            Ok(Box::new(RgbOperation::from_node(node)?))
        }),
    );

    let mut ctx = context(Int2::new(8, 8));
    evaluator.set_node_tree(constant_tree([1.0, 0.0, 0.0, 1.0]));
    evaluator.evaluate(&mut ctx).unwrap();
    evaluator.evaluate(&mut ctx).unwrap();
    assert_eq!(builds.get(), 1);

    evaluator.set_node_tree(constant_tree([1.0, 0.0, 0.0, 1.0]));
    evaluator.evaluate(&mut ctx).unwrap();
    assert_eq!(builds.get(), 1);

    evaluator.set_node_tree(constant_tree([0.0, 0.0, 1.0, 1.0]));
    evaluator.evaluate(&mut ctx).unwrap();
    assert_eq!(builds.get(), 2);
    assert!(ctx.read_output().unwrap().iter().all(|&t| t == Float4::new(0.0, 0.0, 1.0, 1.0)));

    evaluator.reset();
    assert_eq!(evaluator.state(), EvaluatorState::Idle);
    evaluator.evaluate(&mut ctx).unwrap();
    assert_eq!(builds.get(), 3);
}

#[test]
fn unlinked_inputs_use_node_values_converted_to_the_socket_type() {
    let mut tree = NodeTree::new();
    tree.add_node(
        NodeDef::new("mix", "mix")
            .with_input("Fac", InputValue::Float(1.0))
            .with_input("A", InputValue::Color([1.0, 0.0, 0.0, 1.0]))
            .with_input("B", InputValue::Float(0.25)),
    )
    .add_node(NodeDef::new("out", "composite"))
    .link("mix", "Image", "out", "Image");

    let mut ctx = context(Int2::new(4, 4));
    evaluator_with(tree).evaluate(&mut ctx).unwrap();
    let output = ctx.read_output().unwrap();
    assert!(output.iter().all(|&t| t == Float4::new(0.25, 0.25, 0.25, 1.0)));
}

#[test]
fn linked_values_are_converted_before_execution() {
    let mut tree = NodeTree::new();
    tree.add_node(NodeDef::new("v", "value").with_params(serde_json::json!({ "value": 0.75 })))
        .add_node(NodeDef::new("out", "composite"))
        .link("v", "Value", "out", "Image");
    let mut ctx = context(Int2::new(4, 4));
    evaluator_with(tree).evaluate(&mut ctx).unwrap();
    let output = ctx.read_output().unwrap();
    assert!(output.iter().all(|&t| t == Float4::new(0.75, 0.75, 0.75, 1.0)));
}

#[test]
fn transformed_passes_are_realized_on_the_output_domain() {
    let mut ctx = context_with_pass(Int2::new(64, 64), Int2::new(32, 32), |x, y| {
        Float4::new(x as f32, y as f32, 0.0, 1.0)
    });
    let mut tree = NodeTree::new();
    tree.add_node(NodeDef::new("image", "image"))
        .add_node(
            NodeDef::new("scale", "transform")
                .with_params(serde_json::json!({ "interpolation": "nearest" }))
                .with_input("Scale", InputValue::Float(2.0)),
        )
        .add_node(NodeDef::new("out", "composite"))
        .link("image", "Image", "scale", "Image")
        .link("scale", "Image", "out", "Image");
    evaluator_with(tree).evaluate(&mut ctx).unwrap();

    let output = ctx.read_output().unwrap();
    for y in 0..64 {
        for x in 0..64 {
            let expected = Float4::new((x / 2) as f32, (y / 2) as f32, 0.0, 1.0);
            assert_close(output[(y * 64 + x) as usize], expected, 1e-6);
        }
    }
}

fn busy_tree() -> NodeTree {
    let mut tree = NodeTree::new();
    tree.add_node(NodeDef::new("image", "image"))
        .add_node(NodeDef::new("glare", "glare").with_params(serde_json::json!({ "threshold": 0.5, "quality": "medium" })))
        .add_node(NodeDef::new("aa", "anti_alias"))
        .add_node(NodeDef::new("blur", "blur").with_params(serde_json::json!({ "size": [3, 2] })))
        .add_node(NodeDef::new("levels", "levels"))
        .add_node(NodeDef::new("bc", "bright_contrast").with_input("Contrast", InputValue::Float(10.0)))
        .add_node(NodeDef::new("mask", "dilate_erode").with_params(serde_json::json!({ "mode": "feather", "distance": 2 })))
        .add_node(NodeDef::new("norm", "normalize"))
        .add_node(NodeDef::new("mix", "mix").with_params(serde_json::json!({ "blend_type": "add" })))
        .add_node(NodeDef::new("out", "composite"))
        .link("image", "Image", "glare", "Image")
        .link("glare", "Image", "aa", "Image")
        .link("image", "Image", "blur", "Image")
        .link("image", "Image", "levels", "Image")
        .link("levels", "Mean", "bc", "Bright")
        .link("blur", "Image", "bc", "Image")
        .link("image", "Image", "mask", "Mask")
        .link("mask", "Mask", "norm", "Value")
        .link("norm", "Value", "mix", "Fac")
        .link("aa", "Image", "mix", "A")
        .link("bc", "Image", "mix", "B")
        .link("mix", "Image", "out", "Image");
    tree
}

#[test]
fn every_operation_runs_without_barrier_hazards_and_returns_its_textures() {
    let mut ctx = context_with_pass(Int2::new(40, 30), Int2::new(40, 30), |x, y| {
        let v = if (x / 5 + y / 5) % 2 == 0 { 1.5 } else { 0.1 };
        Float4::new(v, v * 0.5, 0.2, 1.0)
    });
    let mut evaluator = evaluator_with(busy_tree());
    evaluator.evaluate(&mut ctx).unwrap();

    assert_eq!(evaluator.compiled_len(), 10);
    assert_eq!(ctx.gpu().stats().hazards, 0);
    assert!(all_pooled_textures_returned(&ctx));
    let output = ctx.read_output().unwrap();
    assert!(output.iter().all(|t| t.0.iter().all(|c| c.is_finite())));

    let allocated = ctx.texture_pool().stats().allocated_textures;
    evaluator.evaluate(&mut ctx).unwrap();
    assert_eq!(ctx.texture_pool().stats().allocated_textures, allocated);
    assert_eq!(ctx.read_output().unwrap(), output);
    assert_eq!(ctx.gpu().stats().hazards, 0);
}

#[test]
fn unused_cached_resources_are_swept_on_the_next_evaluation() {
    let mut ctx = context_with_pass(Int2::new(16, 16), Int2::new(16, 16), |_, _| Float4::ONE);
    let mut tree = NodeTree::new();
    tree.add_node(NodeDef::new("image", "image"))
        .add_node(NodeDef::new("blur", "blur").with_params(serde_json::json!({ "size": [2, 2] })))
        .add_node(NodeDef::new("out", "composite"))
        .link("image", "Image", "blur", "Image")
        .link("blur", "Image", "out", "Image");
    let mut evaluator = evaluator_with(tree);
    evaluator.evaluate(&mut ctx).unwrap();
    assert!(!ctx.cache_manager().is_empty());

    evaluator.set_node_tree(constant_tree([1.0; 4]));
    evaluator.evaluate(&mut ctx).unwrap();
    evaluator.evaluate(&mut ctx).unwrap();
    assert!(ctx.cache_manager().is_empty());
}
