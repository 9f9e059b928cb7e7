use super::*;
use crate::foundation::error::CompositorError;

fn red_composite() -> NodeTree {
    let mut tree = NodeTree::new();
    tree.add_node(
        NodeDef::new("color", "rgb")
            .with_params(serde_json::json!({ "color": [1.0, 0.0, 0.0, 1.0] })),
    )
    .add_node(NodeDef::new("out", "composite"))
    .link("color", "RGBA", "out", "Image");
    tree
}

#[test]
fn parses_nodes_params_inputs_and_links() {
    let json = r#"{
        "nodes": [
            { "id": "v", "type": "value", "params": { "value": 0.25 } },
            { "id": "mix", "type": "mix", "inputs": { "Fac": 0.5, "B": [0, 0, 1, 1], "A": [1, 2, 3] } },
            { "id": "out", "type": "composite" }
        ],
        "links": [
            { "from": "mix", "from_socket": "Image", "to": "out", "to_socket": "Image" }
        ]
    }"#;
    let tree = NodeTree::from_json_str(json).unwrap();
    tree.validate().unwrap();

    assert_eq!(tree.nodes.len(), 3);
    assert_eq!(tree.node("v").unwrap().params["value"], 0.25);
    let mix = tree.node("mix").unwrap();
    assert_eq!(mix.inputs["Fac"], InputValue::Float(0.5));
    assert_eq!(mix.inputs["A"], InputValue::Vector([1.0, 2.0, 3.0]));
    assert_eq!(mix.inputs["B"], InputValue::Color([0.0, 0.0, 1.0, 1.0]));
    assert_eq!(tree.link_into("out", "Image").unwrap().from, "mix");
    assert_eq!(tree.node_index("out"), Some(2));
}

#[test]
fn input_values_widen_in_their_own_layout() {
    assert_eq!(
        InputValue::Float(0.5).to_float4(),
        Float4::new(0.5, 0.0, 0.0, 1.0)
    );
    assert_eq!(
        InputValue::Vector([1.0, 2.0, 3.0]).to_float4(),
        Float4::new(1.0, 2.0, 3.0, 0.0)
    );
    assert_eq!(InputValue::Color([0.1; 4]).ty(), ResultType::Color);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = NodeTree::from_json_str(r#"{ "nodes": [], "edges": [] }"#).unwrap_err();
    assert!(matches!(err, CompositorError::Serde(_)));
}

#[test]
fn validation_rejects_structural_errors() {
    let mut duplicate = red_composite();
    duplicate.add_node(NodeDef::new("out", "value"));
    assert!(matches!(
        duplicate.validate(),
        Err(CompositorError::Validation(_))
    ));

    let mut dangling = red_composite();
    dangling.link("missing", "Value", "out", "Image");
    assert!(dangling.validate().is_err());

    let mut self_link = red_composite();
    self_link.link("out", "Image", "out", "Image");
    assert!(self_link.validate().is_err());

    let mut double = red_composite();
    double
        .add_node(NodeDef::new("other", "rgb"))
        .link("other", "RGBA", "out", "Image");
    assert!(double.validate().is_err());

    let mut untyped = NodeTree::new();
    untyped.add_node(NodeDef::new("a", " "));
    assert!(untyped.validate().is_err());
}

#[test]
fn json_round_trip_preserves_tree_and_fingerprint() {
    let tree = red_composite();
    let json = tree.to_json_string().unwrap();
    let parsed = NodeTree::from_json_str(&json).unwrap();
    assert_eq!(parsed, tree);
    assert_eq!(parsed.fingerprint(), tree.fingerprint());
}

#[test]
fn fingerprint_tracks_parameter_changes() {
    let tree = red_composite();
    let mut changed = tree.clone();
    changed.nodes[0].params = serde_json::json!({ "color": [0.0, 1.0, 0.0, 1.0] });
    assert_ne!(tree.fingerprint(), changed.fingerprint());
}

#[test]
fn from_path_reports_missing_files() {
    let err = NodeTree::from_path("/nonexistent/compositor/tree.json").unwrap_err();
    assert!(matches!(err, CompositorError::Other(_)));
}
