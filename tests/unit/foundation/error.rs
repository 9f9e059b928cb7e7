use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CompositorError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        CompositorError::evaluation("x")
            .to_string()
            .contains("evaluation error:")
    );
    assert!(CompositorError::gpu("x").to_string().contains("gpu error:"));
    assert!(
        CompositorError::missing_shader("compositor_x")
            .to_string()
            .contains("missing shader: compositor_x")
    );
    assert!(
        CompositorError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CompositorError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
