//! Node operations and the registry that builds them from node definitions.

use crate::foundation::error::{CompositorError, CompositorResult};
use crate::operation::Operation;
use crate::tree::NodeDef;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

pub mod anti_alias;
pub mod blur;
pub mod bright_contrast;
pub mod composite;
pub mod constant;
pub mod dilate_erode;
pub mod glare;
pub mod image;
pub mod levels;
pub mod mix;
pub mod normalize;
pub mod transform;

pub use anti_alias::AntiAliasOperation;
pub use blur::BlurOperation;
pub use bright_contrast::BrightContrastOperation;
pub use composite::CompositeOperation;
pub use constant::{RgbOperation, ValueOperation};
pub use dilate_erode::{DilateErodeMode, DilateErodeOperation};
pub use glare::{GlareOperation, GlareQuality, GlareType};
pub use image::ImageOperation;
pub use levels::{LevelsChannel, LevelsOperation};
pub use mix::MixOperation;
pub use normalize::NormalizeOperation;
pub use transform::TransformOperation;

/// Builds the operation of one node.
pub type OperationFactory = Box<dyn Fn(&NodeDef) -> CompositorResult<Box<dyn Operation>>>;

/// Parse `node.params` into `T`; absent parameters give `T::default()`.
pub fn parse_params<T: DeserializeOwned + Default>(node: &NodeDef) -> CompositorResult<T> {
    if node.params.is_null() {
        return Ok(T::default());
    }
    T::deserialize(&node.params).map_err(|e| {
        CompositorError::validation(format!(
            "invalid params for {} node '{}': {e}",
            node.ty, node.id
        ))
    })
}

pub(crate) fn require_finite(node: &NodeDef, name: &str, value: f32) -> CompositorResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CompositorError::validation(format!(
            "{}.{name} must be finite (node '{}')",
            node.ty, node.id
        )))
    }
}

/// Node type identifier to operation factory.
pub struct OperationRegistry {
    factories: HashMap<String, OperationFactory>,
}

impl OperationRegistry {
    /// Registry without any node type.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in node type.
    pub fn with_builtin_operations() -> Self {
        fn boxed<O: Operation + 'static>(
            build: fn(&NodeDef) -> CompositorResult<O>,
        ) -> OperationFactory {
            Box::new(move |node: &NodeDef| Ok(Box::new(build(node)?) as Box<dyn Operation>))
        }

        let mut registry = Self::new();
        registry
            .register("rgb", boxed(RgbOperation::from_node))
            .register("value", boxed(ValueOperation::from_node))
            .register("image", boxed(ImageOperation::from_node))
            .register("transform", boxed(TransformOperation::from_node))
            .register("bright_contrast", boxed(BrightContrastOperation::from_node))
            .register("mix", boxed(MixOperation::from_node))
            .register("blur", boxed(BlurOperation::from_node))
            .register("dilate_erode", boxed(DilateErodeOperation::from_node))
            .register("glare", boxed(GlareOperation::from_node))
            .register("anti_alias", boxed(AntiAliasOperation::from_node))
            .register("levels", boxed(LevelsOperation::from_node))
            .register("normalize", boxed(NormalizeOperation::from_node))
            .register("composite", boxed(CompositeOperation::from_node));
        registry
    }

    /// Register or replace the factory of `node_type`.
    pub fn register(&mut self, node_type: &str, factory: OperationFactory) -> &mut Self {
        self.factories
            .insert(normalize_type(node_type), factory);
        self
    }

    /// Return `true` when `node_type` has a factory.
    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(&normalize_type(node_type))
    }

    /// Build the operation of `node`.
    pub fn create(&self, node: &NodeDef) -> CompositorResult<Box<dyn Operation>> {
        let factory = self.factories.get(&normalize_type(&node.ty)).ok_or_else(|| {
            CompositorError::validation(format!(
                "unknown node type '{}' (node '{}')",
                node.ty, node.id
            ))
        })?;
        factory(node)
    }

    /// Registered node types, sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_builtin_operations()
    }
}

fn normalize_type(node_type: &str) -> String {
    node_type.trim().to_ascii_lowercase()
}

#[cfg(test)]
#[path = "../../tests/unit/operations.rs"]
mod tests;
