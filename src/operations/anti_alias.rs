use super::{parse_params, require_finite};
use crate::algorithms::smaa;
use crate::context::Context;
use crate::foundation::core::Float4;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::ResultType;
use crate::tree::NodeDef;

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AntiAliasParams {
    threshold: f32,
    contrast_limit: f32,
    corner_rounding: f32,
}

impl Default for AntiAliasParams {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            contrast_limit: 2.0,
            corner_rounding: 0.25,
        }
    }
}

/// Morphological anti-aliasing of an image.
#[derive(Clone, Copy, Debug)]
pub struct AntiAliasOperation {
    threshold: f32,
    contrast_limit: f32,
    corner_rounding: f32,
}

impl AntiAliasOperation {
    /// Edges need a luminance step of at least `threshold`; `contrast_limit` is the local
    /// contrast adaptation factor. A `corner_rounding` of 0 keeps sharp corners sharp.
    pub fn new(threshold: f32, contrast_limit: f32, corner_rounding: f32) -> Self {
        Self {
            threshold,
            contrast_limit,
            corner_rounding,
        }
    }

    /// Build from an `anti_alias` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: AntiAliasParams = parse_params(node)?;
        let threshold = require_finite(node, "threshold", params.threshold)?.clamp(0.0, 1.0);
        let contrast_limit = require_finite(node, "contrast_limit", params.contrast_limit)?.max(0.0);
        let corner_rounding =
            require_finite(node, "corner_rounding", params.corner_rounding)?.clamp(0.0, 1.0);
        Ok(Self::new(threshold, contrast_limit, corner_rounding))
    }
}

impl Operation for AntiAliasOperation {
    fn name(&self) -> &str {
        "anti_alias"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![InputDescriptor::new("Image", ResultType::Color).with_default(Float4::ONE)]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Image", ResultType::Color)]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let (input, output) = io.input_and_output("Image", "Image")?;
        smaa(
            ctx,
            input,
            output,
            self.threshold,
            self.contrast_limit,
            self.corner_rounding,
        )
    }
}
