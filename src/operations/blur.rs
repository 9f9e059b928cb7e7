use super::{parse_params, require_finite};
use crate::algorithms::symmetric_separable_blur;
use crate::cache::FilterType;
use crate::context::Context;
use crate::foundation::core::Float4;
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::ResultType;
use crate::tree::NodeDef;

#[derive(Clone, Copy, Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BlurParams {
    size: [f32; 2],
    filter_type: FilterType,
}

/// Separable symmetric blur with a radius of `size * Size` pixels per axis.
#[derive(Clone, Copy, Debug)]
pub struct BlurOperation {
    size: [f32; 2],
    filter: FilterType,
}

impl BlurOperation {
    /// Blur of `size` pixels per axis, weighted by `filter`.
    pub fn new(size: [f32; 2], filter: FilterType) -> Self {
        Self { size, filter }
    }

    /// Build from a `blur` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: BlurParams = parse_params(node)?;
        for v in params.size {
            if require_finite(node, "size", v)? < 0.0 {
                return Err(CompositorError::validation(format!(
                    "blur.size must be >= 0 (node '{}')",
                    node.id
                )));
            }
        }
        Ok(Self::new(params.size, params.filter_type))
    }
}

impl Operation for BlurOperation {
    fn name(&self) -> &str {
        "blur"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![
            InputDescriptor::new("Image", ResultType::Color).with_default(Float4::ONE),
            InputDescriptor::new("Size", ResultType::Float)
                .single_value()
                .with_default(1.0),
        ]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Image", ResultType::Color)]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let factor = io.input("Size")?.single_float_or(1.0).max(0.0);
        let radius = [self.size[0] * factor, self.size[1] * factor];
        let (input, output) = io.input_and_output("Image", "Image")?;

        if input.is_single_value() || (radius[0] <= 0.0 && radius[1] <= 0.0) {
            output.share_data(input);
            return Ok(());
        }
        symmetric_separable_blur(ctx, input, output, radius, self.filter)
    }
}
