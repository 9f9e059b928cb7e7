use crate::algorithms::{maximum_float_in_range, minimum_float_in_range};
use crate::context::Context;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::ResultType;
use crate::tree::NodeDef;

/// Values beyond this magnitude are treated as infinities and ignored.
const RANGE: f32 = 10000.0;

/// Linearly remaps a float image so its minimum becomes 0 and its maximum 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizeOperation;

impl NormalizeOperation {
    /// Build from a `normalize` node; the node has no parameters.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        super::parse_params::<serde::de::IgnoredAny>(node)?;
        Ok(Self)
    }
}

impl Operation for NormalizeOperation {
    fn name(&self) -> &str {
        "normalize"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![InputDescriptor::new("Value", ResultType::Float)]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Value", ResultType::Float)]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let domain = io.domain();
        let (input, output) = io.input_and_output("Value", "Value")?;
        if input.is_single_value() {
            output.share_data(input);
            return Ok(());
        }

        let minimum = minimum_float_in_range(ctx, input, -RANGE, RANGE)?;
        let maximum = maximum_float_in_range(ctx, input, -RANGE, RANGE)?;
        let scale = if maximum == minimum {
            0.0
        } else {
            1.0 / (maximum - minimum)
        };
        tracing::debug!(minimum, maximum, "normalize range");

        let mut pass = ctx.get_shader("compositor_normalize")?;
        pass.uniform("minimum", minimum).uniform("scale", scale);
        input.bind_as_texture(&mut pass, "input_tx");
        output.allocate_texture(ctx, domain)?;
        output.bind_as_image(&mut pass, "output_img")?;
        ctx.dispatch_threads_at_least(&pass, domain.size)
    }
}
