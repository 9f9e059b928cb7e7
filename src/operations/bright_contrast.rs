use crate::context::Context;
use crate::foundation::core::Float4;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::ResultType;
use crate::shaders::color::bright_contrast;
use crate::tree::NodeDef;

/// Brightness and contrast correction. `Bright` and `Contrast` are percentages.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrightContrastOperation;

impl BrightContrastOperation {
    /// Build from a `bright_contrast` node; the node has no parameters besides its inputs.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        super::parse_params::<serde::de::IgnoredAny>(node)?;
        Ok(Self)
    }
}

impl Operation for BrightContrastOperation {
    fn name(&self) -> &str {
        "bright_contrast"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![
            InputDescriptor::new("Image", ResultType::Color).with_default(Float4::ONE),
            InputDescriptor::new("Bright", ResultType::Float).single_value(),
            InputDescriptor::new("Contrast", ResultType::Float).single_value(),
        ]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Image", ResultType::Color)]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let brightness = io.input("Bright")?.single_float_or(0.0);
        let contrast = io.input("Contrast")?.single_float_or(0.0);
        let domain = io.domain();
        let (input, output) = io.input_and_output("Image", "Image")?;

        if input.is_single_value() {
            output.set_single_value(bright_contrast(input.single_value(), brightness, contrast));
            return Ok(());
        }

        let mut pass = ctx.get_shader("compositor_bright_contrast")?;
        pass.uniform("brightness", brightness)
            .uniform("contrast", contrast);
        input.bind_as_texture(&mut pass, "input_tx");
        output.allocate_texture(ctx, domain)?;
        output.bind_as_image(&mut pass, "output_img")?;
        ctx.dispatch_threads_at_least(&pass, domain.size)
    }
}
