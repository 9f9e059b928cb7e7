use super::parse_params;
use crate::context::Context;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::{Domain, ResultType};
use crate::tree::NodeDef;

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CompositeParams {
    use_alpha: bool,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self { use_alpha: true }
    }
}

/// Writes its input into the host output texture, inside the compositing region.
///
/// The input is realized on a domain the size of the region. A single value clears the whole
/// output texture. An empty region writes nothing. Without `use_alpha` the written alpha is 1.
#[derive(Clone, Copy, Debug)]
pub struct CompositeOperation {
    use_alpha: bool,
}

impl CompositeOperation {
    /// Composite keeping (`use_alpha`) or discarding the input alpha.
    pub fn new(use_alpha: bool) -> Self {
        Self { use_alpha }
    }

    /// Build from a `composite` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: CompositeParams = parse_params(node)?;
        Ok(Self::new(params.use_alpha))
    }
}

impl Operation for CompositeOperation {
    fn name(&self) -> &str {
        "composite"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![InputDescriptor::new("Image", ResultType::Color)]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        Vec::new()
    }

    fn compute_domain(&self, ctx: &Context, _io: &OperationIo) -> Domain {
        Domain::new(ctx.compositing_region_size())
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let region = ctx.compositing_region();
        if region.is_empty() {
            tracing::debug!("empty compositing region, nothing to write");
            return Ok(());
        }
        let output_texture = ctx.output_texture();
        let image = io.input("Image")?;

        if image.is_single_value() {
            let mut color = image.single_value();
            if !self.use_alpha {
                color[3] = 1.0;
            }
            return ctx.gpu_mut().clear_texture(output_texture, color);
        }

        let shader = if self.use_alpha {
            "compositor_write_output"
        } else {
            "compositor_write_output_opaque"
        };
        let mut pass = ctx.get_shader(shader)?;
        pass.uniform("lower_bound", region.min);
        image.bind_as_texture(&mut pass, "input_tx");
        pass.bind_image("output_img", output_texture);
        ctx.dispatch_threads_at_least(&pass, region.size())
    }
}
