//! Render passes handed over by the host.

use super::parse_params;
use crate::context::Context;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::{Domain, ResultType};
use crate::tree::NodeDef;

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ImageParams {
    view_layer: String,
    pass: String,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            view_layer: "ViewLayer".to_owned(),
            pass: "Combined".to_owned(),
        }
    }
}

/// Wraps the host texture of a render pass without copying it.
#[derive(Clone, Debug)]
pub struct ImageOperation {
    view_layer: String,
    pass: String,
}

impl ImageOperation {
    /// Read `pass` of `view_layer`.
    pub fn new(view_layer: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            view_layer: view_layer.into(),
            pass: pass.into(),
        }
    }

    /// Build from an `image` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: ImageParams = parse_params(node)?;
        Ok(Self::new(params.view_layer, params.pass))
    }
}

impl Operation for ImageOperation {
    fn name(&self) -> &str {
        "image"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        Vec::new()
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Image", ResultType::Color)]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let texture = ctx
            .input_texture(&self.view_layer, &self.pass)
            .and_then(|texture| Some((texture, ctx.gpu().texture_size(texture)?)));
        let output = io.output_mut("Image")?;
        match texture {
            Some((texture, size)) => output.wrap_external(texture, Domain::new(size)),
            None => {
                tracing::warn!(
                    view_layer = %self.view_layer,
                    pass = %self.pass,
                    "render pass not available"
                );
                output.allocate_invalid();
                ctx.set_info_message("Pass not rendered yet");
            }
        }
        Ok(())
    }
}
