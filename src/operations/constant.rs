//! Nodes that output a constant.

use super::{parse_params, require_finite};
use crate::context::Context;
use crate::foundation::core::Float4;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::ResultType;
use crate::tree::NodeDef;

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RgbParams {
    color: [f32; 4],
}

impl Default for RgbParams {
    fn default() -> Self {
        Self {
            color: [0.5, 0.5, 0.5, 1.0],
        }
    }
}

/// Outputs a constant color on `RGBA`.
#[derive(Clone, Copy, Debug)]
pub struct RgbOperation {
    color: Float4,
}

impl RgbOperation {
    /// Operation outputting `color`.
    pub fn new(color: Float4) -> Self {
        Self { color }
    }

    /// Build from an `rgb` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: RgbParams = parse_params(node)?;
        for v in params.color {
            require_finite(node, "color", v)?;
        }
        Ok(Self::new(Float4::from(params.color)))
    }
}

impl Operation for RgbOperation {
    fn name(&self) -> &str {
        "rgb"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        Vec::new()
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("RGBA", ResultType::Color)]
    }

    fn execute(&mut self, _ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        io.output_mut("RGBA")?.set_single_value(self.color);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ValueParams {
    value: f32,
}

impl Default for ValueParams {
    fn default() -> Self {
        Self { value: 0.5 }
    }
}

/// Outputs a constant float on `Value`.
#[derive(Clone, Copy, Debug)]
pub struct ValueOperation {
    value: f32,
}

impl ValueOperation {
    /// Operation outputting `value`.
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    /// Build from a `value` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: ValueParams = parse_params(node)?;
        Ok(Self::new(require_finite(node, "value", params.value)?))
    }
}

impl Operation for ValueOperation {
    fn name(&self) -> &str {
        "value"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        Vec::new()
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Value", ResultType::Float)]
    }

    fn execute(&mut self, _ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        io.output_mut("Value")?
            .set_single_value(Float4::from(self.value));
        Ok(())
    }
}
