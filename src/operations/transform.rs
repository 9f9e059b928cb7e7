//! Moves, rotates and scales an image by editing its domain transform. No texel is touched;
//! the resampling happens when a consumer realizes the result.

use super::parse_params;
use crate::context::Context;
use crate::foundation::core::Affine;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::{Interpolation, ResultType};
use crate::tree::NodeDef;

#[derive(Clone, Copy, Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TransformParams {
    interpolation: Interpolation,
}

/// Translate by `X`/`Y` pixels, rotate by `Angle` radians and scale by `Scale`, about the
/// domain center.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransformOperation {
    interpolation: Interpolation,
}

impl TransformOperation {
    /// Transform resampled with `interpolation`.
    pub fn new(interpolation: Interpolation) -> Self {
        Self { interpolation }
    }

    /// Build from a `transform` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: TransformParams = parse_params(node)?;
        Ok(Self::new(params.interpolation))
    }

    /// `translate * rotate * scale`.
    pub fn transformation(x: f32, y: f32, angle: f32, scale: f32) -> Affine {
        Affine::translate((f64::from(x), f64::from(y)))
            * Affine::rotate(f64::from(angle))
            * Affine::scale(f64::from(scale))
    }
}

impl Operation for TransformOperation {
    fn name(&self) -> &str {
        "transform"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![
            InputDescriptor::new("Image", ResultType::Color).without_realization(),
            InputDescriptor::new("X", ResultType::Float).single_value(),
            InputDescriptor::new("Y", ResultType::Float).single_value(),
            InputDescriptor::new("Angle", ResultType::Float).single_value(),
            InputDescriptor::new("Scale", ResultType::Float)
                .single_value()
                .with_default(1.0),
        ]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Image", ResultType::Color)]
    }

    fn execute(&mut self, _ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let transformation = Self::transformation(
            io.input("X")?.single_float_or(0.0),
            io.input("Y")?.single_float_or(0.0),
            io.input("Angle")?.single_float_or(0.0),
            io.input("Scale")?.single_float_or(1.0),
        );
        let (input, output) = io.input_and_output("Image", "Image")?;
        output.share_data(input);
        output.set_realization_options(input.realization_options());
        output.realization_options_mut().interpolation = self.interpolation;
        output.transform(transformation);
        Ok(())
    }
}
