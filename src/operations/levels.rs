//! Mean and standard deviation of one channel of an image.

use super::parse_params;
use crate::algorithms::{
    sum_blue, sum_blue_squared_difference, sum_color, sum_green, sum_green_squared_difference,
    sum_luminance, sum_luminance_squared_difference, sum_red, sum_red_squared_difference,
};
use crate::context::Context;
use crate::foundation::core::Float4;
use crate::foundation::error::CompositorResult;
use crate::foundation::math::luminance;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::{OpResult, ResultType};
use crate::tree::NodeDef;

const COMBINED_COEFFICIENTS: [f32; 3] = [1.0 / 3.0; 3];

/// Channel the statistics are computed over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelsChannel {
    /// Average of red, green and blue.
    #[default]
    Combined,
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
    /// Luminance under the host coefficients.
    Luminance,
}

#[derive(Clone, Copy, Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LevelsParams {
    channel: LevelsChannel,
}

/// Outputs `Mean` and `Std Dev` (population standard deviation) of a channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct LevelsOperation {
    channel: LevelsChannel,
}

impl LevelsOperation {
    /// Statistics of `channel`.
    pub fn new(channel: LevelsChannel) -> Self {
        Self { channel }
    }

    /// Build from a `levels` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: LevelsParams = parse_params(node)?;
        Ok(Self::new(params.channel))
    }

    fn channel_value(&self, color: Float4, coefficients: [f32; 3]) -> f32 {
        match self.channel {
            LevelsChannel::Combined => luminance(color, COMBINED_COEFFICIENTS),
            LevelsChannel::Red => color[0],
            LevelsChannel::Green => color[1],
            LevelsChannel::Blue => color[2],
            LevelsChannel::Luminance => luminance(color, coefficients),
        }
    }

    fn mean(&self, ctx: &mut Context, input: &OpResult) -> CompositorResult<f32> {
        let sum = match self.channel {
            LevelsChannel::Combined => {
                let sum = sum_color(ctx, input)?;
                (sum[0] + sum[1] + sum[2]) / 3.0
            }
            LevelsChannel::Red => sum_red(ctx, input)?,
            LevelsChannel::Green => sum_green(ctx, input)?,
            LevelsChannel::Blue => sum_blue(ctx, input)?,
            LevelsChannel::Luminance => {
                let coefficients = ctx.luminance_coefficients();
                sum_luminance(ctx, input, coefficients)?
            }
        };
        Ok(sum / input.domain().size.area() as f32)
    }

    fn standard_deviation(
        &self,
        ctx: &mut Context,
        input: &OpResult,
        mean: f32,
    ) -> CompositorResult<f32> {
        let sum = match self.channel {
            LevelsChannel::Combined => {
                sum_luminance_squared_difference(ctx, input, COMBINED_COEFFICIENTS, mean)?
            }
            LevelsChannel::Red => sum_red_squared_difference(ctx, input, mean)?,
            LevelsChannel::Green => sum_green_squared_difference(ctx, input, mean)?,
            LevelsChannel::Blue => sum_blue_squared_difference(ctx, input, mean)?,
            LevelsChannel::Luminance => {
                let coefficients = ctx.luminance_coefficients();
                sum_luminance_squared_difference(ctx, input, coefficients, mean)?
            }
        };
        Ok((sum / input.domain().size.area() as f32).max(0.0).sqrt())
    }
}

impl Operation for LevelsOperation {
    fn name(&self) -> &str {
        "levels"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![InputDescriptor::new("Image", ResultType::Color).with_default(Float4::ONE)]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![
            OutputDescriptor::new("Mean", ResultType::Float),
            OutputDescriptor::new("Std Dev", ResultType::Float),
        ]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let input = io.input("Image")?.clone();
        let compute_mean = io.output("Mean")?.should_compute();
        let compute_deviation = io.output("Std Dev")?.should_compute();

        let (mean, deviation) = if input.is_single_value() {
            let value = self.channel_value(input.single_value(), ctx.luminance_coefficients());
            (value, 0.0)
        } else if compute_mean || compute_deviation {
            let mean = self.mean(ctx, &input)?;
            let deviation = if compute_deviation {
                self.standard_deviation(ctx, &input, mean)?
            } else {
                0.0
            };
            (mean, deviation)
        } else {
            return Ok(());
        };

        if compute_mean {
            io.output_mut("Mean")?.set_single_value(Float4::from(mean));
        }
        if compute_deviation {
            io.output_mut("Std Dev")?
                .set_single_value(Float4::from(deviation));
        }
        Ok(())
    }
}
