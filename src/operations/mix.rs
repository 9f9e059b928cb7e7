use super::parse_params;
use crate::context::Context;
use crate::foundation::error::CompositorResult;
use crate::operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
use crate::result::ResultType;
use crate::shaders::color::{BlendType, mix_colors};
use crate::tree::NodeDef;

#[derive(Clone, Copy, Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MixParams {
    blend_type: BlendType,
    use_alpha: bool,
    clamp: bool,
}

/// Blends `B` over `A` by `Fac`. Runs on the domain of `A`, falling back to `B` and then
/// `Fac` when `A` is a single value.
#[derive(Clone, Copy, Debug, Default)]
pub struct MixOperation {
    blend_type: BlendType,
    use_alpha: bool,
    clamp: bool,
}

impl MixOperation {
    /// Mix with `blend_type`; `use_alpha` scales the factor by the alpha of `B` and `clamp`
    /// clamps the result to `[0, 1]`.
    pub fn new(blend_type: BlendType, use_alpha: bool, clamp: bool) -> Self {
        Self {
            blend_type,
            use_alpha,
            clamp,
        }
    }

    /// Build from a `mix` node.
    pub fn from_node(node: &NodeDef) -> CompositorResult<Self> {
        let params: MixParams = parse_params(node)?;
        Ok(Self::new(params.blend_type, params.use_alpha, params.clamp))
    }
}

impl Operation for MixOperation {
    fn name(&self) -> &str {
        "mix"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![
            InputDescriptor::new("Fac", ResultType::Float)
                .with_default(0.5)
                .with_priority(2),
            InputDescriptor::new("A", ResultType::Color).with_priority(0),
            InputDescriptor::new("B", ResultType::Color).with_priority(1),
        ]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Image", ResultType::Color)]
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let domain = io.domain();
        let factor = io.input("Fac")?.clone();
        let first = io.input("A")?.clone();
        let second = io.input("B")?.clone();
        let output = io.output_mut("Image")?;

        if factor.is_single_value() && first.is_single_value() && second.is_single_value() {
            output.set_single_value(mix_colors(
                self.blend_type,
                factor.single_value()[0],
                first.single_value(),
                second.single_value(),
                self.use_alpha,
                self.clamp,
            ));
            return Ok(());
        }

        let mut pass = ctx.get_shader("compositor_mix")?;
        pass.uniform("blend_type", self.blend_type.to_uniform())
            .uniform("use_alpha", self.use_alpha)
            .uniform("clamp", self.clamp);
        factor.bind_as_texture(&mut pass, "factor_tx");
        first.bind_as_texture(&mut pass, "first_tx");
        second.bind_as_texture(&mut pass, "second_tx");
        output.allocate_texture(ctx, domain)?;
        output.bind_as_image(&mut pass, "output_img")?;
        ctx.dispatch_threads_at_least(&pass, domain.size)
    }
}

