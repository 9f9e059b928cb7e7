//! The execution contract of operations and the processors the evaluator inserts in front of
//! their inputs.

use crate::context::Context;
use crate::foundation::core::{Affine, Float4};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::{Extend, SamplerState};
use crate::result::{Domain, Interpolation, OpResult, ResultType};
use crate::shaders::conversion::{conversion_shader, convert_value};

/// Declared input of an operation.
#[derive(Clone, Debug, PartialEq)]
pub struct InputDescriptor {
    /// Socket name.
    pub name: &'static str,
    /// Type the operation reads the input as; other types are converted.
    pub ty: ResultType,
    /// Only the single value is read; textures are never realized.
    pub expects_single_value: bool,
    /// Read the input on its own domain.
    pub skip_realization: bool,
    /// Lower values win when the operation domain is picked from its inputs.
    pub domain_priority: i32,
    /// Value used when the socket is not linked.
    pub default: Float4,
}

impl InputDescriptor {
    /// Realized input of `ty`, priority zero, default zero.
    pub fn new(name: &'static str, ty: ResultType) -> Self {
        Self {
            name,
            ty,
            expects_single_value: false,
            skip_realization: false,
            domain_priority: 0,
            default: Float4::ZERO,
        }
    }

    /// Value used when unlinked.
    pub fn with_default(mut self, default: impl Into<Float4>) -> Self {
        self.default = default.into();
        self
    }

    /// Domain priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.domain_priority = priority;
        self
    }

    /// Mark as a single-value input.
    pub fn single_value(mut self) -> Self {
        self.expects_single_value = true;
        self
    }

    /// Keep the input on its own domain.
    pub fn without_realization(mut self) -> Self {
        self.skip_realization = true;
        self
    }
}

/// Declared output of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputDescriptor {
    /// Socket name.
    pub name: &'static str,
    /// Result type.
    pub ty: ResultType,
}

impl OutputDescriptor {
    /// Output `name` of `ty`.
    pub fn new(name: &'static str, ty: ResultType) -> Self {
        Self { name, ty }
    }
}

/// Inputs and outputs of one operation execution, by socket name.
#[derive(Debug, Default)]
pub struct OperationIo {
    inputs: Vec<(&'static str, OpResult)>,
    outputs: Vec<(&'static str, OpResult)>,
    domain: Option<Domain>,
}

impl OperationIo {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an input.
    pub fn set_input(&mut self, name: &'static str, result: OpResult) {
        match self.inputs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = result,
            None => self.inputs.push((name, result)),
        }
    }

    /// Add or replace an output.
    pub fn set_output(&mut self, name: &'static str, result: OpResult) {
        match self.outputs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = result,
            None => self.outputs.push((name, result)),
        }
    }

    /// Input by name.
    pub fn input(&self, name: &str) -> CompositorResult<&OpResult> {
        self.inputs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| r)
            .ok_or_else(|| CompositorError::evaluation(format!("missing input {name}")))
    }

    /// Output by name.
    pub fn output(&self, name: &str) -> CompositorResult<&OpResult> {
        self.outputs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| r)
            .ok_or_else(|| CompositorError::evaluation(format!("missing output {name}")))
    }

    /// Output by name, mutably.
    pub fn output_mut(&mut self, name: &str) -> CompositorResult<&mut OpResult> {
        self.outputs
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| r)
            .ok_or_else(|| CompositorError::evaluation(format!("missing output {name}")))
    }

    /// An input together with an output, for operations that read one while writing the other.
    pub fn input_and_output(
        &mut self,
        input: &str,
        output: &str,
    ) -> CompositorResult<(&OpResult, &mut OpResult)> {
        let i = self
            .inputs
            .iter()
            .find(|(n, _)| *n == input)
            .map(|(_, r)| r)
            .ok_or_else(|| CompositorError::evaluation(format!("missing input {input}")))?;
        let o = self
            .outputs
            .iter_mut()
            .find(|(n, _)| *n == output)
            .map(|(_, r)| r)
            .ok_or_else(|| CompositorError::evaluation(format!("missing output {output}")))?;
        Ok((i, o))
    }

    /// Remove and return an input.
    pub fn take_input(&mut self, name: &str) -> Option<OpResult> {
        let pos = self.inputs.iter().position(|(n, _)| *n == name)?;
        Some(self.inputs.remove(pos).1)
    }

    /// Remove and return an output.
    pub fn take_output(&mut self, name: &str) -> Option<OpResult> {
        let pos = self.outputs.iter().position(|(n, _)| *n == name)?;
        Some(self.outputs.remove(pos).1)
    }

    /// Inputs in insertion order.
    pub fn inputs(&self) -> impl Iterator<Item = (&'static str, &OpResult)> {
        self.inputs.iter().map(|(n, r)| (*n, r))
    }

    /// Domain the evaluator computed for this execution.
    pub fn domain(&self) -> Domain {
        self.domain.unwrap_or_else(Domain::identity)
    }

    /// Record the operation domain.
    pub fn set_domain(&mut self, domain: Domain) {
        self.domain = Some(domain);
    }

    pub(crate) fn drain_inputs(&mut self) -> Vec<(&'static str, OpResult)> {
        std::mem::take(&mut self.inputs)
    }

    pub(crate) fn drain_outputs(&mut self) -> Vec<(&'static str, OpResult)> {
        std::mem::take(&mut self.outputs)
    }
}

/// A unit of GPU work with typed inputs and outputs.
///
/// `execute` must allocate every output that should be computed, either as a single value or
/// as a texture on the operation domain, and must not release its inputs.
pub trait Operation {
    /// Display name used in logs.
    fn name(&self) -> &str;

    /// Declared inputs.
    fn input_descriptors(&self) -> Vec<InputDescriptor>;

    /// Declared outputs.
    fn output_descriptors(&self) -> Vec<OutputDescriptor>;

    /// Domain the operation runs on: that of the highest-priority realized input that is not a
    /// single value, or the identity domain.
    fn compute_domain(&self, _ctx: &Context, io: &OperationIo) -> Domain {
        self.input_descriptors()
            .iter()
            .filter(|d| !d.expects_single_value && !d.skip_realization)
            .filter_map(|d| {
                let input = io.input(d.name).ok()?;
                (!input.is_single_value() && input.is_allocated())
                    .then_some((d.domain_priority, input.domain()))
            })
            .min_by_key(|(priority, _)| *priority)
            .map(|(_, domain)| domain)
            .unwrap_or_else(Domain::identity)
    }

    /// Run the operation.
    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()>;
}

/// Run a one-input, one-output processor operation.
pub(crate) fn run_processor(
    op: &mut dyn Operation,
    ctx: &mut Context,
    input: OpResult,
) -> CompositorResult<OpResult> {
    let mut io = OperationIo::new();
    io.set_input("Input", input);
    io.set_output("Result", OpResult::new(op.output_descriptors()[0].ty, ctx.precision()));
    let domain = op.compute_domain(ctx, &io);
    io.set_domain(domain);
    op.execute(ctx, &mut io)?;
    io.take_output("Result")
        .ok_or_else(|| CompositorError::evaluation(format!("{} produced no result", op.name())))
}

/// Resamples a result onto another domain.
#[derive(Clone, Debug)]
pub struct RealizeOnDomainOperation {
    target: Domain,
    ty: ResultType,
}

impl RealizeOnDomainOperation {
    /// Return a realization of `input` onto `operation_domain`, or `None` when the input is
    /// read as is.
    pub fn construct_if_needed(
        input: &OpResult,
        descriptor: &InputDescriptor,
        operation_domain: Domain,
    ) -> Option<Self> {
        if descriptor.skip_realization
            || descriptor.expects_single_value
            || input.is_single_value()
            || !input.is_allocated()
            || input.domain() == operation_domain
        {
            return None;
        }
        Some(Self {
            target: operation_domain,
            ty: input.ty(),
        })
    }

    /// Domain realized onto.
    pub fn target(&self) -> Domain {
        self.target
    }

    /// Transform from output texel space to input texel space.
    pub fn inverse_transformation(input: Domain, target: Domain) -> Option<Affine> {
        let local = target.transformation.inverse() * input.transformation;
        let transformation = Affine::translate(target.size.to_vec2() / 2.0)
            * local
            * Affine::translate(-input.size.to_vec2() / 2.0);
        if transformation.determinant().abs() < 1e-12 {
            return None;
        }
        let inverse = transformation.inverse();
        inverse.as_coeffs().iter().all(|c| c.is_finite()).then_some(inverse)
    }

    fn shader_name(interpolation: Interpolation) -> &'static str {
        match interpolation {
            Interpolation::Nearest => "compositor_realize_on_domain_nearest",
            Interpolation::Bilinear => "compositor_realize_on_domain_bilinear",
            Interpolation::Bicubic => "compositor_realize_on_domain_bicubic",
        }
    }

    fn sampler(input: &OpResult) -> SamplerState {
        let options = input.realization_options();
        let base = match options.interpolation {
            Interpolation::Nearest => SamplerState::nearest(),
            Interpolation::Bilinear | Interpolation::Bicubic => SamplerState::bilinear(),
        };
        let extend = |repeat: bool| {
            if repeat {
                Extend::Repeat
            } else {
                Extend::ClampToBorder
            }
        };
        base.with_extend(extend(options.repeat_x), extend(options.repeat_y))
    }
}

impl Operation for RealizeOnDomainOperation {
    fn name(&self) -> &str {
        "realize_on_domain"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![InputDescriptor::new("Input", self.ty).without_realization()]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Result", self.ty)]
    }

    fn compute_domain(&self, _ctx: &Context, _io: &OperationIo) -> Domain {
        self.target
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let target = self.target;
        let (input, output) = io.input_and_output("Input", "Result")?;
        *output = OpResult::new(input.ty(), input.precision());

        if target.size.is_empty() {
            output.allocate_invalid();
            return Ok(());
        }
        let Some(inverse) = Self::inverse_transformation(input.domain(), target) else {
            tracing::warn!("degenerate transform, realizing to an invalid result");
            output.allocate_invalid();
            return Ok(());
        };

        let mut pass = ctx.get_shader(Self::shader_name(input.realization_options().interpolation))?;
        pass.uniform("inverse_transformation", inverse);
        input.bind_as_sampled_texture(&mut pass, "input_tx", Self::sampler(input));

        output.allocate_texture(ctx, target)?;
        output.bind_as_image(&mut pass, "domain_img")?;
        ctx.dispatch_threads_at_least(&pass, target.size)
    }
}

/// Converts a result to the type an input descriptor declares.
#[derive(Clone, Copy, Debug)]
pub struct ConversionOperation {
    from: ResultType,
    to: ResultType,
}

impl ConversionOperation {
    /// Return a conversion of `input` to the descriptor type, or `None` when the types match.
    pub fn construct_if_needed(input: &OpResult, descriptor: &InputDescriptor) -> Option<Self> {
        (input.is_allocated() && input.ty() != descriptor.ty).then_some(Self {
            from: input.ty(),
            to: descriptor.ty,
        })
    }
}

impl Operation for ConversionOperation {
    fn name(&self) -> &str {
        "conversion"
    }

    fn input_descriptors(&self) -> Vec<InputDescriptor> {
        vec![InputDescriptor::new("Input", self.from).without_realization()]
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("Result", self.to)]
    }

    fn compute_domain(&self, _ctx: &Context, io: &OperationIo) -> Domain {
        io.input("Input")
            .map(|input| input.domain())
            .unwrap_or_else(|_| Domain::identity())
    }

    fn execute(&mut self, ctx: &mut Context, io: &mut OperationIo) -> CompositorResult<()> {
        let domain = io.domain();
        let (from, to) = (self.from, self.to);
        let (input, output) = io.input_and_output("Input", "Result")?;
        *output = OpResult::new(to, input.precision());
        output.set_realization_options(input.realization_options());

        if input.is_single_value() {
            output.set_single_value(convert_value(from, to, input.single_value()));
            return Ok(());
        }

        let mut pass = ctx.get_shader(conversion_shader(from, to)?)?;
        input.bind_as_texture(&mut pass, "input_tx");
        output.allocate_texture(ctx, domain)?;
        output.bind_as_image(&mut pass, "output_img")?;
        ctx.dispatch_threads_at_least(&pass, domain.size)
    }
}

#[cfg(test)]
#[path = "../tests/unit/operation.rs"]
mod tests;
