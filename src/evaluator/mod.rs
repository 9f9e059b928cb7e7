//! Compiles a node tree into an ordered sequence of operations and executes it once per
//! evaluation, inserting conversion and realization processors in front of inputs.

mod scheduler;

use crate::context::Context;
use crate::foundation::core::Int2;
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::Barrier;
use crate::operation::{
    ConversionOperation, InputDescriptor, Operation, OperationIo, OutputDescriptor,
    RealizeOnDomainOperation, run_processor,
};
use crate::operations::OperationRegistry;
use crate::result::OpResult;
use crate::shaders::conversion::convert_value;
use crate::tree::{NodeDef, NodeTree};

/// Message reported when the tree uses node types without an operation.
pub const UNSUPPORTED_SETUP_MESSAGE: &str = "Viewport compositor setup not fully supported";

/// Evaluator configuration.
#[derive(Clone, Debug)]
pub struct EvaluatorOpts {
    /// Node type whose node is evaluated; everything it does not depend on is skipped.
    pub output_node_type: String,
    /// Give textures the pool holds for reuse back to the device after each evaluation.
    pub free_unused_textures_after_evaluation: bool,
}

impl Default for EvaluatorOpts {
    fn default() -> Self {
        Self {
            output_node_type: "composite".to_owned(),
            free_unused_textures_after_evaluation: false,
        }
    }
}

/// Lifecycle of the compiled operation sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluatorState {
    /// Nothing compiled.
    Idle,
    /// A compiled sequence is kept for the next evaluation.
    Compiled,
    /// The compiled sequence is running.
    Executing,
}

enum InputSource {
    /// Output `output` of the node at schedule position `node`.
    Linked { node: usize, output: usize },
    Unlinked(OpResult),
}

struct CompiledInput {
    descriptor: InputDescriptor,
    source: InputSource,
}

struct CompiledNode {
    id: String,
    operation: Box<dyn Operation>,
    inputs: Vec<CompiledInput>,
    outputs: Vec<OutputDescriptor>,
    output_references: Vec<u32>,
}

/// Drives evaluation of a node tree.
pub struct Evaluator {
    opts: EvaluatorOpts,
    registry: OperationRegistry,
    tree: Option<NodeTree>,
    tree_fingerprint: Option<u128>,
    state: EvaluatorState,
    schedule: Vec<CompiledNode>,
    diagnostic: Option<&'static str>,
    compiled_fingerprint: Option<u128>,
    compiled_region_size: Option<Int2>,
}

impl Evaluator {
    /// Evaluator with the built-in operations.
    pub fn new(opts: EvaluatorOpts) -> Self {
        Self::with_registry(opts, OperationRegistry::with_builtin_operations())
    }

    /// Evaluator building operations through `registry`.
    pub fn with_registry(opts: EvaluatorOpts, registry: OperationRegistry) -> Self {
        Self {
            opts,
            registry,
            tree: None,
            tree_fingerprint: None,
            state: EvaluatorState::Idle,
            schedule: Vec::new(),
            diagnostic: None,
            compiled_fingerprint: None,
            compiled_region_size: None,
        }
    }

    /// The operation registry, to add node types. Takes effect at the next compilation.
    pub fn registry_mut(&mut self) -> &mut OperationRegistry {
        self.reset();
        &mut self.registry
    }

    /// Replace the node tree. The next evaluation recompiles if the tree changed.
    pub fn set_node_tree(&mut self, tree: NodeTree) {
        self.tree_fingerprint = Some(tree.fingerprint());
        self.tree = Some(tree);
    }

    /// The current node tree.
    pub fn node_tree(&self) -> Option<&NodeTree> {
        self.tree.as_ref()
    }

    /// Current state.
    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    /// Number of operations in the compiled sequence.
    pub fn compiled_len(&self) -> usize {
        self.schedule.len()
    }

    /// Discard the compiled sequence.
    pub fn reset(&mut self) {
        self.schedule.clear();
        self.diagnostic = None;
        self.compiled_fingerprint = None;
        self.compiled_region_size = None;
        self.state = EvaluatorState::Idle;
    }

    /// Evaluate the node tree into the host output texture.
    #[tracing::instrument(skip_all)]
    pub fn evaluate(&mut self, ctx: &mut Context) -> CompositorResult<()> {
        ctx.reset_cache();
        ctx.clear_info_message();

        let region_size = ctx.compositing_region_size();
        if self.state != EvaluatorState::Idle
            && (self.compiled_region_size != Some(region_size)
                || self.compiled_fingerprint != self.tree_fingerprint)
        {
            tracing::debug!("node tree or compositing region changed, recompiling");
            self.reset();
        }

        if self.state == EvaluatorState::Idle {
            if let Err(e) = self.compile(ctx) {
                self.reset();
                return Err(e);
            }
            self.compiled_region_size = Some(region_size);
            self.compiled_fingerprint = self.tree_fingerprint;
            self.state = EvaluatorState::Compiled;
        }
        if let Some(message) = self.diagnostic {
            ctx.set_info_message(message);
        }

        self.state = EvaluatorState::Executing;
        let result = self.execute(ctx);
        match &result {
            Ok(()) => self.state = EvaluatorState::Compiled,
            Err(e) => {
                tracing::warn!(error = %e, "evaluation failed");
                self.reset();
            }
        }
        if self.opts.free_unused_textures_after_evaluation {
            ctx.free_unused_textures();
        }
        result
    }

    #[tracing::instrument(skip_all)]
    fn compile(&mut self, ctx: &Context) -> CompositorResult<()> {
        let Some(tree) = self.tree.as_ref() else {
            tracing::debug!("no node tree");
            return Ok(());
        };
        tree.validate()?;

        let output_type = self.opts.output_node_type.trim().to_ascii_lowercase();
        let Some(output) = tree
            .nodes
            .iter()
            .position(|n| n.ty.trim().eq_ignore_ascii_case(&output_type))
        else {
            tracing::debug!(output_type = %output_type, "node tree has no output node");
            return Ok(());
        };

        let order = scheduler::schedule(tree, output)?;
        if let Some(node) = order
            .iter()
            .map(|&i| &tree.nodes[i])
            .find(|n| !self.registry.contains(&n.ty))
        {
            tracing::warn!(node = %node.id, node_type = %node.ty, "unsupported node type");
            self.diagnostic = Some(UNSUPPORTED_SETUP_MESSAGE);
            return Ok(());
        }

        let mut position = vec![None; tree.nodes.len()];
        let mut schedule: Vec<CompiledNode> = Vec::with_capacity(order.len());
        for &index in &order {
            let node = &tree.nodes[index];
            let operation = self.registry.create(node)?;
            let inputs = compile_inputs(ctx, tree, node, operation.as_ref(), &position, &schedule)?;
            let outputs = operation.output_descriptors();
            let output_references = vec![0; outputs.len()];
            for input in &inputs {
                if let InputSource::Linked { node: producer, output } = input.source {
                    schedule[producer].output_references[output] += 1;
                }
            }
            position[index] = Some(schedule.len());
            schedule.push(CompiledNode {
                id: node.id.clone(),
                operation,
                inputs,
                outputs,
                output_references,
            });
        }

        tracing::debug!(operations = schedule.len(), "compiled node tree");
        self.schedule = schedule;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut Context) -> CompositorResult<()> {
        let mut results: Vec<Vec<Option<OpResult>>> = self
            .schedule
            .iter()
            .map(|n| vec![None; n.outputs.len()])
            .collect();
        let mut remaining: Vec<Vec<u32>> = self
            .schedule
            .iter()
            .map(|n| n.output_references.clone())
            .collect();

        for position in 0..self.schedule.len() {
            let node = &mut self.schedule[position];
            let _span = tracing::debug_span!("operation", node = %node.id, op = node.operation.name())
                .entered();

            let mut io = OperationIo::new();
            for input in &node.inputs {
                let result = match &input.source {
                    InputSource::Linked { node: source, output } => results[*source][*output]
                        .clone()
                        .ok_or_else(|| {
                            CompositorError::evaluation(format!(
                                "input {} of '{}' was released before use",
                                input.descriptor.name, node.id
                            ))
                        })?,
                    InputSource::Unlinked(value) => value.clone(),
                };
                io.set_input(input.descriptor.name, result);
            }

            for input in &node.inputs {
                let descriptor = &input.descriptor;
                let Some(result) = io.take_input(descriptor.name) else {
                    continue;
                };
                let result = match ConversionOperation::construct_if_needed(&result, descriptor) {
                    Some(mut conversion) => {
                        let converted = run_processor(&mut conversion, ctx, result)?;
                        ctx.memory_barrier(Barrier::All);
                        converted
                    }
                    None => result,
                };
                io.set_input(descriptor.name, result);
            }

            let domain = node.operation.compute_domain(ctx, &io);
            io.set_domain(domain);

            for input in &node.inputs {
                let descriptor = &input.descriptor;
                let Some(result) = io.take_input(descriptor.name) else {
                    continue;
                };
                let result =
                    match RealizeOnDomainOperation::construct_if_needed(&result, descriptor, domain) {
                        Some(mut realization) => {
                            let realized = run_processor(&mut realization, ctx, result)?;
                            ctx.memory_barrier(Barrier::All);
                            realized
                        }
                        None => result,
                    };
                io.set_input(descriptor.name, result);
            }

            for (output, &references) in node.outputs.iter().zip(&node.output_references) {
                let mut result = ctx.create_result(output.ty);
                result.set_reference_count(references);
                io.set_output(output.name, result);
            }

            node.operation.execute(ctx, &mut io)?;
            ctx.memory_barrier(Barrier::All);

            drop(io.drain_inputs());
            for (name, mut result) in io.drain_outputs() {
                let Some(slot) = node.outputs.iter().position(|o| o.name == name) else {
                    continue;
                };
                if node.output_references[slot] == 0 {
                    continue;
                }
                if !result.is_allocated() {
                    tracing::warn!(output = name, "operation left a consumed output unallocated");
                    result.allocate_invalid();
                }
                results[position][slot] = Some(result);
            }

            for input in &node.inputs {
                if let InputSource::Linked { node: source, output } = input.source {
                    let count = &mut remaining[source][output];
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        results[source][output] = None;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvaluatorOpts::default())
    }
}

fn compile_inputs(
    ctx: &Context,
    tree: &NodeTree,
    node: &NodeDef,
    operation: &dyn Operation,
    position: &[Option<usize>],
    schedule: &[CompiledNode],
) -> CompositorResult<Vec<CompiledInput>> {
    let descriptors = operation.input_descriptors();
    if let Some(socket) = node
        .inputs
        .keys()
        .find(|socket| !descriptors.iter().any(|d| d.name == socket.as_str()))
    {
        return Err(CompositorError::validation(format!(
            "node '{}' has no input socket '{socket}'",
            node.id
        )));
    }
    if let Some(link) = tree
        .links
        .iter()
        .filter(|l| l.to == node.id)
        .find(|l| !descriptors.iter().any(|d| d.name == l.to_socket))
    {
        return Err(CompositorError::validation(format!(
            "node '{}' has no input socket '{}'",
            node.id, link.to_socket
        )));
    }

    descriptors
        .into_iter()
        .map(|descriptor| {
            let source = match tree.link_into(&node.id, descriptor.name) {
                Some(link) => {
                    let producer = tree
                        .node_index(&link.from)
                        .and_then(|i| position[i])
                        .ok_or_else(|| {
                            CompositorError::validation(format!(
                                "link source '{}' is not scheduled",
                                link.from
                            ))
                        })?;
                    let output = schedule[producer]
                        .outputs
                        .iter()
                        .position(|o| o.name == link.from_socket)
                        .ok_or_else(|| {
                            CompositorError::validation(format!(
                                "node '{}' has no output socket '{}'",
                                link.from, link.from_socket
                            ))
                        })?;
                    InputSource::Linked {
                        node: producer,
                        output,
                    }
                }
                None => {
                    let value = match node.inputs.get(descriptor.name) {
                        Some(value) => convert_value(value.ty(), descriptor.ty, value.to_float4()),
                        None => descriptor.default,
                    };
                    let mut result = ctx.create_result(descriptor.ty);
                    result.set_single_value(value);
                    InputSource::Unlinked(result)
                }
            };
            Ok(CompiledInput { descriptor, source })
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/evaluator.rs"]
mod tests;
