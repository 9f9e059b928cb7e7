//! A compositor owned by an interactive viewport and run once per redraw.

use crate::context::{Context, ContextOpts};
use crate::evaluator::{Evaluator, EvaluatorOpts, EvaluatorState};
use crate::foundation::core::Float4;
use crate::foundation::error::CompositorResult;
use crate::gpu::GpuDevice;
use crate::host::CompositorHost;
use crate::tree::NodeTree;

/// Options of a [`ViewportCompositor`].
#[derive(Clone, Debug, Default)]
pub struct ViewportCompositorOpts {
    /// Context configuration.
    pub context: ContextOpts,
    /// Evaluator configuration.
    pub evaluator: EvaluatorOpts,
}

/// Owns the [`Context`] and the [`Evaluator`] of one viewport.
pub struct ViewportCompositor {
    context: Context,
    evaluator: Evaluator,
}

impl ViewportCompositor {
    /// Compositor over `gpu`, writing into the output texture of `host`. No tree is set yet,
    /// so redraws do nothing until [`ViewportCompositor::set_node_tree`].
    pub fn new(
        gpu: Box<dyn GpuDevice>,
        host: Box<dyn CompositorHost>,
        opts: ViewportCompositorOpts,
    ) -> Self {
        Self {
            context: Context::new(gpu, host, opts.context),
            evaluator: Evaluator::new(opts.evaluator),
        }
    }

    /// Replace the node tree. Recompilation happens on the next redraw, and only when the
    /// tree differs from the compiled one.
    pub fn set_node_tree(&mut self, tree: NodeTree) {
        self.evaluator.set_node_tree(tree);
    }

    /// Evaluate the node tree into the host's output texture.
    #[tracing::instrument(skip_all, fields(frame = self.context.frame_number()))]
    pub fn redraw(&mut self) -> CompositorResult<()> {
        self.evaluator.evaluate(&mut self.context)
    }

    /// Texels of the output texture, row-major.
    pub fn read_output(&mut self) -> CompositorResult<Vec<Float4>> {
        self.context.read_output()
    }

    /// Drop the compiled sequence and give pooled textures back to the device.
    pub fn reset(&mut self) {
        self.evaluator.reset();
        self.context.free_unused_textures();
    }

    /// Current [`EvaluatorState`] of the evaluator.
    pub fn state(&self) -> EvaluatorState {
        self.evaluator.state()
    }

    /// Evaluation context holding the device and the host.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable [`ViewportCompositor::context`], for reconfiguring the host between redraws.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// The compiled operation sequence and its node tree.
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Mutable access to the evaluator, for registering custom operations.
    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }
}
