#![forbid(unsafe_code)]

pub mod algorithms;
pub mod cache;
pub mod context;
pub mod evaluator;
pub mod foundation;
pub mod gpu;
pub mod host;
pub mod operation;
pub mod operations;
pub mod result;
pub mod session;
pub mod texture_pool;
pub mod tree;

mod shaders;

#[cfg(test)]
mod testing;

pub use cache::{CacheManager, FalloffType, FilterType};
pub use context::{Context, ContextOpts, ShaderPass};
pub use evaluator::{Evaluator, EvaluatorOpts, EvaluatorState, UNSUPPORTED_SETUP_MESSAGE};
pub use foundation::core::{Affine, Float4, Int2, IntRect};
pub use foundation::error::{CompositorError, CompositorResult};
pub use gpu::software::{SoftwareDevice, SoftwareDeviceOpts};
#[cfg(feature = "gpu")]
pub use gpu::hardware::{WgpuDevice, WgpuDeviceOpts};
pub use gpu::{Barrier, DeviceStats, GpuDevice, TextureFormat, TextureId};
pub use host::{CompositorHost, ViewportHost};
pub use operation::{InputDescriptor, Operation, OperationIo, OutputDescriptor};
pub use operations::{OperationFactory, OperationRegistry};
pub use result::{Domain, Interpolation, OpResult, RealizationOptions, ResultPrecision, ResultType};
pub use session::{ViewportCompositor, ViewportCompositorOpts};
pub use shaders::color::BlendType;
pub use texture_pool::{PooledTexture, TexturePool, TexturePoolOpts, TexturePoolStats};
pub use tree::{InputValue, LinkDef, NodeDef, NodeTree};
