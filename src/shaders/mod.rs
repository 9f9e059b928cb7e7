//! Built-in compute kernels, registered on the software device under the names operations
//! look shaders up by.
//!
//! Per-pixel math that operations also evaluate on the host for single values lives next to
//! the kernel using it, so both paths share one definition.

use crate::gpu::software::SoftwareDevice;

pub(crate) mod blur;
pub(crate) mod color;
pub(crate) mod conversion;
pub(crate) mod glare;
pub(crate) mod morphology;
pub(crate) mod output;
pub(crate) mod realize;
pub(crate) mod reduction;
pub(crate) mod smaa;

pub(crate) fn register_builtin_kernels(device: &mut SoftwareDevice) {
    realize::register(device);
    conversion::register(device);
    output::register(device);
    color::register(device);
    blur::register(device);
    morphology::register(device);
    glare::register(device);
    smaa::register(device);
    reduction::register(device);
}
