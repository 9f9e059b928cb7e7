use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};

/// Copies the input into the output image at `lower_bound`.
struct WriteOutput {
    opaque: bool,
}

impl ComputeKernel for WriteOutput {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.texture_size("input_tx").contains(texel) {
            return;
        }
        let mut value = inv.texture_load("input_tx", texel);
        if self.opaque {
            value[3] = 1.0;
        }
        let lower_bound = inv.uniform_int2("lower_bound");
        inv.image_store("output_img", texel + lower_bound, value);
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    device.register_kernel("compositor_write_output", WriteOutput { opaque: false });
    device.register_kernel("compositor_write_output_opaque", WriteOutput { opaque: true });
}
