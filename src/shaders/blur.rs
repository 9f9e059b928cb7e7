use crate::foundation::core::Int2;
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};

/// One horizontal pass of a symmetric separable blur, written transposed so the next pass
/// blurs the other axis with the same kernel.
struct SymmetricSeparableBlur;

impl ComputeKernel for SymmetricSeparableBlur {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.texture_size("input_tx").contains(texel) {
            return;
        }
        let taps = inv.texture_size("weights_tx").x;

        let center = inv.texture_load("weights_tx", Int2::ZERO)[0];
        let mut acc = inv.texture_load("input_tx", texel) * center;
        for i in 1..taps {
            let weight = inv.texture_load("weights_tx", Int2::new(i, 0))[0];
            let right = inv.texture_load("input_tx", texel + Int2::new(i, 0));
            let left = inv.texture_load("input_tx", texel - Int2::new(i, 0));
            acc += (right + left) * weight;
        }
        inv.image_store("output_img", texel.transposed(), acc);
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    device.register_kernel("compositor_symmetric_separable_blur", SymmetricSeparableBlur);
}
