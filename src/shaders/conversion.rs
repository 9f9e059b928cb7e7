use crate::foundation::core::Float4;
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::software::{ComputeKernel, Invocation, SoftwareDevice};
use crate::result::ResultType;

/// Value of type `from` read as type `to`.
pub(crate) fn convert_value(from: ResultType, to: ResultType, v: Float4) -> Float4 {
    match (from, to) {
        (ResultType::Float, ResultType::Color) => Float4::new(v[0], v[0], v[0], 1.0),
        (ResultType::Float, ResultType::Vector) => Float4::new(v[0], v[0], v[0], 0.0),
        (ResultType::Color | ResultType::Vector, ResultType::Float) => {
            Float4::new((v[0] + v[1] + v[2]) / 3.0, 0.0, 0.0, 1.0)
        }
        (ResultType::Vector, ResultType::Color) => v.with_w(1.0),
        (ResultType::Color, ResultType::Vector) => v.with_w(0.0),
        _ => v,
    }
}

pub(crate) fn conversion_shader(from: ResultType, to: ResultType) -> CompositorResult<&'static str> {
    Ok(match (from, to) {
        (ResultType::Float, ResultType::Color) => "compositor_convert_float_to_color",
        (ResultType::Float, ResultType::Vector) => "compositor_convert_float_to_vector",
        (ResultType::Color, ResultType::Float) => "compositor_convert_color_to_float",
        (ResultType::Vector, ResultType::Float) => "compositor_convert_vector_to_float",
        (ResultType::Vector, ResultType::Color) => "compositor_convert_vector_to_color",
        (ResultType::Color, ResultType::Vector) => "compositor_convert_color_to_vector",
        _ => {
            return Err(CompositorError::evaluation(format!(
                "no conversion from {from:?} to {to:?}"
            )));
        }
    })
}

struct Convert {
    from: ResultType,
    to: ResultType,
}

impl ComputeKernel for Convert {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let texel = inv.global_id();
        if !inv.image_size("output_img").contains(texel) {
            return;
        }
        let value = inv.texture_load("input_tx", texel);
        inv.image_store("output_img", texel, convert_value(self.from, self.to, value));
    }
}

pub(super) fn register(device: &mut SoftwareDevice) {
    use ResultType::{Color, Float, Vector};
    for (from, to) in [
        (Float, Color),
        (Float, Vector),
        (Color, Float),
        (Vector, Float),
        (Vector, Color),
        (Color, Vector),
    ] {
        if let Ok(name) = conversion_shader(from, to) {
            device.register_kernel(name, Convert { from, to });
        }
    }
}
