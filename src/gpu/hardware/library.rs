//! WGSL sources of the built-in kernels and how each module is assembled.
//!
//! A kernel body is written against generated accessors: `u_<name>()` for uniforms,
//! `<name>_size/_load/_load_zero/_sample` for sampled textures and `<name>_size/_load/_store`
//! for storage images. [`assemble`] emits those accessors from the kernel's interface, so the
//! bodies read like the software kernels they mirror.

use crate::cache::smaa::{SMAA_AREA_DISTANCES, SMAA_MAX_SEARCH_DISTANCE};
use crate::foundation::core::Affine;
use crate::gpu::Uniform;
use crate::result::ResultType;
use crate::shaders::conversion::conversion_shader;
use crate::shaders::reduction::REDUCTION_TILE;

const COMMON: &str = include_str!("kernels/common.wgsl");
const TEXTURE_BINDING: &str = include_str!("kernels/texture_binding.wgsl");
const IMAGE_BINDING: &str = include_str!("kernels/image_binding.wgsl");

const REALIZE: &str = include_str!("kernels/realize.wgsl");
const CONVERSION: &str = include_str!("kernels/conversion.wgsl");
const WRITE_OUTPUT: &str = include_str!("kernels/write_output.wgsl");
const BRIGHT_CONTRAST: &str = include_str!("kernels/bright_contrast.wgsl");
const MIX: &str = include_str!("kernels/mix.wgsl");
const NORMALIZE: &str = include_str!("kernels/normalize.wgsl");
const SYMMETRIC_SEPARABLE_BLUR: &str = include_str!("kernels/symmetric_separable_blur.wgsl");
const MORPHOLOGY: &str = include_str!("kernels/morphology.wgsl");
const MORPHOLOGICAL_STEP: &str = include_str!("kernels/morphological_step.wgsl");
const MORPHOLOGICAL_DISTANCE: &str = include_str!("kernels/morphological_distance.wgsl");
const MORPHOLOGICAL_DISTANCE_FEATHER: &str =
    include_str!("kernels/morphological_distance_feather.wgsl");
const GLARE_HIGHLIGHTS: &str = include_str!("kernels/glare_highlights.wgsl");
const GLARE_STAR_LINE: &str = include_str!("kernels/glare_star_line.wgsl");
const GLARE_STAR_HORIZONTAL: &str = include_str!("kernels/glare_star_horizontal.wgsl");
const GLARE_STAR_VERTICAL: &str = include_str!("kernels/glare_star_vertical.wgsl");
const GLARE_STAR_DIAGONAL: &str = include_str!("kernels/glare_star_diagonal.wgsl");
const GLARE_STAR_ANTI_DIAGONAL: &str = include_str!("kernels/glare_star_anti_diagonal.wgsl");
const GLARE_BLOOM_DOWNSAMPLE: &str = include_str!("kernels/glare_bloom_downsample.wgsl");
const GLARE_BLOOM_UPSAMPLE: &str = include_str!("kernels/glare_bloom_upsample.wgsl");
const GLARE_MIX: &str = include_str!("kernels/glare_mix.wgsl");
const GLARE_WRITE_GLARE_OUTPUT: &str = include_str!("kernels/glare_write_glare_output.wgsl");
const GLARE_WRITE_HIGHLIGHTS_OUTPUT: &str =
    include_str!("kernels/glare_write_highlights_output.wgsl");
const SMAA_EDGE_DETECTION: &str = include_str!("kernels/smaa_edge_detection.wgsl");
const SMAA_BLENDING_WEIGHTS: &str = include_str!("kernels/smaa_blending_weights.wgsl");
const SMAA_NEIGHBORHOOD_BLENDING: &str = include_str!("kernels/smaa_neighborhood_blending.wgsl");
const REDUCTION: &str = include_str!("kernels/reduction.wgsl");

/// Type of a uniform as the WGSL accessor returns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UniformKind {
    Float,
    Int,
    Bool,
    Int2,
    Float3,
    Float4,
    Affine,
}

use UniformKind as U;

impl UniformKind {
    /// `vec4<u32>` slots taken in the parameter block.
    pub(crate) fn slots(self) -> usize {
        match self {
            Self::Affine => 2,
            _ => 1,
        }
    }

    /// Bit patterns of `value` read as this kind; unset values read as zero, affines as
    /// identity. Only the first [`Self::slots`] entries are meaningful.
    pub(crate) fn encode(self, value: Option<Uniform>) -> [[u32; 4]; 2] {
        let mut out = [[0u32; 4]; 2];
        match self {
            Self::Float => {
                let v = match value {
                    Some(Uniform::Float(v)) => v,
                    Some(Uniform::Int(v)) => v as f32,
                    _ => 0.0,
                };
                out[0][0] = v.to_bits();
            }
            Self::Int => {
                let v = match value {
                    Some(Uniform::Int(v)) => v,
                    Some(Uniform::Bool(v)) => i32::from(v),
                    _ => 0,
                };
                out[0][0] = v as u32;
            }
            Self::Bool => {
                let v = match value {
                    Some(Uniform::Bool(v)) => v,
                    Some(Uniform::Int(v)) => v != 0,
                    _ => false,
                };
                out[0][0] = u32::from(v);
            }
            Self::Int2 => {
                if let Some(Uniform::Int2(v)) = value {
                    out[0][0] = v.x as u32;
                    out[0][1] = v.y as u32;
                }
            }
            Self::Float3 => {
                let v = match value {
                    Some(Uniform::Float3(v)) => v,
                    Some(Uniform::Float4(v)) => v.xyz(),
                    _ => [0.0; 3],
                };
                for (slot, c) in out[0].iter_mut().zip(v) {
                    *slot = c.to_bits();
                }
            }
            Self::Float4 => {
                if let Some(Uniform::Float4(v)) = value {
                    for (slot, c) in out[0].iter_mut().zip(v.0) {
                        *slot = c.to_bits();
                    }
                }
            }
            Self::Affine => {
                let coeffs = match value {
                    Some(Uniform::Affine(a)) => a.as_coeffs(),
                    _ => Affine::IDENTITY.as_coeffs(),
                };
                for (i, c) in coeffs.into_iter().enumerate() {
                    out[i / 4][i % 4] = (c as f32).to_bits();
                }
            }
        }
        out
    }

    fn accessor(self, name: &str, slot: usize) -> String {
        let (ty, expr) = match self {
            Self::Float => ("f32", format!("bitcast<f32>(params.slots[{slot}].x)")),
            Self::Int => ("i32", format!("bitcast<i32>(params.slots[{slot}].x)")),
            Self::Bool => ("bool", format!("params.slots[{slot}].x != 0u")),
            Self::Int2 => ("vec2<i32>", format!("bitcast<vec2<i32>>(params.slots[{slot}].xy)")),
            Self::Float3 => ("vec3<f32>", format!("bitcast<vec3<f32>>(params.slots[{slot}].xyz)")),
            Self::Float4 => ("vec4<f32>", format!("bitcast<vec4<f32>>(params.slots[{slot}])")),
            Self::Affine => {
                let next = slot + 1;
                return format!(
                    "fn u_{name}(p: vec2<f32>) -> vec2<f32> {{\n    \
                     let m = bitcast<vec4<f32>>(params.slots[{slot}]);\n    \
                     let t = bitcast<vec4<f32>>(params.slots[{next}]);\n    \
                     return vec2<f32>(m.x * p.x + m.z * p.y + t.x, m.y * p.x + m.w * p.y + t.y);\n}}\n"
                );
            }
        };
        format!("fn u_{name}() -> {ty} {{\n    return {expr};\n}}\n")
    }
}

/// Interface and sources of one built-in kernel.
#[derive(Clone, Debug)]
pub(crate) struct KernelSource {
    pub(crate) name: &'static str,
    pub(crate) local_size: [u32; 2],
    pub(crate) uniforms: &'static [(&'static str, UniformKind)],
    pub(crate) textures: &'static [&'static str],
    pub(crate) images: &'static [&'static str],
    constants: Vec<(&'static str, i32)>,
    renames: Vec<(&'static str, &'static str)>,
    sources: &'static [&'static str],
}

impl KernelSource {
    fn new(name: &'static str, sources: &'static [&'static str]) -> Self {
        Self {
            name,
            local_size: [16, 16],
            uniforms: &[],
            textures: &[],
            images: &[],
            constants: Vec::new(),
            renames: Vec::new(),
            sources,
        }
    }

    fn uniforms(mut self, uniforms: &'static [(&'static str, UniformKind)]) -> Self {
        self.uniforms = uniforms;
        self
    }

    fn textures(mut self, textures: &'static [&'static str]) -> Self {
        self.textures = textures;
        self
    }

    fn images(mut self, images: &'static [&'static str]) -> Self {
        self.images = images;
        self
    }

    fn constant(mut self, name: &'static str, value: i32) -> Self {
        self.constants.push((name, value));
        self
    }

    fn rename(mut self, from: &'static str, to: &'static str) -> Self {
        self.renames.push((from, to));
        self
    }

    fn local_size(mut self, x: u32, y: u32) -> Self {
        self.local_size = [x, y];
        self
    }

    /// `vec4<u32>` slots of the parameter block, at least one.
    pub(crate) fn parameter_slots(&self) -> usize {
        self.uniforms
            .iter()
            .map(|(_, kind)| kind.slots())
            .sum::<usize>()
            .max(1)
    }
}

/// WGSL name of a storage format.
pub(crate) fn storage_format_name(format: wgpu::TextureFormat) -> &'static str {
    match format {
        wgpu::TextureFormat::R32Float => "r32float",
        _ => "rgba32float",
    }
}

/// Complete WGSL module of `kernel` with its images bound as `image_formats`.
///
/// Bindings, all in group 0: the parameter block at 0, per-texture sampler state at 1, then the
/// sampled textures and the storage images in interface order.
pub(crate) fn assemble(kernel: &KernelSource, image_formats: &[wgpu::TextureFormat]) -> String {
    let mut out = String::new();
    for (name, value) in &kernel.constants {
        out.push_str(&format!("const {name}: i32 = {value};\n"));
    }
    out.push_str(&format!(
        "struct Params {{\n    slots: array<vec4<u32>, {}>,\n}}\n\
         @group(0) @binding(0) var<uniform> params: Params;\n",
        kernel.parameter_slots()
    ));
    out.push_str(&format!(
        "struct SamplerInfo {{\n    entries: array<vec4<u32>, {}>,\n}}\n\
         @group(0) @binding(1) var<uniform> sampler_info: SamplerInfo;\n\n",
        kernel.textures.len().max(1)
    ));

    let mut slot = 0;
    for &(name, kind) in kernel.uniforms {
        out.push_str(&kind.accessor(name, slot));
        slot += kind.slots();
    }
    for (index, name) in kernel.textures.iter().enumerate() {
        out.push_str(
            &TEXTURE_BINDING
                .replace("BINDING", &(2 + index).to_string())
                .replace("INDEX", &index.to_string())
                .replace("NAME", name),
        );
    }
    for (index, (name, format)) in kernel.images.iter().zip(image_formats).enumerate() {
        out.push_str(
            &IMAGE_BINDING
                .replace("BINDING", &(2 + kernel.textures.len() + index).to_string())
                .replace("FORMAT", storage_format_name(*format))
                .replace("NAME", name),
        );
    }

    out.push_str(COMMON);
    for source in kernel.sources {
        let mut source = (*source).to_owned();
        for (from, to) in &kernel.renames {
            source = source.replace(from, to);
        }
        out.push('\n');
        out.push_str(&source);
    }

    let [x, y] = kernel.local_size;
    out.push_str(&format!(
        "\n@compute @workgroup_size({x}, {y}, 1)\n\
         fn main(@builtin(global_invocation_id) id: vec3<u32>) {{\n    \
         kernel(vec2<i32>(id.xy));\n}}\n"
    ));
    out
}

fn result_type_code(ty: ResultType) -> i32 {
    match ty {
        ResultType::Float => 0,
        ResultType::Color => 1,
        ResultType::Vector => 2,
    }
}

const REDUCTION_UNIFORMS: &[(&str, UniformKind)] = &[
    ("is_initial_reduction", U::Bool),
    ("luminance_coefficients", U::Float3),
    ("subtrahend", U::Float),
    ("lower_bound", U::Float),
    ("upper_bound", U::Float),
];

/// Name, then the `INITIALIZE`, `REDUCE` and `IDENTITY` codes documented in `reduction.wgsl`.
const REDUCTIONS: &[(&str, i32, i32, i32)] = &[
    ("compositor_sum_red", 0, 0, 0),
    ("compositor_sum_green", 1, 0, 0),
    ("compositor_sum_blue", 2, 0, 0),
    ("compositor_sum_luminance", 3, 0, 0),
    ("compositor_sum_color", 4, 0, 0),
    ("compositor_sum_red_squared_difference", 5, 0, 0),
    ("compositor_sum_green_squared_difference", 6, 0, 0),
    ("compositor_sum_blue_squared_difference", 7, 0, 0),
    ("compositor_sum_luminance_squared_difference", 8, 0, 0),
    ("compositor_maximum_luminance", 3, 1, 1),
    ("compositor_minimum_luminance", 3, 2, 2),
    ("compositor_maximum_float", 0, 1, 1),
    ("compositor_minimum_float", 0, 2, 2),
    ("compositor_maximum_float_in_range", 9, 1, 3),
    ("compositor_minimum_float_in_range", 10, 2, 4),
];

const GLARE_ADJUST_UNIFORMS: &[(&str, UniformKind)] = &[
    ("strength", U::Float),
    ("saturation", U::Float),
    ("tint", U::Float3),
];

const STAR_UNIFORMS: &[(&str, UniformKind)] =
    &[("iterations", U::Int), ("fade_factor", U::Float)];

/// Every built-in kernel, under the names the software device registers them.
pub(crate) fn builtin_kernels() -> Vec<KernelSource> {
    let mut kernels = Vec::new();

    for (name, interpolation) in [
        ("compositor_realize_on_domain_nearest", 0),
        ("compositor_realize_on_domain_bilinear", 1),
        ("compositor_realize_on_domain_bicubic", 2),
    ] {
        kernels.push(
            KernelSource::new(name, &[REALIZE])
                .uniforms(&[("inverse_transformation", U::Affine)])
                .textures(&["input_tx"])
                .images(&["domain_img"])
                .constant("INTERPOLATION", interpolation),
        );
    }

    {
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
                kernels.push(
                    KernelSource::new(name, &[CONVERSION])
                        .textures(&["input_tx"])
                        .images(&["output_img"])
                        .constant("SOURCE_TYPE", result_type_code(from))
                        .constant("TARGET_TYPE", result_type_code(to)),
                );
            }
        }
    }

    for (name, opaque) in [
        ("compositor_write_output", 0),
        ("compositor_write_output_opaque", 1),
    ] {
        kernels.push(
            KernelSource::new(name, &[WRITE_OUTPUT])
                .uniforms(&[("lower_bound", U::Int2)])
                .textures(&["input_tx"])
                .images(&["output_img"])
                .constant("OPAQUE", opaque),
        );
    }

    kernels.push(
        KernelSource::new("compositor_bright_contrast", &[BRIGHT_CONTRAST])
            .uniforms(&[("brightness", U::Float), ("contrast", U::Float)])
            .textures(&["input_tx"])
            .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new("compositor_mix", &[MIX])
            .uniforms(&[
                ("blend_type", U::Int),
                ("use_alpha", U::Bool),
                ("clamp", U::Bool),
            ])
            .textures(&["factor_tx", "first_tx", "second_tx"])
            .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new("compositor_normalize", &[NORMALIZE])
            .uniforms(&[("minimum", U::Float), ("scale", U::Float)])
            .textures(&["input_tx"])
            .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new(
            "compositor_symmetric_separable_blur",
            &[SYMMETRIC_SEPARABLE_BLUR],
        )
        .textures(&["input_tx", "weights_tx"])
        .images(&["output_img"]),
    );

    kernels.push(
        KernelSource::new(
            "compositor_morphological_step",
            &[MORPHOLOGY, MORPHOLOGICAL_STEP],
        )
        .uniforms(&[("radius", U::Int), ("is_dilate", U::Bool)])
        .textures(&["input_tx"])
        .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new(
            "compositor_morphological_distance",
            &[MORPHOLOGY, MORPHOLOGICAL_DISTANCE],
        )
        .uniforms(&[("radius", U::Int), ("is_dilate", U::Bool)])
        .textures(&["input_tx"])
        .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new(
            "compositor_morphological_distance_feather",
            &[MORPHOLOGICAL_DISTANCE_FEATHER],
        )
        .uniforms(&[("is_dilate", U::Bool)])
        .textures(&["input_tx", "weights_tx", "falloffs_tx"])
        .images(&["output_img"]),
    );

    kernels.push(
        KernelSource::new("compositor_glare_highlights", &[GLARE_HIGHLIGHTS])
            .uniforms(&[
                ("threshold", U::Float),
                ("max_brightness", U::Float),
                ("highlights_smoothness", U::Float),
            ])
            .textures(&["input_tx"])
            .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new(
            "compositor_glare_simple_star_horizontal_pass",
            &[GLARE_STAR_LINE, GLARE_STAR_HORIZONTAL],
        )
        .uniforms(STAR_UNIFORMS)
        .images(&["horizontal_img"])
        .rename("STAR_IMG", "horizontal_img")
        .local_size(16, 1),
    );
    kernels.push(
        KernelSource::new(
            "compositor_glare_simple_star_vertical_pass",
            &[GLARE_STAR_LINE, GLARE_STAR_VERTICAL],
        )
        .uniforms(STAR_UNIFORMS)
        .textures(&["horizontal_tx"])
        .images(&["vertical_img"])
        .rename("STAR_IMG", "vertical_img")
        .local_size(16, 1),
    );
    kernels.push(
        KernelSource::new(
            "compositor_glare_simple_star_diagonal_pass",
            &[GLARE_STAR_LINE, GLARE_STAR_DIAGONAL],
        )
        .uniforms(STAR_UNIFORMS)
        .images(&["diagonal_img"])
        .rename("STAR_IMG", "diagonal_img")
        .local_size(16, 1),
    );
    kernels.push(
        KernelSource::new(
            "compositor_glare_simple_star_anti_diagonal_pass",
            &[GLARE_STAR_LINE, GLARE_STAR_ANTI_DIAGONAL],
        )
        .uniforms(STAR_UNIFORMS)
        .textures(&["diagonal_tx"])
        .images(&["anti_diagonal_img"])
        .rename("STAR_IMG", "anti_diagonal_img")
        .local_size(16, 1),
    );
    for (name, karis) in [
        ("compositor_glare_bloom_downsample_karis_average", 1),
        ("compositor_glare_bloom_downsample_simple_average", 0),
    ] {
        kernels.push(
            KernelSource::new(name, &[GLARE_BLOOM_DOWNSAMPLE])
                .textures(&["input_tx"])
                .images(&["output_img"])
                .constant("KARIS_AVERAGE", karis),
        );
    }
    kernels.push(
        KernelSource::new("compositor_glare_bloom_upsample", &[GLARE_BLOOM_UPSAMPLE])
            .textures(&["input_tx"])
            .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new("compositor_glare_mix", &[GLARE_MIX])
            .uniforms(GLARE_ADJUST_UNIFORMS)
            .textures(&["input_tx", "glare_tx"])
            .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new(
            "compositor_glare_write_glare_output",
            &[GLARE_WRITE_GLARE_OUTPUT],
        )
        .uniforms(GLARE_ADJUST_UNIFORMS)
        .textures(&["input_tx"])
        .images(&["output_img"]),
    );
    kernels.push(
        KernelSource::new(
            "compositor_glare_write_highlights_output",
            &[GLARE_WRITE_HIGHLIGHTS_OUTPUT],
        )
        .textures(&["input_tx"])
        .images(&["output_img"]),
    );

    kernels.push(
        KernelSource::new("compositor_smaa_edge_detection", &[SMAA_EDGE_DETECTION])
            .uniforms(&[
                ("luminance_coefficients", U::Float3),
                ("threshold", U::Float),
                ("local_contrast_adaptation_factor", U::Float),
            ])
            .textures(&["input_tx"])
            .images(&["edges_img"]),
    );
    kernels.push(
        KernelSource::new("compositor_smaa_blending_weights", &[SMAA_BLENDING_WEIGHTS])
            .uniforms(&[("corner_rounding", U::Float)])
            .textures(&["edges_tx", "area_tx", "search_tx"])
            .images(&["weights_img"])
            .constant("SMAA_MAX_SEARCH_DISTANCE", SMAA_MAX_SEARCH_DISTANCE)
            .constant("SMAA_AREA_DISTANCES", SMAA_AREA_DISTANCES),
    );
    for (name, single_channel) in [
        ("compositor_smaa_neighborhood_blending_float4", 0),
        ("compositor_smaa_neighborhood_blending_float", 1),
    ] {
        kernels.push(
            KernelSource::new(name, &[SMAA_NEIGHBORHOOD_BLENDING])
                .textures(&["input_tx", "weights_tx"])
                .images(&["output_img"])
                .constant("SINGLE_CHANNEL", single_channel),
        );
    }

    for &(name, initialize, reduce, identity) in REDUCTIONS {
        kernels.push(
            KernelSource::new(name, &[REDUCTION])
                .uniforms(REDUCTION_UNIFORMS)
                .textures(&["input_tx"])
                .images(&["reduced_img"])
                .constant("INITIALIZE", initialize)
                .constant("REDUCE", reduce)
                .constant("IDENTITY", identity)
                .constant("REDUCTION_TILE", REDUCTION_TILE)
                .local_size(1, 1),
        );
    }

    kernels
}
