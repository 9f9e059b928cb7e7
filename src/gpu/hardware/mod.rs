use std::borrow::Cow;
use std::collections::HashMap;

use smallvec::SmallVec;
use wgpu::util::DeviceExt as _;

use crate::foundation::core::{Float4, Int2};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::gpu::{
    Barrier, DeviceStats, Extend, Filter, GpuDevice, SamplerState, ShaderBindings, ShaderId,
    TextureFormat, TextureId, TextureSource,
};

pub(crate) mod library;

use library::KernelSource;

/// Options for [`WgpuDevice`].
#[derive(Clone, Debug)]
pub struct WgpuDeviceOpts {
    /// Adapter power preference.
    pub power_preference: wgpu::PowerPreference,
    /// Ask for the platform's software adapter.
    pub force_fallback_adapter: bool,
}

impl Default for WgpuDeviceOpts {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

struct DeviceTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Int2,
    format: TextureFormat,
}

type StorageFormats = SmallVec<[wgpu::TextureFormat; 2]>;

struct Pipeline {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

struct Kernel {
    source: KernelSource,
    pipelines: HashMap<StorageFormats, Pipeline>,
}

/// [`GpuDevice`] on a `wgpu` adapter.
///
/// Half and full float formats are both stored as 32-bit floats. Every texture can be sampled,
/// bound as a read-write storage image and copied. Pipelines are built on first dispatch for
/// each combination of storage formats a kernel sees.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureId, DeviceTexture>,
    next_texture: u32,
    kernels: Vec<Kernel>,
    kernel_ids: HashMap<&'static str, ShaderId>,
    stats: DeviceStats,
}

fn storage_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format.channels() {
        1 => wgpu::TextureFormat::R32Float,
        _ => wgpu::TextureFormat::Rgba32Float,
    }
}

fn extent(size: Int2) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.x.unsigned_abs(),
        height: size.y.unsigned_abs(),
        depth_or_array_layers: 1,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

fn texel_bytes(format: TextureFormat) -> u32 {
    format.channels() as u32 * 4
}

fn encode_texels(format: TextureFormat, data: &[Float4]) -> Vec<u8> {
    let channels = format.channels();
    data.iter()
        .flat_map(|t| t.0.into_iter().take(channels))
        .flat_map(f32::to_ne_bytes)
        .collect()
}

fn read_f32(bytes: &[u8]) -> f32 {
    bytes.try_into().map(f32::from_ne_bytes).unwrap_or(0.0)
}

fn decode_texel(format: TextureFormat, bytes: &[u8]) -> Float4 {
    let mut texel = Float4::ZERO;
    for (c, chunk) in bytes.chunks_exact(4).take(format.channels()).enumerate() {
        texel[c] = read_f32(chunk);
    }
    format.normalize(texel)
}

fn sampler_state_code(sampler: SamplerState, constant: bool) -> [u32; 4] {
    let extend = |e: Extend| match e {
        Extend::ClampToEdge => 0,
        Extend::ClampToBorder => 1,
        Extend::Repeat => 2,
    };
    let filter = match sampler.filter {
        Filter::Nearest => 0,
        Filter::Bilinear => 1,
    };
    [
        filter,
        extend(sampler.extend_x),
        extend(sampler.extend_y),
        u32::from(constant),
    ]
}

fn uniform_bytes(source: &KernelSource, bindings: &ShaderBindings) -> Vec<u8> {
    let mut slots: Vec<[u32; 4]> = Vec::with_capacity(source.parameter_slots());
    for &(name, kind) in source.uniforms {
        let encoded = kind.encode(bindings.uniform(name));
        slots.extend_from_slice(&encoded[..kind.slots()]);
    }
    if slots.is_empty() {
        slots.push([0; 4]);
    }
    slots.iter().flatten().flat_map(|v| v.to_ne_bytes()).collect()
}

fn build_pipeline(
    device: &wgpu::Device,
    source: &KernelSource,
    formats: &[wgpu::TextureFormat],
) -> CompositorResult<Pipeline> {
    let wgsl = library::assemble(source, formats);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(source.name),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(wgsl)),
    });

    let uniform = |binding: u32| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    let mut entries = vec![uniform(0), uniform(1)];
    let mut binding = 2;
    for _ in source.textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        binding += 1;
    }
    for &format in formats {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::ReadWrite,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });
        binding += 1;
    }

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(source.name),
        entries: &entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(source.name),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(source.name),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(CompositorError::gpu(format!(
            "kernel {} failed to build: {error}",
            source.name
        )));
    }
    tracing::debug!(kernel = source.name, ?formats, "built compute pipeline");
    Ok(Pipeline { pipeline, layout })
}

impl WgpuDevice {
    /// Open the preferred adapter and register the built-in kernels.
    ///
    /// Kernels write four-channel results through read-write storage images, so adapters
    /// without read-write `Rgba32Float` storage are rejected.
    pub fn new(opts: WgpuDeviceOpts) -> CompositorResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: opts.power_preference,
            compatible_surface: None,
            force_fallback_adapter: opts.force_fallback_adapter,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                CompositorError::gpu("no gpu adapter available")
            }
            other => CompositorError::gpu(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let format_features = wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        let read_write = adapter
            .get_texture_format_features(wgpu::TextureFormat::Rgba32Float)
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::STORAGE_READ_WRITE);
        if !adapter.features().contains(format_features) || !read_write {
            return Err(CompositorError::gpu(format!(
                "adapter {} cannot read and write rgba32float storage images",
                adapter.get_info().name
            )));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("compositor"),
            required_features: format_features,
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| CompositorError::gpu(format!("wgpu request_device failed: {e:?}")))?;
        tracing::info!(adapter = %adapter.get_info().name, "opened wgpu device");

        let mut this = Self {
            device,
            queue,
            textures: HashMap::new(),
            next_texture: 1,
            kernels: Vec::new(),
            kernel_ids: HashMap::new(),
            stats: DeviceStats::default(),
        };
        for source in library::builtin_kernels() {
            let id = ShaderId(this.kernels.len() as u32);
            this.kernel_ids.insert(source.name, id);
            this.kernels.push(Kernel {
                source,
                pipelines: HashMap::new(),
            });
        }
        Ok(this)
    }

    /// Names of all built-in kernels.
    pub fn kernel_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kernels.iter().map(|k| k.source.name)
    }

    fn texture(&self, texture: TextureId) -> CompositorResult<&DeviceTexture> {
        self.textures
            .get(&texture)
            .ok_or_else(|| CompositorError::gpu(format!("unknown texture {}", texture.0)))
    }

    fn upload(&self, texture: &wgpu::Texture, size: Int2, format: TextureFormat, data: &[Float4]) {
        let bytes = encode_texels(format, data);
        self.queue.write_texture(
            texture.as_image_copy(),
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.x.unsigned_abs() * texel_bytes(format)),
                rows_per_image: Some(size.y.unsigned_abs()),
            },
            extent(size),
        );
    }

    /// 1x1 texture holding a broadcast constant.
    fn constant_view(&self, value: Float4) -> wgpu::TextureView {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("compositor_constant"),
            size: extent(Int2::ONE),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.upload(&texture, Int2::ONE, TextureFormat::Rgba32F, &[value]);
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn ensure_pipeline(&mut self, index: usize, formats: &StorageFormats) -> CompositorResult<()> {
        let kernel = &mut self.kernels[index];
        if kernel.pipelines.contains_key(formats) {
            return Ok(());
        }
        let pipeline = build_pipeline(&self.device, &kernel.source, formats)?;
        kernel.pipelines.insert(formats.clone(), pipeline);
        Ok(())
    }
}

impl GpuDevice for WgpuDevice {
    fn create_texture(&mut self, size: Int2, format: TextureFormat) -> CompositorResult<TextureId> {
        if size.is_empty() {
            return Err(CompositorError::gpu(format!(
                "cannot create an empty {}x{} texture",
                size.x, size.y
            )));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("compositor_texture"),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: storage_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureId(self.next_texture);
        self.next_texture = self.next_texture.saturating_add(1);
        self.textures.insert(
            id,
            DeviceTexture {
                texture,
                view,
                size,
                format,
            },
        );
        self.stats.textures_created = self.stats.textures_created.saturating_add(1);
        Ok(id)
    }

    fn free_texture(&mut self, texture: TextureId) {
        if let Some(freed) = self.textures.remove(&texture) {
            freed.texture.destroy();
            self.stats.textures_freed = self.stats.textures_freed.saturating_add(1);
        }
    }

    fn texture_size(&self, texture: TextureId) -> Option<Int2> {
        self.textures.get(&texture).map(|t| t.size)
    }

    fn texture_format(&self, texture: TextureId) -> Option<TextureFormat> {
        self.textures.get(&texture).map(|t| t.format)
    }

    fn clear_texture(&mut self, texture: TextureId, value: Float4) -> CompositorResult<()> {
        let target = self.texture(texture)?;
        let texels = vec![value; target.size.area()];
        self.upload(&target.texture, target.size, target.format, &texels);
        Ok(())
    }

    fn copy_texture(&mut self, dst: TextureId, src: TextureId) -> CompositorResult<()> {
        let source = self.texture(src)?;
        let target = self.texture(dst)?;
        if source.size != target.size {
            return Err(CompositorError::gpu("copy between textures of different sizes"));
        }
        if storage_format(source.format) != storage_format(target.format) {
            return Err(CompositorError::gpu(format!(
                "copy from {:?} into {:?}",
                source.format, target.format
            )));
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compositor_copy"),
            });
        encoder.copy_texture_to_texture(
            source.texture.as_image_copy(),
            target.texture.as_image_copy(),
            extent(source.size),
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn write_texture(&mut self, texture: TextureId, data: &[Float4]) -> CompositorResult<()> {
        let target = self.texture(texture)?;
        if data.len() != target.size.area() {
            return Err(CompositorError::gpu(format!(
                "texture upload of {} texels into a texture of {}",
                data.len(),
                target.size.area()
            )));
        }
        self.upload(&target.texture, target.size, target.format, data);
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureId) -> CompositorResult<Vec<Float4>> {
        let source = self.texture(texture)?;
        let (width, height) = (source.size.x.unsigned_abs(), source.size.y.unsigned_abs());
        let row_bytes = width
            .checked_mul(texel_bytes(source.format))
            .ok_or_else(|| CompositorError::gpu("readback row size overflow"))?;
        let padded_row_bytes = align_to(row_bytes, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(padded_row_bytes)
            .checked_mul(u64::from(height))
            .ok_or_else(|| CompositorError::gpu("readback buffer size overflow"))?;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("compositor_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compositor_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            source.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            extent(source.size),
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| CompositorError::gpu(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| CompositorError::gpu("readback channel closed"))?
            .map_err(|e| CompositorError::gpu(format!("readback map failed: {e:?}")))?;

        let mapped = slice.get_mapped_range();
        let texel_size = texel_bytes(source.format) as usize;
        let mut texels = Vec::with_capacity(source.size.area());
        for row in mapped.chunks_exact(padded_row_bytes as usize) {
            texels.extend(
                row[..row_bytes as usize]
                    .chunks_exact(texel_size)
                    .map(|texel| decode_texel(source.format, texel)),
            );
        }
        drop(mapped);
        readback.unmap();
        Ok(texels)
    }

    fn shader(&self, name: &str) -> Option<ShaderId> {
        self.kernel_ids.get(name).copied()
    }

    fn shader_local_size(&self, shader: ShaderId) -> Int2 {
        self.kernels
            .get(shader.0 as usize)
            .map(|k| {
                let [x, y] = k.source.local_size;
                Int2::new(x as i32, y as i32)
            })
            .unwrap_or(Int2::ONE)
    }

    fn dispatch(
        &mut self,
        shader: ShaderId,
        bindings: &ShaderBindings,
        groups: Int2,
    ) -> CompositorResult<()> {
        let index = shader.0 as usize;
        let Some(kernel) = self.kernels.get(index) else {
            return Err(CompositorError::gpu(format!("unknown shader {}", shader.0)));
        };
        let source = kernel.source.clone();
        bindings.check_aliasing()?;

        let mut images: SmallVec<[TextureId; 2]> = SmallVec::new();
        let mut formats = StorageFormats::new();
        for name in source.images {
            let binding = bindings.image(name).ok_or_else(|| {
                CompositorError::gpu(format!("{} dispatched without image {name}", source.name))
            })?;
            formats.push(storage_format(self.texture(binding.texture)?.format));
            images.push(binding.texture);
        }

        self.stats.dispatches = self.stats.dispatches.saturating_add(1);
        if groups.x <= 0 || groups.y <= 0 {
            return Ok(());
        }
        self.ensure_pipeline(index, &formats)?;

        let mut views: Vec<wgpu::TextureView> = Vec::new();
        let mut sampler_states: Vec<[u32; 4]> = Vec::new();
        for name in source.textures {
            let (view, sampler, constant) = match bindings.texture(name) {
                Some(binding) => match binding.source {
                    TextureSource::Texture(id) => {
                        (self.texture(id)?.view.clone(), binding.sampler, false)
                    }
                    TextureSource::Constant(value) => {
                        (self.constant_view(value), binding.sampler, true)
                    }
                },
                None => {
                    tracing::debug!(kernel = source.name, texture = *name, "unbound texture reads zero");
                    (self.constant_view(Float4::ZERO), SamplerState::nearest(), true)
                }
            };
            views.push(view);
            sampler_states.push(sampler_state_code(sampler, constant));
        }
        for id in &images {
            views.push(self.texture(*id)?.view.clone());
        }
        if sampler_states.is_empty() {
            sampler_states.push([0; 4]);
        }

        let params = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("compositor_params"),
                contents: &uniform_bytes(&source, bindings),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let sampler_bytes: Vec<u8> = sampler_states
            .iter()
            .flatten()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let sampler_info = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("compositor_sampler_info"),
                contents: &sampler_bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: sampler_info.as_entire_binding(),
            },
        ];
        for (i, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let pipeline = self.kernels[index]
            .pipelines
            .get(&formats)
            .ok_or_else(|| CompositorError::gpu(format!("no pipeline for {}", source.name)))?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(source.name),
            layout: &pipeline.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("compositor_dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(source.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.x.unsigned_abs(), groups.y.unsigned_abs(), 1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Submissions execute in order and `wgpu` tracks hazards between them, so barriers are
    /// only counted.
    fn memory_barrier(&mut self, _barrier: Barrier) {
        self.stats.barriers = self.stats.barriers.saturating_add(1);
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            live_textures: self.textures.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/gpu/hardware.rs"]
mod tests;
