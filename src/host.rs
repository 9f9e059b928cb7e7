//! Scene and viewport queries the compositor makes of its embedding application.

use crate::foundation::core::{Float4, Int2, IntRect};
use crate::foundation::error::CompositorResult;
use crate::foundation::math::REC709_LUMINANCE;
use crate::gpu::{GpuDevice, TextureFormat, TextureId};
use std::collections::HashMap;

/// Everything the compositor asks of the application that embeds it.
pub trait CompositorHost {
    /// Name of the evaluated scene.
    fn scene_name(&self) -> &str;

    /// Current frame.
    fn frame_number(&self) -> i32;

    /// Resolution the scene renders at.
    fn render_size(&self) -> Int2;

    /// Area of the output texture the compositor writes to.
    fn compositing_region(&self) -> IntRect;

    /// Persistent texture receiving the composited image.
    fn output_texture(&self) -> TextureId;

    /// Texture of a render pass of a view layer, if it was rendered.
    fn input_texture(&self, view_layer: &str, pass_name: &str) -> Option<TextureId>;

    /// Name of the active view.
    fn view_name(&self) -> &str;

    /// RGB weights of luminance in the working color space.
    fn luminance_coefficients(&self) -> [f32; 3];

    /// Show a message in the application UI.
    fn set_info_message(&mut self, message: &str);
}

/// A [`CompositorHost`] for an interactive viewport.
///
/// The compositing region covers the whole viewport, or only the camera frame when one is
/// set and the passepartout around it is fully opaque.
#[derive(Debug)]
pub struct ViewportHost {
    scene_name: String,
    view_name: String,
    frame_number: i32,
    viewport_size: Int2,
    render_size: Int2,
    camera_region: Option<IntRect>,
    passepartout_alpha: f32,
    output_texture: TextureId,
    inputs: HashMap<(String, String), TextureId>,
    luminance_coefficients: [f32; 3],
    info_message: Option<String>,
}

impl ViewportHost {
    /// Allocate the output texture for a viewport of `viewport_size`.
    pub fn new(gpu: &mut dyn GpuDevice, viewport_size: Int2) -> CompositorResult<Self> {
        let output_texture = gpu.create_texture(viewport_size, TextureFormat::Rgba16F)?;
        Ok(Self {
            scene_name: "Scene".to_owned(),
            view_name: String::new(),
            frame_number: 1,
            viewport_size,
            render_size: viewport_size,
            camera_region: None,
            passepartout_alpha: 0.0,
            output_texture,
            inputs: HashMap::new(),
            luminance_coefficients: REC709_LUMINANCE,
            info_message: None,
        })
    }

    /// Set the camera frame within the viewport and the opacity of the passepartout.
    pub fn set_camera_region(&mut self, region: IntRect, passepartout_alpha: f32) {
        self.camera_region = Some(region);
        self.passepartout_alpha = passepartout_alpha;
    }

    /// Leave camera view.
    pub fn clear_camera_region(&mut self) {
        self.camera_region = None;
    }

    /// Set the current frame.
    pub fn set_frame_number(&mut self, frame: i32) {
        self.frame_number = frame;
    }

    /// Set the render resolution.
    pub fn set_render_size(&mut self, size: Int2) {
        self.render_size = size;
    }

    /// Register a rendered pass.
    pub fn add_input_pass(&mut self, view_layer: &str, pass_name: &str, texture: TextureId) {
        self.inputs
            .insert((view_layer.to_owned(), pass_name.to_owned()), texture);
    }

    /// Upload `texels` as a new RGBA pass of `size` and register it.
    pub fn upload_input_pass(
        &mut self,
        gpu: &mut dyn GpuDevice,
        view_layer: &str,
        pass_name: &str,
        size: Int2,
        texels: &[Float4],
    ) -> CompositorResult<TextureId> {
        let texture = gpu.create_texture(size, TextureFormat::Rgba32F)?;
        if let Err(e) = gpu.write_texture(texture, texels) {
            gpu.free_texture(texture);
            return Err(e);
        }
        self.add_input_pass(view_layer, pass_name, texture);
        Ok(texture)
    }

    /// Override the luminance coefficients.
    pub fn set_luminance_coefficients(&mut self, coefficients: [f32; 3]) {
        self.luminance_coefficients = coefficients;
    }

    /// Last message set by the compositor.
    pub fn info_message(&self) -> Option<&str> {
        self.info_message.as_deref()
    }
}

impl CompositorHost for ViewportHost {
    fn scene_name(&self) -> &str {
        &self.scene_name
    }

    fn frame_number(&self) -> i32 {
        self.frame_number
    }

    fn render_size(&self) -> Int2 {
        self.render_size
    }

    fn compositing_region(&self) -> IntRect {
        let full = IntRect::from_size(self.viewport_size);
        match self.camera_region {
            Some(camera) if self.passepartout_alpha >= 1.0 => camera.intersect(full),
            _ => full,
        }
    }

    fn output_texture(&self) -> TextureId {
        self.output_texture
    }

    fn input_texture(&self, view_layer: &str, pass_name: &str) -> Option<TextureId> {
        self.inputs
            .get(&(view_layer.to_owned(), pass_name.to_owned()))
            .copied()
    }

    fn view_name(&self) -> &str {
        &self.view_name
    }

    fn luminance_coefficients(&self) -> [f32; 3] {
        self.luminance_coefficients
    }

    fn set_info_message(&mut self, message: &str) {
        self.info_message = Some(message.to_owned());
    }
}
