use super::*;
use crate::gpu::{ImageBinding, TextureBinding};

struct FillId;

impl ComputeKernel for FillId {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let id = inv.global_id();
        inv.image_store(
            "output_img",
            id,
            Float4::new(id.x as f32, id.y as f32, 0.0, 1.0),
        );
    }
}

struct CopySampled;

impl ComputeKernel for CopySampled {
    fn invoke(&self, inv: &mut Invocation<'_>) {
        let id = inv.global_id();
        let v = inv.texture_load("input_tx", id);
        inv.image_store("output_img", id, v);
    }
}

fn device(parallel: bool) -> SoftwareDevice {
    SoftwareDevice::without_kernels(SoftwareDeviceOpts {
        parallel,
        threads: None,
    })
    .unwrap()
}

fn image_bindings(output: TextureId) -> ShaderBindings {
    let mut b = ShaderBindings::default();
    b.set_image(ImageBinding {
        name: "output_img",
        texture: output,
    });
    b
}

#[test]
fn dispatch_covers_groups_and_drops_out_of_bounds_stores() {
    for parallel in [false, true] {
        let mut dev = device(parallel);
        let shader = dev.register_kernel("fill", FillId);
        let tex = dev.create_texture(Int2::new(20, 5), TextureFormat::Rgba32F).unwrap();

        dev.dispatch(shader, &image_bindings(tex), Int2::new(2, 1))
            .unwrap();
        dev.memory_barrier(Barrier::All);

        let texels = dev.read_texture(tex).unwrap();
        assert_eq!(texels.len(), 100);
        assert_eq!(texels[20 * 4 + 19], Float4::new(19.0, 4.0, 0.0, 1.0));
        assert_eq!(dev.stats().hazards, 0);
    }
}

#[test]
fn single_channel_formats_read_back_padded() {
    let mut dev = device(false);
    let tex = dev.create_texture(Int2::new(1, 1), TextureFormat::R32F).unwrap();
    dev.write_texture(tex, &[Float4::new(0.5, 0.7, 0.9, 0.2)])
        .unwrap();
    assert_eq!(
        dev.read_texture(tex).unwrap()[0],
        Float4::new(0.5, 0.0, 0.0, 1.0)
    );
}

#[test]
fn bilinear_sampling_blends_neighbours_and_respects_extend() {
    let mut store = TextureStore::new(Int2::new(2, 1), TextureFormat::Rgba32F);
    store.store(Int2::new(0, 0), Float4::splat(0.0));
    store.store(Int2::new(1, 0), Float4::splat(1.0));

    let edge = SamplerState::bilinear();
    let mid = store.sample([0.5, 0.5], edge);
    assert!((mid[0] - 0.5).abs() < 1e-6);

    let center_of_first = store.sample([0.25, 0.5], edge);
    assert_eq!(center_of_first[0], 0.0);

    let border = SamplerState::bilinear().with_extend(Extend::ClampToBorder, Extend::ClampToBorder);
    let left_of_image = store.sample([0.0, 0.5], border);
    assert_eq!(left_of_image[0], 0.0);
    let right_edge = store.sample([1.0, 0.5], border);
    assert!((right_edge[0] - 0.5).abs() < 1e-6);

    let repeat = SamplerState::nearest().with_extend(Extend::Repeat, Extend::Repeat);
    assert_eq!(store.sample([1.25, 0.5], repeat)[0], 0.0);
    assert_eq!(store.sample([-0.25, 0.5], repeat)[0], 1.0);
}

#[test]
fn reading_an_image_store_without_a_barrier_is_a_hazard() {
    let mut dev = device(true);
    let fill = dev.register_kernel("fill", FillId);
    let copy = dev.register_kernel("copy", CopySampled);
    let a = dev.create_texture(Int2::new(4, 4), TextureFormat::Rgba32F).unwrap();
    let b = dev.create_texture(Int2::new(4, 4), TextureFormat::Rgba32F).unwrap();

    dev.dispatch(fill, &image_bindings(a), Int2::ONE).unwrap();

    let mut bindings = image_bindings(b);
    bindings.set_texture(TextureBinding {
        name: "input_tx",
        source: TextureSource::Texture(a),
        sampler: SamplerState::nearest(),
    });
    dev.dispatch(copy, &bindings, Int2::ONE).unwrap();
    assert_eq!(dev.stats().hazards, 1);

    dev.memory_barrier(Barrier::TextureFetch);
    dev.dispatch(copy, &bindings, Int2::ONE).unwrap();
    assert_eq!(dev.stats().hazards, 1);

    dev.memory_barrier(Barrier::TextureFetch);
    let _ = dev.read_texture(b).unwrap();
    assert_eq!(dev.stats().hazards, 2, "fetch barrier does not cover readback");
}

#[test]
fn aliasing_image_and_texture_is_rejected() {
    let mut dev = device(false);
    let copy = dev.register_kernel("copy", CopySampled);
    let a = dev.create_texture(Int2::new(2, 2), TextureFormat::Rgba32F).unwrap();

    let mut bindings = image_bindings(a);
    bindings.set_texture(TextureBinding {
        name: "input_tx",
        source: TextureSource::Texture(a),
        sampler: SamplerState::nearest(),
    });
    assert!(dev.dispatch(copy, &bindings, Int2::ONE).is_err());
    assert!(dev.texture_size(a).is_some(), "texture survives a rejected dispatch");
}

#[test]
fn constant_bindings_broadcast() {
    let mut dev = device(false);
    let copy = dev.register_kernel("copy", CopySampled);
    let out = dev.create_texture(Int2::new(3, 3), TextureFormat::Rgba32F).unwrap();

    let mut bindings = image_bindings(out);
    bindings.set_texture(TextureBinding {
        name: "input_tx",
        source: TextureSource::Constant(Float4::rgb(1.0, 0.0, 0.0)),
        sampler: SamplerState::nearest(),
    });
    dev.dispatch(copy, &bindings, Int2::ONE).unwrap();
    dev.memory_barrier(Barrier::All);
    assert!(
        dev.read_texture(out)
            .unwrap()
            .iter()
            .all(|&v| v == Float4::rgb(1.0, 0.0, 0.0))
    );
}

#[test]
fn empty_textures_are_rejected_and_frees_are_counted() {
    let mut dev = device(false);
    assert!(dev.create_texture(Int2::new(0, 4), TextureFormat::R16F).is_err());
    let t = dev.create_texture(Int2::new(1, 1), TextureFormat::R16F).unwrap();
    dev.free_texture(t);
    dev.free_texture(t);
    let stats = dev.stats();
    assert_eq!(stats.live_textures, 0);
    assert_eq!(stats.textures_freed, 1);
}
