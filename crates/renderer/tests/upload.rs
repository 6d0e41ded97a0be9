//! Headless upload and draw checks. Skipped when the machine has no usable adapter.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use asset::bmp::PixelBuffer;
use asset::ply::parse_ply_str;
use asset::scene::{DrawPass, LINKS_HOUSE};
use glam::Mat4;
use renderer::pipeline::{DEPTH_FORMAT, TexturedPipeline};
use renderer::scene::Scene;
use renderer::textured::TexturedAsset;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;
// 64 * 4 bytes keeps rows at the 256-byte copy alignment.
const TARGET_SIZE: u32 = 64;
const BLUE: [u8; 4] = [0xFF, 0x00, 0x00, 0xFF];

fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Test Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_webgl2_defaults()
            .using_resolution(adapter.limits()),
        memory_hints: Default::default(),
        trace: Default::default(),
    }))
    .ok()
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(bytes).unwrap();
}

fn bmp_2x2(pixel: [u8; 4]) -> Vec<u8> {
    let mut h = vec![0u8; 54];
    h[0] = b'B';
    h[1] = b'M';
    h[0x0A..0x0E].copy_from_slice(&54u32.to_le_bytes());
    h[0x0E..0x12].copy_from_slice(&40u32.to_le_bytes());
    h[0x12..0x16].copy_from_slice(&2u32.to_le_bytes());
    h[0x16..0x1A].copy_from_slice(&2u32.to_le_bytes());
    h[0x1C..0x1E].copy_from_slice(&32u16.to_le_bytes());
    for _ in 0..4 {
        h.extend(pixel);
    }
    h
}

/// Clear a 64x64 target, let `record` draw into it, and read the pixels back
/// as tightly packed BGRA rows.
fn render_offscreen(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    record: impl FnOnce(&mut wgpu::RenderPass<'_>),
) -> Vec<u8> {
    let extent = wgpu::Extent3d {
        width: TARGET_SIZE,
        height: TARGET_SIZE,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("TestColor"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("TestDepth"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let color_view = color.create_view(&Default::default());
    let depth_view = depth.create_view(&Default::default());

    let bytes_per_row = TARGET_SIZE * 4;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("TestReadback"),
        size: (bytes_per_row * TARGET_SIZE) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("TestEncoder"),
    });
    {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("TestPass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        record(&mut rpass);
    }
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &color,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(TARGET_SIZE),
            },
        },
        extent,
    );
    queue.submit(Some(encoder.finish()));

    let slice = readback.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| result.unwrap());
    device.poll(wgpu::PollType::Wait).unwrap();
    let pixels = slice.get_mapped_range().to_vec();
    readback.unmap();
    pixels
}

fn pixel_at(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let at = ((y * TARGET_SIZE + x) * 4) as usize;
    [pixels[at], pixels[at + 1], pixels[at + 2], pixels[at + 3]]
}

const QUAD: &str = "\
ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
property float u
property float v
element face 2
property list uchar uint vertex_indices
end_header
0 0 0 0 0
1 0 0 1 0
1 1 0 1 1
0 1 0 0 1
3 0 1 2
3 0 2 3
";

#[test]
fn uploads_mesh_and_texture() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "Quad.ply", QUAD.as_bytes());
    write_file(dir.path(), "quad.bmp", &bmp_2x2([0x80; 4]));

    let pipeline = Arc::new(TexturedPipeline::new(&device, TARGET_FORMAT, 1));
    let asset = TexturedAsset::load(
        &device,
        &queue,
        pipeline,
        &dir.path().join("Quad.ply"),
        &dir.path().join("quad.bmp"),
    );
    assert_eq!(asset.index_count(), 6);
    assert_eq!(asset.label(), "Quad");
}

#[test]
fn missing_files_build_an_empty_asset() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Arc::new(TexturedPipeline::new(&device, TARGET_FORMAT, 1));
    let asset = TexturedAsset::load(
        &device,
        &queue,
        pipeline,
        &dir.path().join("Floor.ply"),
        &dir.path().join("floor.bmp"),
    );
    assert_eq!(asset.index_count(), 0);
}

#[test]
fn quad_draws_in_both_passes() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "Quad.ply", QUAD.as_bytes());
    write_file(dir.path(), "quad.bmp", &bmp_2x2(BLUE));

    let pipeline = Arc::new(TexturedPipeline::new(&device, TARGET_FORMAT, 1));
    let asset = TexturedAsset::load(
        &device,
        &queue,
        pipeline,
        &dir.path().join("Quad.ply"),
        &dir.path().join("quad.bmp"),
    );

    for pass in [DrawPass::Opaque, DrawPass::Blended] {
        let pixels = render_offscreen(&device, &queue, |rpass| {
            asset.draw(&queue, rpass, Mat4::IDENTITY, pass);
        });
        // The unit quad covers the top-right quarter of clip space.
        assert_eq!(pixel_at(&pixels, 48, 16), BLUE, "{pass:?}");
        assert_eq!(pixel_at(&pixels, 16, 48), [0; 4], "{pass:?}");
    }
}

#[test]
fn missing_files_draw_nothing() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Arc::new(TexturedPipeline::new(&device, TARGET_FORMAT, 1));
    let asset = TexturedAsset::load(
        &device,
        &queue,
        pipeline,
        &dir.path().join("Walls.ply"),
        &dir.path().join("walls.bmp"),
    );

    let pixels = render_offscreen(&device, &queue, |rpass| {
        asset.draw(&queue, rpass, Mat4::IDENTITY, DrawPass::Opaque);
    });
    assert!(pixels.iter().all(|&b| b == 0));
}

#[test]
fn faces_without_vertices_draw_nothing() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let mesh = parse_ply_str("ply\nelement vertex 0\nelement face 1\nend_header\n3 0 1 2\n").unwrap();
    assert_eq!((mesh.vertex_count(), mesh.triangle_count()), (0, 1));

    let pipeline = Arc::new(TexturedPipeline::new(&device, TARGET_FORMAT, 1));
    let asset = TexturedAsset::from_parts(
        &device,
        &queue,
        pipeline,
        "Faceless",
        &mesh,
        PixelBuffer::placeholder(),
    );
    assert_eq!(asset.index_count(), 0);

    let pixels = render_offscreen(&device, &queue, |rpass| {
        asset.draw(&queue, rpass, Mat4::IDENTITY, DrawPass::Blended);
    });
    assert!(pixels.iter().all(|&b| b == 0));
}

#[test]
fn scene_with_no_files_draws_nothing() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no adapter, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();

    let pipeline = Arc::new(TexturedPipeline::new(&device, TARGET_FORMAT, 1));
    let scene = Scene::load(&device, &queue, &pipeline, dir.path(), &LINKS_HOUSE);

    let pixels = render_offscreen(&device, &queue, |rpass| {
        scene.draw(&queue, rpass, Mat4::IDENTITY);
    });
    assert!(pixels.iter().all(|&b| b == 0));
}
