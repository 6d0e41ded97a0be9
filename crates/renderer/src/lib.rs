//! Renderer: wgpu init + depth + textured scene.
//! wgpu = 26.x, winit = 0.30.x

pub mod pipeline;
pub mod scene;
pub mod textured;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use wgpu::{
    Adapter, Backends, CommandEncoderDescriptor, Device, DeviceDescriptor, Extent3d, Features,
    Instance, InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference, PresentMode, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Surface, SurfaceConfiguration,
    SurfaceError, TextureDescriptor, TextureDimension, TextureFormat, TextureFormatFeatureFlags,
    TextureUsages, TextureView, TextureViewDescriptor,
};
use winit::{dpi::PhysicalSize, window::Window};

use asset::scene::SceneEntry;
use corelib::camera::WalkCamera;

use crate::pipeline::{DEPTH_FORMAT, MSAA_SAMPLES, TexturedPipeline};
use crate::scene::Scene;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.2,
    g: 0.2,
    b: 0.3,
    a: 0.0,
};

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Scene
    scene: Scene,

    // Attachments; `msaa_view` is None when drawing single-sampled.
    sample_count: u32,
    msaa_view: Option<TextureView>,
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window> and load the scene from `asset_root`.
    pub async fn new(
        window: Arc<Window>,
        backends: Backends,
        asset_root: &Path,
        manifest: &[SceneEntry],
    ) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("LinksHouse Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("Failed to create device")?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;

        // Configure surface
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sample_count = pick_sample_count(&adapter, surface_format);
        log::info!("MSAA sample count: {sample_count}");
        let msaa_view = create_msaa_view(&device, &surface_config, sample_count);
        let depth_view = create_depth_view(&device, &surface_config, sample_count);

        // Pipeline is compiled once and shared by every asset.
        let pipeline = Arc::new(TexturedPipeline::new(&device, surface_format, sample_count));
        let scene = Scene::load(&device, &queue, &pipeline, asset_root, manifest);

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            scene,
            sample_count,
            msaa_view,
            depth_view,
            width,
            height,
        })
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Resize: reconfigure surface & recreate the MSAA and depth attachments.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.msaa_view = create_msaa_view(&self.device, &self.surface_config, self.sample_count);
        self.depth_view = create_depth_view(&self.device, &self.surface_config, self.sample_count);
    }

    /// Render one frame: clear + draw the scene from `camera`.
    pub fn render(&mut self, camera: &WalkCamera) -> Result<(), SurfaceError> {
        let mvp = camera.with_aspect(self.aspect()).proj_view();

        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        // Draw into the multisampled target and resolve into the frame.
        let (target, resolve_target) = match self.msaa_view.as_ref() {
            Some(msaa) => (msaa, Some(&view)),
            None => (&view, None),
        };

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target,
                    ops: Operations {
                        load: LoadOp::Clear(CLEAR_COLOR),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.scene.draw(&self.queue, &mut rpass, mvp);
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

fn pick_sample_count(adapter: &Adapter, color_format: TextureFormat) -> u32 {
    let color = adapter.get_texture_format_features(color_format).flags;
    let depth = adapter.get_texture_format_features(DEPTH_FORMAT).flags;
    let count = sample_count_for(color, depth);
    if count == 1 {
        log::warn!("{MSAA_SAMPLES}x MSAA unsupported for {color_format:?}; drawing single-sampled");
    }
    count
}

/// 4x when the color format can be multisampled and resolved and the depth
/// format can be multisampled, else 1.
fn sample_count_for(color: TextureFormatFeatureFlags, depth: TextureFormatFeatureFlags) -> u32 {
    let supported = color.sample_count_supported(MSAA_SAMPLES)
        && color.contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
        && depth.sample_count_supported(MSAA_SAMPLES);
    if supported { MSAA_SAMPLES } else { 1 }
}

/// Multisampled color target resolved into the swapchain image.
fn create_msaa_view(
    device: &Device,
    sc: &SurfaceConfiguration,
    sample_count: u32,
) -> Option<TextureView> {
    if sample_count <= 1 {
        return None;
    }
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("MsaaColorTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: sc.format,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(tex.create_view(&TextureViewDescriptor::default()))
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration, sample_count: u32) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSAA_4X: TextureFormatFeatureFlags = TextureFormatFeatureFlags::MULTISAMPLE_X4;

    #[test]
    fn msaa_needs_resolvable_color_and_depth() {
        let color = MSAA_4X | TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE;
        assert_eq!(sample_count_for(color, MSAA_4X), 4);
    }

    #[test]
    fn msaa_falls_back_to_single_sample() {
        let none = TextureFormatFeatureFlags::empty();
        // No resolve support on the color format.
        assert_eq!(sample_count_for(MSAA_4X, MSAA_4X), 1);
        // Depth cannot be multisampled.
        let color = MSAA_4X | TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE;
        assert_eq!(sample_count_for(color, none), 1);
        assert_eq!(sample_count_for(none, none), 1);
    }
}
