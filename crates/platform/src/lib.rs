//! Platform layer: windowing, input & the frame loop.
//!
//! - Window + GPU state are created on the first `resumed`.
//! - Arrow keys are tracked as held state and applied once per frame.
//! - Escape or closing the window ends the loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use asset::scene::{DEFAULT_ASSET_ROOT, LINKS_HOUSE};
use corelib::camera::{CameraControls, WalkCamera};
use renderer::GpuState;

/// Startup options for the viewer.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
    pub asset_root: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            width: 1400,
            height: 900,
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
        }
    }
}

/// Open the window, load the scene and run until closed.
/// Fails if the window, surface, adapter or device cannot be created.
pub fn run_viewer(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|e| anyhow!("Failed to create event loop: {e}"))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(config);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match app.init_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Everything the frame step needs, owned in one place.
struct ViewerApp {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    camera: WalkCamera,
    controls: CameraControls,
    init_error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(config: ViewerConfig) -> Self {
        let aspect = config.width as f32 / config.height.max(1) as f32;
        Self {
            config,
            window: None,
            gpu: None,
            camera: WalkCamera::links_house(aspect),
            controls: CameraControls::default(),
            init_error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("Links House")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| anyhow!("Failed to create window: {e}"))?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let gpu = pollster::block_on(GpuState::new(
            window.clone(),
            self.config.backends,
            &self.config.asset_root,
            &LINKS_HOUSE,
        ))?;

        self.window = Some(window);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;
        match code {
            KeyCode::Escape if pressed => {
                log::info!("Escape pressed. Exiting event loop.");
                event_loop.exit();
            }
            KeyCode::ArrowUp => self.controls.forward = pressed,
            KeyCode::ArrowDown => self.controls.back = pressed,
            KeyCode::ArrowLeft => self.controls.turn_left = pressed,
            KeyCode::ArrowRight => self.controls.turn_right = pressed,
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        self.camera.update(self.controls);

        match gpu.render(&self.camera) {
            Ok(()) => {}
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated, reconfiguring");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory. Exiting event loop.");
                event_loop.exit();
            }
            Err(e) => log::warn!("Skipping frame: {e:?}"),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            log::error!("Initialization failed: {err:#}");
            self.init_error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::Focused(false) => {
                // Key releases are not delivered while unfocused.
                self.controls = CameraControls::default();
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, event),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}
