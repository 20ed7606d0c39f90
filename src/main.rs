use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tbm_config::AppConfig;
use tbm_imu::cell::OrientationCell;
use tbm_imu::Acquisition;
use tbm_renderer::frame::{FrameInputs, FramePacer, LoopState};
use tbm_renderer::SceneRenderer;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Application state.
struct App {
    config: AppConfig,
    orientation: OrientationCell,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    state: LoopState,
    pacer: FramePacer,
    /// Set when window or GPU setup fails; returned from `main` after the loop exits.
    startup_error: Option<anyhow::Error>,
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: SceneRenderer,
}

impl App {
    fn new(config: AppConfig, orientation: OrientationCell) -> Self {
        let pacer = FramePacer::new(config.window.target_fps, Instant::now());
        Self {
            config,
            orientation,
            window: None,
            gpu: None,
            state: LoopState::Running,
            pacer,
            startup_error: None,
        }
    }

    fn quit(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.request_quit() {
            info!("Quit requested");
        }
        event_loop.exit();
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(gpu) = &mut self.gpu {
            gpu.surface_config.width = size.width;
            gpu.surface_config.height = size.height;
            gpu.surface.configure(&gpu.device, &gpu.surface_config);
            gpu.renderer
                .resize(&gpu.device, &gpu.queue, size.width, size.height);
        }
    }

    fn redraw(&mut self) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        if gpu.surface_config.width == 0 || gpu.surface_config.height == 0 {
            return;
        }

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.surface_config);
                return;
            }
            Err(e) => {
                warn!(?e, "Failed to get surface texture");
                return;
            }
        };

        // One snapshot per frame: the model matrix and the HUD agree.
        let frame = FrameInputs::prepare(self.orientation.snapshot(), gpu.renderer.camera());
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        gpu.renderer.render(&gpu.device, &gpu.queue, &view, &frame);
        output.present();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let result = event_loop
            .create_window(attrs)
            .context("Failed to create window")
            .and_then(|window| {
                let window = Arc::new(window);
                let gpu = init_gpu(window.clone(), &self.config)?;
                Ok((window, gpu))
            });

        match result {
            Ok((window, gpu)) => {
                self.window = Some(window);
                self.gpu = Some(gpu);
                self.pacer = FramePacer::new(self.config.window.target_fps, Instant::now());
                info!(
                    width = self.config.window.width,
                    height = self.config.window.height,
                    fps = self.config.window.target_fps,
                    "Visualizer initialized"
                );
            }
            Err(e) => {
                error!(?e, "Startup failed");
                self.startup_error = Some(e);
                self.state.request_quit();
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.quit(event_loop),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    self.quit(event_loop);
                }
            }

            WindowEvent::Resized(size) => self.resize(size),

            WindowEvent::RedrawRequested => {
                if !self.state.is_running() {
                    return;
                }
                self.redraw();
                self.pacer.frame_presented(Instant::now());
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.state.is_running() {
            return;
        }
        let Some(window) = &self.window else {
            return;
        };
        if self.pacer.is_due(Instant::now()) {
            window.request_redraw();
            event_loop.set_control_flow(ControlFlow::Wait);
        } else {
            event_loop.set_control_flow(ControlFlow::WaitUntil(self.pacer.deadline()));
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // GPU resources go before the window they render into.
        self.gpu = None;
        self.window = None;
    }
}

fn init_gpu(window: Arc<Window>, config: &AppConfig) -> Result<GpuState> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let surface = instance
        .create_surface(window.clone())
        .context("Failed to create surface")?;

    let (device, queue, adapter) = pollster::block_on(async {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter found")?;

        info!(name = adapter.get_info().name, "Using GPU");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tbm_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("Failed to create device")?;

        anyhow::Ok((device, queue, adapter))
    })?;

    let size = window.inner_size();
    let surface_caps = surface.get_capabilities(&adapter);
    let format = surface_caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| surface_caps.formats.first())
        .copied()
        .context("Surface reports no supported formats")?;

    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode: wgpu::CompositeAlphaMode::Auto,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    let renderer = SceneRenderer::new(
        &device,
        &queue,
        format,
        surface_config.width,
        surface_config.height,
        config,
    )?;

    Ok(GpuState {
        device,
        queue,
        surface,
        surface_config,
        renderer,
    })
}

fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tbm_app=info,tbm_imu=info,tbm_renderer=info".into()),
        )
        .init();

    info!("TBM orientation visualizer starting");

    // Load config.
    let config = tbm_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    info!(source = ?config.sensor.source, "Config loaded");

    // The acquisition task lives on its own runtime so shutdown can be
    // bounded even when a sensor read is stuck in a blocking call.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("tbm-acquisition")
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let acquisition = {
        let _guard = runtime.enter();
        Acquisition::start(&config.sensor)
    };
    let grace = Duration::from_millis(config.sensor.stop_grace_ms);

    // Run the application.
    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, acquisition.cell());
    let run_result = event_loop.run_app(&mut app);

    runtime.block_on(acquisition.stop(grace));
    runtime.shutdown_timeout(grace);

    run_result?;
    if let Some(e) = app.startup_error.take() {
        return Err(e);
    }

    info!("Visualizer exited");
    Ok(())
}
