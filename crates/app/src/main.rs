//! vulkanisch - demo host
//!
//! Opens a window and drives one registered renderer through the frame
//! orchestrator until the window closes or Escape is pressed.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use vulkanisch_core::Timer;
use vulkanisch_demos::hello_cube;
use vulkanisch_platform::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, InputState, KeyCode, MouseButton, Window, window_title,
};
use vulkanisch_renderer::{FrameConfig, FrameOrchestrator, Registry, VulkanBackend};
use vulkanisch_scene::{Camera, FlyController, Movement};

#[derive(Parser, Debug)]
#[command(name = "vulkanisch", version, about = "Run one of the Vulkan demos")]
struct Cli {
    /// Renderer to run
    #[arg(default_value = hello_cube::NAME)]
    renderer: String,
}

struct App {
    // Dropped before the window its surface was created from.
    orchestrator: Option<FrameOrchestrator<VulkanBackend>>,
    window: Option<Window>,
    registry: Registry<VulkanBackend>,
    renderer_name: String,
    input: InputState,
    controller: FlyController,
    camera: Camera,
    timer: Timer,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(registry: Registry<VulkanBackend>, renderer_name: String) -> Self {
        Self {
            orchestrator: None,
            window: None,
            registry,
            renderer_name,
            input: InputState::new(),
            controller: FlyController::default(),
            camera: Camera::default(),
            timer: Timer::new(),
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            &window_title(&self.renderer_name),
        )?;
        let backend = VulkanBackend::new(&window).context("failed to initialize Vulkan")?;
        info!("Using GPU '{}'", backend.gpu_name());
        let renderer = self.registry.create(&self.renderer_name)?;
        let mut orchestrator =
            FrameOrchestrator::new(backend, renderer, FrameConfig::default(), window.extent())?;
        orchestrator.set_camera(&self.camera);

        window.request_redraw();
        self.orchestrator = Some(orchestrator);
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let delta = self.timer.tick().as_secs_f32();
        let Some(orchestrator) = self.orchestrator.as_mut() else {
            return Ok(());
        };

        let movement = Movement {
            forward: self.input.is_key_pressed(KeyCode::KeyW),
            back: self.input.is_key_pressed(KeyCode::KeyS),
            left: self.input.is_key_pressed(KeyCode::KeyA),
            right: self.input.is_key_pressed(KeyCode::KeyD),
        };
        let drag = self.input.drag(MouseButton::Left);
        if self.controller.update(&mut self.camera, drag, movement, delta) {
            orchestrator.set_camera(&self.camera);
        }
        self.input.begin_frame();

        let outcome = orchestrator.render_frame()?;
        debug!("Frame {}: {:?}", self.timer.frame_count(), outcome);

        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.failure = Some(err);
        event_loop.exit();
    }

    /// Stop the frame loop and report the average frame rate.
    fn finish(&mut self) -> Result<()> {
        if let Some(mut orchestrator) = self.orchestrator.take() {
            info!(
                "Average FPS: {:.1} over {} presented frames",
                orchestrator.average_fps(),
                orchestrator.presented_frames()
            );
            orchestrator.shutdown()?;
        }
        self.window = None;
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let (Some(orchestrator), Some(window)) =
                    (self.orchestrator.as_ref(), self.window.as_ref())
                {
                    orchestrator.notify_resize(window.extent());
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        if key == KeyCode::Escape {
                            event_loop.exit();
                        }
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.input.on_mouse_pressed(button.into()),
                ElementState::Released => self.input.on_mouse_released(button.into()),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            _ => {}
        }
    }
}

fn run(registry: Registry<VulkanBackend>, renderer: String) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(registry, renderer);
    let result = event_loop.run_app(&mut app);
    let finished = app.finish();
    if let Some(err) = app.failure.take() {
        return Err(err);
    }
    result?;
    finished
}

fn main() -> ExitCode {
    vulkanisch_core::init_logging();
    let cli = Cli::parse();

    let registry = vulkanisch_demos::registry();
    if !registry.contains(&cli.renderer) {
        eprintln!("Renderer not found: '{}'", cli.renderer);
        eprintln!("Available renderers:");
        for name in registry.names() {
            eprintln!("  {name}");
        }
        return ExitCode::FAILURE;
    }

    info!("Starting renderer '{}'", cli.renderer);
    match run(registry, cli.renderer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}
