//! Windowed Vulkan triangle application.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use triangle_platform::Window;
use triangle_renderer::{Renderer, RendererOptions};

const WINDOW_TITLE: &str = "Vulkan";
const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 600;

const VERTEX_SHADER_PATH: &str = "shaders/triangle.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/triangle.frag.spv";

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, WINDOW_WIDTH, WINDOW_HEIGHT, WINDOW_TITLE)
            .context("Failed to create window")?;

        let vertex_shader = load_shader(VERTEX_SHADER_PATH)?;
        let fragment_shader = load_shader(FRAGMENT_SHADER_PATH)?;

        let options = RendererOptions {
            app_name: c"vkTriangle",
            enable_validation: cfg!(debug_assertions),
            vertex_shader: &vertex_shader,
            fragment_shader: &fragment_shader,
        };
        let renderer =
            Renderer::new(&window, &options).context("Failed to initialize renderer")?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            error!("Initialization failed: {err:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(renderer) = self.renderer.as_mut() {
                    if let Err(err) = renderer.draw_frame() {
                        error!("Frame failed: {err}");
                        event_loop.exit();
                        return;
                    }
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Renderer teardown waits for the device, so dropping here is safe
        // even mid-frame.
        self.renderer = None;
        self.window = None;
    }
}

fn load_shader(path: &str) -> Result<Vec<u8>> {
    std::fs::read(Path::new(path))
        .with_context(|| format!("Failed to read shader binary {path:?} (run glslc first, see shaders/)"))
}

fn main() -> Result<()> {
    triangle_core::init_logging();

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app).context("Event loop failed")?;
    Ok(())
}
