//! Deferred viewer: loads the configured glTF models into a light-filled
//! room and renders them through the deferred shading path.
//!
//! Usage: `deferred-viewer [config.toml]`. Without an argument
//! `deferred-viewer.toml` in the working directory is used when present.

mod controls;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use renderer_core::{Config, Timer};
use renderer_platform::{InputState, MouseButton, Window};
use renderer_renderer::{Renderer, RendererConfig};
use renderer_resources::Model;
use renderer_scene::{Camera, FpsController, SceneObject};

use crate::controls::Action;

const DEFAULT_CONFIG_PATH: &str = "deferred-viewer.toml";

struct Viewer {
    config: Config,
    window: Option<Window>,
    renderer: Option<Renderer>,
    scene: Vec<SceneObject>,
    camera: Camera,
    controller: FpsController,
    input: InputState,
    timer: Timer,
    clock: Timer,
}

impl Viewer {
    fn new(config: Config) -> Self {
        let controller = FpsController::default()
            .with_speeds(config.camera.move_speed, config.camera.turn_speed);
        let aspect = config.window.width as f32 / config.window.height as f32;
        let camera = Camera::perspective(
            controller.position,
            config.camera.fov_degrees.to_radians(),
            aspect,
            config.camera.near,
            config.camera.far,
        );
        Self {
            config,
            window: None,
            renderer: None,
            scene: Vec::new(),
            camera,
            controller,
            input: InputState::new(),
            timer: Timer::new(),
            clock: Timer::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_config = &self.config.window;
        let window = Window::new(
            event_loop,
            window_config.width,
            window_config.height,
            &window_config.title,
        )?;
        let mut renderer = Renderer::new(
            &window,
            self.config.debug.validation,
            &RendererConfig::from_config(&self.config),
        )
        .context("failed to create renderer")?;

        let world_scale = self.config.lights.world_scale;
        for path in &self.config.scene.models {
            let model = match Model::load(path) {
                Ok(model) => model,
                Err(e) => {
                    warn!("Skipping model {}: {}", path.display(), e);
                    continue;
                }
            };
            let id = renderer
                .add_model(&model)
                .with_context(|| format!("failed to upload {}", path.display()))?;
            self.scene
                .push(SceneObject::placed(id, world_scale, model.normalize_scale()));
        }
        if self.scene.is_empty() {
            warn!("No models loaded; only the light markers will be visible");
        }

        // The frame target keeps the start-up size, so the aspect does too.
        self.camera.set_aspect(window.aspect_ratio());
        self.controller.update_camera(&mut self.camera);

        info!(
            "Viewer ready: {} objects, mode {}",
            self.scene.len(),
            renderer.draw_mode()
        );
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn handle_action(&mut self, action: Action, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match action {
            Action::SelectMode(mode) => {
                renderer.set_draw_mode(mode);
                info!("Draw mode: {}", mode);
            }
            Action::ToggleLightAnimation => {
                let animating = renderer.toggle_light_animation();
                info!("Light animation {}", if animating { "on" } else { "off" });
            }
            Action::RegenerateLights => {
                let seed = controls::unix_time_seed();
                renderer.regenerate_lights(seed);
                info!("Regenerated lights with seed {}", seed);
            }
            Action::Export => match renderer.export_snapshot(&self.config.export.directory) {
                Ok(report) => {
                    for file in &report.files {
                        info!("Wrote {}", file.display());
                    }
                }
                Err(e) => error!("Snapshot export failed: {}", e),
            },
            Action::LogCamera => {
                let p = self.controller.position;
                info!(
                    "Camera position ({:.4}, {:.4}, {:.4}), yaw {:.4}, pitch {:.4}",
                    p.x,
                    p.y,
                    p.z,
                    self.controller.yaw(),
                    self.controller.pitch()
                );
            }
            Action::Preset(preset) => {
                self.controller.apply_preset(preset);
                info!("Camera preset {:?}", preset);
            }
            Action::Quit => {
                info!("Escape pressed, shutting down");
                event_loop.exit();
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.timer.delta_secs();

        for action in controls::pending_actions(&self.input) {
            self.handle_action(action, event_loop);
        }

        let grabbed = self.window.as_ref().is_some_and(Window::is_cursor_grabbed);
        controls::update_controller(&mut self.controller, &self.input, grabbed, dt);
        self.controller.update_camera(&mut self.camera);
        self.input.begin_frame();

        if let Some(renderer) = self.renderer.as_mut()
            && let Err(e) = renderer.render_frame(self.clock.elapsed_secs(), &self.scene, &self.camera)
        {
            error!("Render error: {}", e);
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("Initialization failed: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => {
                self.input.release_all();
                if let Some(window) = self.window.as_mut() {
                    window.set_cursor_grab(false);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = MouseButton::from(button);
                match state {
                    ElementState::Pressed => self.input.on_mouse_pressed(button),
                    ElementState::Released => self.input.on_mouse_released(button),
                }
                if button == MouseButton::Left
                    && state == ElementState::Pressed
                    && let Some(window) = self.window.as_mut()
                {
                    let grab = !window.is_cursor_grabbed();
                    window.set_cursor_grab(grab);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let grabbed = self.window.as_ref().is_some_and(Window::is_cursor_grabbed);
                if !grabbed {
                    self.input
                        .on_cursor_moved(position.x as f32, position.y as f32);
                }
            }
            WindowEvent::CursorLeft { .. } => self.input.on_cursor_left(),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event
            && self.window.as_ref().is_some_and(Window::is_cursor_grabbed)
        {
            self.input.on_raw_motion(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Renderer before window: the surface belongs to the window.
        self.renderer = None;
        self.window = None;
    }
}

fn main() -> Result<()> {
    renderer_core::init_logging();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    info!("Starting deferred viewer");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config);
    event_loop.run_app(&mut viewer)?;

    Ok(())
}
