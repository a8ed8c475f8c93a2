use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use log::info;
use pollster::block_on;
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::WindowBuilder;

use galaxy_studio::app::{self, FrameClock};
use galaxy_studio::camera::{self, OrbitCamera};
use galaxy_studio::galaxy::{self, PointCloud};
use galaxy_studio::params::{self, GalaxyParams};
use galaxy_studio::render::{FrameParams, PointBatch, Renderer};
use galaxy_studio::scene::{GalaxyScene, PointCloudBackend};
use galaxy_studio::ui::{PanelStats, SettingsPanel};

const USAGE: &str = "Usage: galaxy-studio [--params <file.json>] [--seed <n>] [--summary-only]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let params = match &options.params_path {
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
            GalaxyParams::from_json(&text)
                .with_context(|| format!("failed to load parameters from {path}"))?
        }
        None => GalaxyParams::default(),
    };

    println!(
        "Galaxy parameters: {} points, radius {:.1}, {} branches, colors {} -> {}",
        params.count,
        params.radius,
        params.branch_count,
        params::format_hex_color(params.inside_color),
        params::format_hex_color(params.outside_color)
    );

    if options.summary_only {
        run_headless(&params, options.seed)
    } else {
        match run_interactive(params, options.seed) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                    );
                    run_headless(&params, options.seed)
                } else {
                    Err(err)
                }
            }
        }
    }
}

fn run_headless(params: &GalaxyParams, seed: Option<u64>) -> Result<()> {
    let mut rng = make_rng(seed);
    let cloud = galaxy::generate(params, &mut rng);
    let spread = camera::INITIAL_EYE.length() * galaxy::STAR_SPREAD_FACTOR;
    let stars = galaxy::starfield(galaxy::STAR_COUNT, spread, &mut rng);

    let (min, max) = bounds(&cloud);
    println!("Galaxy: {} points", cloud.len());
    println!(
        " - extent x=({:.2}, {:.2}) y=({:.2}, {:.2}) z=({:.2}, {:.2})",
        min.x, max.x, min.y, max.y, min.z, max.z
    );
    println!(
        "Starfield: {} points across a {:.0} unit cube",
        stars.len(),
        spread
    );
    Ok(())
}

fn run_interactive(params: GalaxyParams, seed: Option<u64>) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop =
        event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Galaxy Studio")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let mut renderer = block_on(Renderer::new(Arc::clone(&window)))
        .map_err(|err| WindowInitError::from_error("renderer", err))?;
    let mut rng = make_rng(seed);

    let spread = camera::INITIAL_EYE.length() * galaxy::STAR_SPREAD_FACTOR;
    let stars = galaxy::starfield(galaxy::STAR_COUNT, spread, &mut rng);
    let starfield = renderer.upload(&stars, galaxy::STAR_POINT_SIZE);

    let mut scene = GalaxyScene::new();
    scene.regenerate(&mut renderer, &params, &mut rng);

    let size = window.inner_size();
    let camera = OrbitCamera::looking_from(
        camera::INITIAL_EYE,
        app::aspect_ratio(size.width, size.height),
    );

    let mut app = AppState {
        renderer,
        scene,
        starfield,
        camera,
        panel: SettingsPanel::new(params),
        egui_state: egui_winit::State::new(&event_loop),
        rng,
        clock: FrameClock::start(),
        params,
        last_error: None,
    };

    let mut event_loop = event_loop;
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        if let Err(err) = app.process_event(&event, control_flow) {
            app.last_error = Some(err);
            control_flow.set_exit();
        }
    });

    app.shutdown();

    if let Some(err) = app.last_error {
        return Err(err);
    }

    Ok(())
}

struct AppState {
    renderer: Renderer,
    scene: GalaxyScene<Renderer>,
    starfield: PointBatch,
    camera: OrbitCamera,
    panel: SettingsPanel,
    egui_state: egui_winit::State,
    rng: StdRng,
    clock: FrameClock,
    params: GalaxyParams,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, control_flow: &mut ControlFlow) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id }
                if *window_id == self.renderer.window().id() =>
            {
                // The panel gets first look; consumed input must not also
                // steer the camera.
                let consumed = self
                    .egui_state
                    .on_event(self.panel.context(), event)
                    .consumed;
                match event {
                    WindowEvent::CloseRequested => {
                        control_flow.set_exit();
                    }
                    WindowEvent::Resized(size) => {
                        self.handle_resize(*size);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        self.handle_resize(**new_inner_size);
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        // Releases always reach the camera so a drag that
                        // ends over the panel still stops.
                        if !consumed || *state == ElementState::Released {
                            self.camera.handle_mouse_button(*button, *state);
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        // Only consulted mid-drag, so panel hover needs no
                        // gating here.
                        self.camera.handle_mouse_move(*position);
                    }
                    WindowEvent::MouseWheel { delta, .. } if !consumed => {
                        self.camera.handle_scroll(*delta);
                    }
                    _ => {}
                }
            }
            Event::RedrawRequested(window_id) if *window_id == self.renderer.window().id() => {
                self.redraw()?;
            }
            Event::MainEventsCleared => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let timing = self.clock.tick();
        self.camera.update(timing.dt);

        let stats = PanelStats {
            point_count: self.scene.point_count(),
            last_regeneration: self.scene.last_regeneration(),
        };
        let raw_input = self.egui_state.take_egui_input(self.renderer.window());
        let output = self.panel.run(raw_input, &stats);
        self.egui_state.handle_platform_output(
            self.renderer.window(),
            self.panel.context(),
            output.platform,
        );

        if let Some(new_params) = output.committed {
            self.params = new_params;
            self.scene
                .regenerate(&mut self.renderer, &new_params, &mut self.rng);
        }

        let frame = FrameParams {
            view: self.camera.view_matrix(),
            proj: self.camera.projection_matrix(),
            galaxy_angle: app::galaxy_angle(timing.elapsed),
            starfield_angle: app::starfield_angle(timing.elapsed),
        };
        if let Err(err) =
            self.renderer
                .render(&frame, self.scene.batch(), &self.starfield, &output.frame)
        {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.handle_resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
            }
        }
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        let scale = self.renderer.window().scale_factor();
        self.renderer.resize(app::surface_size(size, scale));
        self.camera
            .set_aspect(app::aspect_ratio(size.width, size.height));
    }

    fn shutdown(&self) {
        println!(
            "Session ended with {} galaxy points (radius {:.1}, {} branches, spin {:.1})",
            self.scene.point_count(),
            self.params.radius,
            self.params.branch_count,
            self.params.spin
        );
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn bounds(cloud: &PointCloud) -> (Vec3, Vec3) {
    if cloud.is_empty() {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for i in 0..cloud.len() {
        let p = cloud.position(i);
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

struct CliOptions {
    params_path: Option<String>,
    seed: Option<u64>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut options = Self {
            params_path: None,
            seed: None,
            summary_only: false,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--params" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow!("--params requires a file path. {USAGE}"))?;
                    options.params_path = Some(path);
                }
                "--seed" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--seed requires a number. {USAGE}"))?;
                    options.seed = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid seed {value:?}"))?,
                    );
                }
                "--summary-only" => options.summary_only = true,
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }
}
