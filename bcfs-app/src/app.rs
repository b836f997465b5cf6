use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use bcfs_core::{BlockKind, Side};
use bcfs_experiment::{
    CsvTranscript, ExitReason, ExperimentConfig, SessionAssets, SessionEvent, SessionOrchestrator,
    SessionPlan,
};
use bcfs_render::{PanelLayout, SkiaRenderer, load_font};
use bcfs_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use tiny_skia::Pixmap;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

use crate::assets::load_pixmaps;
use crate::keys::response_key;

/// Deadlines closer than this are waited out with a precise sleep instead of
/// going back to the event loop.
const SPIN_THRESHOLD: Duration = Duration::from_millis(2);

pub struct AppOptions {
    pub config_path: PathBuf,
    pub resume_from: Option<PathBuf>,
    pub windowed: bool,
}

/// Decoded images for both stimulus sets, so a block switch is a swap.
struct StimulusPixmaps {
    main: Vec<Pixmap>,
    practice: Option<Vec<Pixmap>>,
}

impl StimulusPixmaps {
    fn for_block(&self, kind: BlockKind) -> Vec<Pixmap> {
        match (kind, &self.practice) {
            (BlockKind::Practice, Some(set)) => set.clone(),
            _ => self.main.clone(),
        }
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    stimuli: Option<StimulusPixmaps>,
    session: SessionOrchestrator<CsvTranscript, HighPrecisionTimer, ThreadRng>,
    config: ExperimentConfig,
    assets: SessionAssets,
    resume_from: Option<PathBuf>,
    windowed: bool,

    timer: HighPrecisionTimer,
    render_timer: HighPrecisionTimer,
    last_present_ns: Option<u64>,
    refresh_rate: Option<f64>,

    should_exit: bool,
}

impl App {
    pub fn new(options: AppOptions) -> Result<Self> {
        let config = ExperimentConfig::load(&options.config_path)
            .with_context(|| format!("loading {}", options.config_path.display()))?;
        let assets = SessionAssets::load(&config).context("loading image sets")?;
        info!(
            participant = %config.participant_id,
            practice = config.practice_enabled,
            trials = config.trials_total,
            "configuration loaded"
        );

        let timer = HighPrecisionTimer::new();
        let session = SessionOrchestrator::new(
            SessionPlan::from_config(&config),
            assets.clone(),
            CsvTranscript::new(&config.output_dir),
            timer.clone(),
            rand::rng(),
        );

        Ok(Self {
            window: None,
            pixels: None,
            renderer: None,
            stimuli: None,
            session,
            config,
            assets,
            resume_from: options.resume_from,
            windowed: options.windowed,
            timer,
            render_timer: HighPrecisionTimer::new(),
            last_present_ns: None,
            refresh_rate: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!("press SPACE to start a trial, Q or ESC to abort");

        let result = event_loop.run_app(&mut self);
        self.log_timing();
        result.map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let mut window_attributes = Window::default_attributes()
            .with_title("b-CFS")
            .with_resizable(false);
        window_attributes = if self.windowed {
            window_attributes.with_inner_size(LogicalSize::new(1280.0, 800.0))
        } else {
            window_attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
        };

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz = self.refresh_rate,
            "display configured"
        );
        self.check_mask_cycle();

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);

        let panel = PanelLayout::for_side(Side::Left, size.width, size.height);
        let masks = load_pixmaps(&self.assets.masks, panel.mask_size())?;
        let stimuli = StimulusPixmaps {
            main: load_pixmaps(&self.assets.stimuli, panel.stimulus_size())?,
            practice: self
                .assets
                .practice_stimuli
                .as_ref()
                .map(|set| load_pixmaps(set, panel.stimulus_size()))
                .transpose()?,
        };
        let font = self.config.font_path.as_ref().and_then(|path| {
            load_font(path)
                .inspect_err(|e| warn!(error = %e, "font unavailable"))
                .ok()
        });
        let renderer = SkiaRenderer::new(size.width, size.height, masks, Vec::new(), font)?;

        self.renderer = Some(renderer);
        self.stimuli = Some(stimuli);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        self.start_session()
    }

    fn start_session(&mut self) -> Result<()> {
        let renderer = self
            .renderer
            .as_mut()
            .ok_or_else(|| anyhow!("renderer not initialised"))?;
        let events = match &self.resume_from {
            Some(path) => self
                .session
                .resume_main(path, renderer)
                .with_context(|| format!("resuming from {}", path.display()))?,
            None => self.session.start(renderer)?,
        };
        self.handle_session_events(events);
        Ok(())
    }

    /// Warns when the mask cannot change as often as configured.
    fn check_mask_cycle(&self) {
        if let Some(hz) = self.refresh_rate.filter(|hz| *hz > 0.0) {
            let period_ms = 1000.0 / hz;
            if (self.config.mask_cycle_ms as f64) < period_ms {
                warn!(
                    mask_cycle_ms = self.config.mask_cycle_ms,
                    refresh_period_ms = period_ms,
                    "mask cycle is shorter than one refresh period; frames will be skipped"
                );
            }
        }
    }

    fn handle_session_events(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            debug!(?event, "session event");
            match event {
                SessionEvent::BlockStarted { kind, .. } => {
                    if let (Some(renderer), Some(stimuli)) = (&mut self.renderer, &self.stimuli) {
                        renderer.set_stimuli(stimuli.for_block(kind));
                    }
                }
                SessionEvent::BlockFlushed {
                    path: Some(path), ..
                } => {
                    info!(path = %path.display(), "results saved");
                }
                SessionEvent::FlushFailed { kind, error } => {
                    error!(block = %kind, %error, "results could not be saved");
                }
                SessionEvent::ReturnToConfiguration { reason } => {
                    match reason {
                        ExitReason::Completed => info!("session complete"),
                        ExitReason::Aborted => warn!("session aborted"),
                    }
                    self.should_exit = true;
                }
                _ => {}
            }
        }
    }

    fn pump_timers(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let events = self.session.on_timer(renderer);
        self.handle_session_events(events);
    }

    fn handle_input(&mut self, key: winit::keyboard::PhysicalKey) {
        let (Some(key), Some(renderer)) = (response_key(key), self.renderer.as_mut()) else {
            return;
        };
        let events = self.session.handle_key(key, renderer);
        self.handle_session_events(events);
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let stats = renderer.render_frame(pixels.frame_mut(), &mut self.render_timer)?;
        if !stats.redrawn {
            return Ok(());
        }
        pixels.render()?;

        let now = self.timer.now();
        if let Some(last) = self.last_present_ns.replace(now) {
            self.timer.record_frame(Duration::from_nanos(now.saturating_sub(last)));
        }
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize canvas");
            }
        }
        debug!(width = new_size.width, height = new_size.height, "display resized");
    }

    fn abort_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_mut() {
            let events = self.session.abort(renderer);
            self.handle_session_events(events);
        }
        self.exit(event_loop);
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }

    fn log_timing(&self) {
        let stats = self.timer.timing_stats();
        if stats.samples == 0 {
            return;
        }
        info!(
            frames = stats.samples,
            mean_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            min_ms = stats.min_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            fps = stats.effective_fps,
            "frame timing"
        );
        if let Some(compose) = self
            .renderer
            .as_ref()
            .and_then(|r| r.component_stats("compose"))
        {
            debug!(
                mean_ms = compose.average_frame_time_ns / 1e6,
                max_ms = compose.max_frame_time_ns / 1e6,
                "compose timing"
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %format!("{e:#}"), "failed to start");
                self.exit(event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.abort_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(error = %e, "render failed");
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_input(event.physical_key);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.pump_timers();

        // A short wait is spun out here; longer ones go back to the loop.
        if let Some(deadline) = self.session.next_deadline() {
            let wait = Duration::from_nanos(deadline.saturating_sub(self.timer.now()));
            if wait <= SPIN_THRESHOLD {
                self.timer.high_precision_sleep(wait);
                self.pump_timers();
            }
        }

        if self.should_exit {
            self.exit(event_loop);
            return;
        }

        if self.renderer.as_ref().is_some_and(SkiaRenderer::is_dirty) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }

        let flow = match self.session.next_deadline() {
            Some(deadline) => {
                let wait = Duration::from_nanos(deadline.saturating_sub(self.timer.now()));
                ControlFlow::WaitUntil(Instant::now() + wait.saturating_sub(SPIN_THRESHOLD))
            }
            None => ControlFlow::Wait,
        };
        event_loop.set_control_flow(flow);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        debug!("application resources released");
    }
}
