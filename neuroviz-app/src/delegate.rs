//! The render delegate that hosts a [`Visualizer`].

use neuroviz_capture::{ImageSequenceSource, PixelSource};
use neuroviz_data::InferenceResponse;
use neuroviz_gpu::wgpu;
use neuroviz_gpu::{CameraUniforms, DEPTH_FORMAT, Renderer, ResourceRegistry, SceneBounds, SceneRenderer};
use neuroviz_scene::{VisualizeError, VisualizeOutcome, Visualizer, VisualizerConfig};
use neuroviz_window::winit::event::{ElementState, KeyEvent, WindowEvent};
use neuroviz_window::winit::keyboard::{KeyCode, PhysicalKey};
use neuroviz_window::{Prepared, RenderContext, RenderDelegate, WorldLabel};
use std::error::Error;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Spacing of replayed drawing frames. Faster than the partial throttle, so
/// replays exercise it.
pub const REPLAY_FRAME_INTERVAL: Duration = Duration::from_millis(10);

/// Keyboard commands understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ApplyNext,
    Reset,
    Open,
    Replay,
}

impl Command {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Space => Some(Command::ApplyNext),
            KeyCode::KeyC => Some(Command::Reset),
            KeyCode::KeyO => Some(Command::Open),
            KeyCode::KeyD => Some(Command::Replay),
            _ => None,
        }
    }
}

/// Everything the host needs before a window exists.
pub struct NetworkInitData {
    pub visualizer: VisualizerConfig,
    pub neuron_size: f32,
    pub responses: Vec<InferenceResponse>,
    pub frames: Option<ImageSequenceSource>,
}

/// Host state that does not touch the GPU.
pub struct NetworkSession {
    visualizer: Visualizer,
    responses: Vec<InferenceResponse>,
    next_response: usize,
    frames: Option<Box<dyn PixelSource>>,
    next_frame_at: Option<Instant>,
    reframe: bool,
}

impl NetworkSession {
    pub fn new(
        config: VisualizerConfig,
        responses: Vec<InferenceResponse>,
        frames: Option<Box<dyn PixelSource>>,
    ) -> Self {
        Self {
            visualizer: Visualizer::new(config),
            responses,
            next_response: 0,
            frames,
            next_frame_at: None,
            reframe: false,
        }
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    pub fn is_replaying(&self) -> bool {
        self.next_frame_at.is_some()
    }

    /// Whether a build happened since the last call.
    pub fn take_reframe(&mut self) -> bool {
        std::mem::take(&mut self.reframe)
    }

    /// Queue a response loaded at runtime and apply it straight away.
    pub fn push_response(&mut self, response: InferenceResponse) {
        self.responses.push(response);
        self.next_response = self.responses.len() - 1;
        self.apply_next();
    }

    /// Full update with the next response, cycling through the list.
    pub fn apply_next(&mut self) -> Option<VisualizeOutcome> {
        if self.responses.is_empty() {
            warn!("No responses loaded; pass --response or press O");
            return None;
        }
        let index = self.next_response % self.responses.len();
        self.next_response = index + 1;

        match self.visualizer.visualize(&self.responses[index]) {
            Ok(outcome) => {
                if let VisualizeOutcome::Applied { built: true, .. } = outcome {
                    self.log_labels();
                    self.reframe = true;
                }
                if outcome == VisualizeOutcome::NothingToDraw {
                    info!("Response {} carries no activations", index);
                }
                Some(outcome)
            }
            Err(VisualizeError::EmptyInput) => {
                warn!("Nothing drawn yet: draw a digit before visualizing");
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.stop_replay();
        self.visualizer.reset_to_empty_colors();
        info!("Cleared input");
    }

    /// Start feeding recorded frames as partial updates.
    pub fn start_replay(&mut self, now: Instant) {
        if self.frames.is_none() {
            warn!("No frames to replay; pass --frames <DIR>");
            return;
        }
        info!("Replaying drawing frames");
        self.next_frame_at = Some(now);
    }

    fn stop_replay(&mut self) {
        self.next_frame_at = None;
    }

    /// Per-frame work: feed a due replay frame, then apply any due partial.
    /// Returns whether the scene changed.
    pub fn advance(&mut self, now: Instant) -> bool {
        if let (Some(due), Some(frames)) = (self.next_frame_at, self.frames.as_mut())
            && now >= due
        {
            match frames.next_grid() {
                Ok(Some(grid)) => {
                    self.visualizer.submit_partial(grid, now);
                    self.next_frame_at = Some(now + REPLAY_FRAME_INTERVAL);
                }
                Ok(None) => {
                    info!("Replay finished");
                    self.next_frame_at = None;
                }
                Err(err) => {
                    warn!("Replay stopped: {err}");
                    self.next_frame_at = None;
                }
            }
        }
        self.visualizer.tick(now)
    }

    /// Labels of the built scene, for the overlay.
    pub fn labels(&self) -> Vec<WorldLabel> {
        self.visualizer
            .scene()
            .map(|scene| {
                scene
                    .labels()
                    .map(|label| WorldLabel {
                        text: label.text.clone(),
                        anchor: label.anchor,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn log_labels(&self) {
        let Some(scene) = self.visualizer.scene() else {
            return;
        };
        for label in scene.labels() {
            debug!(
                "Layer {}: {} at ({:.2}, {:.2}, {:.2})",
                label.layer_index, label.text, label.anchor.x, label.anchor.y, label.anchor.z
            );
        }
    }
}

/// Replayable sources rewind when they run out so `D` can be pressed again.
struct Rewinding(ImageSequenceSource);

impl PixelSource for Rewinding {
    fn next_grid(&mut self) -> Result<Option<neuroviz_data::PixelGrid>, neuroviz_capture::CaptureError> {
        let grid = self.0.next_grid()?;
        if grid.is_none() {
            self.0.rewind();
        }
        Ok(grid)
    }

    fn resolution(&self) -> (usize, usize) {
        self.0.resolution()
    }

    fn is_active(&self) -> bool {
        self.0.is_active()
    }
}

pub struct NetworkDelegate {
    session: NetworkSession,
    scene_renderer: SceneRenderer,
    open_tx: mpsc::Sender<PathBuf>,
    open_rx: mpsc::Receiver<PathBuf>,
}

impl NetworkDelegate {
    fn open_dialog(&self) {
        let sender = self.open_tx.clone();
        // Keep the dialog off the event loop thread.
        std::thread::spawn(move || {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("Inference Response", &["json"])
                .add_filter("All Files", &["*"])
                .pick_file()
            {
                let _ = sender.send(path);
            }
        });
    }

    fn drain_opened(&mut self) {
        while let Ok(path) = self.open_rx.try_recv() {
            match InferenceResponse::from_path(&path) {
                Ok(response) => {
                    info!("Loaded response from {}", path.display());
                    self.session.push_response(response);
                }
                Err(err) => warn!("Could not load {}: {err}", path.display()),
            }
        }
    }
}

impl RenderDelegate for NetworkDelegate {
    type InitData = NetworkInitData;

    fn create(
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        surface_format: wgpu::TextureFormat,
        init_data: Self::InitData,
    ) -> Result<Self, Box<dyn Error>> {
        let scene_renderer =
            SceneRenderer::new(renderer, registry, surface_format, init_data.neuron_size)?;
        let frames = init_data
            .frames
            .map(|f| Box::new(Rewinding(f)) as Box<dyn PixelSource>);
        let mut session = NetworkSession::new(init_data.visualizer, init_data.responses, frames);
        session.apply_next();

        let (open_tx, open_rx) = mpsc::channel();
        info!("Keys: Space = next response, C = clear, O = open, D = replay drawing, Esc = quit");

        Ok(Self {
            session,
            scene_renderer,
            open_tx,
            open_rx,
        })
    }

    fn bounds(&self) -> &SceneBounds {
        self.scene_renderer.bounds()
    }

    fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        Some(DEPTH_FORMAT)
    }

    fn prepare(
        &mut self,
        renderer: &Renderer,
        registry: &mut ResourceRegistry,
        now: Instant,
    ) -> Result<Prepared, Box<dyn Error>> {
        self.drain_opened();
        self.session.advance(now);

        let changed = self
            .scene_renderer
            .sync(renderer, registry, self.session.visualizer().scene())?;
        if changed {
            debug!("Scene mirror updated");
        }
        Ok(Prepared {
            reframe: self.session.take_reframe(),
        })
    }

    fn handle_window_event(&mut self, event: &WindowEvent, now: Instant) -> bool {
        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(key),
                    repeat: false,
                    ..
                },
            ..
        } = event
        else {
            return false;
        };
        let Some(command) = Command::from_key(*key) else {
            return false;
        };

        match command {
            Command::ApplyNext => {
                self.session.apply_next();
            }
            Command::Reset => self.session.reset(),
            Command::Open => self.open_dialog(),
            Command::Replay => self.session.start_replay(now),
        }
        true
    }

    fn labels(&self) -> Vec<WorldLabel> {
        self.session.labels()
    }

    fn update(&mut self, queue: &wgpu::Queue, registry: &ResourceRegistry, camera: &CameraUniforms) {
        self.scene_renderer.update_camera(queue, registry, camera);
    }

    fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        ctx: RenderContext,
        registry: &ResourceRegistry,
    ) {
        self.scene_renderer
            .render(encoder, ctx.color_view, ctx.depth_view, registry);
    }
}
