//! Wayland layer-shell recording indicator
//!
//! A small click-through overlay pinned to a screen edge that shows a
//! status dot and the elapsed recording time as seven-segment digits.
//! It is visible while a recording is active and exits once the update
//! channel closes.

use std::sync::mpsc::{self, TryRecvError};

use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_output, wl_shm, wl_surface},
    Connection, QueueHandle,
};

use crate::cli::args::IndicatorPosition;
use crate::domain::recording::{Duration, RecordingState, StateUpdate};

/// Surface size
const WIDTH: u32 = 100;
const HEIGHT: u32 = 44;

/// Margin from screen edge
const MARGIN: i32 = 20;

/// Seven-segment glyph geometry
const DIGIT_WIDTH: f32 = 10.0;
const DIGIT_HEIGHT: f32 = 20.0;
const SEGMENT: f32 = 2.5;
const COLON_WIDTH: f32 = 3.0;
const GLYPH_GAP: f32 = 3.0;

/// Left edge of the text area, right of the status dot
const TEXT_AREA_START: f32 = 26.0;

/// Segment bits: a=top, b=top right, c=bottom right, d=bottom,
/// e=bottom left, f=top left, g=middle
const DIGIT_SEGMENTS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];

/// Color helpers (Color::from_rgba8 is not const)
fn bg_color() -> Color {
    Color::from_rgba8(30, 30, 30, 220)
}

fn recording_color() -> Color {
    Color::from_rgba8(220, 50, 50, 255)
}

fn stopping_color() -> Color {
    Color::from_rgba8(255, 180, 50, 255)
}

/// Error type for layer shell indicator
#[derive(Debug, thiserror::Error)]
pub enum LayerShellError {
    #[error("Failed to connect to Wayland: {0}")]
    Connection(#[from] wayland_client::ConnectError),
    #[error("Failed to initialize registry: {0}")]
    Registry(#[from] wayland_client::globals::GlobalError),
    #[error("Layer shell not available (compositor doesn't support wlr-layer-shell)")]
    LayerShellNotAvailable,
    #[error("Wayland dispatch error: {0}")]
    Dispatch(#[from] wayland_client::DispatchError),
    #[error("Wayland error: {0}")]
    Wayland(#[from] wayland_client::backend::WaylandError),
    #[error("Failed to create buffer pool: {0}")]
    BufferPool(String),
    #[error("Failed to render indicator")]
    Render,
}

/// Run the layer-shell indicator until the update channel closes.
///
/// Returns Err if Wayland/layer-shell is not available.
pub fn run_indicator(
    position: IndicatorPosition,
    state_rx: broadcast::Receiver<StateUpdate>,
) -> Result<(), LayerShellError> {
    // Bridge broadcast to mpsc for non-blocking polling
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut state_rx = state_rx;
        loop {
            match state_rx.blocking_recv() {
                Ok(update) => {
                    if tx.send(update).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let conn = Connection::connect_to_env()?;
    let (globals, mut event_queue) = registry_queue_init(&conn)?;
    let qh = event_queue.handle();

    let mut app = LayerShellIndicator::new(&globals, &qh, position, rx)?;

    event_queue.roundtrip(&mut app)?;

    while !app.closed {
        app.process_state_updates();
        app.update_visibility(&qh);

        if app.surface_mapped && app.dirty {
            if let Err(e) = app.draw() {
                warn!(error = %e, "indicator draw failed");
            }
            app.dirty = false;
        }

        // Dispatch Wayland events, polling with a short timeout so state
        // updates are picked up promptly
        event_queue.flush()?;
        if let Some(guard) = event_queue.prepare_read() {
            let fd = guard.connection_fd();
            let mut poll_fds = [nix::poll::PollFd::new(fd, nix::poll::PollFlags::POLLIN)];
            let _ = nix::poll::poll(&mut poll_fds, nix::poll::PollTimeout::from(100u16));
            match guard.read() {
                Ok(_) => {}
                Err(wayland_client::backend::WaylandError::Io(ref io_err))
                    if io_err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(LayerShellError::Wayland(e)),
            }
        }
        event_queue.dispatch_pending(&mut app)?;
    }

    app.destroy_surface();
    event_queue.flush()?;
    debug!("indicator closed");
    Ok(())
}

/// Layer shell indicator state
struct LayerShellIndicator {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    shm: Shm,
    layer_shell: LayerShell,

    position: IndicatorPosition,
    state_rx: mpsc::Receiver<StateUpdate>,

    recording_state: RecordingState,
    elapsed_ms: u64,

    layer_surface: Option<LayerSurface>,
    surface_mapped: bool,
    dirty: bool,
    closed: bool,

    pool: SlotPool,
    buffer: Option<Buffer>,
}

impl LayerShellIndicator {
    fn new(
        globals: &wayland_client::globals::GlobalList,
        qh: &QueueHandle<Self>,
        position: IndicatorPosition,
        state_rx: mpsc::Receiver<StateUpdate>,
    ) -> Result<Self, LayerShellError> {
        let registry_state = RegistryState::new(globals);
        let output_state = OutputState::new(globals, qh);
        let compositor_state =
            CompositorState::bind(globals, qh).map_err(|_| LayerShellError::LayerShellNotAvailable)?;
        let shm = Shm::bind(globals, qh).map_err(|_| LayerShellError::LayerShellNotAvailable)?;
        let layer_shell =
            LayerShell::bind(globals, qh).map_err(|_| LayerShellError::LayerShellNotAvailable)?;

        let pool = SlotPool::new((WIDTH * HEIGHT * 4) as usize, &shm)
            .map_err(|e| LayerShellError::BufferPool(e.to_string()))?;

        Ok(Self {
            registry_state,
            output_state,
            compositor_state,
            shm,
            layer_shell,
            position,
            state_rx,
            recording_state: RecordingState::Idle,
            elapsed_ms: 0,
            layer_surface: None,
            surface_mapped: false,
            dirty: false,
            closed: false,
            pool,
            buffer: None,
        })
    }

    fn process_state_updates(&mut self) {
        loop {
            match self.state_rx.try_recv() {
                Ok(update) => {
                    let changed = self.recording_state != update.state
                        || self.elapsed_ms / 1000 != update.elapsed_ms / 1000;
                    self.recording_state = update.state;
                    self.elapsed_ms = update.elapsed_ms;
                    self.dirty |= changed;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    fn update_visibility(&mut self, qh: &QueueHandle<Self>) {
        let should_be_visible = self.recording_state.is_active();

        if should_be_visible && self.layer_surface.is_none() {
            self.create_surface(qh);
        } else if !should_be_visible && self.layer_surface.is_some() {
            self.destroy_surface();
        }
    }

    fn create_surface(&mut self, qh: &QueueHandle<Self>) {
        let surface = self.compositor_state.create_surface(qh);

        let layer_surface = self.layer_shell.create_layer_surface(
            qh,
            surface,
            Layer::Overlay,
            Some("screen-recorder-indicator"),
            None, // Use default output
        );

        let (anchor, (top, right, bottom, left)) = placement(self.position);
        layer_surface.set_anchor(anchor);
        layer_surface.set_margin(top, right, bottom, left);
        layer_surface.set_size(WIDTH, HEIGHT);

        // Click-through, never takes focus or space
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer_surface.set_exclusive_zone(-1);

        layer_surface.commit();

        self.layer_surface = Some(layer_surface);
        self.dirty = true;
    }

    fn destroy_surface(&mut self) {
        self.layer_surface = None;
        self.surface_mapped = false;
        self.buffer = None;
    }

    fn draw(&mut self) -> Result<(), LayerShellError> {
        let Some(pixmap) = render_indicator(self.recording_state, self.elapsed_ms) else {
            return Err(LayerShellError::Render);
        };

        let (buffer, canvas) = self
            .pool
            .create_buffer(
                WIDTH as i32,
                HEIGHT as i32,
                (WIDTH * 4) as i32,
                wl_shm::Format::Argb8888,
            )
            .map_err(|e| LayerShellError::BufferPool(e.to_string()))?;

        // tiny-skia is RGBA, wl_shm Argb8888 is BGRA in memory on little-endian
        let src = pixmap.data();
        for (dst, px) in canvas.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            dst[0] = px[2];
            dst[1] = px[1];
            dst[2] = px[0];
            dst[3] = px[3];
        }

        let Some(layer_surface) = self.layer_surface.as_ref() else {
            return Ok(());
        };

        buffer.attach_to(layer_surface.wl_surface()).map_err(|e| {
            LayerShellError::BufferPool(format!("Failed to attach buffer: {}", e))
        })?;
        layer_surface
            .wl_surface()
            .damage_buffer(0, 0, WIDTH as i32, HEIGHT as i32);
        layer_surface.commit();

        // Keep the buffer alive while attached
        self.buffer = Some(buffer);
        Ok(())
    }
}

/// Anchor and (top, right, bottom, left) margins for a position
fn placement(position: IndicatorPosition) -> (Anchor, (i32, i32, i32, i32)) {
    match position {
        IndicatorPosition::TopLeft => (Anchor::TOP | Anchor::LEFT, (MARGIN, 0, 0, MARGIN)),
        IndicatorPosition::TopCenter => (Anchor::TOP, (MARGIN, 0, 0, 0)),
        IndicatorPosition::TopRight => (Anchor::TOP | Anchor::RIGHT, (MARGIN, MARGIN, 0, 0)),
        IndicatorPosition::BottomLeft => (Anchor::BOTTOM | Anchor::LEFT, (0, 0, MARGIN, MARGIN)),
        IndicatorPosition::BottomCenter => (Anchor::BOTTOM, (0, 0, MARGIN, 0)),
        IndicatorPosition::BottomRight => {
            (Anchor::BOTTOM | Anchor::RIGHT, (0, MARGIN, MARGIN, 0))
        }
    }
}

/// Draw the indicator for a state; `None` when nothing should be shown
fn render_indicator(state: RecordingState, elapsed_ms: u64) -> Option<Pixmap> {
    let accent = match state {
        RecordingState::Recording => recording_color(),
        RecordingState::Stopping => stopping_color(),
        _ => return None,
    };

    let mut pixmap = Pixmap::new(WIDTH, HEIGHT)?;
    pixmap.fill(Color::TRANSPARENT);

    let mut paint = Paint::default();
    paint.anti_alias = true;

    paint.set_color(bg_color());
    let background = rounded_rect(WIDTH as f32, HEIGHT as f32, 8.0)?;
    pixmap.fill_path(&background, &paint, FillRule::Winding, Transform::identity(), None);

    paint.set_color(accent);
    let dot = PathBuilder::from_circle(16.0, HEIGHT as f32 / 2.0, 7.0)?;
    pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);

    let text = Duration::from_millis(elapsed_ms).format_clock();
    let area_width = WIDTH as f32 - TEXT_AREA_START;
    let x = TEXT_AREA_START + (area_width - text_width(&text)) / 2.0;
    let y = (HEIGHT as f32 - DIGIT_HEIGHT) / 2.0;
    for rect in text_rects(&text, x, y) {
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    Some(pixmap)
}

fn rounded_rect(width: f32, height: f32, radius: f32) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    pb.move_to(radius, 0.0);
    pb.line_to(width - radius, 0.0);
    pb.quad_to(width, 0.0, width, radius);
    pb.line_to(width, height - radius);
    pb.quad_to(width, height, width - radius, height);
    pb.line_to(radius, height);
    pb.quad_to(0.0, height, 0.0, height - radius);
    pb.line_to(0.0, radius);
    pb.quad_to(0.0, 0.0, radius, 0.0);
    pb.close();
    pb.finish()
}

fn glyph_width(ch: char) -> f32 {
    if ch == ':' {
        COLON_WIDTH
    } else {
        DIGIT_WIDTH
    }
}

/// Width of `text` laid out as seven-segment glyphs
fn text_width(text: &str) -> f32 {
    let glyphs: f32 = text.chars().map(glyph_width).sum();
    let gaps = text.chars().count().saturating_sub(1) as f32 * GLYPH_GAP;
    glyphs + gaps
}

/// Rectangles lighting up `text` with its top-left corner at (x, y)
fn text_rects(text: &str, mut x: f32, y: f32) -> Vec<Rect> {
    let mut rects = Vec::new();
    for ch in text.chars() {
        if ch == ':' {
            let third = DIGIT_HEIGHT / 3.0;
            rects.extend(Rect::from_xywh(x, y + third - COLON_WIDTH / 2.0, COLON_WIDTH, COLON_WIDTH));
            rects.extend(Rect::from_xywh(
                x,
                y + 2.0 * third - COLON_WIDTH / 2.0,
                COLON_WIDTH,
                COLON_WIDTH,
            ));
        } else if let Some(mask) = ch.to_digit(10).map(|d| DIGIT_SEGMENTS[d as usize]) {
            rects.extend(segment_rects(mask, x, y));
        }
        x += glyph_width(ch) + GLYPH_GAP;
    }
    rects
}

fn segment_rects(mask: u8, x: f32, y: f32) -> Vec<Rect> {
    let half = DIGIT_HEIGHT / 2.0;
    let span_x = DIGIT_WIDTH - 2.0 * SEGMENT;
    let span_y = half - 1.5 * SEGMENT;
    let right = x + DIGIT_WIDTH - SEGMENT;
    let lower = y + half + SEGMENT / 2.0;

    let segments = [
        (x + SEGMENT, y, span_x, SEGMENT),                       // a
        (right, y + SEGMENT, SEGMENT, span_y),                   // b
        (right, lower, SEGMENT, span_y),                         // c
        (x + SEGMENT, y + DIGIT_HEIGHT - SEGMENT, span_x, SEGMENT), // d
        (x, lower, SEGMENT, span_y),                             // e
        (x, y + SEGMENT, SEGMENT, span_y),                       // f
        (x + SEGMENT, y + half - SEGMENT / 2.0, span_x, SEGMENT), // g
    ];

    segments
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .filter_map(|(_, &(sx, sy, w, h))| Rect::from_xywh(sx, sy, w, h))
        .collect()
}

// SCTK delegate implementations

impl CompositorHandler for LayerShellIndicator {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        self.dirty = true;
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        self.dirty = true;
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        self.dirty = true;
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl LayerShellHandler for LayerShellIndicator {
    fn closed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
    ) {
        self.destroy_surface();
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        _configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        // Surface is now configured and can be drawn to
        self.surface_mapped = true;
        self.dirty = true;

        // Acknowledge the configure
        layer.wl_surface().commit();
    }
}

impl OutputHandler for LayerShellIndicator {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }
}

impl ShmHandler for LayerShellIndicator {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for LayerShellIndicator {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState];
}

delegate_compositor!(LayerShellIndicator);
delegate_output!(LayerShellIndicator);
delegate_shm!(LayerShellIndicator);
delegate_layer!(LayerShellIndicator);
delegate_registry!(LayerShellIndicator);
