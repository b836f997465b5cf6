use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ab_glyph::FontVec;
use anyhow::{Result, bail};
use bcfs_core::{Side, StimulusRow};
use bcfs_experiment::Display;
use bcfs_timing::{HighPrecisionTimer, Timer, TimingStats};
use tiny_skia::{Color, ColorU8, Paint, Pixmap, PixmapPaint, Rect, Transform};
use tracing::{debug, warn};

use crate::layout::{BACKGROUND, PanelLayout};
use crate::text::render_text_pixmap;

const FIXATION_SIZE: u32 = 40;
const FIXATION_THICKNESS: f32 = 2.0;
const MESSAGE_FONT_PX: f32 = 24.0;

/// What one panel currently shows, besides its fixation cross.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanelContent {
    #[default]
    Empty,
    Mask(usize),
    Stimulus {
        image: usize,
        row: StimulusRow,
        alpha: f32,
    },
}

pub struct FrameStats {
    pub compose: Duration,
    pub copy: Duration,
    pub total: Duration,
    /// False when nothing changed since the previous frame.
    pub redrawn: bool,
}

/// Copies straight-alpha RGBA8 pixels (as decoded by an image loader) into a
/// premultiplied pixmap.
pub fn pixmap_from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Pixmap> {
    if rgba.len() != width as usize * height as usize * 4 {
        return None;
    }
    let mut pm = Pixmap::new(width, height)?;
    for (px, src) in pm.pixels_mut().iter_mut().zip(rgba.chunks_exact(4)) {
        *px = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pm)
}

struct TextCache {
    font: Option<FontVec>,
    size_px: f32,
    map: HashMap<String, Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: Option<FontVec>, size_px: f32) -> Self {
        Self {
            font,
            size_px,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, text: &str) -> Option<Arc<Pixmap>> {
        if let Some(p) = self.map.get(text) {
            return Some(Arc::clone(p));
        }
        let Some(font) = &self.font else {
            debug!(text, "no font loaded, message not drawn");
            return None;
        };
        let pm = Arc::new(render_text_pixmap(
            text,
            self.size_px,
            font,
            Color::from_rgba8(255, 255, 255, 255),
        )?);
        self.map.insert(text.to_string(), Arc::clone(&pm));
        Some(pm)
    }
}

/// Two-panel compositor. Channel updates only record what each panel should
/// show; [`SkiaRenderer::render_frame`] composes and presents it.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    canvas: Pixmap,
    fixation: Pixmap,

    masks: Vec<Pixmap>,
    stimuli: Vec<Pixmap>,
    panels: [PanelContent; 2],
    message: Option<Arc<Pixmap>>,
    text_cache: TextCache,
    dirty: bool,

    component_timers: HashMap<&'static str, RefCell<HighPrecisionTimer>>,
}

impl SkiaRenderer {
    pub fn new(
        width: u32,
        height: u32,
        masks: Vec<Pixmap>,
        stimuli: Vec<Pixmap>,
        font: Option<FontVec>,
    ) -> Result<Self> {
        let Some(canvas) = Pixmap::new(width.max(1), height.max(1)) else {
            bail!("cannot allocate {width}x{height} canvas");
        };
        let Some(fixation) = fixation_cross() else {
            bail!("cannot allocate fixation cross");
        };
        if font.is_none() {
            warn!("no font configured; ITI and standby messages will not be shown");
        }

        Ok(Self {
            width: canvas.width(),
            height: canvas.height(),
            canvas,
            fixation,
            masks,
            stimuli,
            panels: [PanelContent::Empty; 2],
            message: None,
            text_cache: TextCache::new(font, MESSAGE_FONT_PX),
            dirty: true,
            component_timers: ["compose", "copy"]
                .iter()
                .map(|&k| (k, RefCell::new(HighPrecisionTimer::new())))
                .collect(),
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        let Some(canvas) = Pixmap::new(new_width.max(1), new_height.max(1)) else {
            bail!("cannot allocate {new_width}x{new_height} canvas");
        };
        self.width = canvas.width();
        self.height = canvas.height();
        self.canvas = canvas;
        self.dirty = true;
        Ok(())
    }

    /// Replaces the stimulus images, e.g. when moving from the practice set
    /// to the main set.
    pub fn set_stimuli(&mut self, stimuli: Vec<Pixmap>) {
        self.stimuli = stimuli;
        self.dirty = true;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn panel(&self, side: Side) -> PanelContent {
        self.panels[panel_index(side)]
    }

    pub fn has_message(&self) -> bool {
        self.message.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn component_stats(&self, name: &str) -> Option<TimingStats> {
        self.component_timers
            .get(name)
            .map(|t| t.borrow().timing_stats())
    }

    /// Composes the current panel state and copies it into `frame_buffer`
    /// (RGBA8, `width * height * 4` bytes).
    pub fn render_frame(
        &mut self,
        frame_buffer: &mut [u8],
        timer: &mut HighPrecisionTimer,
    ) -> Result<FrameStats> {
        let expected = self.width as usize * self.height as usize * 4;
        if frame_buffer.len() != expected {
            bail!(
                "frame buffer holds {} bytes, canvas needs {expected}",
                frame_buffer.len()
            );
        }
        if !self.dirty {
            return Ok(FrameStats {
                compose: Duration::ZERO,
                copy: Duration::ZERO,
                total: Duration::ZERO,
                redrawn: false,
            });
        }

        let t_compose = {
            let t = timer.now();
            self.compose();
            timer.elapsed(t)
        };
        // The canvas is opaque, so premultiplied bytes equal straight RGBA.
        let t_copy = {
            let t = timer.now();
            frame_buffer.copy_from_slice(self.canvas.data());
            timer.elapsed(t)
        };
        self.dirty = false;

        let total = t_compose + t_copy;
        self.component_timers["compose"]
            .borrow_mut()
            .record_frame(t_compose);
        self.component_timers["copy"].borrow_mut().record_frame(t_copy);
        timer.record_frame(total);

        Ok(FrameStats {
            compose: t_compose,
            copy: t_copy,
            total,
            redrawn: true,
        })
    }

    /// Draws both panels onto the offscreen canvas.
    pub fn compose(&mut self) {
        let [r, g, b] = BACKGROUND;
        self.canvas.fill(Color::from_rgba8(r, g, b, 255));

        for side in [Side::Left, Side::Right] {
            let layout = PanelLayout::for_side(side, self.width, self.height);
            match self.panels[panel_index(side)] {
                PanelContent::Empty => {}
                PanelContent::Mask(frame) => {
                    if let Some(pm) = self.masks.get(frame) {
                        let (cx, cy) = layout.center();
                        let x = cx - pm.width() as f32 / 2.0;
                        let y = cy - pm.height() as f32 / 2.0;
                        draw(&mut self.canvas, pm, x, y, 1.0);
                    }
                }
                PanelContent::Stimulus { image, row, alpha } => {
                    if let Some(pm) = self.stimuli.get(image) {
                        let (cx, _) = layout.center();
                        let x = cx - pm.width() as f32 / 2.0;
                        let y = layout.row_top(row, pm.height() as f32);
                        draw(&mut self.canvas, pm, x, y, alpha);
                    }
                }
            }

            let (cx, cy) = layout.center();
            let half = FIXATION_SIZE as f32 / 2.0;
            draw(&mut self.canvas, &self.fixation, cx - half, cy - half, 1.0);

            if let Some(msg) = &self.message {
                let x = cx - msg.width() as f32 / 2.0;
                draw(&mut self.canvas, msg, x, layout.message_top(), 1.0);
            }
        }
    }

    fn set_panel(&mut self, side: Side, content: PanelContent) {
        let slot = &mut self.panels[panel_index(side)];
        if *slot != content {
            *slot = content;
            self.dirty = true;
        }
    }
}

impl Display for SkiaRenderer {
    fn show_mask_frame(&mut self, side: Side, frame: usize) {
        self.set_panel(side, PanelContent::Mask(frame));
    }

    fn show_stimulus(&mut self, side: Side, image: usize, row: StimulusRow, alpha: f32) {
        self.set_panel(side, PanelContent::Stimulus { image, row, alpha });
    }

    fn clear_side(&mut self, side: Side) {
        self.set_panel(side, PanelContent::Empty);
    }

    fn show_message(&mut self, text: &str) {
        self.message = self.text_cache.get_or_render(text);
        self.dirty = true;
    }

    fn clear_message(&mut self) {
        if self.message.take().is_some() {
            self.dirty = true;
        }
    }
}

fn panel_index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

fn draw(canvas: &mut Pixmap, pm: &Pixmap, x: f32, y: f32, opacity: f32) {
    let paint = PixmapPaint {
        opacity: opacity.clamp(0.0, 1.0),
        ..PixmapPaint::default()
    };
    canvas.draw_pixmap(
        x.round() as i32,
        y.round() as i32,
        pm.as_ref(),
        &paint,
        Transform::identity(),
        None,
    );
}

fn fixation_cross() -> Option<Pixmap> {
    let size = FIXATION_SIZE as f32;
    let mut pm = Pixmap::new(FIXATION_SIZE, FIXATION_SIZE)?;
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::from_rgba8(255, 255, 255, 255));

    let h = Rect::from_xywh(0.0, (size - FIXATION_THICKNESS) * 0.5, size, FIXATION_THICKNESS)?;
    pm.fill_rect(h, &paint, Transform::identity(), None);
    let v = Rect::from_xywh((size - FIXATION_THICKNESS) * 0.5, 0.0, FIXATION_THICKNESS, size)?;
    pm.fill_rect(v, &paint, Transform::identity(), None);
    Some(pm)
}
