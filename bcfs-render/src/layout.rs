//! Geometry of the two side-by-side panels.

use bcfs_core::{Side, StimulusRow};

/// Grey the stimulus is blended against.
pub const BACKGROUND: [u8; 3] = [145, 145, 145];

/// Top edge of each stimulus row as a fraction of panel height.
const TOP_ROW: f32 = 0.0625;
const BOTTOM_ROW: f32 = 0.5625;

/// Stimulus image size relative to its panel (200x300 in a 640x800 panel).
const STIMULUS_WIDTH: f32 = 0.3125;
const STIMULUS_HEIGHT: f32 = 0.375;

/// Gap between the fixation cross and the message below it.
const MESSAGE_OFFSET: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelLayout {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PanelLayout {
    /// Each side gets half of the window.
    pub fn for_side(side: Side, width: u32, height: u32) -> Self {
        let half = width as f32 / 2.0;
        let x = match side {
            Side::Left => 0.0,
            Side::Right => half,
        };
        Self {
            x,
            y: 0.0,
            width: half,
            height: height as f32,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Top edge of a stimulus in `row`. Unknown rows are centred.
    pub fn row_top(&self, row: StimulusRow, image_height: f32) -> f32 {
        match row {
            StimulusRow::Top => self.y + self.height * TOP_ROW,
            StimulusRow::Bottom => self.y + self.height * BOTTOM_ROW,
            StimulusRow::Unknown => self.y + (self.height - image_height) / 2.0,
        }
    }

    pub fn message_top(&self) -> f32 {
        self.center().1 + self.height * MESSAGE_OFFSET
    }

    /// Masks fill the whole panel.
    pub fn mask_size(&self) -> (u32, u32) {
        (self.width.max(1.0) as u32, self.height.max(1.0) as u32)
    }

    pub fn stimulus_size(&self) -> (u32, u32) {
        (
            (self.width * STIMULUS_WIDTH).max(1.0) as u32,
            (self.height * STIMULUS_HEIGHT).max(1.0) as u32,
        )
    }
}
