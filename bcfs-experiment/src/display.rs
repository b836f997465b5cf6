use bcfs_core::{Side, StimulusRow};

/// Drawing surface the channels render through. Each screen half shows at
/// most one image at a time; drawing on a side replaces what was there.
pub trait Display {
    fn show_mask_frame(&mut self, side: Side, frame: usize);
    /// Draws stimulus image `image` in `row`, blended over the background
    /// with weight `alpha`.
    fn show_stimulus(&mut self, side: Side, image: usize, row: StimulusRow, alpha: f32);
    fn clear_side(&mut self, side: Side);
    fn show_message(&mut self, text: &str);
    fn clear_message(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOp {
    Mask { side: Side, frame: usize },
    Stimulus { side: Side, image: usize, row: StimulusRow, alpha: f32 },
    Clear(Side),
    Message(String),
    ClearMessage,
}

/// Display that only remembers what it was asked to draw.
#[derive(Debug, Default, Clone)]
pub struct RecordingDisplay {
    pub ops: Vec<DisplayOp>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alphas(&self) -> Vec<f32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DisplayOp::Stimulus { alpha, .. } => Some(*alpha),
                _ => None,
            })
            .collect()
    }

    pub fn mask_frames(&self) -> Vec<(Side, usize)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DisplayOp::Mask { side, frame } => Some((*side, *frame)),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DisplayOp::Message(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Display for RecordingDisplay {
    fn show_mask_frame(&mut self, side: Side, frame: usize) {
        self.ops.push(DisplayOp::Mask { side, frame });
    }

    fn show_stimulus(&mut self, side: Side, image: usize, row: StimulusRow, alpha: f32) {
        self.ops.push(DisplayOp::Stimulus {
            side,
            image,
            row,
            alpha,
        });
    }

    fn clear_side(&mut self, side: Side) {
        self.ops.push(DisplayOp::Clear(side));
    }

    fn show_message(&mut self, text: &str) {
        self.ops.push(DisplayOp::Message(text.to_string()));
    }

    fn clear_message(&mut self) {
        self.ops.push(DisplayOp::ClearMessage);
    }
}
