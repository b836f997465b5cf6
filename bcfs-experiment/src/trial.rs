use bcfs_core::{Side, StimulusRow};

use crate::channel::StimulusSnapshot;

/// The trial currently on screen.
#[derive(Debug, Clone)]
pub struct ActiveTrial {
    pub number: usize,
    pub suppressor_side: Side,
    pub row: StimulusRow,
    pub timestamps: TrialTimestamps,
}

#[derive(Debug, Clone, Default)]
pub struct TrialTimestamps {
    pub start: Option<u64>,
    pub response: Option<u64>,
}

/// What is left over from the previous trial while the inter-trial message
/// is pending or shown.
#[derive(Debug, Clone)]
pub struct InterTrial {
    pub trial_number: usize,
    pub suppressor_side: Side,
    pub last: StimulusSnapshot,
    pub message_shown_at: Option<u64>,
}
