//! Eye-dominance estimate from practice reaction times.
//!
//! The side whose mask produced the slower accurate detections is the weaker
//! eye; the main block suppresses the other one.

use bcfs_core::{Side, TrialRecord, TrialType};

/// Practice trials a side needs before its mean is trusted.
pub const MIN_TRIALS_PER_SIDE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SideSummary {
    /// Practice trials run with the mask on this side.
    pub trials: usize,
    /// Accurate trials with a measured RT, warm-up excluded.
    pub qualifying: usize,
    /// Zero when nothing qualified.
    pub mean_rt_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DominanceAnalysis {
    pub left: SideSummary,
    pub right: SideSummary,
}

impl DominanceAnalysis {
    pub fn side(&self, side: Side) -> &SideSummary {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn sufficient(&self) -> bool {
        self.left.trials >= MIN_TRIALS_PER_SIDE && self.right.trials >= MIN_TRIALS_PER_SIDE
    }

    /// Side the main block should suppress, or `None` when there is too
    /// little data or the means are equal.
    pub fn suppress(&self) -> Option<Side> {
        if !self.sufficient() {
            return None;
        }
        let (left, right) = (self.left.mean_rt_ms, self.right.mean_rt_ms);
        if left > right {
            Some(Side::Right)
        } else if right > left {
            Some(Side::Left)
        } else {
            None
        }
    }
}

pub fn analyse(records: &[TrialRecord]) -> DominanceAnalysis {
    DominanceAnalysis {
        left: summarise(records, Side::Left),
        right: summarise(records, Side::Right),
    }
}

pub fn estimate(records: &[TrialRecord]) -> Option<Side> {
    analyse(records).suppress()
}

fn summarise(records: &[TrialRecord], side: Side) -> SideSummary {
    let trials: Vec<&TrialRecord> = records
        .iter()
        .filter(|r| r.trial_type == TrialType::Practice && r.suppressor_side == side)
        .collect();

    let rts: Vec<f64> = trials
        .iter()
        .skip(1)
        .filter(|r| r.accuracy.is_correct())
        .filter_map(|r| r.reaction_time_ms.as_ms())
        .collect();

    let mean_rt_ms = if rts.is_empty() {
        0.0
    } else {
        rts.iter().sum::<f64>() / rts.len() as f64
    };

    SideSummary {
        trials: trials.len(),
        qualifying: rts.len(),
        mean_rt_ms,
    }
}
