#![allow(dead_code)]

use std::path::PathBuf;

use bcfs_core::{ResponseKey, StimulusRow};
use bcfs_experiment::{ControllerEvent, ImageSet, RecordingDisplay, SessionEvent, TrialController};
use bcfs_timing::ManualTimer;
use rand::rngs::StdRng;

pub const STEP_MS: u64 = 10;

pub fn images(prefix: &str, n: usize) -> ImageSet {
    let paths: Vec<PathBuf> = (0..n).map(|i| PathBuf::from(format!("{prefix}{i}.png"))).collect();
    ImageSet::from_paths(paths).unwrap()
}

pub fn correct_key(row: StimulusRow) -> ResponseKey {
    match row {
        StimulusRow::Top => ResponseKey::A,
        _ => ResponseKey::Z,
    }
}

pub fn wrong_key(row: StimulusRow) -> ResponseKey {
    match row {
        StimulusRow::Top => ResponseKey::Z,
        _ => ResponseKey::A,
    }
}

/// Advances the clock in small steps, firing due timers after each one.
pub fn run_for(
    controller: &mut TrialController<ManualTimer, StdRng>,
    timer: &ManualTimer,
    display: &mut RecordingDisplay,
    ms: u64,
) -> Vec<ControllerEvent> {
    let mut events = Vec::new();
    for _ in 0..ms / STEP_MS {
        timer.advance_ms(STEP_MS);
        events.extend(controller.on_timer(display));
    }
    events
}

pub fn started_row(events: &[ControllerEvent]) -> Option<StimulusRow> {
    events.iter().find_map(|e| match e {
        ControllerEvent::TrialStarted { row, .. } => Some(*row),
        _ => None,
    })
}

pub fn session_started_row(events: &[SessionEvent]) -> Option<StimulusRow> {
    events.iter().find_map(|e| match e {
        SessionEvent::Trial(ControllerEvent::TrialStarted { row, .. }) => Some(*row),
        _ => None,
    })
}
