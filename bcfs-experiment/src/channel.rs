//! The two visual halves of a trial: a rapidly cycling mask and a slowly
//! blended stimulus.
//!
//! Both animate through chains of scheduler tasks; neither ever blocks.

use bcfs_core::{Side, StimulusRow};
use bcfs_timing::{Scheduler, TimerHandle, ms_to_ns};
use rand::Rng;
use tracing::debug;

use crate::display::Display;
use crate::task::EngineTask;

/// Upper bound of the stimulus blend weight.
pub const ALPHA_MAX: f32 = 0.99;
pub const ALPHA_MIN: f32 = 0.0;

/// Capability shared by both channels.
pub trait Channel {
    type Snapshot;

    fn start(&mut self, now_ns: u64, timers: &mut Scheduler<EngineTask>, display: &mut dyn Display);
    fn stop(&mut self, timers: &mut Scheduler<EngineTask>, display: &mut dyn Display) -> Self::Snapshot;
    fn is_running(&self) -> bool;
    fn side(&self) -> Side;
    fn set_side(&mut self, side: Side);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    pub running: bool,
    pub current_index: usize,
    pub side: Side,
}

pub struct MaskChannel {
    state: ChannelState,
    frames: usize,
    cycle_ms: u64,
    pending: Option<TimerHandle>,
}

impl MaskChannel {
    pub fn new(frames: usize, cycle_ms: u64, side: Side) -> Self {
        Self {
            state: ChannelState {
                running: false,
                current_index: 0,
                side,
            },
            frames: frames.max(1),
            cycle_ms,
            pending: None,
        }
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Shows the current frame and chains the next one `cycle_ms` after the
    /// deadline this tick was due at.
    pub fn tick(
        &mut self,
        deadline_ns: u64,
        now_ns: u64,
        timers: &mut Scheduler<EngineTask>,
        display: &mut dyn Display,
    ) {
        if !self.state.running {
            return;
        }
        display.show_mask_frame(self.state.side, self.state.current_index);
        self.state.current_index = (self.state.current_index + 1) % self.frames;
        self.pending = Some(timers.after_from(
            deadline_ns,
            now_ns,
            ms_to_ns(self.cycle_ms),
            EngineTask::MaskFrame,
        ));
    }
}

impl Channel for MaskChannel {
    type Snapshot = ();

    fn start(&mut self, now_ns: u64, timers: &mut Scheduler<EngineTask>, _display: &mut dyn Display) {
        if let Some(handle) = self.pending.take() {
            timers.cancel(handle);
        }
        self.state.running = true;
        self.pending = Some(timers.after(now_ns, 0, EngineTask::MaskFrame));
    }

    fn stop(&mut self, timers: &mut Scheduler<EngineTask>, display: &mut dyn Display) {
        self.state.running = false;
        if let Some(handle) = self.pending.take() {
            timers.cancel(handle);
        }
        display.clear_side(self.state.side);
    }

    fn is_running(&self) -> bool {
        self.state.running
    }

    fn side(&self) -> Side {
        self.state.side
    }

    fn set_side(&mut self, side: Side) {
        self.state.side = side;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Fade in from 0 towards 0.99.
    #[default]
    Forward,
    /// Fade out from 0.99 towards 0.
    Reverse,
}

impl Direction {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    fn initial_alpha(&self) -> f32 {
        match self {
            Direction::Forward => ALPHA_MIN,
            Direction::Reverse => ALPHA_MAX,
        }
    }
}

/// Row and image of the trial a stimulus channel was showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusSnapshot {
    pub row: StimulusRow,
    pub image_reference: String,
}

/// Outcome of one blend step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Idle,
    Continuing,
    /// The ramp reached its boundary and the channel stopped itself.
    Finished,
}

pub struct StimulusChannel<R: Rng> {
    state: ChannelState,
    alpha: f32,
    direction: Direction,
    row: StimulusRow,
    references: Vec<String>,
    blend_duration_ms: u64,
    update_interval_ms: u64,
    started_ns: u64,
    steps_taken: u64,
    pending: Option<TimerHandle>,
    rng: R,
}

impl<R: Rng> StimulusChannel<R> {
    pub fn new(
        references: Vec<String>,
        blend_duration_ms: u64,
        update_interval_ms: u64,
        direction: Direction,
        side: Side,
        rng: R,
    ) -> Self {
        let last = references.len().saturating_sub(1);
        Self {
            // Parked on the last image so the first trial advances to image 0.
            state: ChannelState {
                running: false,
                current_index: last,
                side,
            },
            alpha: direction.initial_alpha(),
            direction,
            row: StimulusRow::Unknown,
            references,
            blend_duration_ms: blend_duration_ms.max(1),
            update_interval_ms: update_interval_ms.max(1),
            started_ns: 0,
            steps_taken: 0,
            pending: None,
            rng,
        }
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn row(&self) -> StimulusRow {
        self.row
    }

    pub fn alpha_delta(&self) -> f32 {
        self.update_interval_ms as f32 / self.blend_duration_ms as f32
    }

    pub fn snapshot(&self) -> StimulusSnapshot {
        StimulusSnapshot {
            row: self.row,
            image_reference: self
                .references
                .get(self.state.current_index)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Sets the blend weight for every step slot elapsed since the ramp
    /// started and redraws. A late step catches up on the slots it missed.
    /// Stops the ramp, leaving the image frozen on screen, once the boundary
    /// is reached; otherwise chains the next step one interval after the
    /// current slot.
    pub fn step(
        &mut self,
        deadline_ns: u64,
        now_ns: u64,
        timers: &mut Scheduler<EngineTask>,
        display: &mut dyn Display,
    ) -> StepResult {
        if !self.state.running {
            return StepResult::Idle;
        }
        let interval_ns = ms_to_ns(self.update_interval_ms);
        let elapsed_steps = now_ns.saturating_sub(self.started_ns) / interval_ns;
        let steps = elapsed_steps.max(self.steps_taken);
        if steps > self.steps_taken + 1 {
            debug!(
                missed = steps - self.steps_taken - 1,
                "stimulus step ran late, catching up"
            );
        }
        self.steps_taken = steps;

        let progress = steps as f32 * self.alpha_delta();
        let keep_going = match self.direction {
            Direction::Forward => {
                self.alpha = (ALPHA_MIN + progress).min(ALPHA_MAX);
                self.alpha < ALPHA_MAX
            }
            Direction::Reverse => {
                self.alpha = (ALPHA_MAX - progress).max(ALPHA_MIN);
                self.alpha > ALPHA_MIN
            }
        };
        self.render(display);

        if keep_going {
            // The slot is never after now, so the next step is never due at once.
            let slot_ns = self
                .started_ns
                .saturating_add(steps * interval_ns)
                .max(deadline_ns);
            self.pending = Some(timers.after_from(
                slot_ns,
                now_ns,
                interval_ns,
                EngineTask::StimulusStep,
            ));
            return StepResult::Continuing;
        }
        self.state.running = false;
        if let Some(handle) = self.pending.take() {
            timers.cancel(handle);
        }
        debug!(alpha = self.alpha, steps, "stimulus ramp complete");
        StepResult::Finished
    }

    fn render(&self, display: &mut dyn Display) {
        display.show_stimulus(self.state.side, self.state.current_index, self.row, self.alpha);
    }
}

impl<R: Rng> Channel for StimulusChannel<R> {
    type Snapshot = StimulusSnapshot;

    fn start(&mut self, now_ns: u64, timers: &mut Scheduler<EngineTask>, display: &mut dyn Display) {
        if let Some(handle) = self.pending.take() {
            timers.cancel(handle);
        }
        self.row = if self.rng.random_bool(0.5) {
            StimulusRow::Top
        } else {
            StimulusRow::Bottom
        };
        self.alpha = self.direction.initial_alpha();
        self.state.current_index = (self.state.current_index + 1) % self.references.len().max(1);
        self.state.running = true;
        self.started_ns = now_ns;
        self.steps_taken = 0;
        self.render(display);
        self.pending = Some(timers.after(
            now_ns,
            ms_to_ns(self.update_interval_ms),
            EngineTask::StimulusStep,
        ));
    }

    fn stop(&mut self, timers: &mut Scheduler<EngineTask>, display: &mut dyn Display) -> StimulusSnapshot {
        self.state.running = false;
        if let Some(handle) = self.pending.take() {
            timers.cancel(handle);
        }
        display.clear_side(self.state.side);
        self.snapshot()
    }

    fn is_running(&self) -> bool {
        self.state.running
    }

    fn side(&self) -> Side {
        self.state.side
    }

    fn set_side(&mut self, side: Side) {
        self.state.side = side;
    }
}
