//! Sequences an optional practice block and the main block, including the
//! practice-to-main handoff driven by the dominance estimate.

use std::path::{Path, PathBuf};

use bcfs_core::{BlockKind, ResponseKey, Side, TrialRecord};
use bcfs_timing::{Timer, ms_to_ns};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::config::{ExperimentConfig, SessionConfig};
use crate::display::Display;
use crate::dominance::{self, DominanceAnalysis};
use crate::error::{SessionError, SetupError};
use crate::images::ImageSet;
use crate::state::{ControllerEvent, ControllerPhase, TrialController};
use crate::transcript::{self, TranscriptSink};

/// Shown between the practice and main blocks.
pub const STANDBY_MESSAGE: &str = "Main task starting...";

/// Which blocks to run and how to move between them.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub practice: Option<SessionConfig>,
    pub main: SessionConfig,
    /// Start the main block right after practice instead of returning to
    /// configuration.
    pub auto_progress: bool,
    pub standby_ms: u64,
}

impl SessionPlan {
    pub fn main_only(main: SessionConfig) -> Self {
        Self {
            practice: None,
            main,
            auto_progress: false,
            standby_ms: 2_000,
        }
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            practice: config.practice_block(),
            main: config.main_block(),
            auto_progress: config.auto_progress,
            standby_ms: config.standby_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionAssets {
    pub masks: ImageSet,
    pub stimuli: ImageSet,
    /// Falls back to `stimuli` when absent.
    pub practice_stimuli: Option<ImageSet>,
}

impl SessionAssets {
    pub fn load(config: &ExperimentConfig) -> Result<Self, SetupError> {
        let masks = ImageSet::from_dir(&config.mask_dir)?;
        let stimuli = ImageSet::from_dir(&config.stim_dir)?;
        let practice_stimuli = match &config.practice_stim_dir {
            Some(dir) if config.practice_enabled => Some(ImageSet::from_dir(dir)?),
            _ => None,
        };
        info!(
            masks = masks.len(),
            stimuli = stimuli.len(),
            practice_stimuli = practice_stimuli.as_ref().map(ImageSet::len),
            "image sets loaded"
        );
        Ok(Self {
            masks,
            stimuli,
            practice_stimuli,
        })
    }

    pub fn stimuli_for(&self, kind: BlockKind) -> &ImageSet {
        match (kind, &self.practice_stimuli) {
            (BlockKind::Practice, Some(set)) => set,
            _ => &self.stimuli,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BlockStarted {
        kind: BlockKind,
        suppressor_side: Side,
    },
    Trial(ControllerEvent),
    BlockFlushed {
        kind: BlockKind,
        path: Option<PathBuf>,
        records: usize,
    },
    FlushFailed {
        kind: BlockKind,
        error: String,
    },
    DominanceEstimated {
        suppress: Side,
        analysis: DominanceAnalysis,
    },
    /// Not enough practice data, or a tie; the configured side is kept.
    DominanceFallback {
        default: Side,
        analysis: DominanceAnalysis,
    },
    StandbyStarted {
        until_ns: u64,
    },
    ReturnToConfiguration {
        reason: ExitReason,
    },
}

enum Stage<T>
where
    T: Timer<Timestamp = u64>,
{
    Idle,
    Running(TrialController<T, StdRng>),
    Standby { until_ns: u64, next: SessionConfig },
    Finished(ExitReason),
}

pub struct SessionOrchestrator<S, T, R>
where
    S: TranscriptSink,
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    plan: SessionPlan,
    assets: SessionAssets,
    sink: S,
    timer: T,
    rng: R,
    stage: Stage<T>,
}

impl<S, T, R> SessionOrchestrator<S, T, R>
where
    S: TranscriptSink,
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(plan: SessionPlan, assets: SessionAssets, sink: S, timer: T, rng: R) -> Self {
        Self {
            plan,
            assets,
            sink,
            timer,
            rng,
            stage: Stage::Idle,
        }
    }

    /// Binds the first block: practice when configured, main otherwise.
    pub fn start(&mut self, display: &mut dyn Display) -> Result<Vec<SessionEvent>, SessionError> {
        if !matches!(self.stage, Stage::Idle) {
            return Err(SessionError::AlreadyStarted);
        }
        display.clear_message();
        let first = self
            .plan
            .practice
            .clone()
            .unwrap_or_else(|| self.plan.main.clone());
        Ok(vec![self.begin_block(first)?])
    }

    /// Starts the main block directly, estimating the suppressor side from a
    /// practice transcript written by an earlier run.
    pub fn resume_main(
        &mut self,
        practice_transcript: impl AsRef<Path>,
        display: &mut dyn Display,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if !matches!(self.stage, Stage::Idle) {
            return Err(SessionError::AlreadyStarted);
        }
        let path = practice_transcript.as_ref();
        let records = transcript::read_path(path)?;
        info!(path = %path.display(), records = records.len(), "resuming from practice transcript");

        display.clear_message();
        let (side, estimate) = self.choose_side(&records);
        let main = self.plan.main.handoff_main(side);
        Ok(vec![estimate, self.begin_block(main)?])
    }

    pub fn handle_key(&mut self, key: ResponseKey, display: &mut dyn Display) -> Vec<SessionEvent> {
        match &mut self.stage {
            Stage::Running(controller) => {
                let mut events = wrap(controller.handle_key(key, display));
                if controller.is_finished() {
                    events.extend(self.finish_block(display));
                }
                events
            }
            Stage::Standby { .. } if key.is_abort() => {
                display.clear_message();
                warn!("aborted during standby");
                vec![self.finish(ExitReason::Aborted)]
            }
            _ => {
                debug!(%key, "input ignored outside a block");
                Vec::new()
            }
        }
    }

    pub fn on_timer(&mut self, display: &mut dyn Display) -> Vec<SessionEvent> {
        let now = self.timer.now();
        match &mut self.stage {
            Stage::Running(controller) => wrap(controller.on_timer(display)),
            Stage::Standby { until_ns, next } if now >= *until_ns => {
                let next = next.clone();
                display.clear_message();
                self.enter_block(next)
            }
            _ => Vec::new(),
        }
    }

    /// Ends the session from outside the key path, e.g. the window closing.
    pub fn abort(&mut self, display: &mut dyn Display) -> Vec<SessionEvent> {
        match &mut self.stage {
            Stage::Running(controller) => {
                let mut events = wrap(controller.abort(display));
                events.extend(self.finish_block(display));
                events
            }
            Stage::Finished(_) => Vec::new(),
            Stage::Idle | Stage::Standby { .. } => {
                display.clear_message();
                vec![self.finish(ExitReason::Aborted)]
            }
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        match &self.stage {
            Stage::Running(controller) => controller.next_deadline(),
            Stage::Standby { until_ns, .. } => Some(*until_ns),
            Stage::Idle | Stage::Finished(_) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished(_))
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self.stage {
            Stage::Finished(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn in_standby(&self) -> bool {
        matches!(self.stage, Stage::Standby { .. })
    }

    pub fn controller(&self) -> Option<&TrialController<T, StdRng>> {
        match &self.stage {
            Stage::Running(controller) => Some(controller),
            _ => None,
        }
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn begin_block(&mut self, config: SessionConfig) -> Result<SessionEvent, SessionError> {
        let kind = config.kind;
        let stimuli = self.assets.stimuli_for(kind);
        let controller = TrialController::new(
            config,
            &self.assets.masks,
            stimuli,
            self.timer.clone(),
            StdRng::from_rng(&mut self.rng),
        )?;
        let suppressor_side = controller.mask_side();
        info!(block = %kind, suppressor = %suppressor_side, "block started");
        self.stage = Stage::Running(controller);
        Ok(SessionEvent::BlockStarted {
            kind,
            suppressor_side,
        })
    }

    fn enter_block(&mut self, config: SessionConfig) -> Vec<SessionEvent> {
        match self.begin_block(config) {
            Ok(event) => vec![event],
            Err(e) => {
                error!(error = %e, "could not start next block");
                vec![self.finish(ExitReason::Aborted)]
            }
        }
    }

    /// Flushes the block that just ended and decides what follows it.
    fn finish_block(&mut self, display: &mut dyn Display) -> Vec<SessionEvent> {
        let controller = match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Running(controller) => controller,
            other => {
                self.stage = other;
                return Vec::new();
            }
        };
        let aborted = controller.phase() == ControllerPhase::Aborted;
        let kind = controller.config().kind;
        let participant = controller.config().participant_id.clone();
        let records = controller.into_records();

        let mut events = vec![self.flush(kind, &participant, &records)];
        if aborted {
            events.push(self.finish(ExitReason::Aborted));
        } else if kind.is_practice() && self.plan.auto_progress {
            events.extend(self.hand_off(&records, display));
        } else {
            events.push(self.finish(ExitReason::Completed));
        }
        events
    }

    fn hand_off(&mut self, practice: &[TrialRecord], display: &mut dyn Display) -> Vec<SessionEvent> {
        display.clear_message();
        let (side, estimate) = self.choose_side(practice);
        let next = self.plan.main.handoff_main(side);

        let until_ns = self.timer.now().saturating_add(ms_to_ns(self.plan.standby_ms));
        display.show_message(STANDBY_MESSAGE);
        info!(suppressor = %side, standby_ms = self.plan.standby_ms, "handing off to main block");
        self.stage = Stage::Standby { until_ns, next };
        vec![estimate, SessionEvent::StandbyStarted { until_ns }]
    }

    fn choose_side(&self, practice: &[TrialRecord]) -> (Side, SessionEvent) {
        let analysis = dominance::analyse(practice);
        match analysis.suppress() {
            Some(suppress) => {
                info!(
                    %suppress,
                    left_mean_ms = analysis.left.mean_rt_ms,
                    right_mean_ms = analysis.right.mean_rt_ms,
                    "dominance estimated"
                );
                (suppress, SessionEvent::DominanceEstimated { suppress, analysis })
            }
            None => {
                let default = self.plan.main.initial_suppressor_side;
                warn!(
                    %default,
                    left_trials = analysis.left.trials,
                    right_trials = analysis.right.trials,
                    left_mean_ms = analysis.left.mean_rt_ms,
                    right_mean_ms = analysis.right.mean_rt_ms,
                    "dominance undetermined, keeping configured side"
                );
                (default, SessionEvent::DominanceFallback { default, analysis })
            }
        }
    }

    fn flush(&mut self, kind: BlockKind, participant: &str, records: &[TrialRecord]) -> SessionEvent {
        match self.sink.flush(kind, participant, records) {
            Ok(path) => SessionEvent::BlockFlushed {
                kind,
                path,
                records: records.len(),
            },
            Err(e) => {
                error!(block = %kind, error = %e, "failed to write transcript");
                SessionEvent::FlushFailed {
                    kind,
                    error: e.to_string(),
                }
            }
        }
    }

    fn finish(&mut self, reason: ExitReason) -> SessionEvent {
        info!(?reason, "returning to configuration");
        self.stage = Stage::Finished(reason);
        SessionEvent::ReturnToConfiguration { reason }
    }
}

fn wrap(events: Vec<ControllerEvent>) -> Vec<SessionEvent> {
    events.into_iter().map(SessionEvent::Trial).collect()
}
