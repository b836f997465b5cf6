use bcfs_core::{Accuracy, ReactionTime, ResponseKey, Side, StimulusRow, TrialRecord, TrialType};
use bcfs_timing::{Scheduler, Timer, ms_to_ns};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::channel::{Channel, Direction, MaskChannel, StepResult, StimulusChannel};
use crate::config::SessionConfig;
use crate::display::Display;
use crate::error::ValidationError;
use crate::images::ImageSet;
use crate::task::EngineTask;
use crate::trial::{ActiveTrial, InterTrial, TrialTimestamps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// No channels running; the first key begins a trial.
    AwaitingStart,
    /// Both channels running.
    Presenting,
    /// Channels stopped, ITI message pending or shown.
    InterTrial,
    /// `trials_total` reached. Only abort is honoured.
    SessionComplete,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    InputDebounced {
        key: ResponseKey,
    },
    InputIgnored {
        key: ResponseKey,
    },
    TrialStarted {
        trial_number: usize,
        suppressor_side: Side,
        row: StimulusRow,
    },
    TrialCompleted(TrialRecord),
    ItiLogged(TrialRecord),
    SuppressorSwitched {
        mask_side: Side,
        stimulus_side: Side,
    },
    ItiMessageShown,
    StimulusRampFinished,
    BlockComplete,
    Aborted,
}

/// Mutable bookkeeping of one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub trial_count: usize,
    pub records: Vec<TrialRecord>,
    pub last_accepted_input_ns: Option<u64>,
    pub switch_applied: bool,
}

/// Drives one block: owns the channels, their timers and the transcript.
pub struct TrialController<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    config: SessionConfig,
    timer: T,
    timers: Scheduler<EngineTask>,
    mask: MaskChannel,
    stimulus: StimulusChannel<R>,
    state: SessionState,
    phase: ControllerPhase,
    current: Option<ActiveTrial>,
    inter_trial: Option<InterTrial>,
}

impl<T, R> TrialController<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(
        config: SessionConfig,
        masks: &ImageSet,
        stimuli: &ImageSet,
        timer: T,
        rng: R,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let mask_side = config.scheduled_side(0);
        let mask = MaskChannel::new(masks.len(), config.mask_cycle_ms, mask_side);
        let stimulus = StimulusChannel::new(
            stimuli.references(),
            config.blend_duration_ms,
            config.update_interval_ms,
            Direction::from_reverse(config.reverse_alpha),
            mask_side.opposite(),
            rng,
        );
        info!(
            block = %config.kind,
            trials = config.trials_total,
            mask_side = %mask_side,
            "block ready"
        );
        Ok(Self {
            config,
            timer,
            timers: Scheduler::new(),
            mask,
            stimulus,
            state: SessionState::default(),
            phase: ControllerPhase::AwaitingStart,
            current: None,
            inter_trial: None,
        })
    }

    pub fn handle_key(&mut self, key: ResponseKey, display: &mut dyn Display) -> Vec<ControllerEvent> {
        let now = self.timer.now();

        if key.is_abort() {
            return self.abort(display);
        }
        if matches!(
            self.phase,
            ControllerPhase::SessionComplete | ControllerPhase::Aborted
        ) {
            return vec![ControllerEvent::InputIgnored { key }];
        }
        if let Some(last) = self.state.last_accepted_input_ns {
            if now.saturating_sub(last) < ms_to_ns(self.config.debounce_ms) {
                debug!(%key, since_ns = now.saturating_sub(last), "debounced");
                return vec![ControllerEvent::InputDebounced { key }];
            }
        }
        self.state.last_accepted_input_ns = Some(now);

        match self.phase {
            ControllerPhase::AwaitingStart => self.start_trial(now, display),
            ControllerPhase::InterTrial => {
                let mut events = Vec::new();
                if key.is_position() {
                    if let Some(record) = self.iti_record(key, now) {
                        info!(%key, accuracy = %record.accuracy, "ITI response logged");
                        self.state.records.push(record.clone());
                        events.push(ControllerEvent::ItiLogged(record));
                    }
                }
                events.extend(self.start_trial(now, display));
                events
            }
            ControllerPhase::Presenting => self.complete_trial(key, now, display),
            ControllerPhase::SessionComplete | ControllerPhase::Aborted => Vec::new(),
        }
    }

    /// Runs every timer task that has come due.
    pub fn on_timer(&mut self, display: &mut dyn Display) -> Vec<ControllerEvent> {
        let now = self.timer.now();
        let mut events = Vec::new();

        while let Some(due) = self.timers.pop_due(now) {
            match due.task {
                EngineTask::MaskFrame => {
                    self.mask
                        .tick(due.deadline_ns, now, &mut self.timers, display);
                }
                EngineTask::StimulusStep => {
                    if self
                        .stimulus
                        .step(due.deadline_ns, now, &mut self.timers, display)
                        == StepResult::Finished {
                        info!("stimulus reached full ramp without a response");
                        events.push(ControllerEvent::StimulusRampFinished);
                    }
                }
                EngineTask::ItiMessage => {
                    if let Some(iti) = self.inter_trial.as_mut() {
                        iti.message_shown_at = Some(now);
                        display.show_message(&self.config.iti_message_text);
                        events.push(ControllerEvent::ItiMessageShown);
                    }
                }
            }
        }
        events
    }

    /// Stops everything and cancels all pending timers. Records stay
    /// available for flushing.
    pub fn abort(&mut self, display: &mut dyn Display) -> Vec<ControllerEvent> {
        self.halt(display);
        self.phase = ControllerPhase::Aborted;
        warn!(
            block = %self.config.kind,
            completed = self.state.trial_count,
            records = self.state.records.len(),
            "block aborted"
        );
        vec![ControllerEvent::Aborted]
    }

    fn halt(&mut self, display: &mut dyn Display) {
        self.timers.cancel_all();
        if self.mask.is_running() {
            self.mask.stop(&mut self.timers, display);
        }
        if self.stimulus.is_running() || self.current.is_some() {
            self.stimulus.stop(&mut self.timers, display);
        }
        if self.inter_trial.take().is_some() {
            display.clear_message();
        }
        self.current = None;
    }

    fn start_trial(&mut self, now: u64, display: &mut dyn Display) -> Vec<ControllerEvent> {
        if self.inter_trial.take().is_some() {
            self.timers.cancel_all();
            display.clear_message();
        }

        self.mask.start(now, &mut self.timers, display);
        self.stimulus.start(now, &mut self.timers, display);

        let trial = ActiveTrial {
            number: self.state.trial_count + 1,
            suppressor_side: self.mask.side(),
            row: self.stimulus.row(),
            timestamps: TrialTimestamps {
                start: Some(now),
                response: None,
            },
        };
        info!(
            trial = trial.number,
            of = self.config.trials_total,
            suppressor = %trial.suppressor_side,
            row = %trial.row,
            image = %self.stimulus.snapshot().image_reference,
            "trial started"
        );
        let event = ControllerEvent::TrialStarted {
            trial_number: trial.number,
            suppressor_side: trial.suppressor_side,
            row: trial.row,
        };
        self.current = Some(trial);
        self.phase = ControllerPhase::Presenting;
        vec![event]
    }

    fn complete_trial(
        &mut self,
        key: ResponseKey,
        now: u64,
        display: &mut dyn Display,
    ) -> Vec<ControllerEvent> {
        self.mask.stop(&mut self.timers, display);
        let snapshot = self.stimulus.stop(&mut self.timers, display);

        let trial = self.current.take().map(|mut t| {
            t.timestamps.response = Some(now);
            t
        });
        let suppressor_side = trial
            .as_ref()
            .map_or(self.mask.side(), |t| t.suppressor_side);
        let timestamps = trial.as_ref().map(|t| &t.timestamps);
        let reaction_time = match timestamps.and_then(|ts| ts.start.zip(ts.response)) {
            Some((start, response)) => ReactionTime::from_ns(response.saturating_sub(start)),
            None => {
                warn!("trial start time missing, reaction time recorded as N/A");
                ReactionTime::NotAvailable
            }
        };

        self.state.trial_count += 1;
        let record = TrialRecord {
            trial_number: self.state.trial_count,
            trial_type: self.trial_type(),
            suppressor_side,
            stimulus_row: snapshot.row,
            image_reference: snapshot.image_reference.clone(),
            reaction_time_ms: reaction_time,
            response_key: key,
            accuracy: Accuracy::score(key, snapshot.row),
        };
        info!(
            trial = record.trial_number,
            %key,
            rt_ms = %record.reaction_time_ms,
            accuracy = %record.accuracy,
            "trial completed"
        );
        self.state.records.push(record.clone());

        let mut events = vec![ControllerEvent::TrialCompleted(record)];

        if self.state.trial_count >= self.config.trials_total {
            self.timers.cancel_all();
            self.phase = ControllerPhase::SessionComplete;
            info!(block = %self.config.kind, trials = self.state.trial_count, "block complete");
            events.push(ControllerEvent::BlockComplete);
            return events;
        }

        events.extend(self.update_sides());

        let handle = self
            .timers
            .after(now, ms_to_ns(self.config.iti_delay_ms), EngineTask::ItiMessage);
        debug!(handle = handle.id(), delay_ms = self.config.iti_delay_ms, "ITI message scheduled");
        self.inter_trial = Some(InterTrial {
            trial_number: self.state.trial_count,
            suppressor_side,
            last: snapshot,
            message_shown_at: None,
        });
        self.phase = ControllerPhase::InterTrial;
        events
    }

    /// Moves the channels to the sides the next trial should use: the
    /// practice sequence entry, or the one-time switch once its trial count
    /// is reached.
    fn update_sides(&mut self) -> Option<ControllerEvent> {
        let current = self.mask.side();
        let next = if self.config.is_practice() {
            self.config.scheduled_side(self.state.trial_count)
        } else if self.config.switch_enabled
            && !self.state.switch_applied
            && self.state.trial_count >= self.config.switch_after_trial
        {
            self.state.switch_applied = true;
            current.opposite()
        } else {
            current
        };

        if next == current {
            return None;
        }
        self.mask.set_side(next);
        self.stimulus.set_side(next.opposite());
        info!(
            after_trial = self.state.trial_count,
            mask = %next,
            stimulus = %next.opposite(),
            "suppressor side switched"
        );
        Some(ControllerEvent::SuppressorSwitched {
            mask_side: next,
            stimulus_side: next.opposite(),
        })
    }

    fn iti_record(&self, key: ResponseKey, now: u64) -> Option<TrialRecord> {
        let iti = self.inter_trial.as_ref()?;
        let shown_at = iti.message_shown_at?;
        Some(TrialRecord {
            trial_number: iti.trial_number,
            trial_type: TrialType::Iti,
            suppressor_side: iti.suppressor_side,
            stimulus_row: iti.last.row,
            image_reference: iti.last.image_reference.clone(),
            reaction_time_ms: ReactionTime::from_ns(now.saturating_sub(shown_at)),
            response_key: key,
            accuracy: Accuracy::score(key, iti.last.row),
        })
    }

    fn trial_type(&self) -> TrialType {
        if self.config.is_practice() {
            TrialType::Practice
        } else {
            TrialType::Main
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn trial_count(&self) -> usize {
        self.state.trial_count
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.state.records
    }

    pub fn into_records(self) -> Vec<TrialRecord> {
        self.state.records
    }

    pub fn take_records(&mut self) -> Vec<TrialRecord> {
        std::mem::take(&mut self.state.records)
    }

    pub fn mask_side(&self) -> Side {
        self.mask.side()
    }

    pub fn stimulus_side(&self) -> Side {
        self.stimulus.side()
    }

    pub fn switch_applied(&self) -> bool {
        self.state.switch_applied
    }

    pub fn is_presenting(&self) -> bool {
        self.mask.is_running()
    }

    pub fn stimulus_alpha(&self) -> f32 {
        self.stimulus.alpha()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.phase,
            ControllerPhase::SessionComplete | ControllerPhase::Aborted
        )
    }
}
