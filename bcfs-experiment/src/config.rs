use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use bcfs_core::{BlockKind, Side};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ConfigError, ValidationError};

/// Step of the stimulus alpha ramp.
pub const UPDATE_INTERVAL_MS: u64 = 50;
/// Minimum gap between two accepted key presses.
pub const DEBOUNCE_MS: u64 = 200;
pub const BLEND_DURATION_RANGE_MS: RangeInclusive<u64> = 3_000..=100_000;
pub const MASK_CYCLE_RANGE_MS: RangeInclusive<u64> = 17..=10_000;
pub const DEFAULT_ITI_MESSAGE: &str = "Press SPACE to continue";

/// Parameters of one block. Built once by the configuration layer and
/// read-only while the block runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub kind: BlockKind,
    pub trials_total: usize,
    pub blend_duration_ms: u64,
    pub mask_cycle_ms: u64,
    pub update_interval_ms: u64,
    /// Side the mask starts on; the stimulus takes the other one.
    pub initial_suppressor_side: Side,
    pub switch_enabled: bool,
    pub switch_after_trial: usize,
    pub reverse_alpha: bool,
    pub debounce_ms: u64,
    pub iti_delay_ms: u64,
    pub iti_message_text: String,
    /// Mask side per practice trial, cycled when shorter than the block.
    pub practice_side_sequence: Vec<Side>,
    pub participant_id: String,
}

impl SessionConfig {
    pub fn main(participant_id: impl Into<String>, trials_total: usize) -> Self {
        Self {
            kind: BlockKind::Main,
            trials_total,
            blend_duration_ms: 10_000,
            mask_cycle_ms: 100,
            update_interval_ms: UPDATE_INTERVAL_MS,
            initial_suppressor_side: Side::Left,
            switch_enabled: false,
            switch_after_trial: 0,
            reverse_alpha: false,
            debounce_ms: DEBOUNCE_MS,
            iti_delay_ms: 500,
            iti_message_text: DEFAULT_ITI_MESSAGE.to_string(),
            practice_side_sequence: Vec::new(),
            participant_id: participant_id.into(),
        }
    }

    pub fn practice(
        participant_id: impl Into<String>,
        trials_total: usize,
        side_sequence: Vec<Side>,
    ) -> Self {
        let first = side_sequence.first().copied().unwrap_or_default();
        Self {
            kind: BlockKind::Practice,
            initial_suppressor_side: first,
            practice_side_sequence: side_sequence,
            ..Self::main(participant_id, trials_total)
        }
    }

    pub fn is_practice(&self) -> bool {
        self.kind.is_practice()
    }

    /// Config of the main block that follows an auto-progressed practice
    /// block: the estimated side, no switch, no practice sequence.
    pub fn handoff_main(&self, suppressor_side: Side) -> Self {
        Self {
            kind: BlockKind::Main,
            initial_suppressor_side: suppressor_side,
            switch_enabled: false,
            switch_after_trial: 0,
            practice_side_sequence: Vec::new(),
            ..self.clone()
        }
    }

    /// Mask side for the zero-based trial index within the block, before any
    /// one-time switch is applied.
    pub fn scheduled_side(&self, trial_index: usize) -> Side {
        if self.is_practice() && !self.practice_side_sequence.is_empty() {
            self.practice_side_sequence[trial_index % self.practice_side_sequence.len()]
        } else {
            self.initial_suppressor_side
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.participant_id.trim().is_empty() {
            return Err(ValidationError::MissingParticipant);
        }
        if self.trials_total < 1 {
            return Err(ValidationError::NoTrials);
        }
        if !BLEND_DURATION_RANGE_MS.contains(&self.blend_duration_ms) {
            return Err(ValidationError::BlendDuration {
                got: self.blend_duration_ms,
                min: *BLEND_DURATION_RANGE_MS.start(),
                max: *BLEND_DURATION_RANGE_MS.end(),
            });
        }
        if !MASK_CYCLE_RANGE_MS.contains(&self.mask_cycle_ms) {
            return Err(ValidationError::MaskCycle {
                got: self.mask_cycle_ms,
                min: *MASK_CYCLE_RANGE_MS.start(),
                max: *MASK_CYCLE_RANGE_MS.end(),
            });
        }
        if self.switch_enabled
            && (self.switch_after_trial < 1 || self.switch_after_trial >= self.trials_total)
        {
            return Err(ValidationError::SwitchTrial {
                switch_after: self.switch_after_trial,
                trials_total: self.trials_total,
            });
        }
        if self.is_practice() {
            if self.practice_side_sequence.is_empty() {
                return Err(ValidationError::EmptySideSequence);
            }
            if self.switch_enabled {
                return Err(ValidationError::SwitchInPractice);
            }
        }
        Ok(())
    }
}

/// 5 left, 5 right, 5 left, 5 right.
pub fn default_practice_sequence() -> Vec<Side> {
    [Side::Left, Side::Right, Side::Left, Side::Right]
        .into_iter()
        .flat_map(|side| std::iter::repeat_n(side, 5))
        .collect()
}

/// On-disk experiment settings (`config.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub participant_id: String,
    #[serde(deserialize_with = "count_or_string")]
    pub trials_total: usize,
    pub practice_enabled: bool,
    #[serde(deserialize_with = "count_or_string")]
    pub practice_trials: usize,
    /// Run the main block straight after practice instead of returning to
    /// configuration.
    pub auto_progress: bool,
    #[serde(alias = "blend_duration")]
    pub blend_duration_ms: u64,
    #[serde(alias = "cycle_time")]
    pub mask_cycle_ms: u64,
    pub mask_position: Side,
    pub switch_enabled: bool,
    pub switch_after_trial: usize,
    #[serde(alias = "alpha_reverse")]
    pub reverse_alpha: bool,
    #[serde(alias = "iti_message_delay")]
    pub iti_delay_ms: u64,
    pub iti_message: String,
    pub standby_ms: u64,
    pub practice_side_sequence: Vec<Side>,
    pub mask_dir: PathBuf,
    pub stim_dir: PathBuf,
    pub practice_stim_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub font_path: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            participant_id: "anonymous".to_string(),
            trials_total: 5,
            practice_enabled: false,
            practice_trials: 20,
            auto_progress: true,
            blend_duration_ms: 10_000,
            mask_cycle_ms: 100,
            mask_position: Side::Left,
            switch_enabled: false,
            switch_after_trial: 0,
            reverse_alpha: false,
            iti_delay_ms: 500,
            iti_message: DEFAULT_ITI_MESSAGE.to_string(),
            standby_ms: 2_000,
            practice_side_sequence: default_practice_sequence(),
            mask_dir: PathBuf::from("masks"),
            stim_dir: PathBuf::from("stimuli"),
            practice_stim_dir: None,
            output_dir: PathBuf::from("."),
            font_path: None,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(practice) = self.practice_block() {
            practice.validate()?;
        }
        self.main_block().validate()
    }

    pub fn practice_block(&self) -> Option<SessionConfig> {
        if !self.practice_enabled {
            return None;
        }
        let mut config = SessionConfig::practice(
            self.participant_id.clone(),
            self.practice_trials,
            self.practice_side_sequence.clone(),
        );
        self.apply_shared(&mut config);
        Some(config)
    }

    pub fn main_block(&self) -> SessionConfig {
        let mut config = SessionConfig::main(self.participant_id.clone(), self.trials_total);
        config.initial_suppressor_side = self.mask_position;
        config.switch_enabled = self.switch_enabled;
        config.switch_after_trial = self.switch_after_trial;
        self.apply_shared(&mut config);
        config
    }

    /// Stimulus directory for a block; practice falls back to the main set.
    pub fn stimulus_dir(&self, kind: BlockKind) -> &Path {
        match (kind, &self.practice_stim_dir) {
            (BlockKind::Practice, Some(dir)) => dir,
            _ => &self.stim_dir,
        }
    }

    fn apply_shared(&self, config: &mut SessionConfig) {
        config.blend_duration_ms = self.blend_duration_ms;
        config.mask_cycle_ms = self.mask_cycle_ms;
        config.reverse_alpha = self.reverse_alpha;
        config.iti_delay_ms = self.iti_delay_ms;
        config.iti_message_text = self.iti_message.clone();
    }
}

/// Accepts `5` as well as `"5"`; older config files stored the trial count
/// as the raw text of an entry field.
fn count_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(usize),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
