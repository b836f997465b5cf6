//! Error taxonomy for block setup, configuration and transcript I/O.
//!
//! Runtime anomalies during a block (missing timestamps, late timers) are not
//! errors; they are absorbed where they happen and logged.

use std::path::PathBuf;

use thiserror::Error;

/// A block cannot start because its image material is unusable.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("image directory not found: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no .png/.jpg images in {}", .0.display())]
    NoImages(PathBuf),

    #[error("failed to list {}: {source}", dir.display())]
    Unreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An out-of-range session parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("trials_total must be at least 1")]
    NoTrials,

    #[error("blend duration {got}ms outside {min}..={max}ms")]
    BlendDuration { got: u64, min: u64, max: u64 },

    #[error("mask cycle {got}ms outside {min}..={max}ms")]
    MaskCycle { got: u64, min: u64, max: u64 },

    #[error("switch trial {switch_after} must be in 1..{trials_total}")]
    SwitchTrial {
        switch_after: usize,
        trials_total: usize,
    },

    #[error("practice block needs a non-empty side sequence")]
    EmptySideSequence,

    #[error("practice side sequence and one-time switch cannot be combined")]
    SwitchInPractice,

    #[error("participant id must not be empty")]
    MissingParticipant,
}

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("transcript I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("row {row}: {source}")]
    Field {
        row: usize,
        #[source]
        source: bcfs_core::ParseFieldError,
    },

    #[error("row {row}: expected {expected} columns, found {found}")]
    Columns {
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Anything that prevents the orchestrator from starting a block.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("session already started")]
    AlreadyStarted,
}
