use serde::{Deserialize, Serialize};

use crate::ParseFieldError;

/// Screen half a channel is shown on.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            _ => Err(ParseFieldError::new("side", s)),
        }
    }
}

/// Vertical slot the stimulus is drawn in for one trial.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusRow {
    Top,
    Bottom,
    #[default]
    Unknown,
}

impl StimulusRow {
    pub fn as_str(&self) -> &'static str {
        match self {
            StimulusRow::Top => "top",
            StimulusRow::Bottom => "bottom",
            StimulusRow::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StimulusRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StimulusRow {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(StimulusRow::Top),
            "bottom" => Ok(StimulusRow::Bottom),
            "unknown" => Ok(StimulusRow::Unknown),
            _ => Err(ParseFieldError::new("stimulus_row", s)),
        }
    }
}
