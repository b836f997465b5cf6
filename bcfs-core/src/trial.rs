use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ResponseKey, Side, StimulusRow};

/// Literal written in place of a value that could not be measured.
pub const NOT_AVAILABLE: &str = "N/A";

/// Failure to parse one transcript field back into its typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFieldError {
    pub field: &'static str,
    pub value: String,
}

impl ParseFieldError {
    pub fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for ParseFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} value {:?}", self.field, self.value)
    }
}

impl std::error::Error for ParseFieldError {}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialType {
    Practice,
    Main,
    /// A position key pressed while the inter-trial message was up.
    #[serde(rename = "ITI")]
    Iti,
}

impl TrialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialType::Practice => "Practice",
            TrialType::Main => "Main",
            TrialType::Iti => "ITI",
        }
    }
}

impl std::fmt::Display for TrialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrialType {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Practice" | "practice" => Ok(TrialType::Practice),
            "Main" | "main" => Ok(TrialType::Main),
            "ITI" | "iti" => Ok(TrialType::Iti),
            _ => Err(ParseFieldError::new("trial_type", s)),
        }
    }
}

/// Reaction time in milliseconds, or `NotAvailable` when the trial start
/// timestamp was missing.
#[derive(Copy, Debug, Clone, PartialEq, Default)]
pub enum ReactionTime {
    Measured(f64),
    #[default]
    NotAvailable,
}

impl ReactionTime {
    pub fn from_ns(elapsed_ns: u64) -> Self {
        ReactionTime::Measured(elapsed_ns as f64 / 1_000_000.0)
    }

    pub fn as_ms(&self) -> Option<f64> {
        match self {
            ReactionTime::Measured(ms) => Some(*ms),
            ReactionTime::NotAvailable => None,
        }
    }
}

impl std::fmt::Display for ReactionTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReactionTime::Measured(ms) => write!(f, "{ms}"),
            ReactionTime::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl std::str::FromStr for ReactionTime {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == NOT_AVAILABLE {
            return Ok(ReactionTime::NotAvailable);
        }
        s.parse::<f64>()
            .map(ReactionTime::Measured)
            .map_err(|_| ParseFieldError::new("reaction_time_ms", s))
    }
}

/// 1 when the position key matched the stimulus row, 0 otherwise.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Accuracy {
    Incorrect,
    Correct,
    #[default]
    NotAvailable,
}

impl Accuracy {
    /// A is credited for the top row and Z for the bottom row. Every other
    /// combination, Space included, scores 0.
    pub fn score(key: ResponseKey, row: StimulusRow) -> Self {
        match (key, row) {
            (ResponseKey::A, StimulusRow::Top) | (ResponseKey::Z, StimulusRow::Bottom) => {
                Accuracy::Correct
            }
            _ => Accuracy::Incorrect,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, Accuracy::Correct)
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Accuracy::Incorrect => Some(0),
            Accuracy::Correct => Some(1),
            Accuracy::NotAvailable => None,
        }
    }
}

impl std::fmt::Display for Accuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_u8() {
            Some(v) => write!(f, "{v}"),
            None => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl std::str::FromStr for Accuracy {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Accuracy::Correct),
            "0" => Ok(Accuracy::Incorrect),
            NOT_AVAILABLE => Ok(Accuracy::NotAvailable),
            _ => Err(ParseFieldError::new("accuracy", s)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SentinelRepr {
    Number(f64),
    Text(String),
}

impl Serialize for ReactionTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReactionTime::Measured(ms) => serializer.serialize_f64(*ms),
            ReactionTime::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for ReactionTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match SentinelRepr::deserialize(deserializer)? {
            SentinelRepr::Number(ms) => Ok(ReactionTime::Measured(ms)),
            SentinelRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for Accuracy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_u8() {
            Some(v) => serializer.serialize_u8(v),
            None => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Accuracy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match SentinelRepr::deserialize(deserializer)? {
            SentinelRepr::Number(v) if v == 1.0 => Ok(Accuracy::Correct),
            SentinelRepr::Number(v) if v == 0.0 => Ok(Accuracy::Incorrect),
            SentinelRepr::Number(v) => Err(serde::de::Error::custom(format!(
                "invalid accuracy value {v}"
            ))),
            SentinelRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// One row of the trial transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_number: usize,
    pub trial_type: TrialType,
    pub suppressor_side: Side,
    pub stimulus_row: StimulusRow,
    pub image_reference: String,
    pub reaction_time_ms: ReactionTime,
    pub response_key: ResponseKey,
    pub accuracy: Accuracy,
}
