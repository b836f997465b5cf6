use serde::{Deserialize, Serialize};

/// The four logical keys the engine consumes. The host maps physical
/// input onto these.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKey {
    /// Confirm / detection response.
    Space,
    /// Stimulus seen in the top row.
    A,
    /// Stimulus seen in the bottom row.
    Z,
    /// Abort the block.
    Q,
}

impl ResponseKey {
    pub fn is_abort(&self) -> bool {
        matches!(self, ResponseKey::Q)
    }

    pub fn is_position(&self) -> bool {
        matches!(self, ResponseKey::A | ResponseKey::Z)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKey::Space => "space",
            ResponseKey::A => "a",
            ResponseKey::Z => "z",
            ResponseKey::Q => "q",
        }
    }
}

impl std::fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponseKey {
    type Err = crate::ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "space" => Ok(ResponseKey::Space),
            "a" => Ok(ResponseKey::A),
            "z" => Ok(ResponseKey::Z),
            "q" => Ok(ResponseKey::Q),
            _ => Err(crate::ParseFieldError::new("response_key", s)),
        }
    }
}
