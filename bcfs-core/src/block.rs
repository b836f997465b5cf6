use serde::{Deserialize, Serialize};

/// The two blocks a session can run, in order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Practice,
    #[default]
    Main,
}

impl BlockKind {
    pub fn next(&self) -> Option<Self> {
        match self {
            BlockKind::Practice => Some(BlockKind::Main),
            BlockKind::Main => None,
        }
    }

    pub fn is_practice(&self) -> bool {
        matches!(self, BlockKind::Practice)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::Practice => "practice",
            BlockKind::Main => "main",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
