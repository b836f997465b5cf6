pub mod block;
pub mod input;
pub mod side;
pub mod trial;

pub use block::BlockKind;
pub use input::ResponseKey;
pub use side::{Side, StimulusRow};
pub use trial::{Accuracy, ParseFieldError, ReactionTime, TrialRecord, TrialType};
