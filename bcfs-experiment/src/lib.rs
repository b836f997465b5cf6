pub mod channel;
pub mod config;
pub mod display;
pub mod dominance;
pub mod error;
pub mod images;
pub mod session;
pub mod state;
pub mod task;
pub mod transcript;
pub mod trial;

pub use channel::{Channel, Direction, MaskChannel, StimulusChannel, StimulusSnapshot};
pub use config::{ExperimentConfig, SessionConfig};
pub use display::{Display, DisplayOp, RecordingDisplay};
pub use dominance::{DominanceAnalysis, estimate};
pub use error::{ConfigError, SessionError, SetupError, TranscriptError, ValidationError};
pub use images::ImageSet;
pub use session::{ExitReason, SessionAssets, SessionEvent, SessionOrchestrator, SessionPlan};
pub use state::{ControllerEvent, ControllerPhase, SessionState, TrialController};
pub use task::EngineTask;
pub use transcript::{CsvTranscript, MemoryTranscript, TranscriptSink};
