/// Timer payloads of a running block. The controller owns the scheduler and
/// dispatches these itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineTask {
    MaskFrame,
    StimulusStep,
    ItiMessage,
}
