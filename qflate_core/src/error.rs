use thiserror::Error;

use crate::engine::Status;

/// Failure taxonomy of the orchestrator.
///
/// Transient engine conditions (`QueuesBusy`, `BeingProcessed`) never appear
/// here: they are loop conditions inside the submission path, not errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Context or job-record allocation failed.
    #[error("job record allocation failed")]
    OutOfMemory,

    /// The engine rejected the per-record initializer.
    #[error("engine rejected record initialization: {0}")]
    EngineInit(Status),

    /// The output buffer cannot hold the header plus worst-case staging
    /// windows, or a decompressed block would not fit.
    #[error("output buffer too small: need {needed} bytes, have {capacity}")]
    OutputTooSmall { needed: usize, capacity: usize },

    /// Frame header validation failed.
    #[error("invalid frame: {0}")]
    BadFrame(&'static str),

    /// A submit, check, or execute call returned a hard engine error. The
    /// underlying engine status is forwarded verbatim.
    #[error("engine failure: {0}")]
    Engine(Status),

    /// The completion barrier elapsed with at least one descriptor still in
    /// flight.
    #[error("timed out waiting for outstanding descriptors")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;
