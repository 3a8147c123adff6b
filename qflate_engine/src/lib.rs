//! Bundled [`Engine`] implementations for the qflate orchestrator.

mod queue;
mod software;
mod stored;

pub use software::SoftwareEngine;
pub use stored::StoredEngine;

use std::sync::Arc;

use qflate_core::Engine;

// ── Engine status codes reported through `Status::Failed` ──────────────────

/// Submission or execution on a record that was never initialized.
pub const STATUS_NOT_INITIALIZED: u32 = 0x01;

/// The DEFLATE bit stream was malformed or could not be produced.
pub const STATUS_STREAM_ERROR: u32 = 0x02;

/// The transformed block did not fit the descriptor's output window.
pub const STATUS_OUTPUT_OVERFLOW: u32 = 0x03;

/// Resolve an engine from its CLI-facing name.
pub fn engine_by_name(name: &str) -> anyhow::Result<Arc<dyn Engine>> {
    match name {
        "software" | "sw" => Ok(Arc::new(SoftwareEngine::new())),
        "stored" => Ok(Arc::new(StoredEngine::new())),
        other => anyhow::bail!("unknown engine '{}'. Valid options: software, stored", other),
    }
}
