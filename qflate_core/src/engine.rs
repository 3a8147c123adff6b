use std::fmt;

use crate::error::Result;

// ── Descriptor flags ────────────────────────────────────────────────────────

/// Block starts a new stream: the engine resets its history window.
pub const FLAG_FIRST: u32 = 1 << 0;

/// Block ends the stream: the engine flushes and terminates the bit stream.
pub const FLAG_LAST: u32 = 1 << 1;

/// Skip the engine's decompress-and-compare verification pass after
/// compression.
pub const FLAG_OMIT_VERIFY: u32 = 1 << 2;

/// Build a dynamic Huffman table per block instead of using the static one.
pub const FLAG_DYNAMIC_HUFFMAN: u32 = 1 << 3;

/// Stateless per-block framing: every block is a complete stream of its own.
/// This is the invariant that makes blocks independently decompressable and
/// therefore submittable in parallel.
pub const FLAGS_STATELESS: u32 = FLAG_FIRST | FLAG_LAST | FLAG_OMIT_VERIFY;

// ── Descriptor fields ───────────────────────────────────────────────────────

/// Direction of one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Compress,
    Decompress,
}

/// Compression effort. The accelerator family exposes exactly two settings:
/// a fast level and a high-ratio level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Fast,
    High,
}

/// One unit of work handed to a job record at submission time.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub op: Op,
    /// Ignored on the decompress path.
    pub level: Level,
    pub flags: u32,
    /// Capacity of the output window. The engine fails the job rather than
    /// write a single byte past it.
    pub available_out: usize,
}

// ── Status ──────────────────────────────────────────────────────────────────

/// Result of a submit, check, or execute call on a job record.
///
/// `BeingProcessed` and `QueuesBusy` are transient: the caller keeps polling
/// (or resubmitting). Everything else is terminal for the current descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Submission accepted, or work completed successfully.
    Ok,
    /// The descriptor is still in flight.
    BeingProcessed,
    /// Every device work-queue is full; back off and retry.
    QueuesBusy,
    /// `check` was called on a record that has never been submitted.
    JobNotSubmitted,
    /// Hard engine failure; the raw engine status code is carried verbatim.
    Failed(u32),
}

impl Status {
    /// A terminal status ends the polling loop for the current descriptor.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::BeingProcessed | Status::QueuesBusy)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::BeingProcessed => write!(f, "being processed"),
            Status::QueuesBusy => write!(f, "queues busy"),
            Status::JobNotSubmitted => write!(f, "job not submitted"),
            Status::Failed(code) => write!(f, "engine status {}", code),
        }
    }
}

// ── Engine contract ─────────────────────────────────────────────────────────

/// One pre-allocated engine job record.
///
/// A record cycles through idle → submitted → processing → complete. Between
/// a successful `submit` and a terminal `check` the record is owned by the
/// engine: the host must not touch `output` or resubmit. A completed record
/// may be resubmitted with a fresh descriptor.
///
/// Input bytes are captured at submission; output bytes land in a staging
/// buffer owned by the record, sized to the descriptor's `available_out`.
/// The orchestrator copies staged output to its final position after
/// completion, so records never alias one another or the caller's buffers.
pub trait Job: Send {
    /// Per-record initializer. Must succeed before the first submission.
    fn init(&mut self) -> Status;

    /// Per-record finalizer; the inverse of `init`.
    fn fini(&mut self) -> Status;

    /// Queue an asynchronous descriptor. `QueuesBusy` means nothing was
    /// queued and the identical call may be retried.
    fn submit(&mut self, desc: &Descriptor, input: &[u8]) -> Status;

    /// Poll the in-flight descriptor. Returns `Ok` exactly when the work is
    /// complete; repeated calls after completion keep returning `Ok`.
    fn check(&mut self) -> Status;

    /// Synchronous one-shot variant: run the descriptor to completion and
    /// write the result into `out`.
    fn execute(&mut self, desc: &Descriptor, input: &[u8], out: &mut [u8]) -> Status;

    /// Bytes produced by the last completed descriptor.
    fn total_out(&self) -> usize;

    /// Staged output of the last completed descriptor
    /// (`total_out` bytes long).
    fn output(&self) -> &[u8];
}

/// Factory for job records; the seam between the orchestrator and a concrete
/// accelerator library or software fallback.
pub trait Engine: Send + Sync {
    /// Human-readable engine name for CLI display.
    fn name(&self) -> &'static str;

    /// Allocate one job record. The record is not yet initialized; call
    /// [`Job::init`] before submitting.
    fn new_job(&self) -> Result<Box<dyn Job>>;
}
