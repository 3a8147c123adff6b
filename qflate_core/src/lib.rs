//! Parallel block-compression orchestrator for asynchronous DEFLATE engines.
//!
//! An input buffer is partitioned into fixed-size blocks, each block is
//! submitted as an independent descriptor to a pool of engine job records,
//! and completed output is reassembled into a contiguous frame carrying a
//! self-describing header. Decompression runs the same machinery in reverse.
//!
//! The engine itself is a collaborator behind the [`engine::Engine`] /
//! [`engine::Job`] traits; `qflate_engine` provides the bundled
//! implementations.

pub mod context;
pub mod engine;
pub mod error;
pub mod format;
pub mod plan;
mod submit;

pub use context::Context;
pub use engine::{Descriptor, Engine, Job, Level, Op, Status};
pub use error::{Error, Result};
pub use format::{read_header, worst_case_frame_size, FrameHeader, DEFAULT_BLOCK_SIZE};
pub use submit::WAIT_ALL_TIMEOUT;
