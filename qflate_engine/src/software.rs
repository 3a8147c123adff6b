use std::io::Write;
use std::sync::{Arc, Mutex};

use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;

use qflate_core::engine::{Descriptor, Engine, Job, Level, Op, Status};
use qflate_core::Result;

use crate::queue::{QueueState, DEFAULT_QUEUE_DEPTH};
use crate::{STATUS_NOT_INITIALIZED, STATUS_OUTPUT_OVERFLOW, STATUS_STREAM_ERROR};

/// Software DEFLATE engine.
///
/// The path an accelerator wrapper falls back to when no hardware
/// work-queue is enumerated: raw DEFLATE per block, with the asynchronous
/// queue surface modeled deterministically on top (bounded depth, a few
/// `BeingProcessed` polls per descriptor, completion order independent of
/// submission order).
pub struct SoftwareEngine {
    queue: Arc<Mutex<QueueState>>,
}

impl SoftwareEngine {
    pub fn new() -> Self {
        Self::with_queue_depth(DEFAULT_QUEUE_DEPTH)
    }

    /// Bound the number of descriptors the queue accepts before reporting
    /// `QueuesBusy`. Low depths exercise a caller's back-pressure handling.
    pub fn with_queue_depth(depth: usize) -> Self {
        assert!(depth >= 1, "queue depth must be at least 1");
        Self {
            queue: Arc::new(Mutex::new(QueueState::new(depth))),
        }
    }

    /// Total descriptors accepted so far, across all records.
    pub fn submissions(&self) -> u64 {
        self.queue.lock().unwrap().submissions()
    }
}

impl Default for SoftwareEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for SoftwareEngine {
    fn name(&self) -> &'static str {
        "software"
    }

    fn new_job(&self) -> Result<Box<dyn Job>> {
        Ok(Box::new(SoftwareJob::new(Arc::clone(&self.queue))))
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Idle,
    InFlight { done_tick: u64, failure: Option<u32> },
    Complete { failure: Option<u32> },
}

/// One software job record.
pub struct SoftwareJob {
    queue: Arc<Mutex<QueueState>>,
    phase: Phase,
    initialized: bool,
    submitted: bool,
    staging: Vec<u8>,
    total_out: usize,
}

impl SoftwareJob {
    fn new(queue: Arc<Mutex<QueueState>>) -> Self {
        Self {
            queue,
            phase: Phase::Idle,
            initialized: false,
            submitted: false,
            staging: Vec::new(),
            total_out: 0,
        }
    }

    /// Run the descriptor's transform into the staging buffer. Returns the
    /// failure code, if any; the status surfaces when the descriptor
    /// completes, like a hardware completion record.
    fn run(&mut self, desc: &Descriptor, input: &[u8]) -> Option<u32> {
        self.staging.clear();
        self.total_out = 0;
        let result = match desc.op {
            Op::Compress => deflate(input, desc.level),
            Op::Decompress => inflate(input),
        };
        match result {
            Ok(bytes) if bytes.len() <= desc.available_out => {
                self.total_out = bytes.len();
                self.staging = bytes;
                None
            }
            Ok(_) => Some(STATUS_OUTPUT_OVERFLOW),
            Err(code) => Some(code),
        }
    }

    fn completion_status(failure: Option<u32>) -> Status {
        match failure {
            None => Status::Ok,
            Some(code) => Status::Failed(code),
        }
    }
}

impl Job for SoftwareJob {
    fn init(&mut self) -> Status {
        self.initialized = true;
        Status::Ok
    }

    fn fini(&mut self) -> Status {
        self.initialized = false;
        Status::Ok
    }

    fn submit(&mut self, desc: &Descriptor, input: &[u8]) -> Status {
        if !self.initialized {
            return Status::Failed(STATUS_NOT_INITIALIZED);
        }
        let enqueued = self.queue.lock().unwrap().try_enqueue();
        match enqueued {
            None => Status::QueuesBusy,
            Some(done_tick) => {
                let failure = self.run(desc, input);
                self.submitted = true;
                self.phase = Phase::InFlight { done_tick, failure };
                Status::Ok
            }
        }
    }

    fn check(&mut self) -> Status {
        if !self.submitted {
            return Status::JobNotSubmitted;
        }
        match self.phase {
            Phase::InFlight { done_tick, failure } => {
                let tick = self.queue.lock().unwrap().poll();
                if tick >= done_tick {
                    self.phase = Phase::Complete { failure };
                    Self::completion_status(failure)
                } else {
                    Status::BeingProcessed
                }
            }
            Phase::Complete { failure } => Self::completion_status(failure),
            Phase::Idle => Status::JobNotSubmitted,
        }
    }

    fn execute(&mut self, desc: &Descriptor, input: &[u8], out: &mut [u8]) -> Status {
        if !self.initialized {
            return Status::Failed(STATUS_NOT_INITIALIZED);
        }
        match self.run(desc, input) {
            None => {
                out[..self.total_out].copy_from_slice(&self.staging);
                self.submitted = true;
                self.phase = Phase::Complete { failure: None };
                Status::Ok
            }
            Some(code) => Status::Failed(code),
        }
    }

    fn total_out(&self) -> usize {
        self.total_out
    }

    fn output(&self) -> &[u8] {
        &self.staging[..self.total_out]
    }
}

// The dynamic-Huffman descriptor flag is a hardware knob; flate2 picks its
// own table strategy per block, so the flag is accepted and ignored here.
fn deflate(input: &[u8], level: Level) -> std::result::Result<Vec<u8>, u32> {
    let compression = match level {
        Level::Fast => Compression::fast(),
        Level::High => Compression::best(),
    };
    let mut encoder = DeflateEncoder::new(Vec::new(), compression);
    encoder.write_all(input).map_err(|_| STATUS_STREAM_ERROR)?;
    encoder.finish().map_err(|_| STATUS_STREAM_ERROR)
}

fn inflate(input: &[u8]) -> std::result::Result<Vec<u8>, u32> {
    let mut decoder = DeflateDecoder::new(Vec::new());
    decoder.write_all(input).map_err(|_| STATUS_STREAM_ERROR)?;
    decoder.finish().map_err(|_| STATUS_STREAM_ERROR)
}
