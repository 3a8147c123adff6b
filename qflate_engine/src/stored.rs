use std::sync::{Arc, Mutex};

use qflate_core::engine::{Descriptor, Engine, Job, Status};
use qflate_core::Result;

use crate::queue::{QueueState, DEFAULT_QUEUE_DEPTH};
use crate::{STATUS_NOT_INITIALIZED, STATUS_OUTPUT_OVERFLOW};

/// Stored-block engine: no entropy coding, bytes pass through unchanged in
/// both directions.
///
/// Useful as a reference implementation when validating orchestrator
/// behavior, since the output of every block is exactly its input.
pub struct StoredEngine {
    queue: Arc<Mutex<QueueState>>,
}

impl StoredEngine {
    pub fn new() -> Self {
        Self::with_queue_depth(DEFAULT_QUEUE_DEPTH)
    }

    pub fn with_queue_depth(depth: usize) -> Self {
        assert!(depth >= 1, "queue depth must be at least 1");
        Self {
            queue: Arc::new(Mutex::new(QueueState::new(depth))),
        }
    }
}

impl Default for StoredEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for StoredEngine {
    fn name(&self) -> &'static str {
        "stored"
    }

    fn new_job(&self) -> Result<Box<dyn Job>> {
        Ok(Box::new(StoredJob::new(Arc::clone(&self.queue))))
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Idle,
    InFlight { done_tick: u64, failure: Option<u32> },
    Complete { failure: Option<u32> },
}

pub struct StoredJob {
    queue: Arc<Mutex<QueueState>>,
    phase: Phase,
    initialized: bool,
    submitted: bool,
    staging: Vec<u8>,
}

impl StoredJob {
    fn new(queue: Arc<Mutex<QueueState>>) -> Self {
        Self {
            queue,
            phase: Phase::Idle,
            initialized: false,
            submitted: false,
            staging: Vec::new(),
        }
    }

    fn run(&mut self, desc: &Descriptor, input: &[u8]) -> Option<u32> {
        self.staging.clear();
        if input.len() > desc.available_out {
            return Some(STATUS_OUTPUT_OVERFLOW);
        }
        self.staging.extend_from_slice(input);
        None
    }

    fn completion_status(failure: Option<u32>) -> Status {
        match failure {
            None => Status::Ok,
            Some(code) => Status::Failed(code),
        }
    }
}

impl Job for StoredJob {
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
                out[..self.staging.len()].copy_from_slice(&self.staging);
                self.submitted = true;
                self.phase = Phase::Complete { failure: None };
                Status::Ok
            }
            Some(code) => Status::Failed(code),
        }
    }

    fn total_out(&self) -> usize {
        self.staging.len()
    }

    fn output(&self) -> &[u8] {
        &self.staging
    }
}
