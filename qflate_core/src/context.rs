use std::sync::Arc;

use log::{debug, trace};

use crate::engine::{
    Descriptor, Engine, Job, Level, Op, Status, FLAGS_STATELESS, FLAG_DYNAMIC_HUFFMAN,
};
use crate::error::{Error, Result};
use crate::format::{self, FrameHeader, FIXED_HEADER_SIZE};
use crate::plan::{self, BlockPlan};
use crate::submit;

/// Pool of pre-allocated engine job records plus the compress / decompress
/// entry points.
///
/// # Lifecycle
/// [`Context::allocate`] builds the pool, [`Context::initialize`] runs the
/// engine's per-record initializer, and dropping the context finalizes
/// (when initialized) and releases every record. A context that failed to
/// initialize can still be dropped safely: only memory is released, no
/// finalizers run.
///
/// # Concurrency
/// A context is single-owner for the duration of a call (`&mut self`).
/// Parallelism comes from dispatching up to N independent descriptors to the
/// asynchronous engine, never from host threads.
pub struct Context {
    engine: Arc<dyn Engine>,
    /// Parallel submission slots, one engine job record each.
    slots: Vec<Box<dyn Job>>,
    /// Dedicated record for the single-block fast path and for whole-frame
    /// decompression.
    single: Box<dyn Job>,
    block_size: usize,
    initialized: bool,
}

impl Context {
    /// Allocate a context with `slots` submission slots and the given target
    /// block size.
    ///
    /// A failure partway through releases every record allocated so far.
    ///
    /// # Panics
    /// If `slots` is zero or `block_size` is zero or exceeds `u32::MAX`.
    pub fn allocate(engine: Arc<dyn Engine>, slots: usize, block_size: usize) -> Result<Self> {
        assert!(slots >= 1, "at least one submission slot is required");
        assert!(
            block_size >= 1 && block_size <= u32::MAX as usize,
            "block size must be in 1..=u32::MAX"
        );
        let mut pool = Vec::with_capacity(slots);
        for _ in 0..slots {
            pool.push(engine.new_job()?);
        }
        let single = engine.new_job()?;
        debug!(
            "allocated context: engine={} slots={} block_size={}",
            engine.name(),
            slots,
            block_size
        );
        Ok(Self {
            engine,
            slots: pool,
            single,
            block_size,
            initialized: false,
        })
    }

    /// Run the engine's per-record initializer on every record.
    ///
    /// On failure the context stays un-initialized; dropping it then only
    /// releases memory.
    pub fn initialize(&mut self) -> Result<()> {
        for job in self.jobs_mut() {
            match job.init() {
                Status::Ok => {}
                status => return Err(Error::EngineInit(status)),
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Configured target block size in bytes.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of parallel submission slots.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Name of the engine backing this context.
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Compress `input` into a self-describing frame written to `output`.
    /// Returns the total frame size (header plus payload).
    ///
    /// Inputs no larger than one block take the single-block fast path and
    /// produce a frame with a zero block count. On any error the contents of
    /// `output` are unspecified; the context remains usable.
    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        level: Level,
        dynamic_huffman: bool,
    ) -> Result<usize> {
        let flags = descriptor_flags(dynamic_huffman);
        if input.len() <= self.block_size {
            return self.compress_single(input, output, level, flags);
        }

        let plan = BlockPlan::for_input(input.len(), self.block_size);
        let offset = format::header_offset(plan.blocks);
        let window = plan::scratch_window(output.len(), offset, plan.blocks);
        if window < format::compress_bound(self.block_size) {
            return Err(Error::OutputTooSmall {
                needed: format::worst_case_frame_size(input.len(), self.block_size),
                capacity: output.len(),
            });
        }
        trace!(
            "compressing {} bytes as {} blocks of {} (window {})",
            input.len(),
            plan.blocks,
            self.block_size,
            window
        );

        let sizes = submit::compress_blocks(
            &mut self.slots,
            &plan,
            input,
            &mut output[offset..],
            window,
            level,
            flags,
        )?;
        let header = FrameHeader {
            block_size: self.block_size as u32,
            last_block_size: plan.last_block_size as u32,
            block_sizes: sizes,
        };
        let total = offset + header.payload_len();
        // The header is written last: a reader that sees a complete header
        // is guaranteed to see a complete payload.
        header.write(&mut output[..offset]);
        Ok(total)
    }

    /// Decompress a frame produced by [`compress`](Context::compress).
    /// Returns the plaintext size.
    pub fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        dynamic_huffman: bool,
    ) -> Result<usize> {
        let flags = descriptor_flags(dynamic_huffman);
        let header = format::read_header(input, output.len())?;
        let payload = &input[header.header_offset()..];

        if header.blocks() == 0 {
            if header.last_block_size == 0 {
                return Ok(0);
            }
            let desc = Descriptor {
                op: Op::Decompress,
                level: Level::Fast,
                flags,
                available_out: output.len(),
            };
            return match self.single.execute(&desc, payload, output) {
                Status::Ok => Ok(self.single.total_out()),
                status => Err(Error::Engine(status)),
            };
        }

        submit::decompress_blocks(&mut self.slots, &header, payload, output, flags)
    }

    /// Single-block fast path: one synchronous descriptor on the dedicated
    /// record, no multi-slot handshake.
    fn compress_single(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        level: Level,
        flags: u32,
    ) -> Result<usize> {
        if output.len() < FIXED_HEADER_SIZE {
            return Err(Error::OutputTooSmall {
                needed: FIXED_HEADER_SIZE + format::compress_bound(input.len()),
                capacity: output.len(),
            });
        }
        let total = if input.is_empty() {
            0
        } else {
            let desc = Descriptor {
                op: Op::Compress,
                level,
                flags,
                available_out: output.len() - FIXED_HEADER_SIZE,
            };
            match self.single.execute(&desc, input, &mut output[FIXED_HEADER_SIZE..]) {
                Status::Ok => self.single.total_out(),
                status => return Err(Error::Engine(status)),
            }
        };
        let header = FrameHeader {
            block_size: self.block_size as u32,
            last_block_size: input.len() as u32,
            block_sizes: Vec::new(),
        };
        header.write(&mut output[..FIXED_HEADER_SIZE]);
        Ok(FIXED_HEADER_SIZE + total)
    }

    fn jobs_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Job>> + '_ {
        self.slots.iter_mut().chain(std::iter::once(&mut self.single))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.initialized {
            for job in self.jobs_mut() {
                let _ = job.fini();
            }
        }
    }
}

fn descriptor_flags(dynamic_huffman: bool) -> u32 {
    if dynamic_huffman {
        FLAGS_STATELESS | FLAG_DYNAMIC_HUFFMAN
    } else {
        FLAGS_STATELESS
    }
}
