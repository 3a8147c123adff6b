//! Descriptor submission: the fill and drain-and-refill phases, and the
//! wait-all completion barrier.
//!
//! One host thread drives up to N descriptors against the asynchronous
//! engine. Completions can arrive in any order on the device side, but the
//! round-robin completion cursor inspects slots in submission order, and
//! blocks are handed to slots round-robin, so completed output is always
//! consumed in block-index order and the reassembly cursor only ever moves
//! forward.

use std::time::{Duration, Instant};

use log::trace;

use crate::engine::{Descriptor, Job, Level, Op, Status};
use crate::error::{Error, Result};
use crate::format::FrameHeader;
use crate::plan::BlockPlan;

/// Wall-clock budget for the final completion barrier.
pub const WAIT_ALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Submit one descriptor, retrying while the device work-queues are full.
///
/// `QueuesBusy` is cooperative back-pressure, never an error: nothing was
/// queued and the identical submission can be retried immediately. Any other
/// non-`Ok` status aborts the call.
fn submit_with_retry(job: &mut dyn Job, desc: &Descriptor, input: &[u8]) -> Result<()> {
    loop {
        match job.submit(desc, input) {
            Status::Ok => return Ok(()),
            Status::QueuesBusy => continue,
            status => return Err(Error::Engine(status)),
        }
    }
}

/// Poll one slot until its status is terminal.
fn poll_until_terminal(job: &mut dyn Job) -> Status {
    loop {
        let status = job.check();
        if status.is_terminal() {
            return status;
        }
    }
}

/// Poll every slot until all are terminal or the wall-clock deadline
/// elapses. The per-slot statuses captured at the final poll are returned
/// for inspection.
pub(crate) fn wait_all(slots: &mut [Box<dyn Job>]) -> Result<Vec<Status>> {
    let deadline = Instant::now() + WAIT_ALL_TIMEOUT;
    let mut statuses = vec![Status::BeingProcessed; slots.len()];
    loop {
        let mut all_done = true;
        for (i, job) in slots.iter_mut().enumerate() {
            statuses[i] = job.check();
            if !statuses[i].is_terminal() {
                all_done = false;
            }
        }
        if all_done {
            return Ok(statuses);
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }
    }
}

/// First hard failure among a batch of terminal statuses, if any.
fn first_failure(statuses: &[Status]) -> Result<()> {
    match statuses.iter().find(|status| **status != Status::Ok) {
        Some(status) => Err(Error::Engine(*status)),
        None => Ok(()),
    }
}

/// Compress every block of `plan`, writing the concatenated payload into
/// `payload` and returning the per-block compressed sizes in block-index
/// order.
///
/// Every slot stages into a window of `window` bytes; the caller has already
/// verified that `payload` can hold one such window per block.
pub(crate) fn compress_blocks(
    slots: &mut [Box<dyn Job>],
    plan: &BlockPlan,
    input: &[u8],
    payload: &mut [u8],
    window: usize,
    level: Level,
    flags: u32,
) -> Result<Vec<u32>> {
    let resident = plan.blocks.min(slots.len());
    let desc = Descriptor {
        op: Op::Compress,
        level,
        flags,
        available_out: window,
    };

    // Fill phase: prime one descriptor per slot.
    for slot in 0..resident {
        submit_with_retry(slots[slot].as_mut(), &desc, &input[plan.block_range(slot)])?;
    }
    trace!("filled {} of {} blocks across {} slots", resident, plan.blocks, slots.len());

    let mut sizes = Vec::with_capacity(plan.blocks);
    let mut out_cursor = 0usize;
    let mut cursor = 0usize;
    let mut next_pending = resident;

    // Drain-and-refill: every completion frees its slot for the next block.
    while next_pending < plan.blocks {
        let job = slots[cursor].as_mut();
        match poll_until_terminal(job) {
            Status::Ok => {}
            status => return Err(Error::Engine(status)),
        }
        let n = job.total_out();
        payload[out_cursor..out_cursor + n].copy_from_slice(&job.output()[..n]);
        out_cursor += n;
        sizes.push(n as u32);

        submit_with_retry(job, &desc, &input[plan.block_range(next_pending)])?;
        next_pending += 1;
        cursor = (cursor + 1) % resident;
    }

    // Final batch: all resident slots are in flight. Wait for every one,
    // then drain them in block-index order.
    let statuses = wait_all(&mut slots[..resident])?;
    first_failure(&statuses)?;
    for k in 0..resident {
        let job = slots[(cursor + k) % resident].as_mut();
        let n = job.total_out();
        payload[out_cursor..out_cursor + n].copy_from_slice(&job.output()[..n]);
        out_cursor += n;
        sizes.push(n as u32);
    }

    debug_assert_eq!(sizes.len(), plan.blocks);
    Ok(sizes)
}

/// Decompress every block described by `header`, writing each block into its
/// final position in `output`. Returns the total decompressed size.
///
/// The input side is carved from the per-block size table; the output side
/// needs no staging because block positions are known exactly.
pub(crate) fn decompress_blocks(
    slots: &mut [Box<dyn Job>],
    header: &FrameHeader,
    payload: &[u8],
    output: &mut [u8],
    flags: u32,
) -> Result<usize> {
    let plan = BlockPlan::from_header(header);
    let resident = plan.blocks.min(slots.len());

    // Compressed-side windows, cumulative over the size table.
    let mut in_pos = 0usize;
    let in_ranges: Vec<std::ops::Range<usize>> = header
        .block_sizes
        .iter()
        .map(|&size| {
            let range = in_pos..in_pos + size as usize;
            in_pos += size as usize;
            range
        })
        .collect();

    let desc_for = |block: usize| Descriptor {
        op: Op::Decompress,
        level: Level::Fast,
        flags,
        available_out: plan.block_len(block),
    };

    // Fill phase.
    for slot in 0..resident {
        submit_with_retry(
            slots[slot].as_mut(),
            &desc_for(slot),
            &payload[in_ranges[slot].clone()],
        )?;
    }
    trace!("filled {} of {} blocks for decompression", resident, plan.blocks);

    let mut total = 0usize;
    let mut completed = 0usize;
    let mut cursor = 0usize;
    let mut next_pending = resident;

    // Drain-and-refill. Completions are consumed in block-index order, so
    // the destination of each completed block is simply the next uncovered
    // window of the output buffer.
    while next_pending < plan.blocks {
        let job = slots[cursor].as_mut();
        match poll_until_terminal(job) {
            Status::Ok => {}
            status => return Err(Error::Engine(status)),
        }
        let n = job.total_out();
        let at = completed * plan.block_size;
        output[at..at + n].copy_from_slice(&job.output()[..n]);
        total += n;
        completed += 1;

        submit_with_retry(job, &desc_for(next_pending), &payload[in_ranges[next_pending].clone()])?;
        next_pending += 1;
        cursor = (cursor + 1) % resident;
    }

    // Final batch.
    let statuses = wait_all(&mut slots[..resident])?;
    first_failure(&statuses)?;
    for k in 0..resident {
        let job = slots[(cursor + k) % resident].as_mut();
        let n = job.total_out();
        let at = completed * plan.block_size;
        output[at..at + n].copy_from_slice(&job.output()[..n]);
        total += n;
        completed += 1;
    }

    debug_assert_eq!(completed, plan.blocks);
    Ok(total)
}
