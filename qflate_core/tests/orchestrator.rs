//! End-to-end orchestrator tests against the bundled engines: round trips
//! across block / slot geometries, back-pressure recovery, hard-error
//! aborts, and frame rejection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use qflate_core::engine::{Descriptor, Engine, Job, Status};
use qflate_core::error::Error;
use qflate_core::format::{worst_case_frame_size, FrameHeader};
use qflate_core::{Context, Level, Result};
use qflate_engine::{SoftwareEngine, StoredEngine};

// ── helpers ────────────────────────────────────────────────────────────────

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

fn context(engine: Arc<dyn Engine>, slots: usize, block_size: usize) -> Context {
    let mut ctx = Context::allocate(engine, slots, block_size).unwrap();
    ctx.initialize().unwrap();
    ctx
}

fn software_context(slots: usize, block_size: usize) -> Context {
    context(Arc::new(SoftwareEngine::new()), slots, block_size)
}

/// Compress, parse the produced header, decompress, and assert byte
/// equality. Returns the parsed header for further assertions.
fn round_trip(ctx: &mut Context, data: &[u8], level: Level, dynamic_huffman: bool) -> FrameHeader {
    let mut frame = vec![0u8; worst_case_frame_size(data.len(), ctx.block_size())];
    let frame_len = ctx.compress(data, &mut frame, level, dynamic_huffman).unwrap();
    let header = FrameHeader::parse(&frame[..frame_len]).unwrap();

    let mut raw = vec![0u8; header.required_capacity()];
    let raw_len = ctx
        .decompress(&frame[..frame_len], &mut raw, dynamic_huffman)
        .unwrap();
    assert_eq!(raw_len, data.len(), "round trip must restore the input size");
    assert_eq!(&raw[..raw_len], data, "round trip must restore the input bytes");
    header
}

// ── seed scenarios ─────────────────────────────────────────────────────────

#[test]
fn four_even_blocks_of_constant_bytes() {
    let data = vec![0x05u8; 1024];
    let mut ctx = software_context(4, 256);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);

    assert_eq!(header.blocks(), 4);
    assert_eq!(header.last_block_size, 0);
    // Identical block content compresses to identical block output.
    assert!(header.block_sizes.windows(2).all(|w| w[0] == w[1]));
    assert!(header.payload_len() <= 1024, "constant bytes must shrink");
}

#[test]
fn trailing_single_byte_block() {
    let mut data = vec![0x05u8; 1024];
    data.push(0xAA);
    let mut ctx = software_context(2, 256);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);

    assert_eq!(header.blocks(), 5);
    assert_eq!(header.last_block_size, 1);
    assert_eq!(header.header_offset(), 36);
}

#[test]
fn small_input_takes_single_block_fast_path() {
    let data: Vec<u8> = (0..200u8).collect();
    let mut ctx = software_context(7, 4096);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);

    assert_eq!(header.blocks(), 0);
    assert_eq!(header.header_offset(), 16);
    assert_eq!(header.last_block_size, 200);
}

#[test]
fn fill_phase_covers_all_blocks_when_slots_suffice() {
    let data = pseudo_random_bytes(7 * 1024 * 1024, 0xDEAD_BEEF);
    let engine = Arc::new(SoftwareEngine::new());
    let mut ctx = context(engine.clone(), 7, 1024 * 1024);

    let mut frame = vec![0u8; worst_case_frame_size(data.len(), ctx.block_size())];
    let frame_len = ctx.compress(&data, &mut frame, Level::Fast, false).unwrap();
    // Seven blocks across seven slots: every slot submitted exactly once,
    // the drain-and-refill loop body never ran.
    assert_eq!(engine.submissions(), 7);

    let header = FrameHeader::parse(&frame[..frame_len]).unwrap();
    assert_eq!(header.blocks(), 7);
    assert_eq!(header.last_block_size, 0);

    let mut raw = vec![0u8; header.required_capacity()];
    let raw_len = ctx.decompress(&frame[..frame_len], &mut raw, false).unwrap();
    assert_eq!(&raw[..raw_len], &data[..]);
}

#[test]
fn drain_and_refill_cycles_slots_over_pending_blocks() {
    let data = pseudo_random_bytes(21 * 1024 * 1024, 0x1234_5678);
    let engine = Arc::new(SoftwareEngine::new());
    let mut ctx = context(engine.clone(), 4, 3 * 1024 * 1024);

    let mut frame = vec![0u8; worst_case_frame_size(data.len(), ctx.block_size())];
    let frame_len = ctx.compress(&data, &mut frame, Level::Fast, false).unwrap();
    // Four slots filled, three refills, final barrier over the last four.
    assert_eq!(engine.submissions(), 7);

    let header = FrameHeader::parse(&frame[..frame_len]).unwrap();
    assert_eq!(header.blocks(), 7);

    let mut raw = vec![0u8; header.required_capacity()];
    let raw_len = ctx.decompress(&frame[..frame_len], &mut raw, false).unwrap();
    assert_eq!(&raw[..raw_len], &data[..]);
}

#[test]
fn crafted_oversize_block_entry_is_rejected() {
    let mut frame = Vec::new();
    for word in [10u32, 0, 3, 0, 100, 5, 5] {
        frame.extend_from_slice(&word.to_ne_bytes());
    }
    frame.extend(std::iter::repeat(0xCC).take(110));

    let mut ctx = software_context(2, 10);
    let mut raw = vec![0u8; 64];
    let err = ctx.decompress(&frame, &mut raw, false).unwrap_err();
    assert!(matches!(err, Error::BadFrame(_)));
}

// ── boundary cases ─────────────────────────────────────────────────────────

#[test]
fn empty_input_yields_header_only_frame() {
    let mut ctx = software_context(4, 256);
    let mut frame = vec![0u8; 64];
    let frame_len = ctx.compress(&[], &mut frame, Level::Fast, false).unwrap();
    assert_eq!(frame_len, 16, "empty input compresses to a bare header");

    let header = FrameHeader::parse(&frame[..frame_len]).unwrap();
    assert_eq!(header.blocks(), 0);
    assert_eq!(header.last_block_size, 0);

    let mut raw = vec![0u8; 16];
    assert_eq!(ctx.decompress(&frame[..frame_len], &mut raw, false).unwrap(), 0);
}

#[test]
fn input_of_exactly_one_block_stays_on_fast_path() {
    let data = pseudo_random_bytes(256, 7);
    let mut ctx = software_context(4, 256);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);
    assert_eq!(header.blocks(), 0);
}

#[test]
fn one_byte_under_block_size_stays_on_fast_path() {
    let data = pseudo_random_bytes(255, 8);
    let mut ctx = software_context(4, 256);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);
    assert_eq!(header.blocks(), 0);
}

#[test]
fn one_byte_over_block_size_splits_into_two_blocks() {
    let data = pseudo_random_bytes(257, 9);
    let mut ctx = software_context(4, 256);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);
    assert_eq!(header.blocks(), 2);
    assert_eq!(header.last_block_size, 1);
}

#[test]
fn single_slot_degenerates_to_serial_loop() {
    let data = pseudo_random_bytes(4096 + 100, 10);
    let mut ctx = software_context(1, 512);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);
    assert_eq!(header.blocks(), 9);
}

#[test]
fn more_slots_than_blocks_is_legal() {
    let data = pseudo_random_bytes(3 * 512, 11);
    let mut ctx = software_context(8, 512);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);
    assert_eq!(header.blocks(), 3);
}

#[test]
fn round_trip_across_levels_and_huffman_modes() {
    let data = pseudo_random_bytes(10_000, 12);
    for level in [Level::Fast, Level::High] {
        for dynamic_huffman in [false, true] {
            let mut ctx = software_context(3, 1024);
            round_trip(&mut ctx, &data, level, dynamic_huffman);
        }
    }
}

// ── back-pressure and engines ──────────────────────────────────────────────

#[test]
fn shallow_queue_back_pressure_is_recovered_by_retry() {
    let data = pseudo_random_bytes(12 * 1024, 13);
    let engine = Arc::new(SoftwareEngine::with_queue_depth(2));
    let mut ctx = context(engine, 6, 1024);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);
    assert_eq!(header.blocks(), 12);
}

#[test]
fn stored_engine_round_trips_with_identity_blocks() {
    let data = pseudo_random_bytes(5 * 300 + 17, 14);
    let mut ctx = context(Arc::new(StoredEngine::new()), 3, 300);
    let header = round_trip(&mut ctx, &data, Level::Fast, false);
    assert_eq!(header.blocks(), 6);
    // Stored blocks pass through unchanged, so every table entry equals the
    // block's uncompressed size.
    assert_eq!(header.block_sizes[..5], [300, 300, 300, 300, 300]);
    assert_eq!(header.block_sizes[5], 17);
}

#[test]
fn undersized_output_fails_before_any_submission() {
    let data = pseudo_random_bytes(1024, 15);
    let engine = Arc::new(SoftwareEngine::new());
    let mut ctx = context(engine.clone(), 4, 256);

    let mut frame = vec![0u8; 100];
    let err = ctx.compress(&data, &mut frame, Level::Fast, false).unwrap_err();
    assert!(matches!(err, Error::OutputTooSmall { .. }));
    assert_eq!(engine.submissions(), 0, "nothing may be submitted first");
}

// ── hard engine errors ─────────────────────────────────────────────────────

/// Engine wrapper whose nth submission attempt reports a hard failure.
struct FailingEngine {
    inner: Arc<dyn Engine>,
    attempts: Arc<AtomicU64>,
    fail_on: u64,
}

impl FailingEngine {
    fn new(inner: Arc<dyn Engine>, fail_on: u64) -> Self {
        Self {
            inner,
            attempts: Arc::new(AtomicU64::new(0)),
            fail_on,
        }
    }
}

impl Engine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn new_job(&self) -> Result<Box<dyn Job>> {
        Ok(Box::new(FailingJob {
            inner: self.inner.new_job()?,
            attempts: Arc::clone(&self.attempts),
            fail_on: self.fail_on,
        }))
    }
}

struct FailingJob {
    inner: Box<dyn Job>,
    attempts: Arc<AtomicU64>,
    fail_on: u64,
}

impl Job for FailingJob {
    fn init(&mut self) -> Status {
        self.inner.init()
    }

    fn fini(&mut self) -> Status {
        self.inner.fini()
    }

    fn submit(&mut self, desc: &Descriptor, input: &[u8]) -> Status {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_on {
            return Status::Failed(0x7F);
        }
        self.inner.submit(desc, input)
    }

    fn check(&mut self) -> Status {
        self.inner.check()
    }

    fn execute(&mut self, desc: &Descriptor, input: &[u8], out: &mut [u8]) -> Status {
        self.inner.execute(desc, input, out)
    }

    fn total_out(&self) -> usize {
        self.inner.total_out()
    }

    fn output(&self) -> &[u8] {
        self.inner.output()
    }
}

#[test]
fn submission_failure_aborts_call_but_context_survives() {
    let data = pseudo_random_bytes(4 * 256, 16);
    let engine = Arc::new(FailingEngine::new(Arc::new(SoftwareEngine::new()), 3));
    let mut ctx = context(engine, 2, 256);

    let mut frame = vec![0u8; worst_case_frame_size(data.len(), 256)];
    let err = ctx.compress(&data, &mut frame, Level::Fast, false).unwrap_err();
    match err {
        Error::Engine(Status::Failed(code)) => assert_eq!(code, 0x7F),
        other => panic!("expected a forwarded engine failure, got {other:?}"),
    }

    // The failure consumed the poisoned attempt; the same context must
    // complete subsequent calls.
    round_trip(&mut ctx, &data, Level::Fast, false);
}

// ── pool lifecycle ─────────────────────────────────────────────────────────

#[test]
fn context_allocate_then_drop_without_initialize() {
    let ctx = Context::allocate(Arc::new(SoftwareEngine::new()), 4, 256).unwrap();
    assert_eq!(ctx.slot_count(), 4);
    assert_eq!(ctx.block_size(), 256);
    drop(ctx); // only memory is released, no finalizers run
}

#[test]
fn context_is_reusable_across_calls() {
    let mut ctx = software_context(3, 512);
    for seed in 0..4u64 {
        let data = pseudo_random_bytes(2000 + seed as usize * 777, seed);
        round_trip(&mut ctx, &data, Level::Fast, false);
    }
}
