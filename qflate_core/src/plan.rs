use std::ops::Range;

use crate::format::FrameHeader;

/// Input partition for one compress or decompress call.
///
/// Exists only for the duration of the call; nothing here is persisted or
/// written to the wire (the frame header is derived from it on compression
/// and reconstructs it on decompression).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    /// Nominal uncompressed bytes per block.
    pub block_size: usize,
    /// Trailing partial block; 0 when the input divides evenly.
    pub last_block_size: usize,
    /// Total number of blocks, counting the partial one.
    pub blocks: usize,
}

impl BlockPlan {
    /// Partition `input_len` bytes into `block_size`-byte blocks.
    ///
    /// Only meaningful for the multi-block path (`input_len > block_size`);
    /// smaller inputs take the single-block fast path and never build a plan.
    pub fn for_input(input_len: usize, block_size: usize) -> Self {
        debug_assert!(block_size >= 1);
        let full = input_len / block_size;
        let last = input_len % block_size;
        Self {
            block_size,
            last_block_size: last,
            blocks: full + usize::from(last > 0),
        }
    }

    /// Reconstruct the uncompressed-side geometry from a parsed frame header.
    pub fn from_header(header: &FrameHeader) -> Self {
        Self {
            block_size: header.block_size as usize,
            last_block_size: header.last_block_size as usize,
            blocks: header.blocks(),
        }
    }

    /// Uncompressed length of block `index`.
    #[inline]
    pub fn block_len(&self, index: usize) -> usize {
        debug_assert!(index < self.blocks);
        if index + 1 == self.blocks && self.last_block_size > 0 {
            self.last_block_size
        } else {
            self.block_size
        }
    }

    /// Byte window of block `index` within the uncompressed buffer.
    #[inline]
    pub fn block_range(&self, index: usize) -> Range<usize> {
        let start = index * self.block_size;
        start..start + self.block_len(index)
    }

    /// Total uncompressed bytes covered by the plan.
    pub fn raw_len(&self) -> usize {
        if self.blocks == 0 {
            return 0;
        }
        (self.blocks - 1) * self.block_size + self.block_len(self.blocks - 1)
    }
}

/// Size of the per-slot staging window for a compress call.
///
/// The region past the header is divided into `blocks + 1` equal windows;
/// the spare window keeps every slot's staging area disjoint from the
/// contiguous reassembly cursor while blocks complete out of order.
#[inline]
pub fn scratch_window(capacity: usize, header_offset: usize, blocks: usize) -> usize {
    capacity.saturating_sub(header_offset) / (blocks + 1)
}
