use crate::error::{Error, Result};

/// Fixed frame prefix: four native-endian u32 words.
///   block_size + last_block_size + blocks + reserved = 16 bytes
pub const FIXED_HEADER_SIZE: usize = 16;

/// Size of one header word / per-block table entry.
pub const WORD_SIZE: usize = 4;

/// Default target block size: 1 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Byte offset at which the payload begins for a frame of `blocks`
/// sub-blocks: the four fixed words plus one table word per block.
#[inline]
pub fn header_offset(blocks: usize) -> usize {
    (blocks + 4) * WORD_SIZE
}

/// Worst case for DEFLATE output on a `raw_len`-byte block: incompressible
/// input falls back to stored-block framing, which adds a few bytes of
/// segment overhead plus a small constant.
#[inline]
pub fn compress_bound(raw_len: usize) -> usize {
    raw_len + (raw_len >> 12) + (raw_len >> 14) + 13
}

/// Output capacity guaranteed to hold any frame produced for `input_len`
/// bytes at `block_size`: the header plus one worst-case staging window per
/// block, plus the spare parking window.
pub fn worst_case_frame_size(input_len: usize, block_size: usize) -> usize {
    if input_len <= block_size {
        return FIXED_HEADER_SIZE + compress_bound(input_len);
    }
    let blocks = input_len / block_size + usize::from(input_len % block_size > 0);
    header_offset(blocks) + (blocks + 1) * compress_bound(block_size)
}

// ── Header ──────────────────────────────────────────────────────────────────

/// Decoded representation of the frame header.
///
/// Layout (all words native-endian u32, offsets in bytes):
/// ```text
/// +0   block_size             nominal uncompressed bytes per sub-block
/// +4   last_block_size        trailing partial block (see below)
/// +8   blocks                 sub-block count; 0 = single-block fast path
/// +12  reserved               writer sets 0, reader ignores
/// +16  per_block_size[0..blocks]
/// +header_offset  payload, concatenated in block-index order
/// ```
///
/// For a fast-path frame (`blocks = 0`) the payload starts at byte 16 and
/// `last_block_size` holds the whole uncompressed input size, so the frame
/// stays self-describing for capacity checks.
#[derive(Debug, Clone)]
pub struct FrameHeader {
    /// Nominal uncompressed bytes per sub-block.
    pub block_size: u32,
    /// Uncompressed size of the trailing partial block; 0 when the input
    /// divides evenly. Whole input size for a fast-path frame.
    pub last_block_size: u32,
    /// Compressed size of each sub-block, in block-index order. Empty for a
    /// fast-path frame.
    pub block_sizes: Vec<u32>,
}

impl FrameHeader {
    /// Number of sub-blocks declared by this header.
    #[inline]
    pub fn blocks(&self) -> usize {
        self.block_sizes.len()
    }

    /// Byte offset of the payload within the frame.
    #[inline]
    pub fn header_offset(&self) -> usize {
        if self.block_sizes.is_empty() {
            FIXED_HEADER_SIZE
        } else {
            header_offset(self.block_sizes.len())
        }
    }

    /// Total compressed payload bytes declared by the per-block table.
    pub fn payload_len(&self) -> usize {
        self.block_sizes.iter().map(|&s| s as usize).sum()
    }

    /// Uncompressed size the payload decodes to.
    pub fn raw_len(&self) -> usize {
        let blocks = self.block_sizes.len();
        if blocks == 0 {
            return self.last_block_size as usize;
        }
        let full = if self.last_block_size > 0 { blocks - 1 } else { blocks };
        full * self.block_size as usize + self.last_block_size as usize
    }

    /// Serialize into the first `header_offset()` bytes of `out`.
    ///
    /// The caller writes the header only after every payload byte is in
    /// place, so a reader that sees a complete header is guaranteed to see a
    /// complete payload.
    pub fn write(&self, out: &mut [u8]) {
        put_u32(out, 0, self.block_size);
        put_u32(out, 1, self.last_block_size);
        put_u32(out, 2, self.block_sizes.len() as u32);
        put_u32(out, 3, 0);
        for (i, &size) in self.block_sizes.iter().enumerate() {
            put_u32(out, 4 + i, size);
        }
    }

    /// Parse and structurally validate a frame prefix.
    ///
    /// Rejects: truncated headers, a zero block size, a per-block entry
    /// larger than the worst-case compressed size of one block, and a
    /// per-block table that does not sum to the payload length.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < FIXED_HEADER_SIZE {
            return Err(Error::BadFrame("frame shorter than fixed header"));
        }
        let block_size = get_u32(frame, 0);
        let last_block_size = get_u32(frame, 1);
        let blocks = get_u32(frame, 2) as usize;
        // word 3 is reserved: ignored on read

        if block_size == 0 {
            return Err(Error::BadFrame("declared block size is zero"));
        }
        let offset = blocks
            .checked_add(4)
            .and_then(|words| words.checked_mul(WORD_SIZE))
            .ok_or(Error::BadFrame("declared block count overflows"))?;
        if frame.len() < offset {
            return Err(Error::BadFrame("frame shorter than declared header"));
        }

        let per_block_cap = compress_bound(block_size as usize);
        let mut block_sizes = Vec::with_capacity(blocks);
        for i in 0..blocks {
            let size = get_u32(frame, 4 + i);
            if size as usize > per_block_cap {
                return Err(Error::BadFrame("per-block size exceeds block capacity"));
            }
            block_sizes.push(size);
        }

        let header = Self {
            block_size,
            last_block_size,
            block_sizes,
        };
        if blocks > 0 && header.payload_len() != frame.len() - offset {
            return Err(Error::BadFrame("per-block sizes do not sum to payload length"));
        }
        Ok(header)
    }

    /// Smallest output capacity the capacity check accepts: the conservative
    /// bound `blocks * block_size + last_block_size`, which over-counts by
    /// one block when the input did not divide evenly.
    pub fn required_capacity(&self) -> usize {
        self.block_sizes.len() * self.block_size as usize + self.last_block_size as usize
    }

    /// Check the declared plaintext against a consumer's output capacity.
    pub fn validate_capacity(&self, capacity: usize) -> Result<()> {
        let declared =
            self.block_sizes.len() as u64 * self.block_size as u64 + self.last_block_size as u64;
        if declared > capacity as u64 {
            return Err(Error::BadFrame("declared plaintext exceeds output capacity"));
        }
        Ok(())
    }
}

/// Parse a frame prefix and validate it against the consumer's output
/// capacity in one step.
pub fn read_header(frame: &[u8], output_capacity: usize) -> Result<FrameHeader> {
    let header = FrameHeader::parse(frame)?;
    header.validate_capacity(output_capacity)?;
    Ok(header)
}

#[inline]
fn put_u32(out: &mut [u8], word: usize, value: u32) {
    out[word * WORD_SIZE..(word + 1) * WORD_SIZE].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
fn get_u32(bytes: &[u8], word: usize) -> u32 {
    let mut buf = [0u8; WORD_SIZE];
    buf.copy_from_slice(&bytes[word * WORD_SIZE..(word + 1) * WORD_SIZE]);
    u32::from_ne_bytes(buf)
}
