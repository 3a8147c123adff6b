use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use xxhash_rust::xxh3::xxh3_64;

use qflate_core::{worst_case_frame_size, Context, FrameHeader, Level, DEFAULT_BLOCK_SIZE};
use qflate_engine::engine_by_name;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "qflate",
    about = "Parallel block compression against an asynchronous DEFLATE engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a self-describing block frame
    Compress {
        /// Source file to compress
        input: PathBuf,
        /// Destination frame file
        output: PathBuf,
        /// Uncompressed bytes per block (default: 1 MiB)
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Number of parallel submission slots
        #[arg(short, long, default_value_t = 8)]
        slots: usize,
        /// Compression level: fast | high
        #[arg(short, long, default_value = "fast")]
        level: String,
        /// Build a dynamic Huffman table per block
        #[arg(long)]
        dynamic_huffman: bool,
        /// Engine to use: software | stored
        #[arg(short, long, default_value = "software")]
        engine: String,
    },
    /// Decompress a frame back to raw bytes
    Decompress {
        /// Source frame file
        input: PathBuf,
        /// Destination file
        output: PathBuf,
        /// Number of parallel submission slots
        #[arg(short, long, default_value_t = 8)]
        slots: usize,
        /// Pass the dynamic Huffman flag to decompression descriptors
        #[arg(long)]
        dynamic_huffman: bool,
        /// Engine to use: software | stored
        #[arg(short, long, default_value = "software")]
        engine: String,
    },
    /// Print frame header fields and block statistics
    Inspect {
        /// Frame file to inspect
        file: PathBuf,
        /// Print the per-block size table
        #[arg(long)]
        blocks: bool,
    },
    /// Benchmark compress / decompress round trips over a file
    Bench {
        /// Source file
        file: PathBuf,
        /// Round trips to run
        #[arg(short, long, default_value_t = 5)]
        iterations: usize,
        /// Uncompressed bytes per block
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Number of parallel submission slots
        #[arg(short, long, default_value_t = 8)]
        slots: usize,
        /// Compression level: fast | high
        #[arg(short, long, default_value = "fast")]
        level: String,
        /// Engine to use: software | stored
        #[arg(short, long, default_value = "software")]
        engine: String,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn level_from_name(name: &str) -> anyhow::Result<Level> {
    match name {
        "fast" | "1" => Ok(Level::Fast),
        "high" | "3" => Ok(Level::High),
        other => anyhow::bail!("unknown level '{}'. Valid options: fast, high", other),
    }
}

fn build_context(engine_name: &str, slots: usize, block_size: usize) -> anyhow::Result<Context> {
    let engine = engine_by_name(engine_name)?;
    let mut ctx = Context::allocate(engine, slots, block_size)
        .context("allocating compression context")?;
    ctx.initialize().context("initializing engine records")?;
    Ok(ctx)
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    block_size: usize,
    slots: usize,
    level_name: &str,
    dynamic_huffman: bool,
    engine_name: &str,
) -> anyhow::Result<()> {
    let level = level_from_name(level_name)?;
    let data = std::fs::read(&input).with_context(|| format!("reading input file {:?}", input))?;
    let mut ctx = build_context(engine_name, slots, block_size)?;

    let mut frame = vec![0u8; worst_case_frame_size(data.len(), block_size)];
    let t0 = Instant::now();
    let frame_len = ctx
        .compress(&data, &mut frame, level, dynamic_huffman)
        .context("compressing")?;
    let elapsed = t0.elapsed();

    std::fs::write(&output, &frame[..frame_len])
        .with_context(|| format!("writing output file {:?}", output))?;

    let header = FrameHeader::parse(&frame[..frame_len])?;
    eprintln!("  engine      : {}", ctx.engine_name());
    eprintln!("  block size  : {}", human_bytes(block_size as u64));
    eprintln!("  blocks      : {}", header.blocks());
    eprintln!("  raw size    : {}", human_bytes(data.len() as u64));
    eprintln!("  frame size  : {}", human_bytes(frame_len as u64));
    eprintln!(
        "  ratio       : {:.2}x",
        data.len() as f64 / frame_len as f64
    );
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((data.len() as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: PathBuf,
    slots: usize,
    dynamic_huffman: bool,
    engine_name: &str,
) -> anyhow::Result<()> {
    let frame = std::fs::read(&input).with_context(|| format!("reading frame file {:?}", input))?;
    let header = FrameHeader::parse(&frame).context("parsing frame header")?;
    let mut ctx = build_context(engine_name, slots, header.block_size as usize)?;

    let mut raw = vec![0u8; header.required_capacity()];
    let t0 = Instant::now();
    let raw_len = ctx
        .decompress(&frame, &mut raw, dynamic_huffman)
        .context("decompressing")?;
    let elapsed = t0.elapsed();

    std::fs::write(&output, &raw[..raw_len])
        .with_context(|| format!("writing output file {:?}", output))?;

    eprintln!("  blocks      : {}", header.blocks());
    eprintln!("  raw size    : {}", human_bytes(raw_len as u64));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((raw_len as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let frame = std::fs::read(&file).with_context(|| format!("reading frame file {:?}", file))?;
    let header = FrameHeader::parse(&frame).context("parsing frame header")?;

    println!("=== qflate frame: {:?} ===", file);
    println!();
    println!(
        "  block size   : {}",
        human_bytes(header.block_size as u64)
    );
    println!("  last block   : {}", human_bytes(header.last_block_size as u64));
    println!(
        "  blocks       : {}{}",
        header.blocks(),
        if header.blocks() == 0 { " (single-block fast path)" } else { "" }
    );
    println!("  header bytes : {}", header.header_offset());
    println!("  raw size     : {}", human_bytes(header.raw_len() as u64));
    println!("  frame size   : {}", human_bytes(frame.len() as u64));
    println!(
        "  ratio        : {:.2}x",
        header.raw_len() as f64 / frame.len() as f64
    );

    if show_blocks && header.blocks() > 0 {
        println!();
        println!("  {:>8}  {:>12}  {:>12}", "block", "compressed", "raw");
        println!("  {}", "-".repeat(36));
        let plan_last = header.last_block_size;
        for (i, &size) in header.block_sizes.iter().enumerate() {
            let raw = if i + 1 == header.blocks() && plan_last > 0 {
                plan_last
            } else {
                header.block_size
            };
            println!(
                "  {:>8}  {:>12}  {:>12}",
                i,
                human_bytes(size as u64),
                human_bytes(raw as u64)
            );
        }
    }
    Ok(())
}

fn run_bench(
    file: PathBuf,
    iterations: usize,
    block_size: usize,
    slots: usize,
    level_name: &str,
    engine_name: &str,
) -> anyhow::Result<()> {
    let level = level_from_name(level_name)?;
    let data = std::fs::read(&file).with_context(|| format!("reading input file {:?}", file))?;
    let digest = xxh3_64(&data);
    let mut ctx = build_context(engine_name, slots, block_size)?;

    let mut frame = vec![0u8; worst_case_frame_size(data.len(), block_size)];
    let mut raw = vec![0u8; data.len()];
    let mut frame_len = 0usize;
    let mut compress_total = 0.0f64;
    let mut decompress_total = 0.0f64;

    eprintln!(
        "benchmarking {} round trips over {}...",
        iterations,
        human_bytes(data.len() as u64)
    );

    for _ in 0..iterations {
        let t0 = Instant::now();
        frame_len = ctx.compress(&data, &mut frame, level, false)?;
        compress_total += t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        let raw_len = ctx.decompress(&frame[..frame_len], &mut raw, false)?;
        decompress_total += t1.elapsed().as_secs_f64();

        if raw_len != data.len() || xxh3_64(&raw[..raw_len]) != digest {
            anyhow::bail!("round trip mismatch: output differs from input");
        }
    }

    let raw_bytes = (data.len() * iterations) as f64;
    println!();
    println!("=== Round-trip Benchmark ===");
    println!("  engine       : {}", ctx.engine_name());
    println!("  level        : {}", level_name);
    println!("  block size   : {}", human_bytes(block_size as u64));
    println!("  slots        : {}", slots);
    println!("  frame size   : {}", human_bytes(frame_len as u64));
    println!(
        "  ratio        : {:.2}x",
        data.len() as f64 / frame_len as f64
    );
    println!(
        "  compress     : {}/s",
        human_bytes((raw_bytes / compress_total) as u64)
    );
    println!(
        "  decompress   : {}/s",
        human_bytes((raw_bytes / decompress_total) as u64)
    );
    println!("  round trips  : {} (digest verified)", iterations);
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            block_size,
            slots,
            level,
            dynamic_huffman,
            engine,
        } => run_compress(input, output, block_size, slots, &level, dynamic_huffman, &engine),
        Commands::Decompress {
            input,
            output,
            slots,
            dynamic_huffman,
            engine,
        } => run_decompress(input, output, slots, dynamic_huffman, &engine),
        Commands::Inspect { file, blocks } => run_inspect(file, blocks),
        Commands::Bench {
            file,
            iterations,
            block_size,
            slots,
            level,
            engine,
        } => run_bench(file, iterations, block_size, slots, &level, &engine),
    }
}
