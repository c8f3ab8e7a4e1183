mod dataset;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flopack_codecs::{compressor_by_id, compressor_by_name};
use flopack_core::{
    inspect, scratch_capacity, ByteOrder, CodecConfig, Compressor, FloatCodec, FramedHeader,
    Precision, StreamFormat, MAGIC,
};

use dataset::{random_walk, Dataset};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "flopack",
    about = "Byte-plane compression for float arrays: generate, compress, inspect, and compare datasets",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a random-walk dataset of raw native floats
    Generate {
        output: PathBuf,
        /// Element width in bits: 32 | 64
        #[arg(short, long, default_value = "64", value_parser = parse_precision)]
        precision: Precision,
        /// Dataset size in MiB
        #[arg(long, default_value_t = 16)]
        size_mb: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Compress a raw float file
    Compress {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "64", value_parser = parse_precision)]
        precision: Precision,
        /// High-order bits to keep exactly (default: all)
        #[arg(long)]
        protect: Option<u16>,
        /// Compressor level (default: the compressor's own default)
        #[arg(short, long)]
        level: Option<i32>,
        /// Compressor: passthrough | zstd | lz4 | deflate
        #[arg(short, long, default_value = "zstd")]
        compressor: String,
        /// Stream layout: framed | legacy
        #[arg(long, value_parser = parse_format)]
        format: Option<StreamFormat>,
        /// Byte significance order: little | big | native
        #[arg(long, value_parser = parse_byte_order)]
        byte_order: Option<ByteOrder>,
        /// JSON codec configuration; flags override its fields
        #[arg(long)]
        config: Option<PathBuf>,
        /// Compress planes on the rayon pool
        #[arg(long)]
        parallel: bool,
        /// Store planes raw when compression does not shrink them
        #[arg(long)]
        raw_fallback: bool,
        /// Print per-plane entropy scores
        #[arg(long)]
        scores: bool,
    },
    /// Decompress a stream back to raw floats
    ///
    /// Framed streams describe themselves. Legacy streams need precision,
    /// element count, compressor and byte order on the command line.
    Decompress {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_parser = parse_precision)]
        precision: Option<Precision>,
        /// Element count (legacy streams only)
        #[arg(long)]
        count: Option<usize>,
        #[arg(short, long)]
        compressor: Option<String>,
        #[arg(long, value_parser = parse_byte_order)]
        byte_order: Option<ByteOrder>,
        /// Fail instead of warning when the stream length does not check out
        #[arg(long)]
        strict: bool,
    },
    /// Print the header and plane frames of a framed stream
    Inspect { file: PathBuf },
    /// Report the largest absolute difference between two raw float files
    Compare {
        first: PathBuf,
        second: PathBuf,
        #[arg(short, long, default_value = "64", value_parser = parse_precision)]
        precision: Precision,
    },
    /// Keep values within [min, max] and write them to `<input>.cln`
    Clean {
        input: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        min: f64,
        #[arg(long, allow_hyphen_values = true)]
        max: f64,
        #[arg(short, long, default_value = "64", value_parser = parse_precision)]
        precision: Precision,
        /// Reverse the bytes of each value before filtering
        #[arg(long)]
        swap: bool,
    },
    /// Compare lossy settings against plain whole-file compression
    Bench {
        input: PathBuf,
        #[arg(short, long, default_value = "64", value_parser = parse_precision)]
        precision: Precision,
        #[arg(short, long)]
        level: Option<i32>,
        #[arg(short, long, default_value = "zstd")]
        compressor: String,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn parse_precision(s: &str) -> Result<Precision, String> {
    match s {
        "32" | "single" | "f32" => Ok(Precision::Single),
        "64" | "double" | "f64" => Ok(Precision::Double),
        other => Err(format!("unknown precision '{}'. Valid options: 32, 64", other)),
    }
}

fn parse_byte_order(s: &str) -> Result<ByteOrder, String> {
    match s {
        "little" | "le" => Ok(ByteOrder::Little),
        "big" | "be" => Ok(ByteOrder::Big),
        "native" => Ok(ByteOrder::native()),
        other => Err(format!(
            "unknown byte order '{}'. Valid options: little, big, native",
            other
        )),
    }
}

fn parse_format(s: &str) -> Result<StreamFormat, String> {
    match s {
        "framed" => Ok(StreamFormat::Framed),
        "legacy" => Ok(StreamFormat::Legacy),
        other => Err(format!("unknown format '{}'. Valid options: framed, legacy", other)),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CodecConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {:?}", path))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {:?}", path))
        }
        None => Ok(CodecConfig::default()),
    }
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

fn throughput(bytes: u64, secs: f64) -> String {
    if secs <= 0.0 {
        return "-".to_string();
    }
    format!("{}/s", human_bytes((bytes as f64 / secs) as u64))
}

fn ratio(raw: u64, stored: u64) -> f64 {
    if stored == 0 {
        return 1.0;
    }
    raw as f64 / stored as f64
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_generate(output: PathBuf, precision: Precision, size_mb: usize, seed: u64) -> anyhow::Result<()> {
    let count = size_mb * 1024 * 1024 / precision.width();
    let walk = random_walk(count, seed);
    let data = match precision {
        Precision::Single => Dataset::Single(walk.into_iter().map(|v| v as f32).collect()),
        Precision::Double => Dataset::Double(walk),
    };
    data.save(&output)?;
    eprintln!("  elements    : {}", data.len());
    eprintln!("  size        : {}", human_bytes(data.byte_len()));
    eprintln!("  written to  : {:?}", output);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_compress(
    input: PathBuf,
    output: PathBuf,
    precision: Precision,
    protect: Option<u16>,
    level: Option<i32>,
    compressor_name: &str,
    format: Option<StreamFormat>,
    byte_order: Option<ByteOrder>,
    config: Option<PathBuf>,
    parallel: bool,
    raw_fallback: bool,
    scores: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(bits) = protect {
        config = config.with_protect_bits(bits);
    }
    if let Some(level) = level {
        config = config.with_level(level);
    }
    if let Some(format) = format {
        config = config.with_format(format);
    }
    if let Some(order) = byte_order {
        config = config.with_byte_order(order);
    }
    if parallel {
        config = config.with_parallel(true);
    }
    if raw_fallback {
        config = config.with_raw_fallback(true);
    }
    if scores {
        config = config.with_force_compression(false);
    }
    config.validate()?;

    let compressor = compressor_by_name(compressor_name)?;
    let data = Dataset::load(&input, precision, false)?;
    let codec = FloatCodec::new(config, compressor.clone());
    info!(input = ?input, elements = data.len(), "compressing");

    let t0 = Instant::now();
    let (stream, report) = data.compress(&codec)?;
    let elapsed = t0.elapsed().as_secs_f64();
    std::fs::write(&output, &stream).with_context(|| format!("writing {:?}", output))?;

    let raw = data.byte_len();
    eprintln!("  precision   : {} bits", precision.bits());
    eprintln!("  elements    : {}", data.len());
    eprintln!("  compressor  : {}", compressor.name());
    eprintln!(
        "  level       : {}",
        codec.config().level.unwrap_or_else(|| compressor.default_level())
    );
    eprintln!("  format      : {:?}", codec.config().format);
    eprintln!("  lossy bits  : {}", report.lossy_bits);
    eprintln!("  planes      : {}", report.layout());
    eprintln!("  raw size    : {}", human_bytes(raw));
    eprintln!("  compressed  : {}", human_bytes(stream.len() as u64));
    eprintln!("  ratio       : {:.2}x", ratio(raw, stream.len() as u64));
    eprintln!("  throughput  : {}", throughput(raw, elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);

    if scores {
        eprintln!();
        eprintln!("  {:>5}  {:>10}  {:>5}  {:>12}  {:>12}", "plane", "code", "score", "raw", "stored");
        eprintln!("  {}", "-".repeat(52));
        for p in &report.planes {
            let score = p.score.map_or_else(|| "-".to_string(), |s| s.to_string());
            eprintln!(
                "  {:>5}  {:>10}  {:>5}  {:>12}  {:>12}",
                p.position,
                p.code.label(),
                score,
                human_bytes(p.raw_len as u64),
                human_bytes(p.stored_len as u64)
            );
        }
    }
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: PathBuf,
    precision: Option<Precision>,
    count: Option<usize>,
    compressor_name: Option<String>,
    byte_order: Option<ByteOrder>,
    strict: bool,
) -> anyhow::Result<()> {
    let stream = std::fs::read(&input).with_context(|| format!("reading {:?}", input))?;

    let (codec, precision) = if stream.starts_with(MAGIC) {
        let header = FramedHeader::parse(&stream)?;
        let compressor = compressor_by_id(header.compressor_id)?;
        if let Some(p) = precision.filter(|&p| p != header.precision) {
            warn!(
                requested = p.bits(),
                stored = header.precision.bits(),
                "ignoring --precision, the stream records its own"
            );
        }
        (FloatCodec::new(CodecConfig::default(), compressor), header.precision)
    } else {
        let precision = precision.context("legacy stream: --precision is required")?;
        if count.is_none() {
            anyhow::bail!("legacy stream: --count is required");
        }
        let name = compressor_name.context("legacy stream: --compressor is required")?;
        let config = CodecConfig::default()
            .with_format(StreamFormat::Legacy)
            .with_byte_order(byte_order.unwrap_or_else(ByteOrder::native));
        (FloatCodec::new(config, compressor_by_name(&name)?), precision)
    };

    let t0 = Instant::now();
    let (data, clean) = Dataset::decompress(&codec, precision, &stream, count)?;
    let elapsed = t0.elapsed().as_secs_f64();
    if !clean {
        if strict {
            anyhow::bail!("stream length does not match its declared length");
        }
        eprintln!("  warning     : stream length does not match its declared length");
    }
    data.save(&output)?;

    eprintln!("  elements    : {}", data.len());
    eprintln!("  raw size    : {}", human_bytes(data.byte_len()));
    eprintln!("  throughput  : {}", throughput(data.byte_len(), elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);
    Ok(())
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let stream = std::fs::read(&file).with_context(|| format!("reading {:?}", file))?;
    let summary = inspect(&stream)?;
    let header = &summary.header;
    let compressor = compressor_by_id(header.compressor_id)
        .map(|c| c.name().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    println!("=== flopack stream: {:?} ===", file);
    println!();
    println!("  format version : {}", header.version);
    println!("  precision      : {} bits", header.precision.bits());
    println!("  byte order     : {:?}", header.byte_order);
    println!("  compressor     : {} (id={})", compressor, header.compressor_id);
    println!("  lossy bits     : {}", header.lossy_bits);
    println!("  elements       : {}", header.element_count);
    println!("  raw size       : {}", human_bytes(summary.raw_size()));
    println!("  stream size    : {}", human_bytes(header.total_len));
    println!("  file on disk   : {}", human_bytes(stream.len() as u64));
    println!("  ratio          : {:.2}x", summary.ratio());
    println!("  checksum       : {:016x}", header.checksum);
    println!();
    println!("  {:>5}  {:>10}  {:>12}", "plane", "code", "payload");
    println!("  {}", "-".repeat(31));
    for (i, frame) in summary.frames.iter().enumerate() {
        println!(
            "  {:>5}  {:>10}  {:>12}",
            i,
            frame.code.label(),
            human_bytes(frame.stored_len())
        );
    }
    Ok(())
}

fn run_compare(first: PathBuf, second: PathBuf, precision: Precision) -> anyhow::Result<()> {
    let a = Dataset::load(&first, precision, false)?;
    let b = Dataset::load(&second, precision, false)?;
    if a.len() != b.len() {
        warn!(first = a.len(), second = b.len(), "files differ in element count");
        eprintln!(
            "  warning     : sizes differ ({} vs {} elements), comparing the first {}",
            a.len(),
            b.len(),
            a.len().min(b.len())
        );
    }
    println!("Max. error is {:e}", a.max_abs_error(&b));
    Ok(())
}

fn run_clean(input: PathBuf, min: f64, max: f64, precision: Precision, swap: bool) -> anyhow::Result<()> {
    if min > max {
        anyhow::bail!("--min {} is above --max {}", min, max);
    }
    let mut data = Dataset::load(&input, precision, swap)?;
    let before = data.len();
    data.retain_range(min, max);

    let mut output = input.clone().into_os_string();
    output.push(".cln");
    let output = PathBuf::from(output);
    data.save(&output)?;

    let values = data.to_f64();
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    eprintln!("  kept        : {} of {}", data.len(), before);
    eprintln!("  written to  : {:?}", output);
    if values.is_empty() {
        println!("No values between {} and {}", min, max);
    } else {
        println!("All values between {} and {}", lo, hi);
    }
    Ok(())
}

fn run_bench(
    input: PathBuf,
    precision: Precision,
    level: Option<i32>,
    compressor_name: &str,
) -> anyhow::Result<()> {
    let compressor: Arc<dyn Compressor> = compressor_by_name(compressor_name)?;
    let level = level.unwrap_or_else(|| compressor.default_level());
    let data = Dataset::load(&input, precision, false)?;
    let raw = data.byte_len();
    let width_bits = precision.bits();

    println!();
    println!(
        "=== {} level {}, {} elements ({}) ===",
        compressor.name(),
        level,
        data.len(),
        human_bytes(raw)
    );
    println!(
        "  {:>6}  {:>12}  {:>12}  {:>8}  {:>10}  {:>14}  {:>10}  {:>14}  {:>12}",
        "lossy", "input", "output", "ratio", "comp", "comp rate", "decomp", "decomp rate", "max error"
    );
    println!("  {}", "-".repeat(116));

    for lossy in [16u16, 8, 0] {
        let config = CodecConfig::default()
            .with_level(level)
            .with_protect_bits(width_bits - lossy);
        let codec = FloatCodec::new(config, compressor.clone());

        let t0 = Instant::now();
        let (stream, _) = data.compress(&codec)?;
        let comp = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        let (back, _) = Dataset::decompress(&codec, precision, &stream, None)?;
        let decomp = t1.elapsed().as_secs_f64();

        println!(
            "  {:>6}  {:>12}  {:>12}  {:>7.2}x  {:>9.3}s  {:>14}  {:>9.3}s  {:>14}  {:>12.3e}",
            lossy,
            human_bytes(raw),
            human_bytes(stream.len() as u64),
            ratio(raw, stream.len() as u64),
            comp,
            throughput(raw, comp),
            decomp,
            throughput(raw, decomp),
            data.max_abs_error(&back)
        );
    }

    // Plain generic compression of the whole file as the baseline.
    let bytes = std::fs::read(&input).with_context(|| format!("reading {:?}", input))?;
    let mut packed = vec![0u8; scratch_capacity(bytes.len())];
    let t0 = Instant::now();
    let n = compressor.compress(&mut packed, &bytes, level)?;
    let comp = t0.elapsed().as_secs_f64();

    let mut unpacked = vec![0u8; bytes.len()];
    let t1 = Instant::now();
    let restored = compressor.decompress(&mut unpacked, &packed[..n])?;
    let decomp = t1.elapsed().as_secs_f64();
    if restored != bytes.len() || unpacked != bytes {
        anyhow::bail!("{} did not restore the input", compressor.name());
    }

    println!(
        "  {:>6}  {:>12}  {:>12}  {:>7.2}x  {:>9.3}s  {:>14}  {:>9.3}s  {:>14}  {:>12}",
        "plain",
        human_bytes(bytes.len() as u64),
        human_bytes(n as u64),
        ratio(bytes.len() as u64, n as u64),
        comp,
        throughput(bytes.len() as u64, comp),
        decomp,
        throughput(bytes.len() as u64, decomp),
        "-"
    );
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: Level = level
        .parse()
        .with_context(|| format!("invalid log level '{}'", level))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Generate {
            output,
            precision,
            size_mb,
            seed,
        } => run_generate(output, precision, size_mb, seed),
        Commands::Compress {
            input,
            output,
            precision,
            protect,
            level,
            compressor,
            format,
            byte_order,
            config,
            parallel,
            raw_fallback,
            scores,
        } => run_compress(
            input,
            output,
            precision,
            protect,
            level,
            &compressor,
            format,
            byte_order,
            config,
            parallel,
            raw_fallback,
            scores,
        ),
        Commands::Decompress {
            input,
            output,
            precision,
            count,
            compressor,
            byte_order,
            strict,
        } => run_decompress(input, output, precision, count, compressor, byte_order, strict),
        Commands::Inspect { file } => run_inspect(file),
        Commands::Compare {
            first,
            second,
            precision,
        } => run_compare(first, second, precision),
        Commands::Clean {
            input,
            min,
            max,
            precision,
            swap,
        } => run_clean(input, min, max, precision, swap),
        Commands::Bench {
            input,
            precision,
            level,
            compressor,
        } => run_bench(input, precision, level, &compressor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_values() {
        assert_eq!(parse_precision("32").unwrap(), Precision::Single);
        assert_eq!(parse_precision("f64").unwrap(), Precision::Double);
        assert!(parse_precision("16").is_err());
        assert_eq!(parse_byte_order("be").unwrap(), ByteOrder::Big);
        assert_eq!(parse_byte_order("native").unwrap(), ByteOrder::native());
        assert_eq!(parse_format("legacy").unwrap(), StreamFormat::Legacy);
        assert!(parse_format("zip").is_err());
    }

    #[test]
    fn config_file_overlays_defaults() {
        let path = std::env::temp_dir().join("flopack_cli_test_config.json");
        std::fs::write(&path, r#"{ "protect_bits": 40, "format": "legacy", "byte_order": "big" }"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.protect_bits, Some(40));
        assert_eq!(config.format, StreamFormat::Legacy);
        assert_eq!(config.byte_order, ByteOrder::Big);
        assert!(config.force_compression);
        assert_eq!(load_config(None).unwrap(), CodecConfig::default());
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.00 KB");
        assert_eq!(ratio(100, 0), 1.0);
    }
}
