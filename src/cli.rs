// Command-line interface for the RVL codec.
//
// Subcommands convert between RVL frames and raster files (binary PGM or
// raw little-endian samples) and print frame information.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::depth::DepthLinearizer;
use crate::error::{Result, RvlError};
use crate::io::{self, DecodeStats, EncodeStats};
use crate::raster;
use crate::rvl::header::{BINARY_HEADER_LEN, HARD_MAX_PIXELS};
use crate::rvl::{ClipPlanes, CodecOptions, DepthFrame, HeaderShape, NibbleOrder};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Lossless RVL depth-frame encoder/decoder.
#[derive(Parser, Debug)]
#[command(
    name = "rvl",
    version,
    about = "RVL depth-frame encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode an RVL frame to a raster file.
    Decode(DecodeArgs),
    /// Encode a raster file as an RVL frame.
    Encode(EncodeArgs),
    /// Print header fields and run statistics of an RVL frame.
    Info(InfoArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// Binary PGM (P5), 16-bit big-endian samples.
    Pgm,
    /// Headerless little-endian u16 samples.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HeaderArg {
    Binary,
    Textual,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Input RVL file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output raster file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Output raster format.
    #[arg(long, value_enum, default_value_t = FormatArg::Pgm)]
    format: FormatArg,

    /// Convert samples to linear depth using the frame's clip planes.
    #[arg(long)]
    linearize: bool,

    /// Payload uses the legacy least-significant-first nibble order.
    #[arg(long)]
    legacy: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Input raster: binary PGM, or raw samples when --width/--height are given.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output RVL file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Width of a raw input.
    #[arg(long, requires = "height", value_parser = clap::value_parser!(u32).range(1..))]
    width: Option<u32>,

    /// Height of a raw input.
    #[arg(long, requires = "width", value_parser = clap::value_parser!(u32).range(1..))]
    height: Option<u32>,

    /// Near clip plane stored in the header.
    #[arg(long, requires = "far", allow_negative_numbers = true)]
    near: Option<f32>,

    /// Far clip plane stored in the header.
    #[arg(long, requires = "near", allow_negative_numbers = true)]
    far: Option<f32>,

    /// Header shape to write.
    #[arg(long, value_enum, default_value_t = HeaderArg::Binary)]
    header: HeaderArg,

    /// Write the legacy least-significant-first nibble order.
    #[arg(long)]
    legacy: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Input RVL file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Payload uses the legacy least-significant-first nibble order.
    #[arg(long)]
    legacy: bool,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Decode,
    Encode,
    Info,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    codec: CodecOptions,
    format: FormatArg,
    linearize: bool,
    raw_dims: Option<(u32, u32)>,
    clip: Option<(f32, f32)>,
}

fn nibble_order(legacy: bool) -> NibbleOrder {
    if legacy {
        NibbleOrder::LeastSignificantFirst
    } else {
        NibbleOrder::MostSignificantFirst
    }
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        input_file: None,
        output_file: None,
        codec: CodecOptions::default(),
        format: FormatArg::Pgm,
        linearize: false,
        raw_dims: None,
        clip: None,
    };

    match cli.command {
        Cmd::Decode(args) => {
            opts.command = Command::Decode;
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
            opts.codec.nibble_order = nibble_order(args.legacy);
            opts.format = args.format;
            opts.linearize = args.linearize;
        }
        Cmd::Encode(args) => {
            opts.command = Command::Encode;
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
            opts.codec = CodecOptions {
                nibble_order: nibble_order(args.legacy),
                header_shape: match args.header {
                    HeaderArg::Binary => HeaderShape::Binary,
                    HeaderArg::Textual => HeaderShape::Textual,
                },
            };
            opts.raw_dims = args.width.zip(args.height);
            opts.clip = args.near.zip(args.far);
        }
        Cmd::Info(args) => {
            opts.command = Command::Info;
            opts.input_file = Some(args.input);
            opts.codec.nibble_order = nibble_order(args.legacy);
        }
        Cmd::Config => {}
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("rvl".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hex(digest: &Option<[u8; 32]>) -> Option<String> {
    digest.map(|d| d.iter().map(|b| format!("{b:02x}")).collect())
}

fn print_json(json: &serde_json::Value) {
    if let Ok(text) = serde_json::to_string_pretty(json) {
        eprintln!("{text}");
    }
}

fn check_output(path: &Path, force: bool) -> bool {
    if path.exists() && !force {
        eprintln!(
            "rvl: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return false;
    }
    true
}

fn order_name(order: NibbleOrder) -> &'static str {
    match order {
        NibbleOrder::MostSignificantFirst => "msb-first",
        NibbleOrder::LeastSignificantFirst => "lsb-first",
    }
}

fn shape_name(shape: HeaderShape) -> &'static str {
    match shape {
        HeaderShape::Binary => "binary",
        HeaderShape::Textual => "textual",
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("rvl version {version} (Rust)");

    let file_io = cfg!(feature = "file-io") as u8;
    let defaults = CodecOptions::default();

    eprintln!("FILE_IO={file_io}");
    eprintln!("DEFAULT_NIBBLE_ORDER={}", order_name(defaults.nibble_order));
    eprintln!("DEFAULT_HEADER={}", shape_name(defaults.header_shape));
    eprintln!("BINARY_HEADER_LEN={BINARY_HEADER_LEN}");
    eprintln!("HARD_MAX_PIXELS={HARD_MAX_PIXELS}");

    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn decode_to_raster(opts: &Options, input: &Path, output: &Path) -> Result<DecodeStats> {
    let (frame, stats) = io::read_frame(input, &opts.codec)?;
    let frame = if opts.linearize {
        DepthLinearizer::linearize_frame(&frame)?
    } else {
        frame
    };
    let bytes = match opts.format {
        FormatArg::Pgm => raster::to_pgm(&frame)?,
        FormatArg::Raw => frame.to_le_bytes(),
    };
    io::write_bytes(output, &bytes)?;
    Ok(stats)
}

fn cmd_decode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        return 1;
    };
    if !check_output(output, opts.force) {
        return 1;
    }

    match decode_to_raster(opts, input, output) {
        Ok(stats) => {
            if opts.verbose > 0 && !opts.quiet {
                eprintln!(
                    "rvl: decoder: {}x{}, {} segments, input size: {}",
                    stats.width, stats.height, stats.runs.segments, stats.encoded_size
                );
            }
            if opts.json_output {
                print_json(&serde_json::json!({
                    "command": "decode",
                    "width": stats.width,
                    "height": stats.height,
                    "input_size": stats.encoded_size,
                    "segments": stats.runs.segments,
                    "linearized": opts.linearize,
                    "pixels_sha256": hex(&stats.pixels_sha256),
                }));
            }
            0
        }
        Err(e) => {
            eprintln!("rvl: decode error: {}: {e}", input.display());
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn load_raster(path: &Path, raw_dims: Option<(u32, u32)>) -> Result<DepthFrame> {
    let bytes = std::fs::read(path)?;
    match raw_dims {
        Some((width, height)) => {
            let expected = width as usize * height as usize * 2;
            if bytes.len() != expected {
                return Err(RvlError::Raster(format!(
                    "raw input is {} bytes, {width}x{height} needs {expected}",
                    bytes.len()
                )));
            }
            let pixels = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            DepthFrame::new(width, height, pixels)
        }
        None => raster::read_pgm(&bytes),
    }
}

fn encode_from_raster(opts: &Options, input: &Path, output: &Path) -> Result<EncodeStats> {
    let clip = opts
        .clip
        .map(|(near, far)| ClipPlanes::new(near, far))
        .transpose()?;
    let frame = load_raster(input, opts.raw_dims)?.with_clip_planes(clip);
    io::write_frame(output, &frame, &opts.codec)
}

fn cmd_encode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        return 1;
    };
    if !check_output(output, opts.force) {
        return 1;
    }

    match encode_from_raster(opts, input, output) {
        Ok(stats) => {
            if opts.verbose > 0 && !opts.quiet {
                eprintln!(
                    "rvl: encoder: {}x{}, raw size: {}, output size: {}, ratio: {:.2}",
                    stats.width,
                    stats.height,
                    stats.raw_size,
                    stats.encoded_size,
                    stats.ratio()
                );
            }
            if opts.json_output {
                print_json(&serde_json::json!({
                    "command": "encode",
                    "width": stats.width,
                    "height": stats.height,
                    "raw_size": stats.raw_size,
                    "output_size": stats.encoded_size,
                    "header": shape_name(stats.header_shape),
                    "nibble_order": order_name(opts.codec.nibble_order),
                    "segments": stats.runs.segments,
                    "pixels_sha256": hex(&stats.pixels_sha256),
                }));
            }
            0
        }
        Err(e) => {
            eprintln!("rvl: encode error: {}: {e}", input.display());
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options) -> i32 {
    let Some(input) = &opts.input_file else {
        return 1;
    };
    let (frame, stats) = match io::read_frame(input, &opts.codec) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("rvl: {}: {e}", input.display());
            return 1;
        }
    };

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "info",
            "header": shape_name(stats.header_shape),
            "width": stats.width,
            "height": stats.height,
            "near": frame.clip_planes().map(|c| c.near()),
            "far": frame.clip_planes().map(|c| c.far()),
            "file_size": stats.encoded_size,
            "payload_size": stats.payload_size,
            "trailing_bytes": stats.trailing_bytes,
            "segments": stats.runs.segments,
            "zero_pixels": stats.runs.zero_pixels,
            "nonzero_pixels": stats.runs.nonzero_pixels,
            "pixels_sha256": hex(&stats.pixels_sha256),
        }));
    }
    if opts.quiet {
        return 0;
    }

    println!("RVL header:             {}", shape_name(stats.header_shape));
    println!("Dimensions:             {}x{}", stats.width, stats.height);
    match frame.clip_planes() {
        Some(clip) => println!("Clip planes:            {} {}", clip.near(), clip.far()),
        None => println!("Clip planes:            none"),
    }
    println!("Nibble order:           {}", order_name(opts.codec.nibble_order));
    println!("File size:              {}", stats.encoded_size);
    println!("Payload size:           {}", stats.payload_size);
    println!("Trailing bytes:         {}", stats.trailing_bytes);
    println!("Segments:               {}", stats.runs.segments);
    println!("Zero pixels:            {}", stats.runs.zero_pixels);
    println!("Nonzero pixels:         {}", stats.runs.nonzero_pixels);
    if let Some(sha) = hex(&stats.pixels_sha256) {
        println!("Pixels SHA-256:         {sha}");
    }
    if opts.verbose > 1 {
        let (min, max) = frame
            .pixels()
            .iter()
            .filter(|&&p| p != 0)
            .fold((u16::MAX, 0u16), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        if min <= max {
            println!("Nonzero range:          {min}..={max}");
        }
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Decode => cmd_decode(&opts),
        Command::Encode => cmd_encode(&opts),
        Command::Info => cmd_info(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
