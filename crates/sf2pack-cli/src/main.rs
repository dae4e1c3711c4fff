//! sf2pack — SoundFont conversion/compression utility.
//!
//! Reads a SoundFont bank in any of the three on-disk variants and rewrites
//! it in a chosen target format:
//!
//! ```bash
//! sf2pack -zo2 piano.sf2 piano.sf3    # compress with Ogg Vorbis, high quality
//! sf2pack -zf  piano.sf2 piano.sf4    # compress with FLAC
//! sf2pack -x   piano.sf3 piano.sf2    # expand back to raw PCM
//! sf2pack -d   piano.sf2 piano.sf2    # dump the preset inventory
//! ```
//!
//! Flags combine into a single token (`-zf2` ≡ `-z -f -2`). Exit codes:
//! 0 success, 1 bad arguments, 2 no action flag, 3 read or write failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use sf2pack_codec::Quality;
use sf2pack_format::{FileFormat, SoundFont};

// ───────────────────────── CLI definition ─────────────────────────

/// Top-level CLI entry point for the `sf2pack` binary.
#[derive(Parser)]
#[command(
    name = "sf2pack",
    about = "SoundFont compression utility -- converts between SF2, SF3 (Ogg Vorbis) and SF4 (FLAC)",
    version
)]
struct Cli {
    /// Expand to SF2 format (raw PCM samples).
    #[arg(short = 'x')]
    expand: bool,

    /// Compress to SF3 format (Ogg Vorbis samples).
    #[arg(short = 'z')]
    compress: bool,

    /// Compress to SF3 format (Ogg Vorbis samples).
    #[arg(short = 'o')]
    vorbis: bool,

    /// Compress to SF4 format (FLAC samples).
    #[arg(short = 'f')]
    flac: bool,

    /// Dump the preset inventory to stderr.
    #[arg(short = 'd')]
    dump: bool,

    /// Low quality.
    #[arg(short = '0')]
    quality_low: bool,

    /// Medium quality.
    #[arg(short = '1')]
    quality_medium: bool,

    /// High quality (default).
    #[arg(short = '2')]
    quality_high: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Input SoundFont file (SF2, SF3 or SF4).
    infile: PathBuf,

    /// Output SoundFont file.
    outfile: PathBuf,
}

/// Resolve the target format from the action flags. When several combine,
/// FLAC outranks Vorbis, which outranks plain expansion.
fn target_format(cli: &Cli) -> Option<FileFormat> {
    let mut format = None;
    if cli.expand {
        format = Some(FileFormat::Sf2);
    }
    if cli.compress || cli.vorbis {
        format = Some(FileFormat::Sf3);
    }
    if cli.flac {
        format = Some(FileFormat::Sf4);
    }
    format
}

/// Resolve the quality flags; the highest given flag wins, default high.
fn quality(cli: &Cli) -> Quality {
    if cli.quality_high {
        Quality::High
    } else if cli.quality_medium {
        Quality::Medium
    } else if cli.quality_low {
        Quality::Low
    } else {
        Quality::High
    }
}

// ────────────────────────────── main ──────────────────────────────

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders its own usage and error text
            let _ = err.print();
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::from(1),
            };
        }
    };

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let format = target_format(&cli);
    if format.is_none() && !cli.dump {
        eprintln!("{}", Cli::command().render_usage());
        eprintln!("no action flag given: use -x, -z, -o or -f to convert, -d to dump presets");
        return ExitCode::from(2);
    }

    match run(&cli, format) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(3)
        }
    }
}

fn run(cli: &Cli, format: Option<FileFormat>) -> anyhow::Result<()> {
    let mut font = SoundFont::open(&cli.infile)
        .with_context(|| format!("error reading {}", cli.infile.display()))?;

    if cli.dump {
        dump_presets(&font);
    }

    if let Some(format) = format {
        font.write(&cli.outfile, format, quality(cli))
            .with_context(|| format!("error writing {}", cli.outfile.display()))?;
    }
    Ok(())
}

/// Print one line per preset: `idx bank-program name`, in model order.
fn dump_presets(font: &SoundFont) {
    for (idx, preset) in font.presets.iter().enumerate() {
        eprintln!(
            "{:03} {:04x}-{:02x} {}",
            idx, preset.bank, preset.program, preset.name
        );
    }
}
