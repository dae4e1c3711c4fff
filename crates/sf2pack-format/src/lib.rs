//! # sf2pack-format
//!
//! The SoundFont container library. Handles reading and writing SF2 banks
//! and their compressed SF3 (Ogg Vorbis) / SF4 (FLAC) variants, including
//! the RIFF chunk tree, preset/instrument/sample tables, and the
//! non-standard `shdX` verification chunk.
//!
//! ## Format overview
//!
//! A SoundFont file is a `RIFF "sfbk"` tree with three LIST chunks:
//! - **INFO** — version (`ifil`) and text metadata
//! - **sdta** — the `smpl` chunk holding all sample payloads
//! - **pdta** — preset/instrument/sample tables
//!   (`phdr pbag pmod pgen inst ibag imod igen shdr`, optionally `shdX`)
//!
//! ## Example
//! ```rust,no_run
//! use std::path::Path;
//! use sf2pack_format::{FileFormat, Quality, SoundFont};
//!
//! let mut font = SoundFont::open(Path::new("bank.sf2")).unwrap();
//! println!("{} presets, {} samples", font.presets.len(), font.samples.len());
//! font.write(Path::new("bank.sf3"), FileFormat::Sf3, Quality::High).unwrap();
//! ```

pub mod error;
pub mod model;
pub mod reader;
pub mod riff;
pub mod writer;

pub use error::{Result, SoundFontError};
pub use model::{
    FileFormat, GenAmount, Generator, GeneratorKind, Instrument, Modulator, Preset, Sample,
    SampleCompression, SampleMeta, SampleType, SoundFont, SoundFontInfo, Zone,
};
pub use reader::ReadOptions;
pub use riff::FourCC;

pub use sf2pack_codec::Quality;
