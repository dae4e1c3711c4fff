//! In-memory SoundFont entities: the bank itself, presets, instruments,
//! zones, generators, modulators, samples, and the optional per-sample
//! verification metadata.
//!
//! Ownership is strictly hierarchical: the bank owns presets, instruments,
//! and samples; presets and instruments own their zones; zones own their
//! generators and modulators. Cross-entity references (zone → instrument,
//! zone → sample) are integer indices stored in generator amounts and are
//! resolved on demand, never materialized as pointers.

use sf2pack_codec::{FlacCodec, PcmCodec, SampleCodec, VorbisCodec};

/// On-disk record sizes, including each table's sentinel record.
pub const PHDR_RECORD_SIZE: u32 = 38;
pub const BAG_RECORD_SIZE: u32 = 4;
pub const MOD_RECORD_SIZE: u32 = 10;
pub const GEN_RECORD_SIZE: u32 = 4;
pub const INST_RECORD_SIZE: u32 = 22;
pub const SHDR_RECORD_SIZE: u32 = 46;
pub const SAMPLE_META_SIZE: u32 = 32;

/// Fixed width of every name field.
pub const NAME_LEN: usize = 20;

/// The three on-disk variants, selected by the `ifil` major version:
/// 2 = raw PCM, 3 = Ogg Vorbis payloads, 4 = FLAC payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Sf2,
    Sf3,
    Sf4,
}

impl FileFormat {
    /// Classify a bank by its `ifil` major version. Unknown majors are
    /// treated as plain SF2.
    pub fn from_version_major(major: u16) -> Self {
        match major {
            3 => FileFormat::Sf3,
            4 => FileFormat::Sf4,
            _ => FileFormat::Sf2,
        }
    }

    /// The `ifil` major version written for this format.
    pub fn version_major(self) -> u16 {
        match self {
            FileFormat::Sf2 => 2,
            FileFormat::Sf3 => 3,
            FileFormat::Sf4 => 4,
        }
    }

    /// The sample payload encoding this format uses.
    pub fn compression(self) -> SampleCompression {
        match self {
            FileFormat::Sf2 => SampleCompression::Raw,
            FileFormat::Sf3 => SampleCompression::Vorbis,
            FileFormat::Sf4 => SampleCompression::Flac,
        }
    }
}

/// Sample payload encoding, derived from the `sampletype` compression bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCompression {
    Raw,
    Vorbis,
    Flac,
}

impl SampleCompression {
    /// Instantiate the codec implementing this encoding.
    pub fn codec(self) -> Box<dyn SampleCodec> {
        match self {
            SampleCompression::Raw => Box::new(PcmCodec),
            SampleCompression::Vorbis => Box::new(VorbisCodec),
            SampleCompression::Flac => Box::new(FlacCodec),
        }
    }

    pub fn codec_name(self) -> &'static str {
        match self {
            SampleCompression::Raw => "pcm",
            SampleCompression::Vorbis => "vorbis",
            SampleCompression::Flac => "flac",
        }
    }
}

/// The `sampletype` bitfield: channel bits plus additive compression bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleType(pub u16);

impl SampleType {
    pub const MONO: u16 = 1;
    pub const RIGHT: u16 = 2;
    pub const LEFT: u16 = 4;
    pub const LINKED: u16 = 8;
    /// Payload is an Ogg Vorbis stream (SF3).
    pub const VORBIS: u16 = 16;
    /// Payload is a FLAC stream (SF4).
    pub const FLAC: u16 = 32;
    pub const ROM: u16 = 0x8000;

    pub fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u16) {
        self.0 &= !flag;
    }
}

/// The SF2 generator enumeration. Stored on disk as a raw `u16`; this enum
/// exists to classify the handful of kinds whose amount is not a plain
/// signed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GeneratorKind {
    StartAddrOfs = 0,
    EndAddrOfs = 1,
    StartLoopAddrOfs = 2,
    EndLoopAddrOfs = 3,
    StartAddrCoarseOfs = 4,
    ModLfoToPitch = 5,
    VibLfoToPitch = 6,
    ModEnvToPitch = 7,
    FilterFc = 8,
    FilterQ = 9,
    ModLfoToFilterFc = 10,
    ModEnvToFilterFc = 11,
    EndAddrCoarseOfs = 12,
    ModLfoToVolume = 13,
    Unused1 = 14,
    ChorusSend = 15,
    ReverbSend = 16,
    Pan = 17,
    Unused2 = 18,
    Unused3 = 19,
    Unused4 = 20,
    ModLfoDelay = 21,
    ModLfoFreq = 22,
    VibLfoDelay = 23,
    VibLfoFreq = 24,
    ModEnvDelay = 25,
    ModEnvAttack = 26,
    ModEnvHold = 27,
    ModEnvDecay = 28,
    ModEnvSustain = 29,
    ModEnvRelease = 30,
    KeyToModEnvHold = 31,
    KeyToModEnvDecay = 32,
    VolEnvDelay = 33,
    VolEnvAttack = 34,
    VolEnvHold = 35,
    VolEnvDecay = 36,
    VolEnvSustain = 37,
    VolEnvRelease = 38,
    KeyToVolEnvHold = 39,
    KeyToVolEnvDecay = 40,
    Instrument = 41,
    Reserved1 = 42,
    KeyRange = 43,
    VelRange = 44,
    StartLoopAddrCoarseOfs = 45,
    Keynum = 46,
    Velocity = 47,
    Attenuation = 48,
    Reserved2 = 49,
    EndLoopAddrCoarseOfs = 50,
    CoarseTune = 51,
    FineTune = 52,
    SampleId = 53,
    SampleModes = 54,
    Reserved3 = 55,
    ScaleTune = 56,
    ExclusiveClass = 57,
    OverrideRootKey = 58,
    Dummy = 59,
}

impl GeneratorKind {
    pub fn from_u16(value: u16) -> Option<Self> {
        use GeneratorKind::*;
        Some(match value {
            0 => StartAddrOfs,
            1 => EndAddrOfs,
            2 => StartLoopAddrOfs,
            3 => EndLoopAddrOfs,
            4 => StartAddrCoarseOfs,
            5 => ModLfoToPitch,
            6 => VibLfoToPitch,
            7 => ModEnvToPitch,
            8 => FilterFc,
            9 => FilterQ,
            10 => ModLfoToFilterFc,
            11 => ModEnvToFilterFc,
            12 => EndAddrCoarseOfs,
            13 => ModLfoToVolume,
            14 => Unused1,
            15 => ChorusSend,
            16 => ReverbSend,
            17 => Pan,
            18 => Unused2,
            19 => Unused3,
            20 => Unused4,
            21 => ModLfoDelay,
            22 => ModLfoFreq,
            23 => VibLfoDelay,
            24 => VibLfoFreq,
            25 => ModEnvDelay,
            26 => ModEnvAttack,
            27 => ModEnvHold,
            28 => ModEnvDecay,
            29 => ModEnvSustain,
            30 => ModEnvRelease,
            31 => KeyToModEnvHold,
            32 => KeyToModEnvDecay,
            33 => VolEnvDelay,
            34 => VolEnvAttack,
            35 => VolEnvHold,
            36 => VolEnvDecay,
            37 => VolEnvSustain,
            38 => VolEnvRelease,
            39 => KeyToVolEnvHold,
            40 => KeyToVolEnvDecay,
            41 => Instrument,
            42 => Reserved1,
            43 => KeyRange,
            44 => VelRange,
            45 => StartLoopAddrCoarseOfs,
            46 => Keynum,
            47 => Velocity,
            48 => Attenuation,
            49 => Reserved2,
            50 => EndLoopAddrCoarseOfs,
            51 => CoarseTune,
            52 => FineTune,
            53 => SampleId,
            54 => SampleModes,
            55 => Reserved3,
            56 => ScaleTune,
            57 => ExclusiveClass,
            58 => OverrideRootKey,
            59 => Dummy,
            _ => return None,
        })
    }
}

/// Whether a generator kind stores its amount as a `(lo, hi)` byte pair.
pub(crate) fn gen_amount_is_range(kind: u16) -> bool {
    kind == GeneratorKind::KeyRange as u16 || kind == GeneratorKind::VelRange as u16
}

/// Whether a generator kind stores its amount as an unsigned index into
/// the instrument table (`pgen`) or sample table (`igen`).
pub(crate) fn gen_amount_is_index(kind: u16, instrument_zone: bool) -> bool {
    kind == GeneratorKind::Instrument as u16
        || (instrument_zone && kind == GeneratorKind::SampleId as u16)
}

/// A generator amount, interpreted per generator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenAmount {
    /// Plain signed value (the common case).
    Value(i16),
    /// Unsigned index into the instrument or sample table.
    Index(u16),
    /// Key or velocity range.
    Range { lo: u8, hi: u8 },
}

impl Default for GenAmount {
    fn default() -> Self {
        GenAmount::Value(0)
    }
}

/// A typed synthesis parameter. `kind` is kept as the raw on-disk word so
/// that unknown kinds survive a rewrite untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generator {
    pub kind: u16,
    pub amount: GenAmount,
}

impl Generator {
    pub fn kind_enum(&self) -> Option<GeneratorKind> {
        GeneratorKind::from_u16(self.kind)
    }
}

/// A modulator routing. Stored opaquely; no semantic interpretation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modulator {
    pub src: u16,
    pub dst: u16,
    pub amount: i16,
    pub amt_src: u16,
    pub transform: u16,
}

/// A region of key/velocity space with its own generators and modulators.
///
/// Belongs to exactly one preset or instrument. The first zone of a preset
/// or instrument may be a global zone (no terminal Instrument/SampleId
/// generator); that convention is carried through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zone {
    pub generators: Vec<Generator>,
    pub modulators: Vec<Modulator>,
}

/// A MIDI-addressable sound: bank + program number plus an ordered zone
/// list. Zone order is observable in the `pbag` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
    pub zones: Vec<Zone>,
}

/// A reusable layer of zones referencing samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instrument {
    pub name: String,
    pub zones: Vec<Zone>,
}

/// Pre-compression sample metadata carried by the non-standard `shdX`
/// chunk, used to verify loops and lengths after a lossy round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleMeta {
    pub name: String,
    /// Original number of samples, before compression.
    pub orig_samples: u32,
    /// Loop start, relative to the first sample.
    pub loopstart: u32,
    /// Loop end, relative to the first sample.
    pub loopend: u32,
}

/// A mono 16-bit PCM clip with rate, pitch, and loop information.
///
/// On disk, `start`/`end` are offsets into the `smpl` chunk — measured in
/// samples for SF2 and in bytes for SF3/SF4 — and loop points are absolute
/// for SF2 but relative to `start` for the compressed formats. After
/// loading, everything is normalized: `start == 0`, `end == pcm.len()`,
/// and loops are relative to the first sample. The writer re-derives the
/// on-disk form for the target encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loopstart: u32,
    pub loopend: u32,
    pub samplerate: u32,
    pub origpitch: u8,
    pub pitchadj: i8,
    pub sample_link: u16,
    pub sampletype: SampleType,
    /// Decoded PCM, owned by the sample. Empty until loaded.
    pub pcm: Vec<i16>,
    /// Verification metadata, if the source carried a `shdX` chunk (or the
    /// sample was loaded from raw PCM, in which case it is synthesized).
    pub meta: Option<SampleMeta>,
}

impl Sample {
    /// Number of samples: the decoded PCM length once loaded, otherwise
    /// derived from the on-disk offsets.
    pub fn num_samples(&self) -> u32 {
        if self.pcm.is_empty() {
            self.end.saturating_sub(self.start)
        } else {
            self.pcm.len() as u32
        }
    }

    /// The payload encoding indicated by the compression bits.
    pub fn compression(&self) -> SampleCompression {
        if self.sampletype.has(SampleType::VORBIS) {
            SampleCompression::Vorbis
        } else if self.sampletype.has(SampleType::FLAC) {
            SampleCompression::Flac
        } else {
            SampleCompression::Raw
        }
    }

    /// Rewrite the compression bits for a new payload encoding, leaving
    /// the channel bits untouched.
    pub fn set_compression(&mut self, compression: SampleCompression) {
        self.sampletype.clear(SampleType::VORBIS | SampleType::FLAC);
        match compression {
            SampleCompression::Vorbis => self.sampletype.set(SampleType::VORBIS),
            SampleCompression::Flac => self.sampletype.set(SampleType::FLAC),
            SampleCompression::Raw => {}
        }
    }

    /// Capture the current (normalized) length and loop points as
    /// verification metadata for a later compressed write.
    pub fn create_meta(&mut self) {
        self.meta = Some(SampleMeta {
            name: self.name.clone(),
            orig_samples: self.num_samples(),
            loopstart: self.loopstart,
            loopend: self.loopend,
        });
    }

    /// Whether the decoded sample agrees with its verification metadata.
    /// A sample without metadata trivially matches.
    pub fn meta_matches(&self) -> bool {
        match &self.meta {
            None => true,
            Some(m) => {
                m.orig_samples == self.num_samples()
                    && (m.loopend as i64 - m.loopstart as i64)
                        == (self.loopend as i64 - self.loopstart as i64)
            }
        }
    }
}

/// The INFO-list metadata: format version plus the free-text fields.
/// Empty fields are omitted when writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundFontInfo {
    /// `ifil` version as (major, minor). The major selects the format.
    pub version: (u16, u16),
    /// `INAM` — bank name.
    pub name: String,
    /// `isng` — target render engine.
    pub engine: String,
    /// `IPRD` — product the bank was intended for.
    pub product: String,
    /// `IENG` — sound designers and engineers.
    pub creator: String,
    /// `ISFT` — tools used to create and alter the bank.
    pub tools: String,
    /// `ICRD` — creation date.
    pub date: String,
    /// `ICMT` — comments.
    pub comment: String,
    /// `ICOP` — copyright message.
    pub copyright: String,
}

impl Default for SoundFontInfo {
    fn default() -> Self {
        Self {
            version: (2, 4),
            name: String::new(),
            engine: String::new(),
            product: String::new(),
            creator: String::new(),
            tools: String::new(),
            date: String::new(),
            comment: String::new(),
            copyright: String::new(),
        }
    }
}

/// An in-memory SoundFont bank.
///
/// Construct with [`SoundFont::open`] to parse a file, or [`SoundFont::new`]
/// to build a bank programmatically; serialize with `SoundFont::write`.
/// Writing re-encodes sample payloads and mutates sample offsets in place,
/// so clone the bank first if it will be written more than once.
#[derive(Debug, Clone, Default)]
pub struct SoundFont {
    pub info: SoundFontInfo,
    pub presets: Vec<Preset>,
    pub instruments: Vec<Instrument>,
    pub samples: Vec<Sample>,
    /// Format the bank was read from (SF2 for fresh banks).
    pub(crate) source_format: Option<FileFormat>,
    /// Size of the source file in bytes, for ratio reporting.
    pub(crate) source_size: u64,
}

impl SoundFont {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// The format this bank was read from, or `None` if it was built
    /// programmatically.
    pub fn source_format(&self) -> Option<FileFormat> {
        self.source_format
    }
}
