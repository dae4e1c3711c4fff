//! SoundFont reader — walks the RIFF tree, parses every table into the
//! data model, validates the index invariants, and decodes each sample's
//! payload into normalized 16-bit PCM.
//!
//! The reader is single-pass over the chunk tree: the `smpl` chunk body is
//! skipped during the walk (only its position is recorded), then revisited
//! once the sample headers are known.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use sf2pack_codec::SampleCodec;

use crate::error::{map_eof, Result, SoundFontError};
use crate::model::{
    FileFormat, GenAmount, Generator, Instrument, Modulator, Preset, Sample, SampleCompression,
    SampleMeta, SampleType, SoundFont, Zone, BAG_RECORD_SIZE, GEN_RECORD_SIZE, INST_RECORD_SIZE,
    MOD_RECORD_SIZE, NAME_LEN, PHDR_RECORD_SIZE, SAMPLE_META_SIZE, SHDR_RECORD_SIZE,
};
use crate::model::{gen_amount_is_index, gen_amount_is_range};
use crate::riff::{self, FourCC};

/// Options controlling how strictly a bank is validated while loading.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Fail with [`SoundFontError::MetaMismatch`] when a decoded sample
    /// disagrees with its `shdX` verification metadata, instead of the
    /// default warning.
    pub strict_meta: bool,
}

/// Which of the two zone-bearing tables a bag/gen/mod chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneTable {
    Preset,
    Instrument,
}

impl SoundFont {
    /// Open and fully parse a SoundFont file (SF2, SF3, or SF4).
    ///
    /// All sample payloads are decoded to PCM and normalized; the returned
    /// bank is independent of the file.
    ///
    /// # Errors
    ///
    /// Returns [`SoundFontError`] if the file is missing, truncated, or
    /// violates the container invariants, or if any sample payload fails
    /// to decode.
    pub fn open(path: &Path) -> Result<SoundFont> {
        Self::open_with(path, ReadOptions::default())
    }

    /// [`SoundFont::open`] with explicit [`ReadOptions`].
    pub fn open_with(path: &Path, options: ReadOptions) -> Result<SoundFont> {
        tracing::info!("Opening SoundFont: {}", path.display());

        let file = File::open(path)?;
        let source_size = file.metadata()?.len();
        let reader = SoundFontReader {
            inner: BufReader::new(file),
            options,
            font: SoundFont::new(),
            p_zones: Vec::new(),
            i_zones: Vec::new(),
            sample_pos: 0,
            sample_len: 0,
        };
        let mut font = reader.read()?;
        font.source_size = source_size;
        Ok(font)
    }
}

struct SoundFontReader<R> {
    inner: R,
    options: ReadOptions,
    font: SoundFont,
    /// Flat preset-zone order: `(preset index, zone index)` in the order
    /// the zones appear in `pbag`. Temporary reading aid; the zones stay
    /// owned by their presets.
    p_zones: Vec<(usize, usize)>,
    /// Flat instrument-zone order, analogous to `p_zones`.
    i_zones: Vec<(usize, usize)>,
    /// File position of the `smpl` chunk body.
    sample_pos: u64,
    /// Length of the `smpl` chunk body in bytes.
    sample_len: u32,
}

impl<R: Read + Seek> SoundFontReader<R> {
    fn read(mut self) -> Result<SoundFont> {
        riff::expect_fourcc(&mut self.inner, riff::RIFF)?;
        let riff_len = riff::read_u32(&mut self.inner)?;
        riff::expect_fourcc(&mut self.inner, riff::SFBK)?;

        let mut remaining = riff_len as i64 - 4;
        if remaining < 0 {
            return Err(SoundFontError::TruncatedChunk { list: riff::RIFF });
        }

        while remaining > 0 {
            riff::expect_fourcc(&mut self.inner, riff::LIST)?;
            let list_len = riff::read_u32(&mut self.inner)?;
            remaining -= 8 + list_len as i64 + (list_len % 2) as i64;
            if remaining < 0 {
                return Err(SoundFontError::TruncatedChunk { list: riff::RIFF });
            }

            let list_type = riff::read_fourcc(&mut self.inner)?;
            let mut inner_remaining = list_len as i64 - 4;
            if inner_remaining < 0 {
                return Err(SoundFontError::TruncatedChunk { list: list_type });
            }

            while inner_remaining > 0 {
                let id = riff::read_fourcc(&mut self.inner)?;
                let len = riff::read_u32(&mut self.inner)?;
                inner_remaining -= 8 + len as i64 + (len % 2) as i64;
                if inner_remaining < 0 {
                    return Err(SoundFontError::TruncatedChunk { list: list_type });
                }
                self.read_chunk(list_type, id, len)?;
                // RIFF pads odd-length chunks with one zero byte
                if len % 2 == 1 {
                    riff::skip(&mut self.inner, 1)?;
                }
            }
            if list_len % 2 == 1 {
                riff::skip(&mut self.inner, 1)?;
            }
        }

        self.load_sample_data()?;

        tracing::info!(
            presets = self.font.presets.len(),
            instruments = self.font.instruments.len(),
            samples = self.font.samples.len(),
            format = ?self.font.source_format,
            "Parsed SoundFont"
        );
        Ok(self.font)
    }

    /// Dispatch a leaf chunk by FourCC. Unknown chunks inside known LISTs
    /// are skipped with a warning.
    fn read_chunk(&mut self, list_type: FourCC, id: FourCC, len: u32) -> Result<()> {
        match id.as_bytes() {
            b"ifil" => self.read_version(len),
            b"INAM" => self.read_info_string(len, |info| &mut info.name),
            b"isng" => self.read_info_string(len, |info| &mut info.engine),
            b"IPRD" => self.read_info_string(len, |info| &mut info.product),
            b"IENG" => self.read_info_string(len, |info| &mut info.creator),
            b"ISFT" => self.read_info_string(len, |info| &mut info.tools),
            b"ICRD" => self.read_info_string(len, |info| &mut info.date),
            b"ICMT" => self.read_info_string(len, |info| &mut info.comment),
            b"ICOP" => self.read_info_string(len, |info| &mut info.copyright),
            b"smpl" => {
                self.sample_pos = self.inner.stream_position()?;
                self.sample_len = len;
                riff::skip(&mut self.inner, len as u64)
            }
            b"phdr" => self.read_phdr(len),
            b"pbag" => self.read_bag(len, ZoneTable::Preset, "pbag"),
            b"pmod" => self.read_mod(len, ZoneTable::Preset, "pmod"),
            b"pgen" => self.read_gen(len, ZoneTable::Preset, "pgen"),
            b"inst" => self.read_inst(len),
            b"ibag" => self.read_bag(len, ZoneTable::Instrument, "ibag"),
            b"imod" => self.read_mod(len, ZoneTable::Instrument, "imod"),
            b"igen" => self.read_gen(len, ZoneTable::Instrument, "igen"),
            b"shdr" => self.read_shdr(len),
            b"shdX" => self.read_shdx(len),
            b"irom" | b"iver" => riff::skip(&mut self.inner, len as u64),
            _ => {
                tracing::warn!(list = %list_type, chunk = %id, len, "Skipping unknown chunk");
                riff::skip(&mut self.inner, len as u64)
            }
        }
    }

    fn read_version(&mut self, len: u32) -> Result<()> {
        if len != 4 {
            return Err(SoundFontError::BadSize {
                chunk: "ifil",
                record_size: 4,
            });
        }
        let major = riff::read_u16(&mut self.inner)?;
        let minor = riff::read_u16(&mut self.inner)?;
        self.font.info.version = (major, minor);
        self.font.source_format = Some(FileFormat::from_version_major(major));
        tracing::debug!(major, minor, "Parsed version");
        Ok(())
    }

    fn read_info_string(
        &mut self,
        len: u32,
        field: impl FnOnce(&mut crate::model::SoundFontInfo) -> &mut String,
    ) -> Result<()> {
        let value = riff::read_fixed_string(&mut self.inner, len as usize)?;
        *field(&mut self.font.info) = value;
        Ok(())
    }

    /// Parse `phdr`. The bag-index delta between consecutive records gives
    /// the zone count of the *previous* preset; the final record is a
    /// sentinel that only bounds the last preset's zones.
    fn read_phdr(&mut self, len: u32) -> Result<()> {
        if len % PHDR_RECORD_SIZE != 0 {
            return Err(SoundFontError::BadSize {
                chunk: "phdr",
                record_size: PHDR_RECORD_SIZE,
            });
        }
        let n = len / PHDR_RECORD_SIZE;
        if n <= 1 {
            // Sentinel-only (or empty) table: no presets
            return riff::skip(&mut self.inner, len as u64);
        }

        let mut prev_bag: u16 = 0;
        for i in 0..n {
            let name = riff::read_fixed_string(&mut self.inner, NAME_LEN)?;
            let program = riff::read_u16(&mut self.inner)?;
            let bank = riff::read_u16(&mut self.inner)?;
            let bag = riff::read_u16(&mut self.inner)?;
            let library = riff::read_u32(&mut self.inner)?;
            let genre = riff::read_u32(&mut self.inner)?;
            let morphology = riff::read_u32(&mut self.inner)?;

            if bag < prev_bag {
                return Err(SoundFontError::NonMonotonicIndex { chunk: "phdr" });
            }
            if i > 0 {
                let pi = self.font.presets.len() - 1;
                for _ in 0..(bag - prev_bag) {
                    self.font.presets[pi].zones.push(Zone::default());
                    self.p_zones.push((pi, self.font.presets[pi].zones.len() - 1));
                }
            }
            prev_bag = bag;

            self.font.presets.push(Preset {
                name,
                program,
                bank,
                library,
                genre,
                morphology,
                zones: Vec::new(),
            });
        }
        // Sentinel record, only needed for the final zone count
        self.font.presets.pop();

        tracing::debug!(
            presets = self.font.presets.len(),
            zones = self.p_zones.len(),
            "Parsed preset headers"
        );
        Ok(())
    }

    /// Parse `inst` with the same delta pattern as `phdr`.
    fn read_inst(&mut self, len: u32) -> Result<()> {
        if len % INST_RECORD_SIZE != 0 {
            return Err(SoundFontError::BadSize {
                chunk: "inst",
                record_size: INST_RECORD_SIZE,
            });
        }
        let n = len / INST_RECORD_SIZE;
        if n <= 1 {
            return riff::skip(&mut self.inner, len as u64);
        }

        let mut prev_bag: u16 = 0;
        for i in 0..n {
            let name = riff::read_fixed_string(&mut self.inner, NAME_LEN)?;
            let bag = riff::read_u16(&mut self.inner)?;

            if bag < prev_bag {
                return Err(SoundFontError::NonMonotonicIndex { chunk: "inst" });
            }
            if i > 0 {
                let ii = self.font.instruments.len() - 1;
                for _ in 0..(bag - prev_bag) {
                    self.font.instruments[ii].zones.push(Zone::default());
                    self.i_zones
                        .push((ii, self.font.instruments[ii].zones.len() - 1));
                }
            }
            prev_bag = bag;

            self.font.instruments.push(Instrument {
                name,
                zones: Vec::new(),
            });
        }
        self.font.instruments.pop();

        tracing::debug!(
            instruments = self.font.instruments.len(),
            zones = self.i_zones.len(),
            "Parsed instrument headers"
        );
        Ok(())
    }

    fn zone_count(&self, table: ZoneTable) -> usize {
        match table {
            ZoneTable::Preset => self.p_zones.len(),
            ZoneTable::Instrument => self.i_zones.len(),
        }
    }

    fn zone_mut(&mut self, table: ZoneTable, idx: usize) -> &mut Zone {
        match table {
            ZoneTable::Preset => {
                let (p, z) = self.p_zones[idx];
                &mut self.font.presets[p].zones[z]
            }
            ZoneTable::Instrument => {
                let (i, z) = self.i_zones[idx];
                &mut self.font.instruments[i].zones[z]
            }
        }
    }

    /// Parse `pbag`/`ibag`: consecutive generator/modulator index deltas
    /// give each zone its slot counts. Record count must be zones + 1.
    fn read_bag(&mut self, len: u32, table: ZoneTable, chunk: &'static str) -> Result<()> {
        if len % BAG_RECORD_SIZE != 0 {
            return Err(SoundFontError::BadSize {
                chunk,
                record_size: BAG_RECORD_SIZE,
            });
        }
        let zones = self.zone_count(table);
        let expected = (zones as u32 + 1) * BAG_RECORD_SIZE;
        if len != expected {
            return Err(SoundFontError::SizeMismatch {
                chunk,
                remaining: len as i64 - expected as i64,
            });
        }

        let mut gen1 = riff::read_u16(&mut self.inner)?;
        let mut mod1 = riff::read_u16(&mut self.inner)?;
        for i in 0..zones {
            let gen2 = riff::read_u16(&mut self.inner)?;
            let mod2 = riff::read_u16(&mut self.inner)?;
            if gen2 < gen1 || mod2 < mod1 {
                return Err(SoundFontError::NonMonotonicIndex { chunk });
            }
            let zone = self.zone_mut(table, i);
            zone.generators = vec![Generator::default(); (gen2 - gen1) as usize];
            zone.modulators = vec![Modulator::default(); (mod2 - mod1) as usize];
            gen1 = gen2;
            mod1 = mod2;
        }
        Ok(())
    }

    /// Parse `pmod`/`imod`, filling every modulator slot in flat zone
    /// order. Exactly one 10-byte sentinel must remain.
    fn read_mod(&mut self, len: u32, table: ZoneTable, chunk: &'static str) -> Result<()> {
        let mut remaining = len as i64;
        for zi in 0..self.zone_count(table) {
            let count = self.zone_mut(table, zi).modulators.len();
            for mi in 0..count {
                remaining -= MOD_RECORD_SIZE as i64;
                if remaining < 0 {
                    return Err(SoundFontError::SizeMismatch { chunk, remaining });
                }
                let modulator = Modulator {
                    src: riff::read_u16(&mut self.inner)?,
                    dst: riff::read_u16(&mut self.inner)?,
                    amount: riff::read_i16(&mut self.inner)?,
                    amt_src: riff::read_u16(&mut self.inner)?,
                    transform: riff::read_u16(&mut self.inner)?,
                };
                self.zone_mut(table, zi).modulators[mi] = modulator;
            }
        }
        if remaining != MOD_RECORD_SIZE as i64 {
            return Err(SoundFontError::SizeMismatch { chunk, remaining });
        }
        riff::skip(&mut self.inner, MOD_RECORD_SIZE as u64)
    }

    /// Parse `pgen`/`igen`, filling every generator slot in flat zone
    /// order. The amount encoding depends on the generator kind.
    fn read_gen(&mut self, len: u32, table: ZoneTable, chunk: &'static str) -> Result<()> {
        if len % GEN_RECORD_SIZE != 0 {
            return Err(SoundFontError::BadSize {
                chunk,
                record_size: GEN_RECORD_SIZE,
            });
        }
        let instrument_zone = table == ZoneTable::Instrument;
        let mut remaining = len as i64;
        for zi in 0..self.zone_count(table) {
            let count = self.zone_mut(table, zi).generators.len();
            for gi in 0..count {
                remaining -= GEN_RECORD_SIZE as i64;
                if remaining < 0 {
                    return Err(SoundFontError::SizeMismatch { chunk, remaining });
                }
                let kind = riff::read_u16(&mut self.inner)?;
                let amount = if gen_amount_is_range(kind) {
                    GenAmount::Range {
                        lo: riff::read_u8(&mut self.inner)?,
                        hi: riff::read_u8(&mut self.inner)?,
                    }
                } else if gen_amount_is_index(kind, instrument_zone) {
                    GenAmount::Index(riff::read_u16(&mut self.inner)?)
                } else {
                    GenAmount::Value(riff::read_i16(&mut self.inner)?)
                };
                self.zone_mut(table, zi).generators[gi] = Generator { kind, amount };
            }
        }
        if remaining != GEN_RECORD_SIZE as i64 {
            return Err(SoundFontError::SizeMismatch { chunk, remaining });
        }
        riff::skip(&mut self.inner, GEN_RECORD_SIZE as u64)
    }

    fn read_shdr(&mut self, len: u32) -> Result<()> {
        if len % SHDR_RECORD_SIZE != 0 {
            return Err(SoundFontError::BadSize {
                chunk: "shdr",
                record_size: SHDR_RECORD_SIZE,
            });
        }
        let n = len / SHDR_RECORD_SIZE;
        if n == 0 {
            return Ok(());
        }

        for _ in 0..n - 1 {
            let sample = Sample {
                name: riff::read_fixed_string(&mut self.inner, NAME_LEN)?,
                start: riff::read_u32(&mut self.inner)?,
                end: riff::read_u32(&mut self.inner)?,
                loopstart: riff::read_u32(&mut self.inner)?,
                loopend: riff::read_u32(&mut self.inner)?,
                samplerate: riff::read_u32(&mut self.inner)?,
                origpitch: riff::read_u8(&mut self.inner)?,
                pitchadj: riff::read_i8(&mut self.inner)?,
                sample_link: riff::read_u16(&mut self.inner)?,
                sampletype: SampleType(riff::read_u16(&mut self.inner)?),
                pcm: Vec::new(),
                meta: None,
            };
            self.font.samples.push(sample);
        }
        // Trailing sentinel record
        riff::skip(&mut self.inner, SHDR_RECORD_SIZE as u64)?;

        tracing::debug!(samples = self.font.samples.len(), "Parsed sample headers");
        Ok(())
    }

    /// Parse the optional `shdX` verification chunk. Records must align
    /// index-for-index with `shdr`.
    fn read_shdx(&mut self, len: u32) -> Result<()> {
        if len % SAMPLE_META_SIZE != 0 {
            return Err(SoundFontError::BadSize {
                chunk: "shdX",
                record_size: SAMPLE_META_SIZE,
            });
        }
        let n = (len / SAMPLE_META_SIZE) as usize;
        if n != self.font.samples.len() + 1 {
            return Err(SoundFontError::SizeMismatch {
                chunk: "shdX",
                remaining: len as i64 - (self.font.samples.len() as i64 + 1) * SAMPLE_META_SIZE as i64,
            });
        }

        tracing::info!(
            samples = self.font.samples.len(),
            "Reading verification metadata"
        );
        for i in 0..n - 1 {
            let meta = SampleMeta {
                name: riff::read_fixed_string(&mut self.inner, NAME_LEN)?,
                orig_samples: riff::read_u32(&mut self.inner)?,
                loopstart: riff::read_u32(&mut self.inner)?,
                loopend: riff::read_u32(&mut self.inner)?,
            };
            if meta.name != self.font.samples[i].name {
                tracing::warn!(
                    sample = i,
                    header = %self.font.samples[i].name,
                    meta = %meta.name,
                    "shdX name does not match sample header"
                );
            }
            self.font.samples[i].meta = Some(meta);
        }
        riff::skip(&mut self.inner, SAMPLE_META_SIZE as u64)
    }

    // ───────────────────── sample payload loading ─────────────────────

    fn load_sample_data(&mut self) -> Result<()> {
        let format = self.font.source_format.unwrap_or(FileFormat::Sf2);
        let compression = format.compression();
        let codec = compression.codec();
        let codec_name = compression.codec_name();

        for i in 0..self.font.samples.len() {
            match compression {
                SampleCompression::Raw => self.load_raw_sample(i)?,
                _ => self.load_compressed_sample(i, &*codec, codec_name)?,
            }
        }
        Ok(())
    }

    /// SF2 payload: offsets are in 16-bit sample units, loops absolute.
    fn load_raw_sample(&mut self, idx: usize) -> Result<()> {
        let (start, end) = {
            let s = &self.font.samples[idx];
            (s.start as u64, s.end as u64)
        };
        if end < start {
            return Err(SoundFontError::NonMonotonicIndex { chunk: "shdr" });
        }
        if end * 2 > self.sample_len as u64 {
            return Err(SoundFontError::TruncatedChunk { list: riff::SMPL });
        }

        self.inner
            .seek(SeekFrom::Start(self.sample_pos + start * 2))?;
        let mut pcm = vec![0i16; (end - start) as usize];
        self.inner
            .read_i16_into::<LittleEndian>(&mut pcm)
            .map_err(map_eof)?;

        let s = &mut self.font.samples[idx];
        // Normalize: loops relative, offsets zero-based
        s.loopstart = s.loopstart.saturating_sub(s.start);
        s.loopend = s.loopend.saturating_sub(s.start);
        s.start = 0;
        s.end = pcm.len() as u32;
        s.pcm = pcm;
        clamp_loop(s, idx);
        s.create_meta();
        Ok(())
    }

    /// SF3/SF4 payload: offsets are byte ranges, loops already relative.
    fn load_compressed_sample(
        &mut self,
        idx: usize,
        codec: &dyn SampleCodec,
        codec_name: &'static str,
    ) -> Result<()> {
        let (start, end, samplerate) = {
            let s = &self.font.samples[idx];
            (s.start as u64, s.end as u64, s.samplerate)
        };
        if end < start {
            return Err(SoundFontError::NonMonotonicIndex { chunk: "shdr" });
        }
        if end > self.sample_len as u64 {
            return Err(SoundFontError::TruncatedChunk { list: riff::SMPL });
        }

        self.inner.seek(SeekFrom::Start(self.sample_pos + start))?;
        let mut bytes = vec![0u8; (end - start) as usize];
        self.inner.read_exact(&mut bytes).map_err(map_eof)?;

        let pcm = codec
            .decode(&bytes, samplerate)
            .map_err(|e| SoundFontError::Decode {
                codec: codec_name,
                sample: idx,
                source: e,
            })?;
        drop(bytes);

        let s = &mut self.font.samples[idx];
        s.start = 0;
        s.end = pcm.len() as u32;
        s.pcm = pcm;
        clamp_loop(s, idx);

        if !s.meta_matches() {
            if self.options.strict_meta {
                return Err(SoundFontError::MetaMismatch { sample: idx });
            }
            tracing::warn!(
                sample = idx,
                name = %s.name,
                "decoded sample does not match its verification metadata"
            );
        }
        Ok(())
    }
}

/// Enforce `loopstart <= loopend <= num_samples` on a normalized sample,
/// warning when a malformed loop had to be clamped.
fn clamp_loop(s: &mut Sample, idx: usize) {
    if s.loopend > s.end {
        tracing::warn!(sample = idx, name = %s.name, loopend = s.loopend, "clamping loop end");
        s.loopend = s.end;
    }
    if s.loopstart > s.loopend {
        tracing::warn!(sample = idx, name = %s.name, loopstart = s.loopstart, "clamping loop start");
        s.loopstart = s.loopend;
    }
}
