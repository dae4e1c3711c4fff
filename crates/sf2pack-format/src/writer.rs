//! SoundFont writer — re-serializes a bank into any of the three target
//! formats, re-encoding sample payloads and re-deriving every index table
//! from the in-memory zone/generator/modulator sequences.
//!
//! Chunk lengths are back-patched: each LIST starts with a placeholder
//! length that is filled in once its body has been written.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use sf2pack_codec::Quality;

use crate::error::{Result, SoundFontError};
use crate::model::{
    FileFormat, GenAmount, Generator, Instrument, Modulator, Preset, Sample, SampleCompression,
    SampleMeta, SoundFont, Zone, BAG_RECORD_SIZE, GEN_RECORD_SIZE, INST_RECORD_SIZE,
    MOD_RECORD_SIZE, NAME_LEN, PHDR_RECORD_SIZE, SAMPLE_META_SIZE, SHDR_RECORD_SIZE,
};
use crate::riff::{self, FourCC};

impl SoundFont {
    /// Serialize the bank to `path` in the given target format.
    ///
    /// Sample payloads are re-encoded with the target codec and each
    /// sample's `start`/`end`/loop fields are rewritten **in place** to the
    /// target's on-disk semantics, so clone the bank first if it will be
    /// written again. On error the output file is left incomplete; the
    /// caller may delete it.
    pub fn write(&mut self, path: &Path, format: FileFormat, quality: Quality) -> Result<()> {
        tracing::info!(
            path = %path.display(),
            format = ?format,
            quality = ?quality,
            "Writing SoundFont"
        );

        let file = File::create(path)?;
        let mut writer = SoundFontWriter {
            out: BufWriter::new(file),
            target: format,
            quality,
        };
        writer.write_font(self)
    }
}

struct SoundFontWriter<W: Write + Seek> {
    out: W,
    target: FileFormat,
    quality: Quality,
}

impl<W: Write + Seek> SoundFontWriter<W> {
    fn write_font(&mut self, font: &mut SoundFont) -> Result<()> {
        // Expanding a compressed bank leaves lossy (or at best re-derived)
        // sample data behind; flag that in the comment field.
        if self.target == FileFormat::Sf2 {
            match font.source_format {
                Some(FileFormat::Sf3) => append_advisory(font, "Ogg Vorbis"),
                Some(FileFormat::Sf4) => append_advisory(font, "FLAC"),
                _ => {}
            }
        }

        riff::write_fourcc(&mut self.out, riff::RIFF)?;
        let riff_len_pos = self.out.stream_position()?;
        riff::write_u32(&mut self.out, 0)?;
        riff::write_fourcc(&mut self.out, riff::SFBK)?;

        let info_pos = self.begin_list(riff::INFO)?;
        self.write_ifil(font)?;
        self.write_string_section(b"INAM", &font.info.name)?;
        self.write_string_section(b"isng", &font.info.engine)?;
        self.write_string_section(b"IPRD", &font.info.product)?;
        self.write_string_section(b"IENG", &font.info.creator)?;
        self.write_string_section(b"ISFT", &font.info.tools)?;
        self.write_string_section(b"ICRD", &font.info.date)?;
        self.write_string_section(b"ICMT", &font.info.comment)?;
        self.write_string_section(b"ICOP", &font.info.copyright)?;
        self.end_chunk(info_pos)?;

        let sdta_pos = self.begin_list(riff::SDTA)?;
        self.write_smpl(font)?;
        self.end_chunk(sdta_pos)?;

        let pdta_pos = self.begin_list(riff::PDTA)?;
        let p_zones: Vec<&Zone> = font.presets.iter().flat_map(|p| p.zones.iter()).collect();
        let i_zones: Vec<&Zone> = font
            .instruments
            .iter()
            .flat_map(|i| i.zones.iter())
            .collect();
        self.write_phdr(&font.presets)?;
        self.write_bag(b"pbag", &p_zones)?;
        self.write_mod(b"pmod", &p_zones)?;
        self.write_gen(b"pgen", &p_zones)?;
        self.write_inst(&font.instruments)?;
        self.write_bag(b"ibag", &i_zones)?;
        self.write_mod(b"imod", &i_zones)?;
        self.write_gen(b"igen", &i_zones)?;
        self.write_shdr(&font.samples)?;
        if self.target != FileFormat::Sf2 {
            self.write_shdx(&font.samples)?;
        }
        self.end_chunk(pdta_pos)?;

        self.end_chunk(riff_len_pos)?;
        let total = self.out.stream_position()?;
        self.out.flush()?;

        if font.source_size > 0 {
            let percent = (100.0 * total as f64 / font.source_size as f64).round() as i64;
            tracing::info!(output_bytes = total, percent, "File size change");
        }
        Ok(())
    }

    // ───────────────────── chunk plumbing ─────────────────────

    /// Write a LIST header with a placeholder length and return the
    /// position of the length field for back-patching.
    fn begin_list(&mut self, list_type: FourCC) -> Result<u64> {
        riff::write_fourcc(&mut self.out, riff::LIST)?;
        let len_pos = self.out.stream_position()?;
        riff::write_u32(&mut self.out, 0)?;
        riff::write_fourcc(&mut self.out, list_type)?;
        Ok(len_pos)
    }

    /// Write a leaf chunk header with a placeholder length.
    fn begin_chunk(&mut self, fourcc: FourCC) -> Result<u64> {
        riff::write_fourcc(&mut self.out, fourcc)?;
        let len_pos = self.out.stream_position()?;
        riff::write_u32(&mut self.out, 0)?;
        Ok(len_pos)
    }

    /// Back-patch the length at `len_pos` to cover everything written
    /// since, and emit the RIFF pad byte after odd-length bodies. The
    /// declared length stays unpadded.
    fn end_chunk(&mut self, len_pos: u64) -> Result<()> {
        let end = self.out.stream_position()?;
        let len = (end - len_pos - 4) as u32;
        self.out.seek(SeekFrom::Start(len_pos))?;
        riff::write_u32(&mut self.out, len)?;
        self.out.seek(SeekFrom::Start(end))?;
        if len % 2 == 1 {
            riff::write_u8(&mut self.out, 0)?;
        }
        Ok(())
    }

    /// Write one `{fourcc, length, text, NUL}` section; empty fields are
    /// omitted entirely.
    fn write_string_section(&mut self, fourcc: &[u8; 4], value: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        let bytes = value.as_bytes();
        let declared = bytes.len() as u32 + 1;
        riff::write_fourcc(&mut self.out, FourCC::new(fourcc))?;
        riff::write_u32(&mut self.out, declared)?;
        self.out.write_all(bytes)?;
        riff::write_u8(&mut self.out, 0)?;
        if declared % 2 == 1 {
            riff::write_u8(&mut self.out, 0)?;
        }
        Ok(())
    }

    fn write_ifil(&mut self, font: &SoundFont) -> Result<()> {
        riff::write_fourcc(&mut self.out, FourCC::new(b"ifil"))?;
        riff::write_u32(&mut self.out, 4)?;
        riff::write_u16(&mut self.out, self.target.version_major())?;
        riff::write_u16(&mut self.out, font.info.version.1)?;
        Ok(())
    }

    // ───────────────────── sample payloads ─────────────────────

    /// Write the `smpl` chunk, re-encoding every sample for the target
    /// format and rewriting its header fields to the target's on-disk
    /// semantics: sample-count offsets with absolute loops for SF2, byte
    /// offsets with relative loops for SF3/SF4.
    fn write_smpl(&mut self, font: &mut SoundFont) -> Result<()> {
        let len_pos = self.begin_chunk(riff::SMPL)?;

        let compression = self.target.compression();
        let codec = compression.codec();
        let codec_name = compression.codec_name();

        let mut offset: u64 = 0;
        for (i, s) in font.samples.iter_mut().enumerate() {
            let encoded = codec
                .encode(&s.pcm, s.samplerate, self.quality)
                .map_err(|e| SoundFontError::Encode {
                    codec: codec_name,
                    sample: i,
                    source: e,
                })?;
            self.out.write_all(&encoded)?;
            let written = encoded.len() as u64;

            s.set_compression(compression);
            match self.target {
                FileFormat::Sf2 => {
                    s.start = (offset / 2) as u32;
                    s.end = ((offset + written) / 2) as u32;
                    // SF2 loop points are absolute file-sample positions
                    s.loopstart += s.start;
                    s.loopend += s.start;
                }
                FileFormat::Sf3 | FileFormat::Sf4 => {
                    s.start = offset as u32;
                    s.end = (offset + written) as u32;
                    // Loops stay relative so they survive re-encoding
                }
            }
            offset += written;

            if compression != SampleCompression::Raw && !s.pcm.is_empty() {
                let raw_bytes = s.pcm.len() as u64 * 2;
                let percent = (100.0 * written as f64 / raw_bytes as f64).round() as i64;
                tracing::debug!(sample = %s.name, percent, "Compressed sample");
            }
        }
        self.end_chunk(len_pos)
    }

    // ───────────────────── pdta tables ─────────────────────

    fn write_phdr(&mut self, presets: &[Preset]) -> Result<()> {
        riff::write_fourcc(&mut self.out, FourCC::new(b"phdr"))?;
        riff::write_u32(&mut self.out, (presets.len() as u32 + 1) * PHDR_RECORD_SIZE)?;

        let mut zone_idx: u16 = 0;
        for p in presets {
            self.write_preset_record(p, zone_idx)?;
            zone_idx += p.zones.len() as u16;
        }
        // Sentinel carries the final zone count
        self.write_preset_record(&Preset::default(), zone_idx)
    }

    fn write_preset_record(&mut self, p: &Preset, zone_idx: u16) -> Result<()> {
        riff::write_fixed_string(&mut self.out, &p.name, NAME_LEN)?;
        riff::write_u16(&mut self.out, p.program)?;
        riff::write_u16(&mut self.out, p.bank)?;
        riff::write_u16(&mut self.out, zone_idx)?;
        riff::write_u32(&mut self.out, p.library)?;
        riff::write_u32(&mut self.out, p.genre)?;
        riff::write_u32(&mut self.out, p.morphology)?;
        Ok(())
    }

    fn write_inst(&mut self, instruments: &[Instrument]) -> Result<()> {
        riff::write_fourcc(&mut self.out, FourCC::new(b"inst"))?;
        riff::write_u32(
            &mut self.out,
            (instruments.len() as u32 + 1) * INST_RECORD_SIZE,
        )?;

        let mut zone_idx: u16 = 0;
        for i in instruments {
            self.write_instrument_record(i, zone_idx)?;
            zone_idx += i.zones.len() as u16;
        }
        self.write_instrument_record(&Instrument::default(), zone_idx)
    }

    fn write_instrument_record(&mut self, i: &Instrument, zone_idx: u16) -> Result<()> {
        riff::write_fixed_string(&mut self.out, &i.name, NAME_LEN)?;
        riff::write_u16(&mut self.out, zone_idx)?;
        Ok(())
    }

    /// Write a `pbag`/`ibag` table: per zone, running sums of generator
    /// and modulator counts, terminated by a record with the final totals.
    fn write_bag(&mut self, fourcc: &[u8; 4], zones: &[&Zone]) -> Result<()> {
        riff::write_fourcc(&mut self.out, FourCC::new(fourcc))?;
        riff::write_u32(&mut self.out, (zones.len() as u32 + 1) * BAG_RECORD_SIZE)?;

        let mut gen_idx: u16 = 0;
        let mut mod_idx: u16 = 0;
        for z in zones {
            riff::write_u16(&mut self.out, gen_idx)?;
            riff::write_u16(&mut self.out, mod_idx)?;
            gen_idx += z.generators.len() as u16;
            mod_idx += z.modulators.len() as u16;
        }
        riff::write_u16(&mut self.out, gen_idx)?;
        riff::write_u16(&mut self.out, mod_idx)?;
        Ok(())
    }

    fn write_mod(&mut self, fourcc: &[u8; 4], zones: &[&Zone]) -> Result<()> {
        let count: u32 = zones.iter().map(|z| z.modulators.len() as u32).sum();
        riff::write_fourcc(&mut self.out, FourCC::new(fourcc))?;
        riff::write_u32(&mut self.out, (count + 1) * MOD_RECORD_SIZE)?;

        for z in zones {
            for m in &z.modulators {
                self.write_modulator(m)?;
            }
        }
        self.write_modulator(&Modulator::default())
    }

    fn write_modulator(&mut self, m: &Modulator) -> Result<()> {
        riff::write_u16(&mut self.out, m.src)?;
        riff::write_u16(&mut self.out, m.dst)?;
        riff::write_i16(&mut self.out, m.amount)?;
        riff::write_u16(&mut self.out, m.amt_src)?;
        riff::write_u16(&mut self.out, m.transform)?;
        Ok(())
    }

    fn write_gen(&mut self, fourcc: &[u8; 4], zones: &[&Zone]) -> Result<()> {
        let count: u32 = zones.iter().map(|z| z.generators.len() as u32).sum();
        riff::write_fourcc(&mut self.out, FourCC::new(fourcc))?;
        riff::write_u32(&mut self.out, (count + 1) * GEN_RECORD_SIZE)?;

        for z in zones {
            for g in &z.generators {
                self.write_generator(g)?;
            }
        }
        self.write_generator(&Generator::default())
    }

    fn write_generator(&mut self, g: &Generator) -> Result<()> {
        riff::write_u16(&mut self.out, g.kind)?;
        match g.amount {
            GenAmount::Range { lo, hi } => {
                riff::write_u8(&mut self.out, lo)?;
                riff::write_u8(&mut self.out, hi)?;
            }
            GenAmount::Index(v) => riff::write_u16(&mut self.out, v)?,
            GenAmount::Value(v) => riff::write_i16(&mut self.out, v)?,
        }
        Ok(())
    }

    fn write_shdr(&mut self, samples: &[Sample]) -> Result<()> {
        riff::write_fourcc(&mut self.out, FourCC::new(b"shdr"))?;
        riff::write_u32(&mut self.out, (samples.len() as u32 + 1) * SHDR_RECORD_SIZE)?;

        for s in samples {
            self.write_sample_record(s)?;
        }
        // Empty terminator record
        self.write_sample_record(&Sample::default())
    }

    fn write_sample_record(&mut self, s: &Sample) -> Result<()> {
        riff::write_fixed_string(&mut self.out, &s.name, NAME_LEN)?;
        riff::write_u32(&mut self.out, s.start)?;
        riff::write_u32(&mut self.out, s.end)?;
        riff::write_u32(&mut self.out, s.loopstart)?;
        riff::write_u32(&mut self.out, s.loopend)?;
        riff::write_u32(&mut self.out, s.samplerate)?;
        riff::write_u8(&mut self.out, s.origpitch)?;
        riff::write_i8(&mut self.out, s.pitchadj)?;
        riff::write_u16(&mut self.out, s.sample_link)?;
        riff::write_u16(&mut self.out, s.sampletype.0)?;
        Ok(())
    }

    /// Write the `shdX` verification chunk, but only when every sample
    /// carries metadata — a partial table could not be aligned with `shdr`
    /// on the way back in.
    fn write_shdx(&mut self, samples: &[Sample]) -> Result<()> {
        if samples.iter().any(|s| s.meta.is_none()) {
            tracing::debug!("Skipping shdX: not all samples carry verification metadata");
            return Ok(());
        }
        tracing::info!(samples = samples.len(), "Attaching verification metadata");

        riff::write_fourcc(&mut self.out, FourCC::new(b"shdX"))?;
        riff::write_u32(&mut self.out, (samples.len() as u32 + 1) * SAMPLE_META_SIZE)?;

        for s in samples {
            if let Some(meta) = &s.meta {
                self.write_meta_record(meta)?;
            }
        }
        self.write_meta_record(&SampleMeta::default())
    }

    fn write_meta_record(&mut self, m: &SampleMeta) -> Result<()> {
        riff::write_fixed_string(&mut self.out, &m.name, NAME_LEN)?;
        riff::write_u32(&mut self.out, m.orig_samples)?;
        riff::write_u32(&mut self.out, m.loopstart)?;
        riff::write_u32(&mut self.out, m.loopend)?;
        Ok(())
    }
}

fn append_advisory(font: &mut SoundFont, codec: &str) {
    let advisory = format!(
        "CAUTION: Samples in this file were decompressed from a compressed format ({codec}). \
         If you want to edit this file, you should get the original uncompressed SF2 file."
    );
    if !font.info.comment.is_empty() {
        font.info.comment.push_str("\n\n");
    }
    font.info.comment.push_str(&advisory);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SampleType;

    fn test_font() -> SoundFont {
        let mut font = SoundFont::new();
        font.info.name = "Writer Test".to_string();

        let pcm: Vec<i16> = (0..64).map(|i| (i * 512 - 16000) as i16).collect();
        font.samples.push(Sample {
            name: "S".to_string(),
            start: 0,
            end: pcm.len() as u32,
            loopstart: 4,
            loopend: 60,
            samplerate: 44100,
            origpitch: 60,
            pitchadj: 0,
            sample_link: 0,
            sampletype: SampleType(SampleType::MONO),
            pcm,
            meta: None,
        });

        font.instruments.push(Instrument {
            name: "I".to_string(),
            zones: vec![Zone {
                generators: vec![Generator {
                    kind: 53,
                    amount: GenAmount::Index(0),
                }],
                modulators: vec![],
            }],
        });

        font.presets.push(Preset {
            name: "P".to_string(),
            program: 0,
            bank: 0,
            library: 0,
            genre: 0,
            morphology: 0,
            zones: vec![Zone {
                generators: vec![Generator {
                    kind: 41,
                    amount: GenAmount::Index(0),
                }],
                modulators: vec![],
            }],
        });
        font
    }

    fn write_bytes(font: &mut SoundFont, format: FileFormat) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sf");
        font.write(&path, format, Quality::High).unwrap();
        std::fs::read(&path).unwrap()
    }

    fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
        data.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn test_riff_length_is_patched() {
        let bytes = write_bytes(&mut test_font(), FileFormat::Sf2);
        assert_eq!(&bytes[..4], b"RIFF");
        let declared = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(declared as usize, bytes.len() - 8);
        assert_eq!(&bytes[8..12], b"sfbk");
    }

    #[test]
    fn test_ifil_major_follows_target() {
        for (format, major) in [
            (FileFormat::Sf2, 2u16),
            (FileFormat::Sf3, 3),
            (FileFormat::Sf4, 4),
        ] {
            let bytes = write_bytes(&mut test_font(), format);
            let pos = find(&bytes, b"ifil").unwrap();
            let len = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());
            assert_eq!(len, 4);
            let got = u16::from_le_bytes(bytes[pos + 8..pos + 10].try_into().unwrap());
            assert_eq!(got, major);
        }
    }

    #[test]
    fn test_string_section_declares_odd_length() {
        // "Writer Test" is 11 bytes; with the NUL the declared length is
        // 12 (even). Use a name that lands odd instead.
        let mut font = test_font();
        font.info.name = "Odd!".to_string(); // 4 + NUL = 5, odd
        let bytes = write_bytes(&mut font, FileFormat::Sf2);
        let pos = find(&bytes, b"INAM").unwrap();
        let len = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());
        assert_eq!(len, 5);
        // Body: text, NUL, then one pad byte before the next chunk
        assert_eq!(&bytes[pos + 8..pos + 13], b"Odd!\0");
        assert_eq!(bytes[pos + 13], 0);
        // Next chunk header starts on an even boundary
        assert_eq!((pos + 14) % 2, 0);
    }

    #[test]
    fn test_empty_info_fields_are_omitted() {
        let bytes = write_bytes(&mut test_font(), FileFormat::Sf2);
        assert!(find(&bytes, b"IPRD").is_none());
        assert!(find(&bytes, b"ICOP").is_none());
        assert!(find(&bytes, b"INAM").is_some());
    }

    #[test]
    fn test_sf2_offsets_and_absolute_loops() {
        let mut font = test_font();
        let bytes = write_bytes(&mut font, FileFormat::Sf2);

        // In-memory fields were rewritten to the on-disk form
        let s = &font.samples[0];
        assert_eq!((s.start, s.end), (0, 64));
        assert_eq!((s.loopstart, s.loopend), (4, 60));

        let pos = find(&bytes, b"shdr").unwrap();
        let len = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());
        assert_eq!(len, 2 * SHDR_RECORD_SIZE);
        let rec = pos + 8;
        let start = u32::from_le_bytes(bytes[rec + 20..rec + 24].try_into().unwrap());
        let end = u32::from_le_bytes(bytes[rec + 24..rec + 28].try_into().unwrap());
        assert_eq!((start, end), (0, 64));
    }

    #[test]
    fn test_sentinel_records_are_zeroed() {
        let bytes = write_bytes(&mut test_font(), FileFormat::Sf2);
        let pos = find(&bytes, b"shdr").unwrap();
        let sentinel = pos + 8 + SHDR_RECORD_SIZE as usize;
        assert!(bytes[sentinel..sentinel + SHDR_RECORD_SIZE as usize]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_shdx_needs_full_meta() {
        // Fresh bank: no meta anywhere, shdX must be skipped
        let bytes = write_bytes(&mut test_font(), FileFormat::Sf4);
        assert!(find(&bytes, b"shdX").is_none());

        // With meta on every sample it appears, sentinel-terminated
        let mut font = test_font();
        for s in &mut font.samples {
            s.create_meta();
        }
        let bytes = write_bytes(&mut font, FileFormat::Sf4);
        let pos = find(&bytes, b"shdX").unwrap();
        let len = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());
        assert_eq!(len, 2 * SAMPLE_META_SIZE);
    }

    #[test]
    fn test_shdx_never_written_for_sf2() {
        let mut font = test_font();
        for s in &mut font.samples {
            s.create_meta();
        }
        let bytes = write_bytes(&mut font, FileFormat::Sf2);
        assert!(find(&bytes, b"shdX").is_none());
    }

    #[test]
    fn test_sf3_sets_vorbis_bit_and_byte_offsets() {
        let mut font = test_font();
        for s in &mut font.samples {
            s.create_meta();
        }
        let bytes = write_bytes(&mut font, FileFormat::Sf3);

        let s = &font.samples[0];
        assert!(s.sampletype.has(SampleType::VORBIS));
        assert_eq!(s.start, 0);
        assert!(s.end > 0, "end must be a byte offset past the stream");
        // Loops stayed relative
        assert_eq!((s.loopstart, s.loopend), (4, 60));

        // Payload starts with an Ogg capture pattern
        let pos = find(&bytes, b"smpl").unwrap();
        assert_eq!(&bytes[pos + 8..pos + 12], b"OggS");
    }
}
