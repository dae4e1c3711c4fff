//! Integration tests for the `sf2pack` binary.
//!
//! Each test builds a small SF2 bank with the format library, runs the
//! binary over it, and verifies the converted output end to end.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use sf2pack_format::{
    FileFormat, GenAmount, Generator, GeneratorKind, Instrument, Preset, Quality, Sample,
    SampleType, SoundFont, Zone,
};

// ──────────────────────── helpers ────────────────────────

/// Generate a 440 Hz sine at 44.1 kHz as native 16-bit PCM.
fn sine_pcm(count: usize) -> Vec<i16> {
    (0..count)
        .map(|i| {
            let t = i as f32 / 44100.0;
            ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.7 * 32767.0).round() as i16
        })
        .collect()
}

/// Build the seed bank (preset "Test" → instrument "I" → sample "S" with
/// 1000 sine samples) and write it to `path` as SF2.
fn write_seed_bank(path: &Path) {
    let mut font = SoundFont::new();
    font.info.name = "CLI Seed".to_string();

    font.samples.push(Sample {
        name: "S".to_string(),
        start: 0,
        end: 1000,
        loopstart: 0,
        loopend: 0,
        samplerate: 44100,
        origpitch: 60,
        pitchadj: 0,
        sample_link: 0,
        sampletype: SampleType(SampleType::MONO),
        pcm: sine_pcm(1000),
        meta: None,
    });
    font.instruments.push(Instrument {
        name: "I".to_string(),
        zones: vec![Zone {
            generators: vec![Generator {
                kind: GeneratorKind::SampleId as u16,
                amount: GenAmount::Index(0),
            }],
            modulators: vec![],
        }],
    });
    font.presets.push(Preset {
        name: "Test".to_string(),
        program: 0,
        bank: 0,
        zones: vec![Zone {
            generators: vec![Generator {
                kind: GeneratorKind::Instrument as u16,
                amount: GenAmount::Index(0),
            }],
            modulators: vec![],
        }],
        ..Default::default()
    });

    font.write(path, FileFormat::Sf2, Quality::High).unwrap();
}

/// Get a `Command` for the `sf2pack` binary.
fn sf2pack_cmd() -> Command {
    Command::cargo_bin("sf2pack").expect("Failed to find `sf2pack` binary")
}

// ──────────────────────── tests ─────────────────────────

#[test]
fn test_expand_sf2_is_identity() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("seed.sf2");
    let output = tmp.path().join("out.sf2");
    write_seed_bank(&input);

    sf2pack_cmd()
        .args(["-x", input.to_str().unwrap(), output.to_str().unwrap()])
        .assert()
        .success();

    let a = std::fs::read(&input).unwrap();
    let b = std::fs::read(&output).unwrap();
    assert_eq!(a, b, "SF2 → SF2 must be byte-identical");
}

#[test]
fn test_compress_vorbis() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("seed.sf2");
    let output = tmp.path().join("out.sf3");
    write_seed_bank(&input);

    sf2pack_cmd()
        .args(["-zo2", input.to_str().unwrap(), output.to_str().unwrap()])
        .assert()
        .success();

    // ifil major 3, Vorbis sampletype bit, shdX present
    let bytes = std::fs::read(&output).unwrap();
    let ifil = bytes.windows(4).position(|w| w == b"ifil").unwrap();
    assert_eq!(bytes[ifil + 8], 3);
    assert!(bytes.windows(4).any(|w| w == b"shdX"));

    let font = SoundFont::open(&output).unwrap();
    assert_eq!(font.source_format(), Some(FileFormat::Sf3));
    assert!(font.samples[0].sampletype.has(SampleType::VORBIS));
    assert_eq!(font.samples[0].pcm.len(), 1000);
    assert_eq!(font.samples[0].meta.as_ref().unwrap().orig_samples, 1000);
}

#[test]
fn test_compress_flac_is_lossless() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("seed.sf2");
    let output = tmp.path().join("out.sf4");
    write_seed_bank(&input);

    sf2pack_cmd()
        .args(["-zf2", input.to_str().unwrap(), output.to_str().unwrap()])
        .assert()
        .success();

    let bytes = std::fs::read(&output).unwrap();
    let ifil = bytes.windows(4).position(|w| w == b"ifil").unwrap();
    assert_eq!(bytes[ifil + 8], 4);

    let font = SoundFont::open(&output).unwrap();
    assert_eq!(font.source_format(), Some(FileFormat::Sf4));
    assert!(font.samples[0].sampletype.has(SampleType::FLAC));
    assert_eq!(font.samples[0].pcm, sine_pcm(1000), "FLAC is lossless");
}

#[test]
fn test_expand_compressed_bank_back_to_sf2() {
    let tmp = TempDir::new().unwrap();
    let seed = tmp.path().join("seed.sf2");
    let sf3 = tmp.path().join("mid.sf3");
    let back = tmp.path().join("back.sf2");
    write_seed_bank(&seed);

    sf2pack_cmd()
        .args(["-zo", seed.to_str().unwrap(), sf3.to_str().unwrap()])
        .assert()
        .success();
    sf2pack_cmd()
        .args(["-x", sf3.to_str().unwrap(), back.to_str().unwrap()])
        .assert()
        .success();

    let font = SoundFont::open(&back).unwrap();
    assert_eq!(font.source_format(), Some(FileFormat::Sf2));
    assert_eq!(
        font.samples[0].sampletype.0 & (SampleType::VORBIS | SampleType::FLAC),
        0
    );
    assert_eq!(font.samples[0].pcm.len(), 1000);
    assert!(font.info.comment.contains("CAUTION"));
}

#[test]
fn test_separate_flags_match_combined() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("seed.sf2");
    let combined = tmp.path().join("combined.sf4");
    let separate = tmp.path().join("separate.sf4");
    write_seed_bank(&input);

    sf2pack_cmd()
        .args(["-zf1", input.to_str().unwrap(), combined.to_str().unwrap()])
        .assert()
        .success();
    sf2pack_cmd()
        .args([
            "-z",
            "-f",
            "-1",
            input.to_str().unwrap(),
            separate.to_str().unwrap(),
        ])
        .assert()
        .success();

    let a = std::fs::read(&combined).unwrap();
    let b = std::fs::read(&separate).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_dump_presets_to_stderr() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("seed.sf2");
    let output = tmp.path().join("out.sf2");
    write_seed_bank(&input);

    sf2pack_cmd()
        .args(["-xd", input.to_str().unwrap(), output.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("000 0000-00 Test"));
}

#[test]
fn test_no_action_flag_exits_2() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("seed.sf2");
    let output = tmp.path().join("out.sf2");
    write_seed_bank(&input);

    sf2pack_cmd()
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no action flag"));
    assert!(!output.exists());
}

#[test]
fn test_missing_args_exit_1() {
    sf2pack_cmd().arg("-x").assert().code(1);
    sf2pack_cmd().assert().code(1);
}

#[test]
fn test_read_failure_exits_3() {
    let tmp = TempDir::new().unwrap();
    let garbage = tmp.path().join("garbage.sf2");
    let output = tmp.path().join("out.sf2");
    std::fs::write(&garbage, b"this is not a soundfont").unwrap();

    sf2pack_cmd()
        .args(["-x", garbage.to_str().unwrap(), output.to_str().unwrap()])
        .assert()
        .code(3);

    sf2pack_cmd()
        .args([
            "-x",
            tmp.path().join("missing.sf2").to_str().unwrap(),
            output.to_str().unwrap(),
        ])
        .assert()
        .code(3);
}

#[test]
fn test_help_names_the_formats() {
    sf2pack_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SF3"))
        .stdout(predicate::str::contains("FLAC"))
        .stdout(predicate::str::contains("Ogg Vorbis"));
}
