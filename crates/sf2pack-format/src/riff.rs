//! Binary I/O primitives for the RIFF container: little-endian integers,
//! FourCC identifiers, and fixed-width NUL-padded strings over seekable
//! byte streams.

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{map_eof, Result, SoundFontError};

/// A 4-byte ASCII chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC(\"{self}\")")
    }
}

pub const RIFF: FourCC = FourCC::new(b"RIFF");
pub const LIST: FourCC = FourCC::new(b"LIST");
pub const SFBK: FourCC = FourCC::new(b"sfbk");
pub const INFO: FourCC = FourCC::new(b"INFO");
pub const SDTA: FourCC = FourCC::new(b"sdta");
pub const PDTA: FourCC = FourCC::new(b"pdta");
pub const SMPL: FourCC = FourCC::new(b"smpl");

// ───────────────────────────── reads ─────────────────────────────

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    r.read_u8().map_err(map_eof)
}

pub fn read_i8<R: Read>(r: &mut R) -> Result<i8> {
    r.read_i8().map_err(map_eof)
}

pub fn read_u16<R: Read>(r: &mut R) -> Result<u16> {
    r.read_u16::<LittleEndian>().map_err(map_eof)
}

pub fn read_i16<R: Read>(r: &mut R) -> Result<i16> {
    r.read_i16::<LittleEndian>().map_err(map_eof)
}

pub fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    r.read_u32::<LittleEndian>().map_err(map_eof)
}

pub fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    r.read_i32::<LittleEndian>().map_err(map_eof)
}

pub fn read_fourcc<R: Read>(r: &mut R) -> Result<FourCC> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes).map_err(map_eof)?;
    Ok(FourCC(bytes))
}

/// Read a FourCC and fail with [`SoundFontError::BadSignature`] if it is
/// not the expected one.
pub fn expect_fourcc<R: Read>(r: &mut R, expected: FourCC) -> Result<()> {
    let got = read_fourcc(r)?;
    if got != expected {
        return Err(SoundFontError::BadSignature { expected, got });
    }
    Ok(())
}

/// Read `n` bytes as a fixed-width string: truncated at the first NUL,
/// decoded as UTF-8 with replacement of invalid sequences.
pub fn read_fixed_string<R: Read>(r: &mut R, n: usize) -> Result<String> {
    let mut bytes = vec![0u8; n];
    r.read_exact(&mut bytes).map_err(map_eof)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(n);
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Relative seek forward by `n` bytes.
pub fn skip<S: Seek>(s: &mut S, n: u64) -> Result<()> {
    s.seek(SeekFrom::Current(n as i64))?;
    Ok(())
}

// ───────────────────────────── writes ─────────────────────────────

pub fn write_u8<W: Write>(w: &mut W, val: u8) -> Result<()> {
    w.write_u8(val)?;
    Ok(())
}

pub fn write_i8<W: Write>(w: &mut W, val: i8) -> Result<()> {
    w.write_i8(val)?;
    Ok(())
}

pub fn write_u16<W: Write>(w: &mut W, val: u16) -> Result<()> {
    w.write_u16::<LittleEndian>(val)?;
    Ok(())
}

pub fn write_i16<W: Write>(w: &mut W, val: i16) -> Result<()> {
    w.write_i16::<LittleEndian>(val)?;
    Ok(())
}

pub fn write_u32<W: Write>(w: &mut W, val: u32) -> Result<()> {
    w.write_u32::<LittleEndian>(val)?;
    Ok(())
}

pub fn write_fourcc<W: Write>(w: &mut W, fourcc: FourCC) -> Result<()> {
    w.write_all(fourcc.as_bytes())?;
    Ok(())
}

/// Write a string into a fixed-width field: truncated to `n` bytes and
/// zero-padded to exactly `n`.
pub fn write_fixed_string<W: Write>(w: &mut W, s: &str, n: usize) -> Result<()> {
    let bytes = s.as_bytes();
    let len = bytes.len().min(n);
    w.write_all(&bytes[..len])?;
    if len < n {
        w.write_all(&vec![0u8; n - len])?;
    }
    Ok(())
}
