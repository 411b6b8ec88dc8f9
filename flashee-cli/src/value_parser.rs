//! Argument parsing utilities for CLI commands
//!
//! This module parses the numbers and data arguments taken by the commands.
//!
//! # Number Notation
//!
//! - `4096` - decimal
//! - `0x1000` - hexadecimal
//! - `4k`, `1m` - kibibytes and mebibytes
//!
//! # Data Notation
//!
//! - `text:hello` - UTF-8 text
//! - `@path/to/file` - contents of a host file
//! - `de ad be ef`, `0xdeadbeef` or `hex:deadbeef` - hex bytes

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Parse a decimal, `0x` hexadecimal or `k`/`m` suffixed number.
pub fn parse_number(s: &str) -> Result<u32> {
    let s = s.trim().replace('_', "");
    let (digits, scale) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1024u64),
        Some((i, 'm' | 'M')) => (&s[..i], 1024 * 1024),
        _ => (s.as_str(), 1),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        digits.parse::<u64>()
    }
    .with_context(|| format!("Invalid number: '{}'", s))?;

    value
        .checked_mul(scale)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .with_context(|| format!("Number out of range: '{}'", s))
}

/// A parsed data specification for the `write` command
#[derive(Debug, Clone, PartialEq)]
pub enum DataSpec {
    /// Literal bytes given in hex
    Hex(Vec<u8>),
    /// UTF-8 text (e.g., "text:hello")
    Text(String),
    /// Contents of a host file (e.g., "@data.bin")
    File(PathBuf),
}

impl DataSpec {
    /// Parse a data specification string into a DataSpec
    ///
    /// # Syntax
    ///
    /// - `text:...` - Text, taken verbatim
    /// - `@path` - Host file
    /// - `hex:...` or anything else - Hex bytes; whitespace, `,` and a
    ///   leading `0x` are ignored
    pub fn parse(arg: &str) -> Result<Self> {
        if let Some(text) = arg.strip_prefix("text:") {
            return Ok(DataSpec::Text(text.to_string()));
        }
        if let Some(path) = arg.strip_prefix('@') {
            if path.is_empty() {
                anyhow::bail!("Missing file name after '@'");
            }
            return Ok(DataSpec::File(PathBuf::from(path)));
        }

        let hex = arg.strip_prefix("hex:").unwrap_or(arg);
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let digits: String = hex
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        if digits.is_empty() {
            anyhow::bail!("No data given. Use hex bytes, 'text:...' or '@file'.");
        }
        if digits.len() % 2 != 0 {
            anyhow::bail!("Hex data '{}' has an odd number of digits", arg);
        }

        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&digits[i..i + 2], 16)
                    .with_context(|| format!("Invalid hex byte '{}'", &digits[i..i + 2]))
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok(DataSpec::Hex(bytes))
    }

    /// Resolve the specification into the bytes to write
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            DataSpec::Hex(bytes) => Ok(bytes),
            DataSpec::Text(text) => Ok(text.into_bytes()),
            DataSpec::File(path) => std::fs::read(&path)
                .with_context(|| format!("Failed to read data file: {}", path.display())),
        }
    }

    /// Returns true if the data comes from a host file
    pub fn is_file(&self) -> bool {
        matches!(self, DataSpec::File(_))
    }
}

/// A byte range of the image with optional bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte, defaults to the start of the image
    pub start: Option<u32>,
    /// One past the last byte, defaults to the end of the image
    pub end: Option<u32>,
}

/// Parse a `start..end` byte range
///
/// Either bound may be left out (e.g., "0x1000.." or "..64k").
pub fn parse_range(arg: &str) -> Result<ByteRange> {
    let (start, end) = arg
        .split_once("..")
        .with_context(|| format!("Range '{}' must look like 'start..end'", arg))?;
    let bound = |s: &str| -> Result<Option<u32>> {
        if s.trim().is_empty() {
            Ok(None)
        } else {
            parse_number(s).map(Some)
        }
    };
    let range = ByteRange {
        start: bound(start)?,
        end: bound(end)?,
    };
    if let ByteRange {
        start: Some(start),
        end: Some(end),
    } = range
    {
        if start > end {
            anyhow::bail!("Range start {:#x} is after its end {:#x}", start, end);
        }
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert_eq!(parse_number("0x1000").unwrap(), 4096);
        assert_eq!(parse_number("4k").unwrap(), 4096);
        assert_eq!(parse_number("1M").unwrap(), 1 << 20);
        assert_eq!(parse_number("0x10_0000").unwrap(), 1 << 20);
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert!(parse_number("12z").is_err());
        assert!(parse_number("").is_err());
        assert!(parse_number("8m").is_ok());
        assert!(parse_number("4096m").is_err());
    }

    #[test]
    fn test_parse_number_scale_overflow() {
        let err = parse_number("18446744073709551615k").unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(parse_number("0xFFFFFFFFFFFFFm").is_err());
    }

    #[test]
    fn test_parse_hex_data() {
        let data = DataSpec::parse("de ad,be ef").unwrap();
        assert_eq!(data, DataSpec::Hex(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(DataSpec::parse("0x0102").unwrap(), DataSpec::Hex(vec![1, 2]));
        assert_eq!(DataSpec::parse("hex:ff").unwrap(), DataSpec::Hex(vec![0xFF]));
    }

    #[test]
    fn test_parse_hex_data_errors() {
        let result = DataSpec::parse("abc");
        assert!(result.unwrap_err().to_string().contains("odd number"));
        assert!(DataSpec::parse("zz").is_err());
        assert!(DataSpec::parse("  ").is_err());
    }

    #[test]
    fn test_parse_text_and_file() {
        let data = DataSpec::parse("text:hello: world").unwrap();
        assert_eq!(data.clone().into_bytes().unwrap(), b"hello: world");
        assert!(!data.is_file());

        let data = DataSpec::parse("@dump.bin").unwrap();
        assert_eq!(data, DataSpec::File(PathBuf::from("dump.bin")));
        assert!(data.is_file());
        assert!(DataSpec::parse("@").is_err());
    }

    #[test]
    fn test_read_data_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[1, 2, 3]).unwrap();
        let data = DataSpec::File(file.path().to_path_buf());
        assert_eq!(data.into_bytes().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_range() {
        let range = parse_range("0x1000..8k").unwrap();
        assert_eq!(range.start, Some(0x1000));
        assert_eq!(range.end, Some(0x2000));
        assert_eq!(parse_range("4k..").unwrap().end, None);
        assert_eq!(parse_range("..").unwrap(), ByteRange::default());
        assert!(parse_range("8k..4k").is_err());
        assert!(parse_range("4096").is_err());
    }
}
