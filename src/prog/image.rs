//! `.ls8` program-image files.
//!
//! The format is text-based: one instruction byte per line, written as 8
//! binary digits. Anything on the line after the digits is a comment, and
//! lines that do not start with `0` or `1` (blank lines, `#` comments)
//! are skipped entirely.

use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// A loaded program image.
#[derive(Debug, Clone)]
pub struct ProgramImage {
    /// The program bytes, in load order.
    pub bytes: Vec<u8>,
    /// The source line each byte came from (for diagnostics).
    pub source_lines: Vec<String>,
}

impl ProgramImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    /// Add a byte with its originating source line.
    pub fn push(&mut self, byte: u8, source: &str) {
        self.bytes.push(byte);
        self.source_lines.push(source.to_string());
    }

    /// Number of program bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Load a `.ls8` image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
    let reader = BufReader::new(file);

    let mut image = ProgramImage::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| ImageError::Io(e.to_string()))?;
        let byte = match parse_line(&line) {
            Ok(Some(byte)) => byte,
            Ok(None) => continue,
            Err(message) => {
                return Err(ImageError::Parse {
                    line: line_num + 1,
                    message,
                })
            }
        };
        image.push(byte, line.trim());
    }

    Ok(image)
}

/// Parse one source line. `Ok(None)` means the line carries no byte.
pub fn parse_line(line: &str) -> Result<Option<u8>, String> {
    let trimmed = line.trim_start();

    // Only lines starting with a binary digit carry program bytes
    if !matches!(trimmed.chars().next(), Some('0' | '1')) {
        return Ok(None);
    }

    let digits: String = trimmed.chars().take_while(|c| *c == '0' || *c == '1').collect();
    if digits.len() != 8 {
        return Err(format!("expected 8 binary digits, found {}", digits.len()));
    }

    u8::from_str_radix(&digits, 2).map(Some).map_err(|e| e.to_string())
}

/// Parse image source held in memory (used by tests and embedders).
pub fn parse_image(source: &str) -> Result<ProgramImage, ImageError> {
    let mut image = ProgramImage::new();

    for (line_num, line) in source.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(byte)) => image.push(byte, line.trim()),
            Ok(None) => {}
            Err(message) => {
                return Err(ImageError::Parse {
                    line: line_num + 1,
                    message,
                })
            }
        }
    }

    Ok(image)
}

/// Errors that can occur while loading a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}
