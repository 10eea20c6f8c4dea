//! Field delimiter detection from a file's leading bytes.

use std::{fmt, fs::File, io::Read, path::Path};

use crate::{Error, Result};

/// At most this many bytes are read; source files can be hundreds of MB.
pub const SNIFF_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
  Tab,
  Semicolon,
  Comma,
}

impl Delimiter {
  pub fn as_byte(self) -> u8 {
    match self {
      Self::Tab => b'\t',
      Self::Semicolon => b';',
      Self::Comma => b',',
    }
  }
}

impl fmt::Display for Delimiter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Tab => "TAB",
      Self::Semicolon => ";",
      Self::Comma => ",",
    })
  }
}

/// Detect the delimiter of the file at `path` from its first line.
pub fn sniff_delimiter(path: &Path) -> Result<Delimiter> {
  let file = File::open(path).map_err(|e| Error::io(path, e))?;
  let mut head = Vec::new();
  file
    .take(SNIFF_BYTES)
    .read_to_end(&mut head)
    .map_err(|e| Error::io(path, e))?;
  Ok(detect_delimiter(&head))
}

/// Tab wins over semicolon, semicolon over the comma default.
pub fn detect_delimiter(head: &[u8]) -> Delimiter {
  let text = String::from_utf8_lossy(head);
  let first_line = text.split('\n').next().unwrap_or_default();

  if first_line.contains('\t') {
    Delimiter::Tab
  } else if first_line.contains(';') {
    Delimiter::Semicolon
  } else {
    Delimiter::Comma
  }
}
