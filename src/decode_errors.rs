use core::{fmt::Display, str::Utf8Error};

use thiserror::Error;

use crate::octal::ParseOctalError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneralParseError {
  #[error("Invalid octal number: {0}")]
  InvalidOctalNumber(#[from] ParseOctalError),
  #[error("Invalid UTF-8 string: {0}")]
  InvalidUtf8(#[from] Utf8Error),
}

/// A header field, or one of the GNU side buffers standing in for one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeaderField {
  Name,
  Prefix,
  GnuLongName,
  GnuLongLink,
  Linkname,
  Mode,
  Uid,
  Gid,
  Size,
  Mtime,
  Uname,
  Gname,
  DevMajor,
  DevMinor,
}

impl Display for HeaderField {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      HeaderField::Name => write!(f, "header.name"),
      HeaderField::Prefix => write!(f, "header.prefix"),
      HeaderField::GnuLongName => write!(f, "gnu.long_name"),
      HeaderField::GnuLongLink => write!(f, "gnu.long_link"),
      HeaderField::Linkname => write!(f, "header.linkname"),
      HeaderField::Mode => write!(f, "header.mode"),
      HeaderField::Uid => write!(f, "header.uid"),
      HeaderField::Gid => write!(f, "header.gid"),
      HeaderField::Size => write!(f, "header.size"),
      HeaderField::Mtime => write!(f, "header.mtime"),
      HeaderField::Uname => write!(f, "header.uname"),
      HeaderField::Gname => write!(f, "header.gname"),
      HeaderField::DevMajor => write!(f, "header.dev_major"),
      HeaderField::DevMinor => write!(f, "header.dev_minor"),
    }
  }
}

/// Raised by strict decoding only. The lenient accessors never fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderDecodeError {
  #[error("Malformed field {field}: {error}")]
  MalformedField {
    field: HeaderField,
    error: GeneralParseError,
  },
  #[error("Path of {length} bytes in {field} exceeds the limit of {limit} bytes")]
  PathTooLong {
    field: HeaderField,
    length: usize,
    limit: usize,
  },
}

#[must_use]
pub(crate) fn malformed_field<T: Into<GeneralParseError>>(
  field: HeaderField,
) -> impl FnOnce(T) -> HeaderDecodeError {
  move |error| HeaderDecodeError::MalformedField {
    field,
    error: error.into(),
  }
}
