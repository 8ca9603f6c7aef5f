use core::str::Utf8Error;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

// --- Constants for the TAR Header Format ---
pub const BLOCK_SIZE: usize = 512;

/// Width of the `name` field.
pub const NAME_LEN: usize = 100;
/// Width of the ustar `prefix` field.
pub const PREFIX_LEN: usize = 155;

/// https://www.gnu.org/software/tar/manual/html_node/Standard.html
/// # Typeflags:
///
/// ## STANDARD:
///
/// - `\0` for regular file (pre-POSIX, also known as `AREGTYPE`)
/// - `0` for regular file
/// - `1` for hard link
/// - `2` for symbolic link
/// - `3` for character device
/// - `4` for block device
/// - `5` for directory
/// - `6` for FIFO
/// - `7` for continuous file reserved (not used)
///
/// ## PAX:
///
/// - `x` for extended header (precedes the file it is associated with) also known as `pax`
/// - `g` for global extended header (applies to all following entries)
///
/// ## GNU:
///
/// - `L` for long name
/// - `K` for long link name
/// - `S` for sparse file (old format for sparse files)
#[derive(Debug, Eq, Hash, PartialEq, Clone, Copy)]
pub enum TarTypeFlag {
  /// Regular file, flagged with `0`
  RegularFile,
  /// Regular file, flagged with `\0` by old archivers.
  ///
  /// A name ending in `/` marks a directory in this encoding.
  OldRegularFile,
  /// Hard link
  HardLink,
  /// Symbolic link
  SymbolicLink,
  /// Character device
  CharacterDevice,
  /// Block device
  BlockDevice,
  /// Directory
  Directory,
  /// FIFO (named pipe)
  Fifo,
  /// Indicates that this is a continuous file,
  ContinuousFile,
  /// Extended header `pax`
  PaxExtendedHeader,
  /// Global extended header `pax`
  PaxGlobalExtendedHeader,
  /// GNU extension - long file name
  LongNameGnu,
  /// GNU extension - long link name (link target)
  LongLinkNameGnu,
  /// GNU extension - sparse file
  SparseOldGnu,
  UnknownTypeFlag(u8),
}

impl TarTypeFlag {
  #[must_use]
  pub fn is_device(&self) -> bool {
    matches!(
      self,
      TarTypeFlag::CharacterDevice | TarTypeFlag::BlockDevice
    )
  }
}

impl From<u8> for TarTypeFlag {
  fn from(value: u8) -> Self {
    match value {
      b'\0' => TarTypeFlag::OldRegularFile,
      b'0' => TarTypeFlag::RegularFile,
      b'1' => TarTypeFlag::HardLink,
      b'2' => TarTypeFlag::SymbolicLink,
      b'3' => TarTypeFlag::CharacterDevice,
      b'4' => TarTypeFlag::BlockDevice,
      b'5' => TarTypeFlag::Directory,
      b'6' => TarTypeFlag::Fifo,
      b'7' => TarTypeFlag::ContinuousFile,
      b'x' => TarTypeFlag::PaxExtendedHeader,
      b'g' => TarTypeFlag::PaxGlobalExtendedHeader,
      b'L' => TarTypeFlag::LongNameGnu,
      b'K' => TarTypeFlag::LongLinkNameGnu,
      b'S' => TarTypeFlag::SparseOldGnu,
      _ => TarTypeFlag::UnknownTypeFlag(value),
    }
  }
}

impl From<TarTypeFlag> for u8 {
  fn from(value: TarTypeFlag) -> Self {
    match value {
      TarTypeFlag::OldRegularFile => b'\0',
      TarTypeFlag::RegularFile => b'0',
      TarTypeFlag::HardLink => b'1',
      TarTypeFlag::SymbolicLink => b'2',
      TarTypeFlag::CharacterDevice => b'3',
      TarTypeFlag::BlockDevice => b'4',
      TarTypeFlag::Directory => b'5',
      TarTypeFlag::Fifo => b'6',
      TarTypeFlag::ContinuousFile => b'7',
      TarTypeFlag::PaxExtendedHeader => b'x',
      TarTypeFlag::PaxGlobalExtendedHeader => b'g',
      TarTypeFlag::LongNameGnu => b'L',
      TarTypeFlag::LongLinkNameGnu => b'K',
      TarTypeFlag::SparseOldGnu => b'S',
      TarTypeFlag::UnknownTypeFlag(value) => value,
    }
  }
}

/// POSIX `st_mode` file type bits.
pub mod mode_bits {
  /// Mask selecting the file type bits.
  pub const S_IFMT: u32 = 0o170_000;
  pub const S_IFSOCK: u32 = 0o140_000;
  pub const S_IFLNK: u32 = 0o120_000;
  pub const S_IFREG: u32 = 0o100_000;
  pub const S_IFBLK: u32 = 0o060_000;
  pub const S_IFDIR: u32 = 0o040_000;
  pub const S_IFCHR: u32 = 0o020_000;
  pub const S_IFIFO: u32 = 0o010_000;
}

pub(crate) fn find_null_terminator_index(bytes: &[u8]) -> usize {
  bytes
    .iter()
    .position(|&b| b == b'\0')
    .unwrap_or(bytes.len())
}

/// The bytes of a fixed-width field up to its first NUL.
#[must_use]
pub fn null_terminated(bytes: &[u8]) -> &[u8] {
  &bytes[..find_null_terminator_index(bytes)]
}

pub fn parse_null_terminated_string(bytes: &[u8]) -> Result<&str, Utf8Error> {
  core::str::from_utf8(null_terminated(bytes))
}

/// Which header layout the magic and version bytes announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
  /// Magic field is all zeros.
  V7,
  /// `ustar\0` + `00`, shared by ustar, pax and posix archives.
  Ustar,
  /// `ustar  \0`, the old GNU layout.
  Gnu,
  Unknown,
}

/// The 512-byte header record, as written by v7, ustar and GNU archivers.
///
/// Fields past `linkname` are zero-filled in v7 archives.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug)]
#[repr(C)]
pub struct HeaderBlock {
  /// File name, null-terminated unless it uses all 100 bytes
  pub name: [u8; NAME_LEN],
  /// File mode (octal), stored as ASCII bytes
  pub mode: [u8; 8],
  /// User ID of file owner (octal), stored as ASCII bytes
  pub uid: [u8; 8],
  /// Group ID of file owner (octal), stored as ASCII bytes
  pub gid: [u8; 8],
  /// File size in bytes (octal), stored as ASCII bytes
  ///
  /// After the header block, not including the header itself.
  pub size: [u8; 12],
  /// Modification time (epoch seconds, octal), stored as ASCII bytes
  pub mtime: [u8; 12],
  /// Header checksum (space-padded), stored as ASCII bytes
  pub checksum: [u8; 8],
  /// File type flag (e.g., 0 = file, 5 = directory)
  pub typeflag: u8,
  /// Target name of a link, null-terminated
  pub linkname: [u8; 100],
  /// Usually made up of [u8; 6] for the magic string
  /// and [u8; 2] for the version string.
  /// They are never used independently.
  pub magic_version: [u8; 8],
  /// User name, null-terminated
  pub uname: [u8; 32],
  /// Group name, null-terminated
  pub gname: [u8; 32],
  /// Major device number (octal), stored as ASCII bytes
  pub dev_major: [u8; 8],
  /// Minor device number (octal), stored as ASCII bytes
  pub dev_minor: [u8; 8],
  /// Path prefix used if name exceeds 100 bytes, null-terminated
  pub prefix: [u8; PREFIX_LEN],
  pub pad: [u8; 12],
}

impl HeaderBlock {
  /// Used by the old `v7` format.
  pub const MAGIC_VERSION_V7: &[u8; 8] = b"\0\0\0\0\0\0\0\0";
  /// Shared by `ustar`, `pax` and `posix` formats.
  pub const MAGIC_VERSION_USTAR: &[u8; 8] = b"ustar\000";
  /// Used by the GNU format.
  pub const MAGIC_VERSION_GNU: &[u8; 8] = b"ustar  \0";

  /// Views a raw block as a header record.
  #[must_use]
  pub fn from_block(block: &[u8; BLOCK_SIZE]) -> &HeaderBlock {
    zerocopy::transmute_ref!(block)
  }

  #[must_use]
  pub fn format(&self) -> HeaderFormat {
    match &self.magic_version {
      m if m == Self::MAGIC_VERSION_USTAR => HeaderFormat::Ustar,
      m if m == Self::MAGIC_VERSION_GNU => HeaderFormat::Gnu,
      m if m == Self::MAGIC_VERSION_V7 => HeaderFormat::V7,
      _ => HeaderFormat::Unknown,
    }
  }

  #[must_use]
  pub fn parse_typeflag(&self) -> TarTypeFlag {
    self.typeflag.into()
  }
}
