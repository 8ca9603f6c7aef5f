use alloc::{string::String, vec::Vec};

use log::{debug, trace};
use relative_path::RelativePathBuf;

use crate::{
  decode_errors::malformed_field,
  decode_violations::VHW,
  octal::{decode_octal, decode_octal_strict},
  tar_constants::{
    mode_bits::{S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG},
    null_terminated, parse_null_terminated_string, HeaderBlock, HeaderFormat, TarTypeFlag,
  },
  DecodeViolationHandler, DecoderOptions, FileMode, FileType, HeaderDecodeError, HeaderField,
  IdentityResolver, NumericIdentityResolver,
};

/// A header record together with the GNU long name/link records that preceded it.
///
/// Everything is borrowed from the archive reader.
#[derive(Debug, Clone, Copy)]
pub struct RawHeader<'a> {
  block: &'a HeaderBlock,
  gnu_longname: Option<&'a [u8]>,
  gnu_longlink: Option<&'a [u8]>,
}

impl<'a> RawHeader<'a> {
  #[must_use]
  pub fn new(block: &'a HeaderBlock) -> Self {
    Self {
      block,
      gnu_longname: None,
      gnu_longlink: None,
    }
  }

  /// Attaches the data of a preceding `L` record.
  #[must_use]
  pub fn with_gnu_longname(mut self, long_name: &'a [u8]) -> Self {
    self.gnu_longname = Some(long_name);
    self
  }

  /// Attaches the data of a preceding `K` record.
  #[must_use]
  pub fn with_gnu_longlink(mut self, long_link: &'a [u8]) -> Self {
    self.gnu_longlink = Some(long_link);
    self
  }

  #[must_use]
  pub fn block(&self) -> &'a HeaderBlock {
    self.block
  }

  /// The long name up to its NUL terminator, if there is a non-empty one.
  #[must_use]
  pub fn gnu_longname(&self) -> Option<&'a [u8]> {
    self
      .gnu_longname
      .map(null_terminated)
      .filter(|name| !name.is_empty())
  }

  #[must_use]
  pub fn gnu_longlink(&self) -> Option<&'a [u8]> {
    self
      .gnu_longlink
      .map(null_terminated)
      .filter(|link| !link.is_empty())
  }

  #[must_use]
  pub fn typeflag(&self) -> TarTypeFlag {
    self.block.parse_typeflag()
  }

  #[must_use]
  pub fn format(&self) -> HeaderFormat {
    self.block.format()
  }

  /// Old archivers mark directories with a regular typeflag and a trailing `/`.
  #[must_use]
  pub fn name_has_trailing_slash(&self) -> bool {
    null_terminated(&self.block.name).last() == Some(&b'/')
  }
}

/// Where a path is read from.
enum PathSource<'a> {
  Single { field: HeaderField, bytes: &'a [u8] },
  /// ustar `prefix` + `/` + `name`
  Split { prefix: &'a [u8], name: &'a [u8] },
}

impl<'a> PathSource<'a> {
  fn path_of(header: &RawHeader<'a>) -> Self {
    if let Some(long_name) = header.gnu_longname() {
      return PathSource::Single {
        field: HeaderField::GnuLongName,
        bytes: long_name,
      };
    }
    let block = header.block();
    let name = null_terminated(&block.name);
    if block.prefix[0] == b'\0' {
      PathSource::Single {
        field: HeaderField::Name,
        bytes: name,
      }
    } else {
      PathSource::Split {
        prefix: null_terminated(&block.prefix),
        name,
      }
    }
  }

  fn link_target_of(header: &RawHeader<'a>) -> Self {
    match header.gnu_longlink() {
      Some(long_link) => PathSource::Single {
        field: HeaderField::GnuLongLink,
        bytes: long_link,
      },
      None => PathSource::Single {
        field: HeaderField::Linkname,
        bytes: null_terminated(&header.block().linkname),
      },
    }
  }

  fn field(&self) -> HeaderField {
    match self {
      PathSource::Single { field, .. } => *field,
      PathSource::Split { .. } => HeaderField::Name,
    }
  }

  fn components(&self) -> [Option<(HeaderField, &'a [u8])>; 2] {
    match *self {
      PathSource::Single { field, bytes } => [Some((field, bytes)), None],
      PathSource::Split { prefix, name } => [
        Some((HeaderField::Prefix, prefix)),
        Some((HeaderField::Name, name)),
      ],
    }
  }

  fn to_bytes(&self) -> Vec<u8> {
    match *self {
      PathSource::Single { bytes, .. } => bytes.to_vec(),
      PathSource::Split { prefix, name } => {
        let mut path = Vec::with_capacity(prefix.len() + 1 + name.len());
        path.extend_from_slice(prefix);
        path.push(b'/');
        path.extend_from_slice(name);
        path
      },
    }
  }
}

/// Largest cut of `bytes` at or below `max_len` that does not split a valid
/// UTF-8 sequence. Invalid bytes are cut like any other byte.
fn bounded_len(bytes: &[u8], max_len: usize) -> usize {
  if bytes.len() <= max_len {
    return bytes.len();
  }
  let continuation = bytes[..max_len]
    .iter()
    .rev()
    .take(3)
    .take_while(|&&b| b & 0xC0 == 0x80)
    .count();
  let Some(lead) = max_len.checked_sub(continuation + 1) else {
    return max_len;
  };
  let width = match bytes[lead] {
    0xC0..=0xDF => 2,
    0xE0..=0xEF => 3,
    0xF0..=0xF7 => 4,
    _ => 1,
  };
  let splits_char = lead + width > max_len
    && bytes
      .get(lead..lead + width)
      .is_some_and(|sequence| core::str::from_utf8(sequence).is_ok());
  if splits_char {
    lead
  } else {
    max_len
  }
}

/// Cuts raw path bytes to at most `max_len` bytes.
fn bounded_bytes(mut bytes: Vec<u8>, max_len: usize) -> Vec<u8> {
  let end = bounded_len(&bytes, max_len);
  if end < bytes.len() {
    debug!("Truncating path of {} bytes to {end} bytes", bytes.len());
    bytes.truncate(end);
  }
  bytes
}

fn lossy_string(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes).into_owned()
}

/// A name usable for an identity lookup: valid UTF-8 and non-empty.
fn identity_name(field: &[u8]) -> Option<&str> {
  parse_null_terminated_string(field)
    .ok()
    .filter(|name| !name.is_empty())
}

/// ORs in the type bits implied by the typeflag when the mode carries none.
fn reconstruct_type_bits(mode: u32, header: &RawHeader<'_>) -> u32 {
  if mode & S_IFMT != 0 {
    return mode;
  }
  let typeflag = header.typeflag();
  let type_bits = match typeflag {
    TarTypeFlag::SymbolicLink => S_IFLNK,
    TarTypeFlag::CharacterDevice => S_IFCHR,
    TarTypeFlag::BlockDevice => S_IFBLK,
    TarTypeFlag::Directory => S_IFDIR,
    TarTypeFlag::Fifo => S_IFIFO,
    TarTypeFlag::OldRegularFile if header.name_has_trailing_slash() => S_IFDIR,
    _ => S_IFREG,
  };
  trace!("Mode {mode:#o} has no type bits, using {type_bits:#o} for typeflag {typeflag:?}");
  mode | type_bits
}

/// What an archive member is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  Regular,
  HardLink,
  SymbolicLink,
  CharacterDevice,
  BlockDevice,
  Directory,
  Fifo,
  /// A GNU record carrying the long name of the next member.
  LongName,
  /// A GNU record carrying the long link target of the next member.
  LongLink,
  /// Extension records and typeflags without a file-type meaning.
  Other(TarTypeFlag),
}

/// The typeflag decides; unknown typeflags fall back to the mode's type bits.
fn classify(header: &RawHeader<'_>, raw_mode: u32) -> EntryKind {
  match header.typeflag() {
    TarTypeFlag::LongNameGnu => EntryKind::LongName,
    TarTypeFlag::LongLinkNameGnu => EntryKind::LongLink,
    TarTypeFlag::HardLink => EntryKind::HardLink,
    TarTypeFlag::SymbolicLink => EntryKind::SymbolicLink,
    TarTypeFlag::CharacterDevice => EntryKind::CharacterDevice,
    TarTypeFlag::BlockDevice => EntryKind::BlockDevice,
    TarTypeFlag::Directory => EntryKind::Directory,
    TarTypeFlag::Fifo => EntryKind::Fifo,
    TarTypeFlag::OldRegularFile if header.name_has_trailing_slash() => EntryKind::Directory,
    TarTypeFlag::RegularFile | TarTypeFlag::OldRegularFile | TarTypeFlag::ContinuousFile => {
      EntryKind::Regular
    },
    other => match FileType::from_mode(raw_mode) {
      FileType::Regular => EntryKind::Regular,
      FileType::Directory => EntryKind::Directory,
      FileType::SymbolicLink => EntryKind::SymbolicLink,
      FileType::CharacterDevice => EntryKind::CharacterDevice,
      FileType::BlockDevice => EntryKind::BlockDevice,
      FileType::Fifo => EntryKind::Fifo,
      FileType::Socket | FileType::Untyped | FileType::Unknown(_) => EntryKind::Other(other),
    },
  }
}

/// Every field of a header, as produced by [`HeaderDecoder::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeader {
  pub path: RelativePathBuf,
  /// Set for headers with a non-empty link target.
  pub link_target: Option<RelativePathBuf>,
  pub kind: EntryKind,
  pub typeflag: TarTypeFlag,
  /// Mode with reconstructed type bits.
  pub mode: FileMode,
  pub uid: u32,
  pub gid: u32,
  pub uname: String,
  pub gname: String,
  pub size: u64,
  /// Seconds since the epoch.
  pub mtime: u64,
  pub dev_major: u32,
  pub dev_minor: u32,
}

fn checked_octal<VH: DecodeViolationHandler>(
  vh: &mut VHW<'_, VH>,
  bytes: &[u8],
  field: HeaderField,
) -> Result<u64, HeaderDecodeError> {
  Ok(
    vh.hpvr(decode_octal_strict(bytes).map_err(malformed_field(field)))?
      .unwrap_or_else(|| decode_octal(bytes)),
  )
}

fn checked_string<VH: DecodeViolationHandler>(
  vh: &mut VHW<'_, VH>,
  bytes: &[u8],
  field: HeaderField,
) -> Result<String, HeaderDecodeError> {
  Ok(
    vh.hpvr(
      parse_null_terminated_string(bytes)
        .map(String::from)
        .map_err(malformed_field(field)),
    )?
    .unwrap_or_else(|| String::from_utf8_lossy(null_terminated(bytes)).into_owned()),
  )
}

/// Turns header records into paths, ids and modes.
///
/// The plain accessors never fail: malformed fields degrade to the value
/// historic tar implementations produce. [`HeaderDecoder::decode`] is the
/// strict variant.
#[derive(Debug, Clone, Default)]
pub struct HeaderDecoder<R: IdentityResolver = NumericIdentityResolver> {
  resolver: R,
  options: DecoderOptions,
}

impl HeaderDecoder {
  /// A decoder that always uses the numeric ids of the header.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }
}

impl<R: IdentityResolver> HeaderDecoder<R> {
  pub fn with_resolver(resolver: R) -> Self {
    Self {
      resolver,
      options: DecoderOptions::default(),
    }
  }

  #[must_use]
  pub fn with_options(mut self, options: DecoderOptions) -> Self {
    self.options = options;
    self
  }

  pub fn options(&self) -> &DecoderOptions {
    &self.options
  }

  pub fn resolver(&self) -> &R {
    &self.resolver
  }

  /// The member path exactly as stored: the GNU long name if present,
  /// otherwise `prefix/name` when the prefix is set, otherwise `name`.
  ///
  /// Cut to [`DecoderOptions::max_path_len`] bytes.
  #[must_use]
  pub fn get_path_bytes(&self, header: &RawHeader<'_>) -> Vec<u8> {
    bounded_bytes(
      PathSource::path_of(header).to_bytes(),
      self.options.max_path_len,
    )
  }

  /// [`Self::get_path_bytes`] as text. Bytes that are not UTF-8 become
  /// U+FFFD, so distinct non-UTF-8 names can map to the same string.
  #[must_use]
  pub fn get_path(&self, header: &RawHeader<'_>) -> String {
    lossy_string(&self.get_path_bytes(header))
  }

  /// The link target exactly as stored: the GNU long link if present,
  /// otherwise `linkname`.
  #[must_use]
  pub fn get_linkname_bytes(&self, header: &RawHeader<'_>) -> Vec<u8> {
    bounded_bytes(
      PathSource::link_target_of(header).to_bytes(),
      self.options.max_path_len,
    )
  }

  #[must_use]
  pub fn get_linkname(&self, header: &RawHeader<'_>) -> String {
    lossy_string(&self.get_linkname_bytes(header))
  }

  fn resolve_user(&self, uname: &[u8]) -> Option<u32> {
    if !self.options.resolve_names {
      return None;
    }
    identity_name(uname).and_then(|name| self.resolver.lookup_user_by_name(name))
  }

  fn resolve_group(&self, gname: &[u8]) -> Option<u32> {
    if !self.options.resolve_names {
      return None;
    }
    identity_name(gname).and_then(|name| self.resolver.lookup_group_by_name(name))
  }

  /// The id `uname` resolves to, or else the `uid` field.
  #[must_use]
  pub fn get_owner_id(&self, header: &RawHeader<'_>) -> u32 {
    let block = header.block();
    self
      .resolve_user(&block.uname)
      .unwrap_or_else(|| decode_octal(&block.uid) as u32)
  }

  /// The id `gname` resolves to, or else the `gid` field.
  #[must_use]
  pub fn get_group_id(&self, header: &RawHeader<'_>) -> u32 {
    let block = header.block();
    self
      .resolve_group(&block.gname)
      .unwrap_or_else(|| decode_octal(&block.gid) as u32)
  }

  /// The `mode` field, with file type bits taken from the typeflag when
  /// the archiver left them out.
  #[must_use]
  pub fn get_mode(&self, header: &RawHeader<'_>) -> u32 {
    reconstruct_type_bits(decode_octal(&header.block().mode) as u32, header)
  }

  #[must_use]
  pub fn get_file_mode(&self, header: &RawHeader<'_>) -> FileMode {
    FileMode::from_bits(self.get_mode(header))
  }

  #[must_use]
  pub fn get_size(&self, header: &RawHeader<'_>) -> u64 {
    decode_octal(&header.block().size)
  }

  #[must_use]
  pub fn get_mtime(&self, header: &RawHeader<'_>) -> u64 {
    decode_octal(&header.block().mtime)
  }

  #[must_use]
  pub fn get_dev_major(&self, header: &RawHeader<'_>) -> u32 {
    decode_octal(&header.block().dev_major) as u32
  }

  #[must_use]
  pub fn get_dev_minor(&self, header: &RawHeader<'_>) -> u32 {
    decode_octal(&header.block().dev_minor) as u32
  }

  #[must_use]
  pub fn get_entry_kind(&self, header: &RawHeader<'_>) -> EntryKind {
    classify(header, decode_octal(&header.block().mode) as u32)
  }

  fn checked_path<VH: DecodeViolationHandler>(
    &self,
    vh: &mut VHW<'_, VH>,
    source: &PathSource<'_>,
  ) -> Result<String, HeaderDecodeError> {
    for (field, bytes) in source.components().into_iter().flatten() {
      vh.hpvr(core::str::from_utf8(bytes).map_err(malformed_field(field)))?;
    }
    let bytes = source.to_bytes();
    let limit = self.options.max_path_len;
    if bytes.len() > limit {
      vh.hpve(HeaderDecodeError::PathTooLong {
        field: source.field(),
        length: bytes.len(),
        limit,
      })?;
    }
    Ok(lossy_string(&bounded_bytes(bytes, limit)))
  }

  /// Decodes every field, handing malformed ones to `violation_handler`.
  ///
  /// Fields the handler lets through get the same value the plain accessors
  /// return, so with [`crate::IgnoreViolationHandler`] this never fails.
  /// Device numbers are only checked for device entries.
  pub fn decode<VH: DecodeViolationHandler>(
    &self,
    header: &RawHeader<'_>,
    violation_handler: &mut VH,
  ) -> Result<DecodedHeader, HeaderDecodeError> {
    let vh = &mut VHW(violation_handler);
    let block = header.block();
    let typeflag = header.typeflag();

    let path = self.checked_path(vh, &PathSource::path_of(header))?;
    let link_target = self.checked_path(vh, &PathSource::link_target_of(header))?;

    let raw_mode = checked_octal(vh, &block.mode, HeaderField::Mode)? as u32;
    let uid = checked_octal(vh, &block.uid, HeaderField::Uid)? as u32;
    let gid = checked_octal(vh, &block.gid, HeaderField::Gid)? as u32;
    let size = checked_octal(vh, &block.size, HeaderField::Size)?;
    let mtime = checked_octal(vh, &block.mtime, HeaderField::Mtime)?;
    let uname = checked_string(vh, &block.uname, HeaderField::Uname)?;
    let gname = checked_string(vh, &block.gname, HeaderField::Gname)?;

    let (dev_major, dev_minor) = if typeflag.is_device() {
      (
        checked_octal(vh, &block.dev_major, HeaderField::DevMajor)? as u32,
        checked_octal(vh, &block.dev_minor, HeaderField::DevMinor)? as u32,
      )
    } else {
      (self.get_dev_major(header), self.get_dev_minor(header))
    };

    Ok(DecodedHeader {
      path: RelativePathBuf::from(path),
      link_target: (!link_target.is_empty()).then(|| RelativePathBuf::from(link_target)),
      kind: classify(header, raw_mode),
      typeflag,
      mode: FileMode::from_bits(reconstruct_type_bits(raw_mode, header)),
      uid: self.resolve_user(&block.uname).unwrap_or(uid),
      gid: self.resolve_group(&block.gname).unwrap_or(gid),
      uname,
      gname,
      size,
      mtime,
      dev_major,
      dev_minor,
    })
  }
}
