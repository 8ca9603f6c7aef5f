use alloc::{string::String, vec};

use crate::{
  tar_constants::mode_bits::{S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG},
  DecoderOptions, EntryKind, HeaderBlock, HeaderDecoder, HeaderFormat, RawHeader,
  TableIdentityResolver, BLOCK_SIZE,
};

/// Writes header fields into a zeroed 512-byte block.
pub(crate) struct HeaderBuilder {
  block: [u8; BLOCK_SIZE],
}

fn set_field(field: &mut [u8], value: &[u8]) {
  field.fill(0);
  field[..value.len()].copy_from_slice(value);
}

macro_rules! text_fields {
  ($($field:ident),*) => {
    $(
      pub(crate) fn $field(mut self, value: &str) -> Self {
        set_field(&mut self.fields().$field, value.as_bytes());
        self
      }
    )*
  };
}

impl HeaderBuilder {
  pub(crate) fn v7() -> Self {
    Self {
      block: [0; BLOCK_SIZE],
    }
  }

  pub(crate) fn ustar() -> Self {
    let mut builder = Self::v7();
    builder.fields().magic_version = *HeaderBlock::MAGIC_VERSION_USTAR;
    builder
  }

  pub(crate) fn gnu() -> Self {
    let mut builder = Self::v7();
    builder.fields().magic_version = *HeaderBlock::MAGIC_VERSION_GNU;
    builder
  }

  fn fields(&mut self) -> &mut HeaderBlock {
    zerocopy::transmute_mut!(&mut self.block)
  }

  text_fields!(
    name, mode, uid, gid, size, mtime, linkname, uname, gname, dev_major, dev_minor, prefix
  );

  pub(crate) fn name_bytes(mut self, value: &[u8]) -> Self {
    set_field(&mut self.fields().name, value);
    self
  }

  pub(crate) fn linkname_bytes(mut self, value: &[u8]) -> Self {
    set_field(&mut self.fields().linkname, value);
    self
  }

  pub(crate) fn typeflag(mut self, typeflag: u8) -> Self {
    self.fields().typeflag = typeflag;
    self
  }

  pub(crate) fn finish(self) -> [u8; BLOCK_SIZE] {
    self.block
  }
}

fn entry(mode: &str, typeflag: u8, name: &str) -> [u8; BLOCK_SIZE] {
  HeaderBuilder::ustar()
    .name(name)
    .mode(mode)
    .typeflag(typeflag)
    .finish()
}

#[test]
fn test_directory_typeflag_adds_directory_bit() {
  let block = entry("0000755", b'5', "etc");
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  assert_eq!(HeaderDecoder::new().get_mode(&header), 0o755 | S_IFDIR);
}

#[test]
fn test_type_bits_follow_typeflag() {
  let decoder = HeaderDecoder::new();
  for (typeflag, type_bits) in [
    (b'0', S_IFREG),
    (b'1', S_IFREG),
    (b'2', S_IFLNK),
    (b'3', S_IFCHR),
    (b'4', S_IFBLK),
    (b'5', S_IFDIR),
    (b'6', S_IFIFO),
    (b'7', S_IFREG),
    (b'\0', S_IFREG),
  ] {
    let block = entry("0000640", typeflag, "member");
    let header = RawHeader::new(HeaderBlock::from_block(&block));
    assert_eq!(
      decoder.get_mode(&header),
      0o640 | type_bits,
      "typeflag {typeflag:#04x}"
    );
  }
}

#[test]
fn test_old_regular_file_with_trailing_slash_is_directory() {
  let block = HeaderBuilder::v7()
    .name("usr/share/")
    .mode("000755 \0")
    .typeflag(b'\0')
    .finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  let decoder = HeaderDecoder::new();
  assert_eq!(decoder.get_mode(&header), 0o755 | S_IFDIR);
  assert_eq!(decoder.get_entry_kind(&header), EntryKind::Directory);
}

#[test]
fn test_posix_regular_file_with_trailing_slash_stays_regular() {
  let block = entry("0000755", b'0', "usr/share/");
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  assert_eq!(HeaderDecoder::new().get_mode(&header), 0o755 | S_IFREG);
}

#[test]
fn test_unknown_typeflag_defaults_to_regular_file() {
  let decoder = HeaderDecoder::new();
  for typeflag in [b'A', b'D', b'M', b'V', b'x', b'g', b'Z', 0xff] {
    let block = entry("0000600", typeflag, "member");
    let header = RawHeader::new(HeaderBlock::from_block(&block));
    assert_eq!(decoder.get_mode(&header) & S_IFMT, S_IFREG);
  }
}

#[test]
fn test_existing_type_bits_are_kept() {
  // A symlink mode on a directory typeflag is left alone.
  let block = entry("0120777", b'5', "weird");
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  assert_eq!(HeaderDecoder::new().get_mode(&header), 0o120_777);
}

#[test]
fn test_unresolvable_owner_falls_back_to_uid() {
  let block = HeaderBuilder::ustar()
    .uname("nonexistent_user_xyz")
    .uid("0001750")
    .gname("nonexistent_group_xyz")
    .gid("0000144")
    .finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  let resolver = TableIdentityResolver::new()
    .with_user("root", 0)
    .with_group("wheel", 10);
  let decoder = HeaderDecoder::with_resolver(resolver);
  assert_eq!(decoder.get_owner_id(&header), 0o1750);
  assert_eq!(decoder.get_owner_id(&header), 1000);
  assert_eq!(decoder.get_group_id(&header), 0o144);
}

#[test]
fn test_resolvable_owner_wins_over_uid() {
  let block = HeaderBuilder::ustar()
    .uname("root")
    .uid("0001750")
    .gname("wheel")
    .gid("0000144")
    .finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  let resolver = TableIdentityResolver::new()
    .with_user("root", 0)
    .with_group("wheel", 10);
  let decoder = HeaderDecoder::with_resolver(resolver);
  assert_eq!(decoder.get_owner_id(&header), 0);
  assert_eq!(decoder.get_group_id(&header), 10);

  let numeric = decoder.with_options(DecoderOptions {
    resolve_names: false,
    ..DecoderOptions::default()
  });
  assert_eq!(numeric.get_owner_id(&header), 0o1750);
  assert_eq!(numeric.get_group_id(&header), 0o144);
}

#[test]
fn test_empty_owner_name_is_not_looked_up() {
  struct PanickingResolver;
  impl crate::IdentityResolver for PanickingResolver {
    fn lookup_user_by_name(&self, name: &str) -> Option<u32> {
      panic!("unexpected user lookup of {name:?}")
    }
    fn lookup_group_by_name(&self, name: &str) -> Option<u32> {
      panic!("unexpected group lookup of {name:?}")
    }
  }

  let block = HeaderBuilder::v7().uid("0000012").gid("0000034").finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  let decoder = HeaderDecoder::with_resolver(PanickingResolver);
  assert_eq!(decoder.get_owner_id(&header), 0o12);
  assert_eq!(decoder.get_group_id(&header), 0o34);
}

#[test]
fn test_prefix_and_name_are_joined() {
  let block = HeaderBuilder::ustar()
    .prefix("usr/local")
    .name("bin/tool")
    .finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  assert_eq!(HeaderDecoder::new().get_path(&header), "usr/local/bin/tool");
}

#[test]
fn test_long_name_overrides_prefix_and_name() {
  let block = HeaderBuilder::ustar()
    .prefix("ignored")
    .name("ignored")
    .finish();
  let long_name = b"this/is/a/very/long/path/name.txt";
  let header = RawHeader::new(HeaderBlock::from_block(&block)).with_gnu_longname(long_name);
  assert_eq!(
    HeaderDecoder::new().get_path(&header),
    "this/is/a/very/long/path/name.txt"
  );
}

#[test]
fn test_long_name_stops_at_nul_and_empty_is_absent() {
  let block = HeaderBuilder::gnu().name("short").finish();
  let decoder = HeaderDecoder::new();

  let header = RawHeader::new(HeaderBlock::from_block(&block)).with_gnu_longname(b"long/one\0");
  assert_eq!(decoder.get_path(&header), "long/one");

  let header = RawHeader::new(HeaderBlock::from_block(&block)).with_gnu_longname(b"");
  assert_eq!(decoder.get_path(&header), "short");
  let header = RawHeader::new(HeaderBlock::from_block(&block)).with_gnu_longname(b"\0");
  assert_eq!(decoder.get_path(&header), "short");
}

#[test]
fn test_fields_at_full_width_are_not_overrun() {
  let name = "n".repeat(100);
  let prefix = "p".repeat(155);
  let block = HeaderBuilder::ustar()
    .name(&name)
    .mode("0000644")
    .prefix(&prefix)
    .finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  let path = HeaderDecoder::new().get_path(&header);
  assert_eq!(path, alloc::format!("{prefix}/{name}"));
  assert_eq!(path.len(), 256);

  let block = HeaderBuilder::v7().name(&name).mode("0000644").finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  assert_eq!(HeaderDecoder::new().get_path(&header), name);
}

#[test]
fn test_long_name_beyond_path_limit_is_truncated() {
  let block = HeaderBuilder::gnu().name("short").finish();
  let long_name = vec![b'x'; 5000];
  let header = RawHeader::new(HeaderBlock::from_block(&block)).with_gnu_longname(&long_name);
  let path = HeaderDecoder::new().get_path(&header);
  assert_eq!(path.len(), crate::DEFAULT_MAX_PATH_LEN);
}

#[test]
fn test_truncation_respects_character_boundaries() {
  let block = HeaderBuilder::gnu().finish();
  // 'é' is two bytes, so a limit of 5 lands inside the third character.
  let long_name = "ééé".as_bytes();
  let header = RawHeader::new(HeaderBlock::from_block(&block)).with_gnu_longname(long_name);
  let decoder = HeaderDecoder::new().with_options(DecoderOptions {
    max_path_len: 5,
    ..DecoderOptions::default()
  });
  assert_eq!(decoder.get_path(&header), "éé");
}

#[test]
fn test_non_utf8_name_is_replaced() {
  let block = HeaderBuilder::ustar().name_bytes(b"caf\xe9").finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  assert_eq!(
    HeaderDecoder::new().get_path(&header),
    String::from("caf\u{fffd}")
  );
}

#[test]
fn test_path_bytes_keep_non_utf8_names_apart() {
  let decoder = HeaderDecoder::new();
  let first = HeaderBuilder::ustar().name_bytes(b"caf\xe9").finish();
  let first = RawHeader::new(HeaderBlock::from_block(&first));
  let second = HeaderBuilder::ustar().name_bytes(b"caf\xe8").finish();
  let second = RawHeader::new(HeaderBlock::from_block(&second));

  assert_eq!(decoder.get_path(&first), decoder.get_path(&second));
  assert_eq!(decoder.get_path_bytes(&first), b"caf\xe9");
  assert_eq!(decoder.get_path_bytes(&second), b"caf\xe8");
}

#[test]
fn test_accessors_are_idempotent() {
  let block = HeaderBuilder::ustar()
    .prefix("a")
    .name("b")
    .mode("0000700")
    .typeflag(b'5')
    .finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  let decoder = HeaderDecoder::new();
  assert_eq!(decoder.get_path(&header), decoder.get_path(&header));
  assert_eq!(decoder.get_mode(&header), decoder.get_mode(&header));
  assert_eq!(header.format(), HeaderFormat::Ustar);
}

#[test]
fn test_entry_kind() {
  let decoder = HeaderDecoder::new();
  for (typeflag, mode, kind) in [
    (b'0', "0000644", EntryKind::Regular),
    (b'1', "0000644", EntryKind::HardLink),
    (b'2', "0000777", EntryKind::SymbolicLink),
    (b'5', "0000755", EntryKind::Directory),
    (b'6', "0000644", EntryKind::Fifo),
    (b'L', "0000644", EntryKind::LongName),
    (b'K', "0000644", EntryKind::LongLink),
    // Unknown typeflags are classified by the mode's type bits.
    (b'Z', "0040755", EntryKind::Directory),
    (b'Z', "0000644", EntryKind::Other(crate::TarTypeFlag::UnknownTypeFlag(b'Z'))),
  ] {
    let block = entry(mode, typeflag, "member");
    let header = RawHeader::new(HeaderBlock::from_block(&block));
    assert_eq!(decoder.get_entry_kind(&header), kind, "typeflag {typeflag:#04x}");
  }
}

#[test]
fn test_numeric_accessors() {
  let block = HeaderBuilder::gnu()
    .size("00000001000")
    .mtime("14712345670")
    .dev_major("0000010")
    .dev_minor("0000003")
    .finish();
  let header = RawHeader::new(HeaderBlock::from_block(&block));
  let decoder = HeaderDecoder::new();
  assert_eq!(decoder.get_size(&header), 512);
  assert_eq!(decoder.get_mtime(&header), 0o14_712_345_670);
  assert_eq!(decoder.get_dev_major(&header), 8);
  assert_eq!(decoder.get_dev_minor(&header), 3);
}

mod properties {
  use alloc::{format, string::String, vec::Vec};

  use proptest::prelude::*;

  use super::HeaderBuilder;
  use crate::{HeaderBlock, HeaderDecoder, RawHeader};

  fn component_strategy(max_len: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[a-zA-Z0-9_.+/-]{{1,{max_len}}}"))
      .expect("valid regex")
  }

  fn field_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(1u8..=255, 0..=max_len)
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn long_name_wins_over_prefix_and_name(
      prefix in component_strategy(155),
      name in component_strategy(100),
      long_name in proptest::collection::vec(1u8..=255, 1..1024),
    ) {
      let block = HeaderBuilder::gnu().prefix(&prefix).name(&name).finish();
      let header = RawHeader::new(HeaderBlock::from_block(&block)).with_gnu_longname(&long_name);
      let decoder = HeaderDecoder::new();
      prop_assert_eq!(decoder.get_path_bytes(&header), long_name.clone());
      prop_assert_eq!(
        decoder.get_path(&header),
        String::from_utf8_lossy(&long_name).into_owned()
      );
    }

    #[test]
    fn prefix_and_name_are_joined_with_one_slash(
      prefix in component_strategy(155),
      name in component_strategy(100),
    ) {
      let block = HeaderBuilder::ustar().prefix(&prefix).name(&name).finish();
      let header = RawHeader::new(HeaderBlock::from_block(&block));
      prop_assert_eq!(HeaderDecoder::new().get_path(&header), format!("{prefix}/{name}"));
    }

    #[test]
    fn name_without_prefix_is_returned_verbatim(name in field_bytes(100)) {
      let block = HeaderBuilder::v7().name_bytes(&name).finish();
      let header = RawHeader::new(HeaderBlock::from_block(&block));
      prop_assert_eq!(HeaderDecoder::new().get_path_bytes(&header), name);
    }
  }
}
