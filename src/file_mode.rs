use crate::tar_constants::mode_bits::{
  S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG, S_IFSOCK,
};

/// The file type encoded in the `S_IFMT` bits of a mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
  Regular,
  Directory,
  SymbolicLink,
  CharacterDevice,
  BlockDevice,
  Fifo,
  Socket,
  /// No type bits set.
  Untyped,
  /// Type bits that match no POSIX file type.
  Unknown(u32),
}

impl FileType {
  #[must_use]
  pub fn from_mode(mode: u32) -> Self {
    match mode & S_IFMT {
      0 => FileType::Untyped,
      S_IFREG => FileType::Regular,
      S_IFDIR => FileType::Directory,
      S_IFLNK => FileType::SymbolicLink,
      S_IFCHR => FileType::CharacterDevice,
      S_IFBLK => FileType::BlockDevice,
      S_IFIFO => FileType::Fifo,
      S_IFSOCK => FileType::Socket,
      other => FileType::Unknown(other),
    }
  }
}

/// Represents permissions for a single user class (owner, group, or other)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Permission {
  pub read: bool,
  pub write: bool,
  pub execute: bool,
}

impl Permission {
  /// `bits` holds the class's `rwx` triple in its lowest three bits.
  fn from_triple(bits: u32) -> Self {
    Permission {
      read: bits & 0o4 != 0,
      write: bits & 0o2 != 0,
      execute: bits & 0o1 != 0,
    }
  }

  fn to_triple(self) -> u32 {
    (u32::from(self.read) << 2) | (u32::from(self.write) << 1) | u32::from(self.execute)
  }
}

/// Represents file permissions split into owner, group, and other
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilePermissions {
  pub owner: Permission,
  pub group: Permission,
  pub other: Permission,
  pub set_uid: bool,
  pub set_gid: bool,
  pub sticky: bool,
}

impl FilePermissions {
  #[must_use]
  pub fn from_mode(mode: u32) -> Self {
    FilePermissions {
      owner: Permission::from_triple(mode >> 6),
      group: Permission::from_triple(mode >> 3),
      other: Permission::from_triple(mode),
      set_uid: mode & 0o4000 != 0,
      set_gid: mode & 0o2000 != 0,
      sticky: mode & 0o1000 != 0,
    }
  }

  /// The permission and special bits (`0o7777` at most).
  #[must_use]
  pub fn to_bits(&self) -> u32 {
    (self.owner.to_triple() << 6)
      | (self.group.to_triple() << 3)
      | self.other.to_triple()
      | (u32::from(self.set_uid) << 11)
      | (u32::from(self.set_gid) << 10)
      | (u32::from(self.sticky) << 9)
  }
}

/// A decoded `st_mode` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileMode {
  /// The full mode, type bits included.
  pub bits: u32,
  pub file_type: FileType,
  pub permissions: FilePermissions,
}

impl FileMode {
  #[must_use]
  pub fn from_bits(bits: u32) -> Self {
    FileMode {
      bits,
      file_type: FileType::from_mode(bits),
      permissions: FilePermissions::from_mode(bits),
    }
  }

  #[must_use]
  pub fn is_dir(&self) -> bool {
    self.file_type == FileType::Directory
  }
}

impl From<u32> for FileMode {
  fn from(bits: u32) -> Self {
    FileMode::from_bits(bits)
  }
}
