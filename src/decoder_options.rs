/// `PATH_MAX` on Linux, minus the terminating NUL.
pub const DEFAULT_MAX_PATH_LEN: usize = 4095;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
  /// The maximum length in bytes of a decoded path or link target.
  ///
  /// Longer values are truncated at a character boundary. Strict decoding
  /// reports them as [`crate::HeaderDecodeError::PathTooLong`] first.
  pub max_path_len: usize,
  /// Resolve `uname`/`gname` through the identity resolver before falling
  /// back to the numeric `uid`/`gid` fields.
  ///
  /// Disabling this is the equivalent of `tar --numeric-owner`.
  pub resolve_names: bool,
}

impl Default for DecoderOptions {
  fn default() -> Self {
    Self {
      max_path_len: DEFAULT_MAX_PATH_LEN,
      resolve_names: true,
    }
  }
}
