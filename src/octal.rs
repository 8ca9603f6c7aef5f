use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOctalError {
  #[error("Field contains no octal digits")]
  NoDigits,
  #[error("Unexpected byte {byte:#04x} at offset {position} of octal field")]
  InvalidByte { byte: u8, position: usize },
  #[error("Octal number does not fit in 64 bits")]
  Overflow,
}

fn is_octal_digit(byte: u8) -> bool {
  matches!(byte, b'0'..=b'7')
}

fn is_terminator(byte: u8) -> bool {
  byte == b' ' || byte == b'\0'
}

/// Offset of the first byte that is not a leading space.
fn digits_start(bytes: &[u8]) -> usize {
  bytes
    .iter()
    .position(|&b| b != b' ')
    .unwrap_or(bytes.len())
}

/// Decodes a space/NUL padded octal field the way historic tar readers do.
///
/// Leading spaces are skipped, then digits are read until the first
/// non-octal byte. A field without digits decodes to 0. Never fails; values
/// wider than the field allows wrap silently.
#[must_use]
pub fn decode_octal(bytes: &[u8]) -> u64 {
  bytes[digits_start(bytes)..]
    .iter()
    .take_while(|&&b| is_octal_digit(b))
    .fold(0u64, |value, &digit| {
      value.wrapping_mul(8).wrapping_add(u64::from(digit - b'0'))
    })
}

/// Strict counterpart of [`decode_octal`].
///
/// Requires at least one digit, and only spaces or NULs after the digits.
pub fn decode_octal_strict(bytes: &[u8]) -> Result<u64, ParseOctalError> {
  let start = digits_start(bytes);
  let digit_count = bytes[start..]
    .iter()
    .take_while(|&&b| is_octal_digit(b))
    .count();
  if digit_count == 0 {
    return Err(ParseOctalError::NoDigits);
  }

  let digits_end = start + digit_count;
  if let Some(offset) = bytes[digits_end..].iter().position(|&b| !is_terminator(b)) {
    let position = digits_end + offset;
    return Err(ParseOctalError::InvalidByte {
      byte: bytes[position],
      position,
    });
  }

  bytes[start..digits_end].iter().try_fold(0u64, |value, &digit| {
    value
      .checked_mul(8)
      .and_then(|value| value.checked_add(u64::from(digit - b'0')))
      .ok_or(ParseOctalError::Overflow)
  })
}
