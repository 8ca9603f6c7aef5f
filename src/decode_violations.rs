use alloc::vec::Vec;

use log::debug;

use crate::HeaderDecodeError;

pub trait DecodeViolationHandler {
  /// When a malformed field is found, this method is called.
  /// It should return `true` if decoding should continue with the lenient value of the field,
  /// the same value the plain accessors of [`crate::HeaderDecoder`] produce.
  #[must_use]
  fn handle(&mut self, error: &HeaderDecodeError) -> bool;
}

impl<VH: DecodeViolationHandler + ?Sized> DecodeViolationHandler for &mut VH {
  fn handle(&mut self, error: &HeaderDecodeError) -> bool {
    (**self).handle(error)
  }
}

#[derive(Debug, Default)]
pub struct StrictViolationHandler;

impl DecodeViolationHandler for StrictViolationHandler {
  fn handle(&mut self, _error: &HeaderDecodeError) -> bool {
    false
  }
}

#[derive(Debug, Default)]
pub struct AuditViolationHandler {
  pub violations: Vec<HeaderDecodeError>,
}

impl AuditViolationHandler {
  #[must_use]
  pub fn new() -> Self {
    Self {
      violations: Vec::new(),
    }
  }
}

impl DecodeViolationHandler for AuditViolationHandler {
  fn handle(&mut self, error: &HeaderDecodeError) -> bool {
    self.violations.push(error.clone());
    true
  }
}

#[derive(Debug, Default)]
pub struct IgnoreViolationHandler;

impl DecodeViolationHandler for IgnoreViolationHandler {
  fn handle(&mut self, _error: &HeaderDecodeError) -> bool {
    true
  }
}

/// A wrapper around a `DecodeViolationHandler` that provides convenience methods for handling violations.
pub(crate) struct VHW<'a, VH: DecodeViolationHandler>(pub(crate) &'a mut VH);

impl<VH: DecodeViolationHandler> VHW<'_, VH> {
  /// Handles a potential violation in result form by calling the violation handler.
  ///
  /// `Ok(None)` means the handler accepted the violation.
  pub(crate) fn hpvr<T, E: Into<HeaderDecodeError>>(
    &mut self,
    operation_result: Result<T, E>,
  ) -> Result<Option<T>, HeaderDecodeError> {
    match operation_result {
      Ok(v) => Ok(Some(v)),
      Err(e) => self.hpve(e).map(|()| None),
    }
  }

  /// Handles a potential violation in error form by calling the violation handler.
  pub(crate) fn hpve<E: Into<HeaderDecodeError>>(&mut self, error: E) -> Result<(), HeaderDecodeError> {
    let e = error.into();
    if self.0.handle(&e) {
      debug!("Continuing past header violation: {e}");
      Ok(())
    } else {
      Err(e)
    }
  }
}
