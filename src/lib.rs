#![no_std]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

mod decode_errors;
mod decode_violations;
mod decoder_options;
mod file_mode;
mod header_decoder;
mod identity;
mod octal;
pub mod tar_constants;

pub use decode_errors::*;
pub use decode_violations::*;
pub use decoder_options::*;
pub use file_mode::*;
pub use header_decoder::*;
pub use identity::*;
pub use octal::*;
pub use tar_constants::{HeaderBlock, HeaderFormat, TarTypeFlag, BLOCK_SIZE};

#[cfg(test)]
mod decoder_test;
