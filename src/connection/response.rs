use crate::{codec, fmt::Loggable};

use super::{CompletionCode, NetFn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnpackError {
    /// The payload is shorter than the command's minimum response size.
    TooShort { expected: usize, received: usize },
    /// The payload has the right size but its content can not be decoded.
    Invalid(&'static str),
}

impl From<codec::OutOfBounds> for UnpackError {
    fn from(value: codec::OutOfBounds) -> Self {
        Self::TooShort {
            expected: value.offset + value.width,
            received: value.len,
        }
    }
}

/// The response half of an IPMI command.
///
/// Byte 0 of every response payload is the completion code. [`Response::unpack`]
/// records it and only decodes the command-specific fields (through
/// [`Response::unpack_fields`]) when it signals success, so a failed command never
/// exposes stale or partially decoded data.
pub trait Response: Loggable + Send {
    /// The request NetFn of the command this response belongs to.
    fn netfn(&self) -> NetFn;

    fn cmd(&self) -> u8;

    fn command_name(&self) -> &'static str;

    /// Minimum size of a successful response payload, completion code included.
    fn min_len(&self) -> usize;

    fn completion_code(&self) -> CompletionCode;

    fn set_completion_code(&mut self, completion_code: CompletionCode);

    /// Decode the command-specific fields of a successful response.
    ///
    /// `data` still includes the completion code at offset 0 and is at least
    /// [`Response::min_len`] bytes long.
    fn unpack_fields(&mut self, data: &[u8]) -> Result<(), UnpackError>;

    fn unpack(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        let completion_code = CompletionCode::from(codec::get_u8(data, 0)?);
        self.set_completion_code(completion_code);

        if !completion_code.is_success() {
            return Ok(());
        }

        if data.len() < self.min_len() {
            return Err(UnpackError::TooShort {
                expected: self.min_len(),
                received: data.len(),
            });
        }

        self.unpack_fields(data)
    }
}
