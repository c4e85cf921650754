//! IPMB frames, the request/response abstraction and the MUX transport.

mod completion_code;
pub use completion_code::{CompletionCode, CompletionErrorCode, ResponseUnavailableReason};

mod message;
pub use message::{
    ChecksumError, FrameError, IpmiMessage, IPMB_FRAME_HDR_LEN, IPMI_MAX_MSG_LENGTH,
    IPMI_MSG_DST_LUN_MASK, IPMI_MSG_SRC_LUN_MASK, MAX_DATA_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN,
    NETFN_RESPONSE_BIT,
};

#[cfg(test)]
pub(crate) mod mock;

pub mod mux;
pub use mux::{Connector, MuxConnection, MuxError, Role, TcpConnector, TcpMux};

mod netfn;
pub use netfn::NetFn;

mod request;
pub use request::Request;

mod response;
pub use response::{Response, UnpackError};

/// A 7-bit IPMB slave address, stored in its 8-bit (left-shifted) wire form.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(pub u8);

impl Address {
    /// The BMC's well-known slave address.
    pub const BMC: Self = Self(0x20);
}

impl From<Address> for u8 {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogicalUnit {
    #[default]
    Zero,
    One,
    Two,
    Three,
}

impl LogicalUnit {
    /// Construct a `LogicalUnit` from the two lowest bits of `value`,
    /// ignoring all other bits.
    pub fn from_low_bits(value: u8) -> Self {
        match value & IPMI_MSG_DST_LUN_MASK {
            0b00 => Self::Zero,
            0b01 => Self::One,
            0b10 => Self::Two,
            _ => Self::Three,
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            LogicalUnit::Zero => 0,
            LogicalUnit::One => 1,
            LogicalUnit::Two => 2,
            LogicalUnit::Three => 3,
        }
    }
}

impl TryFrom<u8> for LogicalUnit {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 0b11 {
            Ok(Self::from_low_bits(value))
        } else {
            Err(())
        }
    }
}

impl From<LogicalUnit> for u8 {
    fn from(value: LogicalUnit) -> Self {
        value.value()
    }
}

#[test]
fn lun_from_low_bits() {
    assert_eq!(LogicalUnit::from_low_bits(0xFE), LogicalUnit::Two);
    assert_eq!(LogicalUnit::try_from(3), Ok(LogicalUnit::Three));
    assert_eq!(LogicalUnit::try_from(4), Err(()));
}
