//! PMBus commands forwarded to a power supply unit by the rack management
//! controller.
//!
//! Every request is `[psu_id, operation, pmbus_command, fields...]` and every
//! response shares the same NetFn and command, so the responses are not
//! registered in the [`Dispatcher`](crate::Dispatcher); decode them through
//! [`ManagementController::send`](crate::ManagementController::send).

use crate::{
    codec,
    connection::{CompletionCode, NetFn, Request, Response, UnpackError},
    log_vec, Loggable,
};

use super::SEND_PSU_COMMAND;

const COMMAND_NAME: &str = "Send PSU Command";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationCode {
    ReadByte,
    ReadWord,
    ReadBlock,
    WriteByte,
    WriteWord,
    WriteBlock,
}

impl From<OperationCode> for u8 {
    fn from(value: OperationCode) -> Self {
        match value {
            OperationCode::ReadByte => 0,
            OperationCode::ReadWord => 1,
            OperationCode::ReadBlock => 2,
            OperationCode::WriteByte => 3,
            OperationCode::WriteWord => 4,
            OperationCode::WriteBlock => 5,
        }
    }
}

/// PMBus command codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PmbusCommand {
    Operation,
    ClearFaults,
    StatusWord,
    ReadPout,
    MfrId,
    MfrModel,
    MfrRevision,
    MfrSerial,
    MfrPoutMax,
}

impl From<PmbusCommand> for u8 {
    fn from(value: PmbusCommand) -> Self {
        match value {
            PmbusCommand::Operation => 0x01,
            PmbusCommand::ClearFaults => 0x03,
            PmbusCommand::StatusWord => 0x79,
            PmbusCommand::ReadPout => 0x96,
            PmbusCommand::MfrId => 0x99,
            PmbusCommand::MfrModel => 0x9A,
            PmbusCommand::MfrRevision => 0x9B,
            PmbusCommand::MfrSerial => 0x9E,
            PmbusCommand::MfrPoutMax => 0xA7,
        }
    }
}

/// Target state of the PMBus `OPERATION` command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    ImmediateOff,
    On,
}

impl OperationState {
    const ON: u8 = 0x80;
}

impl From<OperationState> for u8 {
    fn from(value: OperationState) -> Self {
        match value {
            OperationState::ImmediateOff => 0x00,
            OperationState::On => OperationState::ON,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SendPsuCommand {
    pub psu_id: u8,
    pub operation: OperationCode,
    pub command: PmbusCommand,
    fields: Vec<u8>,
}

impl SendPsuCommand {
    pub fn new(psu_id: u8, operation: OperationCode, command: PmbusCommand) -> Self {
        Self {
            psu_id,
            operation,
            command,
            fields: Vec::new(),
        }
    }

    /// Write `value` with a leading length byte.
    fn with_byte(mut self, value: u8) -> Self {
        self.fields = vec![1, value];
        self
    }

    pub fn read_status_word(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadWord, PmbusCommand::StatusWord)
    }

    pub fn read_power_output(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadWord, PmbusCommand::ReadPout)
    }

    pub fn read_power_capacity(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadWord, PmbusCommand::MfrPoutMax)
    }

    pub fn read_serial(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadBlock, PmbusCommand::MfrSerial)
    }

    pub fn read_model(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadBlock, PmbusCommand::MfrModel)
    }

    pub fn read_manufacturer(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadBlock, PmbusCommand::MfrId)
    }

    pub fn read_revision(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadBlock, PmbusCommand::MfrRevision)
    }

    pub fn read_operation(psu_id: u8) -> Self {
        Self::new(psu_id, OperationCode::ReadByte, PmbusCommand::Operation)
    }

    pub fn write_operation(psu_id: u8, state: OperationState) -> Self {
        Self::new(psu_id, OperationCode::WriteByte, PmbusCommand::Operation).with_byte(state.into())
    }

    pub fn clear_faults(psu_id: u8) -> Self {
        let mut me = Self::new(psu_id, OperationCode::WriteByte, PmbusCommand::ClearFaults);
        me.fields = vec![0];
        me
    }
}

impl Request for SendPsuCommand {
    fn netfn(&self) -> NetFn {
        NetFn::Intel
    }

    fn cmd(&self) -> u8 {
        SEND_PSU_COMMAND
    }

    fn pack(&self, out: &mut Vec<u8>) {
        out.push(self.psu_id);
        out.push(self.operation.into());
        out.push(self.command.into());
        out.extend_from_slice(&self.fields);
    }

    fn command_name(&self) -> &'static str {
        COMMAND_NAME
    }
}

/// Decode a PMBus LINEAR11 value: an 11 bit signed mantissa in bits 10:0
/// scaled by 2 to the power of the 5 bit signed exponent in bits 15:11.
pub fn linear11_to_f64(raw: u16) -> f64 {
    let exponent = (raw as i16) >> 11;
    let mantissa = ((raw << 5) as i16) >> 5;

    f64::from(mantissa) * 2f64.powi(i32::from(exponent))
}

/// Declare a PSU response type. Its fields are decoded by an inherent
/// `parse` method.
macro_rules! psu_response {
    ($(#[$meta:meta])* $name:ident, $min_len:expr, { $($field:ident: $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct $name {
            completion_code: CompletionCode,
            $($field: $ty,)*
        }

        impl Response for $name {
            fn netfn(&self) -> NetFn {
                NetFn::Intel
            }

            fn cmd(&self) -> u8 {
                SEND_PSU_COMMAND
            }

            fn command_name(&self) -> &'static str {
                COMMAND_NAME
            }

            fn min_len(&self) -> usize {
                $min_len
            }

            fn completion_code(&self) -> CompletionCode {
                self.completion_code
            }

            fn set_completion_code(&mut self, completion_code: CompletionCode) {
                self.completion_code = completion_code;
            }

            fn unpack_fields(&mut self, data: &[u8]) -> Result<(), UnpackError> {
                self.parse(data)
            }
        }
    };
}

bitflags::bitflags! {
    /// The PMBus `STATUS_WORD`.
    pub struct StatusWord: u16 {
        const VOUT = 1 << 15;
        const IOUT_POUT = 1 << 14;
        const INPUT = 1 << 13;
        const MFR_SPECIFIC = 1 << 12;
        const POWER_GOOD_NEGATED = 1 << 11;
        const FANS = 1 << 10;
        const OTHER = 1 << 9;
        const UNKNOWN = 1 << 8;
        const BUSY = 1 << 7;
        const OFF = 1 << 6;
        const VOUT_OV_FAULT = 1 << 5;
        const IOUT_OC_FAULT = 1 << 4;
        const VIN_UV_FAULT = 1 << 3;
        const TEMPERATURE = 1 << 2;
        const CML = 1 << 1;
        const NONE_OF_THE_ABOVE = 1 << 0;
    }
}

psu_response!(PsuStatusWord, 3, {
    status_word: u16,
    warnings_present: bool,
});

impl PsuStatusWord {
    const HIGH_BYTE_WARNING_MASK: u8 = 0xBF;
    const LOW_BYTE_WARNING_MASK: u8 = 0xFF;

    pub fn status_word(&self) -> u16 {
        self.status_word
    }

    pub fn flags(&self) -> StatusWord {
        StatusWord::from_bits_truncate(self.status_word)
    }

    /// Any status bit other than `IOUT_POUT` is set.
    pub fn warnings_present(&self) -> bool {
        self.warnings_present
    }

    fn parse(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        let [high, low] = codec::get_array::<2>(data, 1)?;

        self.status_word = u16::from_be_bytes([high, low]);
        self.warnings_present = (high & Self::HIGH_BYTE_WARNING_MASK) != 0
            || (low & Self::LOW_BYTE_WARNING_MASK) != 0;

        Ok(())
    }
}

impl Loggable for PsuStatusWord {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![
            (0, "PSU status word"),
            (1, "Status word", format!("0x{:04X}", self.status_word)),
            (1, "Flags", format!("{:?}", self.flags())),
            (1, "Warnings", self.warnings_present)
        ]
    }
}

psu_response!(
    /// `READ_POUT` or `MFR_POUT_MAX`, in watts.
    PsuPower, 3, { raw: u16 }
);

impl PsuPower {
    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn watts(&self) -> f64 {
        linear11_to_f64(self.raw)
    }

    fn parse(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        self.raw = codec::get_u16_le(data, 1)?;
        Ok(())
    }
}

impl Loggable for PsuPower {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![(0, "PSU power"), (1, "Watts", format!("{:.2}", self.watts()))]
    }
}

psu_response!(
    /// A manufacturer string: serial number, model, manufacturer or revision.
    PsuString, 1, { value: String }
);

impl PsuString {
    pub fn value(&self) -> &str {
        &self.value
    }

    fn parse(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        self.value = String::from_utf8_lossy(&data[1..])
            .trim_end_matches('\0')
            .to_string();
        Ok(())
    }
}

impl Loggable for PsuString {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![(0, "PSU string"), (1, "Value", &self.value)]
    }
}

psu_response!(
    /// The PMBus `OPERATION` byte.
    PsuOperation, 2, { operation: u8 }
);

impl PsuOperation {
    pub fn operation(&self) -> u8 {
        self.operation
    }

    pub fn is_enabled(&self) -> bool {
        self.operation == OperationState::ON
    }

    fn parse(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        self.operation = codec::get_u8(data, 1)?;
        Ok(())
    }
}

impl Loggable for PsuOperation {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![
            (0, "PSU operation"),
            (1, "Operation", format!("0x{:02X}", self.operation)),
            (1, "Enabled", self.is_enabled())
        ]
    }
}

psu_response!(
    /// The reply to a write: only a completion code.
    PsuAck, 1, {}
);

impl PsuAck {
    fn parse(&mut self, _: &[u8]) -> Result<(), UnpackError> {
        Ok(())
    }
}

impl Loggable for PsuAck {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![(0, "PSU command"), (1, "Completion code", self.completion_code)]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_operation_layout() {
        let mut data = Vec::new();
        SendPsuCommand::write_operation(2, OperationState::On).pack(&mut data);

        assert_eq!(data, [0x02, 0x03, 0x01, 0x01, 0x80]);
    }

    #[test]
    fn read_requests_have_no_fields() {
        let mut data = Vec::new();
        SendPsuCommand::read_serial(1).pack(&mut data);

        assert_eq!(data, [0x01, 0x02, 0x9E]);
    }

    #[test]
    fn status_word_is_big_endian() {
        let mut response = PsuStatusWord::default();
        response.unpack(&[0x00, 0x08, 0x00]).unwrap();

        assert_eq!(response.status_word(), 0x0800);
        assert!(response.flags().contains(StatusWord::POWER_GOOD_NEGATED));
        assert!(response.warnings_present());

        let mut response = PsuStatusWord::default();
        response.unpack(&[0x00, 0x40, 0x00]).unwrap();
        assert!(!response.warnings_present());
    }

    #[test]
    fn linear11() {
        // Exponent -2, mantissa 1000.
        assert_eq!(linear11_to_f64(0xF3E8), 250.0);
        // Exponent 0, mantissa -1.
        assert_eq!(linear11_to_f64(0x07FF), -1.0);

        let mut response = PsuPower::default();
        response.unpack(&[0x00, 0xE8, 0xF3]).unwrap();
        assert_eq!(response.watts(), 250.0);
    }

    #[test]
    fn strings_and_operation() {
        let mut response = PsuString::default();
        response.unpack(b"\x00SN1234\x00").unwrap();
        assert_eq!(response.value(), "SN1234");

        let mut response = PsuOperation::default();
        response.unpack(&[0x00, 0x80]).unwrap();
        assert!(response.is_enabled());

        let mut response = PsuAck::default();
        response.unpack(&[0xD5]).unwrap();
        assert!(!response.completion_code().is_success());
    }
}
