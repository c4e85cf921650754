use crate::{
    codec,
    connection::{CompletionCode, NetFn, Request, Response, UnpackError},
    log_vec, Loggable,
};

use super::GET_DIMM_INFO;

/// Read the SPD summary of one DIMM slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GetDimmInfo {
    pub dimm_index: u8,
}

impl GetDimmInfo {
    pub fn new(dimm_index: u8) -> Self {
        Self { dimm_index }
    }
}

impl Request for GetDimmInfo {
    fn netfn(&self) -> NetFn {
        NetFn::Intel
    }

    fn cmd(&self) -> u8 {
        GET_DIMM_INFO
    }

    fn pack(&self, out: &mut Vec<u8>) {
        out.push(self.dimm_index);
    }

    fn command_name(&self) -> &'static str {
        "Get DIMM Info"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DimmType {
    Ddr3,
    Ddr4,
    #[default]
    Unknown,
}

impl From<u8> for DimmType {
    fn from(value: u8) -> Self {
        match value {
            0x18 => Self::Ddr3,
            0x1A => Self::Ddr4,
            _ => Self::Unknown,
        }
    }
}

impl core::fmt::Display for DimmType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DimmType::Ddr3 => write!(f, "DDR3"),
            DimmType::Ddr4 => write!(f, "DDR4"),
            DimmType::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DimmInfo {
    completion_code: CompletionCode,
    pub dimm_type: DimmType,
    pub voltage_mv: u16,
    pub speed_mhz: u16,
    pub size_mib: u32,
    pub present: bool,
}

impl DimmInfo {
    const OFFSET_TYPE: usize = 1;
    const OFFSET_VOLTAGE: usize = 2;
    const OFFSET_SPEED: usize = 4;
    const OFFSET_SIZE: usize = 6;
    const OFFSET_PRESENCE: usize = 10;
    const RESP_SIZE: usize = 11;
}

impl Response for DimmInfo {
    fn netfn(&self) -> NetFn {
        NetFn::Intel
    }

    fn cmd(&self) -> u8 {
        GET_DIMM_INFO
    }

    fn command_name(&self) -> &'static str {
        "Get DIMM Info"
    }

    fn min_len(&self) -> usize {
        Self::RESP_SIZE
    }

    fn completion_code(&self) -> CompletionCode {
        self.completion_code
    }

    fn set_completion_code(&mut self, completion_code: CompletionCode) {
        self.completion_code = completion_code;
    }

    fn unpack_fields(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        self.dimm_type = DimmType::from(codec::get_u8(data, Self::OFFSET_TYPE)?);
        self.voltage_mv = codec::get_u16_le(data, Self::OFFSET_VOLTAGE)?;
        self.speed_mhz = codec::get_u16_le(data, Self::OFFSET_SPEED)?;
        self.size_mib = codec::get_u32_le(data, Self::OFFSET_SIZE)?;
        self.present = codec::get_u8(data, Self::OFFSET_PRESENCE)? & 0x01 == 0x01;
        Ok(())
    }
}

impl Loggable for DimmInfo {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        if !self.present {
            return log_vec![(0, "DIMM information"), (1, "Present", false)];
        }

        log_vec![
            (0, "DIMM information"),
            (1, "Present", true),
            (1, "Type", self.dimm_type),
            (1, "Voltage (mV)", self.voltage_mv),
            (1, "Speed (MHz)", self.speed_mhz),
            (1, "Size (MiB)", self.size_mib)
        ]
    }
}

#[test]
fn parse_dimm_info() {
    let data = hex::decode("001ab00460090040000001").unwrap();

    let mut response = DimmInfo::default();
    response.unpack(&data).unwrap();

    assert_eq!(response.dimm_type, DimmType::Ddr4);
    assert_eq!(response.voltage_mv, 1200);
    assert_eq!(response.speed_mhz, 2400);
    assert_eq!(response.size_mib, 16384);
    assert!(response.present);
}

#[test]
fn short_dimm_info() {
    let mut response = DimmInfo::default();

    assert_eq!(
        response.unpack(&[0x00, 0x1a, 0xb0]),
        Err(UnpackError::TooShort {
            expected: 11,
            received: 3
        })
    );
}
