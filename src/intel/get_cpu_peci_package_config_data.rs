use crate::{
    codec,
    connection::{CompletionCode, NetFn, Request, Response, UnpackError},
    log_vec, Loggable,
};

use super::GET_CPU_PECI_PACKAGE_CONFIG_DATA;

/// Read a package configuration space word of a CPU over PECI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GetCpuPeciPackageConfigData {
    pub cpu: u8,
    pub pcs_index: u8,
    pub parameter: u16,
    /// Number of bytes to read, at most 4.
    pub read_length: u8,
}

impl GetCpuPeciPackageConfigData {
    pub fn new(cpu: u8, pcs_index: u8, parameter: u16, read_length: u8) -> Self {
        Self {
            cpu,
            pcs_index,
            parameter,
            read_length: read_length.min(PeciPackageConfigData::MAX_DATA_LEN as u8),
        }
    }
}

impl Request for GetCpuPeciPackageConfigData {
    fn netfn(&self) -> NetFn {
        NetFn::Intel
    }

    fn cmd(&self) -> u8 {
        GET_CPU_PECI_PACKAGE_CONFIG_DATA
    }

    fn pack(&self, out: &mut Vec<u8>) {
        out.push(self.cpu);
        out.push(self.pcs_index);
        out.extend_from_slice(&self.parameter.to_le_bytes());
        out.push(self.read_length);
    }

    fn command_name(&self) -> &'static str {
        "Get CPU PECI Package Config Data"
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeciPackageConfigData {
    completion_code: CompletionCode,
    /// Completion code of the PECI transaction itself.
    pub peci_completion_code: u8,
    /// Bytes read from the package configuration space, as received.
    pub data: Vec<u8>,
}

impl PeciPackageConfigData {
    const OFFSET_PECI_CC: usize = 1;
    const OFFSET_DATA: usize = 2;
    const MIN_RESP_SIZE: usize = 3;
    const MAX_DATA_LEN: usize = 4;

    pub const PECI_SUCCESS: u8 = 0x40;

    pub fn peci_success(&self) -> bool {
        self.peci_completion_code == Self::PECI_SUCCESS
    }

    /// The received bytes as a little endian integer.
    ///
    /// `None` unless exactly `read_length` bytes arrived.
    pub fn value(&self, read_length: u8) -> Option<u32> {
        if self.data.len() != usize::from(read_length) {
            return None;
        }

        let mut bytes = [0u8; 4];
        bytes[..self.data.len()].copy_from_slice(&self.data);
        Some(u32::from_le_bytes(bytes))
    }
}

impl Response for PeciPackageConfigData {
    fn netfn(&self) -> NetFn {
        NetFn::Intel
    }

    fn cmd(&self) -> u8 {
        GET_CPU_PECI_PACKAGE_CONFIG_DATA
    }

    fn command_name(&self) -> &'static str {
        "Get CPU PECI Package Config Data"
    }

    fn min_len(&self) -> usize {
        Self::MIN_RESP_SIZE
    }

    fn completion_code(&self) -> CompletionCode {
        self.completion_code
    }

    fn set_completion_code(&mut self, completion_code: CompletionCode) {
        self.completion_code = completion_code;
    }

    fn unpack_fields(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        self.peci_completion_code = codec::get_u8(data, Self::OFFSET_PECI_CC)?;

        let payload = &data[Self::OFFSET_DATA..];
        if payload.len() > Self::MAX_DATA_LEN {
            return Err(UnpackError::Invalid("more than 4 bytes of PECI data"));
        }

        self.data = payload.to_vec();

        Ok(())
    }
}

impl Loggable for PeciPackageConfigData {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![
            (0, "PECI package config data"),
            (1, "PECI completion", format!("0x{:02X}", self.peci_completion_code)),
            (1, "Data", format!("{:02X?}", self.data))
        ]
    }
}

#[test]
fn packs_parameter_little_endian() {
    let mut data = Vec::new();
    GetCpuPeciPackageConfigData::new(1, 0x10, 0x0203, 9).pack(&mut data);

    assert_eq!(data, [0x01, 0x10, 0x03, 0x02, 0x04]);
}

#[test]
fn parse_partial_word() {
    let mut response = PeciPackageConfigData::default();
    response.unpack(&[0x00, 0x40, 0x34, 0x12]).unwrap();

    assert!(response.peci_success());
    assert_eq!(response.data, [0x34, 0x12]);
    assert_eq!(response.value(2), Some(0x1234));
}

#[test]
fn short_read_is_not_padded() {
    let request = GetCpuPeciPackageConfigData::new(0, 0x10, 0x0001, 4);

    let mut response = PeciPackageConfigData::default();
    response.unpack(&[0x00, 0x40, 0x78, 0x56]).unwrap();

    assert_eq!(response.data, [0x78, 0x56]);
    assert_eq!(response.value(request.read_length), None);

    let mut response = PeciPackageConfigData::default();
    assert!(response.unpack(&[0x00, 0x40, 1, 2, 3, 4, 5]).is_err());
}
