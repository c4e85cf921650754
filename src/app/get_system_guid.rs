use crate::{
    codec,
    connection::{CompletionCode, NetFn, Request, Response, UnpackError},
    log_vec, Loggable,
};

use super::GET_SYSTEM_GUID;

/// The Get System GUID command.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GetSystemGuid;

impl Request for GetSystemGuid {
    fn netfn(&self) -> NetFn {
        NetFn::App
    }

    fn cmd(&self) -> u8 {
        GET_SYSTEM_GUID
    }

    fn pack(&self, _: &mut Vec<u8>) {}

    fn command_name(&self) -> &'static str {
        "Get System GUID"
    }
}

/// The system GUID.
///
/// The time fields are transmitted little endian, the clock sequence and
/// node bytes in display order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemGuid {
    completion_code: CompletionCode,
    guid: String,
}

impl SystemGuid {
    const OFFSET_TIME_LOW: usize = 1;
    const OFFSET_TIME_MID: usize = 5;
    const OFFSET_TIME_HIGH_AND_VER: usize = 7;
    const OFFSET_CLK_SEQ_AND_RESERVED: usize = 9;
    const OFFSET_NODE: usize = 11;
    const RESP_SIZE: usize = 17;

    /// The GUID in its canonical lowercase, dash separated form.
    pub fn guid(&self) -> &str {
        &self.guid
    }
}

impl Response for SystemGuid {
    fn netfn(&self) -> NetFn {
        NetFn::App
    }

    fn cmd(&self) -> u8 {
        GET_SYSTEM_GUID
    }

    fn command_name(&self) -> &'static str {
        "Get System GUID"
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
        let time_low = codec::get_u32_le(data, Self::OFFSET_TIME_LOW)?;
        let time_mid = codec::get_u16_le(data, Self::OFFSET_TIME_MID)?;
        let time_high = codec::get_u16_le(data, Self::OFFSET_TIME_HIGH_AND_VER)?;
        let [seq_high, seq_low] = codec::get_array::<2>(data, Self::OFFSET_CLK_SEQ_AND_RESERVED)?;
        let node = codec::get_u48_be(data, Self::OFFSET_NODE)?;

        self.guid = format!(
            "{time_low:08x}-{time_mid:04x}-{time_high:04x}-{seq_high:02x}{seq_low:02x}-{node:012x}"
        );

        Ok(())
    }
}

impl Loggable for SystemGuid {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        log_vec![(0, "System GUID"), (1, "GUID", &self.guid)]
    }
}

#[test]
fn guid_fields_are_mixed_endian() {
    let data = hex::decode("00332211006655887799aabbccddeeff01").unwrap();

    let mut response = SystemGuid::default();
    response.unpack(&data).unwrap();

    assert_eq!(response.guid(), "00112233-5566-7788-99aa-bbccddeeff01");
}

#[test]
fn short_guid_is_rejected() {
    let mut response = SystemGuid::default();

    assert_eq!(
        response.unpack(&[0x00; 16]),
        Err(UnpackError::TooShort {
            expected: 17,
            received: 16
        })
    );
}
