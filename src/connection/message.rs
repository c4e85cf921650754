use crate::{
    checksum::{ipmi_checksum, Checksum},
    codec,
    fmt::{LogItem, Loggable},
    log_vec,
};

use super::{CompletionCode, LogicalUnit, NetFn};

/// Largest message (header and payload, without the trailing checksum) accepted on the bus.
pub const IPMI_MAX_MSG_LENGTH: usize = 272;
/// Bytes preceding the payload: `dest, netfn|lun, checksum, src, seq|lun, cmd`.
pub const IPMB_FRAME_HDR_LEN: usize = 6;
pub const IPMI_MSG_DST_LUN_MASK: u8 = 0x03;
pub const IPMI_MSG_SRC_LUN_MASK: u8 = 0x03;
/// Set in the `netfn | lun` byte of a response, relative to its request.
pub const NETFN_RESPONSE_BIT: u8 = 0x04;

/// Largest payload that fits a frame.
pub const MAX_DATA_LEN: usize = IPMI_MAX_MSG_LENGTH - IPMB_FRAME_HDR_LEN;
/// A frame with an empty payload: header plus the data checksum.
pub const MIN_FRAME_LEN: usize = IPMB_FRAME_HDR_LEN + 1;
/// A frame carrying [`MAX_DATA_LEN`] bytes of payload.
pub const MAX_FRAME_LEN: usize = IPMB_FRAME_HDR_LEN + MAX_DATA_LEN + 1;

const OFFSET_DEST_ADDR: usize = 0;
const OFFSET_NETFN_LUN: usize = 1;
const OFFSET_HEADER_CHECKSUM: usize = 2;
const OFFSET_SRC_ADDR: usize = 3;
const OFFSET_SEQ_LUN: usize = 4;
const OFFSET_CMD: usize = 5;
const OFFSET_DATA: usize = IPMB_FRAME_HDR_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than a header and both checksums.
    TooShort { len: usize },
    /// More payload than [`MAX_DATA_LEN`].
    TooLong { len: usize },
}

impl From<codec::OutOfBounds> for FrameError {
    fn from(value: codec::OutOfBounds) -> Self {
        Self::TooShort { len: value.len }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumError {
    Header { expected: u8, received: u8 },
    Data { expected: u8, received: u8 },
}

/// One IPMB frame.
///
/// Frames are laid out as follows:
///
/// ```text
/// 0      dest_addr
/// 1      netfn (6 bits) | dest_lun (2 bits)
/// 2      header checksum over bytes 0..2
/// 3      src_addr
/// 4      seq (6 bits) | src_lun (2 bits)
/// 5      command
/// 6..n-1 data (data[0] is the completion code of a response)
/// n-1    data checksum over bytes 3..n-1
/// ```
///
/// The checksums are stored as received so that a garbled frame can be
/// reported as-is; [`IpmiMessage::verify_checksums`] recomputes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpmiMessage {
    dest_addr: u8,
    netfn: u8,
    dest_lun: LogicalUnit,
    header_checksum: u8,
    src_addr: u8,
    seq: u8,
    src_lun: LogicalUnit,
    cmd: u8,
    data: Vec<u8>,
    data_checksum: u8,
}

impl IpmiMessage {
    /// Build a frame from raw field values, computing both checksums.
    ///
    /// `netfn` and `seq` are truncated to 6 bits.
    #[allow(clippy::too_many_arguments)]
    pub fn new_raw(
        dest_addr: u8,
        netfn: u8,
        dest_lun: LogicalUnit,
        src_addr: u8,
        seq: u8,
        src_lun: LogicalUnit,
        cmd: u8,
        data: Vec<u8>,
    ) -> Self {
        let mut me = Self {
            dest_addr,
            netfn: netfn & 0x3F,
            dest_lun,
            header_checksum: 0,
            src_addr,
            seq: seq & 0x3F,
            src_lun,
            cmd,
            data,
            data_checksum: 0,
        };

        me.update_checksums();
        me
    }

    /// Build a request frame from `src_addr` to `dest_addr`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_request(
        dest_addr: u8,
        dest_lun: LogicalUnit,
        src_addr: u8,
        src_lun: LogicalUnit,
        netfn: NetFn,
        seq: u8,
        cmd: u8,
        data: Vec<u8>,
    ) -> Self {
        Self::new_raw(
            dest_addr,
            netfn.request_value(),
            dest_lun,
            src_addr,
            seq,
            src_lun,
            cmd,
            data,
        )
    }

    /// Build the response to `request`, carrying `data` (completion code first).
    ///
    /// Addresses and LUNs are swapped, the NetFn gets its response bit and
    /// the sequence number and command are echoed.
    pub fn response_to(request: &IpmiMessage, data: Vec<u8>) -> Self {
        Self::new_raw(
            request.src_addr,
            request.netfn | 1,
            request.src_lun,
            request.dest_addr,
            request.seq,
            request.dest_lun,
            request.cmd,
            data,
        )
    }

    fn update_checksums(&mut self) {
        self.header_checksum = self.expected_header_checksum();
        self.data_checksum = self.expected_data_checksum();
    }

    fn expected_header_checksum(&self) -> u8 {
        let header = [self.dest_addr, self.netfn_lun_byte()];
        ipmi_checksum(&header, header.len())
    }

    fn expected_data_checksum(&self) -> u8 {
        let mut checksum = Checksum::new();
        checksum.feed_all(&[self.src_addr, self.seq_lun_byte(), self.cmd]);
        checksum.feed_all(&self.data);
        checksum.finalize()
    }

    /// Serialize the frame, writing the stored checksums.
    pub fn to_wire_buffer(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.total_len());

        buffer.extend_from_slice(&[
            self.dest_addr,
            self.netfn_lun_byte(),
            self.header_checksum,
            self.src_addr,
            self.seq_lun_byte(),
            self.cmd,
        ]);
        buffer.extend_from_slice(&self.data);
        buffer.push(self.data_checksum);

        buffer
    }

    /// Parse a frame without validating its checksums.
    pub fn from_wire_buffer(buffer: &[u8]) -> Result<Self, FrameError> {
        if buffer.len() < MIN_FRAME_LEN {
            return Err(FrameError::TooShort { len: buffer.len() });
        }

        let data_end = buffer.len() - 1;
        if data_end - OFFSET_DATA > MAX_DATA_LEN {
            return Err(FrameError::TooLong { len: buffer.len() });
        }

        let netfn_lun = codec::get_u8(buffer, OFFSET_NETFN_LUN)?;
        let seq_lun = codec::get_u8(buffer, OFFSET_SEQ_LUN)?;

        Ok(Self {
            dest_addr: codec::get_u8(buffer, OFFSET_DEST_ADDR)?,
            netfn: netfn_lun >> 2,
            dest_lun: LogicalUnit::from_low_bits(netfn_lun & IPMI_MSG_DST_LUN_MASK),
            header_checksum: codec::get_u8(buffer, OFFSET_HEADER_CHECKSUM)?,
            src_addr: codec::get_u8(buffer, OFFSET_SRC_ADDR)?,
            seq: seq_lun >> 2,
            src_lun: LogicalUnit::from_low_bits(seq_lun & IPMI_MSG_SRC_LUN_MASK),
            cmd: codec::get_u8(buffer, OFFSET_CMD)?,
            data: buffer[OFFSET_DATA..data_end].to_vec(),
            data_checksum: codec::get_u8(buffer, data_end)?,
        })
    }

    /// Recompute both checksums and compare them with the stored ones.
    ///
    /// The header checksum is checked first.
    pub fn verify_checksums(&self) -> Result<(), ChecksumError> {
        let expected = self.expected_header_checksum();
        if expected != self.header_checksum {
            return Err(ChecksumError::Header {
                expected,
                received: self.header_checksum,
            });
        }

        let expected = self.expected_data_checksum();
        if expected != self.data_checksum {
            return Err(ChecksumError::Data {
                expected,
                received: self.data_checksum,
            });
        }

        Ok(())
    }

    pub fn dest_addr(&self) -> u8 {
        self.dest_addr
    }

    pub fn src_addr(&self) -> u8 {
        self.src_addr
    }

    pub fn netfn(&self) -> NetFn {
        NetFn::from(self.netfn)
    }

    pub fn netfn_raw(&self) -> u8 {
        self.netfn
    }

    pub fn dest_lun(&self) -> LogicalUnit {
        self.dest_lun
    }

    pub fn src_lun(&self) -> LogicalUnit {
        self.src_lun
    }

    pub fn seq(&self) -> u8 {
        self.seq
    }

    pub fn cmd(&self) -> u8 {
        self.cmd
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the payload, recomputing the data checksum.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.data_checksum = self.expected_data_checksum();
    }

    pub fn header_checksum(&self) -> u8 {
        self.header_checksum
    }

    pub fn data_checksum(&self) -> u8 {
        self.data_checksum
    }

    pub fn netfn_lun_byte(&self) -> u8 {
        (self.netfn << 2) | self.dest_lun.value()
    }

    pub fn seq_lun_byte(&self) -> u8 {
        (self.seq << 2) | self.src_lun.value()
    }

    /// Requests carry an even NetFn.
    pub fn is_request(&self) -> bool {
        !NetFn::is_response_value(self.netfn)
    }

    /// The completion code of a response; `None` for requests and empty payloads.
    pub fn completion_code(&self) -> Option<CompletionCode> {
        if self.is_request() {
            None
        } else {
            self.data.first().copied().map(CompletionCode::from)
        }
    }

    /// Length of the serialized frame.
    pub fn total_len(&self) -> usize {
        IPMB_FRAME_HDR_LEN + self.data.len() + 1
    }

    /// Whether `self` answers `request`: same sequence number and command,
    /// and the request's NetFn with the response bit set.
    pub fn is_response_to(&self, request: &IpmiMessage) -> bool {
        !self.is_request()
            && self.seq == request.seq
            && self.cmd == request.cmd
            && (self.netfn_lun_byte() & !IPMI_MSG_DST_LUN_MASK)
                == ((request.netfn_lun_byte() | NETFN_RESPONSE_BIT) & !IPMI_MSG_DST_LUN_MASK)
    }
}

impl Loggable for IpmiMessage {
    fn as_log(&self) -> Vec<LogItem> {
        let kind = if self.is_request() {
            "IPMB request"
        } else {
            "IPMB response"
        };

        let mut log = log_vec![
            (0, kind),
            (1, "Destination", format!("0x{:02X} (LUN {})", self.dest_addr, self.dest_lun.value())),
            (1, "Source", format!("0x{:02X} (LUN {})", self.src_addr, self.src_lun.value())),
            (1, "NetFn", format!("0x{:02X} ({:?})", self.netfn, self.netfn())),
            (1, "Sequence", format!("0x{:02X}", self.seq)),
            (1, "Command", format!("0x{:02X}", self.cmd)),
            (1, "Header checksum", format!("0x{:02X}", self.header_checksum)),
            (1, "Data checksum", format!("0x{:02X}", self.data_checksum))
        ];

        if let Some(cc) = self.completion_code() {
            log.push((1, "Completion code", cc).into());
        }

        if !self.data.is_empty() {
            log.push((1, "Data", format!("{:02X?}", self.data)).into());
        }

        log
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Get Device ID request from 0x81 to the BMC, seq 1.
    const GET_DEVICE_ID: &str = "2018c88104017a";

    fn frame(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).unwrap()
    }

    #[test]
    fn request_layout() {
        let message = IpmiMessage::new_request(
            0x20,
            LogicalUnit::Zero,
            0x81,
            LogicalUnit::Zero,
            NetFn::App,
            1,
            0x01,
            Vec::new(),
        );

        assert_eq!(message.to_wire_buffer(), frame(GET_DEVICE_ID));
        assert_eq!(message.total_len(), 7);
        assert!(message.is_request());
        assert_eq!(message.completion_code(), None);
        assert_eq!(message.verify_checksums(), Ok(()));
    }

    #[test]
    fn parse_reproduces_valid_frames() {
        let frames = [
            GET_DEVICE_ID.to_string(),
            // Response to the above with 3 bytes of data.
            format!("811c63{}", "2004010020bb"),
        ];

        for hex_frame in frames {
            let mut bytes = frame(&hex_frame);
            // Fix up the data checksum for the hand-written response.
            let last = bytes.len() - 1;
            bytes[last] = ipmi_checksum(&bytes[3..last], last - 3);

            let parsed = IpmiMessage::from_wire_buffer(&bytes).unwrap();
            assert_eq!(parsed.verify_checksums(), Ok(()));
            assert_eq!(parsed.to_wire_buffer(), bytes);
        }
    }

    #[test]
    fn response_to_request() {
        let request = IpmiMessage::from_wire_buffer(&frame(GET_DEVICE_ID)).unwrap();
        let response = IpmiMessage::response_to(&request, vec![0x00, 0x20]);

        assert_eq!(response.dest_addr(), 0x81);
        assert_eq!(response.src_addr(), 0x20);
        assert_eq!(response.netfn(), NetFn::App);
        assert_eq!(response.netfn_raw(), 0x07);
        assert_eq!(response.seq(), 1);
        assert!(!response.is_request());
        assert!(response.is_response_to(&request));
        assert_eq!(response.completion_code(), Some(CompletionCode::NORMAL));
        assert_eq!(
            response.netfn_lun_byte(),
            request.netfn_lun_byte() | NETFN_RESPONSE_BIT
        );
        assert_eq!(response.verify_checksums(), Ok(()));
    }

    #[test]
    fn short_and_empty_frames() {
        assert_eq!(
            IpmiMessage::from_wire_buffer(&[]),
            Err(FrameError::TooShort { len: 0 })
        );
        assert_eq!(
            IpmiMessage::from_wire_buffer(&[0x20, 0x18, 0xC8, 0x81, 0x04, 0x01]),
            Err(FrameError::TooShort { len: 6 })
        );

        let empty = IpmiMessage::from_wire_buffer(&frame(GET_DEVICE_ID)).unwrap();
        assert!(empty.data().is_empty());

        let largest = IpmiMessage::new_request(
            0x20,
            LogicalUnit::Zero,
            0x24,
            LogicalUnit::Zero,
            NetFn::Oem,
            0,
            0x01,
            vec![0xA5; MAX_DATA_LEN],
        )
        .to_wire_buffer();
        assert_eq!(largest.len(), MAX_FRAME_LEN);
        let parsed = IpmiMessage::from_wire_buffer(&largest).unwrap();
        assert_eq!(parsed.verify_checksums(), Ok(()));
        assert_eq!(parsed.data().len(), MAX_DATA_LEN);

        let oversized = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            IpmiMessage::from_wire_buffer(&oversized),
            Err(FrameError::TooLong { .. })
        ));
    }

    #[test]
    fn single_bit_flips_fail_the_matching_checksum() {
        let valid = IpmiMessage::new_request(
            0x20,
            LogicalUnit::Zero,
            0x24,
            LogicalUnit::Two,
            NetFn::Intel,
            0x2A,
            0x4A,
            vec![0x01, 0x02, 0x03],
        )
        .to_wire_buffer();

        for byte in 0..valid.len() {
            for bit in 0..8 {
                let mut corrupted = valid.clone();
                corrupted[byte] ^= 1 << bit;

                let parsed = IpmiMessage::from_wire_buffer(&corrupted).unwrap();
                let result = parsed.verify_checksums();

                if byte <= OFFSET_HEADER_CHECKSUM {
                    assert!(
                        matches!(result, Err(ChecksumError::Header { .. })),
                        "byte {byte} bit {bit}: {result:?}"
                    );
                } else {
                    assert!(
                        matches!(result, Err(ChecksumError::Data { .. })),
                        "byte {byte} bit {bit}: {result:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn checksum_error_reports_values() {
        let mut bytes = frame(GET_DEVICE_ID);
        bytes[6] = 0x00;

        let parsed = IpmiMessage::from_wire_buffer(&bytes).unwrap();
        assert_eq!(
            parsed.verify_checksums(),
            Err(ChecksumError::Data {
                expected: 0x7A,
                received: 0x00
            })
        );
    }
}
