use crate::{
    codec,
    connection::{CompletionCode, NetFn, Request, Response, UnpackError},
    log_vec, Loggable,
};

use super::GET_DEVICE_ID;

/// The Get Device ID command.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GetDeviceId;

impl Request for GetDeviceId {
    fn netfn(&self) -> NetFn {
        NetFn::App
    }

    fn cmd(&self) -> u8 {
        GET_DEVICE_ID
    }

    fn pack(&self, _: &mut Vec<u8>) {}

    fn command_name(&self) -> &'static str {
        "Get Device ID"
    }
}

/// All of the fields that are returned when retrieving a
/// device's ID.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceId {
    completion_code: CompletionCode,
    /// The raw ID of the device.
    pub device_id: u8,
    /// The revision of the device.
    pub device_revision: u8,
    /// `true` if the device provides device SDRs.
    pub provides_device_sdrs: bool,
    /// `true` if the device is available, `false` if the device
    /// is in device firmware, SDR repository update, or self-initialization state.
    pub device_available: bool,
    /// The major version of the firmware revision of the device.
    pub major_fw_revision: u8,
    /// The minor version of the firmware of the device.
    pub minor_fw_revision: u8,
    /// The major version of the IPMI version supported by the device.
    pub major_version: u8,
    /// The minor version of the IPMI version supported by the device.
    pub minor_version: u8,
    /// `true` if the device is a chassis device per the ICBM specification.
    pub chassis_support: bool,
    /// `true` if the device will respond to bridge NetFN commands.
    pub bridge_support: bool,
    /// Whether the device will generate event messages onto the IPMB.
    pub ipmb_event_generator_support: bool,
    /// Whether the device accepts event messages from the IPMB.
    pub ipmb_event_receiver_support: bool,
    pub fru_inventory_support: bool,
    pub sel_device_support: bool,
    pub sdr_repository_support: bool,
    pub sensor_device_support: bool,
    /// The IANA ID of the manufacturer.
    pub manufacturer_id: u32,
    pub product_id: u16,
    /// Optional auxiliary firmware revision information.
    pub aux_revision: Option<[u8; 4]>,
}

impl DeviceId {
    const OFFSET_DEVICE_ID: usize = 1;
    const OFFSET_REVISION: usize = 2;
    const OFFSET_FW_MAJOR: usize = 3;
    const OFFSET_FW_MINOR: usize = 4;
    const OFFSET_IPMI_VERSION: usize = 5;
    const OFFSET_SUPPORT: usize = 6;
    const OFFSET_MANUFACTURER: usize = 7;
    const OFFSET_PRODUCT: usize = 10;
    const OFFSET_AUX_REVISION: usize = 12;
    const MIN_RESP_SIZE: usize = 12;

    /// The firmware version, with the BCD-encoded minor revision decoded.
    pub fn firmware_version(&self) -> String {
        format!("{}.{:02}", self.major_fw_revision, self.minor_fw_revision)
    }
}

impl Response for DeviceId {
    fn netfn(&self) -> NetFn {
        NetFn::App
    }

    fn cmd(&self) -> u8 {
        GET_DEVICE_ID
    }

    fn command_name(&self) -> &'static str {
        "Get Device ID"
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
        let revision = codec::get_u8(data, Self::OFFSET_REVISION)?;
        let fw_major = codec::get_u8(data, Self::OFFSET_FW_MAJOR)?;
        let fw_minor = codec::get_u8(data, Self::OFFSET_FW_MINOR)?;
        let version = codec::get_u8(data, Self::OFFSET_IPMI_VERSION)?;
        let support = codec::get_u8(data, Self::OFFSET_SUPPORT)?;
        let manufacturer = codec::get_array::<3>(data, Self::OFFSET_MANUFACTURER)?;

        self.device_id = codec::get_u8(data, Self::OFFSET_DEVICE_ID)?;
        self.device_revision = revision & 0xF;
        self.provides_device_sdrs = (revision & 0x80) == 0x80;
        self.device_available = (fw_major & 0x80) != 0x80;
        self.major_fw_revision = fw_major & 0x7F;
        self.minor_fw_revision = (fw_minor & 0xF) + ((fw_minor >> 4) & 0xF) * 10;
        self.major_version = version & 0xF;
        self.minor_version = (version >> 4) & 0xF;
        self.chassis_support = (support & 0x80) == 0x80;
        self.bridge_support = (support & 0x40) == 0x40;
        self.ipmb_event_generator_support = (support & 0x20) == 0x20;
        self.ipmb_event_receiver_support = (support & 0x10) == 0x10;
        self.fru_inventory_support = (support & 0x08) == 0x08;
        self.sel_device_support = (support & 0x04) == 0x04;
        self.sdr_repository_support = (support & 0x02) == 0x02;
        self.sensor_device_support = (support & 0x01) == 0x01;
        self.manufacturer_id =
            u32::from_le_bytes([manufacturer[0], manufacturer[1], manufacturer[2], 0]);
        self.product_id = codec::get_u16_le(data, Self::OFFSET_PRODUCT)?;
        self.aux_revision = codec::get_array::<4>(data, Self::OFFSET_AUX_REVISION).ok();

        Ok(())
    }
}

impl Loggable for DeviceId {
    fn as_log(&self) -> Vec<crate::fmt::LogItem> {
        let (dev_id, dev_rev) = (self.device_id, self.device_revision);
        let (v_maj, v_min) = (self.major_version, self.minor_version);
        let manf_id = self.manufacturer_id;

        let mut log = log_vec![
            (0, "Device ID information"),
            (1, "Device ID", format!("0x{dev_id:02X}")),
            (1, "Device revision", format!("0x{dev_rev:02X}")),
            (1, "Manufacturer ID", format!("0x{manf_id:06X}")),
            (1, "Product ID", format!("0x{:04X}", self.product_id)),
            (1, "IPMI Version", format!("{v_maj}.{v_min}")),
            (1, "FW revision", self.firmware_version()),
            (1, "Device available", self.device_available),
            (1, "Provides device SDRs", self.provides_device_sdrs),
            (1, "Chassis support", self.chassis_support),
            (1, "Bridge support", self.bridge_support),
            (1, "IPMB Event gen sup", self.ipmb_event_generator_support),
            (1, "IPMB Event recv sup", self.ipmb_event_receiver_support),
            (1, "FRU Inventory sup", self.fru_inventory_support),
            (1, "SEL Device support", self.sel_device_support),
            (1, "SDR Repository sup", self.sdr_repository_support),
            (1, "Sensor Device sup", self.sensor_device_support)
        ];

        if let Some(aux_rev) = &self.aux_revision {
            let element = (1, "Auxiliary revision", format!("{aux_rev:02X?}")).into();
            log.insert(7, element);
        }

        log
    }
}

#[test]
fn parse_device_id() {
    let data = hex::decode("002081025151bf570100010001000000").unwrap();

    let mut response = DeviceId::default();
    response.unpack(&data).unwrap();

    assert_eq!(response.device_id, 0x20);
    assert!(response.provides_device_sdrs);
    assert_eq!(response.device_revision, 1);
    assert!(response.device_available);
    assert_eq!(response.firmware_version(), "2.51");
    assert_eq!((response.major_version, response.minor_version), (1, 5));
    assert!(response.chassis_support);
    assert!(!response.bridge_support);
    assert_eq!(response.manufacturer_id, 0x000157);
    assert_eq!(response.product_id, 0x0001);
    assert_eq!(response.aux_revision, Some([0x01, 0x00, 0x00, 0x00]));
}

#[test]
fn failed_device_id_keeps_defaults() {
    let mut response = DeviceId::default();
    response.unpack(&[0xC1]).unwrap();

    assert_eq!(response.completion_code(), CompletionCode::INVALID_COMMAND);
    assert_eq!(response.device_id, 0);
}
