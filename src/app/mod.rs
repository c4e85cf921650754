//! Commands of the App NetFn.

const GET_DEVICE_ID: u8 = 0x01;
const GET_SYSTEM_GUID: u8 = 0x37;

mod get_device_id;
pub use get_device_id::{DeviceId, GetDeviceId};

mod get_system_guid;
pub use get_system_guid::{GetSystemGuid, SystemGuid};
