//! Intel OEM commands.

const GET_DIMM_INFO: u8 = 0x4A;
const GET_CPU_PECI_PACKAGE_CONFIG_DATA: u8 = 0x4B;
const SEND_PSU_COMMAND: u8 = 0x6A;

mod get_dimm_info;
pub use get_dimm_info::{DimmInfo, DimmType, GetDimmInfo};

mod get_cpu_peci_package_config_data;
pub use get_cpu_peci_package_config_data::{GetCpuPeciPackageConfigData, PeciPackageConfigData};

pub mod send_psu_command;
pub use send_psu_command::SendPsuCommand;
