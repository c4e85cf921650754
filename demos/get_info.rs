mod common;

use clap::Parser;
use common::CommonOpts;
use ipmb_rs::{
    app::{DeviceId, GetDeviceId, GetSystemGuid, SystemGuid},
    intel::{
        send_psu_command::{PsuPower, PsuStatusWord},
        DimmInfo, GetDimmInfo, SendPsuCommand,
    },
    rackscale::{AcpiTableNames, GetAcpiTableNames},
    LogOutput, Logger,
};

#[derive(Parser)]
pub struct Command {
    #[clap(flatten)]
    common: CommonOpts,

    /// How many DIMM slots to query
    #[clap(default_value = "0", long)]
    dimms: u8,

    /// Which PSUs to query
    #[clap(long)]
    psu: Vec<u8>,
}

fn main() -> std::io::Result<()> {
    common::init_logger();

    let command = Command::parse();
    let mut controller = command.common.get_controller()?;

    let log_output = &LogOutput::LogTarget(log::Level::Info, "get_info".into());

    log::info!("Getting device ID");
    let mut device_id = DeviceId::default();
    match controller.send(&GetDeviceId, &mut device_id) {
        Ok(()) => Logger::log(log_output, &device_id),
        Err(e) => log::warn!("Could not get device ID: {e}"),
    }

    log::info!("Getting system GUID");
    let mut guid = SystemGuid::default();
    match controller.send(&GetSystemGuid, &mut guid) {
        Ok(()) => Logger::log(log_output, &guid),
        Err(e) => log::warn!("Could not get system GUID: {e}"),
    }

    log::info!("Getting ACPI table names");
    let mut tables = AcpiTableNames::default();
    match controller.send(&GetAcpiTableNames, &mut tables) {
        Ok(()) => Logger::log(log_output, &tables),
        Err(e) => log::warn!("Could not get ACPI table names: {e}"),
    }

    for index in 0..command.dimms {
        let mut dimm = DimmInfo::default();
        match controller.send(&GetDimmInfo::new(index), &mut dimm) {
            Ok(()) => Logger::log(log_output, &dimm),
            Err(e) => log::warn!("Could not get DIMM {index} info: {e}"),
        }
    }

    for &psu in &command.psu {
        let mut status = PsuStatusWord::default();
        match controller.send(&SendPsuCommand::read_status_word(psu), &mut status) {
            Ok(()) => Logger::log(log_output, &status),
            Err(e) => log::warn!("Could not read status of PSU {psu}: {e}"),
        }

        let mut power = PsuPower::default();
        match controller.send(&SendPsuCommand::read_power_output(psu), &mut power) {
            Ok(()) => Logger::log(log_output, &power),
            Err(e) => log::warn!("Could not read output power of PSU {psu}: {e}"),
        }
    }

    Ok(())
}
