use std::{net::IpAddr, time::Duration};

use clap::Parser;
use ipmb_rs::{
    connection::{Address, LogicalUnit, TcpConnector},
    IpmbConfig, ManagementController,
};

#[allow(unused)]
fn main() {}

#[derive(Parser)]
pub struct CommonOpts {
    /// The address the IPMB MUX listens on
    #[clap(default_value = "127.0.0.1", long, short)]
    address: IpAddr,
    /// The TCP port of the IPMB MUX
    #[clap(default_value = "5623", long, short)]
    port: u16,
    /// How many milliseconds to wait before timing out while waiting for a response
    #[clap(default_value = "2000", long)]
    timeout_ms: u64,
    /// The slave address of this node, as a hex byte
    #[clap(default_value = "24", long, value_parser = parse_hex)]
    own_address: u8,
    /// The slave address requests are sent to, as a hex byte
    #[clap(default_value = "20", long, value_parser = parse_hex)]
    target_address: u8,
    /// The logical unit requests are sent to
    #[clap(default_value = "0", long)]
    target_lun: u8,
}

pub fn parse_hex(input: &str) -> Result<u8, String> {
    let trimmed = input.trim_start_matches("0x");
    u8::from_str_radix(trimmed, 16).map_err(|_| format!("Could not parse '{input}' as hex integer"))
}

impl CommonOpts {
    pub fn config(&self) -> std::io::Result<IpmbConfig> {
        let target_lun = LogicalUnit::try_from(self.target_lun).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid logical unit {}", self.target_lun),
            )
        })?;

        Ok(IpmbConfig {
            mux_address: self.address,
            mux_port: self.port,
            client_timeout: Duration::from_millis(self.timeout_ms),
            own_address: Address(self.own_address),
            target_address: Address(self.target_address),
            target_lun,
            ..Default::default()
        })
    }

    pub fn get_controller(&self) -> std::io::Result<ManagementController<TcpConnector>> {
        let config = self.config()?;
        log::debug!(
            "Using MUX at {}:{} as 0x{:02X}",
            config.mux_address,
            config.mux_port,
            config.own_address.0
        );
        Ok(ManagementController::with_config(config))
    }
}

pub fn init_logger() {
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or("info".to_string()))
        .init();
}
