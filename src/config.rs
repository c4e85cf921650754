use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use crate::connection::{Address, LogicalUnit, TcpConnector};

/// Runtime configuration shared by [`ManagementController`](crate::ManagementController)
/// and [`IpmbService`](crate::IpmbService).
#[derive(Clone, Debug, PartialEq)]
pub struct IpmbConfig {
    /// Address the MUX listens on.
    pub mux_address: IpAddr,
    pub mux_port: u16,
    /// Read window of the persistent responder connection. A read that
    /// times out is not an error, so this only bounds how quickly the
    /// receiver notices `stop` and shutdown.
    pub recv_timeout: Duration,
    /// Read window of a synchronous request/response exchange.
    pub client_timeout: Duration,
    /// Delay between reconnection attempts of the receiver thread.
    pub reconnect_interval: Duration,
    /// Polling period of the receiver thread while the service is stopped.
    pub idle_interval: Duration,
    /// This node's slave address.
    pub own_address: Address,
    pub own_lun: LogicalUnit,
    /// Default destination of requests.
    pub target_address: Address,
    pub target_lun: LogicalUnit,
}

impl Default for IpmbConfig {
    fn default() -> Self {
        Self {
            mux_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            mux_port: 5623,
            recv_timeout: Duration::from_millis(500),
            client_timeout: Duration::from_secs(2),
            reconnect_interval: Duration::from_secs(1),
            idle_interval: Duration::from_millis(100),
            own_address: Address(0x24),
            own_lun: LogicalUnit::Zero,
            target_address: Address::BMC,
            target_lun: LogicalUnit::Zero,
        }
    }
}

impl IpmbConfig {
    /// A connector to the configured MUX, using `client_timeout` for
    /// exchanges and `recv_timeout` for the responder connection.
    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new(self.mux_address, self.client_timeout)
            .with_responder_timeout(self.recv_timeout)
    }
}
