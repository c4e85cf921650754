//! IPMB-rs: an IPMI-over-IPMB protocol engine.
//!
//! This library provides IPMB framing and command serialization and deserialization (in the
//! [`app`], [`rackscale`] and [`intel`] modules), a synchronous [`ManagementController`] for
//! request/response exchanges, and an [`IpmbService`] that keeps a persistent connection to the
//! IPMB MUX and serves unsolicited traffic (in the [`connection`] module).

pub mod codec;

pub mod checksum;
pub use checksum::ipmi_checksum;

pub mod connection;

pub mod app;

pub mod intel;

pub mod rackscale;

mod config;
pub use config::IpmbConfig;

mod controller;
pub use controller::ManagementController;

mod dispatcher;
pub use dispatcher::{DispatchError, Dispatcher};

mod error;
pub use error::SendError;

mod service;
pub use service::IpmbService;

#[macro_use]
mod fmt;

pub use fmt::{LogItem, LogOutput, Loggable, Logger};
