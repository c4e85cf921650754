//! Typed registry from `(NetFn, command)` to response constructors and
//! inbound request handlers.

use std::collections::HashMap;

use crate::{
    app, intel, rackscale,
    connection::{IpmiMessage, NetFn, Response, UnpackError},
};

type ResponseFactory = Box<dyn Fn() -> Box<dyn Response> + Send + Sync>;
type RequestHandler = Box<dyn Fn(&IpmiMessage) -> Vec<u8> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchError {
    /// Nothing is registered for the frame's NetFn and command.
    UnknownCommand { netfn: NetFn, cmd: u8 },
    /// The registered response rejected the payload.
    Unpack(UnpackError),
}

impl From<UnpackError> for DispatchError {
    fn from(value: UnpackError) -> Self {
        Self::Unpack(value)
    }
}

/// Registered entries are keyed by the request NetFn, so a response frame
/// (odd NetFn) and the request it answers share a key.
#[derive(Default)]
pub struct Dispatcher {
    responses: HashMap<(u8, u8), ResponseFactory>,
    handlers: HashMap<(u8, u8), RequestHandler>,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("responses", &self.responses.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn key(netfn: NetFn, cmd: u8) -> (u8, u8) {
    (netfn.request_value(), cmd)
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher that knows every command implemented by this crate
    /// which has a unique `(NetFn, command)` pair.
    pub fn with_default_commands() -> Self {
        let mut me = Self::new();

        me.register::<app::DeviceId>();
        me.register::<app::SystemGuid>();
        me.register::<rackscale::AcpiTableNames>();
        me.register::<rackscale::SetAcpiTableNamesResponse>();
        me.register::<intel::DimmInfo>();
        me.register::<intel::PeciPackageConfigData>();

        me
    }

    /// Register `R`, built through its `Default` implementation.
    ///
    /// A later registration for the same NetFn and command replaces the
    /// earlier one.
    pub fn register<R>(&mut self)
    where
        R: Response + Default + 'static,
    {
        let probe = R::default();
        self.register_factory(probe.netfn(), probe.cmd(), || Box::new(R::default()));
    }

    pub fn register_factory<F>(&mut self, netfn: NetFn, cmd: u8, factory: F)
    where
        F: Fn() -> Box<dyn Response> + Send + Sync + 'static,
    {
        if self
            .responses
            .insert(key(netfn, cmd), Box::new(factory))
            .is_some()
        {
            log::debug!("Replaced response registration for {netfn:?} command 0x{cmd:02X}");
        }
    }

    /// Register a handler for inbound requests. The handler returns the
    /// response payload, completion code first.
    pub fn register_handler<F>(&mut self, netfn: NetFn, cmd: u8, handler: F)
    where
        F: Fn(&IpmiMessage) -> Vec<u8> + Send + Sync + 'static,
    {
        self.handlers.insert(key(netfn, cmd), Box::new(handler));
    }

    pub fn knows_response(&self, netfn: NetFn, cmd: u8) -> bool {
        self.responses.contains_key(&key(netfn, cmd))
    }

    /// Construct the response registered for `message` and unpack its payload into it.
    pub fn dispatch(&self, message: &IpmiMessage) -> Result<Box<dyn Response>, DispatchError> {
        let (netfn, cmd) = (message.netfn(), message.cmd());

        let factory = self
            .responses
            .get(&key(netfn, cmd))
            .ok_or(DispatchError::UnknownCommand { netfn, cmd })?;

        let mut response = factory();
        response.unpack(message.data())?;

        Ok(response)
    }

    /// Run the handler registered for the inbound request `message`.
    pub fn handle(&self, message: &IpmiMessage) -> Result<Vec<u8>, DispatchError> {
        let (netfn, cmd) = (message.netfn(), message.cmd());

        let handler = self
            .handlers
            .get(&key(netfn, cmd))
            .ok_or(DispatchError::UnknownCommand { netfn, cmd })?;

        Ok(handler(message))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::{CompletionCode, LogicalUnit};

    fn response(netfn: NetFn, cmd: u8, data: Vec<u8>) -> IpmiMessage {
        let request =
            IpmiMessage::new_request(0x20, LogicalUnit::Zero, 0x24, LogicalUnit::Zero, netfn, 3, cmd, vec![]);
        IpmiMessage::response_to(&request, data)
    }

    #[test]
    fn dispatches_registered_response() {
        let dispatcher = Dispatcher::with_default_commands();

        let mut data = vec![0x00];
        data.extend_from_slice(&[0x11; 16]);

        let decoded = dispatcher
            .dispatch(&response(NetFn::App, 0x37, data))
            .unwrap();

        assert_eq!(decoded.command_name(), "Get System GUID");
        assert_eq!(decoded.completion_code(), CompletionCode::NORMAL);
    }

    #[test]
    fn unknown_command() {
        let dispatcher = Dispatcher::new();

        let result = dispatcher.dispatch(&response(NetFn::Chassis, 0x01, vec![0x00]));

        assert!(matches!(
            result,
            Err(DispatchError::UnknownCommand {
                netfn: NetFn::Chassis,
                cmd: 0x01
            })
        ));
    }

    #[test]
    fn short_payload_is_an_unpack_error() {
        let dispatcher = Dispatcher::with_default_commands();

        let result = dispatcher.dispatch(&response(NetFn::App, 0x37, vec![0x00, 0x01]));

        assert!(matches!(
            result,
            Err(DispatchError::Unpack(UnpackError::TooShort {
                expected: 17,
                received: 2
            }))
        ));
    }

    #[test]
    fn handlers_answer_requests() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler(NetFn::App, 0x01, |request| vec![0x00, request.seq()]);

        let request =
            IpmiMessage::new_request(0x24, LogicalUnit::Zero, 0x20, LogicalUnit::Zero, NetFn::App, 9, 0x01, vec![]);

        assert_eq!(dispatcher.handle(&request), Ok(vec![0x00, 9]));
        assert!(dispatcher.handle(&response(NetFn::Intel, 0x01, vec![])).is_err());
    }
}
