use std::sync::Arc;

use crate::{
    config::IpmbConfig,
    connection::{
        Connector, FrameError, IpmiMessage, MuxConnection, NetFn, Request, Response, Role,
        TcpConnector, MAX_DATA_LEN, MAX_FRAME_LEN,
    },
    dispatcher::{DispatchError, Dispatcher},
    error::SendError,
    fmt::{LogOutput, Logger},
};

/// Send `request` on `connection` and wait for the frame that answers it.
///
/// An empty read is a timeout. The reply must parse, carry valid checksums
/// and answer `request` (same sequence number and command, response NetFn).
pub(crate) fn round_trip<M>(connection: &mut M, request: &IpmiMessage) -> Result<IpmiMessage, SendError>
where
    M: MuxConnection + ?Sized,
{
    let buffer = request.to_wire_buffer();
    log::trace!("Sending frame: {buffer:02X?}");
    connection.send(&buffer)?;

    let received = connection.recv(MAX_FRAME_LEN)?;
    if received.is_empty() {
        return Err(SendError::Timeout);
    }
    log::trace!("Received frame: {received:02X?}");

    let reply = IpmiMessage::from_wire_buffer(&received)?;
    reply.verify_checksums()?;

    if !reply.is_response_to(request) {
        return Err(SendError::UnexpectedResponse {
            netfn_sent: request.netfn_raw(),
            netfn_recvd: reply.netfn_raw(),
            cmd_sent: request.cmd(),
            cmd_recvd: reply.cmd(),
            seq_sent: request.seq(),
            seq_recvd: reply.seq(),
        });
    }

    Ok(reply)
}

/// Synchronous request/response exchanges with the configured target.
///
/// Every exchange uses a fresh client connection to the MUX, which is closed
/// before the call returns. Nothing is retried.
pub struct ManagementController<C: Connector> {
    connector: C,
    dispatcher: Arc<Dispatcher>,
    config: IpmbConfig,
    seq: u8,
}

impl ManagementController<TcpConnector> {
    /// A controller talking to the TCP MUX described by `config`, knowing the
    /// commands of [`Dispatcher::with_default_commands`].
    pub fn with_config(config: IpmbConfig) -> Self {
        Self::new(
            config.connector(),
            Arc::new(Dispatcher::with_default_commands()),
            config,
        )
    }
}

impl<C: Connector> ManagementController<C> {
    pub fn new(connector: C, dispatcher: Arc<Dispatcher>, config: IpmbConfig) -> Self {
        Self {
            connector,
            dispatcher,
            config,
            seq: 0,
        }
    }

    pub fn config(&self) -> &IpmbConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.seq;
        self.seq = (self.seq + 1) & 0x3F;
        seq
    }

    fn build(&mut self, netfn: NetFn, cmd: u8, data: Vec<u8>) -> Result<IpmiMessage, SendError> {
        if data.len() > MAX_DATA_LEN {
            return Err(FrameError::TooLong {
                len: data.len() + 7,
            }
            .into());
        }

        let seq = self.next_seq();

        Ok(IpmiMessage::new_request(
            self.config.target_address.0,
            self.config.target_lun,
            self.config.own_address.0,
            self.config.own_lun,
            netfn,
            seq,
            cmd,
            data,
        ))
    }

    fn exchange(&self, request: &IpmiMessage) -> Result<IpmiMessage, SendError> {
        let mut connection = self.connector.connect(self.config.mux_port, Role::Client)?;
        let result = round_trip(&mut connection, request);
        connection.close();
        result
    }

    fn pack<Req: Request + ?Sized>(&mut self, request: &Req) -> Result<IpmiMessage, SendError> {
        let mut data = Vec::new();
        request.pack(&mut data);
        self.build(request.netfn(), request.cmd(), data)
    }

    /// Send `request` and unpack the reply into `response`.
    ///
    /// A reply with a non-normal completion code is recorded in `response`
    /// and returned as [`SendError::Failed`].
    pub fn send<Req, Resp>(&mut self, request: &Req, response: &mut Resp) -> Result<(), SendError>
    where
        Req: Request + ?Sized,
        Resp: Response + ?Sized,
    {
        let message = self.pack(request)?;
        let reply = self.exchange(&message)?;

        let command = request.command_name();
        response
            .unpack(reply.data())
            .map_err(|e| SendError::unpack(command, e))?;

        let completion_code = response.completion_code();
        if !completion_code.is_success() {
            return Err(SendError::Failed {
                command,
                completion_code,
            });
        }

        Logger::log(&LogOutput::Log(log::Level::Trace), &*response);

        Ok(())
    }

    /// Send an arbitrary command and return the raw reply frame.
    pub fn send_raw(&mut self, netfn: NetFn, cmd: u8, data: Vec<u8>) -> Result<IpmiMessage, SendError> {
        let message = self.build(netfn, cmd, data)?;
        self.exchange(&message)
    }

    /// Send `request` and decode the reply through the dispatcher.
    pub fn send_dispatched(&mut self, request: &dyn Request) -> Result<Box<dyn Response>, SendError> {
        let message = self.pack(request)?;
        let reply = self.exchange(&message)?;

        let command = request.command_name();
        let response = self.dispatcher.dispatch(&reply).map_err(|e| match e {
            DispatchError::UnknownCommand { netfn, cmd } => SendError::UnknownCommand { netfn, cmd },
            DispatchError::Unpack(e) => SendError::unpack(command, e),
        })?;

        let completion_code = response.completion_code();
        if !completion_code.is_success() {
            return Err(SendError::Failed {
                command,
                completion_code,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        app::{GetSystemGuid, SystemGuid},
        connection::{
            mock::{expected_request, reply_frame, test_config, MockConnector, Reply},
            ChecksumError, CompletionCode,
        },
        intel::{DimmInfo, DimmType, GetDimmInfo},
    };

    const GET_SYSTEM_GUID: u8 = 0x37;

    fn controller(mux: &MockConnector) -> ManagementController<MockConnector> {
        ManagementController::new(
            mux.clone(),
            Arc::new(Dispatcher::with_default_commands()),
            test_config(),
        )
    }

    fn guid_payload() -> Vec<u8> {
        hex::decode("00332211006655887799aabbccddeeff01").unwrap()
    }

    #[test]
    fn send_unpacks_matching_reply() {
        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(reply_frame(
            NetFn::App,
            0,
            GET_SYSTEM_GUID,
            guid_payload(),
        )));

        let mut response = SystemGuid::default();
        controller(&mux).send(&GetSystemGuid, &mut response).unwrap();

        assert_eq!(response.guid(), "00112233-5566-7788-99aa-bbccddeeff01");

        let request = expected_request(NetFn::App, 0, GET_SYSTEM_GUID, Vec::new());
        assert_eq!(mux.sent_by(Role::Client), vec![request.to_wire_buffer()]);

        let script = mux.script();
        assert_eq!(script.connects, vec![Role::Client]);
        assert_eq!(script.closes, 1);
    }

    #[test]
    fn sequence_numbers_advance() {
        let mux = MockConnector::default();
        for seq in 0..2 {
            mux.script().client.push_back(Reply::Frame(reply_frame(
                NetFn::App,
                seq,
                GET_SYSTEM_GUID,
                guid_payload(),
            )));
        }

        let mut controller = controller(&mux);
        let mut response = SystemGuid::default();
        controller.send(&GetSystemGuid, &mut response).unwrap();
        controller.send(&GetSystemGuid, &mut response).unwrap();

        let sent = mux.sent_by(Role::Client);
        assert_eq!(sent[0][4] >> 2, 0);
        assert_eq!(sent[1][4] >> 2, 1);
    }

    #[test]
    fn reply_with_wrong_netfn_is_rejected() {
        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(reply_frame(
            NetFn::Chassis,
            0,
            GET_SYSTEM_GUID,
            guid_payload(),
        )));

        let mut response = SystemGuid::default();
        let result = controller(&mux).send(&GetSystemGuid, &mut response);

        assert!(matches!(
            result,
            Err(SendError::UnexpectedResponse {
                netfn_sent: 0x06,
                netfn_recvd: 0x01,
                ..
            })
        ));
    }

    #[test]
    fn no_reply_is_a_timeout() {
        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Empty);

        let mut response = SystemGuid::default();
        let result = controller(&mux).send(&GetSystemGuid, &mut response);
        assert!(matches!(result, Err(SendError::Timeout)));

        let result = controller(&mux).send(&GetSystemGuid, &mut response);
        assert!(matches!(result, Err(SendError::Timeout)));

        assert_eq!(mux.script().closes, 2);
    }

    #[test]
    fn corrupted_reply_fails_its_checksum() {
        let mut frame = reply_frame(NetFn::App, 0, GET_SYSTEM_GUID, guid_payload());
        let last = frame.len() - 1;
        frame[last] ^= 0x01;

        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(frame));

        let mut response = SystemGuid::default();
        let result = controller(&mux).send(&GetSystemGuid, &mut response);

        assert!(matches!(
            result,
            Err(SendError::ChecksumMismatch(ChecksumError::Data { .. }))
        ));
    }

    #[test]
    fn undersized_reply_is_short() {
        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(reply_frame(
            NetFn::App,
            0,
            GET_SYSTEM_GUID,
            vec![0x00, 0x01, 0x02],
        )));

        let mut response = SystemGuid::default();
        let result = controller(&mux).send(&GetSystemGuid, &mut response);

        assert!(matches!(
            result,
            Err(SendError::ShortResponse {
                command: "Get System GUID",
                expected: 17,
                received: 3
            })
        ));
    }

    #[test]
    fn completion_code_is_recorded_and_fails() {
        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(reply_frame(
            NetFn::App,
            0,
            GET_SYSTEM_GUID,
            vec![0xC1],
        )));

        let mut response = SystemGuid::default();
        let result = controller(&mux).send(&GetSystemGuid, &mut response);

        assert!(matches!(
            result,
            Err(SendError::Failed {
                completion_code: CompletionCode::INVALID_COMMAND,
                ..
            })
        ));
        assert_eq!(response.completion_code(), CompletionCode::INVALID_COMMAND);
        assert_eq!(response.guid(), "");
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        let mux = MockConnector::default();
        mux.script().refuse = true;

        let mut response = SystemGuid::default();
        let result = controller(&mux).send(&GetSystemGuid, &mut response);

        assert!(matches!(result, Err(SendError::Transport(_))));
    }

    #[test]
    fn dispatched_send_decodes_by_command() {
        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(reply_frame(
            NetFn::Intel,
            0,
            0x4A,
            hex::decode("001ab00460090040000001").unwrap(),
        )));

        let response = controller(&mux)
            .send_dispatched(&GetDimmInfo::new(3))
            .unwrap();
        assert_eq!(response.command_name(), "Get DIMM Info");

        let request = expected_request(NetFn::Intel, 0, 0x4A, vec![3]);
        assert_eq!(mux.sent_by(Role::Client), vec![request.to_wire_buffer()]);

        let mut typed = DimmInfo::default();
        typed
            .unpack(&hex::decode("001ab00460090040000001").unwrap())
            .unwrap();
        assert_eq!(typed.dimm_type, DimmType::Ddr4);
    }

    #[test]
    fn raw_send_returns_the_reply_frame() {
        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(reply_frame(
            NetFn::Chassis,
            0,
            0x01,
            vec![0x00, 0x41],
        )));

        let reply = controller(&mux)
            .send_raw(NetFn::Chassis, 0x01, Vec::new())
            .unwrap();

        assert_eq!(reply.netfn_raw(), 0x01);
        assert_eq!(reply.data(), [0x00, 0x41]);
        assert_eq!(reply.completion_code(), Some(CompletionCode::NORMAL));
    }

    #[test]
    fn oversized_request_is_rejected_before_sending() {
        let mux = MockConnector::default();

        let result = controller(&mux).send_raw(NetFn::Oem, 0x01, vec![0; 300]);

        assert!(matches!(result, Err(SendError::Frame(_))));
        assert!(mux.script().connects.is_empty());
    }

    #[test]
    fn full_size_reply_is_received_whole() {
        let mut payload = vec![0x00];
        payload.resize(MAX_DATA_LEN, 0x5A);

        let mux = MockConnector::default();
        mux.script().client.push_back(Reply::Frame(reply_frame(
            NetFn::Oem,
            0,
            0x01,
            payload.clone(),
        )));

        let reply = controller(&mux)
            .send_raw(NetFn::Oem, 0x01, Vec::new())
            .unwrap();

        assert_eq!(reply.data(), payload.as_slice());
        assert_eq!(reply.total_len(), MAX_FRAME_LEN);
        assert!(mux.script().client.is_empty());
    }
}
