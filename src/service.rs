//! The IPMB service: a persistent responder connection to the MUX, read by a
//! receiver thread and served by a worker thread, plus synchronous
//! request/response exchanges on short-lived client connections.
//!
//! Lock order is `state` before `connection`. `client_lock` is never taken
//! while holding either of them.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;

use crate::{
    config::IpmbConfig,
    connection::{
        Connector, IpmiMessage, MuxConnection, MuxError, Role, TcpConnector,
        MAX_FRAME_LEN,
    },
    controller::round_trip,
    dispatcher::{DispatchError, Dispatcher},
    error::SendError,
    fmt::{LogOutput, Logger},
};

#[derive(Debug)]
struct State {
    is_initialized: bool,
    is_working: bool,
    port: u16,
    /// A failure of the responder connection has been logged at `error`
    /// since the last success.
    server_failure_logged: bool,
    /// Same, for client connections.
    client_failure_logged: bool,
}

/// Log `message` at `error` for the first failure of a streak and at
/// `debug` afterwards.
fn log_failure(already_logged: &mut bool, message: core::fmt::Arguments) {
    if *already_logged {
        log::debug!("{message}");
    } else {
        log::error!("{message}");
        *already_logged = true;
    }
}

fn log_recovery(already_logged: &mut bool, message: core::fmt::Arguments) {
    if *already_logged {
        log::info!("{message}");
        *already_logged = false;
    }
}

struct Shared<C: Connector> {
    config: IpmbConfig,
    connector: C,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<State>,
    connection: Mutex<Option<C::Connection>>,
    client_lock: Mutex<()>,
    shutdown: AtomicBool,
}

impl<C: Connector> Shared<C> {
    /// Open the responder connection. The caller holds `state`.
    fn connect(&self, state: &mut State) -> bool {
        match self.connector.connect(state.port, Role::Responder) {
            Ok(connection) => {
                if let Some(mut old) = self.connection.lock().replace(connection) {
                    old.close();
                }
                state.is_initialized = true;
                log_recovery(
                    &mut state.server_failure_logged,
                    format_args!("Connected to the MUX on port {}", state.port),
                );
                true
            }
            Err(e) => {
                log_failure(
                    &mut state.server_failure_logged,
                    format_args!("Cannot connect to the MUX on port {}: {e:?}", state.port),
                );
                false
            }
        }
    }

    fn mark_disconnected(&self, error: &MuxError) {
        let mut state = self.state.lock();
        state.is_initialized = false;
        log_failure(
            &mut state.server_failure_logged,
            format_args!("Lost the connection to the MUX: {error:?}"),
        );
    }

    fn slave_read(&self) -> Option<IpmiMessage> {
        let received = {
            let mut guard = self.connection.lock();
            let connection = guard.as_mut()?;

            match connection.recv(MAX_FRAME_LEN) {
                Err(e) if !e.is_timeout() => {
                    connection.close();
                    *guard = None;
                    Err(e)
                }
                other => other,
            }
        };

        let buffer = match received {
            Ok(buffer) if buffer.is_empty() => return None,
            Ok(buffer) => buffer,
            Err(MuxError::TimedOut) => {
                log::trace!("No frame within the read window");
                return None;
            }
            Err(e) => {
                self.mark_disconnected(&e);
                return None;
            }
        };

        let message = match IpmiMessage::from_wire_buffer(&buffer) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping malformed frame {buffer:02X?}: {e:?}");
                return None;
            }
        };

        if let Err(e) = message.verify_checksums() {
            log::warn!("Dropping frame {buffer:02X?}: {e:?}");
            return None;
        }

        Some(message)
    }

    fn write_persistent(&self, message: &IpmiMessage) -> bool {
        let result = {
            let mut guard = self.connection.lock();
            match guard.as_mut() {
                None => Err(MuxError::Closed),
                Some(connection) => match connection.send(&message.to_wire_buffer()) {
                    Err(e) if !e.is_timeout() => {
                        connection.close();
                        *guard = None;
                        Err(e)
                    }
                    other => other,
                },
            }
        };

        match result {
            Ok(()) => true,
            Err(MuxError::TimedOut) => {
                log::warn!("Timed out writing a response to 0x{:02X}", message.dest_addr());
                false
            }
            Err(e) => {
                self.mark_disconnected(&e);
                false
            }
        }
    }

    fn master_request(&self, message: &IpmiMessage) -> Result<IpmiMessage, SendError> {
        let _client = self.client_lock.lock();
        let port = self.state.lock().port;

        let mut connection = match self.connector.connect(port, Role::Client) {
            Ok(connection) => connection,
            Err(e) => {
                log_failure(
                    &mut self.state.lock().client_failure_logged,
                    format_args!("Cannot open a client connection to the MUX: {e:?}"),
                );
                return Err(e.into());
            }
        };

        let result = round_trip(&mut connection, message);
        connection.close();

        let mut state = self.state.lock();
        match &result {
            Err(e) if e.is_transport() => log_failure(
                &mut state.client_failure_logged,
                format_args!("Client exchange with the MUX failed: {e}"),
            ),
            _ => log_recovery(
                &mut state.client_failure_logged,
                format_args!("Client connections to the MUX work again"),
            ),
        }

        result
    }

    /// Decode and log a response frame.
    fn deliver(&self, message: &IpmiMessage) {
        match self.dispatcher.dispatch(message) {
            Ok(response) => {
                log::debug!(
                    "{} from 0x{:02X}: {}",
                    response.command_name(),
                    message.src_addr(),
                    response.completion_code()
                );
                Logger::log(&LogOutput::Log(log::Level::Debug), &*response);
            }
            Err(DispatchError::UnknownCommand { netfn, cmd }) => {
                log::warn!("Ignoring response to unknown {netfn:?} command 0x{cmd:02X}");
            }
            Err(DispatchError::Unpack(e)) => {
                log::warn!(
                    "Cannot decode response to {:?} command 0x{:02X}: {e:?}",
                    message.netfn(),
                    message.cmd()
                );
            }
        }
    }

    /// Answer an inbound request through its registered handler.
    fn serve(&self, request: &IpmiMessage) {
        match self.dispatcher.handle(request) {
            Ok(payload) => {
                let response = IpmiMessage::response_to(request, payload);
                self.write_persistent(&response);
            }
            Err(e) => {
                log::warn!(
                    "Ignoring request {:?} command 0x{:02X} from 0x{:02X}: {e:?}",
                    request.netfn(),
                    request.cmd(),
                    request.src_addr()
                );
            }
        }
    }

    fn receiver(&self, frames: Sender<IpmiMessage>) {
        while !self.shutdown.load(Ordering::Acquire) {
            let (is_working, is_initialized) = {
                let state = self.state.lock();
                (state.is_working, state.is_initialized)
            };

            if !is_working {
                thread::sleep(self.config.idle_interval);
                continue;
            }

            if !is_initialized {
                let connected = {
                    let mut state = self.state.lock();
                    state.is_initialized || self.connect(&mut state)
                };

                if !connected {
                    thread::sleep(self.config.reconnect_interval);
                }
                continue;
            }

            if let Some(message) = self.slave_read() {
                if frames.send(message).is_err() {
                    break;
                }
            }
        }

        log::trace!("Receiver thread exiting");
    }

    fn worker(&self, frames: Receiver<IpmiMessage>) {
        for message in frames {
            Logger::log(&LogOutput::Log(log::Level::Trace), &message);

            if message.is_request() {
                self.serve(&message);
            } else {
                self.deliver(&message);
            }
        }

        log::trace!("Worker thread exiting");
    }
}

/// A node on the IPMB, reached through the MUX.
///
/// States go `Uninitialized -> Initialized -> Working -> Initialized ->
/// Uninitialized`: [`IpmbService::stop`] does not deinitialize and
/// [`IpmbService::deinit`] refuses while working. The receiver and worker
/// threads are spawned by the first [`IpmbService::init`] and live until the
/// service is dropped.
pub struct IpmbService<C: Connector + 'static> {
    shared: Arc<Shared<C>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl IpmbService<TcpConnector> {
    /// A service talking to the TCP MUX described by `config`, knowing the
    /// commands of [`Dispatcher::with_default_commands`].
    pub fn with_config(config: IpmbConfig) -> Self {
        Self::new(
            config.connector(),
            Arc::new(Dispatcher::with_default_commands()),
            config,
        )
    }
}

impl<C: Connector + 'static> IpmbService<C> {
    pub fn new(connector: C, dispatcher: Arc<Dispatcher>, config: IpmbConfig) -> Self {
        let state = State {
            is_initialized: false,
            is_working: false,
            port: config.mux_port,
            server_failure_logged: false,
            client_failure_logged: false,
        };

        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                dispatcher,
                state: Mutex::new(state),
                connection: Mutex::new(None),
                client_lock: Mutex::new(()),
                shutdown: AtomicBool::new(false),
            }),
            threads: Mutex::new(Vec::new()),
        }
    }

    fn spawn_threads(&self) {
        let mut threads = self.threads.lock();
        if !threads.is_empty() {
            return;
        }

        let (sender, receiver) = mpsc::channel();

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("ipmb-receiver".into())
            .spawn(move || shared.receiver(sender));
        match spawned {
            Ok(handle) => threads.push(handle),
            Err(e) => log::error!("Cannot spawn the receiver thread: {e}"),
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("ipmb-worker".into())
            .spawn(move || shared.worker(receiver));
        match spawned {
            Ok(handle) => threads.push(handle),
            Err(e) => log::error!("Cannot spawn the worker thread: {e}"),
        }
    }

    /// Connect the responder connection to the MUX on `port`.
    ///
    /// Returns `false` if already initialized or if connecting fails; the
    /// receiver thread retries while the service is working.
    pub fn init(&self, port: u16) -> bool {
        let mut state = self.shared.state.lock();
        if state.is_initialized {
            return false;
        }

        state.port = port;
        self.spawn_threads();
        self.shared.connect(&mut state)
    }

    /// Close the responder connection. Refused while working.
    pub fn deinit(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.is_working {
            return false;
        }

        if let Some(mut connection) = self.shared.connection.lock().take() {
            connection.close();
        }
        state.is_initialized = false;

        true
    }

    pub fn start(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.is_working {
            return false;
        }
        state.is_working = true;
        true
    }

    pub fn stop(&self) -> bool {
        let mut state = self.shared.state.lock();
        if !state.is_working {
            return false;
        }
        state.is_working = false;
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.state.lock().is_initialized
    }

    pub fn is_working(&self) -> bool {
        self.shared.state.lock().is_working
    }

    /// Read one frame from the responder connection.
    ///
    /// `None` covers an empty read, a timeout and a dropped frame (malformed
    /// or failing its checksums), none of which affect the connection. Any
    /// other error closes it and clears [`IpmbService::is_initialized`].
    pub fn slave_read(&self) -> Option<IpmiMessage> {
        self.shared.slave_read()
    }

    /// Write `message` as the master.
    ///
    /// A request is exchanged on a private client connection and its reply is
    /// decoded and logged on the calling thread. A response is written on the
    /// responder connection.
    pub fn master_write(&self, message: &IpmiMessage) -> bool {
        if !message.is_request() {
            return self.shared.write_persistent(message);
        }

        match self.shared.master_request(message) {
            Ok(reply) => {
                self.shared.deliver(&reply);
                true
            }
            Err(e) => {
                log::debug!("Request 0x{:02X} to 0x{:02X} failed: {e}", message.cmd(), message.dest_addr());
                false
            }
        }
    }

    /// The synchronous exchange behind [`IpmbService::master_write`] for requests.
    pub fn master_request(&self, message: &IpmiMessage) -> Result<IpmiMessage, SendError> {
        self.shared.master_request(message)
    }

    #[cfg(test)]
    pub(crate) fn thread_count(&self) -> usize {
        self.threads.lock().len()
    }

    /// Whether a responder and a client failure streak has been logged.
    #[cfg(test)]
    pub(crate) fn failures_logged(&self) -> (bool, bool) {
        let state = self.shared.state.lock();
        (state.server_failure_logged, state.client_failure_logged)
    }
}

impl<C: Connector + 'static> Drop for IpmbService<C> {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);

        for handle in self.threads.lock().drain(..) {
            if handle.join().is_err() {
                log::error!("An IPMB service thread panicked");
            }
        }

        if let Some(mut connection) = self.shared.connection.lock().take() {
            connection.close();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::{
        mock::{eventually, reply_frame, test_config, MockConnector, Reply},
        LogicalUnit, NetFn, MAX_DATA_LEN,
    };

    const PORT: u16 = 5623;

    fn service(mux: &MockConnector, dispatcher: Dispatcher) -> IpmbService<MockConnector> {
        IpmbService::new(mux.clone(), Arc::new(dispatcher), test_config())
    }

    #[test]
    fn init_is_idempotent() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());

        assert!(service.init(PORT));
        assert!(!service.init(PORT));

        assert!(service.is_initialized());
        assert_eq!(service.thread_count(), 2);
        assert_eq!(mux.script().connects, vec![Role::Responder]);
    }

    #[test]
    fn failed_init_can_be_retried() {
        let mux = MockConnector::default();
        mux.script().refuse = true;

        let service = service(&mux, Dispatcher::new());
        assert!(!service.init(PORT));
        assert!(!service.init(PORT));
        assert!(!service.is_initialized());

        mux.script().refuse = false;
        assert!(service.init(PORT));
        assert!(service.is_initialized());
        assert_eq!(service.thread_count(), 2);
    }

    #[test]
    fn start_and_stop_are_guarded() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());

        assert!(service.start());
        assert!(!service.start());
        assert!(service.is_working());

        assert!(service.stop());
        assert!(!service.stop());
        assert!(!service.is_working());
    }

    #[test]
    fn deinit_refused_while_working() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());

        assert!(service.init(PORT));
        assert!(service.start());

        assert!(!service.deinit());
        assert!(service.is_initialized());
        assert_eq!(mux.script().closes, 0);

        assert!(service.stop());
        assert!(service.deinit());
        assert!(!service.is_initialized());
        assert_eq!(mux.script().closes, 1);
    }

    #[test]
    fn timeouts_keep_the_connection() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());
        assert!(service.init(PORT));

        mux.script().responder.push_back(Reply::TimedOut);
        assert!(service.slave_read().is_none());
        assert!(service.is_initialized());

        mux.script().responder.push_back(Reply::Empty);
        assert!(service.slave_read().is_none());
        assert!(service.is_initialized());
        assert_eq!(mux.script().closes, 0);
    }

    #[test]
    fn io_errors_drop_the_connection() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());
        assert!(service.init(PORT));

        mux.script().responder.push_back(Reply::Broken);
        assert!(service.slave_read().is_none());
        assert!(!service.is_initialized());
        assert_eq!(mux.script().closes, 1);

        assert!(service.init(PORT));
    }

    #[test]
    fn bad_frames_are_dropped() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());
        assert!(service.init(PORT));

        let good = reply_frame(NetFn::App, 5, 0x01, vec![0x00]);
        let mut corrupt = good.clone();
        corrupt[2] ^= 0x10;

        {
            let mut script = mux.script();
            script.responder.push_back(Reply::Frame(corrupt));
            script.responder.push_back(Reply::Frame(vec![0x20, 0x18]));
            script.responder.push_back(Reply::Frame(good.clone()));
        }

        assert!(service.slave_read().is_none());
        assert!(service.slave_read().is_none());
        assert!(service.is_initialized());

        let message = service.slave_read().unwrap();
        assert_eq!(message.to_wire_buffer(), good);
    }

    #[test]
    fn master_write_request_uses_a_client_connection() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::with_default_commands());
        assert!(service.init(PORT));

        let request = IpmiMessage::new_request(0x20, LogicalUnit::Zero, 0x24, LogicalUnit::Zero, NetFn::App, 1, 0x37, vec![]);
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[0xAB; 16]);
        mux.script()
            .client
            .push_back(Reply::Frame(IpmiMessage::response_to(&request, payload).to_wire_buffer()));

        assert!(service.master_write(&request));

        assert_eq!(mux.sent_by(Role::Client), vec![request.to_wire_buffer()]);
        assert!(mux.sent_by(Role::Responder).is_empty());
        assert_eq!(mux.script().connects, vec![Role::Responder, Role::Client]);

        mux.script().client.push_back(Reply::Empty);
        assert!(!service.master_write(&request));
        assert!(service.is_initialized());
    }

    #[test]
    fn master_write_response_uses_the_responder_connection() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());

        let request = IpmiMessage::new_request(0x24, LogicalUnit::Zero, 0x20, LogicalUnit::Zero, NetFn::App, 4, 0x01, vec![]);
        let response = IpmiMessage::response_to(&request, vec![0x00]);

        assert!(!service.master_write(&response));

        assert!(service.init(PORT));
        assert!(service.master_write(&response));
        assert_eq!(mux.sent_by(Role::Responder), vec![response.to_wire_buffer()]);
    }

    #[test]
    fn worker_answers_inbound_requests() {
        let mux = MockConnector::default();

        let mut dispatcher = Dispatcher::new();
        dispatcher.register_handler(NetFn::App, 0x01, |_| vec![0x00, 0x20]);
        let service = service(&mux, dispatcher);

        let request = IpmiMessage::new_request(0x24, LogicalUnit::Zero, 0x20, LogicalUnit::Zero, NetFn::App, 9, 0x01, vec![]);
        mux.script()
            .responder
            .push_back(Reply::Frame(request.to_wire_buffer()));

        assert!(service.init(PORT));
        assert!(service.start());

        let expected = IpmiMessage::response_to(&request, vec![0x00, 0x20]).to_wire_buffer();
        assert!(eventually(|| mux.sent_by(Role::Responder) == vec![expected.clone()]));

        assert!(service.stop());
    }

    #[test]
    fn receiver_reconnects_while_working() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());
        assert!(service.init(PORT));

        mux.script().responder.push_back(Reply::Broken);
        assert!(service.start());

        assert!(eventually(|| {
            let connects = mux.script().connects.len();
            connects >= 2 && service.is_initialized()
        }));
        assert!(service.stop());
    }

    #[test]
    fn full_size_frames_are_read_whole() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());
        assert!(service.init(PORT));

        let mut payload = vec![0x00];
        payload.resize(MAX_DATA_LEN, 0x5A);
        let frame = reply_frame(NetFn::Oem, 7, 0x01, payload);
        assert_eq!(frame.len(), MAX_FRAME_LEN);

        mux.script().responder.push_back(Reply::Frame(frame.clone()));

        let message = service.slave_read().unwrap();
        assert_eq!(message.to_wire_buffer(), frame);
        assert!(mux.script().responder.is_empty());
    }

    #[test]
    fn connect_failures_are_logged_once_per_streak() {
        let mux = MockConnector::default();
        mux.script().refuse = true;
        let service = service(&mux, Dispatcher::new());

        assert_eq!(service.failures_logged(), (false, false));

        assert!(!service.init(PORT));
        assert_eq!(service.failures_logged(), (true, false));

        assert!(!service.init(PORT));
        assert_eq!(service.failures_logged(), (true, false));

        mux.script().refuse = false;
        assert!(service.init(PORT));
        assert_eq!(service.failures_logged(), (false, false));

        mux.script().responder.push_back(Reply::Broken);
        assert!(service.slave_read().is_none());
        assert_eq!(service.failures_logged(), (true, false));

        assert!(service.init(PORT));
        assert_eq!(service.failures_logged(), (false, false));
    }

    #[test]
    fn client_failures_are_logged_once_per_streak() {
        let mux = MockConnector::default();
        let service = service(&mux, Dispatcher::new());
        assert!(service.init(PORT));

        let request = IpmiMessage::new_request(0x20, LogicalUnit::Zero, 0x24, LogicalUnit::Zero, NetFn::App, 2, 0x01, vec![]);

        mux.script().refuse = true;
        assert!(matches!(service.master_request(&request), Err(SendError::Transport(_))));
        assert_eq!(service.failures_logged(), (false, true));

        assert!(matches!(service.master_request(&request), Err(SendError::Transport(_))));
        assert_eq!(service.failures_logged(), (false, true));

        mux.script().refuse = false;
        mux.script().client.push_back(Reply::Broken);
        assert!(matches!(service.master_request(&request), Err(SendError::Transport(_))));
        assert_eq!(service.failures_logged(), (false, true));

        mux.script()
            .client
            .push_back(Reply::Frame(IpmiMessage::response_to(&request, vec![0x00]).to_wire_buffer()));
        assert!(service.master_request(&request).is_ok());
        assert_eq!(service.failures_logged(), (false, false));

        mux.script().client.push_back(Reply::Empty);
        assert!(matches!(service.master_request(&request), Err(SendError::Timeout)));
        assert_eq!(service.failures_logged(), (false, false));
        assert!(service.is_initialized());
    }
}
