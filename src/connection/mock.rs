//! A scripted MUX for controller and service tests.

use std::{
    collections::VecDeque,
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, MutexGuard};

use crate::IpmbConfig;

use super::{Connector, IpmiMessage, MuxConnection, MuxError, NetFn, Role};

/// What a scripted connection returns from one `recv`.
#[derive(Debug)]
pub(crate) enum Reply {
    Frame(Vec<u8>),
    Empty,
    TimedOut,
    Broken,
}

#[derive(Debug, Default)]
pub(crate) struct Script {
    pub responder: VecDeque<Reply>,
    pub client: VecDeque<Reply>,
    pub sent: Vec<(Role, Vec<u8>)>,
    pub connects: Vec<Role>,
    pub closes: usize,
    pub refuse: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MockConnector(Arc<Mutex<Script>>);

impl MockConnector {
    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.0.lock()
    }

    pub fn sent_by(&self, role: Role) -> Vec<Vec<u8>> {
        self.script()
            .sent
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, frame)| frame.clone())
            .collect()
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    fn connect(&self, _: u16, role: Role) -> Result<MockConnection, MuxError> {
        let mut script = self.script();
        script.connects.push(role);

        if script.refuse {
            return Err(MuxError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }

        Ok(MockConnection {
            role,
            script: self.0.clone(),
            open: true,
        })
    }
}

pub(crate) struct MockConnection {
    role: Role,
    script: Arc<Mutex<Script>>,
    open: bool,
}

impl MuxConnection for MockConnection {
    fn send(&mut self, buffer: &[u8]) -> Result<(), MuxError> {
        if !self.open {
            return Err(MuxError::Closed);
        }

        self.script.lock().sent.push((self.role, buffer.to_vec()));
        Ok(())
    }

    /// Frames longer than `max_len` are split like a byte stream would: the
    /// tail is returned by the next `recv`.
    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, MuxError> {
        if !self.open {
            return Err(MuxError::Closed);
        }

        let reply = {
            let mut script = self.script.lock();
            let queue = match self.role {
                Role::Client => &mut script.client,
                Role::Responder => &mut script.responder,
            };

            match queue.pop_front() {
                Some(Reply::Frame(mut frame)) if frame.len() > max_len => {
                    let tail = frame.split_off(max_len);
                    queue.push_front(Reply::Frame(tail));
                    Some(Reply::Frame(frame))
                }
                other => other,
            }
        };

        match reply {
            Some(Reply::Frame(frame)) => Ok(frame),
            Some(Reply::Empty) => Ok(Vec::new()),
            Some(Reply::TimedOut) => Err(MuxError::TimedOut),
            Some(Reply::Broken) => Err(MuxError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "reset",
            ))),
            None => {
                std::thread::sleep(Duration::from_millis(1));
                Err(MuxError::TimedOut)
            }
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.script.lock().closes += 1;
        }
    }
}

pub(crate) fn test_config() -> IpmbConfig {
    IpmbConfig {
        idle_interval: Duration::from_millis(2),
        reconnect_interval: Duration::from_millis(2),
        ..Default::default()
    }
}

/// The request a controller built with [`test_config`] sends.
pub(crate) fn expected_request(netfn: NetFn, seq: u8, cmd: u8, data: Vec<u8>) -> IpmiMessage {
    let config = test_config();
    IpmiMessage::new_request(
        config.target_address.0,
        config.target_lun,
        config.own_address.0,
        config.own_lun,
        netfn,
        seq,
        cmd,
        data,
    )
}

pub(crate) fn reply_frame(netfn: NetFn, seq: u8, cmd: u8, data: Vec<u8>) -> Vec<u8> {
    let request = expected_request(netfn, seq, cmd, Vec::new());
    IpmiMessage::response_to(&request, data).to_wire_buffer()
}

/// Poll `condition` for up to a second.
pub(crate) fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}
