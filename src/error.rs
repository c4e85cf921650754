use crate::connection::{
    ChecksumError, CompletionCode, FrameError, MuxError, NetFn, UnpackError,
};

/// Errors of a synchronous request/response exchange.
///
/// None of these are retried by the library.
#[derive(Debug)]
pub enum SendError {
    /// No reply arrived within the read window.
    Timeout,
    /// The connection to the MUX failed.
    Transport(MuxError),
    /// The request payload does not fit a frame, or the reply is not a frame.
    Frame(FrameError),
    ChecksumMismatch(ChecksumError),
    /// The reply does not answer the request that was sent.
    UnexpectedResponse {
        netfn_sent: u8,
        netfn_recvd: u8,
        cmd_sent: u8,
        cmd_recvd: u8,
        seq_sent: u8,
        seq_recvd: u8,
    },
    ShortResponse {
        command: &'static str,
        expected: usize,
        received: usize,
    },
    InvalidResponse {
        command: &'static str,
        reason: &'static str,
    },
    /// No response type is known for the command.
    UnknownCommand { netfn: NetFn, cmd: u8 },
    /// The controller executed the command and reported an error.
    Failed {
        command: &'static str,
        completion_code: CompletionCode,
    },
}

impl SendError {
    pub(crate) fn unpack(command: &'static str, error: UnpackError) -> Self {
        match error {
            UnpackError::TooShort { expected, received } => Self::ShortResponse {
                command,
                expected,
                received,
            },
            UnpackError::Invalid(reason) => Self::InvalidResponse { command, reason },
        }
    }

    /// Whether this error means the link itself is broken, as opposed to a
    /// single bad exchange.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<MuxError> for SendError {
    fn from(value: MuxError) -> Self {
        match value {
            MuxError::TimedOut => Self::Timeout,
            e => Self::Transport(e),
        }
    }
}

impl From<FrameError> for SendError {
    fn from(value: FrameError) -> Self {
        Self::Frame(value)
    }
}

impl From<ChecksumError> for SendError {
    fn from(value: ChecksumError) -> Self {
        Self::ChecksumMismatch(value)
    }
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SendError::Timeout => write!(f, "timed out waiting for a response"),
            SendError::Transport(e) => write!(f, "transport error: {e:?}"),
            SendError::Frame(e) => write!(f, "malformed frame: {e:?}"),
            SendError::ChecksumMismatch(e) => write!(f, "checksum mismatch: {e:?}"),
            SendError::UnexpectedResponse {
                netfn_sent,
                netfn_recvd,
                cmd_sent,
                cmd_recvd,
                seq_sent,
                seq_recvd,
            } => write!(
                f,
                "unexpected response: sent netfn 0x{netfn_sent:02X} cmd 0x{cmd_sent:02X} seq {seq_sent}, \
                 received netfn 0x{netfn_recvd:02X} cmd 0x{cmd_recvd:02X} seq {seq_recvd}"
            ),
            SendError::ShortResponse {
                command,
                expected,
                received,
            } => write!(
                f,
                "{command}: wrong length of the response, expected {expected} received {received}"
            ),
            SendError::InvalidResponse { command, reason } => write!(f, "{command}: {reason}"),
            SendError::UnknownCommand { netfn, cmd } => {
                write!(f, "no response registered for {netfn:?} command 0x{cmd:02X}")
            }
            SendError::Failed {
                command,
                completion_code,
            } => write!(f, "{command} failed: {completion_code}"),
        }
    }
}

impl std::error::Error for SendError {}
