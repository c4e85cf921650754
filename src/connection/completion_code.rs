#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseUnavailableReason {
    Unknown,
    SDRInUpdate,
    DeviceInFwUpdate,
    BMCInitializing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CompletionErrorCode {
    NodeBusy,
    InvalidCommand,
    InvalidCommandForLun,
    ProcessingTimeout,
    OutOfSpace,
    ReservationCancelledOrInvalidId,
    RequestDataTruncated,
    RequestDataLenInvalid,
    RequestDataLengthLimitExceeded,
    ParameterOutOfRange,
    CannotReturnNumOfRequestedBytes,
    RequestedDatapointNotPresent,
    InvalidDataFieldInRequest,
    CommandIllegalForSensorOrRecord,
    ResponseUnavailable { reason: ResponseUnavailableReason },
    CannotExecuteDuplicateRequest,
    DestinationUnavailable,
    InsufficientPrivilege,
    CannotExecuteCommandInCurrentState,
    SubFunctionDisabled,
    Unspecified,
    Oem(u8),
    CommandSpecific(u8),
    Reserved(u8),
}

impl TryFrom<u8> for CompletionErrorCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let value = match value {
            0 => return Err(()),
            0xC0 => Self::NodeBusy,
            0xC1 => Self::InvalidCommand,
            0xC2 => Self::InvalidCommandForLun,
            0xC3 => Self::ProcessingTimeout,
            0xC4 => Self::OutOfSpace,
            0xC5 => Self::ReservationCancelledOrInvalidId,
            0xC6 => Self::RequestDataTruncated,
            0xC7 => Self::RequestDataLenInvalid,
            0xC8 => Self::RequestDataLengthLimitExceeded,
            0xC9 => Self::ParameterOutOfRange,
            0xCA => Self::CannotReturnNumOfRequestedBytes,
            0xCB => Self::RequestedDatapointNotPresent,
            0xCC => Self::InvalidDataFieldInRequest,
            0xCD => Self::CommandIllegalForSensorOrRecord,
            0xCE => Self::ResponseUnavailable {
                reason: ResponseUnavailableReason::Unknown,
            },
            0xCF => Self::CannotExecuteDuplicateRequest,
            0xD0 => Self::ResponseUnavailable {
                reason: ResponseUnavailableReason::SDRInUpdate,
            },
            0xD1 => Self::ResponseUnavailable {
                reason: ResponseUnavailableReason::DeviceInFwUpdate,
            },
            0xD2 => Self::ResponseUnavailable {
                reason: ResponseUnavailableReason::BMCInitializing,
            },
            0xD3 => Self::DestinationUnavailable,
            0xD4 => Self::InsufficientPrivilege,
            0xD5 => Self::CannotExecuteCommandInCurrentState,
            0xD6 => Self::SubFunctionDisabled,
            0xFF => Self::Unspecified,
            0x01..=0x7E => Self::Oem(value),
            0x80..=0xBE => Self::CommandSpecific(value),
            v => Self::Reserved(v),
        };

        Ok(value)
    }
}

impl CompletionErrorCode {
    /// Whether this completion code is a reserved value or not.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }
}

/// The raw completion code carried in the first byte of every response payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CompletionCode(u8);

impl CompletionCode {
    pub const NORMAL: Self = Self(0x00);
    pub const NODE_BUSY: Self = Self(0xC0);
    pub const INVALID_COMMAND: Self = Self(0xC1);
    pub const TIMEOUT: Self = Self(0xC3);
    pub const REQUEST_DATA_TRUNCATED: Self = Self(0xC6);
    pub const PARAMETER_OUT_OF_RANGE: Self = Self(0xC9);
    pub const INVALID_DATA_FIELD: Self = Self(0xCC);
    pub const DESTINATION_UNAVAILABLE: Self = Self(0xD3);
    pub const UNSPECIFIED: Self = Self(0xFF);

    // Command-specific codes shared by the configuration-parameter style commands.
    pub const PARAMETER_NOT_SUPPORTED: Self = Self(0x80);
    pub const SET_IN_PROGRESS: Self = Self(0x81);
    pub const READ_ONLY: Self = Self(0x82);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }

    pub const fn is_success(&self) -> bool {
        self.0 == Self::NORMAL.0
    }

    /// The decoded error, or `None` for [`CompletionCode::NORMAL`].
    pub fn error(&self) -> Option<CompletionErrorCode> {
        CompletionErrorCode::try_from(self.0).ok()
    }

    pub fn description(&self) -> &'static str {
        use CompletionErrorCode::*;

        let error = match self.error() {
            Some(e) => e,
            None => return "Command completed normally",
        };

        match error {
            NodeBusy => "Node Busy",
            InvalidCommand => "Invalid Command",
            InvalidCommandForLun => "Command invalid for given LUN",
            ProcessingTimeout => "Timeout while processing command",
            OutOfSpace => "Out of space",
            ReservationCancelledOrInvalidId => "Reservation canceled or invalid reservation ID",
            RequestDataTruncated => "Request data truncated",
            RequestDataLenInvalid => "Request data length invalid",
            RequestDataLengthLimitExceeded => "Request data field length limit exceeded",
            ParameterOutOfRange => "Parameter out of range",
            CannotReturnNumOfRequestedBytes => "Cannot return number of requested data bytes",
            RequestedDatapointNotPresent => "Requested sensor, data or record not present",
            InvalidDataFieldInRequest => "Invalid data field in Request",
            CommandIllegalForSensorOrRecord => "Command illegal for specified sensor or record",
            ResponseUnavailable { .. } => "Command response could not be provided",
            CannotExecuteDuplicateRequest => "Cannot execute duplicated request",
            DestinationUnavailable => "Destination unavailable",
            InsufficientPrivilege => "Insufficient privilege level",
            CannotExecuteCommandInCurrentState => "Command not supported in present state",
            SubFunctionDisabled => "Command sub-function disabled or unavailable",
            Unspecified => "Unspecified error",
            Oem(_) => "OEM error",
            CommandSpecific(0x80) => "Parameter not supported",
            CommandSpecific(0x81) => "Set in progress",
            CommandSpecific(0x82) => "Parameter is read-only",
            CommandSpecific(_) => "Command-specific error",
            Reserved(_) => "Reserved completion code",
        }
    }
}

impl From<u8> for CompletionCode {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<CompletionCode> for u8 {
    fn from(value: CompletionCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:02X} ({})", self.0, self.description())
    }
}

#[test]
fn completion_code_classes() {
    assert!(CompletionCode::NORMAL.is_success());
    assert_eq!(CompletionCode::NORMAL.error(), None);

    assert_eq!(
        CompletionCode::from(0xC0).error(),
        Some(CompletionErrorCode::NodeBusy)
    );
    assert_eq!(
        CompletionCode::from(0xD3).error(),
        Some(CompletionErrorCode::DestinationUnavailable)
    );
    assert_eq!(
        CompletionCode::SET_IN_PROGRESS.error(),
        Some(CompletionErrorCode::CommandSpecific(0x81))
    );
    assert_eq!(CompletionCode::READ_ONLY.description(), "Parameter is read-only");
    assert!(CompletionCode::from(0xE0).error().unwrap().is_reserved());
}
