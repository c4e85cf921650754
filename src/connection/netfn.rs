/// The network function of an IPMI message.
///
/// Request NetFns are even; the paired response NetFn is the request value
/// with the lowest bit set. In the shifted `netfn | lun` wire byte this is the
/// [`NETFN_RESPONSE_BIT`](super::NETFN_RESPONSE_BIT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetFn {
    Chassis,
    Bridge,
    SensorEvent,
    App,
    Firmware,
    Storage,
    Transport,
    GroupExtension,
    Oem,
    Intel,
    Unknown(u8),
}

impl From<u8> for NetFn {
    fn from(value: u8) -> Self {
        match value & !1 {
            0x00 => Self::Chassis,
            0x02 => Self::Bridge,
            0x04 => Self::SensorEvent,
            0x06 => Self::App,
            0x08 => Self::Firmware,
            0x0A => Self::Storage,
            0x0C => Self::Transport,
            0x2C => Self::GroupExtension,
            0x30 => Self::Oem,
            0x38 => Self::Intel,
            _ => Self::Unknown(value & !1),
        }
    }
}

impl NetFn {
    pub const fn request_value(&self) -> u8 {
        match self {
            NetFn::Chassis => 0x00,
            NetFn::Bridge => 0x02,
            NetFn::SensorEvent => 0x04,
            NetFn::App => 0x06,
            NetFn::Firmware => 0x08,
            NetFn::Storage => 0x0A,
            NetFn::Transport => 0x0C,
            NetFn::GroupExtension => 0x2C,
            NetFn::Oem => 0x30,
            NetFn::Intel => 0x38,
            NetFn::Unknown(v) => *v & !1,
        }
    }

    pub const fn response_value(&self) -> u8 {
        self.request_value() | 1
    }

    /// Whether a raw NetFn value denotes a response.
    pub const fn is_response_value(value: u8) -> bool {
        value & 1 == 1
    }
}

#[test]
fn response_values_pair_with_requests() {
    let all = [
        NetFn::Chassis,
        NetFn::Bridge,
        NetFn::App,
        NetFn::Transport,
        NetFn::GroupExtension,
        NetFn::Oem,
        NetFn::Intel,
    ];

    for netfn in all {
        let req = netfn.request_value();
        let resp = netfn.response_value();

        assert_eq!(req + 1, resp);
        assert_eq!(NetFn::from(req), netfn);
        assert_eq!(NetFn::from(resp), netfn);
        assert!(!NetFn::is_response_value(req));
        assert!(NetFn::is_response_value(resp));
        assert_eq!((req << 2) | super::NETFN_RESPONSE_BIT, resp << 2);
    }

    assert_eq!(NetFn::Intel.response_value(), 0x39);
    assert_eq!(NetFn::from(0x13), NetFn::Unknown(0x12));
}
