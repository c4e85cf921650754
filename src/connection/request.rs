use super::NetFn;

/// The request half of an IPMI command.
///
/// Implementors only produce the command-specific payload; addressing,
/// sequencing and checksums are added by [`IpmiMessage`](super::IpmiMessage).
pub trait Request {
    /// The request NetFn of this command.
    fn netfn(&self) -> NetFn;

    fn cmd(&self) -> u8;

    /// Append the command-specific payload to `out`.
    fn pack(&self, out: &mut Vec<u8>);

    fn command_name(&self) -> &'static str;
}
