/// Running IPMB checksum: the two's complement of the byte sum, modulo 256.
///
/// A checksummed span followed by its checksum byte always sums to zero.
pub struct Checksum {
    state: u8,
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

impl Checksum {
    pub fn new() -> Self {
        Self { state: 0 }
    }

    pub fn from_iter(data: impl IntoIterator<Item = u8>) -> u8 {
        let mut me = Self::default();

        data.into_iter().for_each(|v| me.feed(v));

        me.finalize()
    }

    pub fn feed(&mut self, data: u8) {
        self.state = self.state.wrapping_add(data);
    }

    pub fn feed_all(&mut self, data: &[u8]) {
        data.iter().for_each(|v| self.feed(*v));
    }

    pub fn finalize(&self) -> u8 {
        0u8.wrapping_sub(self.state)
    }
}

/// Checksum over the first `len` bytes of `buffer`.
///
/// `len` is clamped to the length of `buffer`.
pub fn ipmi_checksum(buffer: &[u8], len: usize) -> u8 {
    Checksum::from_iter(buffer.iter().take(len).copied())
}

#[test]
pub fn checksum_test() {
    let output = Checksum::from_iter([0x20, 0x06 << 2]);

    assert_eq!(0xC8, output);
    assert_eq!(0xC8, ipmi_checksum(&[0x20, 0x18], 2));
}

#[test]
pub fn checksum_closes_span() {
    let span = [0x81, 0x04, 0x01, 0xDE, 0xAD];
    let checksum = ipmi_checksum(&span, span.len());

    let total = span
        .iter()
        .fold(checksum, |acc: u8, v| acc.wrapping_add(*v));

    assert_eq!(total, 0);
    assert_eq!(ipmi_checksum(&span, 100), checksum);
    assert_eq!(ipmi_checksum(&span, 0), 0);
}
