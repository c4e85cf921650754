//! Bounds-checked reads and writes of multi-byte integers in raw byte buffers.
//!
//! Every accessor takes an offset into the buffer and fails with [`OutOfBounds`]
//! instead of panicking when the buffer is too short.

/// An access that did not fit inside the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Offset of the first byte of the access.
    pub offset: usize,
    /// Width of the access in bytes.
    pub width: usize,
    /// Length of the buffer that was accessed.
    pub len: usize,
}

fn window<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], OutOfBounds> {
    let err = OutOfBounds {
        offset,
        width: N,
        len: buf.len(),
    };

    let end = offset.checked_add(N).ok_or(err)?;
    let bytes = buf.get(offset..end).ok_or(err)?;

    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

fn window_mut<const N: usize>(
    buf: &mut [u8],
    offset: usize,
) -> Result<&mut [u8], OutOfBounds> {
    let len = buf.len();
    let err = OutOfBounds {
        offset,
        width: N,
        len,
    };

    let end = offset.checked_add(N).ok_or(err)?;
    buf.get_mut(offset..end).ok_or(err)
}

/// Read a single byte.
pub fn get_u8(buf: &[u8], offset: usize) -> Result<u8, OutOfBounds> {
    window::<1>(buf, offset).map(|[v]| v)
}

/// Write a single byte.
pub fn put_u8(buf: &mut [u8], offset: usize, value: u8) -> Result<(), OutOfBounds> {
    window_mut::<1>(buf, offset)?[0] = value;
    Ok(())
}

macro_rules! accessors {
    ($($get:ident, $put:ident, $ty:ty, $width:literal, $from:ident, $to:ident;)*) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` (", stringify!($width), " bytes, ", stringify!($from), ").")]
            pub fn $get(buf: &[u8], offset: usize) -> Result<$ty, OutOfBounds> {
                window::<$width>(buf, offset).map(<$ty>::$from)
            }

            #[doc = concat!("Write a `", stringify!($ty), "` (", stringify!($width), " bytes, ", stringify!($to), ").")]
            pub fn $put(buf: &mut [u8], offset: usize, value: $ty) -> Result<(), OutOfBounds> {
                window_mut::<$width>(buf, offset)?.copy_from_slice(&value.$to());
                Ok(())
            }
        )*
    };
}

accessors! {
    get_u16_le, put_u16_le, u16, 2, from_le_bytes, to_le_bytes;
    get_u16_be, put_u16_be, u16, 2, from_be_bytes, to_be_bytes;
    get_u32_le, put_u32_le, u32, 4, from_le_bytes, to_le_bytes;
    get_u32_be, put_u32_be, u32, 4, from_be_bytes, to_be_bytes;
    get_u64_le, put_u64_le, u64, 8, from_le_bytes, to_le_bytes;
    get_u64_be, put_u64_be, u64, 8, from_be_bytes, to_be_bytes;
}

/// Read a 48-bit little-endian integer.
pub fn get_u48_le(buf: &[u8], offset: usize) -> Result<u64, OutOfBounds> {
    let [a, b, c, d, e, f] = window::<6>(buf, offset)?;
    Ok(u64::from_le_bytes([a, b, c, d, e, f, 0, 0]))
}

/// Read a 48-bit big-endian integer.
pub fn get_u48_be(buf: &[u8], offset: usize) -> Result<u64, OutOfBounds> {
    let [a, b, c, d, e, f] = window::<6>(buf, offset)?;
    Ok(u64::from_be_bytes([0, 0, a, b, c, d, e, f]))
}

/// Write the low 48 bits of `value`, little-endian.
pub fn put_u48_le(buf: &mut [u8], offset: usize, value: u64) -> Result<(), OutOfBounds> {
    window_mut::<6>(buf, offset)?.copy_from_slice(&value.to_le_bytes()[..6]);
    Ok(())
}

/// Write the low 48 bits of `value`, big-endian.
pub fn put_u48_be(buf: &mut [u8], offset: usize, value: u64) -> Result<(), OutOfBounds> {
    window_mut::<6>(buf, offset)?.copy_from_slice(&value.to_be_bytes()[2..]);
    Ok(())
}

/// Read `N` raw bytes.
pub fn get_array<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], OutOfBounds> {
    window::<N>(buf, offset)
}

#[test]
fn mixed_endian_reads() {
    let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    assert_eq!(get_u16_le(&data, 0), Ok(0x0201));
    assert_eq!(get_u16_be(&data, 0), Ok(0x0102));
    assert_eq!(get_u32_le(&data, 4), Ok(0x08070605));
    assert_eq!(get_u32_be(&data, 4), Ok(0x05060708));
    assert_eq!(get_u48_le(&data, 2), Ok(0x080706050403));
    assert_eq!(get_u48_be(&data, 2), Ok(0x030405060708));
    assert_eq!(get_u64_be(&data, 0), Ok(0x0102030405060708));
}

#[test]
fn short_input_is_an_error() {
    let data = [0xAA, 0xBB, 0xCC];

    assert_eq!(
        get_u32_le(&data, 0),
        Err(OutOfBounds {
            offset: 0,
            width: 4,
            len: 3
        })
    );
    assert!(get_u16_be(&data, 2).is_err());
    assert!(get_u8(&data, 3).is_err());
    assert!(get_u8(&data, usize::MAX).is_err());
}

#[test]
fn writes_land_at_offset() {
    let mut data = [0u8; 8];

    put_u16_le(&mut data, 0, 0x1234).unwrap();
    put_u48_be(&mut data, 2, 0xA1A2A3A4A5A6).unwrap();

    assert_eq!(data, [0x34, 0x12, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6]);
    assert!(put_u32_be(&mut data, 6, 0).is_err());
    assert!(put_u8(&mut data, 7, 0xFF).is_ok());
}
