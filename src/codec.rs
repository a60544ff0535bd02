/// Big-endian integers, on-disk strings and packed dates
///
/// All multi-byte fields in the OS-9, RS-DOS and DragonDOS structures are
/// big-endian. The helpers take a slice and an offset so that record parsers
/// read like a table of field offsets.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Read a big-endian u16 at `offset`
#[inline]
pub fn u16_be(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Read a big-endian 24-bit value at `offset`
#[inline]
pub fn u24_be(data: &[u8], offset: usize) -> u32 {
    ((data[offset] as u32) << 16) | ((data[offset + 1] as u32) << 8) | data[offset + 2] as u32
}

/// Read a big-endian u32 at `offset`
#[inline]
pub fn u32_be(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Write a big-endian u16 at `offset`
#[inline]
pub fn put_u16_be(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Write the low 24 bits of `value` big-endian at `offset`
#[inline]
pub fn put_u24_be(data: &mut [u8], offset: usize, value: u32) {
    data[offset] = (value >> 16) as u8;
    data[offset + 1] = (value >> 8) as u8;
    data[offset + 2] = value as u8;
}

/// Write a big-endian u32 at `offset`
#[inline]
pub fn put_u32_be(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Decode a string terminated by a NUL byte or the end of the field
pub fn null_terminated(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Decode an OS-9 style string whose last character has bit 7 set
///
/// A NUL byte also ends the string, which covers names padded with zeros.
pub fn high_bit_terminated(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        if b == 0 {
            break;
        }
        out.push((b & 0x7F) as char);
        if b & 0x80 != 0 {
            break;
        }
    }
    out
}

/// Encode `text` into a `len` byte field with bit 7 set on the last character
///
/// Unused bytes are zero. An empty string encodes as all zeros.
pub fn encode_high_bit(text: &str, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let bytes: Vec<u8> = text.bytes().map(|b| b & 0x7F).take(len).collect();
    out[..bytes.len()].copy_from_slice(&bytes);
    if let Some(last) = bytes.len().checked_sub(1) {
        out[last] |= 0x80;
    }
    out
}

/// Encode `text` into a `len` byte field padded with `pad`
pub fn encode_padded(text: &str, len: usize, pad: u8) -> Vec<u8> {
    let mut out = vec![pad; len];
    for (slot, b) in out.iter_mut().zip(text.bytes()) {
        *slot = b;
    }
    out
}

/// True when every byte is printable 7-bit ASCII
pub fn is_printable_ascii(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (0x20..0x7F).contains(&b))
}

fn packed_date(year: u8, month: u8, day: u8) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1900 + year as i32, month as u32, day as u32)
        .or_else(|| NaiveDate::from_ymd_opt(2000 + year as i32, month as u32, day as u32))
}

/// Decode a 5-byte OS-9 timestamp (years since 1900, month, day, hour, minute)
///
/// Returns `None` for an impossible date.
pub fn decode_date_time(bytes: &[u8]) -> Option<NaiveDateTime> {
    if bytes.len() < 5 {
        return None;
    }
    packed_date(bytes[0], bytes[1], bytes[2])?.and_hms_opt(bytes[3] as u32, bytes[4] as u32, 0)
}

/// Encode a timestamp into the 5-byte OS-9 layout
pub fn encode_date_time(time: NaiveDateTime) -> [u8; 5] {
    [
        (time.year() - 1900) as u8,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
    ]
}

/// Decode a 3-byte OS-9 date (years since 1900, month, day)
pub fn decode_date(bytes: &[u8]) -> Option<NaiveDate> {
    if bytes.len() < 3 {
        return None;
    }
    packed_date(bytes[0], bytes[1], bytes[2])
}

/// Encode a date into the 3-byte OS-9 layout
pub fn encode_date(date: NaiveDate) -> [u8; 3] {
    [
        (date.year() - 1900) as u8,
        date.month() as u8,
        date.day() as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_big_endian_integers() {
        let data = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(u16_be(&data, 0), 0x1234);
        assert_eq!(u24_be(&data, 1), 0x345678);
        assert_eq!(u32_be(&data, 0), 0x12345678);

        let mut out = [0u8; 4];
        put_u24_be(&mut out, 1, 0xABCDEF);
        assert_eq!(out, [0, 0xAB, 0xCD, 0xEF]);
        put_u16_be(&mut out, 0, 0x0102);
        assert_eq!(&out[..2], &[0x01, 0x02]);
    }

    #[test]
    fn test_high_bit_string() {
        assert_eq!(high_bit_terminated(b"CMD\xD3garbage"), "CMDS");
        assert_eq!(encode_high_bit("CMDS", 6), vec![b'C', b'M', b'D', 0xD3, 0, 0]);
        assert_eq!(encode_high_bit("", 3), vec![0, 0, 0]);
        assert_eq!(high_bit_terminated(&[0, 0]), "");
    }

    #[test]
    fn test_null_terminated_string() {
        assert_eq!(null_terminated(b"HELLO\0XX"), "HELLO");
        assert_eq!(null_terminated(b"FULL"), "FULL");
    }

    #[test]
    fn test_padded_string() {
        assert_eq!(encode_padded("AB", 4, b' '), b"AB  ".to_vec());
        assert_eq!(encode_padded("TOOLONG", 3, 0), b"TOO".to_vec());
    }

    #[test]
    fn test_date_time_round_trip() {
        let time = NaiveDate::from_ymd_opt(1987, 6, 14)
            .and_then(|d| d.and_hms_opt(13, 45, 0))
            .unwrap();
        let packed = encode_date_time(time);
        assert_eq!(packed, [87, 6, 14, 13, 45]);
        assert_eq!(decode_date_time(&packed), Some(time));
    }

    #[test]
    fn test_date_leap_day_falls_back_to_2000() {
        // 1900 is not a leap year, 2000 is
        let date = decode_date(&[0, 2, 29]).unwrap();
        assert_eq!(date.year(), 2000);
    }

    #[test]
    fn test_invalid_date() {
        assert_eq!(decode_date(&[87, 13, 1]), None);
        assert_eq!(decode_date_time(&[87, 1, 1, 25, 0]), None);
    }

    proptest! {
        #[test]
        fn prop_os9_name_survives_encoding(name in "[A-Za-z0-9._]{1,29}") {
            let field = encode_high_bit(&name, 29);
            prop_assert_eq!(high_bit_terminated(&field), name);
        }

        #[test]
        fn prop_date_survives_encoding(year in 1900i32..2156, month in 1u32..=12, day in 1u32..=28) {
            let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            prop_assert_eq!(decode_date(&encode_date(date)), Some(date));
        }
    }
}
