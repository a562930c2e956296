//! Decodes one cell's binary representation into its textual form. A cell
//! decoder is a pure function: `(payload, column type, metadata,
//! is_unsigned) -> (text bytes, bytes consumed)`. The packed temporal
//! `*2` types follow the documented MySQL binary-log biased encoding.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use common::error::{ProtocolError, Result};

use crate::column_type::ColumnType;

/// Maps digit-group size (0-9 digits) to the number of bytes MySQL's
/// NEWDECIMAL format uses to store that many digits.
const DIG_TO_BYTES: [usize; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];
const DIG_PER_DEC1: u8 = 9;

pub fn decode(payload: &[u8], column_type: ColumnType, metadata: u16, is_unsigned: bool) -> Result<(Vec<u8>, usize)> {
    match column_type {
        ColumnType::Tiny => fixed_int(payload, 1, is_unsigned),
        ColumnType::Short => fixed_int(payload, 2, is_unsigned),
        ColumnType::Int24 => fixed_int24(payload, is_unsigned),
        ColumnType::Long => fixed_int(payload, 4, is_unsigned),
        ColumnType::LongLong => fixed_int(payload, 8, is_unsigned),
        ColumnType::Float => take(payload, 4).map(|b| (f32_text(b), 4)),
        ColumnType::Double => take(payload, 8).map(|b| (f64_text(b), 8)),
        ColumnType::Null => Ok((Vec::new(), 0)),
        ColumnType::Year => take(payload, 1).map(|b| ((1900 + b[0] as u32).to_string().into_bytes(), 1)),
        ColumnType::Timestamp => take(payload, 4).map(|b| (LittleEndian::read_u32(b).to_string().into_bytes(), 4)),
        ColumnType::Timestamp2 => timestamp2(payload, metadata),
        ColumnType::Date | ColumnType::NewDate => date(payload),
        ColumnType::Time => legacy_time(payload),
        ColumnType::DateTime => legacy_datetime(payload),
        ColumnType::Time2 => time2(payload, metadata),
        ColumnType::DateTime2 => datetime2(payload, metadata),
        ColumnType::VarChar | ColumnType::VarString => varlen_string(payload, metadata),
        ColumnType::String => string_type(payload, metadata),
        ColumnType::Enum | ColumnType::Set => enum_or_set(payload, metadata),
        ColumnType::Bit => bit(payload, metadata),
        ColumnType::Blob | ColumnType::TinyBlob | ColumnType::MediumBlob | ColumnType::LongBlob => {
            length_prefixed(payload, metadata)
        }
        ColumnType::Json | ColumnType::Geometry => length_prefixed(payload, metadata),
        ColumnType::Decimal | ColumnType::NewDecimal => decimal(payload, metadata),
    }
}

fn take(payload: &[u8], n: usize) -> Result<&[u8]> {
    payload
        .get(0..n)
        .ok_or_else(|| ProtocolError::Malformed(format!("cell truncated, needed {n} bytes")).into())
}

fn fixed_int(payload: &[u8], width: usize, is_unsigned: bool) -> Result<(Vec<u8>, usize)> {
    let bytes = take(payload, width)?;
    let text = match (width, is_unsigned) {
        (1, true) => (bytes[0]).to_string(),
        (1, false) => (bytes[0] as i8).to_string(),
        (2, true) => LittleEndian::read_u16(bytes).to_string(),
        (2, false) => LittleEndian::read_i16(bytes).to_string(),
        (4, true) => LittleEndian::read_u32(bytes).to_string(),
        (4, false) => LittleEndian::read_i32(bytes).to_string(),
        (8, true) => LittleEndian::read_u64(bytes).to_string(),
        (8, false) => LittleEndian::read_i64(bytes).to_string(),
        _ => unreachable!("fixed_int called with unsupported width"),
    };
    Ok((text.into_bytes(), width))
}

fn fixed_int24(payload: &[u8], is_unsigned: bool) -> Result<(Vec<u8>, usize)> {
    let bytes = take(payload, 3)?;
    let magnitude = bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16;
    let text = if is_unsigned {
        magnitude.to_string()
    } else {
        // sign-extend bit 23 into a 32-bit signed value
        let signed = ((magnitude << 8) as i32) >> 8;
        signed.to_string()
    };
    Ok((text.into_bytes(), 3))
}

fn f32_text(bytes: &[u8]) -> Vec<u8> {
    LittleEndian::read_f32(bytes).to_string().into_bytes()
}

fn f64_text(bytes: &[u8]) -> Vec<u8> {
    LittleEndian::read_f64(bytes).to_string().into_bytes()
}

fn date(payload: &[u8]) -> Result<(Vec<u8>, usize)> {
    let bytes = take(payload, 3)?;
    let packed = bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16;
    let day = packed & 0x1F;
    let month = (packed >> 5) & 0xF;
    let year = packed >> 9;
    Ok((format!("{year:04}-{month:02}-{day:02}").into_bytes(), 3))
}

fn legacy_time(payload: &[u8]) -> Result<(Vec<u8>, usize)> {
    let bytes = take(payload, 3)?;
    let mut value = bytes[0] as i32 | (bytes[1] as i32) << 8 | (bytes[2] as i32) << 16;
    let negative = value < 0;
    if negative {
        value = -value;
    }
    let hour = value / 10_000;
    let minute = (value / 100) % 100;
    let second = value % 100;
    let sign = if negative { "-" } else { "" };
    Ok((format!("{sign}{hour:02}:{minute:02}:{second:02}").into_bytes(), 3))
}

fn legacy_datetime(payload: &[u8]) -> Result<(Vec<u8>, usize)> {
    let bytes = take(payload, 8)?;
    let mut value = LittleEndian::read_u64(bytes);
    let second = value % 100;
    value /= 100;
    let minute = value % 100;
    value /= 100;
    let hour = value % 100;
    value /= 100;
    let day = value % 100;
    value /= 100;
    let month = value % 100;
    value /= 100;
    let year = value;
    Ok((
        format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}").into_bytes(),
        8,
    ))
}

/// Fractional-seconds byte width for a given precision (0-6), per MySQL's
/// packed temporal formats: 0 bytes for fsp 0, else `ceil(fsp / 2)`.
fn frac_bytes(fsp: u8) -> usize {
    ((fsp as usize) + 1) / 2
}

fn read_fraction(payload: &[u8], fsp: u8) -> Result<(u32, usize)> {
    let width = frac_bytes(fsp);
    if width == 0 {
        return Ok((0, 0));
    }
    let bytes = take(payload, width)?;
    let mut value = 0u32;
    for &b in bytes {
        value = (value << 8) | b as u32;
    }
    Ok((value, width))
}

fn append_fraction(mut text: String, fraction: u32, fsp: u8) -> Vec<u8> {
    if fsp > 0 {
        text.push('.');
        text.push_str(&format!("{:0width$}", fraction, width = fsp as usize));
    }
    text.into_bytes()
}

fn timestamp2(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    let fsp = metadata as u8;
    let seconds = BigEndian::read_u32(take(payload, 4)?);
    let (fraction, frac_len) = read_fraction(&payload[4..], fsp)?;
    let text = append_fraction(seconds.to_string(), fraction, fsp);
    Ok((text, 4 + frac_len))
}

fn time2(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    let fsp = metadata as u8;
    let bytes = take(payload, 3)?;
    let raw = (bytes[0] as i64) << 16 | (bytes[1] as i64) << 8 | bytes[2] as i64;
    let biased = raw - 0x80_0000;
    let negative = biased < 0;
    let n = biased.unsigned_abs();
    let second = n & 0x3F;
    let minute = (n >> 6) & 0x3F;
    let hour = (n >> 12) & 0x3FF;
    let (fraction, frac_len) = read_fraction(&payload[3..], fsp)?;
    let sign = if negative { "-" } else { "" };
    let text = append_fraction(format!("{sign}{hour:02}:{minute:02}:{second:02}"), fraction, fsp);
    Ok((text, 3 + frac_len))
}

fn datetime2(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    let fsp = metadata as u8;
    let bytes = take(payload, 5)?;
    let mut raw = 0i64;
    for &b in bytes {
        raw = (raw << 8) | b as i64;
    }
    let biased = raw - 0x80_0000_0000;
    let n = biased.unsigned_abs();
    let second = n & 0x3F;
    let minute = (n >> 6) & 0x3F;
    let hour = (n >> 12) & 0x1F;
    let day = (n >> 17) & 0x1F;
    let year_month = n >> 22;
    let month = year_month % 13;
    let year = year_month / 13;
    let (fraction, frac_len) = read_fraction(&payload[5..], fsp)?;
    let text = append_fraction(
        format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"),
        fraction,
        fsp,
    );
    Ok((text, 5 + frac_len))
}

fn varlen_string(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    if metadata > 255 {
        let len = LittleEndian::read_u16(take(payload, 2)?) as usize;
        let data = take(&payload[2..], len)?;
        Ok((data.to_vec(), 2 + len))
    } else {
        let len = take(payload, 1)?[0] as usize;
        let data = take(&payload[1..], len)?;
        Ok((data.to_vec(), 1 + len))
    }
}

fn string_type(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    // Packed metadata: byte0 is the real type (possibly combined with the
    // high bits of a CHAR column's length), byte1 is the length's low byte.
    // When byte0's 0x30 bits aren't both set, this is a CHAR column whose
    // true max length exceeds what byte1 alone can hold — the high bits
    // live in byte0, inverted. Otherwise byte0 is a plain type tag
    // (ENUM/SET/STRING) and byte1 is the whole length.
    let b0 = (metadata >> 8) as u8;
    let b1 = (metadata & 0xFF) as u8;
    let real_length = if b0 & 0x30 != 0x30 {
        (b1 as u16) | (u16::from((b0 & 0x30) ^ 0x30) << 4)
    } else {
        b1 as u16
    };

    if real_length > 255 {
        let len = LittleEndian::read_u16(take(payload, 2)?) as usize;
        let data = take(&payload[2..], len)?;
        Ok((data.to_vec(), 2 + len))
    } else {
        let len = take(payload, 1)?[0] as usize;
        let data = take(&payload[1..], len)?;
        Ok((data.to_vec(), 1 + len))
    }
}

fn enum_or_set(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    let width = (metadata & 0xFF) as usize;
    let bytes = take(payload, width)?;
    let mut value = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        value |= (b as u32) << (8 * i);
    }
    Ok((value.to_string().into_bytes(), width))
}

fn bit(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    let bits_in_last_byte = (metadata & 0xFF) as usize;
    let complete_bytes = (metadata >> 8) as usize;
    let width = complete_bytes + if bits_in_last_byte > 0 { 1 } else { 0 };
    let data = take(payload, width)?;
    Ok((data.to_vec(), width))
}

fn length_prefixed(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    let len_bytes = metadata as usize;
    let prefix = take(payload, len_bytes)?;
    let mut len = 0u32;
    for (i, &b) in prefix.iter().enumerate() {
        len |= (b as u32) << (8 * i);
    }
    let data = take(&payload[len_bytes..], len as usize)?;
    Ok((data.to_vec(), len_bytes + len as usize))
}

fn decimal(payload: &[u8], metadata: u16) -> Result<(Vec<u8>, usize)> {
    let precision = (metadata >> 8) as u8;
    let scale = (metadata & 0xFF) as u8;
    if precision == 0 {
        return Ok((b"0".to_vec(), 0));
    }

    let integral_digits = precision - scale;
    let integral_groups = (integral_digits + DIG_PER_DEC1 - 1) / DIG_PER_DEC1;
    let fractional_groups = (scale + DIG_PER_DEC1 - 1) / DIG_PER_DEC1;
    let total_len = decimal_byte_len(precision, scale);

    let raw = take(payload, total_len)?;
    let is_negative = raw[0] & 0x80 == 0;
    let mut bytes = raw.to_vec();
    if is_negative {
        for b in &mut bytes {
            *b = !*b;
        }
    } else {
        bytes[0] &= 0x7F;
    }

    let mut text = String::new();
    let mut offset = 0usize;
    for group in 0..integral_groups {
        let digits = if group == 0 {
            ((integral_digits - 1) % DIG_PER_DEC1) + 1
        } else {
            DIG_PER_DEC1
        };
        let width = DIG_TO_BYTES[digits as usize];
        let value = read_be_uint(&bytes[offset..offset + width]);
        if group == 0 {
            text.push_str(&value.to_string());
        } else {
            text.push_str(&format!("{:0width$}", value, width = digits as usize));
        }
        offset += width;
    }
    if integral_digits == 0 {
        text.push('0');
    }

    if scale > 0 {
        text.push('.');
        for group in 0..fractional_groups {
            let digits = if group == fractional_groups - 1 {
                ((scale - 1) % DIG_PER_DEC1) + 1
            } else {
                DIG_PER_DEC1
            };
            let width = DIG_TO_BYTES[digits as usize];
            let value = read_be_uint(&bytes[offset..offset + width]);
            text.push_str(&format!("{:0width$}", value, width = digits as usize));
            offset += width;
        }
    }

    if is_negative {
        text.insert(0, '-');
    }

    Ok((text.into_bytes(), total_len))
}

fn decimal_byte_len(precision: u8, scale: u8) -> usize {
    let integral_digits = precision - scale;
    let integral_groups = (integral_digits + DIG_PER_DEC1 - 1) / DIG_PER_DEC1;
    let fractional_groups = (scale + DIG_PER_DEC1 - 1) / DIG_PER_DEC1;

    let mut len = 0;
    for group in 0..integral_groups {
        let digits = if group == 0 {
            ((integral_digits - 1) % DIG_PER_DEC1) + 1
        } else {
            DIG_PER_DEC1
        };
        len += DIG_TO_BYTES[digits as usize];
    }
    for group in 0..fractional_groups {
        let digits = if group == fractional_groups - 1 {
            ((scale - 1) % DIG_PER_DEC1) + 1
        } else {
            DIG_PER_DEC1
        };
        len += DIG_TO_BYTES[digits as usize];
    }
    len
}

fn read_be_uint(bytes: &[u8]) -> u32 {
    let mut value = 0u32;
    for &b in bytes {
        value = (value << 8) | b as u32;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_signed_and_unsigned_tiny() {
        assert_eq!(decode(&[0xFF], ColumnType::Tiny, 0, false).unwrap().0, b"-1");
        assert_eq!(decode(&[0xFF], ColumnType::Tiny, 0, true).unwrap().0, b"255");
    }

    #[test]
    fn decodes_long_little_endian() {
        let (text, consumed) = decode(&300i32.to_le_bytes(), ColumnType::Long, 0, false).unwrap();
        assert_eq!(text, b"300");
        assert_eq!(consumed, 4);
    }

    #[test]
    fn decodes_int24_sign_extends() {
        let bytes = [0xFF, 0xFF, 0xFF]; // -1 in 24-bit two's complement
        let (text, consumed) = decode(&bytes, ColumnType::Int24, 0, false).unwrap();
        assert_eq!(text, b"-1");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn decodes_varchar_with_one_byte_length() {
        let mut payload = vec![5u8];
        payload.extend_from_slice(b"hello");
        let (text, consumed) = decode(&payload, ColumnType::VarChar, 100, false).unwrap();
        assert_eq!(text, b"hello");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn decodes_varchar_with_two_byte_length() {
        let mut payload = 5u16.to_le_bytes().to_vec();
        payload.extend_from_slice(b"hello");
        let (text, consumed) = decode(&payload, ColumnType::VarChar, 1000, false).unwrap();
        assert_eq!(text, b"hello");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn decodes_date() {
        // 2024-03-15 packed as (year<<9)|(month<<5)|day
        let packed = (2024u32 << 9) | (3 << 5) | 15;
        let bytes = [
            (packed & 0xFF) as u8,
            ((packed >> 8) & 0xFF) as u8,
            ((packed >> 16) & 0xFF) as u8,
        ];
        let (text, _) = decode(&bytes, ColumnType::Date, 0, false).unwrap();
        assert_eq!(text, b"2024-03-15");
    }

    #[test]
    fn decodes_positive_newdecimal() {
        // precision 5, scale 2 -> "123.45"
        // integral digits=3 (1 group of 3 -> 2 bytes), fractional digits=2 (1 group -> 1 byte)
        let metadata = ((5u16) << 8) | 2;
        // layout: integral group (2 bytes, sign bit set in the first byte) then fractional group (1 byte)
        let bytes = vec![0x80, 123, 45];
        let (text, consumed) = decode(&bytes, ColumnType::NewDecimal, metadata, false).unwrap();
        assert_eq!(text, b"123.45");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn decodes_blob_with_one_byte_length_prefix() {
        let mut payload = vec![3u8];
        payload.extend_from_slice(b"abc");
        let (text, consumed) = decode(&payload, ColumnType::Blob, 1, false).unwrap();
        assert_eq!(text, b"abc");
        assert_eq!(consumed, 4);
    }

    #[test]
    fn decodes_bit_from_packed_metadata() {
        // 10 bits -> 1 complete byte + 2 bits in the last byte
        let metadata = (1u16 << 8) | 2;
        let payload = [0xFF, 0x03];
        let (data, consumed) = decode(&payload, ColumnType::Bit, metadata, false).unwrap();
        assert_eq!(data, vec![0xFF, 0x03]);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn decodes_short_string_with_plain_type_tag() {
        // byte0 = MYSQL_TYPE_STRING (254) has 0x30 bits both set, so byte1
        // is the whole length and the prefix is 1 byte.
        let metadata = (254u16 << 8) | 5;
        let mut payload = vec![5u8];
        payload.extend_from_slice(b"hello");
        let (text, consumed) = decode(&payload, ColumnType::String, metadata, false).unwrap();
        assert_eq!(text, b"hello");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn decodes_long_char_with_combined_length_bits() {
        // A CHAR column declared with a true length of 300 (0x12C) bytes:
        // byte0's 0x30 bits aren't both set, so the real length is spread
        // across byte0's inverted high bits and byte1's low byte.
        // real_length = b1 | (((b0&0x30)^0x30)<<4); choosing b0&0x30=0x20
        // and b1=0x2C gives 0x100 | 0x2C = 0x12C = 300.
        let b0 = 0x20u8;
        let b1 = 0x2Cu8;
        let metadata = ((b0 as u16) << 8) | b1 as u16;
        let mut payload = 300u16.to_le_bytes().to_vec();
        payload.extend_from_slice(&vec![b'x'; 300]);
        let (text, consumed) = decode(&payload, ColumnType::String, metadata, false).unwrap();
        assert_eq!(text.len(), 300);
        assert_eq!(consumed, 2 + 300);
    }
}
