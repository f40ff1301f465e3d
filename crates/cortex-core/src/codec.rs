//! Little-endian integer and float I/O over byte slices, shared by the
//! frame envelope and every message payload in [`crate::protocol`].

/// Read a little-endian `u16` at `offset`.
pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
}

/// Read a little-endian `u32` at `offset`.
pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

/// Read a little-endian `u64` at `offset`.
pub fn read_u64_le(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

/// Read a little-endian `i64` at `offset`.
pub fn read_i64_le(buf: &[u8], offset: usize) -> i64 {
    i64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

/// Read a little-endian `f32` at `offset`.
pub fn read_f32_le(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

/// Write a little-endian `u16` at `offset`.
pub fn write_u16_le(buf: &mut [u8], offset: usize, v: u16) {
    buf[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
}

/// Write a little-endian `u32` at `offset`.
pub fn write_u32_le(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

/// Write a little-endian `u64` at `offset`.
pub fn write_u64_le(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

/// Write a little-endian `i64` at `offset`.
pub fn write_i64_le(buf: &mut [u8], offset: usize, v: i64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

/// Write a little-endian `f32` at `offset`.
pub fn write_f32_le(buf: &mut [u8], offset: usize, v: f32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

/// CRC-32 (IEEE 802.3 polynomial, reflected, init/final `0xFFFFFFFF`) over
/// `data`. Backed by `crc32fast`, which implements exactly this variant.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Write a null-padded, fixed-length ASCII field. Truncates `s` if it does
/// not fit; the caller is responsible for choosing field widths that won't
/// truncate real values.
pub fn write_fixed_str(buf: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    for b in &mut buf[n..] {
        *b = 0;
    }
}

/// Read a null-padded, fixed-length ASCII field back into an owned `String`,
/// stopping at the first NUL byte.
pub fn read_fixed_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_integers() {
        let mut buf = [0u8; 8];
        write_u64_le(&mut buf, 0, 0x0123_4567_89ab_cdef);
        assert_eq!(read_u64_le(&buf, 0), 0x0123_4567_89ab_cdef);

        let mut buf32 = [0u8; 4];
        write_u32_le(&mut buf32, 0, 0xdead_beef);
        assert_eq!(read_u32_le(&buf32, 0), 0xdead_beef);
    }

    #[test]
    fn round_trips_float() {
        let mut buf = [0u8; 4];
        write_f32_le(&mut buf, 0, 3.5);
        assert_eq!(read_f32_le(&buf, 0), 3.5);
    }

    #[test]
    fn fixed_str_round_trips_and_pads() {
        let mut buf = [0xAAu8; 32];
        write_fixed_str(&mut buf, "notch_iir@f32");
        assert_eq!(read_fixed_str(&buf), "notch_iir@f32");
        assert!(buf[13..].iter().all(|&b| b == 0));
    }

    #[test]
    fn crc32_matches_known_vector() {
        // "123456789" -> 0xCBF43926 is the canonical CRC-32/ISO-HDLC check value.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
