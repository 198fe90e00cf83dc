//! Frame checksum.
//!
//! A cheap corruption detector, not an integrity guarantee: MD5 over the
//! big-endian length field followed by the payload, keep the last three hex
//! digits of the digest, reduce modulo 10. Peers compare the single
//! resulting digit, so the truncation has to be reproduced exactly.

/// Checksum over `be32(length) ++ payload`. Always in `0..=9`.
pub fn checksum(length: u32, payload: &[u8]) -> u32 {
    let mut ctx = md5::Context::new();
    ctx.consume(length.to_be_bytes());
    ctx.consume(payload);
    let digest = ctx.compute();

    // The last three hex digits are the low 12 bits of the final two bytes.
    let tail = (u32::from(digest[14] & 0x0F) << 8) | u32::from(digest[15]);
    tail % 10
}

/// Checksum of a payload using its own length as the length field.
///
/// Payloads longer than `u32::MAX` never reach the wire; their length is
/// saturated here.
pub fn checksum_of(payload: &[u8]) -> u32 {
    let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    checksum(length, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(length: u32, payload: &[u8]) -> u32 {
        let mut input = length.to_be_bytes().to_vec();
        input.extend_from_slice(payload);
        let hex = format!("{:x}", md5::compute(&input));
        u32::from_str_radix(&hex[hex.len() - 3..], 16).unwrap() % 10
    }

    #[test]
    fn matches_hex_truncation_rule() {
        let samples: [&[u8]; 4] = [b"", b"\x00\x00\x00\x05", b"elevator", &[0xFF; 64]];
        for payload in samples {
            let len = payload.len() as u32;
            assert_eq!(checksum(len, payload), reference(len, payload));
        }
    }

    #[test]
    fn is_single_digit() {
        for n in 0u32..200 {
            assert!(checksum(4, &n.to_be_bytes()) < 10);
        }
    }

    #[test]
    fn length_field_is_covered() {
        // Same payload under different declared lengths should not always agree.
        let payload = b"abcd";
        let distinct: std::collections::HashSet<u32> =
            (0u32..50).map(|len| checksum(len, payload)).collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn checksum_of_uses_payload_length() {
        assert_eq!(checksum_of(b"xyz"), checksum(3, b"xyz"));
    }
}
