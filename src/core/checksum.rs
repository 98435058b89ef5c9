//! Packet checksum.
//!
//! A CRC over the Castagnoli polynomial (bit-reflected, `0x82f63b78`) whose
//! register starts at the CRC of an implicit leading 1 bit and is never
//! inverted on output. The four register bytes are emitted least significant
//! first; [`checksum`] returns them reassembled most significant first, so
//! writing the result big-endian reproduces the bytes the services expect.
//! The value is an opaque tag, not a number to be reasoned about.

use crc::{Algorithm, Crc};

/// Castagnoli CRC with the register seeded by the implicit leading 1 bit.
///
/// `init` is given in unreflected form; reflected it is `0x82f63b78`.
const CRC_32_KIVALOO: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x1edc_6f41,
    init: 0x1edc_6f41,
    refin: true,
    refout: true,
    xorout: 0x0000_0000,
    check: 0x22fc_9104,
    residue: 0x0000_0000,
};

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_KIVALOO);

/// Compute the wire checksum of `data`.
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    CASTAGNOLI.checksum(data).swap_bytes()
}

/// Compute the wire checksum of several spans as if they were contiguous.
pub fn checksum_parts(parts: &[&[u8]]) -> u32 {
    let mut digest = CASTAGNOLI.digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize().swap_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(checksum(b"123456789"), 0x0491_fc22);
    }

    #[test]
    fn test_empty_input_is_byte_swapped_seed() {
        assert_eq!(checksum(&[]), 0x783b_f682);
    }

    #[test]
    fn test_header_of_empty_first_packet() {
        assert_eq!(checksum(&[0u8; 12]), 0x18ea_b818);
    }

    #[test]
    fn test_parts_match_contiguous() {
        let data = b"hello, block store";
        assert_eq!(
            checksum_parts(&[&data[..5], &data[5..11], &data[11..]]),
            checksum(data)
        );
    }

    #[test]
    fn test_wire_bytes_are_register_little_endian() {
        let raw = CASTAGNOLI.checksum(b"abc");
        assert_eq!(checksum(b"abc").to_be_bytes(), raw.to_le_bytes());
    }
}
