//! CRC-16/CCITT-FALSE (poly `0x1021`, init `0xFFFF`, no reflection, no final xor).

/// Initial register value for a fresh checksum.
pub const CRC_INIT: u16 = 0xFFFF;

const POLY: u16 = 0x1021;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Feed `data` into a running checksum.
///
/// Chaining is associative: `crc16(b, crc16(a, init)) == crc16(a ++ b, init)`.
pub fn crc16(data: &[u8], initial: u16) -> u16 {
    data.iter().fold(initial, |crc, &byte| {
        (crc << 8) ^ TABLE[usize::from((crc >> 8) as u8 ^ byte)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bitwise(data: &[u8], initial: u16) -> u16 {
        let mut crc = initial;
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ POLY
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn check_value() {
        assert_eq!(crc16(b"123456789", CRC_INIT), 0x29B1);
    }

    #[test]
    fn empty_input_returns_initial() {
        assert_eq!(crc16(&[], CRC_INIT), CRC_INIT);
        assert_eq!(crc16(&[], 0x1234), 0x1234);
    }

    #[test]
    fn table_matches_bitwise_definition() {
        assert_eq!(crc16(b"\x00\xFF\xA5\x5A", CRC_INIT), bitwise(b"\x00\xFF\xA5\x5A", CRC_INIT));
    }

    proptest! {
        #[test]
        fn chaining_equals_concatenation(
            a in proptest::collection::vec(any::<u8>(), 0..256),
            b in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let mut joined = a.clone();
            joined.extend_from_slice(&b);
            prop_assert_eq!(crc16(&b, crc16(&a, CRC_INIT)), crc16(&joined, CRC_INIT));
        }

        #[test]
        fn table_driven_equals_bitwise(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            initial in any::<u16>(),
        ) {
            prop_assert_eq!(crc16(&data, initial), bitwise(&data, initial));
        }
    }
}
