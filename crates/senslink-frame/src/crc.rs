//! CRC-16/CCITT-FALSE.
//!
//! Polynomial 0x1021, initial value 0xFFFF, MSB first, no reflection and no
//! final XOR. The lookup table is generated at compile time from the
//! bit-at-a-time definition.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

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

/// Checksum of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(INIT, data)
}

/// Continue a running checksum over more bytes.
///
/// `crc16_update(crc16(a), b) == crc16(a ++ b)`.
pub fn crc16_update(crc: u16, data: &[u8]) -> u16 {
    data.iter().fold(crc, |crc, &byte| {
        (crc << 8) ^ TABLE[usize::from((crc >> 8) as u8 ^ byte)]
    })
}
