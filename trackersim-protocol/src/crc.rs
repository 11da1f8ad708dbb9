//! CRC-16 with the CCITT polynomial 0x1021.
//!
//! Parameters of the GT06 frame checksum:
//! - Poly:   0x1021
//! - Init:   0x0000
//! - RefIn:  false
//! - RefOut: false
//! - XorOut: 0x0000
//!
//! (CRC-16/XMODEM in the CRC catalogue.) The same polynomial with init
//! 0xFFFF is CRC-16/CCITT-FALSE; [`crc16_with_init`] covers both.

/// CCITT generator polynomial.
pub const POLY: u16 = 0x1021;

/// Initial value used on the wire.
pub const INIT: u16 = 0x0000;

/// Frame checksum over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    crc16_with_init(data, INIT)
}

/// Bit-by-bit CRC with a caller-chosen initial value.
pub fn crc16_with_init(data: &[u8], init: u16) -> u16 {
    let mut crc = init;
    for &byte in data {
        crc ^= (byte as u16) << 8;
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

static TABLE: [u16; 256] = build_table();

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

/// Table-driven variant, one lookup per byte.
pub fn crc16_table(data: &[u8], init: u16) -> u16 {
    data.iter().fold(init, |crc, &byte| {
        let index = ((crc >> 8) as u8 ^ byte) as usize;
        (crc << 8) ^ TABLE[index]
    })
}
