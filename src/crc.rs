//! CRC-16 variants used by the wire protocol and the settings block.
//!
//! The wire CRC (polynomial 0x8408, the reflected form of 0x1021) runs on
//! every command and response frame and is table-driven. The storage CRC
//! (polynomial 0x1021, MSB-first) protects the persisted settings block.
//! The two are not interchangeable.

use crate::types::Error;

const fn build_wire_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0x8408
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static WIRE_TABLE: [u16; 256] = build_wire_table();

/// Wire CRC-16: polynomial 0x8408, init 0xFFFF, LSB-first, no post-XOR.
/// Transmitted little-endian after the frame body.
pub fn crc16_wire(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, &b| {
        (crc >> 8) ^ WIRE_TABLE[((crc ^ b as u16) & 0xFF) as usize]
    })
}

/// Storage CRC-16-CCITT: polynomial 0x1021, init 0xFFFF, MSB-first,
/// no reflection, no post-XOR.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |mut crc, &b| {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// Verify the trailing little-endian wire CRC of a frame.
pub fn verify_frame(frame: &[u8]) -> Result<(), Error> {
    if frame.len() < 3 {
        return Err(Error::FrameTooShort);
    }

    let calculated = crc16_wire(&frame[..frame.len() - 2]);
    let stored = frame[frame.len() - 2] as u16 | ((frame[frame.len() - 1] as u16) << 8);

    if calculated == stored {
        Ok(())
    } else {
        Err(Error::CrcFailed)
    }
}
