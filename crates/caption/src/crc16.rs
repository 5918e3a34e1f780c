//! CRC-16 used by ARIB STD-B24 data groups.
//!
//! Polynomial: 0x1021, init: 0x0000, MSB first, no final XOR.
//!
//! The register is fed bit by bit and then flushed with 16 zero bits, which
//! is the "augmented" form of the CCITT CRC (same output as CRC-16/XMODEM).

use bytes_util::ChunkedBuffer;

/// Generator polynomial x^16 + x^12 + x^5 + 1.
pub const CRC16_POLY: u16 = 0x1021;

/// Streaming CRC-16 state. Feed bytes with [`Crc16::update`] in any number of
/// pieces; the result only depends on the concatenated input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    register: u16,
}

impl Crc16 {
    pub const fn new() -> Self {
        Self { register: 0x0000 }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let mut mask = 0x80u8;
            while mask != 0 {
                self.register = shift(self.register, byte & mask != 0);
                mask >>= 1;
            }
        }
    }

    /// Flush the register with 16 zero bits and return the check value.
    pub fn finish(self) -> u16 {
        let mut register = self.register;
        for _ in 0..16 {
            register = shift(register, false);
        }
        register
    }
}

/// One step of the bit-serial divider: shift the next message bit in at bit 0
/// and reduce by the polynomial when bit 15 falls out.
#[inline]
fn shift(register: u16, bit: bool) -> u16 {
    let carry = register & 0x8000 != 0;
    let mut next = (register << 1) | u16::from(bit);
    if carry {
        next ^= CRC16_POLY;
    }
    next
}

/// Compute the CRC-16 over a contiguous byte slice.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.finish()
}

/// Compute the CRC-16 over a sequence of chunks, in order.
pub fn crc16_chunks<'a, I>(chunks: I) -> u16
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut crc = Crc16::new();
    for chunk in chunks {
        crc.update(chunk);
    }
    crc.finish()
}

/// CRC-16 over non-contiguous storage.
pub trait Crc16Ext {
    fn crc16(&self) -> u16;
}

impl Crc16Ext for ChunkedBuffer {
    fn crc16(&self) -> u16 {
        crc16_chunks(self.chunks())
    }
}

impl Crc16Ext for [u8] {
    fn crc16(&self) -> u16 {
        crc16(self)
    }
}

/// Validate a data group whose last two bytes hold its big-endian CRC-16.
pub fn validate_data_group_crc16(group: &[u8]) -> bool {
    if group.len() < 2 {
        return false;
    }
    let (body, trailer) = group.split_at(group.len() - 2);
    crc16(body) == u16::from_be_bytes([trailer[0], trailer[1]])
}
