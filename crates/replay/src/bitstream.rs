//! MSB-first bit stream.
//!
//! Values are appended most significant bit first and packed into bytes.
//! The final byte is zero padded; readers stop once fewer bits than their
//! smallest record remain, so padding is never mistaken for data.

use crate::error::{CodecError, CodecResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitWriter {
    bytes: Vec<u8>,
    /// Bits used in the last byte (0 when it is full or absent).
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `width` bits of `value`.
    ///
    /// The value must fit; callers check ranges with [`BitWriter::push_checked`].
    pub fn push_bits(&mut self, value: u32, width: u32) {
        debug_assert!(width <= 32);
        for i in (0..width).rev() {
            let bit = ((value >> i) & 1) as u8;
            if self.bit_pos == 0 {
                self.bytes.push(0);
            }
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (7 - self.bit_pos);
            }
            self.bit_pos = (self.bit_pos + 1) % 8;
        }
    }

    pub fn push_bool(&mut self, value: bool) {
        self.push_bits(value as u32, 1);
    }

    /// Append `value`, failing when it needs more than `width` bits.
    pub fn push_checked(&mut self, field: &'static str, value: u32, width: u32) -> CodecResult<()> {
        if width < 32 && value >> width != 0 {
            return Err(CodecError::ValueOutOfRange {
                field,
                value: value as i64,
                bits: width,
            });
        }
        self.push_bits(value, width);
        Ok(())
    }

    /// Append a signed value stored as `value + bias`.
    pub fn push_biased(
        &mut self,
        field: &'static str,
        value: i32,
        bias: i32,
        width: u32,
    ) -> CodecResult<()> {
        let stored = value + bias;
        if stored < 0 || (stored as u32).checked_shr(width).unwrap_or(0) != 0 {
            return Err(CodecError::ValueOutOfRange {
                field,
                value: value as i64,
                bits: width,
            });
        }
        self.push_bits(stored as u32, width);
        Ok(())
    }

    /// Total bits written.
    pub fn len_bits(&self) -> usize {
        match self.bit_pos {
            0 => self.bytes.len() * 8,
            used => (self.bytes.len() - 1) * 8 + used as usize,
        }
    }

    /// Zero-fill the last byte.
    /// Drop everything after the first `bits` bits.
    pub fn truncate(&mut self, bits: usize) {
        if bits >= self.len_bits() {
            return;
        }
        self.bytes.truncate(bits.div_ceil(8));
        self.bit_pos = (bits % 8) as u8;
        if let (Some(last), used @ 1..) = (self.bytes.last_mut(), self.bit_pos) {
            *last &= 0xFFu8 << (8 - used);
        }
    }

    pub fn push_end_padding(&mut self) {
        self.bit_pos = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.push_end_padding();
        self.bytes
    }
}

/// Sequential reader over bytes written by [`BitWriter`].
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() * 8 - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn skip(&mut self, bits: usize) -> CodecResult<()> {
        if self.remaining() < bits {
            return Err(CodecError::Truncated {
                wanted: bits as u32,
                available: self.remaining(),
            });
        }
        self.pos += bits;
        Ok(())
    }

    pub fn pull_bits(&mut self, width: u32) -> CodecResult<u32> {
        debug_assert!(width <= 32);
        if self.remaining() < width as usize {
            return Err(CodecError::Truncated {
                wanted: width,
                available: self.remaining(),
            });
        }
        let mut value = 0u32;
        for _ in 0..width {
            let byte = self.bytes[self.pos / 8];
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.pos += 1;
        }
        Ok(value)
    }

    pub fn pull_bool(&mut self) -> CodecResult<bool> {
        Ok(self.pull_bits(1)? == 1)
    }

    pub fn pull_biased(&mut self, bias: i32, width: u32) -> CodecResult<i32> {
        Ok(self.pull_bits(width)? as i32 - bias)
    }

    pub fn pull_u8(&mut self, width: u32) -> CodecResult<u8> {
        debug_assert!(width <= 8);
        Ok(self.pull_bits(width)? as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_packed_msb_first() {
        let mut writer = BitWriter::new();
        writer.push_bits(0b101, 3);
        writer.push_bits(0b11111, 5);
        writer.push_bits(1, 1);
        assert_eq!(writer.len_bits(), 9);
        assert_eq!(writer.as_bytes(), &[0b1011_1111, 0b1000_0000]);
    }

    #[test]
    fn reader_reports_truncation() {
        let mut reader = BitReader::new(&[0xAB]);
        assert_eq!(reader.pull_bits(4).unwrap(), 0xA);
        assert_eq!(
            reader.pull_bits(5),
            Err(CodecError::Truncated {
                wanted: 5,
                available: 4
            })
        );
    }

    #[test]
    fn wide_values_cross_byte_boundaries() {
        let mut writer = BitWriter::new();
        writer.push_bits(3, 2);
        writer.push_bits(0xDEAD_BEEF, 32);
        writer.push_bits(0x123456, 24);
        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.pull_bits(2).unwrap(), 3);
        assert_eq!(reader.pull_bits(32).unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.pull_bits(24).unwrap(), 0x123456);
        assert!(reader.remaining() < 8);
    }

    #[test]
    fn checked_pushes_reject_overflow() {
        let mut writer = BitWriter::new();
        assert!(writer.push_checked("rows", 31, 5).is_ok());
        assert!(matches!(
            writer.push_checked("rows", 32, 5),
            Err(CodecError::ValueOutOfRange { field: "rows", .. })
        ));
        assert!(writer.push_biased("x", -8, 8, 5).is_ok());
        assert!(writer.push_biased("x", -9, 8, 5).is_err());
        assert!(writer.push_biased("x", 24, 8, 5).is_err());
    }

    #[test]
    fn full_width_biased_fields_do_not_overflow() {
        let mut writer = BitWriter::new();
        assert!(writer.push_biased("t", i32::MAX, 0, 32).is_ok());
        assert!(writer.push_biased("t", -1, 0, 32).is_err());
        let bytes = writer.into_bytes();
        assert_eq!(BitReader::new(&bytes).pull_biased(0, 32).unwrap(), i32::MAX);
    }

    #[test]
    fn truncate_rewinds_mid_byte() {
        let mut writer = BitWriter::new();
        writer.push_bits(0b101, 3);
        let mark = writer.len_bits();
        writer.push_bits(0x3FF, 10);
        writer.truncate(mark);
        assert_eq!(writer.len_bits(), 3);
        writer.push_bits(0b01, 2);
        assert_eq!(writer.into_bytes(), vec![0b1010_1000]);

        let mut aligned = BitWriter::new();
        aligned.push_bits(0xAB, 8);
        aligned.push_bits(1, 1);
        aligned.truncate(8);
        aligned.push_bits(0, 1);
        assert_eq!(aligned.into_bytes(), vec![0xAB, 0x00]);
    }

    proptest::proptest! {
        #[test]
        fn fields_read_back_in_order(
            fields in proptest::collection::vec((0u32..=u32::MAX, 1u32..=32), 0..64)
        ) {
            let mut writer = BitWriter::new();
            let masked: Vec<(u32, u32)> = fields
                .iter()
                .map(|&(value, width)| (value & (u32::MAX >> (32 - width)), width))
                .collect();
            for &(value, width) in &masked {
                writer.push_bits(value, width);
            }
            let bytes = writer.into_bytes();
            let mut reader = BitReader::new(&bytes);
            for &(value, width) in &masked {
                proptest::prop_assert_eq!(reader.pull_bits(width).unwrap(), value);
            }
            proptest::prop_assert!(reader.remaining() < 8);
        }
    }
}
