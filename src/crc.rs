//! CRC calculation utilities for the ROHC framework.
//!
//! Wraps the `crc` crate to provide the CRC families used by ROHC packet
//! validation: the 2-, 3-, 6-, 7- and 8-bit CRCs of RFC 3095 §5.9 and the
//! 32-bit FCS of RFC 1662 used to protect segmented packets. All algorithm
//! instances are pre-built once per compressor in [`CrcCalculators`] so the
//! lookup tables are computed a single time.

use std::fmt;

use crc::{Algorithm, Crc, CRC_32_ISO_HDLC, CRC_3_ROHC, CRC_7_ROHC, CRC_8_ROHC};

/// The 2-bit ROHC CRC: polynomial `x^2 + x + 1`, initial value all-ones,
/// reflected like the other ROHC CRCs.
pub const CRC_2_ROHC: Algorithm<u8> = Algorithm {
    width: 2,
    poly: 0x3,
    init: 0x3,
    refin: true,
    refout: true,
    xorout: 0x0,
    check: 0x3,
    residue: 0x0,
};

/// The 6-bit ROHC CRC: polynomial `x^6 + x + 1`, initial value all-ones.
pub const CRC_6_ROHC: Algorithm<u8> = Algorithm {
    width: 6,
    poly: 0x03,
    init: 0x3f,
    refin: true,
    refout: true,
    xorout: 0x00,
    check: 0x04,
    residue: 0x00,
};

/// Pre-initialized CRC algorithm instances for one compressor.
///
/// Building a `Crc` computes its lookup table, so the instances are created
/// once at compressor construction and shared by every packet builder.
pub struct CrcCalculators {
    crc2: Crc<u8>,
    crc3: Crc<u8>,
    crc6: Crc<u8>,
    crc7: Crc<u8>,
    crc8: Crc<u8>,
    fcs32: Crc<u32>,
}

impl fmt::Debug for CrcCalculators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrcCalculators").finish_non_exhaustive()
    }
}

impl CrcCalculators {
    /// Creates the full set of ROHC CRC calculators.
    pub fn new() -> Self {
        Self {
            crc2: Crc::<u8>::new(&CRC_2_ROHC),
            crc3: Crc::<u8>::new(&CRC_3_ROHC),
            crc6: Crc::<u8>::new(&CRC_6_ROHC),
            crc7: Crc::<u8>::new(&CRC_7_ROHC),
            crc8: Crc::<u8>::new(&CRC_8_ROHC),
            fcs32: Crc::<u32>::new(&CRC_32_ISO_HDLC),
        }
    }

    /// 2-bit ROHC CRC over `input` (range `0x0..=0x3`).
    #[inline]
    pub fn crc2(&self, input: &[u8]) -> u8 {
        self.crc2.checksum(input)
    }

    /// 3-bit ROHC CRC over `input` (range `0x0..=0x7`).
    #[inline]
    pub fn crc3(&self, input: &[u8]) -> u8 {
        self.crc3.checksum(input)
    }

    /// 6-bit ROHC CRC over `input` (range `0x00..=0x3F`).
    #[inline]
    pub fn crc6(&self, input: &[u8]) -> u8 {
        self.crc6.checksum(input)
    }

    /// 7-bit ROHC CRC over `input` (range `0x00..=0x7F`).
    #[inline]
    pub fn crc7(&self, input: &[u8]) -> u8 {
        self.crc7.checksum(input)
    }

    /// 8-bit ROHC CRC over `input`.
    #[inline]
    pub fn crc8(&self, input: &[u8]) -> u8 {
        self.crc8.checksum(input)
    }

    /// 32-bit FCS (RFC 1662) over `input`, protecting reassembled segments.
    #[inline]
    pub fn fcs32(&self, input: &[u8]) -> u32 {
        self.fcs32.checksum(input)
    }
}

impl Default for CrcCalculators {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK_INPUT: &[u8] = b"123456789";

    #[test]
    fn crc8_standard_test_vector() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.crc8(CHECK_INPUT), 0xD0);
        assert_eq!(CRC_8_ROHC.check, 0xD0);
    }

    #[test]
    fn crc3_standard_test_vector() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.crc3(CHECK_INPUT), 0x06);
    }

    #[test]
    fn crc7_standard_test_vector() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.crc7(CHECK_INPUT), CRC_7_ROHC.check);
    }

    #[test]
    fn fcs32_standard_test_vector() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.fcs32(CHECK_INPUT), 0xCBF43926);
    }

    #[test]
    fn empty_input_yields_initial_value() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.crc8(b""), 0xFF);
        assert_eq!(calculators.crc3(b""), 0x07);
        assert_eq!(calculators.crc2(b""), 0x03);
        assert_eq!(calculators.crc6(b""), 0x3F);
    }

    #[test]
    fn narrow_crcs_stay_in_range() {
        let calculators = CrcCalculators::new();
        let data = b"a longer input buffer exercising every table entry at least once";
        assert!(calculators.crc2(data) <= 0x3);
        assert!(calculators.crc3(data) <= 0x7);
        assert!(calculators.crc6(data) <= 0x3F);
        assert!(calculators.crc7(data) <= 0x7F);
    }
}
