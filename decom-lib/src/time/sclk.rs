use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Canonical spacecraft clock encoding for a mission.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SclkFormat {
    pub coarse_bits: u8,
    pub fine_bits: u8,
}

impl Default for SclkFormat {
    fn default() -> Self {
        SclkFormat {
            coarse_bits: 32,
            fine_bits: 16,
        }
    }
}

impl SclkFormat {
    #[must_use]
    pub fn new(coarse_bits: u8, fine_bits: u8) -> Self {
        SclkFormat {
            coarse_bits,
            fine_bits,
        }
    }

    /// Number of fine ticks per coarse tick.
    #[must_use]
    pub fn fine_modulus(&self) -> u64 {
        1u64 << self.fine_bits
    }

    #[must_use]
    pub fn max_fine(&self) -> u64 {
        self.fine_modulus() - 1
    }

    #[must_use]
    pub fn total_bits(&self) -> usize {
        usize::from(self.coarse_bits) + usize::from(self.fine_bits)
    }
}

/// Spacecraft clock value in coarse and fine ticks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sclk {
    pub coarse: u64,
    pub fine: u64,
}

impl Sclk {
    #[must_use]
    pub fn new(coarse: u64, fine: u64) -> Self {
        Sclk { coarse, fine }
    }

    /// Decode the 64-bit on-board time encoding: 32 bits of coarse followed by a 32-bit word
    /// holding the fine ticks in its upper 16 bits.
    #[must_use]
    pub fn from_u64_encoding(coarse: u32, fine_word: u32) -> Self {
        let fine = (u64::from(fine_word) >> 16) & 0xffff;
        Sclk::new(u64::from(coarse), fine)
    }

    /// Convert floating point seconds into a clock value, the fraction scaled to fine ticks.
    #[must_use]
    pub fn from_seconds(secs: f64, format: &SclkFormat) -> Self {
        let secs = secs.max(0.0);
        let coarse = secs.trunc() as u64;
        let fine = (secs.fract() * format.fine_modulus() as f64).round() as u64;
        Sclk::new(coarse, 0).add(&Sclk::new(0, fine), format)
    }

    /// Sum two clock values, carrying fine overflow into coarse.
    #[must_use]
    pub fn add(&self, other: &Sclk, format: &SclkFormat) -> Self {
        let modulus = format.fine_modulus();
        let fine = self.fine + other.fine;
        Sclk {
            coarse: self.coarse + other.coarse + fine / modulus,
            fine: fine % modulus,
        }
    }

    /// Add a millisecond offset converted to clock ticks.
    #[must_use]
    pub fn add_millis(&self, millis: u64, format: &SclkFormat) -> Self {
        let delta = Sclk::new(millis / 1000, (millis % 1000) * format.fine_modulus() / 1000);
        self.add(&delta, format)
    }

    /// Reduce the fine component until it fits `format`, dividing by 10 and rounding at each
    /// step. This is only done for clocks decoded from encodings wider than the canonical one.
    #[must_use]
    pub fn round_fine(&self, format: &SclkFormat) -> Self {
        let max = format.max_fine();
        let mut fine = self.fine;
        while fine > max {
            fine = (fine + 5) / 10;
        }
        Sclk::new(self.coarse, fine)
    }

    #[must_use]
    pub fn as_seconds(&self, format: &SclkFormat) -> f64 {
        self.coarse as f64 + self.fine as f64 / format.fine_modulus() as f64
    }
}

impl Display for Sclk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:010}-{:05}", self.coarse, self.fine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_encoding_takes_upper_fine_bits() {
        let sclk = Sclk::from_u64_encoding(0x0000_1000, 0xabcd_1234);
        assert_eq!(sclk.coarse, 0x1000);
        assert_eq!(sclk.fine, 0xabcd);
    }

    #[test]
    fn add_carries_fine() {
        let fmt = SclkFormat::default();
        let a = Sclk::new(10, 60_000);
        let b = Sclk::new(5, 10_000);
        assert_eq!(a.add(&b, &fmt), Sclk::new(16, 70_000 - 65_536));
    }

    #[test]
    fn add_millis_converts_to_ticks() {
        let fmt = SclkFormat::default();
        let sclk = Sclk::new(100, 0).add_millis(1_500, &fmt);
        assert_eq!(sclk, Sclk::new(101, 32_768));
    }

    #[test]
    fn round_fine_divides_until_in_range() {
        let fmt = SclkFormat::new(32, 8);
        // 12345 -> 1235 -> 124
        assert_eq!(Sclk::new(7, 12_345).round_fine(&fmt), Sclk::new(7, 124));
        // already in range is untouched
        assert_eq!(Sclk::new(7, 255).round_fine(&fmt), Sclk::new(7, 255));
        // rounding half up: 2555 -> 256 -> 26
        assert_eq!(Sclk::new(1, 2_555).round_fine(&fmt), Sclk::new(1, 26));
    }

    #[test]
    fn from_seconds() {
        let fmt = SclkFormat::default();
        assert_eq!(Sclk::from_seconds(12.25, &fmt), Sclk::new(12, 16_384));
        assert!((Sclk::new(12, 16_384).as_seconds(&fmt) - 12.25).abs() < f64::EPSILON);
    }

    #[test]
    fn display() {
        assert_eq!(Sclk::new(1234, 56).to_string(), "0000001234-00056");
    }
}
