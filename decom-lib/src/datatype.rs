//! Leaf data type descriptors.
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

/// Base category of a leaf value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    UnsignedInt,
    SignedInt,
    Float,
    Enum,
    Boolean,
    String,
    Time,
    Fill,
    Unknown,
}

impl Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::UnsignedInt => "UNSIGNED_INT",
            Self::SignedInt => "SIGNED_INT",
            Self::Float => "FLOAT",
            Self::Enum => "ENUM",
            Self::Boolean => "BOOLEAN",
            Self::String => "STRING",
            Self::Time => "TIME",
            Self::Fill => "FILL",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Integer widths supported for byte aligned integer reads.
const INTEGER_BITS: [usize; 5] = [8, 16, 24, 32, 64];

/// Describes how a single leaf value is encoded.
///
/// `byte_len` of `None` means the value extends over the rest of the available data, or
/// over the length given by a length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataType {
    base: BaseType,
    bit_len: usize,
    byte_len: Option<usize>,
}

impl DataType {
    pub const UINT8: DataType = DataType::new(BaseType::UnsignedInt, 8);
    pub const UINT16: DataType = DataType::new(BaseType::UnsignedInt, 16);
    pub const UINT32: DataType = DataType::new(BaseType::UnsignedInt, 32);
    pub const FLOAT32: DataType = DataType::new(BaseType::Float, 32);
    pub const FLOAT64: DataType = DataType::new(BaseType::Float, 64);

    /// A fixed width type. The byte length is the bit length rounded up to whole bytes.
    #[must_use]
    pub const fn new(base: BaseType, bit_len: usize) -> Self {
        DataType {
            base,
            bit_len,
            byte_len: Some(bit_len.div_ceil(8)),
        }
    }

    /// A type occupying whatever data remains, e.g., a trailing string.
    #[must_use]
    pub const fn rest(base: BaseType) -> Self {
        DataType {
            base,
            bit_len: 0,
            byte_len: None,
        }
    }

    /// Fixed length text of `len` bytes.
    #[must_use]
    pub const fn string(len: usize) -> Self {
        Self::new(BaseType::String, len * 8)
    }

    /// Unsigned integer of `len` bytes, used for length prefixes.
    #[must_use]
    pub const fn unsigned_bytes(len: usize) -> Self {
        Self::new(BaseType::UnsignedInt, len * 8)
    }

    #[must_use]
    pub fn base(&self) -> BaseType {
        self.base
    }

    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    #[must_use]
    pub fn byte_len(&self) -> Option<usize> {
        self.byte_len
    }

    /// Copy of this type with an effective byte length, e.g., one read from a prefix.
    #[must_use]
    pub fn with_byte_len(self, len: usize) -> Self {
        DataType {
            base: self.base,
            bit_len: len * 8,
            byte_len: Some(len),
        }
    }

    /// Unsigned 64-bit values may not be representable as signed integers.
    #[must_use]
    pub fn may_exceed_signed_range(&self) -> bool {
        matches!(
            self.base,
            BaseType::UnsignedInt | BaseType::Enum | BaseType::Boolean
        ) && self.bit_len == 64
    }

    /// Verify this (base, bit length) combination can be decoded.
    ///
    /// # Errors
    /// [DefinitionError::UnsupportedType] for any combination the decoder cannot handle.
    pub fn check(&self, field: &str) -> Result<(), DefinitionError> {
        let ok = match self.base {
            BaseType::UnsignedInt | BaseType::SignedInt | BaseType::Enum | BaseType::Boolean => {
                INTEGER_BITS.contains(&self.bit_len)
            }
            BaseType::Float | BaseType::Time => matches!(self.bit_len, 32 | 64),
            BaseType::String => self.byte_len.is_none() || self.bit_len % 8 == 0,
            BaseType::Fill | BaseType::Unknown => true,
        };
        if ok {
            Ok(())
        } else {
            Err(DefinitionError::UnsupportedType {
                field: field.to_string(),
                base: self.base,
                bits: self.bit_len,
            })
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.byte_len {
            Some(_) => write!(f, "{} {}", self.base, self.bit_len),
            None => write!(f, "{} *", self.base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(BaseType::UnsignedInt, 24, true)]
    #[test_case(BaseType::SignedInt, 64, true)]
    #[test_case(BaseType::SignedInt, 12, false)]
    #[test_case(BaseType::Float, 32, true)]
    #[test_case(BaseType::Float, 16, false)]
    #[test_case(BaseType::Time, 64, true)]
    #[test_case(BaseType::Time, 48, false)]
    #[test_case(BaseType::Boolean, 8, true)]
    #[test_case(BaseType::Fill, 3, true)]
    fn check_combinations(base: BaseType, bits: usize, ok: bool) {
        assert_eq!(DataType::new(base, bits).check("x").is_ok(), ok);
    }

    #[test]
    fn derived_byte_len() {
        assert_eq!(DataType::new(BaseType::UnsignedInt, 24).byte_len(), Some(3));
        assert_eq!(DataType::new(BaseType::Fill, 12).byte_len(), Some(2));
        assert_eq!(DataType::rest(BaseType::String).byte_len(), None);
        assert_eq!(DataType::string(4).with_byte_len(7).byte_len(), Some(7));
    }

    #[test]
    fn signed_range_flag() {
        assert!(DataType::new(BaseType::UnsignedInt, 64).may_exceed_signed_range());
        assert!(!DataType::new(BaseType::SignedInt, 64).may_exceed_signed_range());
        assert!(!DataType::UINT32.may_exceed_signed_range());
    }
}
