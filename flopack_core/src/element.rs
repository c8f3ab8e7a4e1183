use serde::{Deserialize, Serialize};

use crate::error::FlopackError;

/// Width of one IEEE-754 element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Single = 4,
    Double = 8,
}

impl Precision {
    /// Bytes per element, which is also the number of byte planes.
    #[inline]
    pub fn width(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn bits(self) -> u16 {
        self as u16 * 8
    }
}

impl TryFrom<usize> for Precision {
    type Error = FlopackError;

    fn try_from(width: usize) -> Result<Self, Self::Error> {
        match width {
            4 => Ok(Precision::Single),
            8 => Ok(Precision::Double),
            other => Err(FlopackError::InvalidPrecision(other)),
        }
    }
}

/// Which end of an element's byte sequence holds the least significant byte.
///
/// The same value lays values out into bytes and tells the lossy policy which
/// positions to discard first, so the two always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Position 0 is the least significant byte.
    Little,
    /// Position `width - 1` is the least significant byte.
    Big,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Byte position holding the `rank`-th least significant byte.
    #[inline]
    pub fn position(self, rank: usize, width: usize) -> usize {
        match self {
            ByteOrder::Little => rank,
            ByteOrder::Big => width - 1 - rank,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            ByteOrder::Little => 0,
            ByteOrder::Big => 1,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ByteOrder::Little),
            1 => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// A floating-point type that can be split into byte planes.
///
/// Conversion always goes through the raw bit pattern (`to_bits`/`from_bits`).
pub trait Element: Copy + Send + Sync + 'static {
    const PRECISION: Precision;

    /// Write the raw bit pattern of `self` into `out` (exactly `width` bytes).
    fn write_bytes(self, order: ByteOrder, out: &mut [u8]);

    /// Rebuild a value from exactly `width` bytes.
    fn read_bytes(order: ByteOrder, bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $bits:ty, $precision:expr, $width:expr) => {
        impl Element for $ty {
            const PRECISION: Precision = $precision;

            #[inline]
            fn write_bytes(self, order: ByteOrder, out: &mut [u8]) {
                let raw = self.to_bits();
                let bytes = match order {
                    ByteOrder::Little => raw.to_le_bytes(),
                    ByteOrder::Big => raw.to_be_bytes(),
                };
                out.copy_from_slice(&bytes);
            }

            #[inline]
            fn read_bytes(order: ByteOrder, bytes: &[u8]) -> Self {
                let mut buf = [0u8; $width];
                buf.copy_from_slice(bytes);
                let raw = match order {
                    ByteOrder::Little => <$bits>::from_le_bytes(buf),
                    ByteOrder::Big => <$bits>::from_be_bytes(buf),
                };
                <$ty>::from_bits(raw)
            }
        }
    };
}

impl_element!(f32, u32, Precision::Single, 4);
impl_element!(f64, u64, Precision::Double, 8);
