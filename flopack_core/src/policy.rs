use crate::element::{ByteOrder, Precision};
use crate::error::FlopackError;

/// How one byte plane is stored in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneCode {
    /// Discarded; decodes to zero bytes.
    Dropped,
    /// Stored byte-for-byte.
    Plain,
    /// Passed through the generic compressor.
    Compressed,
    /// Low bits zeroed with a fixed mask, then compressed.
    Masked,
}

impl PlaneCode {
    /// Wire value written in the frame's 4-byte code field.
    pub fn as_i32(self) -> i32 {
        match self {
            PlaneCode::Dropped => -1,
            PlaneCode::Plain => 0,
            PlaneCode::Compressed => 1,
            PlaneCode::Masked => 2,
        }
    }

    /// Whether the payload went through the generic compressor.
    pub fn is_compressed(self) -> bool {
        matches!(self, PlaneCode::Compressed | PlaneCode::Masked)
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaneCode::Dropped => "dropped",
            PlaneCode::Plain => "plain",
            PlaneCode::Compressed => "compressed",
            PlaneCode::Masked => "masked",
        }
    }
}

impl TryFrom<i32> for PlaneCode {
    type Error = FlopackError;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(PlaneCode::Dropped),
            0 => Ok(PlaneCode::Plain),
            1 => Ok(PlaneCode::Compressed),
            2 => Ok(PlaneCode::Masked),
            other => Err(FlopackError::corrupt(format!("unknown plane code {}", other))),
        }
    }
}

/// `MASKS[k]` clears the `k` low bits of a byte.
pub const MASKS: [u8; 8] = [0xFF, 0xFE, 0xFC, 0xF8, 0xF0, 0xE0, 0xC0, 0x80];

/// Convert a "bits to protect" count into lossy bits for `precision`.
pub fn lossy_from_protect(precision: Precision, protect_bits: u16) -> crate::Result<u16> {
    precision
        .bits()
        .checked_sub(protect_bits)
        .ok_or(FlopackError::InvalidLossyRange {
            lossy_bits: precision.bits() as i64 - protect_bits as i64,
            max: precision.bits(),
        })
}

/// Reject lossy bit counts outside `[0, width * 8]`.
pub fn check_lossy(precision: Precision, lossy_bits: u16) -> crate::Result<()> {
    if lossy_bits > precision.bits() {
        return Err(FlopackError::InvalidLossyRange {
            lossy_bits: lossy_bits as i64,
            max: precision.bits(),
        });
    }
    Ok(())
}

/// Number of low bits to clear in the straddling plane.
#[inline]
pub fn partial_bits(lossy_bits: u16) -> u8 {
    (lossy_bits % 8) as u8
}

/// Per-position plane codes for discarding `lossy_bits` low-order bits.
///
/// The `lossy_bits / 8` least significant positions are dropped; if
/// `lossy_bits % 8` is non-zero the next position is masked. Every other
/// position is compressed.
pub fn plane_codes(
    precision: Precision,
    lossy_bits: u16,
    order: ByteOrder,
) -> crate::Result<Vec<PlaneCode>> {
    check_lossy(precision, lossy_bits)?;
    let width = precision.width();
    let full_bytes = (lossy_bits / 8) as usize;
    let mut codes = vec![PlaneCode::Compressed; width];
    for rank in 0..full_bytes {
        codes[order.position(rank, width)] = PlaneCode::Dropped;
    }
    if partial_bits(lossy_bits) != 0 {
        codes[order.position(full_bytes, width)] = PlaneCode::Masked;
    }
    Ok(codes)
}

/// Clear the `low_bits` least significant bits of every byte in `plane`.
pub fn mask_bits(plane: &mut [u8], low_bits: u8) {
    let mask = MASKS[(low_bits & 7) as usize];
    if mask == 0xFF {
        return;
    }
    for b in plane.iter_mut() {
        *b &= mask;
    }
}
