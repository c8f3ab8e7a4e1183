use crate::element::{ByteOrder, Element, Precision};
use crate::error::FlopackError;

/// `width` byte planes of `len` bytes each: `planes[k][i]` is byte `k` of element `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytePlanes {
    planes: Vec<Vec<u8>>,
    len: usize,
}

impl BytePlanes {
    /// `width` zero-filled planes of `len` bytes.
    pub fn zeroed(precision: Precision, len: usize) -> Self {
        Self {
            planes: vec![vec![0u8; len]; precision.width()],
            len,
        }
    }

    /// Like [`zeroed`](Self::zeroed), but reports an element count that cannot
    /// be allocated instead of aborting.
    pub fn try_zeroed(precision: Precision, len: usize) -> crate::Result<Self> {
        let too_large = || {
            FlopackError::corrupt(format!(
                "{} elements of {} bytes cannot be allocated",
                len,
                precision.width()
            ))
        };
        len.checked_mul(precision.width())
            .filter(|&total| total <= isize::MAX as usize)
            .ok_or_else(too_large)?;
        let mut planes = Vec::with_capacity(precision.width());
        for _ in 0..precision.width() {
            let mut plane = Vec::new();
            plane.try_reserve_exact(len).map_err(|_| too_large())?;
            plane.resize(len, 0);
            planes.push(plane);
        }
        Ok(Self { planes, len })
    }

    /// Wrap planes produced elsewhere. All planes must share one length and
    /// there must be exactly 4 or 8 of them.
    pub fn from_vecs(planes: Vec<Vec<u8>>) -> crate::Result<Self> {
        Precision::try_from(planes.len())?;
        let len = planes.first().map_or(0, Vec::len);
        if let Some(k) = planes.iter().position(|p| p.len() != len) {
            return Err(FlopackError::corrupt(format!(
                "plane {} has {} bytes, expected {}",
                k,
                planes[k].len(),
                len
            )));
        }
        Ok(Self { planes, len })
    }

    /// Number of planes (bytes per element).
    #[inline]
    pub fn width(&self) -> usize {
        self.planes.len()
    }

    /// Bytes per plane (number of elements).
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.len
    }

    pub fn plane(&self, k: usize) -> &[u8] {
        &self.planes[k]
    }

    pub fn plane_mut(&mut self, k: usize) -> &mut [u8] {
        &mut self.planes[k]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.planes.iter().map(Vec::as_slice)
    }

    pub(crate) fn planes_mut(&mut self) -> &mut [Vec<u8>] {
        &mut self.planes
    }

    pub fn into_vecs(self) -> Vec<Vec<u8>> {
        self.planes
    }
}

/// Split `values` into one plane per byte position.
pub fn to_planes<T: Element>(values: &[T], order: ByteOrder) -> BytePlanes {
    let precision = T::PRECISION;
    let width = precision.width();
    let mut planes = BytePlanes::zeroed(precision, values.len());
    let mut scratch = [0u8; 8];
    for (i, v) in values.iter().enumerate() {
        v.write_bytes(order, &mut scratch[..width]);
        for (k, plane) in planes.planes.iter_mut().enumerate() {
            plane[i] = scratch[k];
        }
    }
    planes
}

/// Interleave planes back into values. Fails if the plane count does not
/// match the width of `T`.
pub fn from_planes<T: Element>(planes: &BytePlanes, order: ByteOrder) -> crate::Result<Vec<T>> {
    let width = T::PRECISION.width();
    if planes.width() != width {
        return Err(FlopackError::InvalidPrecision(planes.width()));
    }
    let mut scratch = [0u8; 8];
    let values = (0..planes.plane_len())
        .map(|i| {
            for (k, plane) in planes.planes.iter().enumerate() {
                scratch[k] = plane[i];
            }
            T::read_bytes(order, &scratch[..width])
        })
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn try_zeroed_rejects_unallocatable_counts() {
        assert!(matches!(
            BytePlanes::try_zeroed(Precision::Double, usize::MAX / 4),
            Err(FlopackError::CorruptStream(_))
        ));
        assert_eq!(
            BytePlanes::try_zeroed(Precision::Single, 3).unwrap(),
            BytePlanes::zeroed(Precision::Single, 3)
        );
    }

    #[test]
    fn exponent_plane_is_constant_for_repeated_value() {
        let values = vec![3.25f64; 16];
        let planes = to_planes(&values, ByteOrder::Little);
        assert_eq!(planes.width(), 8);
        assert_eq!(planes.plane_len(), 16);
        // 3.25 = 0x400A_0000_0000_0000
        assert!(planes.plane(7).iter().all(|&b| b == 0x40));
        assert!(planes.plane(6).iter().all(|&b| b == 0x0A));
        assert!(planes.plane(0).iter().all(|&b| b == 0));
    }

    #[test]
    fn big_endian_mirrors_positions() {
        let values = [1.0f32, -1.0];
        let le = to_planes(&values, ByteOrder::Little);
        let be = to_planes(&values, ByteOrder::Big);
        for k in 0..4 {
            assert_eq!(le.plane(k), be.plane(3 - k));
        }
    }

    #[test]
    fn empty_input_gives_empty_planes() {
        let planes = to_planes::<f32>(&[], ByteOrder::Little);
        assert_eq!(planes.width(), 4);
        assert_eq!(planes.plane_len(), 0);
        let back: Vec<f32> = from_planes(&planes, ByteOrder::Little).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn from_planes_rejects_wrong_width() {
        let planes = to_planes(&[1.0f32], ByteOrder::Little);
        assert!(matches!(
            from_planes::<f64>(&planes, ByteOrder::Little),
            Err(FlopackError::InvalidPrecision(4))
        ));
    }

    #[test]
    fn from_vecs_checks_shape() {
        assert!(BytePlanes::from_vecs(vec![vec![0u8; 3]; 4]).is_ok());
        assert!(matches!(
            BytePlanes::from_vecs(vec![vec![0u8; 3]; 5]),
            Err(FlopackError::InvalidPrecision(5))
        ));
        let ragged = vec![vec![0u8; 3], vec![0u8; 3], vec![0u8; 2], vec![0u8; 3]];
        assert!(BytePlanes::from_vecs(ragged).is_err());
    }

    proptest! {
        #[test]
        fn prop_doubles_survive_transpose(bits in prop::collection::vec(any::<u64>(), 0..256), big in any::<bool>()) {
            let order = if big { ByteOrder::Big } else { ByteOrder::Little };
            let values: Vec<f64> = bits.iter().map(|&b| f64::from_bits(b)).collect();
            let back: Vec<f64> = from_planes(&to_planes(&values, order), order).unwrap();
            let back_bits: Vec<u64> = back.iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(back_bits, bits);
        }

        #[test]
        fn prop_floats_survive_transpose(bits in prop::collection::vec(any::<u32>(), 0..256)) {
            let values: Vec<f32> = bits.iter().map(|&b| f32::from_bits(b)).collect();
            let back: Vec<f32> = from_planes(&to_planes(&values, ByteOrder::native()), ByteOrder::native()).unwrap();
            let back_bits: Vec<u32> = back.iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(back_bits, bits);
        }
    }
}
