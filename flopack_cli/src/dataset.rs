//! Raw native-endian float files and the codec calls that operate on them.

use std::path::Path;

use anyhow::Context;

use flopack_core::{ByteOrder, Decoded, Element, EncodeReport, FloatCodec, Precision};

/// A whole file of `f32` or `f64` values.
pub enum Dataset {
    Single(Vec<f32>),
    Double(Vec<f64>),
}

fn decode_raw<T: Element>(bytes: &[u8], order: ByteOrder) -> Vec<T> {
    bytes
        .chunks_exact(T::PRECISION.width())
        .map(|chunk| T::read_bytes(order, chunk))
        .collect()
}

fn encode_raw<T: Element>(values: &[T]) -> Vec<u8> {
    let width = T::PRECISION.width();
    let mut out = vec![0u8; values.len() * width];
    for (v, chunk) in values.iter().zip(out.chunks_exact_mut(width)) {
        v.write_bytes(ByteOrder::native(), chunk);
    }
    out
}

fn max_abs_diff<T: Copy + Into<f64>>(a: &[T], b: &[T]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x.into() - y.into()).abs())
        .fold(0.0, f64::max)
}

impl Dataset {
    /// Read a file of raw values. With `swap`, each value's bytes are reversed.
    pub fn load(path: &Path, precision: Precision, swap: bool) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {:?}", path))?;
        let width = precision.width();
        if bytes.len() % width != 0 {
            tracing::warn!(
                path = ?path,
                trailing = bytes.len() % width,
                "file length is not a multiple of the element width; ignoring trailing bytes"
            );
        }
        let order = match (ByteOrder::native(), swap) {
            (order, false) => order,
            (ByteOrder::Little, true) => ByteOrder::Big,
            (ByteOrder::Big, true) => ByteOrder::Little,
        };
        Ok(match precision {
            Precision::Single => Dataset::Single(decode_raw(&bytes, order)),
            Precision::Double => Dataset::Double(decode_raw(&bytes, order)),
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let bytes = match self {
            Dataset::Single(v) => encode_raw(v),
            Dataset::Double(v) => encode_raw(v),
        };
        std::fs::write(path, bytes).with_context(|| format!("writing {:?}", path))
    }

    pub fn precision(&self) -> Precision {
        match self {
            Dataset::Single(_) => Precision::Single,
            Dataset::Double(_) => Precision::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dataset::Single(v) => v.len(),
            Dataset::Double(v) => v.len(),
        }
    }

    pub fn byte_len(&self) -> u64 {
        (self.len() * self.precision().width()) as u64
    }

    /// Values as `f64`, widening singles.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Dataset::Single(v) => v.iter().map(|&x| x as f64).collect(),
            Dataset::Double(v) => v.clone(),
        }
    }

    pub fn compress(&self, codec: &FloatCodec) -> flopack_core::Result<(Vec<u8>, EncodeReport)> {
        match self {
            Dataset::Single(v) => codec.compress_floats_with_report(v),
            Dataset::Double(v) => codec.compress_doubles_with_report(v),
        }
    }

    /// Decode `stream` and report whether its length checked out.
    pub fn decompress(
        codec: &FloatCodec,
        precision: Precision,
        stream: &[u8],
        count: Option<usize>,
    ) -> flopack_core::Result<(Self, bool)> {
        fn split<T>(d: Decoded<T>) -> (Vec<T>, bool) {
            let clean = d.length_mismatch.is_none();
            (d.values, clean)
        }
        Ok(match precision {
            Precision::Single => {
                let (v, clean) = split(codec.decompress_floats(stream, count)?);
                (Dataset::Single(v), clean)
            }
            Precision::Double => {
                let (v, clean) = split(codec.decompress_doubles(stream, count)?);
                (Dataset::Double(v), clean)
            }
        })
    }

    /// Largest absolute difference over the common prefix of two datasets.
    pub fn max_abs_error(&self, other: &Dataset) -> f64 {
        match (self, other) {
            (Dataset::Single(a), Dataset::Single(b)) => max_abs_diff(a, b),
            (Dataset::Double(a), Dataset::Double(b)) => max_abs_diff(a, b),
            _ => max_abs_diff(&self.to_f64(), &other.to_f64()),
        }
    }

    /// Keep only values within `[min, max]`.
    pub fn retain_range(&mut self, min: f64, max: f64) {
        match self {
            Dataset::Single(v) => v.retain(|&x| (x as f64) >= min && (x as f64) <= max),
            Dataset::Double(v) => v.retain(|&x| x >= min && x <= max),
        }
    }
}

/// Random walk starting at 300.0 with steps in (-1, 1), driven by an LCG.
pub fn random_walk(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = seed;
    let mut point = 300.0f64;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let step = ((rng >> 33) % 2000) as f64 / 1000.0 - 1.0;
            point += step;
            point
        })
        .collect()
}
