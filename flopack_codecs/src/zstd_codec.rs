use std::ops::RangeInclusive;

use flopack_core::format::COMPRESSOR_ZSTD;
use flopack_core::Compressor;

/// Zstandard plane compressor.
///
/// Each plane is compressed as one independent zstd frame straight into the
/// pipeline's scratch buffer; no streaming state survives between planes.
///
/// Best for: exponent and high-mantissa planes, which repeat heavily.
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn id(&self) -> u16 {
        COMPRESSOR_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    /// 1 = fast / larger, 22 = slow / smallest.
    fn levels(&self) -> RangeInclusive<i32> {
        1..=22
    }

    fn default_level(&self) -> i32 {
        3
    }

    fn compress(&self, dst: &mut [u8], src: &[u8], level: i32) -> anyhow::Result<usize> {
        let written = zstd::bulk::compress_to_buffer(src, dst, level)?;
        Ok(written)
    }

    fn decompress(&self, dst: &mut [u8], src: &[u8]) -> anyhow::Result<usize> {
        let written = zstd::bulk::decompress_to_buffer(src, dst)?;
        Ok(written)
    }
}
