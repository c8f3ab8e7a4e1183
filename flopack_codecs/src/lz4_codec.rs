use std::ops::RangeInclusive;

use flopack_core::format::COMPRESSOR_LZ4;
use flopack_core::Compressor;
use lz4_flex::block::{compress_into, decompress_into};

/// LZ4 block compressor.
///
/// Fastest decompression of the bundled compressors. The raw block format
/// carries no size prefix; the plane length already travels in the stream.
/// LZ4 has no levels, so the only accepted level is 1.
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn id(&self) -> u16 {
        COMPRESSOR_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn levels(&self) -> RangeInclusive<i32> {
        1..=1
    }

    fn default_level(&self) -> i32 {
        1
    }

    fn compress(&self, dst: &mut [u8], src: &[u8], _level: i32) -> anyhow::Result<usize> {
        compress_into(src, dst).map_err(|e| anyhow::anyhow!("lz4 compress error: {}", e))
    }

    fn decompress(&self, dst: &mut [u8], src: &[u8]) -> anyhow::Result<usize> {
        decompress_into(src, dst).map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))
    }
}
