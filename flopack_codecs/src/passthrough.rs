use std::ops::RangeInclusive;

use flopack_core::format::COMPRESSOR_PASSTHROUGH;
use flopack_core::Compressor;

/// No-op compressor: "compressed" planes are stored verbatim.
///
/// Useful for:
/// - Verifying the plane framing independently of any real compressor.
/// - Measuring what the lossy policy alone saves.
pub struct PassThroughCompressor;

impl Compressor for PassThroughCompressor {
    fn id(&self) -> u16 {
        COMPRESSOR_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn levels(&self) -> RangeInclusive<i32> {
        0..=0
    }

    fn default_level(&self) -> i32 {
        0
    }

    fn compress(&self, dst: &mut [u8], src: &[u8], _level: i32) -> anyhow::Result<usize> {
        anyhow::ensure!(
            dst.len() >= src.len(),
            "passthrough needs {} bytes, buffer holds {}",
            src.len(),
            dst.len()
        );
        dst[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }

    fn decompress(&self, dst: &mut [u8], src: &[u8]) -> anyhow::Result<usize> {
        anyhow::ensure!(
            dst.len() == src.len(),
            "passthrough payload is {} bytes, plane is {}",
            src.len(),
            dst.len()
        );
        dst.copy_from_slice(src);
        Ok(src.len())
    }
}
