use std::ops::RangeInclusive;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use flopack_core::format::COMPRESSOR_DEFLATE;
use flopack_core::Compressor;

/// zlib-framed deflate compressor, level-compatible with miniz's `compress2`.
///
/// Runs flate2's one-shot state machines directly over the caller's buffers,
/// so a plane that does not fit the scratch buffer fails instead of growing it.
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn id(&self) -> u16 {
        COMPRESSOR_DEFLATE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn levels(&self) -> RangeInclusive<i32> {
        1..=9
    }

    fn default_level(&self) -> i32 {
        6
    }

    fn compress(&self, dst: &mut [u8], src: &[u8], level: i32) -> anyhow::Result<usize> {
        let mut state = Compress::new(Compression::new(level as u32), true);
        match state.compress(src, dst, FlushCompress::Finish)? {
            Status::StreamEnd => Ok(state.total_out() as usize),
            _ => anyhow::bail!(
                "deflate output for {} input bytes exceeded {} byte buffer",
                src.len(),
                dst.len()
            ),
        }
    }

    fn decompress(&self, dst: &mut [u8], src: &[u8]) -> anyhow::Result<usize> {
        let mut state = Decompress::new(true);
        match state.decompress(src, dst, FlushDecompress::Finish)? {
            Status::StreamEnd => Ok(state.total_out() as usize),
            _ => anyhow::bail!(
                "deflate stream did not end within {} output bytes",
                dst.len()
            ),
        }
    }
}
