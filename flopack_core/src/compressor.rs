use std::ops::RangeInclusive;

/// Smallest scratch buffer handed to [`Compressor::compress`], so tiny planes
/// still have room for a compressor's frame header.
pub const MIN_SCRATCH: usize = 64;

/// Scratch capacity for compressing a plane of `len` bytes: twice the plane
/// length, never less than [`MIN_SCRATCH`].
#[inline]
pub fn scratch_capacity(len: usize) -> usize {
    len.saturating_mul(2).max(MIN_SCRATCH)
}

/// Generic lossless byte compressor applied to each kept plane.
///
/// Implementations must be symmetric and stateless across calls: a plane
/// compressed at any level decompresses with [`decompress`] alone, given a
/// destination of exactly the original length.
///
/// [`decompress`]: Compressor::decompress
pub trait Compressor: Send + Sync {
    /// Stable id recorded in the framed stream header.
    fn id(&self) -> u16;

    /// Human-readable name for CLI display.
    fn name(&self) -> &'static str;

    /// Levels this compressor accepts.
    fn levels(&self) -> RangeInclusive<i32>;

    /// Level used when the configuration does not name one.
    fn default_level(&self) -> i32;

    /// Compress `src` into `dst`, returning the number of bytes written.
    ///
    /// `dst` is sized by [`scratch_capacity`]; running out of room is an error.
    fn compress(&self, dst: &mut [u8], src: &[u8], level: i32) -> anyhow::Result<usize>;

    /// Decompress `src` into `dst`, returning the number of bytes written.
    ///
    /// `dst` has exactly the original plane length.
    fn decompress(&self, dst: &mut [u8], src: &[u8]) -> anyhow::Result<usize>;
}
