mod deflate_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use deflate_codec::DeflateCompressor;
pub use lz4_codec::Lz4Compressor;
pub use passthrough::PassThroughCompressor;
pub use zstd_codec::ZstdCompressor;

use flopack_core::format::{
    COMPRESSOR_DEFLATE, COMPRESSOR_LZ4, COMPRESSOR_PASSTHROUGH, COMPRESSOR_ZSTD,
};
use flopack_core::Compressor;
use std::sync::Arc;

/// Resolve a compressor from the id stored in a framed stream header.
pub fn compressor_by_id(id: u16) -> anyhow::Result<Arc<dyn Compressor>> {
    match id {
        COMPRESSOR_PASSTHROUGH => Ok(Arc::new(PassThroughCompressor)),
        COMPRESSOR_ZSTD => Ok(Arc::new(ZstdCompressor)),
        COMPRESSOR_LZ4 => Ok(Arc::new(Lz4Compressor)),
        COMPRESSOR_DEFLATE => Ok(Arc::new(DeflateCompressor)),
        _ => anyhow::bail!(
            "unknown compressor id {}; supported: 0 (passthrough), 1 (zstd), 2 (lz4), 3 (deflate)",
            id
        ),
    }
}

/// Resolve a compressor from a CLI-style name.
pub fn compressor_by_name(name: &str) -> anyhow::Result<Arc<dyn Compressor>> {
    match name {
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCompressor)),
        "zstd" | "z" => Ok(Arc::new(ZstdCompressor)),
        "lz4" | "l" => Ok(Arc::new(Lz4Compressor)),
        "deflate" | "zlib" | "d" => Ok(Arc::new(DeflateCompressor)),
        other => anyhow::bail!(
            "unknown compressor '{}'. Valid options: passthrough, zstd, lz4, deflate",
            other
        ),
    }
}
