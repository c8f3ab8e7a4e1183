//! Codec configuration.

use serde::{Deserialize, Serialize};

use crate::element::{ByteOrder, Precision};
use crate::error::FlopackError;

/// Which stream layout to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// Versioned header with magic, precision, element count and checksum.
    Framed,
    /// Headerless layout: total length and lossy bits, then plane frames.
    /// Precision, byte order, compressor and element count travel out of band.
    Legacy,
}

impl Default for StreamFormat {
    fn default() -> Self {
        StreamFormat::Framed
    }
}

/// Settings shared by every compress/decompress call of a [`FloatCodec`].
///
/// [`FloatCodec`]: crate::FloatCodec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Compression level; `None` uses the compressor's default.
    #[serde(default)]
    pub level: Option<i32>,

    /// High-order bits guaranteed to survive; `None` keeps every bit.
    #[serde(default)]
    pub protect_bits: Option<u16>,

    /// Byte significance order used for both layout and loss.
    #[serde(default)]
    pub byte_order: ByteOrder,

    #[serde(default)]
    pub format: StreamFormat,

    /// Compress every kept plane without consulting the entropy classifier.
    #[serde(default = "default_force_compression")]
    pub force_compression: bool,

    /// Store a compressed plane raw when compression does not shrink it.
    #[serde(default)]
    pub raw_fallback: bool,

    /// Compress planes concurrently.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            level: None,
            protect_bits: None,
            byte_order: ByteOrder::default(),
            format: StreamFormat::default(),
            force_compression: default_force_compression(),
            raw_fallback: false,
            parallel: false,
        }
    }
}

impl CodecConfig {
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_protect_bits(mut self, bits: u16) -> Self {
        self.protect_bits = Some(bits);
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_format(mut self, format: StreamFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_force_compression(mut self, force: bool) -> Self {
        self.force_compression = force;
        self
    }

    pub fn with_raw_fallback(mut self, enabled: bool) -> Self {
        self.raw_fallback = enabled;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Reject settings no element type can satisfy. Per-type and
    /// per-compressor limits are checked again when encoding.
    pub fn validate(&self) -> crate::Result<()> {
        let widest = Precision::Double.bits();
        match self.protect_bits {
            Some(bits) if bits > widest => Err(FlopackError::InvalidConfig(format!(
                "protect_bits is {} but no element has more than {} bits",
                bits, widest
            ))),
            _ => Ok(()),
        }
    }
}

fn default_force_compression() -> bool {
    true
}
