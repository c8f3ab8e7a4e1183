use std::sync::Arc;

use tracing::debug;

use crate::compressor::Compressor;
use crate::config::{CodecConfig, StreamFormat};
use crate::element::Element;
use crate::error::FlopackError;
use crate::pipeline::{EncodeReport, LegacyParams, LengthMismatch, PipelineOptions, PlanePipeline};
use crate::policy;
use crate::transform::{from_planes, to_planes};

/// An array recovered from a stream.
///
/// A stream whose consumed length disagrees with its input length still
/// decodes; the disagreement is carried in `length_mismatch`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub values: Vec<T>,
    pub lossy_bits: u16,
    pub length_mismatch: Option<LengthMismatch>,
}

impl<T> Decoded<T> {
    /// The values, or `StreamLengthMismatch` if the stream was not consumed exactly.
    pub fn into_strict(self) -> crate::Result<Vec<T>> {
        match self.length_mismatch {
            Some(m) => Err(m.into()),
            None => Ok(self.values),
        }
    }
}

/// Compresses and decompresses whole `f32`/`f64` arrays.
///
/// # Example
/// ```ignore
/// let codec = FloatCodec::new(CodecConfig::default().with_protect_bits(48), compressor);
/// let stream = codec.compress_doubles(&values)?;
/// let decoded = codec.decompress_doubles(&stream, None)?;
/// ```
pub struct FloatCodec {
    config: CodecConfig,
    compressor: Arc<dyn Compressor>,
}

impl FloatCodec {
    pub fn new(config: CodecConfig, compressor: Arc<dyn Compressor>) -> Self {
        Self { config, compressor }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn compressor(&self) -> &dyn Compressor {
        self.compressor.as_ref()
    }

    fn pipeline(&self) -> PlanePipeline<'_> {
        PlanePipeline::new(
            self.compressor.as_ref(),
            PipelineOptions {
                byte_order: self.config.byte_order,
                format: self.config.format,
                force_compression: self.config.force_compression,
                raw_fallback: self.config.raw_fallback,
                parallel: self.config.parallel,
            },
        )
    }

    fn level(&self) -> i32 {
        self.config.level.unwrap_or_else(|| self.compressor.default_level())
    }

    fn compress<T: Element>(&self, values: &[T]) -> crate::Result<(Vec<u8>, EncodeReport)> {
        let precision = T::PRECISION;
        let protect = self.config.protect_bits.unwrap_or(precision.bits());
        let lossy_bits = policy::lossy_from_protect(precision, protect)?;
        let planes = to_planes(values, self.config.byte_order);
        let (stream, report) = self.pipeline().encode(planes, self.level(), lossy_bits)?;
        debug!(
            elements = values.len(),
            width = precision.width(),
            lossy_bits,
            stream_len = stream.len(),
            "compressed array"
        );
        Ok((stream, report))
    }

    fn decompress<T: Element>(&self, stream: &[u8], count: Option<usize>) -> crate::Result<Decoded<T>> {
        let pipeline = self.pipeline();
        let decoded = match self.config.format {
            StreamFormat::Framed => {
                let decoded = pipeline.decode(stream)?;
                if decoded.planes.width() != T::PRECISION.width() {
                    return Err(FlopackError::InvalidPrecision(decoded.planes.width()));
                }
                if let Some(expected) = count {
                    if expected != decoded.planes.plane_len() {
                        return Err(FlopackError::corrupt(format!(
                            "stream holds {} elements, caller expected {}",
                            decoded.planes.plane_len(),
                            expected
                        )));
                    }
                }
                decoded
            }
            StreamFormat::Legacy => {
                let element_count = count.ok_or(FlopackError::ElementCountRequired)?;
                pipeline.decode_legacy(
                    stream,
                    LegacyParams {
                        precision: T::PRECISION,
                        byte_order: self.config.byte_order,
                        element_count,
                    },
                )?
            }
        };
        let values = from_planes(&decoded.planes, decoded.byte_order)?;
        debug!(elements = values.len(), lossy_bits = decoded.lossy_bits, "decompressed array");
        Ok(Decoded {
            values,
            lossy_bits: decoded.lossy_bits,
            length_mismatch: decoded.length_mismatch,
        })
    }

    pub fn compress_floats(&self, values: &[f32]) -> crate::Result<Vec<u8>> {
        self.compress(values).map(|(stream, _)| stream)
    }

    pub fn compress_doubles(&self, values: &[f64]) -> crate::Result<Vec<u8>> {
        self.compress(values).map(|(stream, _)| stream)
    }

    /// Like [`compress_floats`](Self::compress_floats), also returning the per-plane layout.
    pub fn compress_floats_with_report(&self, values: &[f32]) -> crate::Result<(Vec<u8>, EncodeReport)> {
        self.compress(values)
    }

    pub fn compress_doubles_with_report(&self, values: &[f64]) -> crate::Result<(Vec<u8>, EncodeReport)> {
        self.compress(values)
    }

    /// Decode an `f32` stream. `count` is required for legacy streams and,
    /// when given for framed streams, must match the header.
    pub fn decompress_floats(&self, stream: &[u8], count: Option<usize>) -> crate::Result<Decoded<f32>> {
        self.decompress(stream, count)
    }

    pub fn decompress_doubles(&self, stream: &[u8], count: Option<usize>) -> crate::Result<Decoded<f64>> {
        self.decompress(stream, count)
    }
}
