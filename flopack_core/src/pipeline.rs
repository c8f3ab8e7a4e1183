//! Per-plane encode and decode.
//!
//! # Stream layout
//! ```text
//! [HEADER]                      ← framed (40 bytes) or legacy (10 bytes)
//! [FRAME 0] [FRAME 1] ... [FRAME P-1]
//!   code:i32 | payload_len:u64 | payload (absent for dropped planes)
//! ← header patched with the final length (and checksum when framed)
//! ```
//! The framed checksum covers the header itself, so no header field is
//! trusted until it verifies.
//! Frames are positional: frame `k` always holds byte position `k`.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::compressor::{scratch_capacity, Compressor};
use crate::config::StreamFormat;
use crate::element::{ByteOrder, Precision};
use crate::entropy;
use crate::error::FlopackError;
use crate::format::{
    stream_checksum, FrameHeader, FramedHeader, LegacyHeader, StreamReader, FORMAT_VERSION,
    FRAMED_HEADER_SIZE, LEGACY_HEADER_SIZE,
};
use crate::policy::{self, PlaneCode};
use crate::transform::BytePlanes;

/// Options that shape how planes are stored.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub byte_order: ByteOrder,
    pub format: StreamFormat,
    pub force_compression: bool,
    pub raw_fallback: bool,
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::native(),
            format: StreamFormat::Framed,
            force_compression: true,
            raw_fallback: false,
            parallel: false,
        }
    }
}

/// What happened to one plane during encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneReport {
    pub position: usize,
    pub code: PlaneCode,
    /// Entropy classifier score; only computed when compression is not forced.
    pub score: Option<u8>,
    pub raw_len: usize,
    /// Payload bytes written after the frame prefix.
    pub stored_len: usize,
}

/// Per-plane layout of one encoded stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeReport {
    pub lossy_bits: u16,
    pub planes: Vec<PlaneReport>,
    pub total_len: usize,
}

impl EncodeReport {
    pub fn count(&self, code: PlaneCode) -> usize {
        self.planes.iter().filter(|p| p.code == code).count()
    }

    /// Compact layout string such as `"-1 -1 1 1 1 1 1 1"`.
    pub fn layout(&self) -> String {
        self.planes
            .iter()
            .map(|p| p.code.as_i32().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Consumed byte count did not match the input length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub consumed: u64,
    pub declared: u64,
}

impl From<LengthMismatch> for FlopackError {
    fn from(m: LengthMismatch) -> Self {
        FlopackError::StreamLengthMismatch {
            consumed: m.consumed,
            declared: m.declared,
        }
    }
}

/// Planes recovered from a stream.
#[derive(Debug)]
pub struct DecodedPlanes {
    pub planes: BytePlanes,
    pub lossy_bits: u16,
    pub byte_order: ByteOrder,
    pub length_mismatch: Option<LengthMismatch>,
}

/// Out-of-band parameters a legacy stream needs for decoding.
#[derive(Debug, Clone, Copy)]
pub struct LegacyParams {
    pub precision: Precision,
    pub byte_order: ByteOrder,
    pub element_count: usize,
}

enum Payload {
    Dropped,
    Raw,
    Packed(Vec<u8>),
}

/// Encodes byte planes into a stream and back, delegating each kept plane to
/// a generic [`Compressor`].
pub struct PlanePipeline<'a> {
    compressor: &'a dyn Compressor,
    options: PipelineOptions,
}

impl<'a> PlanePipeline<'a> {
    pub fn new(compressor: &'a dyn Compressor, options: PipelineOptions) -> Self {
        Self {
            compressor,
            options,
        }
    }

    fn check_level(&self, level: i32) -> crate::Result<()> {
        let levels = self.compressor.levels();
        if !levels.contains(&level) {
            return Err(FlopackError::InvalidLevel {
                level,
                min: *levels.start(),
                max: *levels.end(),
            });
        }
        Ok(())
    }

    /// Encode `planes`, discarding `lossy_bits` low-order bits per element.
    pub fn encode(
        &self,
        mut planes: BytePlanes,
        level: i32,
        lossy_bits: u16,
    ) -> crate::Result<(Vec<u8>, EncodeReport)> {
        let precision = Precision::try_from(planes.width())?;
        self.check_level(level)?;
        let codes = policy::plane_codes(precision, lossy_bits, self.options.byte_order)?;

        let plane_len = planes.plane_len();
        let partial = policy::partial_bits(lossy_bits);
        let mut scores = vec![None; codes.len()];
        for (k, (plane, &code)) in planes.planes_mut().iter_mut().zip(&codes).enumerate() {
            if code == PlaneCode::Masked {
                policy::mask_bits(plane, partial);
            }
            if code.is_compressed() && !self.options.force_compression {
                scores[k] = Some(entropy::classify(plane));
            }
        }

        let compress = |(k, plane): (usize, &[u8])| self.compress_plane(k, plane, codes[k], level);
        let payloads: Vec<Payload> = if self.options.parallel {
            let refs: Vec<&[u8]> = planes.iter().collect();
            refs.into_par_iter()
                .enumerate()
                .map(compress)
                .collect::<crate::Result<_>>()?
        } else {
            planes.iter().enumerate().map(compress).collect::<crate::Result<_>>()?
        };

        let header_size = match self.options.format {
            StreamFormat::Framed => FRAMED_HEADER_SIZE,
            StreamFormat::Legacy => LEGACY_HEADER_SIZE,
        };
        let mut out = Vec::with_capacity(header_size + plane_len * codes.len() / 2 + 128);
        out.resize(header_size, 0);

        let mut reports = Vec::with_capacity(codes.len());
        for (k, payload) in payloads.iter().enumerate() {
            let plane = planes.plane(k);
            let (code, body): (PlaneCode, &[u8]) = match payload {
                Payload::Dropped => (PlaneCode::Dropped, &[] as &[u8]),
                Payload::Raw => (PlaneCode::Plain, plane),
                Payload::Packed(bytes) => (codes[k], bytes.as_slice()),
            };
            let frame = FrameHeader {
                code,
                payload_len: match payload {
                    Payload::Packed(bytes) => bytes.len() as u64,
                    _ => plane_len as u64,
                },
            };
            out.extend_from_slice(&frame.to_bytes());
            out.extend_from_slice(body);

            debug!(
                plane = k,
                code = code.label(),
                score = ?scores[k],
                raw_len = plane_len,
                stored_len = body.len(),
                "encoded plane"
            );
            reports.push(PlaneReport {
                position: k,
                code,
                score: scores[k],
                raw_len: plane_len,
                stored_len: body.len(),
            });
        }

        let total_len = out.len();
        match self.options.format {
            StreamFormat::Framed => {
                let mut header = FramedHeader {
                    version: FORMAT_VERSION,
                    precision,
                    byte_order: self.options.byte_order,
                    compressor_id: self.compressor.id(),
                    lossy_bits,
                    element_count: plane_len as u64,
                    total_len: total_len as u64,
                    checksum: 0,
                };
                header.checksum = stream_checksum(&header.to_bytes(), &out[FRAMED_HEADER_SIZE..]);
                out[..FRAMED_HEADER_SIZE].copy_from_slice(&header.to_bytes());
            }
            StreamFormat::Legacy => {
                let header = LegacyHeader {
                    total_len: total_len as u64,
                    lossy_bits,
                };
                out[..LEGACY_HEADER_SIZE].copy_from_slice(&header.to_bytes());
            }
        }

        let report = EncodeReport {
            lossy_bits,
            planes: reports,
            total_len,
        };
        debug!(layout = %report.layout(), total_len, "encoded stream");
        Ok((out, report))
    }

    fn compress_plane(
        &self,
        k: usize,
        plane: &[u8],
        code: PlaneCode,
        level: i32,
    ) -> crate::Result<Payload> {
        match code {
            PlaneCode::Dropped => Ok(Payload::Dropped),
            PlaneCode::Plain => Ok(Payload::Raw),
            // Nothing to hand the compressor; an empty payload decodes to an empty plane.
            _ if plane.is_empty() => Ok(Payload::Packed(Vec::new())),
            PlaneCode::Compressed | PlaneCode::Masked => {
                let mut scratch = vec![0u8; scratch_capacity(plane.len())];
                let written = self
                    .compressor
                    .compress(&mut scratch, plane, level)
                    .map_err(|e| FlopackError::compressor(k, e))?;
                if written > scratch.len() {
                    return Err(FlopackError::compressor(
                        k,
                        anyhow::anyhow!(
                            "{} reported {} bytes written into a {} byte buffer",
                            self.compressor.name(),
                            written,
                            scratch.len()
                        ),
                    ));
                }
                if self.options.raw_fallback && code == PlaneCode::Compressed && written >= plane.len() {
                    return Ok(Payload::Raw);
                }
                scratch.truncate(written);
                Ok(Payload::Packed(scratch))
            }
        }
    }

    /// Decode a framed stream. Precision, byte order and element count come
    /// from the header; the header's compressor id must match this pipeline's.
    pub fn decode(&self, stream: &[u8]) -> crate::Result<DecodedPlanes> {
        let header = FramedHeader::parse(stream)?;
        let end = clamp_len(header.total_len, stream.len());
        let head: &[u8; FRAMED_HEADER_SIZE] = stream
            .get(..FRAMED_HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| FlopackError::corrupt("truncated framed header"))?;
        let body = stream.get(FRAMED_HEADER_SIZE..end).unwrap_or(&[]);
        let actual = stream_checksum(head, body);
        if actual != header.checksum {
            return Err(FlopackError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }
        if header.compressor_id != self.compressor.id() {
            return Err(FlopackError::corrupt(format!(
                "compressor mismatch: stream uses compressor {} but {} has id {}",
                header.compressor_id,
                self.compressor.name(),
                self.compressor.id()
            )));
        }
        let element_count = usize::try_from(header.element_count)
            .map_err(|_| FlopackError::corrupt("element count does not fit in memory"))?;
        policy::check_lossy(header.precision, header.lossy_bits)?;
        self.decode_frames(
            &stream[..end],
            FRAMED_HEADER_SIZE,
            header.precision,
            header.byte_order,
            element_count,
            header.lossy_bits,
            &[stream.len() as u64],
        )
    }

    /// Decode a legacy stream with out-of-band parameters.
    ///
    /// Frames are read up to the end of `stream`. The header's length field
    /// is only compared against what was consumed, so streams whose writer
    /// stored the raw array size there (`count * width`) still decode, with
    /// a length mismatch reported.
    pub fn decode_legacy(&self, stream: &[u8], params: LegacyParams) -> crate::Result<DecodedPlanes> {
        let header = LegacyHeader::parse(stream)?;
        policy::check_lossy(params.precision, header.lossy_bits)?;
        self.decode_frames(
            stream,
            LEGACY_HEADER_SIZE,
            params.precision,
            params.byte_order,
            params.element_count,
            header.lossy_bits,
            &[header.total_len, stream.len() as u64],
        )
    }

    /// Walk and restore the frames in `stream[start..]`. `declared` lists the
    /// lengths the consumed byte count must match; the first that differs is
    /// reported as a length mismatch.
    #[allow(clippy::too_many_arguments)]
    fn decode_frames(
        &self,
        stream: &[u8],
        start: usize,
        precision: Precision,
        byte_order: ByteOrder,
        plane_len: usize,
        lossy_bits: u16,
        declared: &[u64],
    ) -> crate::Result<DecodedPlanes> {
        let mut r = StreamReader::at(stream, start);

        // Walk every frame first so a truncated stream fails before any
        // decompression work.
        let mut frames = Vec::with_capacity(precision.width());
        for k in 0..precision.width() {
            let frame = FrameHeader::read(&mut r)?;
            let payload = match frame.code {
                PlaneCode::Dropped | PlaneCode::Plain => {
                    if frame.payload_len != plane_len as u64 {
                        return Err(FlopackError::corrupt(format!(
                            "plane {} is {} but records {} bytes, expected {}",
                            k,
                            frame.code.label(),
                            frame.payload_len,
                            plane_len
                        )));
                    }
                    r.take(frame.stored_len() as usize)?
                }
                PlaneCode::Compressed | PlaneCode::Masked => {
                    let len = usize::try_from(frame.payload_len)
                        .map_err(|_| FlopackError::corrupt(format!("plane {} payload too large", k)))?;
                    r.take(len)?
                }
            };
            debug!(plane = k, code = frame.code.label(), payload_len = frame.payload_len, "decoding plane");
            frames.push((frame.code, payload));
        }
        let consumed = r.position() as u64;

        let mut planes = BytePlanes::try_zeroed(precision, plane_len)?;
        let restore = |(k, (plane, &(code, payload))): (usize, (&mut Vec<u8>, &(PlaneCode, &[u8])))| {
            self.restore_plane(k, plane, code, payload)
        };
        if self.options.parallel {
            planes
                .planes_mut()
                .par_iter_mut()
                .zip(frames.par_iter())
                .enumerate()
                .try_for_each(restore)?;
        } else {
            planes
                .planes_mut()
                .iter_mut()
                .zip(frames.iter())
                .enumerate()
                .try_for_each(restore)?;
        }

        let length_mismatch = declared
            .iter()
            .find(|&&d| d != consumed)
            .map(|&declared| {
                warn!(consumed, declared, "stream length mismatch after decoding all planes");
                LengthMismatch { consumed, declared }
            });

        Ok(DecodedPlanes {
            planes,
            lossy_bits,
            byte_order,
            length_mismatch,
        })
    }

    fn restore_plane(
        &self,
        k: usize,
        plane: &mut [u8],
        code: PlaneCode,
        payload: &[u8],
    ) -> crate::Result<()> {
        match code {
            // already zero-filled
            PlaneCode::Dropped => Ok(()),
            PlaneCode::Plain => {
                plane.copy_from_slice(payload);
                Ok(())
            }
            PlaneCode::Compressed | PlaneCode::Masked => {
                if payload.is_empty() && plane.is_empty() {
                    return Ok(());
                }
                let written = self
                    .compressor
                    .decompress(plane, payload)
                    .map_err(|e| FlopackError::compressor(k, e))?;
                if written != plane.len() {
                    return Err(FlopackError::corrupt(format!(
                        "plane {} decompressed to {} bytes, expected {}",
                        k,
                        written,
                        plane.len()
                    )));
                }
                Ok(())
            }
        }
    }
}

fn clamp_len(declared: u64, actual: usize) -> usize {
    usize::try_from(declared).map_or(actual, |d| d.min(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::to_planes;
    use std::ops::RangeInclusive;

    /// Stores bytes verbatim; lets these tests exercise framing without a real compressor.
    struct Verbatim;

    impl Compressor for Verbatim {
        fn id(&self) -> u16 {
            42
        }
        fn name(&self) -> &'static str {
            "verbatim"
        }
        fn levels(&self) -> RangeInclusive<i32> {
            1..=9
        }
        fn default_level(&self) -> i32 {
            1
        }
        fn compress(&self, dst: &mut [u8], src: &[u8], _level: i32) -> anyhow::Result<usize> {
            dst[..src.len()].copy_from_slice(src);
            Ok(src.len())
        }
        fn decompress(&self, dst: &mut [u8], src: &[u8]) -> anyhow::Result<usize> {
            anyhow::ensure!(dst.len() == src.len(), "size mismatch");
            dst.copy_from_slice(src);
            Ok(src.len())
        }
    }

    struct Broken;

    impl Compressor for Broken {
        fn id(&self) -> u16 {
            99
        }
        fn name(&self) -> &'static str {
            "broken"
        }
        fn levels(&self) -> RangeInclusive<i32> {
            1..=9
        }
        fn default_level(&self) -> i32 {
            1
        }
        fn compress(&self, _dst: &mut [u8], _src: &[u8], _level: i32) -> anyhow::Result<usize> {
            anyhow::bail!("out of space")
        }
        fn decompress(&self, _dst: &mut [u8], _src: &[u8]) -> anyhow::Result<usize> {
            anyhow::bail!("bad data")
        }
    }

    fn options(format: StreamFormat) -> PipelineOptions {
        PipelineOptions {
            byte_order: ByteOrder::Little,
            format,
            ..PipelineOptions::default()
        }
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 300.0 + i as f64 * 0.125).collect()
    }

    #[test]
    fn legacy_layout_matches_wire_format() {
        let planes = to_planes(&[1.5f32, 2.5], ByteOrder::Little);
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Legacy));
        let (stream, report) = pipeline.encode(planes, 1, 8).unwrap();

        // header + 4 frames, first dropped (no payload), three with 2 bytes each
        assert_eq!(stream.len(), 10 + 4 * 12 + 3 * 2);
        assert_eq!(&stream[0..8], &(stream.len() as u64).to_le_bytes());
        assert_eq!(&stream[8..10], &8u16.to_le_bytes());
        assert_eq!(&stream[10..14], &(-1i32).to_le_bytes());
        assert_eq!(&stream[14..22], &2u64.to_le_bytes());
        assert_eq!(&stream[22..26], &1i32.to_le_bytes());
        assert_eq!(report.layout(), "-1 1 1 1");
        assert_eq!(report.total_len, stream.len());
    }

    #[test]
    fn framed_roundtrip_reports_no_mismatch() {
        let values = ramp(100);
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let planes = to_planes(&values, ByteOrder::Little);
        let (stream, _) = pipeline.encode(planes.clone(), 3, 0).unwrap();
        let decoded = pipeline.decode(&stream).unwrap();
        assert_eq!(decoded.planes, planes);
        assert!(decoded.length_mismatch.is_none());
        assert_eq!(decoded.byte_order, ByteOrder::Little);
    }

    #[test]
    fn masked_plane_has_low_bits_cleared() {
        let values = ramp(64);
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let (stream, report) = pipeline.encode(to_planes(&values, ByteOrder::Little), 1, 11).unwrap();
        assert_eq!(report.planes[0].code, PlaneCode::Dropped);
        assert_eq!(report.planes[1].code, PlaneCode::Masked);
        let decoded = pipeline.decode(&stream).unwrap();
        assert!(decoded.planes.plane(0).iter().all(|&b| b == 0));
        assert!(decoded.planes.plane(1).iter().all(|&b| b & 0b111 == 0));
    }

    #[test]
    fn validation_happens_before_work() {
        let pipeline = PlanePipeline::new(&Broken, options(StreamFormat::Framed));
        let planes = to_planes(&ramp(8), ByteOrder::Little);
        assert!(matches!(
            pipeline.encode(planes.clone(), 0, 0),
            Err(FlopackError::InvalidLevel { level: 0, min: 1, max: 9 })
        ));
        assert!(matches!(
            pipeline.encode(planes.clone(), 1, 65),
            Err(FlopackError::InvalidLossyRange { .. })
        ));
        // dropping everything never reaches the broken compressor
        assert!(pipeline.encode(planes, 1, 64).is_ok());
    }

    #[test]
    fn compressor_failure_aborts_encode() {
        let pipeline = PlanePipeline::new(&Broken, options(StreamFormat::Framed));
        let planes = to_planes(&ramp(8), ByteOrder::Little);
        match pipeline.encode(planes, 1, 16) {
            Err(FlopackError::CompressorFailure { plane, .. }) => assert_eq!(plane, 2),
            other => panic!("expected compressor failure, got {other:?}"),
        }
    }

    #[test]
    fn trailing_bytes_are_reported_not_fatal() {
        let values = ramp(32);
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Legacy));
        let (mut stream, _) = pipeline.encode(to_planes(&values, ByteOrder::Little), 1, 0).unwrap();
        let clean_len = stream.len() as u64;
        stream.extend_from_slice(&[0xAA; 5]);
        let params = LegacyParams {
            precision: Precision::Double,
            byte_order: ByteOrder::Little,
            element_count: 32,
        };
        let decoded = pipeline.decode_legacy(&stream, params).unwrap();
        assert_eq!(
            decoded.length_mismatch,
            Some(LengthMismatch {
                consumed: clean_len,
                declared: clean_len + 5
            })
        );
        assert_eq!(decoded.planes, to_planes(&values, ByteOrder::Little));
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Legacy));
        let (stream, _) = pipeline.encode(to_planes(&ramp(32), ByteOrder::Little), 1, 0).unwrap();
        let params = LegacyParams {
            precision: Precision::Double,
            byte_order: ByteOrder::Little,
            element_count: 32,
        };
        assert!(matches!(
            pipeline.decode_legacy(&stream[..stream.len() - 3], params),
            Err(FlopackError::CorruptStream(_))
        ));
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let (mut stream, _) = pipeline.encode(to_planes(&ramp(32), ByteOrder::Little), 1, 0).unwrap();
        let last = stream.len() - 1;
        stream[last] ^= 0xFF;
        assert!(matches!(
            pipeline.decode(&stream),
            Err(FlopackError::ChecksumMismatch { .. })
        ));
    }

    /// Rewrite header fields and recompute a valid checksum over the result.
    fn resign(stream: &mut [u8], edit: impl FnOnce(&mut FramedHeader)) {
        let mut header = FramedHeader::parse(stream).unwrap();
        edit(&mut header);
        header.checksum = stream_checksum(&header.to_bytes(), &stream[FRAMED_HEADER_SIZE..]);
        stream[..FRAMED_HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    #[test]
    fn flipped_element_count_fails_checksum() {
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let (mut stream, _) = pipeline.encode(to_planes(&ramp(1000), ByteOrder::Little), 1, 0).unwrap();
        // top byte of element_count
        stream[19] ^= 0x40;
        assert!(matches!(
            pipeline.decode(&stream),
            Err(FlopackError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rewritten_lossy_bits_fails_checksum() {
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let (mut stream, _) = pipeline.encode(to_planes(&ramp(64), ByteOrder::Little), 1, 0).unwrap();
        stream[10] = 40;
        assert!(matches!(
            pipeline.decode(&stream),
            Err(FlopackError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn element_count_must_agree_with_dropped_frames() {
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let (mut stream, _) = pipeline.encode(to_planes(&ramp(32), ByteOrder::Little), 1, 8).unwrap();
        resign(&mut stream, |h| h.element_count = 33);
        let err = pipeline.decode(&stream).unwrap_err();
        assert!(matches!(err, FlopackError::CorruptStream(_)), "got: {err}");
        assert!(err.to_string().contains("plane 0 is dropped"), "got: {err}");
    }

    #[test]
    fn huge_element_count_is_an_error() {
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let (mut stream, _) = pipeline.encode(to_planes(&ramp(32), ByteOrder::Little), 1, 0).unwrap();
        resign(&mut stream, |h| h.element_count = u64::MAX / 4);
        assert!(matches!(
            pipeline.decode(&stream),
            Err(FlopackError::CorruptStream(_))
        ));
    }

    #[test]
    fn legacy_header_holding_raw_size_still_decodes() {
        let values = ramp(32);
        let pipeline = PlanePipeline::new(&Verbatim, options(StreamFormat::Legacy));
        let (mut stream, _) = pipeline.encode(to_planes(&values, ByteOrder::Little), 1, 0).unwrap();
        // uncompressed frames make the stream longer than count * width
        let raw_size = (values.len() * 8) as u64;
        stream[..8].copy_from_slice(&raw_size.to_le_bytes());
        let params = LegacyParams {
            precision: Precision::Double,
            byte_order: ByteOrder::Little,
            element_count: values.len(),
        };
        let decoded = pipeline.decode_legacy(&stream, params).unwrap();
        assert_eq!(decoded.planes, to_planes(&values, ByteOrder::Little));
        assert_eq!(
            decoded.length_mismatch,
            Some(LengthMismatch {
                consumed: stream.len() as u64,
                declared: raw_size
            })
        );
    }

    #[test]
    fn classifier_scores_only_when_not_forced() {
        let values = vec![3.25f64; 256];
        let forced = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let (_, report) = forced.encode(to_planes(&values, ByteOrder::Little), 1, 0).unwrap();
        assert!(report.planes.iter().all(|p| p.score.is_none()));

        let advisory = PlanePipeline::new(
            &Verbatim,
            PipelineOptions {
                force_compression: false,
                ..options(StreamFormat::Framed)
            },
        );
        let (_, report) = advisory.encode(to_planes(&values, ByteOrder::Little), 1, 16).unwrap();
        assert_eq!(report.planes[7].score, Some(entropy::MAX_SCORE));
        assert_eq!(report.planes[0].score, None);
        assert_eq!(report.count(PlaneCode::Compressed), 6);
    }

    #[test]
    fn raw_fallback_stores_incompressible_planes_plain() {
        let pipeline = PlanePipeline::new(
            &Verbatim,
            PipelineOptions {
                raw_fallback: true,
                ..options(StreamFormat::Framed)
            },
        );
        let planes = to_planes(&ramp(16), ByteOrder::Little);
        let (stream, report) = pipeline.encode(planes.clone(), 1, 12).unwrap();
        // the verbatim compressor never shrinks, so kept planes go plain; masked stays masked
        assert_eq!(report.planes[1].code, PlaneCode::Masked);
        assert_eq!(report.count(PlaneCode::Plain), 6);
        let decoded = pipeline.decode(&stream).unwrap();
        assert_eq!(decoded.planes.plane(7), planes.plane(7));
    }

    #[test]
    fn parallel_matches_sequential() {
        let values = ramp(500);
        let seq = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed));
        let par = PlanePipeline::new(
            &Verbatim,
            PipelineOptions {
                parallel: true,
                ..options(StreamFormat::Framed)
            },
        );
        let (a, _) = seq.encode(to_planes(&values, ByteOrder::Little), 1, 20).unwrap();
        let (b, _) = par.encode(to_planes(&values, ByteOrder::Little), 1, 20).unwrap();
        assert_eq!(a, b);
        assert_eq!(par.decode(&b).unwrap().planes, seq.decode(&a).unwrap().planes);
    }

    #[test]
    fn framed_decode_rejects_other_compressor() {
        let (stream, _) = PlanePipeline::new(&Verbatim, options(StreamFormat::Framed))
            .encode(to_planes(&ramp(4), ByteOrder::Little), 1, 0)
            .unwrap();
        let err = PlanePipeline::new(&Broken, options(StreamFormat::Framed))
            .decode(&stream)
            .unwrap_err();
        assert!(err.to_string().contains("compressor mismatch"), "got: {err}");
    }
}
