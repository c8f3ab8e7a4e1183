use xxhash_rust::xxh3::Xxh3;

use crate::element::{ByteOrder, Precision};
use crate::error::FlopackError;
use crate::policy::PlaneCode;

/// Magic bytes opening a framed stream.
pub const MAGIC: &[u8; 4] = b"FLPK";

/// Current framed stream version.
pub const FORMAT_VERSION: u16 = 1;

/// Fixed size of the framed header in bytes.
///   magic[4] + version:u16 + precision:u8 + byte_order:u8
///   + compressor_id:u16 + lossy_bits:u16 + element_count:u64
///   + total_len:u64 + checksum:u64 + reserved[4]
///   = 4 + 2 + 1 + 1 + 2 + 2 + 8 + 8 + 8 + 4 = 40
pub const FRAMED_HEADER_SIZE: usize = 40;

/// Offset of the checksum field inside the framed header.
const CHECKSUM_OFFSET: usize = 28;

/// Legacy header: total_len:u64 + lossy_bits:u16.
pub const LEGACY_HEADER_SIZE: usize = 10;

/// Per-plane frame prefix: code:i32 + payload_len:u64.
pub const FRAME_HEADER_SIZE: usize = 12;

// ── Compressor IDs ─────────────────────────────────────────────────────────

pub const COMPRESSOR_PASSTHROUGH: u16 = 0;
pub const COMPRESSOR_ZSTD: u16 = 1;
pub const COMPRESSOR_LZ4: u16 = 2;
pub const COMPRESSOR_DEFLATE: u16 = 3;

// ── Framed header ──────────────────────────────────────────────────────────

/// Decoded representation of the 40-byte framed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedHeader {
    pub version: u16,
    pub precision: Precision,
    pub byte_order: ByteOrder,
    pub compressor_id: u16,
    pub lossy_bits: u16,
    pub element_count: u64,
    /// Length of the whole stream, header included.
    pub total_len: u64,
    /// xxh3-64 of the header (this field zeroed) followed by every frame byte.
    pub checksum: u64,
}

impl FramedHeader {
    pub fn to_bytes(&self) -> [u8; FRAMED_HEADER_SIZE] {
        let mut buf = [0u8; FRAMED_HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.precision.width() as u8;
        buf[7] = self.byte_order.to_byte();
        buf[8..10].copy_from_slice(&self.compressor_id.to_le_bytes());
        buf[10..12].copy_from_slice(&self.lossy_bits.to_le_bytes());
        buf[12..20].copy_from_slice(&self.element_count.to_le_bytes());
        buf[20..28].copy_from_slice(&self.total_len.to_le_bytes());
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].copy_from_slice(&self.checksum.to_le_bytes());
        // reserved[4] stays zero
        buf
    }

    /// Parse the header at the start of `stream`, checking magic, version,
    /// precision and byte order.
    pub fn parse(stream: &[u8]) -> crate::Result<Self> {
        let mut r = StreamReader::new(stream);
        let magic = r.take(4)?;
        if magic != MAGIC {
            return Err(FlopackError::corrupt("invalid magic bytes, not a framed flopack stream"));
        }
        let version = r.read_u16()?;
        if version != FORMAT_VERSION {
            return Err(FlopackError::corrupt(format!(
                "unsupported stream version {} (only version {} is supported)",
                version, FORMAT_VERSION
            )));
        }
        let precision = Precision::try_from(r.read_u8()? as usize)?;
        let order_byte = r.read_u8()?;
        let byte_order = ByteOrder::from_byte(order_byte)
            .ok_or_else(|| FlopackError::corrupt(format!("unknown byte order tag {}", order_byte)))?;
        let compressor_id = r.read_u16()?;
        let lossy_bits = r.read_u16()?;
        let element_count = r.read_u64()?;
        let total_len = r.read_u64()?;
        let checksum = r.read_u64()?;
        r.take(4)?;
        Ok(Self {
            version,
            precision,
            byte_order,
            compressor_id,
            lossy_bits,
            element_count,
            total_len,
            checksum,
        })
    }
}

/// Checksum of a framed stream: the header with its checksum field zeroed,
/// then the frame bytes. Every header field is covered.
pub fn stream_checksum(header: &[u8; FRAMED_HEADER_SIZE], frames: &[u8]) -> u64 {
    let mut head = *header;
    head[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].fill(0);
    let mut hasher = Xxh3::new();
    hasher.update(&head);
    hasher.update(frames);
    hasher.digest()
}

// ── Legacy header ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyHeader {
    pub total_len: u64,
    pub lossy_bits: u16,
}

impl LegacyHeader {
    pub fn to_bytes(&self) -> [u8; LEGACY_HEADER_SIZE] {
        let mut buf = [0u8; LEGACY_HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.total_len.to_le_bytes());
        buf[8..10].copy_from_slice(&self.lossy_bits.to_le_bytes());
        buf
    }

    pub fn parse(stream: &[u8]) -> crate::Result<Self> {
        let mut r = StreamReader::new(stream);
        Ok(Self {
            total_len: r.read_u64()?,
            lossy_bits: r.read_u16()?,
        })
    }
}

// ── Plane frame ────────────────────────────────────────────────────────────

/// The fixed prefix of one plane frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub code: PlaneCode,
    /// Compressed length for compressed codes, raw plane length otherwise.
    pub payload_len: u64,
}

impl FrameHeader {
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.code.as_i32().to_le_bytes());
        buf[4..12].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    /// Bytes of payload following the prefix in the stream.
    pub fn stored_len(&self) -> u64 {
        match self.code {
            PlaneCode::Dropped => 0,
            _ => self.payload_len,
        }
    }

    pub(crate) fn read(r: &mut StreamReader<'_>) -> crate::Result<Self> {
        let code = PlaneCode::try_from(r.read_i32()?)?;
        let payload_len = r.read_u64()?;
        Ok(Self { code, payload_len })
    }
}

// ── Bounds-checked reader ──────────────────────────────────────────────────

/// Cursor over a stream that never reads past its end.
pub(crate) struct StreamReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> crate::Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                FlopackError::corrupt(format!(
                    "truncated stream: need {} bytes at offset {}, only {} available",
                    n,
                    self.pos,
                    self.buf.len().saturating_sub(self.pos)
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u8(&mut self) -> crate::Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> crate::Result<u16> {
        let mut b = [0u8; 2];
        b.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(b))
    }

    fn read_i32(&mut self) -> crate::Result<i32> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(b))
    }

    fn read_u64(&mut self) -> crate::Result<u64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }
}

// ── Inspection ─────────────────────────────────────────────────────────────

/// Header and frame layout of a framed stream, gathered without decompressing.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    pub header: FramedHeader,
    pub frames: Vec<FrameHeader>,
}

impl StreamSummary {
    /// Raw size of the array the stream encodes.
    pub fn raw_size(&self) -> u64 {
        self.header.element_count * self.header.precision.width() as u64
    }

    /// Compression ratio (raw / stream).
    pub fn ratio(&self) -> f64 {
        if self.header.total_len == 0 {
            return 1.0;
        }
        self.raw_size() as f64 / self.header.total_len as f64
    }
}

/// Walk a framed stream's header and plane frames.
pub fn inspect(stream: &[u8]) -> crate::Result<StreamSummary> {
    let header = FramedHeader::parse(stream)?;
    let mut r = StreamReader::at(stream, FRAMED_HEADER_SIZE);
    let mut frames = Vec::with_capacity(header.precision.width());
    for _ in 0..header.precision.width() {
        let frame = FrameHeader::read(&mut r)?;
        r.take(frame.stored_len() as usize)?;
        frames.push(frame);
    }
    Ok(StreamSummary { header, frames })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FramedHeader {
        FramedHeader {
            version: FORMAT_VERSION,
            precision: Precision::Double,
            byte_order: ByteOrder::Big,
            compressor_id: 1,
            lossy_bits: 16,
            element_count: 1024,
            total_len: 9000,
            checksum: 0xDEAD_BEEF_0BAD_F00D,
        }
    }

    #[test]
    fn framed_header_layout() {
        let bytes = sample_header().to_bytes();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(bytes[6], 8);
        assert_eq!(bytes[7], 1);
        assert_eq!(FramedHeader::parse(&bytes).unwrap(), sample_header());
    }

    #[test]
    fn framed_header_rejects_bad_magic_and_version() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(FramedHeader::parse(&bytes), Err(FlopackError::CorruptStream(_))));

        let mut bytes = sample_header().to_bytes();
        bytes[4] = 9;
        let err = FramedHeader::parse(&bytes).unwrap_err().to_string();
        assert!(err.contains("unsupported stream version 9"), "got: {err}");

        let mut bytes = sample_header().to_bytes();
        bytes[6] = 6;
        assert!(matches!(FramedHeader::parse(&bytes), Err(FlopackError::InvalidPrecision(6))));
    }

    #[test]
    fn checksum_covers_header_but_not_itself() {
        let frames = [1u8, 2, 3];
        let base = sample_header().to_bytes();
        let sum = stream_checksum(&base, &frames);

        let mut resigned = sample_header();
        resigned.checksum = sum;
        assert_eq!(stream_checksum(&resigned.to_bytes(), &frames), sum);

        let mut recount = sample_header();
        recount.element_count += 1;
        assert_ne!(stream_checksum(&recount.to_bytes(), &frames), sum);
        assert_ne!(stream_checksum(&base, &frames[..2]), sum);
    }

    #[test]
    fn truncated_header_is_corrupt() {
        let bytes = sample_header().to_bytes();
        assert!(matches!(
            FramedHeader::parse(&bytes[..20]),
            Err(FlopackError::CorruptStream(_))
        ));
        assert!(LegacyHeader::parse(&bytes[..9]).is_err());
    }

    #[test]
    fn dropped_frames_carry_no_payload() {
        let f = FrameHeader {
            code: PlaneCode::Dropped,
            payload_len: 500,
        };
        assert_eq!(f.stored_len(), 0);
        let bytes = f.to_bytes();
        assert_eq!(&bytes[..4], &(-1i32).to_le_bytes());
        let mut r = StreamReader::new(&bytes);
        assert_eq!(FrameHeader::read(&mut r).unwrap(), f);
        assert_eq!(r.position(), FRAME_HEADER_SIZE);
    }
}
