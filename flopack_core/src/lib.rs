//! Byte-plane compression for arrays of IEEE-754 floats.
//!
//! Values are split into one plane per byte position, low-order planes are
//! dropped or masked according to how many bits the caller protects, and each
//! kept plane is handed to a generic [`Compressor`].

pub mod array;
pub mod compressor;
pub mod config;
pub mod element;
pub mod entropy;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod policy;
pub mod transform;

pub use array::{Decoded, FloatCodec};
pub use compressor::{scratch_capacity, Compressor};
pub use config::{CodecConfig, StreamFormat};
pub use element::{ByteOrder, Element, Precision};
pub use error::FlopackError;
pub use format::{inspect, FramedHeader, StreamSummary, MAGIC};
pub use pipeline::{EncodeReport, LengthMismatch, PlaneReport};
pub use policy::PlaneCode;
pub use transform::BytePlanes;

pub type Result<T> = std::result::Result<T, FlopackError>;
