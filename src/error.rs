//! Error types for header parsing, geometry decoding and lookups.

use crate::header::EnvelopeContents;
use crate::twkb::TwkbError;
use thiserror::Error;

/// Errors returned by the codec, the decoder and the [`Geocoder`](crate::Geocoder).
#[derive(Error, Debug)]
pub enum Error {
    /// The blob does not start with the `GP` signature.
    #[error("invalid magic {0:02x?}")]
    InvalidMagic([u8; 2]),

    /// Input ended before a complete header could be read.
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// Only headers without an envelope can be written.
    #[error("unsupported envelope: {0}")]
    UnsupportedEnvelope(EnvelopeContents),

    /// Extended headers carry an extension code of exactly 4 bytes.
    #[error("invalid extension code length {0}")]
    InvalidExtensionLength(usize),

    /// The header type and extension code pair has no known payload format.
    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometryType(String),

    /// WKB payload could not be parsed.
    #[error("WKB parse error: {0}")]
    Wkb(String),

    /// TWKB payload could not be parsed.
    #[error("TWKB parse error: {0}")]
    Twkb(#[from] TwkbError),

    /// Geometry failed topology validation.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// No candidate feature contains the query point.
    #[error("not found")]
    NotFound,

    /// Bad open arguments or engine configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The query context was cancelled.
    #[error("query cancelled")]
    Cancelled,

    /// The query context deadline passed.
    #[error("query deadline exceeded")]
    DeadlineExceeded,

    /// The geocoder has been closed.
    #[error("geocoder is closed")]
    Closed,

    /// Error from the SQLite storage engine.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error while reading or writing a blob.
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl Error {
    /// Returns true for the [`Error::NotFound`] outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEnd,
            _ => Error::Io(err),
        }
    }
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
