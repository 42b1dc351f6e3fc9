//! GeoPackage binary header codec.
//!
//! Every geometry blob starts with a header made of two sub-records read in
//! sequence with independent byte order rules:
//!
//! ```text
//! ┌───────────┬─────────┬───────┬──────────┬──────────────┬────────────────┐
//! │ magic "GP"│ version │ flags │  srs_id  │   envelope   │ extension code │
//! │  2 bytes  │ 1 byte  │1 byte │ 4 bytes  │ 0/32/48/64 B │ 4 bytes, opt.  │
//! └───────────┴─────────┴───────┴──────────┴──────────────┴────────────────┘
//!   fixed order (HeaderTop)      flag order  skipped        Extended only
//! ```
//!
//! The flags byte selects the byte order of `srs_id` only (bit 0). Bits 1-3
//! hold the envelope contents code, bit 4 marks an empty geometry and bit 5
//! selects the standard or extended type.
//!
//! See <http://www.geopackage.org/spec/#gpb_data_blob_format>.

use crate::error::{Error, Result};
use std::fmt;
use std::io::{self, Read, Write};

/// Blob signature, ASCII `GP`.
pub const MAGIC: [u8; 2] = [0x47, 0x50];

/// Extension code selecting a TWKB payload.
pub const EXTENSION_TWKB: [u8; 4] = *b"TWKB";

const BYTE_ORDER_BIT: u8 = 0b0000_0001;
const ENVELOPE_BITS: u8 = 0b0000_1110;
const EMPTY_BIT: u8 = 0b0001_0000;
const TYPE_BIT: u8 = 0b0010_0000;

/// Byte order of the `srs_id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Standard (WKB payload) or extended (payload tagged by an extension code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Standard,
    Extended,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryType::Standard => write!(f, "Standard"),
            GeometryType::Extended => write!(f, "Extended"),
        }
    }
}

/// Envelope contents indicator code from flag bits 1-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeContents {
    None,
    Xy,
    Xyz,
    Xym,
    Xyzm,
    /// Codes 5-7 are reserved; they carry no envelope bytes.
    Reserved(u8),
}

impl EnvelopeContents {
    /// Decodes the 3-bit code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => EnvelopeContents::None,
            1 => EnvelopeContents::Xy,
            2 => EnvelopeContents::Xyz,
            3 => EnvelopeContents::Xym,
            4 => EnvelopeContents::Xyzm,
            other => EnvelopeContents::Reserved(other & 0b111),
        }
    }

    /// The 3-bit code.
    pub fn code(self) -> u8 {
        match self {
            EnvelopeContents::None => 0,
            EnvelopeContents::Xy => 1,
            EnvelopeContents::Xyz => 2,
            EnvelopeContents::Xym => 3,
            EnvelopeContents::Xyzm => 4,
            EnvelopeContents::Reserved(code) => code & 0b111,
        }
    }

    /// Number of envelope bytes following `srs_id`.
    pub fn size(self) -> usize {
        match self {
            EnvelopeContents::None => 0,
            EnvelopeContents::Xy => 32,
            EnvelopeContents::Xyz | EnvelopeContents::Xym => 48,
            EnvelopeContents::Xyzm => 64,
            EnvelopeContents::Reserved(_) => 0,
        }
    }
}

impl fmt::Display for EnvelopeContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeContents::None => write!(f, "no envelope, 0 bytes"),
            EnvelopeContents::Xy => write!(f, "[minx, maxx, miny, maxy], 32 bytes"),
            EnvelopeContents::Xyz => {
                write!(f, "[minx, maxx, miny, maxy, minz, maxz], 48 bytes")
            }
            EnvelopeContents::Xym => {
                write!(f, "[minx, maxx, miny, maxy, minm, maxm], 48 bytes")
            }
            EnvelopeContents::Xyzm => write!(
                f,
                "[minx, maxx, miny, maxy, minz, maxz, minm, maxm], 64 bytes"
            ),
            EnvelopeContents::Reserved(code) => write!(f, "reserved code {code}"),
        }
    }
}

/// Fixed-order leading fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderTop {
    pub magic: [u8; 2],
    pub version: u8,
    pub flags: u8,
}

/// Spatial reference id, encoded in the flag-selected byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSrs {
    pub srs_id: i32,
}

/// A parsed geometry blob header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub top: HeaderTop,
    pub srs: HeaderSrs,
    /// Exactly 4 bytes when the type is [`GeometryType::Extended`], empty otherwise.
    pub extension_code: Vec<u8>,
}

impl BlobHeader {
    /// Creates a standard header without envelope.
    pub fn new(srs_id: i32, byte_order: ByteOrder) -> Self {
        let flags = match byte_order {
            ByteOrder::BigEndian => 0,
            ByteOrder::LittleEndian => BYTE_ORDER_BIT,
        };
        Self {
            top: HeaderTop {
                magic: MAGIC,
                version: 0,
                flags,
            },
            srs: HeaderSrs { srs_id },
            extension_code: Vec::new(),
        }
    }

    /// Creates an extended header tagged with `extension_code`.
    pub fn extended(srs_id: i32, byte_order: ByteOrder, extension_code: [u8; 4]) -> Self {
        let mut header = Self::new(srs_id, byte_order);
        header.set_geometry_type(GeometryType::Extended);
        header.extension_code = extension_code.to_vec();
        header
    }

    /// Reads a header, leaving `r` positioned at the start of the payload.
    ///
    /// The four top bytes are read as one record before the magic is checked,
    /// so input shorter than that fails with [`Error::UnexpectedEnd`] whatever
    /// its first bytes are.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut top = [0u8; 4];
        r.read_exact(&mut top)?;
        let top = HeaderTop {
            magic: [top[0], top[1]],
            version: top[2],
            flags: top[3],
        };
        if top.magic != MAGIC {
            return Err(Error::InvalidMagic(top.magic));
        }

        let mut srs = [0u8; 4];
        r.read_exact(&mut srs)?;
        let srs_id = match byte_order(top.flags) {
            ByteOrder::BigEndian => i32::from_be_bytes(srs),
            ByteOrder::LittleEndian => i32::from_le_bytes(srs),
        };

        let mut header = BlobHeader {
            top,
            srs: HeaderSrs { srs_id },
            extension_code: Vec::new(),
        };

        let envelope = header.envelope_contents().size() as u64;
        let skipped = io::copy(&mut r.by_ref().take(envelope), &mut io::sink())?;
        if skipped != envelope {
            return Err(Error::UnexpectedEnd);
        }

        if header.geometry_type() == GeometryType::Extended {
            let mut code = [0u8; 4];
            r.read_exact(&mut code)?;
            header.extension_code = code.to_vec();
        }

        Ok(header)
    }

    /// Writes the header. Only headers without an envelope are supported.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let envelope = self.envelope_contents();
        if envelope != EnvelopeContents::None {
            return Err(Error::UnsupportedEnvelope(envelope));
        }
        let extended = self.geometry_type() == GeometryType::Extended;
        if extended && self.extension_code.len() != 4 {
            return Err(Error::InvalidExtensionLength(self.extension_code.len()));
        }

        w.write_all(&self.top.magic)?;
        w.write_all(&[self.top.version, self.top.flags])?;
        let srs = match self.byte_order() {
            ByteOrder::BigEndian => self.srs.srs_id.to_be_bytes(),
            ByteOrder::LittleEndian => self.srs.srs_id.to_le_bytes(),
        };
        w.write_all(&srs)?;
        if extended {
            w.write_all(&self.extension_code)?;
        }
        Ok(())
    }

    /// Encodes the header into a new buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(12);
        self.write(&mut buf)?;
        Ok(buf)
    }

    pub fn geometry_type(&self) -> GeometryType {
        if self.top.flags & TYPE_BIT == 0 {
            GeometryType::Standard
        } else {
            GeometryType::Extended
        }
    }

    pub fn set_geometry_type(&mut self, kind: GeometryType) {
        match kind {
            GeometryType::Standard => self.top.flags &= !TYPE_BIT,
            GeometryType::Extended => self.top.flags |= TYPE_BIT,
        }
    }

    /// True when the blob holds an empty geometry.
    pub fn is_empty(&self) -> bool {
        self.top.flags & EMPTY_BIT != 0
    }

    pub fn envelope_contents(&self) -> EnvelopeContents {
        EnvelopeContents::from_code((self.top.flags & ENVELOPE_BITS) >> 1)
    }

    pub fn set_envelope_contents(&mut self, contents: EnvelopeContents) {
        self.top.flags &= !ENVELOPE_BITS;
        self.top.flags |= contents.code() << 1;
    }

    pub fn byte_order(&self) -> ByteOrder {
        byte_order(self.top.flags)
    }

    pub fn srs_id(&self) -> i32 {
        self.srs.srs_id
    }
}

fn byte_order(flags: u8) -> ByteOrder {
    if flags & BYTE_ORDER_BIT == 0 {
        ByteOrder::BigEndian
    } else {
        ByteOrder::LittleEndian
    }
}
