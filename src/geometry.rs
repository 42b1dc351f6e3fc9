//! Geometry blob decoding.
//!
//! A blob is a [`BlobHeader`] followed by a payload whose format depends on
//! the header type:
//!
//! | type     | extension code | payload |
//! |----------|----------------|---------|
//! | Standard | -              | WKB     |
//! | Extended | `TWKB`         | TWKB    |
//!
//! Any other combination fails with [`Error::UnsupportedGeometryType`].

use crate::error::{Error, Result};
use crate::header::{BlobHeader, GeometryType, EXTENSION_TWKB};
use crate::twkb::read_twkb;
use geo::Validation;
use geo_traits::to_geo::ToGeoGeometry;
use geo_types::{Geometry, GeometryCollection};
use std::io::Read;

/// Options applied while decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Check geometry topology after parsing. Invalid geometries fail with
    /// [`Error::InvalidGeometry`]. Off by default for speed.
    pub validate: bool,
}

/// The explicit value returned for blobs flagged as empty.
///
/// An empty collection intersects nothing.
pub fn empty_geometry() -> Geometry<f64> {
    Geometry::GeometryCollection(GeometryCollection(Vec::new()))
}

/// Decodes a geometry blob read from `r`.
pub fn decode<R: Read>(r: &mut R, options: DecodeOptions) -> Result<Geometry<f64>> {
    let header = BlobHeader::read(r)?;
    if header.is_empty() {
        return Ok(empty_geometry());
    }

    let mut payload = Vec::new();
    r.read_to_end(&mut payload)?;

    let geometry = match header.geometry_type() {
        GeometryType::Standard => read_wkb(&payload)?,
        GeometryType::Extended if header.extension_code == EXTENSION_TWKB => read_twkb(&payload)?,
        GeometryType::Extended => {
            return Err(Error::UnsupportedGeometryType(format!(
                "extension code {:02x?}",
                header.extension_code
            )))
        }
    };

    if options.validate && !geometry.is_valid() {
        return Err(Error::InvalidGeometry(
            "geometry failed topology validation".to_string(),
        ));
    }
    Ok(geometry)
}

/// Decodes a geometry blob held in memory.
pub fn decode_blob(mut blob: &[u8], options: DecodeOptions) -> Result<Geometry<f64>> {
    decode(&mut blob, options)
}

fn read_wkb(payload: &[u8]) -> Result<Geometry<f64>> {
    let wkb = wkb::reader::read_wkb(payload).map_err(|e| Error::Wkb(e.to_string()))?;
    wkb.try_to_geometry()
        .ok_or_else(|| Error::Wkb("geometry has no geo-types representation".to_string()))
}
