//! Tiny Well-Known Binary (TWKB) reader.
//!
//! TWKB stores coordinates as zig-zag varints scaled by a per-geometry
//! decimal precision and delta-encoded against the previous coordinate.
//! Optional bounding box, size and id list sections are skipped. Z and M
//! values are read to keep the delta state aligned and then dropped, so
//! every geometry comes out as 2D [`geo_types`].

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use thiserror::Error;

const POINT: u8 = 1;
const LINESTRING: u8 = 2;
const POLYGON: u8 = 3;
const MULTIPOINT: u8 = 4;
const MULTILINESTRING: u8 = 5;
const MULTIPOLYGON: u8 = 6;
const COLLECTION: u8 = 7;

const HAS_BBOX: u8 = 0b0000_0001;
const HAS_SIZE: u8 = 0b0000_0010;
const HAS_IDLIST: u8 = 0b0000_0100;
const HAS_EXTENDED_DIMS: u8 = 0b0000_1000;
const IS_EMPTY: u8 = 0b0001_0000;

/// Deepest collection nesting accepted.
pub const MAX_DEPTH: usize = 64;

/// TWKB decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TwkbError {
    #[error("unexpected end of TWKB data at byte {0}")]
    UnexpectedEnd(usize),

    #[error("varint overflow at byte {0}")]
    VarintOverflow(usize),

    #[error("unknown geometry type {0}")]
    UnknownType(u8),

    #[error("count {0} exceeds remaining data")]
    CountTooLarge(u64),

    #[error("collections nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Decodes a complete TWKB geometry.
pub fn read_twkb(buf: &[u8]) -> Result<Geometry<f64>, TwkbError> {
    Reader { buf, pos: 0 }.geometry(0)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

/// Running delta state for one geometry.
struct Deltas {
    precision: i32,
    dims: usize,
    last: [i64; 4],
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, TwkbError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(TwkbError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn varint(&mut self) -> Result<u64, TwkbError> {
        let start = self.pos;
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let b = self.byte()?;
            if shift >= 64 {
                return Err(TwkbError::VarintOverflow(start));
            }
            value |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn signed(&mut self) -> Result<i64, TwkbError> {
        Ok(zigzag(self.varint()?))
    }

    /// Reads an element count, bounded by the bytes left so hostile input
    /// cannot trigger huge allocations.
    fn count(&mut self) -> Result<usize, TwkbError> {
        let n = self.varint()?;
        let remaining = (self.buf.len() - self.pos) as u64;
        if n > remaining {
            return Err(TwkbError::CountTooLarge(n));
        }
        Ok(n as usize)
    }

    fn geometry(&mut self, depth: usize) -> Result<Geometry<f64>, TwkbError> {
        if depth > MAX_DEPTH {
            return Err(TwkbError::TooDeep);
        }
        let type_and_precision = self.byte()?;
        let kind = type_and_precision & 0x0f;
        let precision = zigzag(u64::from(type_and_precision >> 4)) as i32;
        let metadata = self.byte()?;

        let mut dims = 2;
        if metadata & HAS_EXTENDED_DIMS != 0 {
            let extended = self.byte()?;
            dims += usize::from(extended & 0b01 != 0) + usize::from(extended & 0b10 != 0);
        }
        if metadata & HAS_SIZE != 0 {
            self.varint()?;
        }
        if metadata & IS_EMPTY != 0 {
            return empty(kind);
        }
        if metadata & HAS_BBOX != 0 {
            for _ in 0..dims * 2 {
                self.varint()?;
            }
        }

        let has_ids = metadata & HAS_IDLIST != 0;
        let mut deltas = Deltas {
            precision,
            dims,
            last: [0; 4],
        };

        let geometry = match kind {
            POINT => Geometry::Point(Point(self.coord(&mut deltas)?)),
            LINESTRING => Geometry::LineString(self.line_string(&mut deltas)?),
            POLYGON => Geometry::Polygon(self.polygon(&mut deltas)?),
            MULTIPOINT => {
                let n = self.count()?;
                self.skip_ids(has_ids, n)?;
                let points = (0..n)
                    .map(|_| self.coord(&mut deltas).map(Point))
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiPoint(MultiPoint(points))
            }
            MULTILINESTRING => {
                let n = self.count()?;
                self.skip_ids(has_ids, n)?;
                let lines = (0..n)
                    .map(|_| self.line_string(&mut deltas))
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiLineString(MultiLineString(lines))
            }
            MULTIPOLYGON => {
                let n = self.count()?;
                self.skip_ids(has_ids, n)?;
                let polygons = (0..n)
                    .map(|_| self.polygon(&mut deltas))
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiPolygon(MultiPolygon(polygons))
            }
            COLLECTION => {
                let n = self.count()?;
                self.skip_ids(has_ids, n)?;
                let members = (0..n)
                    .map(|_| self.geometry(depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::GeometryCollection(GeometryCollection(members))
            }
            other => return Err(TwkbError::UnknownType(other)),
        };
        Ok(geometry)
    }

    fn skip_ids(&mut self, has_ids: bool, n: usize) -> Result<(), TwkbError> {
        if has_ids {
            for _ in 0..n {
                self.varint()?;
            }
        }
        Ok(())
    }

    fn coord(&mut self, deltas: &mut Deltas) -> Result<Coord<f64>, TwkbError> {
        for i in 0..deltas.dims {
            deltas.last[i] = deltas.last[i].wrapping_add(self.signed()?);
        }
        Ok(Coord {
            x: descale(deltas.last[0], deltas.precision),
            y: descale(deltas.last[1], deltas.precision),
        })
    }

    fn line_string(&mut self, deltas: &mut Deltas) -> Result<LineString<f64>, TwkbError> {
        let n = self.count()?;
        let coords = (0..n)
            .map(|_| self.coord(deltas))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LineString(coords))
    }

    fn polygon(&mut self, deltas: &mut Deltas) -> Result<Polygon<f64>, TwkbError> {
        let rings = self.count()?;
        if rings == 0 {
            return Ok(Polygon::new(LineString(Vec::new()), Vec::new()));
        }
        let exterior = self.ring(deltas)?;
        let interiors = (1..rings)
            .map(|_| self.ring(deltas))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    /// Closes rings written without a repeated first point.
    fn ring(&mut self, deltas: &mut Deltas) -> Result<LineString<f64>, TwkbError> {
        let mut ring = self.line_string(deltas)?;
        ring.close();
        Ok(ring)
    }
}

fn descale(value: i64, precision: i32) -> f64 {
    if precision >= 0 {
        value as f64 / 10f64.powi(precision)
    } else {
        value as f64 * 10f64.powi(-precision)
    }
}

fn zigzag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

fn empty(kind: u8) -> Result<Geometry<f64>, TwkbError> {
    let geometry = match kind {
        // geo-types has no empty point
        POINT | MULTIPOINT => Geometry::MultiPoint(MultiPoint(Vec::new())),
        LINESTRING => Geometry::LineString(LineString(Vec::new())),
        POLYGON => Geometry::Polygon(Polygon::new(LineString(Vec::new()), Vec::new())),
        MULTILINESTRING => Geometry::MultiLineString(MultiLineString(Vec::new())),
        MULTIPOLYGON => Geometry::MultiPolygon(MultiPolygon(Vec::new())),
        COLLECTION => Geometry::GeometryCollection(GeometryCollection(Vec::new())),
        other => return Err(TwkbError::UnknownType(other)),
    };
    Ok(geometry)
}
