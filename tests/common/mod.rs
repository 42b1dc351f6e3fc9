//! GeoPackage-shaped fixtures built on the fly.
//!
//! Layout (x = longitude, y = latitude):
//!
//! ```text
//!  y=50 ┌─────────┬──────────┐
//!       │         │ Eastland │
//!       │Westland ├────┐  ┌──┘ bay (17..20, 47..48)
//!       │         │    │  └──┐
//!  y=46 │         └──┐ │     │
//!       │  peninsula │ │     │   Westland reaches into a notch of
//!  y=44 │         ┌──┘ │     │   Eastland between y=44 and y=46
//!       │         │          │
//!  y=40 └─────────┴──────────┘
//!       x=0      x=10 x=14  x=20
//! ```
//!
//! Northia (30..40, 10..20) and Southia (30..40, 0..12) overlap in a strip
//! between y=10 and y=12. Twkbia (-20..-10, -20..-10) is stored as TWKB.
//! Nothing covers (0, 0). `AREA` is a REAL column, NULL for Southia.

#![allow(dead_code)]

use rusqlite::{params, Connection};
use std::path::PathBuf;
use tempfile::TempDir;
use tinygpkg::header::{BlobHeader, ByteOrder, EXTENSION_TWKB};

pub type Ring = Vec<(f64, f64)>;

pub fn westland() -> Ring {
    vec![
        (0.0, 40.0),
        (10.0, 40.0),
        (10.0, 44.0),
        (14.0, 44.0),
        (14.0, 46.0),
        (10.0, 46.0),
        (10.0, 50.0),
        (0.0, 50.0),
        (0.0, 40.0),
    ]
}

pub fn eastland() -> Ring {
    vec![
        (10.0, 40.0),
        (20.0, 40.0),
        (20.0, 47.0),
        (17.0, 47.0),
        (17.0, 48.0),
        (20.0, 48.0),
        (20.0, 50.0),
        (10.0, 50.0),
        (10.0, 46.0),
        (14.0, 46.0),
        (14.0, 44.0),
        (10.0, 44.0),
        (10.0, 40.0),
    ]
}

pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Ring {
    vec![
        (min_x, min_y),
        (max_x, min_y),
        (max_x, max_y),
        (min_x, max_y),
        (min_x, min_y),
    ]
}

pub fn wkb_polygon(ring: &[(f64, f64)]) -> Vec<u8> {
    let mut buf = vec![0x01];
    buf.extend_from_slice(&3u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&(ring.len() as u32).to_le_bytes());
    for (x, y) in ring {
        buf.extend_from_slice(&x.to_le_bytes());
        buf.extend_from_slice(&y.to_le_bytes());
    }
    buf
}

fn put_varint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

fn put_signed(buf: &mut Vec<u8>, v: i64) {
    put_varint(buf, ((v << 1) ^ (v >> 63)) as u64);
}

/// Single-ring TWKB polygon at the given decimal precision (0..=7).
pub fn twkb_polygon(ring: &[(f64, f64)], precision: u8) -> Vec<u8> {
    let scale = 10f64.powi(i32::from(precision));
    let mut buf = vec![((precision << 1) << 4) | 0x03, 0x00];
    put_varint(&mut buf, 1);
    put_varint(&mut buf, ring.len() as u64);
    let (mut last_x, mut last_y) = (0i64, 0i64);
    for (x, y) in ring {
        let (x, y) = ((x * scale).round() as i64, (y * scale).round() as i64);
        put_signed(&mut buf, x - last_x);
        put_signed(&mut buf, y - last_y);
        last_x = x;
        last_y = y;
    }
    buf
}

pub fn wkb_blob(ring: &[(f64, f64)]) -> Vec<u8> {
    let mut blob = BlobHeader::new(4326, ByteOrder::LittleEndian)
        .to_bytes()
        .unwrap();
    blob.extend(wkb_polygon(ring));
    blob
}

pub fn twkb_blob(ring: &[(f64, f64)]) -> Vec<u8> {
    let mut blob = BlobHeader::extended(4326, ByteOrder::BigEndian, EXTENSION_TWKB)
        .to_bytes()
        .unwrap();
    blob.extend(twkb_polygon(ring, 3));
    blob
}

fn bounds(ring: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    ring.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(min_x, max_x, min_y, max_y), &(x, y)| {
            (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
        },
    )
}

pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

fn create_feature_table(conn: &Connection, table: &str, geom: &str) {
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (
             fid INTEGER PRIMARY KEY AUTOINCREMENT,
             {geom} BLOB,
             NAME TEXT,
             ISO_A3 TEXT,
             POP_EST INTEGER,
             AREA REAL
         );
         CREATE VIRTUAL TABLE rtree_{table}_{geom} USING rtree(id, minx, maxx, miny, maxy);
         INSERT INTO gpkg_contents (table_name, data_type, identifier)
             VALUES ('{table}', 'features', '{table}');
         INSERT INTO gpkg_geometry_columns (table_name, column_name, geometry_type_name, srs_id, z, m)
             VALUES ('{table}', '{geom}', 'MULTIPOLYGON', 4326, 0, 0);"
    ))
    .unwrap();
}

fn insert(
    conn: &Connection,
    table: &str,
    geom: &str,
    blob: Vec<u8>,
    ring: &[(f64, f64)],
    name: &str,
    iso: &str,
    pop: i64,
) {
    conn.execute(
        &format!("INSERT INTO {table} ({geom}, NAME, ISO_A3, POP_EST) VALUES (?1, ?2, ?3, ?4)"),
        params![blob, name, iso, pop],
    )
    .unwrap();
    let fid = conn.last_insert_rowid();
    let (min_x, max_x, min_y, max_y) = bounds(ring);
    conn.execute(
        &format!("INSERT INTO rtree_{table}_{geom} VALUES (?1, ?2, ?3, ?4, ?5)"),
        params![fid, min_x, max_x, min_y, max_y],
    )
    .unwrap();
}

/// Writes the fixture GeoPackage into a fresh temporary directory.
pub fn countries() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("countries.gpkg");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE gpkg_contents (
             table_name TEXT NOT NULL PRIMARY KEY,
             data_type TEXT NOT NULL,
             identifier TEXT
         );
         CREATE TABLE gpkg_geometry_columns (
             table_name TEXT NOT NULL,
             column_name TEXT NOT NULL,
             geometry_type_name TEXT NOT NULL,
             srs_id INTEGER NOT NULL,
             z TINYINT NOT NULL,
             m TINYINT NOT NULL
         );",
    )
    .unwrap();

    create_feature_table(&conn, "countries", "geom");
    let t = "countries";
    let g = "geom";
    insert(&conn, t, g, wkb_blob(&westland()), &westland(), "Westland", "WST", 5_000_000);
    insert(&conn, t, g, wkb_blob(&eastland()), &eastland(), "Eastland", "EST", 7_000_000);
    let north = rect(30.0, 10.0, 40.0, 20.0);
    insert(&conn, t, g, wkb_blob(&north), &north, "Northia", "NTH", 1_000_000);
    let south = rect(30.0, 0.0, 40.0, 12.0);
    insert(&conn, t, g, wkb_blob(&south), &south, "Southia", "STH", 9_000_000);
    let twkbia = rect(-20.0, -20.0, -10.0, -10.0);
    insert(&conn, t, g, twkb_blob(&twkbia), &twkbia, "Twkbia", "TWK", 300_000);

    conn.execute_batch(
        "UPDATE countries SET AREA = 3.0 WHERE NAME = 'Westland';
         UPDATE countries SET AREA = 1e20 WHERE NAME = 'Eastland';
         UPDATE countries SET AREA = 0.25 WHERE NAME = 'Northia';",
    )
    .unwrap();

    create_feature_table(&conn, "cities", "shape");
    let ljubljana = rect(14.4, 45.9, 14.7, 46.2);
    insert(&conn, "cities", "shape", twkb_blob(&ljubljana), &ljubljana, "Ljubljana", "SVN", 280_000);

    drop(conn);
    Fixture { _dir: dir, path }
}
