//! Spatial candidate sources.
//!
//! A [`CandidateSource`] turns a bounding box into a stream of
//! [`FeatureCandidate`]s whose indexed envelope overlaps it. The engine
//! consumes the stream through a visitor and stops at the first match.
//!
//! [`SqliteSource`] reads a GeoPackage feature table through its R-tree:
//!
//! ```sql
//! SELECT "fid", "geom", CAST(<column> AS TEXT), ...
//! FROM "<table>"
//! WHERE "fid" IN (
//!     SELECT id FROM "rtree_<table>_<geom>"
//!     WHERE minx <= :max_x AND maxx >= :min_x AND miny <= :max_y AND maxy >= :min_y
//! )
//! [ORDER BY "<column>" ASC|DESC]
//! ```
//!
//! Every identifier is checked against `PRAGMA table_xinfo` when the source
//! is opened. SQLite reads an unknown double-quoted identifier as a string
//! literal, so an unchecked typo would silently select a constant.

use crate::config::{EngineConfig, Order, DEFAULT_GEOMETRY_COLUMN};
use crate::context::QueryContext;
use crate::error::{Error, Result};
use crate::pool::Pool;
use crate::types::{BBox, FeatureCandidate, FeatureId};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension};
use rustc_hash::FxHashSet;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tracing::{debug, trace};

/// Parameters of one candidate probe.
#[derive(Debug, Clone, Copy)]
pub struct CandidateQuery<'a> {
    pub bbox: BBox,
    pub order: Option<&'a Order>,
}

/// Visitor receiving candidates in source order.
///
/// Returning `Break(attributes)` ends the scan with those attributes.
pub type Visitor<'v> = dyn FnMut(FeatureCandidate<'_>) -> Result<ControlFlow<Vec<String>>> + 'v;

/// Source of bounding-box candidates for the engine.
pub trait CandidateSource: Send + Sync {
    /// Streams the candidates overlapping `query.bbox` into `visit`.
    ///
    /// Without an order the sequence is whatever the index yields. Returns the
    /// attributes the visitor broke with, or `None` when the stream ran dry.
    fn scan(
        &self,
        ctx: &QueryContext,
        query: &CandidateQuery<'_>,
        visit: &mut Visitor<'_>,
    ) -> Result<Option<Vec<String>>>;

    /// Releases underlying resources. Must be idempotent.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// R-tree backed candidate source over a read-only GeoPackage file.
pub struct SqliteSource {
    pool: Option<Pool<Connection>>,
    table: String,
    /// Lowercased column names of `table`.
    columns: FxHashSet<String>,
    sql_prefix: String,
    progress_ops: i32,
}

impl SqliteSource {
    /// Opens `config.pool_size` read-only connections to `path`.
    ///
    /// An empty `table` selects the first features table in `gpkg_contents`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        table: &str,
        columns: &[String],
        config: &EngineConfig,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Config("no columns specified".to_string()));
        }
        if columns.iter().any(|c| c.is_empty()) {
            return Err(Error::Config("empty column name".to_string()));
        }
        config.validate()?;

        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connections = (0..config.pool_size)
            .map(|_| Connection::open_with_flags(path, flags))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;

        let conn = &connections[0];
        let table = if table.is_empty() {
            autoconf_table(conn)?
        } else {
            table.to_string()
        };
        if !table_exists(conn, &table)? {
            return Err(Error::Config(format!("table {table:?} not found")));
        }
        let table_columns = table_columns(conn, &table)?;
        let geometry_column = match &config.geometry_column {
            Some(column) => column.clone(),
            None => geometry_column(conn, &table)?,
        };
        require_column(&table_columns, &table, &config.id_column)?;
        require_column(&table_columns, &table, &geometry_column)?;
        for column in columns {
            require_column(&table_columns, &table, column)?;
        }
        if let Some(order) = &config.order {
            require_column(&table_columns, &table, &order.column)?;
        }
        let rtree = format!("rtree_{table}_{geometry_column}");
        if !table_exists(conn, &rtree)? {
            return Err(Error::Config(format!("spatial index {rtree:?} not found")));
        }

        let select = columns
            .iter()
            .map(|c| format!("CAST({} AS TEXT)", quote(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let id = quote(&config.id_column);
        let sql_prefix = format!(
            "SELECT {id}, {geom}, {select} FROM {table} WHERE {id} IN (\
             SELECT id FROM {rtree} \
             WHERE minx <= ?1 AND maxx >= ?2 AND miny <= ?3 AND maxy >= ?4)",
            geom = quote(&geometry_column),
            table = quote(&table),
            rtree = quote(&rtree),
        );

        debug!(
            path = %path.display(),
            table = %table,
            geometry_column = %geometry_column,
            pool_size = config.pool_size,
            "opened geopackage"
        );

        Ok(Self {
            pool: Some(Pool::new(connections)),
            table,
            columns: table_columns,
            sql_prefix,
            progress_ops: config.progress_ops,
        })
    }

    /// A source that was never opened. Scans fail with [`Error::Closed`].
    pub fn closed() -> Self {
        Self {
            pool: None,
            table: String::new(),
            columns: FxHashSet::default(),
            sql_prefix: String::new(),
            progress_ops: 0,
        }
    }

    /// Resolved table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_none()
    }

    fn sql(&self, order: Option<&Order>) -> Result<String> {
        match order {
            Some(order) => {
                order.validate()?;
                require_column(&self.columns, &self.table, &order.column)?;
                Ok(format!(
                    "{} ORDER BY {} {}",
                    self.sql_prefix,
                    quote(&order.column),
                    order.direction.as_sql()
                ))
            }
            None => Ok(self.sql_prefix.clone()),
        }
    }
}

impl CandidateSource for SqliteSource {
    fn scan(
        &self,
        ctx: &QueryContext,
        query: &CandidateQuery<'_>,
        visit: &mut Visitor<'_>,
    ) -> Result<Option<Vec<String>>> {
        let pool = self.pool.as_ref().ok_or(Error::Closed)?;
        let sql = self.sql(query.order)?;
        let conn = pool.get(ctx)?;
        scan_interruptible(&conn, self.progress_ops, &sql, ctx, query.bbox, visit)
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut pool) = self.pool.take() else {
            return Ok(());
        };
        let mut first_error = None;
        for conn in pool.drain() {
            if let Err((_, err)) = conn.close() {
                first_error.get_or_insert(err);
            }
        }
        debug!(table = %self.table, "closed geopackage");
        match first_error {
            Some(err) => Err(Error::Sqlite(err)),
            None => Ok(()),
        }
    }
}

/// Runs [`scan_rows`] with a progress handler that aborts the statement once
/// `ctx` is done. The handler is removed before returning.
fn scan_interruptible(
    conn: &Connection,
    progress_ops: i32,
    sql: &str,
    ctx: &QueryContext,
    bbox: BBox,
    visit: &mut Visitor<'_>,
) -> Result<Option<Vec<String>>> {
    let interrupt = AssertUnwindSafe(ctx.clone());
    conn.progress_handler(progress_ops, Some(move || interrupt.is_done()));
    let result = scan_rows(conn, sql, ctx, bbox, visit);
    conn.progress_handler(0, None::<fn() -> bool>);
    result
}

fn scan_rows(
    conn: &Connection,
    sql: &str,
    ctx: &QueryContext,
    bbox: BBox,
    visit: &mut Visitor<'_>,
) -> Result<Option<Vec<String>>> {
    let mut stmt = conn.prepare_cached(sql).map_err(|e| interrupted(e, ctx))?;
    let columns = stmt.column_count() - 2;
    let mut rows = stmt
        .query([bbox.max_x, bbox.min_x, bbox.max_y, bbox.min_y])
        .map_err(|e| interrupted(e, ctx))?;

    while let Some(row) = rows.next().map_err(|e| interrupted(e, ctx))? {
        let id = FeatureId(row.get(0)?);
        let blob = match row.get_ref(1)? {
            ValueRef::Blob(blob) => blob,
            ValueRef::Null => {
                trace!(fid = %id, "skipping feature without geometry");
                continue;
            }
            other => {
                return Err(Error::UnsupportedGeometryType(format!(
                    "geometry column holds {:?}",
                    other.data_type()
                )))
            }
        };
        let attributes = (0..columns)
            .map(|i| row.get_ref(2 + i).map(text))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if let ControlFlow::Break(found) = visit(FeatureCandidate {
            id,
            blob,
            attributes,
        })? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Maps an interrupted statement to the context's cancellation reason.
fn interrupted(err: rusqlite::Error, ctx: &QueryContext) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted => {
            match ctx.check() {
                Err(reason) => reason,
                Ok(()) => Error::Cancelled,
            }
        }
        _ => Error::Sqlite(err),
    }
}

/// Renders an attribute as text. Attributes are selected through
/// `CAST(.. AS TEXT)`, so SQLite has already formatted numbers; NULL stays
/// NULL through the cast and becomes an empty string here.
fn text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            [name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> Result<FxHashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_xinfo({})", quote(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .map(|name| name.map(|n| n.to_ascii_lowercase()))
        .collect::<rusqlite::Result<FxHashSet<_>>>()?;
    Ok(names)
}

/// Column names are matched case-insensitively, as SQLite does.
fn require_column(columns: &FxHashSet<String>, table: &str, column: &str) -> Result<()> {
    if columns.contains(&column.to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "column {column:?} not found in table {table:?}"
        )))
    }
}

fn autoconf_table(conn: &Connection) -> Result<String> {
    if !table_exists(conn, "gpkg_contents")? {
        return Err(Error::Config(
            "error auto-configuring table: gpkg_contents missing".to_string(),
        ));
    }
    let table: Option<String> = conn
        .query_row(
            "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match table {
        Some(table) if !table.is_empty() => {
            debug!(table = %table, "auto-configured table");
            Ok(table)
        }
        Some(_) => Err(Error::Config(
            "error auto-configuring table: table name is empty".to_string(),
        )),
        None => Err(Error::Config(
            "error auto-configuring table: no table found".to_string(),
        )),
    }
}

fn geometry_column(conn: &Connection, table: &str) -> Result<String> {
    if !table_exists(conn, "gpkg_geometry_columns")? {
        return Ok(DEFAULT_GEOMETRY_COLUMN.to_string());
    }
    let column: Option<String> = conn
        .query_row(
            "SELECT column_name FROM gpkg_geometry_columns WHERE table_name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(column.unwrap_or_else(|| DEFAULT_GEOMETRY_COLUMN.to_string()))
}
