//! Engine configuration.
//!
//! [`EngineConfig`] carries everything [`Geocoder::open_with_config`] needs
//! beyond the file path, table and output columns. All fields have defaults,
//! so partial configs deserialize:
//!
//! ```
//! use tinygpkg::{Direction, EngineConfig};
//!
//! let config: EngineConfig =
//!     serde_json::from_str(r#"{ "pool_size": 4, "order": { "column": "rank", "direction": "DESC" } }"#)
//!         .unwrap();
//! assert_eq!(config.pool_size, 4);
//! assert_eq!(config.id_column, "fid");
//! assert_eq!(config.order.unwrap().direction, Direction::Descending);
//! ```
//!
//! [`Geocoder::open_with_config`]: crate::Geocoder::open_with_config

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Connections opened per geocoder.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Feature id column of GeoPackage feature tables.
pub const DEFAULT_ID_COLUMN: &str = "fid";

/// Geometry column used when `gpkg_geometry_columns` has no entry.
pub const DEFAULT_GEOMETRY_COLUMN: &str = "geom";

/// SQLite VM instructions between cancellation polls.
pub const DEFAULT_PROGRESS_OPS: i32 = 1000;

/// Sort direction for candidate ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "ASC", alias = "asc")]
    Ascending,
    #[serde(rename = "DESC", alias = "desc")]
    Descending,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Ascending)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Descending)
        } else {
            Err(Error::Config(format!("invalid order direction {s:?}")))
        }
    }
}

/// Candidate ordering by a named attribute column.
///
/// The first candidate in this order that contains the query point wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn new(column: impl Into<String>, direction: Direction) -> Result<Self> {
        let order = Self {
            column: column.into(),
            direction,
        };
        order.validate()?;
        Ok(order)
    }

    pub fn ascending(column: impl Into<String>) -> Result<Self> {
        Self::new(column, Direction::Ascending)
    }

    pub fn descending(column: impl Into<String>) -> Result<Self> {
        Self::new(column, Direction::Descending)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.column.is_empty() {
            return Err(Error::Config("order column is empty".to_string()));
        }
        Ok(())
    }
}

impl FromStr for Order {
    type Err = Error;

    /// Parses `"<column>"` or `"<column> <ASC|DESC>"`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let column = parts
            .next()
            .ok_or_else(|| Error::Config("order column is empty".to_string()))?;
        let direction = match parts.next() {
            Some(d) => d.parse()?,
            None => Direction::Ascending,
        };
        if parts.next().is_some() {
            return Err(Error::Config(format!("invalid order {s:?}")));
        }
        Order::new(column, direction)
    }
}

/// Geocoder configuration with documented defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Read-only connections in the pool; concurrent queries beyond this wait.
    /// Default: [`DEFAULT_POOL_SIZE`]
    pub pool_size: usize,

    /// Integer primary key joined against the R-tree `id`.
    /// Default: [`DEFAULT_ID_COLUMN`]
    pub id_column: String,

    /// Geometry blob column. `None` looks it up in `gpkg_geometry_columns`.
    pub geometry_column: Option<String>,

    /// Cancellation poll interval in SQLite VM instructions.
    /// Default: [`DEFAULT_PROGRESS_OPS`]
    pub progress_ops: i32,

    /// Candidate ordering. `None` leaves the order to the index.
    pub order: Option<Order>,

    /// Validate geometry topology before the containment test.
    pub validate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            id_column: DEFAULT_ID_COLUMN.to_string(),
            geometry_column: None,
            progress_ops: DEFAULT_PROGRESS_OPS,
            order: None,
            validate: false,
        }
    }
}

impl EngineConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_geometry_column(mut self, column: impl Into<String>) -> Self {
        self.geometry_column = Some(column.into());
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool size must be at least 1".to_string()));
        }
        if self.progress_ops <= 0 {
            return Err(Error::Config("progress_ops must be positive".to_string()));
        }
        if self.id_column.is_empty() {
            return Err(Error::Config("id column is empty".to_string()));
        }
        if let Some(order) = &self.order {
            order.validate()?;
        }
        Ok(())
    }
}
