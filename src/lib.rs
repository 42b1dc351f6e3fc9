//! Reverse geocoding against polygon datasets stored in GeoPackage files.
//!
//! `tinygpkg` resolves a coordinate to the attributes of the polygon feature
//! containing it (a country, an urban area, an administrative region). The
//! dataset is a regular GeoPackage: a feature table with geometry blobs and
//! an R-tree spatial index. Geometries may be stored as WKB or, for much
//! smaller files, as TWKB behind the GeoPackage extended header.
//!
//! # Quick Start
//!
//! ```no_run
//! use tinygpkg::{Geocoder, Location, QueryContext};
//!
//! # fn main() -> tinygpkg::Result<()> {
//! let mut geocoder = Geocoder::open(
//!     "testdata/ne_110m_admin_0_countries_s4_twkb_p3.gpkg",
//!     "ne_110m_admin_0_countries",
//!     &["NAME"],
//! )?;
//!
//! let ctx = QueryContext::background();
//! match geocoder.reverse_geocode(&ctx, Location::new(48.8566, 2.3522)) {
//!     Ok(columns) => println!("{}", columns[0]), // France
//!     Err(e) if e.is_not_found() => println!("open ocean"),
//!     Err(e) => return Err(e),
//! }
//! geocoder.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Lookup Algorithm
//!
//! 1. Build a degenerate bounding box at the query point
//! 2. Fetch candidates whose R-tree envelope overlaps it, optionally sorted by a column
//! 3. For each candidate, take the decoded geometry from the cache or decode the blob
//! 4. Return the columns of the first geometry that intersects the point (boundary inclusive)
//! 5. Fail with [`Error::NotFound`] when the candidates run out
//!
//! Candidates are consumed lazily, so an early match skips decoding the rest.
//!
//! # Overlapping Polygons
//!
//! When several polygons contain the point (shared borders, overlapping
//! data), the first one visited wins. Without an [`Order`] the visit order
//! is whatever the index yields. Set an order to make the winner stable:
//!
//! ```no_run
//! # use tinygpkg::{Geocoder, Order};
//! # fn main() -> tinygpkg::Result<()> {
//! let mut geocoder = Geocoder::open("countries.gpkg", "", &["NAME", "ISO_A3"])?;
//! geocoder.set_order(Some(Order::descending("POP_EST")?))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`Geocoder`] is `Sync`. Each call borrows one connection from a bounded
//! pool (see [`EngineConfig::pool_size`]) for its duration; calls beyond the
//! pool size wait. A shared [`GeometryCache`] may be written by overlapping
//! calls for the same feature, which is harmless since both decode the same
//! blob.
//!
//! # Cancellation
//!
//! Every lookup takes a [`QueryContext`]. Cancelling its token or passing its
//! deadline interrupts the SQLite query and stops the candidate scan.
//!
//! # Modules
//!
//! - [`header`] - GeoPackage binary header codec
//! - [`geometry`] - Blob decoding into [`geo_types`] geometries
//! - [`twkb`] - TWKB reader
//! - [`cache`] - Decoded geometry cache
//! - [`config`] - Engine configuration
//! - [`source`] - Spatial candidate sources

pub mod cache;
pub mod config;
mod context;
mod database;
pub mod error;
pub mod geometry;
pub mod header;
mod pool;
pub mod source;
pub mod twkb;
pub mod types;

pub use cache::{GeometryCache, MemoryCache};
pub use config::{Direction, EngineConfig, Order, DEFAULT_POOL_SIZE};
pub use context::QueryContext;
pub use database::{Geocoder, QueryStats};
pub use error::{Error, Result};
pub use source::{CandidateQuery, CandidateSource, SqliteSource};
pub use types::{BBox, FeatureCandidate, FeatureId, Location};
