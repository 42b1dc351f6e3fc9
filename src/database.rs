use crate::cache::GeometryCache;
use crate::config::{EngineConfig, Order};
use crate::context::QueryContext;
use crate::error::{Error, Result};
use crate::geometry::{decode_blob, DecodeOptions};
use crate::source::{CandidateQuery, CandidateSource, SqliteSource};
use crate::types::{BBox, FeatureCandidate, Location};
use geo::Intersects;
use geo_types::{Geometry, Point};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Reverse geocoder over a spatially indexed polygon dataset.
///
/// Each [`reverse_geocode`](Self::reverse_geocode) call is independent: it
/// probes the source with a degenerate box at the query point, decodes the
/// candidates in source order (or takes them from the cache) and returns the
/// attributes of the first geometry that intersects the point, boundary
/// included. When polygons overlap, the configured [`Order`] decides the winner.
pub struct Geocoder<S = SqliteSource> {
    source: S,
    order: Option<Order>,
    validate: bool,
    cache: Option<Arc<dyn GeometryCache>>,
    stats: Counters,
}

/// Snapshot of the geocoder's lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub queries: u64,
    pub candidates: u64,
    pub decodes: u64,
    pub cache_hits: u64,
    pub matches: u64,
    pub not_found: u64,
}

#[derive(Default)]
struct Counters {
    queries: AtomicU64,
    candidates: AtomicU64,
    decodes: AtomicU64,
    cache_hits: AtomicU64,
    matches: AtomicU64,
    not_found: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueryStats {
        QueryStats {
            queries: self.queries.load(Ordering::Relaxed),
            candidates: self.candidates.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }
}

impl Geocoder<SqliteSource> {
    /// Opens a GeoPackage file with the default [`EngineConfig`].
    ///
    /// `columns` are returned, in order, for the matching feature. An empty
    /// `table` selects the first features table listed in `gpkg_contents`.
    pub fn open<P, C>(path: P, table: &str, columns: &[C]) -> Result<Self>
    where
        P: AsRef<Path>,
        C: AsRef<str>,
    {
        Self::open_with_config(path, table, columns, EngineConfig::default())
    }

    pub fn open_with_config<P, C>(
        path: P,
        table: &str,
        columns: &[C],
        config: EngineConfig,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        C: AsRef<str>,
    {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let source = SqliteSource::open(path, table, &columns, &config)?;
        let mut geocoder = Self::with_source(source);
        geocoder.order = config.order;
        geocoder.validate = config.validate;
        Ok(geocoder)
    }

    /// Table the geocoder reads from.
    pub fn table(&self) -> &str {
        self.source.table()
    }
}

impl<S: CandidateSource> Geocoder<S> {
    /// Wraps an already opened candidate source.
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            order: None,
            validate: false,
            cache: None,
            stats: Counters::default(),
        }
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Sets the candidate order. The column must be non-empty.
    pub fn set_order(&mut self, order: Option<Order>) -> Result<()> {
        if let Some(order) = &order {
            order.validate()?;
        }
        self.order = order;
        Ok(())
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    /// Toggles topology validation of freshly decoded geometries.
    pub fn set_validate(&mut self, validate: bool) {
        self.validate = validate;
    }

    pub fn set_cache(&mut self, cache: Option<Arc<dyn GeometryCache>>) {
        self.cache = cache;
    }

    pub fn stats(&self) -> QueryStats {
        self.stats.snapshot()
    }

    /// Returns the requested columns of the first candidate feature containing
    /// `location`, or [`Error::NotFound`] when none does.
    pub fn reverse_geocode(&self, ctx: &QueryContext, location: Location) -> Result<Vec<String>> {
        ctx.check()?;
        Counters::bump(&self.stats.queries);

        let point = location.to_point();
        let query = CandidateQuery {
            bbox: BBox::from_location(location),
            order: self.order.as_ref(),
        };
        let options = DecodeOptions {
            validate: self.validate,
        };

        let mut visited = 0u64;
        let found = self.source.scan(ctx, &query, &mut |candidate| {
            ctx.check()?;
            visited += 1;
            Counters::bump(&self.stats.candidates);
            self.test(candidate, &point, options)
        })?;

        match found {
            Some(attributes) => {
                Counters::bump(&self.stats.matches);
                debug!(%location, candidates = visited, "resolved");
                Ok(attributes)
            }
            None => {
                Counters::bump(&self.stats.not_found);
                debug!(%location, candidates = visited, "not found");
                Err(Error::NotFound)
            }
        }
    }

    fn test(
        &self,
        candidate: FeatureCandidate<'_>,
        point: &Point<f64>,
        options: DecodeOptions,
    ) -> Result<ControlFlow<Vec<String>>> {
        let geometry = self.geometry(&candidate, options)?;
        if geometry.intersects(point) {
            trace!(fid = %candidate.id, "candidate contains point");
            Ok(ControlFlow::Break(candidate.attributes))
        } else {
            Ok(ControlFlow::Continue(()))
        }
    }

    fn geometry(
        &self,
        candidate: &FeatureCandidate<'_>,
        options: DecodeOptions,
    ) -> Result<Arc<Geometry<f64>>> {
        if let Some(cache) = &self.cache {
            if let Some(geometry) = cache.get(candidate.id) {
                Counters::bump(&self.stats.cache_hits);
                trace!(fid = %candidate.id, "cache hit");
                return Ok(geometry);
            }
        }

        Counters::bump(&self.stats.decodes);
        trace!(fid = %candidate.id, bytes = candidate.blob.len(), "decoding");
        let geometry = Arc::new(decode_blob(candidate.blob, options)?);
        if let Some(cache) = &self.cache {
            cache.set(candidate.id, Arc::clone(&geometry));
        }
        Ok(geometry)
    }

    /// Closes the underlying source. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}
