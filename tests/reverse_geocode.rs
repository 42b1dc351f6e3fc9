mod common;

use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tinygpkg::{
    Direction, EngineConfig, Error, Geocoder, GeometryCache, Location, MemoryCache, Order,
    QueryContext,
};

fn open(fixture: &common::Fixture) -> Geocoder {
    Geocoder::open(&fixture.path, "countries", &["NAME", "ISO_A3"]).unwrap()
}

fn name(g: &Geocoder, lat: f64, lon: f64) -> Option<String> {
    match g.reverse_geocode(&QueryContext::background(), Location::new(lat, lon)) {
        Ok(mut columns) => Some(columns.swap_remove(0)),
        Err(Error::NotFound) => None,
        Err(e) => panic!("lookup ({lat}, {lon}) failed: {e}"),
    }
}

#[test]
fn interior_point_returns_requested_columns() {
    let fixture = common::countries();
    let g = open(&fixture);
    let columns = g
        .reverse_geocode(&QueryContext::background(), Location::new(45.0, 5.0))
        .unwrap();
    assert_eq!(columns, vec!["Westland", "WST"]);
    assert_eq!(name(&g, 42.0, 17.0).as_deref(), Some("Eastland"));
}

#[test]
fn open_ocean_is_not_found() {
    let fixture = common::countries();
    let g = open(&fixture);
    let err = g
        .reverse_geocode(&QueryContext::background(), Location::new(0.0, 0.0))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(name(&g, 0.0, 180.0), None);
    assert_eq!(name(&g, 0.0, -180.0), None);
}

#[test]
fn concave_border_resolves_to_neighbour_regardless_of_order() {
    let fixture = common::countries();
    let mut g = open(&fixture);
    // inside Eastland's bounding box, but in Westland's peninsula
    for order in [
        None,
        Some(Order::ascending("NAME").unwrap()),
        Some(Order::descending("NAME").unwrap()),
    ] {
        g.set_order(order).unwrap();
        assert_eq!(name(&g, 45.0, 12.0).as_deref(), Some("Westland"));
    }
}

#[test]
fn concave_bay_is_not_found() {
    let fixture = common::countries();
    let g = open(&fixture);
    assert_eq!(name(&g, 47.5, 18.5), None);
    assert_eq!(name(&g, 47.5, 16.5).as_deref(), Some("Eastland"));
}

#[test]
fn shared_border_winner_follows_order() {
    let fixture = common::countries();
    let mut g = open(&fixture);
    // on the edge both countries share; boundaries count as inside
    g.set_order(Some(Order::ascending("NAME").unwrap())).unwrap();
    assert_eq!(name(&g, 42.0, 10.0).as_deref(), Some("Eastland"));
    g.set_order(Some(Order::descending("NAME").unwrap())).unwrap();
    assert_eq!(name(&g, 42.0, 10.0).as_deref(), Some("Westland"));
}

#[test]
fn overlapping_polygons_winner_follows_order() {
    let fixture = common::countries();
    let mut g = open(&fixture);

    g.set_order(Some(Order::ascending("POP_EST").unwrap())).unwrap();
    assert_eq!(name(&g, 11.0, 35.0).as_deref(), Some("Northia"));
    g.set_order(Some(Order::new("POP_EST", Direction::Descending).unwrap()))
        .unwrap();
    assert_eq!(name(&g, 11.0, 35.0).as_deref(), Some("Southia"));
    g.set_order(Some("NAME DESC".parse().unwrap())).unwrap();
    assert_eq!(name(&g, 11.0, 35.0).as_deref(), Some("Southia"));

    // outside the strip the order is irrelevant
    assert_eq!(name(&g, 15.0, 35.0).as_deref(), Some("Northia"));
    assert_eq!(name(&g, 5.0, 35.0).as_deref(), Some("Southia"));
}

#[test]
fn order_from_config() {
    let fixture = common::countries();
    let config = EngineConfig::default().with_order(Order::descending("NAME").unwrap());
    let g = Geocoder::open_with_config(&fixture.path, "countries", &["NAME"], config).unwrap();
    assert_eq!(g.order().unwrap().direction, Direction::Descending);
    assert_eq!(name(&g, 11.0, 35.0).as_deref(), Some("Southia"));
}

#[test]
fn twkb_rows_decode() {
    let fixture = common::countries();
    let g = open(&fixture);
    assert_eq!(name(&g, -15.0, -15.0).as_deref(), Some("Twkbia"));
    assert_eq!(name(&g, -10.0, -20.0).as_deref(), Some("Twkbia"));
    assert_eq!(name(&g, -9.5, -15.0), None);
}

#[test]
fn validation_mode_accepts_valid_dataset() {
    let fixture = common::countries();
    let config = EngineConfig::default().with_validate(true);
    let g = Geocoder::open_with_config(&fixture.path, "countries", &["NAME"], config).unwrap();
    assert!(g.validate());
    assert_eq!(name(&g, 45.0, 12.0).as_deref(), Some("Westland"));
    assert_eq!(name(&g, -15.0, -15.0).as_deref(), Some("Twkbia"));
}

#[test]
fn auto_configures_first_features_table() {
    let fixture = common::countries();
    let g = Geocoder::open(&fixture.path, "", &["NAME"]).unwrap();
    assert_eq!(g.table(), "countries");
    assert_eq!(name(&g, 45.0, 5.0).as_deref(), Some("Westland"));
}

#[test]
fn discovers_geometry_column() {
    let fixture = common::countries();
    let g = Geocoder::open(&fixture.path, "cities", &["NAME", "POP_EST"]).unwrap();
    let columns = g
        .reverse_geocode(&QueryContext::background(), Location::new(46.0569, 14.5058))
        .unwrap();
    assert_eq!(columns, vec!["Ljubljana", "280000"]);

    let config = EngineConfig::default().with_geometry_column("geom");
    assert!(matches!(
        Geocoder::open_with_config(&fixture.path, "cities", &["NAME"], config),
        Err(Error::Config(_))
    ));
}

#[test]
fn open_rejects_bad_arguments() {
    let fixture = common::countries();
    let none: [&str; 0] = [];
    assert!(matches!(
        Geocoder::open(&fixture.path, "countries", &none),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Geocoder::open(&fixture.path, "atlantis", &["NAME"]),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Geocoder::open(fixture.path.with_file_name("missing.gpkg"), "countries", &["NAME"]),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Geocoder::open_with_config(
            &fixture.path,
            "countries",
            &["NAME"],
            EngineConfig::default().with_pool_size(0)
        ),
        Err(Error::Config(_))
    ));
    assert!(matches!("NAME SIDEWAYS".parse::<Order>(), Err(Error::Config(_))));
}

#[test]
fn unknown_columns_are_rejected_at_open() {
    let fixture = common::countries();
    assert!(matches!(
        Geocoder::open(&fixture.path, "countries", &["NAMEE"]),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Geocoder::open(&fixture.path, "countries", &["NAME", "ISO_A2"]),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Geocoder::open_with_config(
            &fixture.path,
            "countries",
            &["NAME"],
            EngineConfig::default().with_id_column("id")
        ),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Geocoder::open_with_config(
            &fixture.path,
            "countries",
            &["NAME"],
            EngineConfig::default().with_order(Order::ascending("POPULATION").unwrap())
        ),
        Err(Error::Config(_))
    ));

    // identifiers match the table case-insensitively
    let config = EngineConfig::default().with_id_column("FID");
    let g = Geocoder::open_with_config(&fixture.path, "countries", &["name"], config).unwrap();
    assert_eq!(name(&g, 45.0, 5.0).as_deref(), Some("Westland"));
}

#[test]
fn unknown_order_column_is_a_hard_error() {
    let fixture = common::countries();
    let mut g = open(&fixture);
    g.set_order(Some(Order::ascending("NO_SUCH_COLUMN").unwrap()))
        .unwrap();
    assert!(matches!(
        g.reverse_geocode(&QueryContext::background(), Location::new(45.0, 5.0)),
        Err(Error::Config(_))
    ));
    g.set_order(Some(Order::descending("iso_a3").unwrap())).unwrap();
    assert_eq!(name(&g, 11.0, 35.0).as_deref(), Some("Southia"));
}

#[test]
fn attributes_use_sqlite_text_rendering() {
    let fixture = common::countries();
    let g = Geocoder::open(&fixture.path, "countries", &["NAME", "AREA", "POP_EST"]).unwrap();
    let lookup = |lat, lon| {
        g.reverse_geocode(&QueryContext::background(), Location::new(lat, lon))
            .unwrap()
    };
    assert_eq!(lookup(45.0, 5.0), vec!["Westland", "3.0", "5000000"]);
    assert_eq!(lookup(42.0, 17.0), vec!["Eastland", "1.0e+20", "7000000"]);
    assert_eq!(lookup(15.0, 35.0), vec!["Northia", "0.25", "1000000"]);
    assert_eq!(lookup(5.0, 35.0), vec!["Southia", "", "9000000"]);
}

#[test]
fn cache_prevents_second_decode() {
    let fixture = common::countries();
    let mut g = open(&fixture);
    let cache = Arc::new(MemoryCache::new());
    g.set_cache(Some(cache.clone()));

    let first = g
        .reverse_geocode(&QueryContext::background(), Location::new(45.0, 5.0))
        .unwrap();
    let decodes = g.stats().decodes;
    assert_eq!(decodes, 1);
    assert!(cache.get(tinygpkg::FeatureId(1)).is_some());

    let second = g
        .reverse_geocode(&QueryContext::background(), Location::new(48.0, 2.0))
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(g.stats().decodes, decodes);
    assert_eq!(g.stats().cache_hits, 1);
}

#[test]
fn without_cache_every_lookup_decodes() {
    let fixture = common::countries();
    let g = open(&fixture);
    name(&g, 45.0, 5.0);
    name(&g, 48.0, 2.0);
    assert_eq!(g.stats().decodes, 2);
    assert_eq!(g.stats().cache_hits, 0);
}

#[test]
fn cancelled_and_expired_contexts() {
    let fixture = common::countries();
    let g = open(&fixture);

    let ctx = QueryContext::background();
    ctx.token().cancel();
    assert!(matches!(
        g.reverse_geocode(&ctx, Location::new(45.0, 5.0)),
        Err(Error::Cancelled)
    ));

    let ctx = QueryContext::background().with_deadline(Instant::now());
    assert!(matches!(
        g.reverse_geocode(&ctx, Location::new(45.0, 5.0)),
        Err(Error::DeadlineExceeded)
    ));

    // the pool is intact afterwards
    assert_eq!(name(&g, 45.0, 5.0).as_deref(), Some("Westland"));
}

#[test]
fn concurrent_lookups_share_a_small_pool() {
    let fixture = common::countries();
    let config = EngineConfig::default().with_pool_size(2);
    let mut g = Geocoder::open_with_config(&fixture.path, "countries", &["NAME"], config).unwrap();
    g.set_cache(Some(Arc::new(MemoryCache::new())));
    let g = Arc::new(g);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let g = Arc::clone(&g);
            thread::spawn(move || {
                for _ in 0..25 {
                    let (lat, lon, want) = if i % 2 == 0 {
                        (45.0, 5.0, Some("Westland"))
                    } else {
                        (0.0, 0.0, None)
                    };
                    assert_eq!(name(&g, lat, lon).as_deref(), want);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(g.stats().queries, 200);
}

#[test]
fn close_is_idempotent() {
    let fixture = common::countries();
    let mut g = open(&fixture);
    assert!(g.close().is_ok());
    assert!(g.close().is_ok());
    assert!(matches!(
        g.reverse_geocode(&QueryContext::background(), Location::new(45.0, 5.0)),
        Err(Error::Closed)
    ));
}
