use std::time::Duration;
use tinygpkg::{Geocoder, Location, QueryContext};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 6 {
        eprintln!(
            "Usage: {} <gpkg> <table|\"\"> <column[,column...]> <lat> <lon>",
            args[0]
        );
        return Ok(());
    }

    let columns: Vec<&str> = args[3].split(',').collect();
    let lat: f64 = args[4].parse()?;
    let lon: f64 = args[5].parse()?;

    let mut geocoder = Geocoder::open(&args[1], &args[2], &columns)?;
    let ctx = QueryContext::background().with_timeout(Duration::from_secs(10));

    match geocoder.reverse_geocode(&ctx, Location::new(lat, lon)) {
        Ok(values) => {
            for (column, value) in columns.iter().zip(&values) {
                println!("  {}: {}", column, value);
            }
        }
        Err(e) if e.is_not_found() => println!("No feature found"),
        Err(e) => return Err(e.into()),
    }

    geocoder.close()?;
    Ok(())
}
