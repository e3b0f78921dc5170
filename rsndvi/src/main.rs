use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use geo::Point;
use log::info;
use serde_json::json;
use std::collections::BTreeMap;

use rsndvi::collect::nominatim::NominatimResolver;
use rsndvi::collect::CoordinateResolver;
use rsndvi::{BoundingBox, CdsePipeline, PipelineConfig, PipelineReport};

mod cli;

use cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== Yearly NDVI composites ===");

    if args.end_year < args.start_year {
        bail!("'end_year' must be greater than or equal to 'start_year'.");
    }

    // File first, then environment, then command line
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    if let Some(reduction) = args.reduction {
        config.reduction = reduction;
    }

    let center = match (&args.place, args.lat, args.lon) {
        (Some(place), _, _) => {
            let resolver = NominatimResolver::with_url(config.geocoder_url.clone())?;
            resolver.resolve(place).context("Geocoding failed")?
        }
        (None, Some(lat), Some(lon)) => Point::new(lon, lat),
        _ => bail!("Missing location. Please provide either '--place' or both '--lat' and '--lon'."),
    };

    let bbox = BoundingBox::around(center)?;
    info!("Bounding box: {:?}", bbox.to_array());

    let pipeline = CdsePipeline::from_config(config)?;
    info!(
        "Scenes cached in {:?}, composites written to {:?}",
        pipeline.config().data_dir,
        pipeline.config().output_dir
    );
    let report = pipeline.run(&bbox, args.start_year, args.end_year)?;

    println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    Ok(())
}

fn report_json(report: &PipelineReport) -> serde_json::Value {
    let composites: BTreeMap<i32, String> = report
        .composites
        .iter()
        .map(|(year, c)| (*year, c.output_path.display().to_string()))
        .collect();
    json!({
        "message": format!("Successfully generated {} yearly composites.", composites.len()),
        "results": {
            "composites": composites,
            "skipped_years": report.skipped_years,
            "optimal_window_months": [report.window.start_month(), report.window.end_month()],
            "skip_reasons": report.skip_reasons,
        }
    })
}
