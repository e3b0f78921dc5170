use anyhow::Result;
use geo::Point;
use rsndvi::{BoundingBox, CdsePipeline, PipelineConfig};

/// Example: yearly NDVI composites around Pune, India
///
/// Needs CDSE_CLIENT_ID and CDSE_CLIENT_SECRET in the environment.
fn main() -> Result<()> {
    env_logger::init();
    println!("=== Example: Yearly NDVI composites ===\n");

    // 0.25 degree square centred on Pune
    let bbox = BoundingBox::around(Point::new(73.8567, 18.5204))?;
    println!("Bounding box: {:?}", bbox.to_array());

    let pipeline = CdsePipeline::from_config(PipelineConfig::from_env())?;
    println!("Scenes cached in {:?}", pipeline.config().data_dir);
    println!("Composites written to {:?}", pipeline.config().output_dir);

    let report = pipeline.run(&bbox, 2021, 2023)?;

    println!("\nClearest season: {}", report.window);
    for (year, composite) in &report.composites {
        println!(
            "  - {}: {:?} from {} scenes",
            year,
            composite.output_path,
            composite.contributing_scene_paths.len()
        );
    }
    for year in &report.skipped_years {
        println!("  - {}: skipped ({})", year, report.skip_reasons[year]);
    }

    Ok(())
}
