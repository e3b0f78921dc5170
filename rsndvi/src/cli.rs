use clap::Parser;
use rsndvi::Reduction;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rsndvi")]
#[command(about = "Build yearly cloud-free NDVI composites from Sentinel-2 scenes")]
#[command(version)]
pub struct Args {
    /// Place name to geocode (e.g. "Pune, India")
    #[arg(short, long, value_name = "NAME", conflicts_with_all = ["lat", "lon"])]
    pub place: Option<String>,

    /// Latitude of the center point
    #[arg(long, value_name = "DEG", requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the center point
    #[arg(long, value_name = "DEG", requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// First year to composite
    #[arg(short, long, value_name = "YEAR")]
    pub start_year: i32,

    /// Last year to composite (inclusive)
    #[arg(short, long, value_name = "YEAR")]
    pub end_year: i32,

    /// JSON configuration file (defaults apply to missing fields)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Pixel reduction across scenes: max or mean (overrides the config)
    #[arg(short, long, value_name = "MODE")]
    pub reduction: Option<Reduction>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_place() {
        let args = Args::try_parse_from([
            "rsndvi", "--place", "Pune", "--start-year", "2020", "--end-year", "2022",
        ])
        .unwrap();
        assert_eq!(args.place.as_deref(), Some("Pune"));
        assert_eq!((args.start_year, args.end_year), (2020, 2022));
        assert!(args.reduction.is_none());
    }

    #[test]
    fn test_parse_negative_coordinates() {
        let args = Args::try_parse_from([
            "rsndvi", "--lat", "-33.9", "--lon", "-70.6", "-s", "2021", "-e", "2021", "-r", "mean",
        ])
        .unwrap();
        assert_eq!(args.lat, Some(-33.9));
        assert_eq!(args.lon, Some(-70.6));
        assert_eq!(args.reduction, Some(Reduction::Mean));
    }

    #[test]
    fn test_lat_requires_lon() {
        assert!(Args::try_parse_from(["rsndvi", "--lat", "18.5", "-s", "2021", "-e", "2021"]).is_err());
    }

    #[test]
    fn test_place_conflicts_with_coordinates() {
        assert!(Args::try_parse_from([
            "rsndvi", "--place", "Pune", "--lat", "18.5", "--lon", "73.8", "-s", "2021", "-e", "2021",
        ])
        .is_err());
    }
}
