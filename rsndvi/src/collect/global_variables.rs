use std::path::PathBuf;

pub const DATA_PATH: &str = "./data";
pub const OUTPUT_PATH: &str = "./output";

/// Half side of the analysis square around a point, in degrees
pub const BBOX_HALF_WIDTH_DEG: f64 = 0.125;

pub const CDSE_TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";
pub const SH_CATALOG_URL: &str = "https://sh.dataspace.copernicus.eu/api/v1/catalog/1.0.0/search";
pub const SH_PROCESS_URL: &str = "https://sh.dataspace.copernicus.eu/api/v1/process";
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

pub const SENTINEL2_L2A: &str = "sentinel-2-l2a";
pub const GEOCODER_USER_AGENT: &str = "vegetation_analyzer";

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_HISTORY_SEARCH_LIMIT: usize = 100;
pub const DEFAULT_HISTORY_YEARS: u32 = 5;
pub const DEFAULT_RASTER_SIZE: u32 = 512;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub fn get_data_path() -> PathBuf {
    PathBuf::from(DATA_PATH)
}

pub fn get_output_path() -> PathBuf {
    PathBuf::from(OUTPUT_PATH)
}
