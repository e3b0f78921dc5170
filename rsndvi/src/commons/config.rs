use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::collect::global_variables::{
    get_data_path, get_output_path, CDSE_TOKEN_URL, DEFAULT_HISTORY_SEARCH_LIMIT,
    DEFAULT_HISTORY_YEARS, DEFAULT_RASTER_SIZE, DEFAULT_SEARCH_LIMIT, DEFAULT_TIMEOUT_SECS,
    NOMINATIM_URL, SENTINEL2_L2A, SH_CATALOG_URL, SH_PROCESS_URL,
};
use crate::composite::builder::Reduction;
use crate::composite::scene_picker::DEFAULT_SCENE_LIMIT;
use crate::error::{PipelineError, Result};

/// Everything a pipeline run needs, passed in at construction.
///
/// Any field missing from a JSON file falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// OAuth client id for the Copernicus Data Space identity server
    pub client_id: Option<String>,
    /// OAuth client secret (never serialized back out)
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    /// Root of the per-location scene cache
    pub data_dir: PathBuf,
    /// Where yearly composites are written
    pub output_dir: PathBuf,
    /// Best-K scenes kept per year
    pub scene_limit: usize,
    /// Catalog result cap for one year's window
    pub search_limit: usize,
    /// Catalog result cap for one historical lookback period
    pub history_search_limit: usize,
    pub history_years: u32,
    /// Width and height in pixels of every fetched scene
    pub raster_size: u32,
    pub search_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub collection: String,
    pub reduction: Reduction,
    pub token_url: String,
    pub catalog_url: String,
    pub process_url: String,
    pub geocoder_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            client_id: None,
            client_secret: None,
            data_dir: get_data_path(),
            output_dir: get_output_path(),
            scene_limit: DEFAULT_SCENE_LIMIT,
            search_limit: DEFAULT_SEARCH_LIMIT,
            history_search_limit: DEFAULT_HISTORY_SEARCH_LIMIT,
            history_years: DEFAULT_HISTORY_YEARS,
            raster_size: DEFAULT_RASTER_SIZE,
            search_timeout_secs: DEFAULT_TIMEOUT_SECS,
            fetch_timeout_secs: DEFAULT_TIMEOUT_SECS,
            collection: SENTINEL2_L2A.to_string(),
            reduction: Reduction::Max,
            token_url: CDSE_TOKEN_URL.to_string(),
            catalog_url: SH_CATALOG_URL.to_string(),
            process_url: SH_PROCESS_URL.to_string(),
            geocoder_url: NOMINATIM_URL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        PipelineConfig::default().with_env_overrides()
    }

    /// Overlay `CDSE_CLIENT_ID`, `CDSE_CLIENT_SECRET`, `RSNDVI_DATA_DIR`, `RSNDVI_OUTPUT_DIR`
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(id) = lookup("CDSE_CLIENT_ID") {
            self.client_id = Some(id);
        }
        if let Some(secret) = lookup("CDSE_CLIENT_SECRET") {
            self.client_secret = Some(secret);
        }
        if let Some(dir) = lookup("RSNDVI_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RSNDVI_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.scene_limit == 0 {
            return Err(PipelineError::Config("scene_limit must be positive".into()));
        }
        if self.search_limit == 0 || self.history_search_limit == 0 {
            return Err(PipelineError::Config("search limits must be positive".into()));
        }
        if self.raster_size == 0 {
            return Err(PipelineError::Config("raster_size must be positive".into()));
        }
        for (name, endpoint) in [
            ("token_url", &self.token_url),
            ("catalog_url", &self.catalog_url),
            ("process_url", &self.process_url),
            ("geocoder_url", &self.geocoder_url),
        ] {
            Url::parse(endpoint)
                .map_err(|e| PipelineError::Config(format!("{} '{}': {}", name, endpoint, e)))?;
        }
        Ok(())
    }
}
