use chrono::{Local, NaiveDate};
use gdal::Dataset;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::collect::copernicus::{CdseCredentials, SentinelHubCatalog, SentinelHubProcess};
use crate::collect::{AccessToken, CredentialProvider, ImageProvider, MetadataCatalog};
use crate::commons::config::PipelineConfig;
use crate::composite::builder::{build_composite, write_composite};
use crate::composite::scene_picker::{select_best, SceneRecord};
use crate::composite::season::{compute_optimal_window, gather_cloud_samples, SeasonalWindow};
use crate::error::{PipelineError, Result};
use crate::geo_core::BoundingBox;

/// One composed year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearComposite {
    pub year: i32,
    pub output_path: PathBuf,
    pub contributing_scene_paths: Vec<PathBuf>,
}

/// Why a year produced no composite
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InvalidWindow,
    CatalogUnavailable(String),
    NoScenes,
    NoRasters,
    CompositeFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidWindow => write!(f, "seasonal window has no valid dates"),
            SkipReason::CatalogUnavailable(e) => write!(f, "could not search for scenes: {}", e),
            SkipReason::NoScenes => write!(f, "no scenes found"),
            SkipReason::NoRasters => write!(f, "failed to download any images"),
            SkipReason::CompositeFailed(e) => write!(f, "composite failed: {}", e),
        }
    }
}

/// Terminal state of one year
#[derive(Debug, Clone, PartialEq)]
pub enum YearOutcome {
    Composed(YearComposite),
    Skipped(SkipReason),
}

/// Result of a whole run: every requested year is either composed or skipped
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub window: SeasonalWindow,
    pub composites: BTreeMap<i32, YearComposite>,
    pub skipped_years: Vec<i32>,
    pub skip_reasons: BTreeMap<i32, String>,
}

impl PipelineReport {
    fn new(window: SeasonalWindow) -> Self {
        PipelineReport {
            window,
            composites: BTreeMap::new(),
            skipped_years: Vec::new(),
            skip_reasons: BTreeMap::new(),
        }
    }

    fn record(&mut self, year: i32, outcome: YearOutcome) {
        match outcome {
            YearOutcome::Composed(composite) => {
                self.composites.insert(year, composite);
            }
            YearOutcome::Skipped(reason) => {
                self.skipped_years.push(year);
                self.skip_reasons.insert(year, reason.to_string());
            }
        }
    }
}

/// Pipeline wired to the Copernicus Data Space services
pub type CdsePipeline = YearlyCompositePipeline<CdseCredentials, SentinelHubCatalog, SentinelHubProcess>;

/// Builds one cloud-free NDVI composite per year for a bounding box.
///
/// Years run strictly one after another. Scene files are cached under
/// `data_dir/<location>` and never re-downloaded; two runs for the same
/// location at the same time may race on those files, so callers must
/// serialise them.
pub struct YearlyCompositePipeline<C, M, I> {
    config: PipelineConfig,
    credentials: C,
    catalog: M,
    images: I,
}

impl CdsePipeline {
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let credentials = CdseCredentials::from_config(&config)?;
        let catalog = SentinelHubCatalog::from_config(&config)?;
        let images = SentinelHubProcess::from_config(&config)?;
        Ok(YearlyCompositePipeline::new(config, credentials, catalog, images))
    }
}

impl<C, M, I> YearlyCompositePipeline<C, M, I>
where
    C: CredentialProvider,
    M: MetadataCatalog,
    I: ImageProvider,
{
    pub fn new(config: PipelineConfig, credentials: C, catalog: M, images: I) -> Self {
        YearlyCompositePipeline {
            config,
            credentials,
            catalog,
            images,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with today's local date as the end of the cloud-cover history
    pub fn run(&self, bbox: &BoundingBox, start_year: i32, end_year: i32) -> Result<PipelineReport> {
        self.run_at(bbox, start_year, end_year, Local::now().date_naive())
    }

    /// Run with an explicit reference date for the cloud-cover history.
    ///
    /// Only setup failures (invalid input, authentication, directory
    /// creation) are returned as errors; per-year failures land in the report.
    pub fn run_at(
        &self,
        bbox: &BoundingBox,
        start_year: i32,
        end_year: i32,
        today: NaiveDate,
    ) -> Result<PipelineReport> {
        bbox.validate()?;
        if end_year < start_year {
            return Err(PipelineError::InvalidYearRange {
                start: start_year,
                end: end_year,
            });
        }

        let token = self.credentials.get_token()?;

        let location_dir = self.config.data_dir.join(bbox.location_key());
        std::fs::create_dir_all(&location_dir)?;
        std::fs::create_dir_all(&self.config.output_dir)?;

        info!("Analyzing historical data to find clearest season");
        let samples = gather_cloud_samples(
            &self.catalog,
            &token,
            bbox,
            today,
            self.config.history_years,
            self.config.history_search_limit,
        );
        let window = compute_optimal_window(&samples);

        let mut report = PipelineReport::new(window);
        for year in start_year..=end_year {
            let outcome = self.process_year(&token, bbox, year, &window, &location_dir);
            if let YearOutcome::Skipped(reason) = &outcome {
                warn!("Skipping {}: {}", year, reason);
            }
            report.record(year, outcome);
        }

        info!(
            "Generated {} yearly composites, skipped {:?}",
            report.composites.len(),
            report.skipped_years
        );
        Ok(report)
    }

    /// Search, pick, fetch and compose a single year
    pub fn process_year(
        &self,
        token: &AccessToken,
        bbox: &BoundingBox,
        year: i32,
        window: &SeasonalWindow,
        location_dir: &Path,
    ) -> YearOutcome {
        let Some((start, end)) = window.date_range(year) else {
            return YearOutcome::Skipped(SkipReason::InvalidWindow);
        };
        info!("Processing year {} (window {} to {})", year, start, end);

        let search = self
            .catalog
            .search(token, bbox, start, end, self.config.search_limit);
        let candidates = match search {
            Ok(scenes) => scenes,
            Err(e) => return YearOutcome::Skipped(SkipReason::CatalogUnavailable(e.to_string())),
        };
        if candidates.is_empty() {
            return YearOutcome::Skipped(SkipReason::NoScenes);
        }

        let best = select_best(&candidates, self.config.scene_limit);
        info!(
            "Found {} scenes, selecting top {} to create composite",
            candidates.len(),
            best.len()
        );

        let mut raster_paths: Vec<PathBuf> = Vec::with_capacity(best.len());
        for scene in &best {
            let path = scene_path(location_dir, year, scene);
            if raster_paths.contains(&path) {
                continue;
            }
            match self.ensure_raster(token, bbox, scene, &path) {
                Ok(()) => raster_paths.push(path),
                Err(e) => warn!("Excluding scene {}: {}", scene.date, e),
            }
        }
        if raster_paths.is_empty() {
            return YearOutcome::Skipped(SkipReason::NoRasters);
        }

        let output_path = self.composite_path(bbox, year);
        let composed = build_composite(&raster_paths, self.config.reduction)
            .and_then(|composite| write_composite(&output_path, &composite));
        match composed {
            Ok(()) => YearOutcome::Composed(YearComposite {
                year,
                output_path,
                contributing_scene_paths: raster_paths,
            }),
            Err(e) => YearOutcome::Skipped(SkipReason::CompositeFailed(e.to_string())),
        }
    }

    /// Make sure the scene raster exists at `path`, fetching it only when missing
    pub fn ensure_raster(
        &self,
        token: &AccessToken,
        bbox: &BoundingBox,
        scene: &SceneRecord,
        path: &Path,
    ) -> Result<()> {
        if path.exists() {
            debug!("Using cached raster {:?}", path);
            return Ok(());
        }

        info!("Downloading {:?}", path.file_name().unwrap_or_default());
        let bytes = self.images.fetch_raster(token, bbox, scene.date)?;

        // Only a complete, readable raster may appear under the final name
        let partial = path.with_extension("tiff.part");
        std::fs::write(&partial, &bytes)?;
        if let Err(e) = Dataset::open(&partial) {
            let _ = std::fs::remove_file(&partial);
            return Err(PipelineError::Fetch(format!(
                "Response for {} is not a readable raster: {}",
                scene.date, e
            )));
        }
        std::fs::rename(&partial, path)?;
        Ok(())
    }

    /// `{output_dir}/composite_{reduction}_{year}_{location_key}.tiff`
    pub fn composite_path(&self, bbox: &BoundingBox, year: i32) -> PathBuf {
        self.config.output_dir.join(format!(
            "composite_{}_{}_{}.tiff",
            self.config.reduction,
            year,
            bbox.location_key()
        ))
    }
}

/// Cache file of one scene: `{year}_{date}_cc{cloud:.2}.tiff`, unknown cloud cover as `-1.00`
pub fn scene_path(location_dir: &Path, year: i32, scene: &SceneRecord) -> PathBuf {
    location_dir.join(format!(
        "{}_{}_cc{:.2}.tiff",
        year,
        scene.date.format("%Y-%m-%d"),
        scene.cloud_cover.unwrap_or(-1.0)
    ))
}
