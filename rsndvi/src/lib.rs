//! Yearly cloud-free NDVI composites from Sentinel-2 L2A scenes.
//!
//! The pipeline learns the clearest three-month season from past scene
//! metadata, then for every requested year picks the least clouded scenes
//! of that season, caches their NDVI rasters and reduces them pixel by pixel.

pub mod collect;
pub mod commons;
pub mod composite;
pub mod error;
pub mod geo_core;
pub mod pipeline;

pub use commons::config::PipelineConfig;
pub use composite::builder::Reduction;
pub use composite::season::SeasonalWindow;
pub use error::{PipelineError, Result};
pub use geo_core::BoundingBox;
pub use pipeline::{CdsePipeline, PipelineReport, YearComposite, YearlyCompositePipeline};
