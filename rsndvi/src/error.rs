use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the composite pipeline and its collaborators.
///
/// `Auth` and the input-validation variants abort a whole run. Everything
/// else is caught at the year boundary and turned into a skip record.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Catalog search failed: {0}")]
    Catalog(String),

    #[error("Raster fetch failed: {0}")]
    Fetch(String),

    #[error("Geocoding failed: {0}")]
    Geocoding(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Raster path list is empty for compositing")]
    EmptyInput,

    #[error("Raster {path:?} does not match the composite grid: {reason}")]
    GridMismatch { path: PathBuf, reason: String },

    #[error("Invalid bounding box: ({0}, {1}, {2}, {3})")]
    InvalidBoundingBox(f64, f64, f64, f64),

    #[error("'end_year' ({end}) must be greater than or equal to 'start_year' ({start})")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
