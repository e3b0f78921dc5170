use log::{debug, info};
use ndarray::{stack, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::composite::raster::{read_ndvi_raster, write_raster, RasterImage};
use crate::error::{PipelineError, Result};

/// Pixel-wise reduction across the time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Max,
    Mean,
}

impl Reduction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Max => "max",
            Reduction::Mean => "mean",
        }
    }

    /// Reduce one pixel's time series, skipping NaN. All-NaN stays NaN.
    fn reduce_ignoring_nan(&self, lane: ArrayView1<f32>) -> f32 {
        let mut valid = lane.iter().copied().filter(|v| !v.is_nan()).peekable();
        if valid.peek().is_none() {
            return f32::NAN;
        }
        match self {
            Reduction::Max => valid.fold(f32::NEG_INFINITY, f32::max),
            Reduction::Mean => {
                let (sum, count) = valid.fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
                (sum / count as f64) as f32
            }
        }
    }
}

impl std::fmt::Display for Reduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reduction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(Reduction::Max),
            "mean" => Ok(Reduction::Mean),
            other => Err(format!("unknown reduction '{}', expected 'max' or 'mean'", other)),
        }
    }
}

/// Stack equally-shaped grids along a new leading axis and reduce that axis
pub fn reduce_stack(grids: &[Array2<f32>], reduction: Reduction) -> Result<Array2<f32>> {
    if grids.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let views: Vec<ArrayView2<f32>> = grids.iter().map(|g| g.view()).collect();
    let cube = stack(Axis(0), &views)?;
    Ok(cube.map_axis(Axis(0), |lane| reduction.reduce_ignoring_nan(lane)))
}

/// Load, NaN-mask, stack and reduce rasters into one composite.
///
/// Every input must share the first raster's pixel grid. The result reuses
/// that raster's georeferencing with NaN as no-data.
pub fn build_composite(raster_paths: &[PathBuf], reduction: Reduction) -> Result<RasterImage> {
    let (first_path, rest) = raster_paths.split_first().ok_or(PipelineError::EmptyInput)?;

    let first = read_ndvi_raster(first_path)?;
    let mut profile = first.profile;
    let mut grids = Vec::with_capacity(raster_paths.len());
    grids.push(first.data);

    for path in rest {
        let image = read_ndvi_raster(path)?;
        if !image.profile.same_grid(&profile) {
            return Err(PipelineError::GridMismatch {
                path: path.clone(),
                reason: format!(
                    "{}x{} {:?} vs expected {}x{} {:?}",
                    image.profile.width,
                    image.profile.height,
                    image.profile.geotransform,
                    profile.width,
                    profile.height,
                    profile.geotransform
                ),
            });
        }
        grids.push(image.data);
    }

    debug!("Reducing {} rasters with {}", grids.len(), reduction);
    let data = reduce_stack(&grids, reduction)?;
    profile.nodata = Some(f64::NAN);

    Ok(RasterImage { data, profile })
}

/// Persist a composite, creating the parent directory when needed.
///
/// The raster is written next to `path` and renamed into place, so a failed
/// write never leaves a partial composite under the final name.
pub fn write_composite(path: &Path, composite: &RasterImage) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    if let Err(e) = write_raster(&partial, composite) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    std::fs::rename(&partial, path)?;
    info!("Composite image saved to: {:?}", path);
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
