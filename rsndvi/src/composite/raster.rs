use gdal::raster::{Buffer, RasterBand};
use gdal::{Dataset, DriverManager};
use log::debug;
use ndarray::Array2;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Georeferencing profile shared by every raster of one composite
#[derive(Debug, Clone, PartialEq)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    /// GDAL affine transform: origin x, pixel width, row rotation, origin y, column rotation, pixel height
    pub geotransform: [f64; 6],
    /// CRS as WKT; empty when the file carries none
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterProfile {
    /// Same pixel grid: dimensions plus transform within `1e-9`
    pub fn same_grid(&self, other: &RasterProfile) -> bool {
        self.width == other.width
            && self.height == other.height
            && self
                .geotransform
                .iter()
                .zip(other.geotransform.iter())
                .all(|(a, b)| (a - b).abs() <= 1e-9)
    }
}

/// Single-band float grid plus its profile. Invalid pixels are NaN.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub data: Array2<f32>,
    pub profile: RasterProfile,
}

/// Read band 1 as `f32`, turning the declared no-data value into NaN
pub fn read_ndvi_raster(path: &Path) -> Result<RasterImage> {
    debug!("Opening raster: {:?}", path);
    let dataset = Dataset::open(path)?;
    let band: RasterBand = dataset.rasterband(1)?;

    let width = band.x_size();
    let height = band.y_size();
    let nodata = band.no_data_value();

    let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let mut values: Vec<f32> = buffer.into_iter().collect();
    if let Some(nd) = nodata.filter(|v| !v.is_nan()) {
        let nd = nd as f32;
        for v in values.iter_mut().filter(|v| **v == nd) {
            *v = f32::NAN;
        }
    }
    let data = Array2::from_shape_vec((height, width), values)?;

    let profile = RasterProfile {
        width,
        height,
        geotransform: dataset.geo_transform()?,
        projection: dataset.projection(),
        nodata,
    };

    Ok(RasterImage { data, profile })
}

/// Write a single-band float32 GeoTIFF; no-data is the profile's, NaN when unset
pub fn write_raster(path: &Path, image: &RasterImage) -> Result<()> {
    debug!("Creating output raster: {:?}", path);
    let profile = &image.profile;
    if image.data.dim() != (profile.height, profile.width) {
        return Err(PipelineError::GridMismatch {
            path: path.to_path_buf(),
            reason: format!(
                "data is {:?} but the profile declares {}x{}",
                image.data.dim(),
                profile.width,
                profile.height
            ),
        });
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset =
        driver.create_with_band_type::<f32, _>(path, profile.width, profile.height, 1)?;

    dataset.set_geo_transform(&profile.geotransform)?;
    if !profile.projection.is_empty() {
        dataset.set_projection(&profile.projection)?;
    }

    let mut band = dataset.rasterband(1)?;
    let values: Vec<f32> = image.data.iter().copied().collect();
    let mut buffer = Buffer::new((profile.width, profile.height), values);
    band.write((0, 0), (profile.width, profile.height), &mut buffer)?;
    band.set_no_data_value(Some(profile.nodata.unwrap_or(f64::NAN)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn profile(width: usize, height: usize) -> RasterProfile {
        RasterProfile {
            width,
            height,
            geotransform: [73.75, 0.125, 0.0, 18.65, 0.0, -0.125],
            projection: String::new(),
            nodata: None,
        }
    }

    #[test]
    fn test_write_then_read_keeps_values_and_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.tiff");
        let image = RasterImage {
            data: array![[0.25, f32::NAN, -0.5], [1.0, 0.0, 0.75]],
            profile: profile(3, 2),
        };
        write_raster(&path, &image).unwrap();

        let loaded = read_ndvi_raster(&path).unwrap();
        assert_eq!(loaded.data.dim(), (2, 3));
        assert_eq!(loaded.data[[0, 0]], 0.25);
        assert!(loaded.data[[0, 1]].is_nan());
        assert_eq!(loaded.data[[1, 2]], 0.75);
        assert!(loaded.profile.same_grid(&image.profile));
        assert!(loaded.profile.nodata.map_or(false, f64::is_nan));
    }

    #[test]
    fn test_declared_nodata_becomes_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodata.tiff");
        {
            let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
            let mut ds = driver.create_with_band_type::<f32, _>(&path, 2, 1, 1).unwrap();
            ds.set_geo_transform(&profile(2, 1).geotransform).unwrap();
            let mut band = ds.rasterband(1).unwrap();
            let mut buffer = Buffer::new((2, 1), vec![-999.0f32, 0.4]);
            band.write((0, 0), (2, 1), &mut buffer).unwrap();
            band.set_no_data_value(Some(-999.0)).unwrap();
        }

        let loaded = read_ndvi_raster(&path).unwrap();
        assert!(loaded.data[[0, 0]].is_nan());
        assert!((loaded.data[[0, 1]] - 0.4).abs() < 1e-6);
        assert_eq!(loaded.profile.nodata, Some(-999.0));
    }

    #[test]
    fn test_same_grid() {
        let a = profile(4, 4);
        let mut b = profile(4, 4);
        assert!(a.same_grid(&b));
        b.geotransform[0] += 0.5;
        assert!(!a.same_grid(&b));
        assert!(!a.same_grid(&profile(4, 3)));
    }

    #[test]
    fn test_write_rejects_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tiff");
        let image = RasterImage {
            data: array![[0.1, 0.2]],
            profile: profile(1, 2),
        };
        assert!(matches!(
            write_raster(&path, &image),
            Err(PipelineError::GridMismatch { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(read_ndvi_raster(Path::new("/nonexistent/scene.tiff")).is_err());
    }
}
