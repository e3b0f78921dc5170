use geo::Point;
use serde::{Deserialize, Serialize};

use crate::collect::global_variables::BBOX_HALF_WIDTH_DEG;
use crate::error::{PipelineError, Result};

/// Bounding box structure, always in EPSG:4326 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Square box of `BBOX_HALF_WIDTH_DEG` around a centre point (x = lon, y = lat)
    pub fn around(center: Point<f64>) -> Result<Self> {
        Self::around_with_half_width(center, BBOX_HALF_WIDTH_DEG)
    }

    pub fn around_with_half_width(center: Point<f64>, half_width: f64) -> Result<Self> {
        let bbox = BoundingBox::new(
            center.x() - half_width,
            center.y() - half_width,
            center.x() + half_width,
            center.y() + half_width,
        );
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check min < max on both axes (NaN coordinates fail too)
    pub fn validate(&self) -> Result<()> {
        if self.min_x < self.max_x && self.min_y < self.max_y {
            Ok(())
        } else {
            Err(PipelineError::InvalidBoundingBox(
                self.min_x, self.min_y, self.max_x, self.max_y,
            ))
        }
    }

    /// `[min_lon, min_lat, max_lon, max_lat]`, the order STAC and Sentinel Hub expect
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Directory name that partitions downloaded scenes per location
    pub fn location_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
