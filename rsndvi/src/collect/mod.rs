//! Remote collaborators of the composite pipeline.
//!
//! The pipeline only sees the traits below; `copernicus` and `nominatim`
//! hold the HTTP implementations.

use chrono::NaiveDate;
use geo::Point;

use crate::composite::scene_picker::SceneRecord;
use crate::error::Result;
use crate::geo_core::BoundingBox;

pub mod copernicus;
pub mod global_variables;
pub mod nominatim;

/// Bearer token shared by every request of one run
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Source of the run-wide access token. Failure is fatal for the run.
pub trait CredentialProvider {
    fn get_token(&self) -> Result<AccessToken>;
}

/// Scene metadata search. Results are not assumed to be sorted.
pub trait MetadataCatalog {
    fn search(
        &self,
        token: &AccessToken,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
        limit: usize,
    ) -> Result<Vec<SceneRecord>>;
}

/// Renders the single-band NDVI raster of one day over a bounding box
pub trait ImageProvider {
    fn fetch_raster(&self, token: &AccessToken, bbox: &BoundingBox, date: NaiveDate)
        -> Result<Vec<u8>>;
}

/// Place name to point (x = longitude, y = latitude)
pub trait CoordinateResolver {
    fn resolve(&self, place_name: &str) -> Result<Point<f64>>;
}
