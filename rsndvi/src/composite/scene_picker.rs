use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default number of scenes kept per year
pub const DEFAULT_SCENE_LIMIT: usize = 15;

/// Ranking value for a scene without cloud-cover metadata; sorts after every real value
pub const MISSING_CLOUD_COVER_RANK: f64 = 101.0;

/// One satellite observation of the bounding box on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub date: NaiveDate,
    /// Percentage of the scene obscured by cloud (0-100), when the catalog knows it
    pub cloud_cover: Option<f64>,
}

impl SceneRecord {
    pub fn new(date: NaiveDate, cloud_cover: Option<f64>) -> Self {
        SceneRecord { date, cloud_cover }
    }

    fn rank(&self) -> f64 {
        self.cloud_cover.unwrap_or(MISSING_CLOUD_COVER_RANK)
    }
}

/// Clearest `limit` scenes, ascending cloud cover.
///
/// The sort is stable, so scenes with equal cloud cover keep their input order.
pub fn select_best(scenes: &[SceneRecord], limit: usize) -> Vec<SceneRecord> {
    let mut ranked = scenes.to_vec();
    ranked.sort_by(|a, b| a.rank().total_cmp(&b.rank()));
    ranked.truncate(limit);
    ranked
}
