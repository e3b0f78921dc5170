use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::collect::{AccessToken, MetadataCatalog};
use crate::commons::basic_functions::parse_iso_date;
use crate::commons::config::PipelineConfig;
use crate::composite::scene_picker::SceneRecord;
use crate::error::{PipelineError, Result};
use crate::geo_core::BoundingBox;

/// STAC item search request body
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    bbox: [f64; 4],
    datetime: String,
    collections: [&'a str; 1],
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<StacFeature>,
}

#[derive(Debug, Deserialize)]
struct StacFeature {
    properties: StacProperties,
}

#[derive(Debug, Deserialize)]
struct StacProperties {
    datetime: Option<String>,
    #[serde(rename = "eo:cloud_cover")]
    cloud_cover: Option<f64>,
}

/// Sentinel Hub catalog (STAC search API) of the Copernicus Data Space
pub struct SentinelHubCatalog {
    client: Client,
    url: String,
    collection: String,
}

impl SentinelHubCatalog {
    pub fn new(url: impl Into<String>, collection: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Catalog(format!("Failed to create HTTP client: {}", e)))?;
        Ok(SentinelHubCatalog {
            client,
            url: url.into(),
            collection: collection.into(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            config.catalog_url.clone(),
            config.collection.clone(),
            Duration::from_secs(config.search_timeout_secs),
        )
    }
}

/// Whole days, midnight of `start` to the last second of `end`
fn datetime_interval(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{}T00:00:00Z/{}T23:59:59Z",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

/// Typed records from a STAC response; features without a usable date are dropped
fn scenes_from_response(response: SearchResponse) -> Vec<SceneRecord> {
    response
        .features
        .into_iter()
        .filter_map(|feature| {
            let props = feature.properties;
            match props.datetime.as_deref().and_then(parse_iso_date) {
                Some(date) => Some(SceneRecord::new(date, props.cloud_cover)),
                None => {
                    warn!("Dropping catalog feature with datetime {:?}", props.datetime);
                    None
                }
            }
        })
        .collect()
}

impl MetadataCatalog for SentinelHubCatalog {
    fn search(
        &self,
        token: &AccessToken,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
        limit: usize,
    ) -> Result<Vec<SceneRecord>> {
        let payload = SearchRequest {
            bbox: bbox.to_array(),
            datetime: datetime_interval(start, end),
            collections: [self.collection.as_str()],
            limit,
        };
        debug!("Catalog search {} over {:?}", payload.datetime, payload.bbox);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token.as_str())
            .json(&payload)
            .send()
            .map_err(|e| PipelineError::Catalog(format!("Failed to send search request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(PipelineError::Catalog(format!(
                "Catalog returned error {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .map_err(|e| PipelineError::Catalog(format!("Malformed search response: {}", e)))?;

        Ok(scenes_from_response(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_interval() {
        let start = NaiveDate::from_ymd_opt(2020, 11, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();
        assert_eq!(
            datetime_interval(start, end),
            "2020-11-01T00:00:00Z/2021-01-31T23:59:59Z"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let payload = SearchRequest {
            bbox: [76.9775, 28.5791, 77.2275, 28.8291],
            datetime: "2021-05-01T00:00:00Z/2021-07-31T23:59:59Z".into(),
            collections: ["sentinel-2-l2a"],
            limit: 50,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["collections"][0], "sentinel-2-l2a");
        assert_eq!(value["limit"], 50);
        assert_eq!(value["bbox"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_scenes_from_response() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {"properties": {"datetime": "2021-06-03T05:31:12Z", "eo:cloud_cover": 12.5}},
                {"properties": {"datetime": "2021-06-08T05:31:09Z"}},
                {"properties": {"datetime": "garbage", "eo:cloud_cover": 1.0}},
                {"properties": {"eo:cloud_cover": 3.0}}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let scenes = scenes_from_response(parsed);
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].date, NaiveDate::from_ymd_opt(2021, 6, 3).unwrap());
        assert_eq!(scenes[0].cloud_cover, Some(12.5));
        assert_eq!(scenes[1].cloud_cover, None);
    }

    #[test]
    fn test_missing_features_is_empty() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"type":"FeatureCollection"}"#).unwrap();
        assert!(scenes_from_response(parsed).is_empty());
    }
}
