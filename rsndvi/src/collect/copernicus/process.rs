use chrono::NaiveDate;
use log::debug;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::collect::{AccessToken, ImageProvider};
use crate::commons::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::geo_core::BoundingBox;

/// Single-band FLOAT32 NDVI. Cloud shadow (3), cloud (8, 9), cirrus (10) and
/// snow (11) scene-classification pixels are returned as NaN.
pub const NDVI_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
    return {
        input: [{
            bands: ["B04", "B08", "SCL", "dataMask"]
        }],
        output: {
            bands: 1,
            sampleType: "FLOAT32"
        }
    };
}
function evaluatePixel(sample) {
    let ndvi = (sample.B08 - sample.B04) / (sample.B08 + sample.B04);
    if (sample.SCL == 3 || sample.SCL == 8 || sample.SCL == 9 || sample.SCL == 10 || sample.SCL == 11) {
        return [NaN];
    }
    return [ndvi];
}
"#;

const EPSG_4326_URI: &str = "http://www.opengis.net/def/crs/EPSG/0/4326";

/// Sentinel Hub process API rendering one day's NDVI as GeoTIFF
pub struct SentinelHubProcess {
    client: Client,
    url: String,
    collection: String,
    size: u32,
}

impl SentinelHubProcess {
    pub fn new(
        url: impl Into<String>,
        collection: impl Into<String>,
        size: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Fetch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(SentinelHubProcess {
            client,
            url: url.into(),
            collection: collection.into(),
            size,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            config.process_url.clone(),
            config.collection.clone(),
            config.raster_size,
            Duration::from_secs(config.fetch_timeout_secs),
        )
    }

    fn payload(&self, bbox: &BoundingBox, date: NaiveDate) -> Value {
        let day = date.format("%Y-%m-%d");
        json!({
            "input": {
                "bounds": {
                    "bbox": bbox.to_array(),
                    "properties": { "crs": EPSG_4326_URI }
                },
                "data": [{
                    "type": self.collection,
                    "dataFilter": {
                        "timeRange": {
                            "from": format!("{}T00:00:00Z", day),
                            "to": format!("{}T23:59:59Z", day)
                        }
                    }
                }]
            },
            "output": {
                "width": self.size,
                "height": self.size,
                "responses": [{
                    "identifier": "default",
                    "format": { "type": "image/tiff" }
                }]
            },
            "evalscript": NDVI_EVALSCRIPT
        })
    }
}

impl ImageProvider for SentinelHubProcess {
    fn fetch_raster(
        &self,
        token: &AccessToken,
        bbox: &BoundingBox,
        date: NaiveDate,
    ) -> Result<Vec<u8>> {
        debug!("Process request for {}", date);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token.as_str())
            .header("Accept", "image/tiff")
            .json(&self.payload(bbox, date))
            .send()
            .map_err(|e| PipelineError::Fetch(format!("Download error for {}: {}", date, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(PipelineError::Fetch(format!(
                "Process API returned {} for {}: {}",
                status, date, body
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| PipelineError::Fetch(format!("Failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_covers_single_day() {
        let process = SentinelHubProcess::new(
            "http://localhost/process",
            "sentinel-2-l2a",
            512,
            Duration::from_secs(5),
        )
        .unwrap();
        let bbox = BoundingBox::new(73.75, 18.4, 74.0, 18.65);
        let payload = process.payload(&bbox, NaiveDate::from_ymd_opt(2022, 3, 9).unwrap());

        let range = &payload["input"]["data"][0]["dataFilter"]["timeRange"];
        assert_eq!(range["from"], "2022-03-09T00:00:00Z");
        assert_eq!(range["to"], "2022-03-09T23:59:59Z");
        assert_eq!(payload["output"]["width"], 512);
        assert_eq!(payload["output"]["height"], 512);
        assert_eq!(payload["input"]["bounds"]["bbox"][0], 73.75);
        assert_eq!(payload["input"]["data"][0]["type"], "sentinel-2-l2a");
    }

    #[test]
    fn test_evalscript_masks_clouds() {
        assert!(NDVI_EVALSCRIPT.contains("sample.SCL == 9"));
        assert!(NDVI_EVALSCRIPT.contains("FLOAT32"));
    }
}
