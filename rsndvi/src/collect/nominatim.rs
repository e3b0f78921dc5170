use geo::Point;
use log::info;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::collect::global_variables::{GEOCODER_USER_AGENT, NOMINATIM_URL};
use crate::collect::CoordinateResolver;
use crate::error::{PipelineError, Result};

/// Nominatim returns coordinates as strings
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Place-name geocoding through an OpenStreetMap Nominatim server
pub struct NominatimResolver {
    client: Client,
    url: String,
}

impl NominatimResolver {
    pub fn new() -> Result<Self> {
        Self::with_url(NOMINATIM_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        // Nominatim's usage policy rejects requests without a User-Agent
        let client = Client::builder()
            .user_agent(GEOCODER_USER_AGENT)
            .build()
            .map_err(|e| PipelineError::Geocoding(format!("Failed to create HTTP client: {}", e)))?;
        Ok(NominatimResolver {
            client,
            url: url.into(),
        })
    }
}

fn first_point(places: &[Place]) -> Result<Point<f64>> {
    let place = places
        .first()
        .ok_or_else(|| PipelineError::Geocoding("Location not found.".into()))?;
    let lat: f64 = place
        .lat
        .parse()
        .map_err(|_| PipelineError::Geocoding(format!("Invalid latitude {:?}", place.lat)))?;
    let lon: f64 = place
        .lon
        .parse()
        .map_err(|_| PipelineError::Geocoding(format!("Invalid longitude {:?}", place.lon)))?;
    Ok(Point::new(lon, lat))
}

impl CoordinateResolver for NominatimResolver {
    fn resolve(&self, place_name: &str) -> Result<Point<f64>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", place_name), ("format", "json"), ("limit", "1")])
            .send()
            .map_err(|e| PipelineError::Geocoding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Geocoding(format!(
                "Geocoder returned {}",
                response.status()
            )));
        }

        let places: Vec<Place> = response
            .json()
            .map_err(|e| PipelineError::Geocoding(format!("Malformed geocoder response: {}", e)))?;
        let point = first_point(&places)?;
        info!("Geocoded {:?} to lat {}, lon {}", place_name, point.y(), point.x());
        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_point() {
        let places: Vec<Place> = serde_json::from_str(
            r#"[{"place_id": 1, "lat": "28.6517178", "lon": "77.2219388", "display_name": "Delhi"}]"#,
        )
        .unwrap();
        let point = first_point(&places).unwrap();
        assert!((point.x() - 77.2219388).abs() < 1e-9);
        assert!((point.y() - 28.6517178).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let err = first_point(&[]).unwrap_err();
        assert!(err.to_string().contains("Location not found"));
    }

    #[test]
    fn test_bad_coordinate() {
        let places = vec![Place {
            lat: "north".into(),
            lon: "1.0".into(),
        }];
        assert!(matches!(first_point(&places), Err(PipelineError::Geocoding(_))));
    }
}
