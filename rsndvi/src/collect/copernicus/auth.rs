use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::cell::RefCell;
use std::time::{Duration, Instant};

use crate::collect::{AccessToken, CredentialProvider};
use crate::commons::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Tokens are refreshed this long before the server says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

struct CachedToken {
    token: AccessToken,
    valid_until: Option<Instant>,
}

/// OAuth2 client-credentials login against the Copernicus Data Space identity server.
///
/// The token is cached and reused until it is about to expire.
pub struct CdseCredentials {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: RefCell<Option<CachedToken>>,
}

impl CdseCredentials {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PipelineError::Auth(format!("Failed to create HTTP client: {}", e)))?;
        Ok(CdseCredentials {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: RefCell::new(None),
        })
    }

    /// Build from config; missing credentials are an authentication error
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| PipelineError::Auth("client_id is not configured".into()))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| PipelineError::Auth("client_secret is not configured".into()))?;
        Self::new(config.token_url.clone(), client_id, client_secret)
    }

    fn request_token(&self) -> Result<CachedToken> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .map_err(|e| PipelineError::Auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(PipelineError::Auth(format!(
                "Identity server returned {}: {}",
                status, body
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .map_err(|e| PipelineError::Auth(format!("Malformed token response: {}", e)))?;

        info!("Authentication successful");
        Ok(CachedToken {
            token: AccessToken::new(parsed.access_token),
            valid_until: parsed
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN)),
        })
    }
}

impl CredentialProvider for CdseCredentials {
    fn get_token(&self) -> Result<AccessToken> {
        if let Some(cached) = self.cached.borrow().as_ref() {
            let fresh = cached.valid_until.map_or(true, |t| Instant::now() < t);
            if fresh {
                debug!("Reusing cached access token");
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.request_token()?;
        let token = fresh.token.clone();
        *self.cached.borrow_mut() = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_credentials() {
        let config = PipelineConfig::default();
        assert!(matches!(
            CdseCredentials::from_config(&config),
            Err(PipelineError::Auth(_))
        ));

        let config = PipelineConfig {
            client_id: Some("id".into()),
            ..PipelineConfig::default()
        };
        assert!(CdseCredentials::from_config(&config).is_err());
    }

    #[test]
    fn test_cached_token_is_reused() {
        let creds = CdseCredentials::new("http://127.0.0.1:9/token", "id", "secret").unwrap();
        *creds.cached.borrow_mut() = Some(CachedToken {
            token: AccessToken::new("abc"),
            valid_until: Some(Instant::now() + Duration::from_secs(600)),
        });
        // A network call would fail against the discard port
        assert_eq!(creds.get_token().unwrap().as_str(), "abc");
    }

    #[test]
    fn test_token_response_parsing() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"xyz","expires_in":600,"token_type":"Bearer"}"#)
                .unwrap();
        assert_eq!(parsed.access_token, "xyz");
        assert_eq!(parsed.expires_in, Some(600));
    }

    #[test]
    fn test_debug_hides_token() {
        let token = AccessToken::new("very-secret");
        assert!(!format!("{:?}", token).contains("very-secret"));
    }
}
