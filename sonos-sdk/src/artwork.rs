//! Fetch album art that players only serve over plain HTTP

use std::time::Duration;

use bytes::Bytes;
use sonos_state::Artwork;

use crate::error::{Result, SdkError};

#[derive(Clone)]
pub struct ArtworkFetcher {
    http: reqwest::Client,
}

impl ArtworkFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SdkError::Artwork(e.to_string()))?;
        Ok(Self { http })
    }

    /// Bytes of proxied art. Secure URLs are handed to the host directly, so
    /// only [`Artwork::Proxied`] is fetched.
    pub async fn fetch(&self, artwork: &Artwork) -> Result<Bytes> {
        let Artwork::Proxied(url) = artwork else {
            return Err(SdkError::Artwork("Missing Image URL".into()));
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SdkError::Artwork(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SdkError::Artwork(format!(
                "Invalid Response: {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| SdkError::Artwork(e.to_string()))
    }
}
