use url::Url;

use crate::{
    error::{LiveError, LiveResult},
    source::{ManifestFetcher, RawManifest},
    util::http::HttpClient,
};

/// Fetches manifests with a plain HTTP GET.
#[derive(Clone, Default)]
pub struct HttpManifestFetcher {
    client: HttpClient,
}

impl HttpManifestFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, url: &Url) -> LiveResult<RawManifest> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            tracing::warn!(%url, status = %response.status(), "Manifest request failed");
            return Err(LiveError::HttpError(response.status()));
        }

        let url = response.url().clone();
        let body = response.text().await?;
        tracing::debug!(%url, bytes = body.len(), "Manifest fetched");
        Ok(RawManifest { url, body })
    }
}
