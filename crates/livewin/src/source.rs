use std::future::Future;

use url::Url;

use crate::{error::LiveResult, manifest::ManifestSnapshot};

/// Manifest body as returned by a [`ManifestFetcher`].
#[derive(Debug, Clone)]
pub struct RawManifest {
    /// Final location of the manifest, after redirects. Relative URLs inside
    /// the manifest resolve against it.
    pub url: Url,
    pub body: String,
}

/// Retrieves manifests over the network.
pub trait ManifestFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = LiveResult<RawManifest>> + Send;
}

/// Turns a fetched manifest into a [`ManifestSnapshot`].
pub trait ManifestProcessor: Send + Sync + 'static {
    fn process(&self, raw: RawManifest)
        -> impl Future<Output = LiveResult<ManifestSnapshot>> + Send;
}

/// The player the scheduler corrects positions on.
pub trait PlaybackSurface: Send {
    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, time: f64);
}
