use std::{ops::Deref, sync::Arc, time::Duration};

use reqwest::{Client, ClientBuilder, IntoUrl};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};

use crate::error::LiveResult;

/// Request timeout of clients built without an explicit builder.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A `reqwest::Client` sharing one cookie store across clones.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    cookies_store: Arc<CookieStoreMutex>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> LiveResult<Self> {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder.cookie_provider(cookies_store.clone()).build()?;

        Ok(Self {
            client,
            cookies_store,
        })
    }

    /// A client whose requests give up after `timeout`, so a stalled origin
    /// cannot hold a refresh in flight forever.
    pub fn with_timeout(timeout: Duration) -> Self {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = Client::builder()
            .cookie_provider(cookies_store.clone())
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, falling back to defaults");
                Client::default()
            });

        Self {
            client,
            cookies_store,
        }
    }

    pub fn add_cookies(&self, cookies: Vec<String>, url: impl IntoUrl) -> LiveResult<()> {
        let url = url.into_url()?;
        let mut lock = self
            .cookies_store
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for cookie in cookies {
            if let Err(e) = lock.parse(&cookie, &url) {
                tracing::warn!(error = %e, "Ignoring invalid cookie");
            }
        }
        Ok(())
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
