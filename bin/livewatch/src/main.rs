use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use clap::Parser;
use fake_user_agent::get_chrome_rua;
use livewin::{
    dash::{DashManifestProcessor, HttpManifestFetcher},
    HttpClient, LiveConfig, RefreshCoordinator,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    ClientBuilder,
};
use url::Url;

/// Follows a live MPD and reports its seek window as it moves.
#[derive(Parser, Debug, Clone)]
#[clap(version, author)]
pub struct LiveWatchArgs {
    /// Debug output
    #[clap(short, long, alias = "debug")]
    verbose: bool,

    /// HTTP Header used to request the manifest
    ///
    /// Custom header. eg. "Referer: xxxxx".
    #[clap(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Cookies used to request the manifest
    #[clap(long, env = "LIVEWATCH_COOKIES")]
    cookies: Option<String>,

    /// Scheduler tunables in TOML
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Stop watching after this many seconds
    #[clap(short, long)]
    duration: Option<u64>,

    /// MPD url
    url: Url,
}

impl LiveWatchArgs {
    fn client(&self) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let Some((key, value)) = header.split_once(':') else {
                bail!("Invalid header, expected \"Name: value\": {header}");
            };
            headers.insert(
                HeaderName::from_str(key.trim())?,
                HeaderValue::from_str(value.trim())?,
            );
        }

        let client = HttpClient::new(
            ClientBuilder::new()
                .default_headers(headers)
                .user_agent(get_chrome_rua())
                .timeout(Duration::from_secs(30)),
        )?;
        if let Some(cookies) = &self.cookies {
            let cookies = cookies.split(';').map(|c| c.trim().to_string()).collect();
            client.add_cookies(cookies, self.url.clone())?;
        }
        Ok(client)
    }

    fn config(&self) -> anyhow::Result<LiveConfig> {
        let Some(path) = &self.config else {
            return Ok(LiveConfig::default());
        };
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(toml::from_str(&config)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = LiveWatchArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let default_filter = format!("livewatch={default_level},livewin={default_level}");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = args.client()?;
    let config = args.config()?;
    tracing::debug!(?config, "Scheduler config");

    let mut coordinator = RefreshCoordinator::with_clock(
        HttpManifestFetcher::new(client.clone()),
        DashManifestProcessor::new(client),
        livewin::TokioClock,
        config,
    );
    coordinator.on_seek_range_changed(|window| {
        tracing::info!(start = window.start, end = window.end, "Seek range changed");
    });
    coordinator.on_manifest_updated(|snapshot| {
        tracing::info!(
            live = snapshot.live,
            periods = snapshot.periods.len(),
            streams = snapshot.streams().count(),
            limits = ?snapshot.stream_limits(),
            "Manifest updated"
        );
    });

    coordinator.load_initial(args.url.clone()).await?;
    if !coordinator.is_live() {
        tracing::info!("Presentation is not live, nothing to watch");
        return Ok(());
    }

    let (handle, task) = coordinator.spawn();
    let deadline = async {
        match args.duration {
            Some(duration) => tokio::time::sleep(Duration::from_secs(duration)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupted, stopping");
        }
        _ = deadline => tracing::info!("Watch duration elapsed, stopping"),
    }

    handle.teardown();
    task.await?;
    Ok(())
}
