use std::time::Duration;

use anyhow::{bail, Context, Result};
use backon::{ConstantBuilder, Retryable};

/// HTTP client for health probes. Each request is bounded by `timeout`.
pub fn probe_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to build probe client, using defaults");
            reqwest::Client::new()
        })
}

/// One GET; any 2xx is healthy.
pub async fn probe(client: &reqwest::Client, url: &str) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if !response.status().is_success() {
        bail!("{url} returned status {}", response.status());
    }
    Ok(())
}

/// Poll `url` every `interval` until it answers 2xx or `timeout` elapses.
pub async fn wait_until_healthy(
    client: &reqwest::Client,
    url: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let result = tokio::time::timeout(timeout, async {
        (|| async { probe(client, url).await })
            .retry(
                ConstantBuilder::default()
                    .with_delay(interval)
                    .with_max_times(usize::MAX),
            )
            .notify(|err: &anyhow::Error, dur: Duration| {
                tracing::trace!("health check failed: {:#}, retrying in {:?}", err, dur);
            })
            .await
    })
    .await;

    match result {
        Ok(inner) => inner,
        Err(_) => bail!("{url} not healthy after {:?}", timeout),
    }
}
