use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where bulletin bytes come from. The HTTP implementation is the real
/// thing; tests substitute an in-memory map.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Lightweight existence probe. `false` means "no bulletin published
    /// for that date", an expected outcome.
    async fn exists(&self, url: &str) -> Result<bool, SourceError>;

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn exists(&self, url: &str) -> Result<bool, SourceError> {
        let resp = self.client.head(url).send().await?;
        debug!(url, status = %resp.status(), "probe");
        Ok(resp.status().is_success())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
