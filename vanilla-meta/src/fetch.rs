use crate::config::VanillaMetaConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

const PART_SUFFIX: &str = ".part";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub bytes_so_far: u64,
    /// `None` when the server did not announce a length.
    pub total: Option<u64>,
}

/// Retrieves a remote resource into a local file.
///
/// Implementations must leave `destination` untouched unless the whole
/// resource was retrieved.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &(dyn Fn(FetchProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), FetchError>;
}

/// HTTP fetcher streaming into `<destination>.part` and renaming on success.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|err| FetchError::Transport {
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn from_config(config: &VanillaMetaConfig) -> Result<Self, FetchError> {
        Self::new(config.request_timeout(), &config.user_agent)
    }

    async fn download(
        &self,
        url: &str,
        part: &Path,
        on_progress: &(dyn Fn(FetchProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.client.get(url).send() => {
                response.map_err(|err| transport_error(url, err))?
            }
        };
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        if let Some(parent) = part.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(part).await?;
        let mut stream = response.bytes_stream();
        let mut bytes_so_far = 0u64;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|err| transport_error(url, err))?;
            file.write_all(&chunk).await?;
            bytes_so_far += chunk.len() as u64;
            on_progress(FetchProgress {
                bytes_so_far,
                total,
            });
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &(dyn Fn(FetchProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let part = part_path(destination);
        match self.download(url, &part, on_progress, cancel).await {
            Ok(()) => {
                if let Err(err) = fs::rename(&part, destination).await {
                    let _ = fs::remove_file(&part).await;
                    return Err(err.into());
                }
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&part).await;
                Err(err)
            }
        }
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

fn transport_error(url: &str, err: reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}
