//! Dataset retrieval
//!
//! `umb` mode reads the bundled sample file, `nyu` mode asks the data
//! endpoint for `<subject>.json`. A HEAD probe lets the search step check a
//! subject exists before launching the viewer.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::dataset::{DatasetError, ElectrodeDataset};
use crate::query::{LaunchParams, Mode};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Data not found: {0}")]
    NotFound(String),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("No subject given for remote mode")]
    MissingSubject,
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Resolved location of a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Sample(PathBuf),
    Remote(String),
}

impl DatasetSource {
    pub fn resolve(config: &Config, params: &LaunchParams) -> Result<Self, SourceError> {
        match params.mode {
            Mode::Umb => Ok(DatasetSource::Sample(config.sample_path.clone())),
            Mode::Nyu => {
                let subject = params.subject.as_deref().ok_or(SourceError::MissingSubject)?;
                Ok(DatasetSource::Remote(format!(
                    "{}://{}/?file={}.json",
                    config.remote_protocol,
                    config.remote_host,
                    urlencoding::encode(subject)
                )))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DatasetSource::Sample(path) => path.display().to_string(),
            DatasetSource::Remote(url) => url.clone(),
        }
    }
}

fn client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent("ElectrodeViewer/0.1")
        .build()?)
}

/// Fetch, parse and validate a dataset
pub async fn fetch_dataset(
    source: &DatasetSource,
    timeout: Duration,
) -> Result<ElectrodeDataset, SourceError> {
    tracing::info!("Loading electrode dataset from {}", source.describe());

    let body = match source {
        DatasetSource::Sample(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => {
                        SourceError::NotFound(path.display().to_string())
                    }
                    _ => SourceError::Io {
                        path: path.clone(),
                        source: e,
                    },
                })?
        }
        DatasetSource::Remote(url) => {
            let response = client(timeout)?.get(url).send().await?;
            check_status(url, response.status())?;
            response.text().await?
        }
    };

    tracing::debug!("Fetched {} bytes of dataset JSON", body.len());
    let dataset = ElectrodeDataset::from_json_str(&body)?;
    tracing::info!(
        "Dataset '{}' loaded: {} electrodes, {} label-sets",
        dataset.subj_id,
        dataset.len(),
        dataset.label_set_names().len()
    );
    Ok(dataset)
}

/// Check that a dataset exists without downloading it
pub async fn probe(source: &DatasetSource, timeout: Duration) -> Result<(), SourceError> {
    match source {
        DatasetSource::Sample(path) => {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                Ok(())
            } else {
                Err(SourceError::NotFound(path.display().to_string()))
            }
        }
        DatasetSource::Remote(url) => {
            tracing::debug!("HEAD {}", url);
            let response = client(timeout)?.head(url).send().await?;
            // Only a 404 counts as missing
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(SourceError::NotFound(url.clone()));
            }
            Ok(())
        }
    }
}

fn check_status(url: &str, status: reqwest::StatusCode) -> Result<(), SourceError> {
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}
