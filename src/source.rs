use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::album::Album;
use crate::domain::{AlbumsConfig, SourceError};

const BUILTIN_ALBUMS: &str = include_str!("../data/albums.json");

/// Delivers the full album list in one call. No paging, no parameters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlbumSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Album>, SourceError>;

    fn describe(&self) -> String;
}

/// Serves the bundled album list after a simulated network delay.
#[derive(Debug, Clone)]
pub struct MockBackend {
    latency: Duration,
    fail: bool,
}

impl MockBackend {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            fail: false,
        }
    }

    pub fn failing(latency: Duration) -> Self {
        Self {
            latency,
            fail: true,
        }
    }
}

#[async_trait]
impl AlbumSource for MockBackend {
    async fn fetch(&self) -> Result<Vec<Album>, SourceError> {
        debug!("Mock backend answering in {}ms", self.latency.as_millis());
        tokio::time::sleep(self.latency).await;
        if self.fail {
            return Err(SourceError::Unavailable(
                "mock backend is configured to fail".into(),
            ));
        }
        parse_albums(BUILTIN_ALBUMS)
    }

    fn describe(&self) -> String {
        "mock backend".to_string()
    }
}

/// Reads a JSON array of album records from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl AlbumSource for JsonFileSource {
    async fn fetch(&self) -> Result<Vec<Album>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Read {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        parse_albums(&content)
    }

    fn describe(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }
}

fn parse_albums(content: &str) -> Result<Vec<Album>, SourceError> {
    serde_json::from_str(content).map_err(|e| SourceError::Malformed(e.to_string()))
}

pub fn from_config(config: &AlbumsConfig) -> Arc<dyn AlbumSource> {
    let latency = Duration::from_millis(config.latency_ms);
    let source: Arc<dyn AlbumSource> = match (&config.data_file, config.fail_fetch) {
        (_, true) => Arc::new(MockBackend::failing(latency)),
        (Some(path), false) => Arc::new(JsonFileSource::new(path.clone())),
        (None, false) => Arc::new(MockBackend::new(latency)),
    };
    info!("Albums are served by {}", source.describe());
    source
}
