use std::io;
use std::path::PathBuf;

use derive_setters::Setters;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlbumsError {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("cannot expand path \"{path}\": {reason}")]
    PathExpansion { path: String, reason: String },
    #[error("cannot determine a state directory, use --state-dir")]
    NoStateDir,
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Failure of an album fetch. Stored in the model, so it has to be cloneable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("cannot read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },
    #[error("malformed album data: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct AlbumsConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub data_file: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub latency_ms: u64,
    pub fail_fetch: bool,
}

impl Default for AlbumsConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
            data_file: None,
            state_dir: PathBuf::from("."),
            latency_ms: 600,
            fail_fetch: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Exit,
    Help,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    ToggleSortSelected,
    ToggleSortColumn(usize),
    HeaderClick(u16),
    Resize(usize, usize),
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, AlbumsError> {
    let expanded = shellexpand::full(raw).map_err(|e| AlbumsError::PathExpansion {
        path: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

pub fn default_state_dir() -> Result<PathBuf, AlbumsError> {
    dirs::data_dir()
        .map(|dir| dir.join("albums"))
        .ok_or(AlbumsError::NoStateDir)
}

pub const HELP_TEXT: &str = "\
Navigation
  ↑ ↓ / k j       move row
  ← → / h l       move column
  PgUp PgDn       move page
  g G             first / last row

Sorting
  s / Enter       toggle sort of selected column
  1 .. 9          toggle sort of column n
  click header    toggle sort of that column
                  (none -> ascending -> descending -> none)

  ?               show this help
  Esc             close popup
  q               quit";
