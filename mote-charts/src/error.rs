use std::path::PathBuf;

use mote_client::db::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move chart into place at {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("timestamp out of range: {0}")]
    TimeRange(#[from] time::error::ComponentRange),
    #[error("time zone error: {0}")]
    TimeZone(String),
    #[error("chart drawing failed: {0}")]
    Render(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("chart generation failed for {0}")]
    CategoriesFailed(String),
}

impl ChartError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Io { .. } => "io",
            Self::Persist { .. } => "persist",
            Self::TimeFormat(_) | Self::TimeRange(_) | Self::TimeZone(_) => "time",
            Self::Render(_) => "render",
            Self::Json(_) => "json",
            Self::Config(_) => "config",
            Self::CategoriesFailed(_) => "run",
        }
    }
}
