use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("price unavailable for {ticker}: {reason}")]
    PriceUnavailable { ticker: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("history file {path} is corrupt: {reason}")]
    HistoryCorrupt { path: PathBuf, reason: String },

    #[error("notification failed: {0}")]
    Notification(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn price_unavailable(ticker: &str, reason: impl ToString) -> Self {
        Error::PriceUnavailable {
            ticker: ticker.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Persist {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn history_corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::HistoryCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
