use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tally task for {} did not finish: {reason}", .path.display())]
    TaskFailed { path: PathBuf, reason: String },

    #[error("tally was cancelled")]
    Cancelled,

    #[error("tally deadline elapsed")]
    DeadlineElapsed,
}

impl TallyError {
    /// The file this error is about, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Open { path, .. } | Self::Read { path, .. } | Self::TaskFailed { path, .. } => {
                Some(path)
            }
            Self::Cancelled | Self::DeadlineElapsed => None,
        }
    }
}

pub type TallyResult<T> = std::result::Result<T, TallyError>;
