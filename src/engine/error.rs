//! Build error types.

use thiserror::Error;

/// An error surfaced in a round's aggregated error list.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A job returned an error. Siblings keep running.
    #[error("job `{name}` failed: {error:#}")]
    Job { name: String, error: anyhow::Error },

    /// A job panicked; caught so the round still drains.
    #[error("job `{name}` panicked: {message}")]
    Panic { name: String, message: String },

    /// Raised by the build function itself, outside any job.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Name of the job that produced this error, if any.
    pub fn job_name(&self) -> Option<&str> {
        match self {
            Self::Job { name, .. } | Self::Panic { name, .. } => Some(name),
            Self::Other(_) => None,
        }
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
