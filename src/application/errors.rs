// Error taxonomy of the engine and its collaborators
use crate::domain::device::DeviceId;
use std::path::PathBuf;

/// Failures around a streaming session. Callback failures are reported
/// through logging and counters; the tick loop never returns them.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("observer failed on reading from {device}: {source}")]
    Callback {
        device: DeviceId,
        #[source]
        source: anyhow::Error,
    },
    #[error("observer panicked on reading from {device}: {message}")]
    CallbackPanicked { device: DeviceId, message: String },
    #[error("streaming requires an authenticated operator session")]
    NotAuthenticated,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export cancelled")]
    Cancelled,
    #[error("nothing to export: no readings in the requested range")]
    NoData,
    #[error("could not write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not format report: {0}")]
    Format(String),
}
