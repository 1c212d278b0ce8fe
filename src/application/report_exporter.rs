// Export sink trait for device reports
use crate::application::errors::ExportError;
use crate::domain::reading::Reading;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ReportExporter: Send + Sync {
    /// Write `readings` for the device labelled `device_label` to `path`.
    ///
    /// Returns the path actually written, which differs from `path` when the
    /// primary destination was unwritable and a fallback name was used.
    /// Observes `cancel` between rows and before touching the file system.
    async fn export(
        &self,
        readings: &[Reading],
        path: &Path,
        device_label: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ExportError>;
}
