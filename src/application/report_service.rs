// Report service - Use case for building and exporting device reports
use crate::application::errors::ExportError;
use crate::application::history_repository::{HistoryRepository, hours_before};
use crate::application::report_exporter::ReportExporter;
use crate::domain::device::{Device, DeviceId};
use crate::domain::report::{IndustrialReport, ReportHistoryItem, ReportSummary};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

pub struct ReportService {
    history: Arc<dyn HistoryRepository>,
    exporter: Arc<dyn ReportExporter>,
    devices: Vec<Device>,
    reports: Mutex<Vec<ReportHistoryItem>>,
    in_flight: Mutex<Option<(u64, CancellationToken)>>,
    next_export: AtomicU64,
}

impl ReportService {
    pub fn new(
        history: Arc<dyn HistoryRepository>,
        exporter: Arc<dyn ReportExporter>,
        devices: Vec<Device>,
    ) -> Self {
        Self {
            history,
            exporter,
            devices,
            reports: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
            next_export: AtomicU64::new(1),
        }
    }

    /// `dir/report_YYYYMMDD.xlsx` for the local date of `now`.
    pub fn default_report_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
        dir.join(format!("report_{}.xlsx", now.format("%Y%m%d")))
    }

    /// Readings of `device_id` in `[start, end]` with their statistics.
    pub fn build_report(
        &self,
        device_id: &DeviceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> IndustrialReport {
        let readings = self.history.query(device_id, start, end);
        IndustrialReport {
            device_id: device_id.clone(),
            device_name: self
                .device(device_id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| device_id.to_string()),
            generated_at: Utc::now(),
            start,
            end,
            summary: ReportSummary::from_readings(&readings),
            readings,
        }
    }

    /// Export the last `hours` of `device_id` to `path`.
    ///
    /// Starting an export cancels the one still in flight, which then
    /// resolves to [`ExportError::Cancelled`].
    pub async fn export_device_report(
        &self,
        device_id: &DeviceId,
        hours: u32,
        path: &Path,
    ) -> Result<PathBuf, ExportError> {
        let (export_id, cancel) = self.begin_export();

        let end = Utc::now();
        let start = hours_before(end, hours);
        let readings = self.history.query(device_id, start, end);
        let label = self
            .device(device_id)
            .map(Device::label)
            .unwrap_or_else(|| device_id.to_string());

        tracing::info!(
            "Exporting {} readings of {} to {}",
            readings.len(),
            device_id,
            path.display()
        );

        let result = self.exporter.export(&readings, path, &label, &cancel).await;
        self.finish_export(export_id);

        match result {
            Ok(written) => {
                tracing::info!("Report written to {}", written.display());
                self.record(device_id, &written);
                Ok(written)
            }
            Err(ExportError::Cancelled) => {
                tracing::info!("Export of {} cancelled", device_id);
                Err(ExportError::Cancelled)
            }
            Err(e) => {
                tracing::error!("Export of {} failed: {}", device_id, e);
                Err(e)
            }
        }
    }

    /// Cancel the export in flight, if any.
    pub fn cancel_export(&self) {
        if let Some((_, token)) = self.slot().take() {
            token.cancel();
        }
    }

    /// Successful exports, newest first.
    pub fn report_history(&self) -> Vec<ReportHistoryItem> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    fn slot(&self) -> MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_export(&self) -> (u64, CancellationToken) {
        let id = self.next_export.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some((_, previous)) = self.slot().replace((id, token.clone())) {
            previous.cancel();
        }
        (id, token)
    }

    fn finish_export(&self, id: u64) {
        let mut slot = self.slot();
        // A newer export owns the slot once it has replaced ours.
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
    }

    fn record(&self, device_id: &DeviceId, written: &Path) {
        let item = ReportHistoryItem {
            file_name: written
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            full_path: written.to_path_buf(),
            created_at: Utc::now(),
            device_id: device_id.clone(),
        };
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, item);
    }
}
