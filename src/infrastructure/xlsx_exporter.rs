// XLSX report exporter
use crate::application::errors::ExportError;
use crate::application::report_exporter::ReportExporter;
use crate::domain::reading::{DeviceStatus, Reading};
use crate::domain::report::ReportSummary;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, XlsxError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const SHEET_NAME: &str = "Conveyor Data";
const TITLE: &str = "Industrial System Report";
const HEADER_ROW: u32 = 5;
const HEADERS: [&str; 6] = [
    "Timestamp",
    "Device",
    "Speed (m/s)",
    "Throughput (t/h)",
    "Status",
    "Temperature (°C)",
];
const COLUMN_WIDTHS: [f64; 6] = [20.0, 24.0, 12.0, 16.0, 10.0, 16.0];
const DISPLAY_TIME: &str = "%d.%m.%Y %H:%M:%S";

const HEADER_FILL: u32 = 0xE6E6FA;
const WARNING_FILL: u32 = 0xFFF3CD;
const ERROR_FILL: u32 = 0xF8D7DA;
const STOPPED_FILL: u32 = 0xE2E3E5;

/// Writes a single-sheet workbook: a header block, one row per reading and a
/// statistics block below the data.
#[derive(Debug, Clone, Default)]
pub struct XlsxReportExporter;

impl XlsxReportExporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportExporter for XlsxReportExporter {
    async fn export(
        &self,
        readings: &[Reading],
        path: &Path,
        device_label: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ExportError> {
        if readings.is_empty() {
            return Err(ExportError::NoData);
        }

        let mut rows = readings.to_vec();
        rows.sort_by_key(|r| r.timestamp);
        let path = path.to_path_buf();
        let label = device_label.to_string();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let generated_at = Local::now();
            let bytes = build_workbook(&rows, &label, generated_at, &cancel)?;
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            write_with_fallback(&bytes, &path, generated_at)
        })
        .await
        .map_err(|e| ExportError::Format(format!("export task failed: {e}")))?
    }
}

enum BuildError {
    Cancelled,
    Xlsx(XlsxError),
}

impl From<XlsxError> for BuildError {
    fn from(e: XlsxError) -> Self {
        BuildError::Xlsx(e)
    }
}

impl From<BuildError> for ExportError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Cancelled => ExportError::Cancelled,
            BuildError::Xlsx(e) => ExportError::Format(e.to_string()),
        }
    }
}

fn status_fill(status: DeviceStatus) -> Option<Color> {
    match status {
        DeviceStatus::Running => None,
        DeviceStatus::Warning => Some(Color::RGB(WARNING_FILL)),
        DeviceStatus::Error => Some(Color::RGB(ERROR_FILL)),
        DeviceStatus::Stopped => Some(Color::RGB(STOPPED_FILL)),
    }
}

fn build_workbook(
    readings: &[Reading],
    device_label: &str,
    generated_at: DateTime<Local>,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, BuildError> {
    let title = Format::new().set_bold().set_font_size(16.0);
    let section = Format::new().set_bold().set_font_size(14.0);
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin);
    let cell = Format::new().set_border(FormatBorder::Thin);
    let bold = Format::new().set_bold();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    sheet.write_string_with_format(0, 0, TITLE, &title)?;
    sheet.write_string(1, 0, format!("Device: {device_label}"))?;
    sheet.write_string(2, 0, format!("Generated: {}", generated_at.format(DISPLAY_TIME)))?;
    sheet.write_string(3, 0, format!("Records: {}", readings.len()))?;

    for (col, (name, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(HEADER_ROW, col, *name, &header)?;
        sheet.set_column_width(col, width)?;
    }

    let mut row = HEADER_ROW;
    for reading in readings {
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        row += 1;

        let format = match status_fill(reading.status) {
            Some(fill) => cell.clone().set_background_color(fill),
            None => cell.clone(),
        };
        let timestamp = reading.timestamp.with_timezone(&Local).format(DISPLAY_TIME);
        sheet.write_string_with_format(row, 0, timestamp.to_string(), &format)?;
        sheet.write_string_with_format(row, 1, reading.device_name.as_str(), &format)?;
        sheet.write_number_with_format(row, 2, reading.speed, &format)?;
        sheet.write_number_with_format(row, 3, reading.throughput, &format)?;
        sheet.write_string_with_format(row, 4, reading.status.as_str(), &format)?;
        match reading.temperature {
            Some(t) => sheet.write_number_with_format(row, 5, t, &format)?,
            None => sheet.write_string_with_format(row, 5, "", &format)?,
        };
    }

    if let Some(summary) = ReportSummary::from_readings(readings) {
        let mut row = row + 2;
        sheet.write_string_with_format(row, 0, "STATISTICS", &section)?;
        for (name, value) in summary_lines(&summary) {
            row += 1;
            sheet.write_string_with_format(row, 0, name, &bold)?;
            sheet.write_number(row, 1, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn summary_lines(summary: &ReportSummary) -> [(&'static str, f64); 7] {
    [
        ("Average speed (m/s)", summary.mean_speed),
        ("Minimum speed (m/s)", summary.min_speed),
        ("Maximum speed (m/s)", summary.max_speed),
        ("Average throughput (t/h)", summary.mean_throughput),
        ("Total conveyed (t)", summary.total_mass),
        ("Warnings", summary.warning_count as f64),
        ("Errors", summary.error_count as f64),
    ]
}

/// Write to `path`, or once more to a time-suffixed sibling if that fails
/// (e.g. the previous report is still open in a spreadsheet program).
fn write_with_fallback(
    bytes: &[u8],
    path: &Path,
    now: DateTime<Local>,
) -> Result<PathBuf, ExportError> {
    match write_report(path, bytes) {
        Ok(()) => Ok(path.to_path_buf()),
        Err(primary) => {
            let fallback = fallback_path(path, now);
            tracing::warn!(
                "Could not write {}: {}; retrying as {}",
                path.display(),
                primary,
                fallback.display()
            );
            match write_report(&fallback, bytes) {
                Ok(()) => Ok(fallback),
                Err(source) => Err(ExportError::Io {
                    path: fallback,
                    source,
                }),
            }
        }
    }
}

fn write_report(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    if path.exists() {
        fs::remove_file(path)?;
    }
    fs::write(path, bytes)
}

fn fallback_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    path.with_file_name(format!("{stem}_{}.xlsx", now.format("%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reading::fixtures::reading_at;

    fn readings() -> Vec<Reading> {
        let mut warning = reading_at("BELT-001", 2, 1.9, 210.0);
        warning.status = DeviceStatus::Warning;
        vec![
            reading_at("BELT-001", 1, 2.1, 190.0),
            reading_at("BELT-001", 0, 2.0, 200.0),
            warning,
        ]
    }

    #[tokio::test]
    async fn test_export_writes_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report_20240501.xlsx");

        let written = XlsxReportExporter::new()
            .export(&readings(), &path, "Main Belt A (BELT-001)", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(written, path);
        let bytes = fs::read(&written).unwrap();
        // XLSX is a zip container.
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn test_existing_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        fs::write(&path, b"stale").unwrap();

        let written = XlsxReportExporter::new()
            .export(&readings(), &path, "BELT-001", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(written, path);
        assert_ne!(fs::read(&path).unwrap(), b"stale");
    }

    #[tokio::test]
    async fn test_unwritable_primary_path_uses_fallback_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        // A directory in the way makes the primary write fail.
        fs::create_dir(&path).unwrap();

        let written = XlsxReportExporter::new()
            .export(&readings(), &path, "BELT-001", &CancellationToken::new())
            .await
            .unwrap();

        assert_ne!(written, path);
        assert_eq!(written.parent(), path.parent());
        let name = written.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report_") && name.ends_with(".xlsx"), "{name}");
        assert!(written.is_file());
    }

    #[tokio::test]
    async fn test_io_error_when_both_attempts_fail() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("report.xlsx");

        let err = XlsxReportExporter::new()
            .export(&readings(), &path, "BELT-001", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_cancelled_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = XlsxReportExporter::new()
            .export(&readings(), &path, "BELT-001", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_input_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let err = XlsxReportExporter::new()
            .export(&[], &path, "BELT-001", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::NoData));
        assert!(!path.exists());
    }

    #[test]
    fn test_fallback_name_keeps_stem() {
        let now = Local::now();
        let fallback = fallback_path(Path::new("reports/report_20240501.xlsx"), now);
        assert_eq!(
            fallback,
            PathBuf::from(format!("reports/report_20240501_{}.xlsx", now.format("%H%M%S")))
        );
    }
}
