// Console panel - Drives a monitoring session from the terminal
use crate::application::report_service::ReportService;
use crate::application::rolling_window::WindowSnapshot;
use crate::domain::device::{Device, DeviceId};
use crate::domain::reading::{DeviceStatus, Reading};
use crate::presentation::app_state::AppState;
use chrono::{Local, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

/// Longest the shutdown export may take before it is cancelled.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// One-line rendering of the projected window and its newest reading.
pub fn render_window(snapshot: &WindowSnapshot, latest: Option<&Reading>) -> String {
    let device = snapshot.device.as_ref().map(DeviceId::as_str).unwrap_or("-");

    if snapshot.is_empty() {
        return format!("{device}: no data");
    }

    let last = snapshot.len() - 1;
    let mut line = format!(
        "{device}: {:.2} m/s, {:.1} t/h at {} ({} points)",
        snapshot.speed[last],
        snapshot.throughput[last],
        snapshot.timestamps[last].with_timezone(&Local).format("%H:%M:%S"),
        snapshot.len()
    );
    if let Some(reading) = latest {
        if let Some(t) = reading.temperature {
            line.push_str(&format!(", {t:.1} °C"));
        }
        line.push_str(&format!(", {}", reading.status));
    }
    line
}

/// Newest reading of every device, fed from the controller's subscription.
#[derive(Debug, Default)]
pub struct DeviceOverview {
    latest: HashMap<DeviceId, Reading>,
}

impl DeviceOverview {
    pub fn record(&mut self, reading: Reading) {
        self.latest.insert(reading.device_id.clone(), reading);
    }

    pub fn latest(&self, id: &DeviceId) -> Option<&Reading> {
        self.latest.get(id)
    }

    /// One line per device, in the order of `devices`.
    pub fn render(&self, devices: &[Device]) -> Vec<String> {
        devices
            .iter()
            .map(|device| match self.latest(&device.id) {
                Some(r) => format!(
                    "{}: {:.2} m/s, {:.1} t/h, {}",
                    device.label(),
                    r.speed,
                    r.throughput,
                    r.status
                ),
                None => format!("{}: waiting for data", device.label()),
            })
            .collect()
    }
}

fn log_alarm(reading: &Reading) {
    match reading.status {
        DeviceStatus::Warning => tracing::warn!(
            "{} reports WARNING at {:.2} m/s",
            reading.device_name,
            reading.speed
        ),
        DeviceStatus::Error => tracing::error!(
            "{} reports ERROR at {:.2} m/s",
            reading.device_name,
            reading.speed
        ),
        DeviceStatus::Running | DeviceStatus::Stopped => {}
    }
}

/// Run a monitoring session for the logged-in operator until `shutdown`
/// resolves, then stop streaming, export a report and log out.
pub async fn run_session(state: &AppState, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    let device = state.selected_device.clone();
    state
        .projector
        .select_device(device.clone(), state.history.as_ref());
    tracing::info!(
        "Monitoring {} ({} of {} points) with {} devices streaming",
        state.device_service.display_name(&device),
        state.projector.snapshot().len(),
        state.projector.capacity(),
        state.stream_controller.devices().len()
    );

    let devices = state.device_service.list_devices();
    let names: Vec<String> = devices.iter().map(Device::label).collect();
    tracing::info!("Devices: {}", names.join(", "));

    let readings = state.stream_controller.subscribe();
    state
        .stream_controller
        .start(state.projector.clone())
        .await?;

    let mut refresh = tokio::time::interval(state.stream_controller.interval());
    let mut shutdown = pin!(shutdown);
    let mut readings = pin!(readings);
    let mut overview = DeviceOverview::default();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = refresh.tick() => {
                if !state.stream_controller.is_running().await {
                    tracing::warn!("Stream ended without being stopped");
                    break;
                }
                let latest = state.projector.latest();
                tracing::info!("{}", render_window(&state.projector.snapshot(), latest.as_ref()));
                for line in overview.render(devices) {
                    tracing::info!("  {}", line);
                }
            }
            Some(reading) = readings.next() => {
                log_alarm(&reading);
                overview.record(reading);
            }
        }
    }

    state.stream_controller.stop().await;
    let stats = state.stream_controller.stats();
    tracing::info!(
        "Streamed {} readings in {} ticks ({} observer failures)",
        stats.readings_emitted,
        stats.ticks_completed,
        stats.callback_failures
    );

    let path = ReportService::default_report_path(&state.export_dir, Local::now());
    let mut export = pin!(state.report_service.export_device_report(
        &device,
        state.report_hours,
        &path
    ));
    let exported = tokio::select! {
        result = &mut export => result,
        _ = tokio::time::sleep(EXPORT_TIMEOUT) => {
            tracing::warn!("Shutdown report took longer than {:?}, cancelling", EXPORT_TIMEOUT);
            state.report_service.cancel_export();
            export.await
        }
    };
    match exported {
        Ok(written) => tracing::info!("Shutdown report saved to {}", written.display()),
        Err(e) => tracing::error!("Shutdown report not saved: {}", e),
    }
    for item in state.report_service.report_history() {
        tracing::info!(
            "Report {} for {} at {} ({})",
            item.file_name,
            item.device_id,
            item.created_at.with_timezone(&Local).format("%H:%M:%S"),
            item.full_path.display()
        );
    }

    let report = state
        .report_service
        .build_report(&device, Utc::now() - chrono::Duration::hours(1), Utc::now());
    if let Some(summary) = &report.summary {
        tracing::info!(
            "{} ({}) {}-{}, {} readings as of {}: mean {:.2} m/s, {:.1} t conveyed, {} warnings, {} errors",
            report.device_name,
            report.device_id,
            report.start.with_timezone(&Local).format("%H:%M"),
            report.end.with_timezone(&Local).format("%H:%M"),
            report.readings.len(),
            report.generated_at.with_timezone(&Local).format("%H:%M:%S"),
            summary.mean_speed,
            summary.total_mass,
            summary.warning_count,
            summary.error_count
        );
    }

    if let Some(user) = state.auth_service.current_user() {
        let since = user
            .last_login
            .map(|at| at.with_timezone(&Local).format("%d.%m.%Y %H:%M:%S").to_string())
            .unwrap_or_default();
        tracing::info!("{} ({}) signing off, logged in since {}", user.full_name, user.role, since);
    }
    state.auth_service.logout();
    Ok(())
}
