// Main entry point - Dependency injection and console session
mod domain;
mod application;
mod infrastructure;
mod presentation;

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::application::auth_service::{AuthenticationService, NewUser};
use crate::application::device_service::DeviceService;
use crate::application::history_repository::HistoryRepository;
use crate::application::reading_generator::ReadingGenerator;
use crate::application::report_service::ReportService;
use crate::application::rolling_window::RollingWindowProjector;
use crate::application::stream_controller::StreamController;
use crate::infrastructure::config::load_panel_config;
use crate::infrastructure::memory_history::InMemoryHistory;
use crate::infrastructure::password_hasher::PasswordHasher;
use crate::infrastructure::xlsx_exporter::XlsxReportExporter;
use crate::presentation::app_state::AppState;
use crate::presentation::console::run_session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_panel_config().context("failed to load panel configuration")?;
    let devices = config.devices();

    // Credentials
    let hasher = PasswordHasher::new(&config.resolve_pepper())
        .map_err(|e| anyhow::anyhow!("invalid pepper: {e}"))?;
    let accounts = config
        .auth
        .users
        .iter()
        .map(|u| NewUser {
            username: u.username.clone(),
            password: u.password.clone(),
            full_name: u.full_name.clone(),
            role: u.role.clone(),
        })
        .collect();
    let auth_service = Arc::new(AuthenticationService::new(hasher, accounts));

    let outcome = auth_service.login(&config.operator.username, &config.operator.password);
    if !outcome.authenticated {
        tracing::error!("{}", outcome.message);
        std::process::exit(1);
    }
    tracing::info!("{}", outcome.message);

    // Create engine (application + infrastructure layers)
    let engine = &config.engine;
    let generator = Arc::new(ReadingGenerator::new(engine.status_model, engine.rng_seed));
    let history: Arc<dyn HistoryRepository> = Arc::new(InMemoryHistory::seeded(
        &generator,
        &devices,
        engine.lookback_hours,
        engine.seed_interval_minutes,
        Utc::now(),
    ));
    tracing::info!(
        "Seeded {}h of history for {} devices ({} readings each, {:?} status model)",
        engine.lookback_hours,
        devices.len(),
        history.count(&config.selected_device()),
        generator.status_model()
    );

    let stream_controller = StreamController::new(
        generator,
        history.clone(),
        devices.clone(),
        engine.tick_interval(),
        auth_service.clone(),
        engine.broadcast_capacity,
    );
    let report_service = ReportService::new(
        history.clone(),
        Arc::new(XlsxReportExporter::new()),
        devices.clone(),
    );

    // Create application state
    let state = AppState {
        device_service: DeviceService::new(devices),
        auth_service,
        history,
        stream_controller,
        projector: Arc::new(RollingWindowProjector::new(
            engine.window_capacity,
            engine.window_seed_hours,
        )),
        report_service,
        selected_device: config.selected_device(),
        export_dir: config.export.directory.clone(),
        report_hours: engine.lookback_hours,
    };

    tracing::info!("Press Ctrl+C to stop streaming and export a report");
    run_session(&state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Could not listen for Ctrl+C: {}", e);
        }
    })
    .await
}
