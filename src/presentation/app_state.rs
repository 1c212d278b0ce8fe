// Application state shared by the console front-end
use crate::application::auth_service::AuthenticationService;
use crate::application::device_service::DeviceService;
use crate::application::history_repository::HistoryRepository;
use crate::application::report_service::ReportService;
use crate::application::rolling_window::RollingWindowProjector;
use crate::application::stream_controller::StreamController;
use crate::domain::device::DeviceId;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppState {
    pub device_service: DeviceService,
    pub auth_service: Arc<AuthenticationService>,
    pub history: Arc<dyn HistoryRepository>,
    pub stream_controller: StreamController,
    pub projector: Arc<RollingWindowProjector>,
    pub report_service: ReportService,
    pub selected_device: DeviceId,
    pub export_dir: PathBuf,
    /// Hours of history included in the shutdown report.
    pub report_hours: u32,
}
