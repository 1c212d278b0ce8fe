// Application layer - Use cases and ports
pub mod auth_service;
pub mod device_service;
pub mod errors;
pub mod history_repository;
pub mod ports;
pub mod reading_generator;
pub mod report_exporter;
pub mod report_service;
pub mod rolling_window;
pub mod stream_controller;
