// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod memory_history;
pub mod password_hasher;
pub mod xlsx_exporter;
