// Presentation layer - Console front-end
pub mod app_state;
pub mod console;
