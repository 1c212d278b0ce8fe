// Domain layer - Plain data shared by every other layer
pub mod device;
pub mod reading;
pub mod report;
pub mod user;
