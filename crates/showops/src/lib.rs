pub mod cache;
pub mod config;
pub mod error;
pub mod integrations;
pub mod notifications;
pub mod telemetry;
pub mod workflows;

pub use error::AppError;
