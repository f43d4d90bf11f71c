use std::path::PathBuf;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    /// Sender the dispatcher is bound to by default.
    pub app_name: String,
    pub logs_path: PathBuf,
    /// Filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Config {
    pub fn new() -> Self {
        Self {
            app_name: std::env::var("APP_NAME").unwrap_or("app".to_string()),
            logs_path: std::env::var("LOGS_PATH")
                .map_or(PathBuf::from("logs"), PathBuf::from),
            log_filter: std::env::var("LOG_FILTER")
                .unwrap_or("scoped_events=info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.app_name.trim().is_empty() {
            return Err(AppError::MissingConfig {
                key: "APP_NAME".to_string(),
            });
        }
        Ok(())
    }
}
