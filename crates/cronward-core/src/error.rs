use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronwardError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CronwardError {
    pub fn code(&self) -> &'static str {
        match self {
            CronwardError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CronwardError>;
