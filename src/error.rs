use super::*;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown command: {0}")]
  UnknownCommand(String),
  #[error("unknown limit: {0}")]
  UnknownLimit(String),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("staging failed: {0}")]
  Staging(String),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("operation requires root privileges")]
  NotRoot,
  #[error("permission error: {0}")]
  Permission(String),
  #[error("configuration error: {0}")]
  Config(String),
}

pub type Result<T = ()> = std::result::Result<T, Error>;
