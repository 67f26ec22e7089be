use svgedit_core::error::{ConfigError, ParseError, ShapeError};
use thiserror::Error;

/// Anything a session operation can fail with.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
