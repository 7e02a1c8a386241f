use thiserror::Error;

use crate::types::EntityComponentId;

#[derive(Error, Debug)]
pub enum InteropError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid span id: {0}")]
    InvalidSpanId(String),

    #[error("No span recorded for {0}")]
    UnknownComponent(EntityComponentId),
}
