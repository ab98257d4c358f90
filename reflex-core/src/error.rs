//! Error types for the reactive engine.
//!
//! `track` and `trigger` never fail. Errors only surface when an effect is
//! created with bad options, when a disposed effect is invoked, or when a
//! reactive object is built from JSON that is not an object.

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Errors produced by the reactive engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The effect was disposed and can no longer run.
    #[error("effect {id:?} has been disposed")]
    Disposed {
        /// The disposed effect.
        id: SubscriberId,
    },

    /// Effect options were rejected at creation time.
    #[error("invalid effect options: {0}")]
    InvalidOptions(String),

    /// A JSON value could not be converted.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A reactive map can only be built from a JSON object.
    #[error("expected a JSON object")]
    NotAnObject,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
