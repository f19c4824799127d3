//! Error types for the fallible entry points.
//!
//! The layout pipeline itself never fails: missing elements are skipped and
//! dangling references are cleared with a diagnostic. Only the surfaces that
//! cross a serialization or FFI boundary, or that look up a caller-supplied
//! tick, can return an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Invalid style configuration: {0}")]
    Style(#[source] serde_json::Error),

    #[error("Invalid score document: {0}")]
    Score(#[source] serde_json::Error),

    #[error("Failed to serialize layout result: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid UTF-8 in input: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("No measure at tick {0}")]
    UnknownTick(i32),
}
