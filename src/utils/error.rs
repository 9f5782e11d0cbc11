//! Error Handling Module
//!
//! Defines the error type for the fine-tuning library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for ViT fine-tuning operations
#[derive(Error, Debug)]
pub enum VitError {
    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Malformed label table
    #[error("Label file error: {0}")]
    LabelFile(String),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The label vocabulary does not have the configured number of classes
    #[error("Expected {expected} classes in the label file, found {found}")]
    ClassCountMismatch { expected: usize, found: usize },

    /// A train or validation partition came out empty
    #[error("Empty {0} partition: not enough labeled records to split")]
    EmptyPartition(&'static str),

    /// Weighted sampler could not be built
    #[error("Sampler error: {0}")]
    Sampler(String),

    /// Error with model construction, loading or saving
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type for fine-tuning operations
pub type Result<T> = std::result::Result<T, VitError>;
