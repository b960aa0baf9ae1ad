//! Error types for topology generation and app configuration.

use thiserror::Error;

/// Errors raised while building a deployment description.
///
/// Generation is pure, so the only failures are requests that cannot be
/// turned into a consistent topology. Provisioning failures belong to the
/// engine that applies the rendered template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// The requested topology is malformed (non-positive or non-integer
    /// instance count, unsupported compute strategy).
    #[error("Invalid topology request: {0}")]
    InvalidTopologyRequest(String),
}

/// Errors raised while loading the app configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Unsupported file extension.
    #[error("Unsupported config format '{0}' (expected .toml, .yaml or .yml)")]
    UnsupportedFormat(String),

    /// Stack not found in the app configuration.
    #[error("Stack '{0}' not found in configuration")]
    StackNotFound(String),

    /// The configuration declares the same stack twice.
    #[error("Duplicate stack name '{0}'")]
    DuplicateStack(String),

    /// A stack's topology settings are invalid.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}
