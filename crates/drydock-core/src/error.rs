use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrydockError {
    #[error("not initialized: run 'drydock init'")]
    NotInitialized,

    #[error("release not found: {0}")]
    ReleaseNotFound(String),

    #[error("release already exists: {0}")]
    ReleaseExists(String),

    #[error("service not found in config: {0}")]
    ServiceNotFound(String),

    #[error("environment not found in config: {0}")]
    EnvironmentNotFound(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid version '{0}': expected vMAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    #[error("invalid git sha '{0}': expected 7-40 lowercase hex characters")]
    InvalidSha(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("environment '{environment}' requires approval before apply")]
    ApprovalRequired { environment: String },

    #[error("no service URL recorded for '{service}': gateway cannot be composed")]
    MissingServiceUrl { service: String },

    #[error("required tool not found on PATH: {0}")]
    ToolMissing(String),

    #[error("{tool} failed: {hint}")]
    ToolFailed { tool: String, hint: String },

    #[error("unexpected {tool} output: {reason}")]
    ToolOutput { tool: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DrydockError>;
