use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Port file not found: {}", path.display())]
    PortFileNotFound { path: PathBuf },

    #[error("IO error on {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid port value '{value}': expected a base-10 integer")]
    ParseError {
        value: String,
        #[source]
        source: Option<std::num::ParseIntError>,
    },

    #[error("Port out of range (1-65535): {value}")]
    RangeError { value: String },

    #[error("Template error: {message}")]
    TemplateError { message: String },

    #[error("Content type and body must be set together: {message}")]
    ConfigMismatchError { message: String },

    #[error("HTTP request failed: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("Invalid request URL: {source}")]
    InvalidUrlError {
        #[source]
        source: url::ParseError,
    },

    #[error("Redirect from {url} failed: {message}")]
    RedirectError { url: String, message: String },

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Synchronization failed: {0}")]
    DispatchError(DispatchErrors),
}

impl SyncError {
    pub fn template(message: impl Into<String>) -> Self {
        SyncError::TemplateError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SyncError::ConfigError {
            message: message.into(),
        }
    }
}

/// A failed step of one service group.
#[derive(Error, Debug)]
#[error("service '{service}' step {step}: {source}")]
pub struct StepError {
    pub service: String,
    pub step: usize,
    #[source]
    pub source: SyncError,
}

/// Ordered collection of step failures gathered over one dispatch.
#[derive(Debug, Default)]
pub struct DispatchErrors(Vec<StepError>);

impl DispatchErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: StepError) {
        self.0.push(error);
    }

    /// Appends `other` after the errors already collected.
    pub fn join(mut self, other: DispatchErrors) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepError> {
        self.0.iter()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(SyncError::DispatchError(self))
        }
    }
}

impl fmt::Display for DispatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl FromIterator<StepError> for DispatchErrors {
    fn from_iter<I: IntoIterator<Item = StepError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
