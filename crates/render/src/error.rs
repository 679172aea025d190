//! Error types for story rendering

use thiserror::Error;

use crate::artifact::Artifact;

/// How a failed invocation should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The invocation could not complete.
    Fatal,
    /// The invocation completed but a verification did not hold.
    Assertion,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid render request: {0}")]
    InvalidRequest(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Driver error: {0}")]
    Transport(String),

    #[error("Playwright not found. Install with: npm install --save-dev playwright")]
    PlaywrightNotFound,

    #[error("{0}")]
    ChannelUnavailable(String),

    #[error("{0}")]
    StoryMissing(String),

    #[error("{0}")]
    StoryErrored(String),

    #[error("{0}")]
    StoryException(String),

    #[error(
        "Could not render the story. Run with --devtools and --debug flags (Chrome only) \
         and investigate the error in the browser console."
    )]
    RootNotFound,

    #[error("Timed out after {millis} ms waiting for story \"{story_id}\" to render")]
    RenderTimeout { story_id: String, millis: u64 },

    #[error("Error while running accessibility tests: axeRun(): {0}")]
    AccessibilityScanFailed(String),

    #[error(
        "There are accessibility violations. Please see the complete report for details. \
         ({count} in {artifact})"
    )]
    AccessibilityViolationsFound {
        artifact: Box<Artifact>,
        count: usize,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storybook failed to start: {0}")]
    ServerStartup(String),

    #[error("Storybook health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::AccessibilityViolationsFound { .. } => ErrorKind::Assertion,
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_assertion(&self) -> bool {
        self.kind() == ErrorKind::Assertion
    }

    /// The rendered artifact, for failures that happen after rendering succeeded.
    pub fn into_artifact(self) -> Option<Artifact> {
        match self {
            RenderError::AccessibilityViolationsFound { artifact, .. } => Some(*artifact),
            _ => None,
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
